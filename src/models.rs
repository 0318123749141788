use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Speaker {
    User,
    Bot,
}

impl Speaker {
    pub fn as_str(&self) -> &'static str {
        match self {
            Speaker::User => "USER",
            Speaker::Bot => "BOT",
        }
    }

    /// Label shown in the chat history.
    pub fn label(&self) -> &'static str {
        match self {
            Speaker::User => "You",
            Speaker::Bot => "Bot",
        }
    }
}

impl std::fmt::Display for Speaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded unit of conversation. Only a [`ConversationSession`] creates
/// turns, and nothing mutates them afterwards.
///
/// [`ConversationSession`]: crate::session::ConversationSession
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Turn {
    index: usize,
    speaker: Speaker,
    text: String,
    created_at: DateTime<Utc>,
}

impl Turn {
    pub(crate) fn new(index: usize, speaker: Speaker, text: String) -> Self {
        Self { index, speaker, text, created_at: Utc::now() }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn speaker(&self) -> Speaker {
        self.speaker
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub session_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub session_id: String,
    /// Bot fragments recorded for this request, in arrival order.
    pub fragments: Vec<Turn>,
    pub suggestions: Vec<String>,
}

/// WebSocket request sent by the client.
#[derive(Debug, Deserialize)]
pub struct WsChatRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    pub message: String,
}

/// WebSocket event sent by the server (internally tagged).
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsEvent {
    StreamStart { session_id: String },
    StreamChunk { content: String },
    StreamEnd { full_content: String, suggestions: Vec<String> },
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
    },
}
