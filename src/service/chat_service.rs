use std::sync::Arc;

use futures_util::StreamExt;
use serde_json::Value;
use tracing::{info, warn};

use crate::agent::animation::AnimationFetcher;
use crate::agent::{ChunkStream, ModelCollaborator};
use crate::errors::AppError;
use crate::models::{ChatRequest, ChatResponse, Turn};
use crate::session::SessionStore;
use crate::suggestions;

const MAX_MESSAGE_LENGTH: usize = 8000;

/// A submitted question whose reply has not been drained yet.
pub struct PreparedReply {
    pub session_id: String,
    pub question: String,
    /// Transcript index of the first fragment of this reply.
    pub first_index: usize,
    pub stream: ChunkStream,
}

/// Rejects blank or over-long questions before anything is recorded.
pub fn validate_question(message: &str) -> Result<(), AppError> {
    if message.trim().is_empty() {
        return Err(AppError::empty_field("question"));
    }
    if message.len() > MAX_MESSAGE_LENGTH {
        return Err(AppError::FieldTooLong {
            field_name: "question".to_string(),
            max_length: MAX_MESSAGE_LENGTH,
            actual_length: message.len(),
        });
    }
    Ok(())
}

#[derive(Clone)]
pub struct ChatService {
    sessions: SessionStore,
    agent: Arc<dyn ModelCollaborator>,
    animations: Arc<dyn AnimationFetcher>,
    lottie_url: String,
}

impl ChatService {
    pub fn new(
        sessions: SessionStore,
        agent: Arc<dyn ModelCollaborator>,
        animations: Arc<dyn AnimationFetcher>,
        lottie_url: impl Into<String>,
    ) -> Self {
        Self { sessions, agent, animations, lottie_url: lottie_url.into() }
    }

    pub async fn transcript(&self, session_id: &str) -> Result<Vec<Turn>, AppError> {
        self.sessions.transcript(session_id).await
    }

    pub async fn end_session(&self, session_id: &str) -> bool {
        self.sessions.end(session_id).await
    }

    pub fn suggestions(&self, input: Option<&str>) -> Vec<String> {
        suggestions::generate(input)
    }

    pub async fn animation(&self) -> Result<Option<Value>, AppError> {
        self.animations.fetch(&self.lottie_url).await
    }

    /// Opens (or reuses) the session a question will be recorded in, so a
    /// caller can keep the id even when the exchange fails.
    pub async fn open_session(&self, session_id: Option<&str>) -> String {
        self.sessions.get_or_create(session_id).await
    }

    /// Validates the question, opens the model stream and records the user
    /// turn. The transcript is untouched if any of that fails.
    pub async fn prepare_chat(&self, request: ChatRequest) -> Result<PreparedReply, AppError> {
        validate_question(&request.message)?;

        // ── Resolve or create session ─────────────────────────────────────────
        let session_id = self.open_session(request.session_id.as_deref()).await;
        let history = self.sessions.transcript(&session_id).await?;

        // ── Ask the model before recording anything ───────────────────────────
        let stream = self.agent.send(&request.message, &history).await?;

        let user_index = self
            .sessions
            .with_session(&session_id, |s| {
                s.append_user_turn(&request.message).map(Turn::index)
            })
            .await??;

        info!(
            "Session {session_id}: question sent to {} ({} prior turns)",
            self.agent.model_name(),
            history.len()
        );

        Ok(PreparedReply {
            session_id,
            question: request.message,
            first_index: user_index + 1,
            stream,
        })
    }

    /// Records one streamed fragment as a bot turn.
    pub async fn record_fragment(&self, session_id: &str, text: &str) -> Result<Turn, AppError> {
        self.sessions
            .with_session(session_id, |s| s.append_bot_fragment(text).clone())
            .await
    }

    /// Runs one full exchange: records the question, then every fragment of the
    /// reply as it arrives. A failure mid-stream keeps the fragments already
    /// recorded.
    pub async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, AppError> {
        let mut reply = self.prepare_chat(request).await?;

        while let Some(chunk) = reply.stream.next().await {
            let chunk = chunk.inspect_err(|e| {
                warn!("Session {}: reply stream failed: {e}", reply.session_id);
            })?;
            self.record_fragment(&reply.session_id, &chunk).await?;
        }

        let first_index = reply.first_index;
        let fragments = self
            .sessions
            .with_session(&reply.session_id, |s| s.bot_fragments_since(first_index))
            .await?;

        Ok(ChatResponse {
            session_id: reply.session_id,
            fragments,
            suggestions: suggestions::generate(Some(&reply.question)),
        })
    }
}
