pub mod animation;

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use rig::agent::MultiTurnStreamItem;
use rig::message::Message as RigMessage;
use rig::prelude::CompletionClient;
use rig::providers::gemini;
use rig::streaming::{StreamedAssistantContent, StreamingChat};
use tracing::{debug, error};

use crate::errors::AppError;
use crate::models::{Speaker, Turn};

pub const DEFAULT_MODEL: &str = "gemini-pro";
const PREAMBLE: &str = "You are a friendly chat assistant. \
                        Answer the user's questions helpfully and accurately. \
                        If you don't know something, say so.";

/// Finite, pull-based sequence of text fragments from one model reply.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String, AppError>> + Send>>;

/// The external generative-language model, reached through a streaming
/// request/response call. Each call is independent.
#[async_trait]
pub trait ModelCollaborator: Send + Sync {
    /// Sends `question` with the transcript recorded so far as context.
    async fn send(&self, question: &str, history: &[Turn]) -> Result<ChunkStream, AppError>;

    fn model_name(&self) -> &str;
}

/// Builds a rig [`RigMessage`] history from the transcript. Consecutive bot
/// fragments belong to one reply, so they are joined into one assistant message.
fn to_rig_history(turns: &[Turn]) -> Vec<RigMessage> {
    let mut history = Vec::new();
    let mut reply = String::new();
    let mut in_reply = false;

    for turn in turns {
        match turn.speaker() {
            Speaker::Bot => {
                reply.push_str(turn.text());
                in_reply = true;
            }
            Speaker::User => {
                if in_reply {
                    history.push(RigMessage::assistant(std::mem::take(&mut reply)));
                    in_reply = false;
                }
                history.push(RigMessage::user(turn.text()));
            }
        }
    }
    if in_reply {
        history.push(RigMessage::assistant(reply));
    }
    history
}

fn classify(model: &str, message: String) -> AppError {
    // Unavailable means the API was never reached; dropped streams are inference errors.
    if message.contains("Connection refused") || message.contains("error trying to connect") {
        AppError::ModelUnavailable { message }
    } else if message.contains("model") && message.contains("not found") {
        AppError::ModelNotFound { model_name: model.to_string() }
    } else {
        AppError::InferenceError { message }
    }
}

/// Model collaborator backed by the rig [`gemini::Client`]. A fresh agent is
/// built per request and the session transcript is replayed as history.
#[derive(Clone)]
pub struct GeminiAgentService {
    client: gemini::Client,
    model: String,
}

impl GeminiAgentService {
    pub fn new(api_key: &str, model: &str) -> Result<Self, AppError> {
        let client = gemini::Client::builder()
            .api_key(api_key)
            .build()
            .map_err(|e| AppError::Unexpected(format!("Failed to build Gemini client: {e}")))?;
        Ok(Self { client, model: model.to_string() })
    }
}

#[async_trait]
impl ModelCollaborator for GeminiAgentService {
    async fn send(&self, question: &str, history: &[Turn]) -> Result<ChunkStream, AppError> {
        let agent = self
            .client
            .agent(&self.model)
            .preamble(PREAMBLE)
            .build();

        let rig_history = to_rig_history(history);
        debug!("Sending question to {} with {} history messages", self.model, rig_history.len());

        let model = self.model.clone();
        let stream = agent
            .stream_chat(question, rig_history)
            .await
            .filter_map(move |item| {
                let chunk = match item {
                    Ok(MultiTurnStreamItem::StreamAssistantItem(
                        StreamedAssistantContent::Text(text),
                    )) => Some(Ok(text.text)),
                    Ok(_) => None,
                    Err(e) => {
                        error!("Gemini streaming failed: {e}");
                        Some(Err(classify(&model, e.to_string())))
                    }
                };
                std::future::ready(chunk)
            });

        Ok(Box::pin(stream))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
