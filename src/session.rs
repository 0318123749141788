use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{Speaker, Turn};

/// Ordered, append-only transcript for one interactive user.
#[derive(Debug, Default, Clone)]
pub struct ConversationSession {
    turns: Vec<Turn>,
}

impl ConversationSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a user question. Whitespace-only input is rejected and the
    /// transcript is left untouched.
    pub fn append_user_turn(&mut self, text: &str) -> Result<&Turn, AppError> {
        if text.trim().is_empty() {
            return Err(AppError::empty_field("question"));
        }
        Ok(self.push(Speaker::User, text.to_string()))
    }

    /// Records one streamed fragment of a bot reply, whatever its content.
    pub fn append_bot_fragment(&mut self, text: &str) -> &Turn {
        self.push(Speaker::Bot, text.to_string())
    }

    pub fn transcript(&self) -> &[Turn] {
        &self.turns
    }

    /// Bot turns recorded at or after `index`.
    pub fn bot_fragments_since(&self, index: usize) -> Vec<Turn> {
        self.turns
            .iter()
            .skip(index)
            .filter(|t| t.speaker() == Speaker::Bot)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    fn push(&mut self, speaker: Speaker, text: String) -> &Turn {
        let index = self.turns.len();
        self.turns.push(Turn::new(index, speaker, text));
        &self.turns[index]
    }
}

/// Sessions untouched for this long are discarded on the next lookup.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

struct Entry {
    session: ConversationSession,
    last_used: Instant,
}

impl Entry {
    fn new() -> Self {
        Self { session: ConversationSession::new(), last_used: Instant::now() }
    }
}

/// In-memory registry of live sessions, one per user. Idle sessions are
/// evicted whenever a session is opened.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Entry>>>,
    idle_timeout: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_idle_timeout(DEFAULT_IDLE_TIMEOUT)
    }
}

impl SessionStore {
    pub fn with_idle_timeout(idle_timeout: Duration) -> Self {
        Self { sessions: Arc::default(), idle_timeout }
    }

    /// Returns `id` if it names a live session, otherwise creates one under
    /// `id` (or under a fresh UUID when no id is given).
    pub async fn get_or_create(&self, id: Option<&str>) -> String {
        let id = match id {
            Some(id) if !id.trim().is_empty() => id.to_string(),
            _ => Uuid::new_v4().to_string(),
        };
        let mut sessions = self.sessions.write().await;
        self.evict_idle(&mut sessions);
        match sessions.get_mut(&id) {
            Some(entry) => entry.last_used = Instant::now(),
            None => {
                info!("Starting session {id}");
                sessions.insert(id.clone(), Entry::new());
            }
        }
        id
    }

    pub async fn with_session<T>(
        &self,
        id: &str,
        f: impl FnOnce(&mut ConversationSession) -> T,
    ) -> Result<T, AppError> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .get_mut(id)
            .ok_or_else(|| AppError::SessionNotFound { id: id.to_string() })?;
        entry.last_used = Instant::now();
        Ok(f(&mut entry.session))
    }

    pub async fn transcript(&self, id: &str) -> Result<Vec<Turn>, AppError> {
        let sessions = self.sessions.read().await;
        sessions
            .get(id)
            .map(|e| e.session.transcript().to_vec())
            .ok_or_else(|| AppError::SessionNotFound { id: id.to_string() })
    }

    /// Discards a session. Returns `false` if it did not exist.
    pub async fn end(&self, id: &str) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            debug!("Ended session {id}");
        }
        removed
    }

    fn evict_idle(&self, sessions: &mut HashMap<String, Entry>) {
        sessions.retain(|id, entry| {
            let live = entry.last_used.elapsed() < self.idle_timeout;
            if !live {
                if entry.session.is_empty() {
                    debug!("Evicting idle empty session {id}");
                } else {
                    info!("Evicting idle session {id} ({} turns)", entry.session.len());
                }
            }
            live
        });
    }
}
