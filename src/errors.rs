use thiserror::Error;

/// Top-level application error.
/// All variants carry a human-readable message for display/logging.
#[derive(Debug, Error)]
pub enum AppError {
    // ── Configuration errors ─────────────────────────────────────────────────
    #[error("Environment variable '{name}' must be set")]
    MissingConfig { name: String },

    // ── Model collaborator errors ────────────────────────────────────────────
    #[error("Gemini service unavailable: {message}")]
    ModelUnavailable { message: String },

    #[error("Model '{model_name}' not found")]
    ModelNotFound { model_name: String },

    #[error("Inference error: {message}")]
    InferenceError { message: String },

    #[error("Animation fetch failed for {url}: {message}")]
    AnimationFetchFailed { url: String, message: String },

    // ── Validation errors ────────────────────────────────────────────────────
    #[error("Field '{field_name}' cannot be empty")]
    EmptyField { field_name: String },

    #[error("Field '{field_name}' exceeds max length of {max_length} (actual: {actual_length})")]
    FieldTooLong { field_name: String, max_length: usize, actual_length: usize },

    // ── Session errors ───────────────────────────────────────────────────────
    #[error("Session '{id}' not found")]
    SessionNotFound { id: String },

    // ── System errors ────────────────────────────────────────────────────────
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn empty_field(field_name: impl Into<String>) -> Self {
        AppError::EmptyField { field_name: field_name.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::SessionNotFound { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, AppError::EmptyField { .. } | AppError::FieldTooLong { .. })
    }

    pub fn is_agent_unavailable(&self) -> bool {
        matches!(self, AppError::ModelUnavailable { .. })
    }

    /// Errors raised by the model collaborator for a single request.
    pub fn is_collaborator(&self) -> bool {
        matches!(
            self,
            AppError::ModelUnavailable { .. }
                | AppError::ModelNotFound { .. }
                | AppError::InferenceError { .. }
        )
    }
}
