use std::time::Duration;

use crate::agent::animation::DEFAULT_LOTTIE_URL;
use crate::agent::DEFAULT_MODEL;
use crate::errors::AppError;
use crate::session::DEFAULT_IDLE_TIMEOUT;

const DEFAULT_PORT: u16 = 8080;

/// Runtime settings read from the environment (and `.env`, if present).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub google_api_key: String,
    pub gemini_model: String,
    pub lottie_url: String,
    pub port: u16,
    pub session_idle_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let google_api_key = lookup("GOOGLE_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AppError::MissingConfig { name: "GOOGLE_API_KEY".to_string() })?;

        Ok(Self {
            google_api_key,
            gemini_model: lookup("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            lottie_url: lookup("LOTTIE_URL").unwrap_or_else(|| DEFAULT_LOTTIE_URL.to_string()),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            session_idle_timeout: lookup("SESSION_IDLE_MINUTES")
                .and_then(|m| m.parse::<u64>().ok())
                .map(|m| Duration::from_secs(m * 60))
                .unwrap_or(DEFAULT_IDLE_TIMEOUT),
        })
    }
}
