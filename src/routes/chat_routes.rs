use askama::Template;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use rand::Rng;
use serde::Deserialize;

use crate::models::{Speaker, Turn};
use crate::quotes::pick_quote;
use crate::service::chat_service::ChatService;

// ── View models ───────────────────────────────────────────────────────────────

/// A transcript entry flattened for askama template use.
pub struct TurnView {
    pub label: &'static str,
    pub text: String,
    pub is_bot: bool,
    /// Drawn fresh on every render; empty for user entries.
    pub quote: &'static str,
}

/// Builds the chat history for one render pass.
pub fn history_views<R: Rng + ?Sized>(turns: &[Turn], rng: &mut R) -> Vec<TurnView> {
    turns
        .iter()
        .map(|t| {
            let is_bot = t.speaker() == Speaker::Bot;
            TurnView {
                label: t.speaker().label(),
                text: t.text().to_string(),
                is_bot,
                quote: if is_bot { pick_quote(rng) } else { "" },
            }
        })
        .collect()
}

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    session_id: String,
    history: Vec<TurnView>,
    suggestions: Vec<String>,
}

#[derive(Deserialize)]
pub struct PageQuery {
    pub session_id: Option<String>,
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// GET `/` — full chat page, optionally resuming a live session
pub async fn index_handler(
    Query(query): Query<PageQuery>,
    State(svc): State<ChatService>,
) -> Response {
    let (session_id, turns) = match query.session_id {
        Some(id) => match svc.transcript(&id).await {
            Ok(turns) => (id, turns),
            Err(_) => (String::new(), vec![]),
        },
        None => (String::new(), vec![]),
    };

    let tmpl = IndexTemplate {
        session_id,
        history: history_views(&turns, &mut rand::thread_rng()),
        suggestions: svc.suggestions(None),
    };
    render(tmpl)
}

// ── Helper ────────────────────────────────────────────────────────────────────

pub fn render(tmpl: impl Template) -> Response {
    render_with_status(StatusCode::OK, tmpl)
}

pub fn render_with_status(status: StatusCode, tmpl: impl Template) -> Response {
    match tmpl.render() {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Template error: {e}"),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quotes::QUOTES;
    use crate::session::ConversationSession;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn only_bot_entries_carry_a_quote() {
        let mut session = ConversationSession::new();
        session.append_user_turn("python").unwrap();
        session.append_bot_fragment("Hel");
        session.append_bot_fragment("lo!");

        let views = history_views(session.transcript(), &mut StdRng::seed_from_u64(1));
        assert_eq!(views[0].label, "You");
        assert!(views[0].quote.is_empty());
        assert!(views[1..].iter().all(|v| v.is_bot && QUOTES.contains(&v.quote)));
    }

    #[test]
    fn quotes_are_resampled_per_render() {
        let mut session = ConversationSession::new();
        for _ in 0..20 {
            session.append_bot_fragment("x");
        }
        let mut rng = StdRng::seed_from_u64(3);
        let first: Vec<_> = history_views(session.transcript(), &mut rng)
            .into_iter()
            .map(|v| v.quote)
            .collect();
        let second: Vec<_> = history_views(session.transcript(), &mut rng)
            .into_iter()
            .map(|v| v.quote)
            .collect();
        // Twenty independent draws from five quotes matching twice in a row
        // would mean the quote is pinned to the turn.
        assert_ne!(first, second);
    }
}
