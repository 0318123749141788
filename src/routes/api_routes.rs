use askama::Template;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use serde::Deserialize;
use tracing::error;

use crate::errors::AppError;
use crate::models::ChatRequest;
use crate::routes::chat_routes::{history_views, render, render_with_status, TurnView};
use crate::service::chat_service::{validate_question, ChatService};

const VALIDATION_WARNING: &str = "Please enter a valid question.";

// ── Form / query input ────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ChatForm {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Deserialize)]
pub struct SuggestionsQuery {
    pub input: Option<String>,
}

// ── Template structs ──────────────────────────────────────────────────────────

#[derive(Template)]
#[template(path = "chat_response.html")]
struct ChatResponseTemplate {
    fragments: Vec<String>,
    history: Vec<TurnView>,
    suggestions: Vec<String>,
}

#[derive(Template)]
#[template(path = "error_fragment.html")]
struct ErrorFragmentTemplate {
    error_message: String,
    history: Vec<TurnView>,
    suggestions: Vec<String>,
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// POST `/api/chat` — runs one exchange and returns an HTML fragment for HTMX.
///
/// A valid question always answers with `X-Session-Id`, even when the model
/// fails, so turns recorded before the failure stay reachable.
pub async fn chat_handler(
    State(svc): State<ChatService>,
    Form(form): Form<ChatForm>,
) -> Response {
    let requested = if form.session_id.is_empty() {
        None
    } else {
        Some(form.session_id.clone())
    };
    let session_id = match validate_question(&form.message) {
        Ok(()) => Some(svc.open_session(requested.as_deref()).await),
        Err(_) => requested,
    };

    let request = ChatRequest {
        session_id: session_id.clone(),
        message: form.message.clone(),
    };
    let suggestions = svc.suggestions(Some(&form.message));

    let resp = match svc.chat(request).await {
        Err(err) => {
            let turns = match &session_id {
                Some(id) => svc.transcript(id).await.unwrap_or_default(),
                None => vec![],
            };
            error_response(&err, history_views(&turns, &mut rand::thread_rng()), suggestions)
        }
        Ok(response) => {
            let turns = svc.transcript(&response.session_id).await.unwrap_or_default();
            let tmpl = ChatResponseTemplate {
                fragments: response.fragments.iter().map(|t| t.text().to_string()).collect(),
                history: history_views(&turns, &mut rand::thread_rng()),
                suggestions: response.suggestions,
            };
            render(tmpl)
        }
    };
    with_session_header(resp, session_id.as_deref())
}

/// GET `/api/sessions/{id}/transcript` — REST: turns of a live session
pub async fn transcript_handler(
    Path(id): Path<String>,
    State(svc): State<ChatService>,
) -> Response {
    match svc.transcript(&id).await {
        Ok(turns) => Json(turns).into_response(),
        Err(e) if e.is_not_found() => (StatusCode::NOT_FOUND, e.to_string()).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// DELETE `/api/sessions/{id}` — ends a session and discards its transcript
pub async fn end_session_handler(
    Path(id): Path<String>,
    State(svc): State<ChatService>,
) -> StatusCode {
    if svc.end_session(&id).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

/// GET `/api/suggestions?input=...`
pub async fn suggestions_handler(
    Query(query): Query<SuggestionsQuery>,
    State(svc): State<ChatService>,
) -> Json<Vec<String>> {
    Json(svc.suggestions(query.input.as_deref()))
}

/// GET `/api/animation` — header animation document, 204 when unavailable
pub async fn animation_handler(State(svc): State<ChatService>) -> Response {
    match svc.animation().await {
        Ok(Some(doc)) => Json(doc).into_response(),
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            error!("Animation unavailable: {e}");
            (StatusCode::BAD_GATEWAY, e.to_string()).into_response()
        }
    }
}

// ── Helper ────────────────────────────────────────────────────────────────────

pub fn status_for(err: &AppError) -> StatusCode {
    if err.is_validation() {
        StatusCode::BAD_REQUEST
    } else if err.is_not_found() {
        StatusCode::NOT_FOUND
    } else if err.is_agent_unavailable() {
        StatusCode::SERVICE_UNAVAILABLE
    } else if err.is_collaborator() {
        StatusCode::BAD_GATEWAY
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// Lets the page keep posting into the same session.
fn with_session_header(mut resp: Response, session_id: Option<&str>) -> Response {
    if let Some(value) = session_id.and_then(|id| HeaderValue::from_str(id).ok()) {
        resp.headers_mut().insert("X-Session-Id", value);
    }
    resp
}

fn error_response(err: &AppError, history: Vec<TurnView>, suggestions: Vec<String>) -> Response {
    let error_message = if matches!(err, AppError::EmptyField { .. }) {
        VALIDATION_WARNING.to_string()
    } else {
        err.to_string()
    };
    let tmpl = ErrorFragmentTemplate { error_message, history, suggestions };
    render_with_status(status_for(err), tmpl)
}
