pub mod api_routes;
pub mod chat_routes;
pub mod ws_routes;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::service::chat_service::ChatService;
use api_routes::{
    animation_handler, chat_handler, end_session_handler, suggestions_handler, transcript_handler,
};
use chat_routes::index_handler;
use ws_routes::ws_chat_handler;

pub fn router(chat_service: ChatService) -> Router {
    Router::new()
        // Page routes
        .route("/", get(index_handler))
        // API / HTMX routes
        .route("/api/chat", post(chat_handler))
        .route("/api/suggestions", get(suggestions_handler))
        .route("/api/animation", get(animation_handler))
        .route("/api/sessions/{id}", delete(end_session_handler))
        .route("/api/sessions/{id}/transcript", get(transcript_handler))
        // Streaming
        .route("/ws/chat", get(ws_chat_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(chat_service)
}
