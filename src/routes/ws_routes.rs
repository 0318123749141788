use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::StreamExt;
use tracing::{error, info, warn};

use crate::models::{ChatRequest, WsChatRequest, WsEvent};
use crate::service::chat_service::{validate_question, ChatService};

/// GET `/ws/chat` — upgrades to a WebSocket for streaming chat.
pub async fn ws_chat_handler(
    ws: WebSocketUpgrade,
    State(svc): State<ChatService>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, svc))
}

/// Handles a single WebSocket connection.
///
/// Protocol:
/// - Client sends JSON `{ "session_id": "...|null", "message": "..." }`
/// - Server streams back:
///   1. `{ "type": "stream_start", "session_id": "..." }`
///   2. `{ "type": "stream_chunk", "content": "..." }` (one per fragment)
///   3. `{ "type": "stream_end", "full_content": "...", "suggestions": [...] }`
///   or `{ "type": "error", "message": "...", "session_id": "..." }` on failure;
///   `session_id` is omitted when no session was opened.
///
/// Each fragment is recorded in the session before it is forwarded.
async fn handle_socket(mut socket: WebSocket, svc: ChatService) {
    info!("WebSocket client connected");

    while let Some(msg) = socket.recv().await {
        let msg = match msg {
            Ok(m) => m,
            Err(e) => {
                warn!("WebSocket receive error: {e}");
                break;
            }
        };

        let text = match &msg {
            Message::Text(t) => t.to_string(),
            Message::Close(_) => break,
            _ => continue,
        };

        let ws_req: WsChatRequest = match serde_json::from_str(&text) {
            Ok(r) => r,
            Err(e) => {
                send_event(&mut socket, &WsEvent::Error {
                    message: format!("Invalid request: {e}"),
                    session_id: None,
                }).await;
                continue;
            }
        };

        // A valid question gets its session opened up front so the client
        // learns the id even if the model call fails.
        let session_id = match validate_question(&ws_req.message) {
            Ok(()) => Some(svc.open_session(ws_req.session_id.as_deref()).await),
            Err(_) => ws_req.session_id,
        };
        let chat_request = ChatRequest {
            session_id: session_id.clone(),
            message: ws_req.message,
        };

        // ── Prepare: validate, open model stream, record user turn ────────
        let mut reply = match svc.prepare_chat(chat_request).await {
            Ok(reply) => reply,
            Err(e) => {
                send_event(&mut socket, &WsEvent::Error {
                    message: e.to_string(),
                    session_id,
                }).await;
                continue;
            }
        };

        send_event(&mut socket, &WsEvent::StreamStart {
            session_id: reply.session_id.clone(),
        }).await;

        // ── Pull fragments one at a time, record, then forward ───────────
        let mut full_content = String::new();
        let mut failure = None;
        while let Some(chunk) = reply.stream.next().await {
            let chunk = match chunk {
                Ok(c) => c,
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            };
            if let Err(e) = svc.record_fragment(&reply.session_id, &chunk).await {
                failure = Some(e);
                break;
            }
            full_content.push_str(&chunk);
            send_event(&mut socket, &WsEvent::StreamChunk { content: chunk }).await;
        }

        match failure {
            None => {
                send_event(&mut socket, &WsEvent::StreamEnd {
                    full_content,
                    suggestions: svc.suggestions(Some(&reply.question)),
                }).await;
            }
            Some(e) => {
                error!("Reply streaming failed for session {}: {e}", reply.session_id);
                send_event(&mut socket, &WsEvent::Error {
                    message: e.to_string(),
                    session_id: Some(reply.session_id.clone()),
                }).await;
            }
        }
    }

    info!("WebSocket client disconnected");
}

/// Helper: serialize a `WsEvent` and send it over the socket.
async fn send_event(socket: &mut WebSocket, event: &WsEvent) {
    if let Ok(json) = serde_json::to_string(event) {
        let _ = socket.send(Message::Text(json.into())).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures_util::{SinkExt, StreamExt};
    use serde_json::{json, Value};
    use tokio::net::{TcpListener, TcpStream};
    use tokio_tungstenite::tungstenite::Message as WsMessage;
    use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

    use crate::agent::animation::testing::StaticFetcher;
    use crate::agent::testing::{Script, ScriptedModel};
    use crate::errors::AppError;
    use crate::routes::router;
    use crate::service::chat_service::ChatService;
    use crate::session::SessionStore;

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    async fn serve(model: Arc<ScriptedModel>) -> (ChatService, Client) {
        let svc = ChatService::new(
            SessionStore::default(),
            model,
            Arc::new(StaticFetcher(None)),
            "http://example.invalid/anim.json",
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(svc.clone());
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let (client, _) = connect_async(format!("ws://{addr}/ws/chat")).await.unwrap();
        (svc, client)
    }

    async fn ask(client: &mut Client, session_id: Option<&str>, message: &str) {
        let body = json!({ "session_id": session_id, "message": message }).to_string();
        client.send(WsMessage::Text(body)).await.unwrap();
    }

    /// Reads events up to and including the one that closes the exchange.
    async fn exchange(client: &mut Client) -> Vec<Value> {
        let mut events = Vec::new();
        while let Some(msg) = client.next().await {
            if let WsMessage::Text(text) = msg.unwrap() {
                let event: Value = serde_json::from_str(&text).unwrap();
                let done = matches!(event["type"].as_str(), Some("stream_end" | "error"));
                events.push(event);
                if done {
                    break;
                }
            }
        }
        events
    }

    fn types(events: &[Value]) -> Vec<&str> {
        events.iter().map(|e| e["type"].as_str().unwrap()).collect()
    }

    async fn texts(svc: &ChatService, session_id: &str) -> Vec<String> {
        svc.transcript(session_id)
            .await
            .unwrap()
            .iter()
            .map(|t| t.text().to_string())
            .collect()
    }

    #[tokio::test]
    async fn streams_each_fragment_then_ends_or_fails() {
        let model = Arc::new(ScriptedModel::new());
        model.queue_chunks(&["Hel", "lo!"]);
        model.queue(Script::Chunks(vec![
            Ok("part".to_string()),
            Err(AppError::InferenceError { message: "cut off".into() }),
        ]));
        let (svc, mut client) = serve(model).await;

        ask(&mut client, Some("w1"), "hello").await;
        let events = exchange(&mut client).await;
        assert_eq!(types(&events), ["stream_start", "stream_chunk", "stream_chunk", "stream_end"]);
        assert_eq!(events[0]["session_id"], "w1");
        assert_eq!(events[1]["content"], "Hel");
        assert_eq!(events[2]["content"], "lo!");
        assert_eq!(events[3]["full_content"], "Hello!");
        assert_eq!(events[3]["suggestions"][0], "hello for beginners");
        assert_eq!(texts(&svc, "w1").await, ["hello", "Hel", "lo!"]);

        ask(&mut client, Some("w1"), "again").await;
        let events = exchange(&mut client).await;
        assert_eq!(types(&events), ["stream_start", "stream_chunk", "error"]);
        assert_eq!(events[1]["content"], "part");
        assert_eq!(events[2]["session_id"], "w1");
        assert_eq!(texts(&svc, "w1").await, ["hello", "Hel", "lo!", "again", "part"]);
    }

    #[tokio::test]
    async fn failed_send_still_reports_the_opened_session() {
        let model = Arc::new(ScriptedModel::new());
        model.queue(Script::Fail(AppError::ModelUnavailable { message: "refused".into() }));
        let (svc, mut client) = serve(model).await;

        ask(&mut client, None, "hello").await;
        let events = exchange(&mut client).await;
        assert_eq!(types(&events), ["error"]);
        let session_id = events[0]["session_id"].as_str().unwrap();
        assert!(texts(&svc, session_id).await.is_empty());
    }

    #[tokio::test]
    async fn blank_question_is_rejected_without_a_session() {
        let (_svc, mut client) = serve(Arc::new(ScriptedModel::new())).await;

        ask(&mut client, None, "   ").await;
        let events = exchange(&mut client).await;
        assert_eq!(types(&events), ["error"]);
        assert!(events[0].get("session_id").is_none());
        assert!(events[0]["message"].as_str().unwrap().contains("cannot be empty"));
    }
}
