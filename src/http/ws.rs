use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use uuid::Uuid;

use crate::app::messaging::MessagingService;
use crate::domain::realtime::{Group, GroupEvent};
use crate::http::{AppError, AuthUser};
use crate::AppState;

#[derive(Deserialize)]
struct ChatFrame {
    #[serde(default)]
    text: String,
}

/// Text of an incoming chat frame, or `None` for frames that should be ignored.
fn parse_chat_frame(raw: &str) -> Option<String> {
    let frame: ChatFrame = serde_json::from_str(raw).ok()?;
    let text = frame.text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

struct ChatContext {
    service: MessagingService,
    thread_id: Uuid,
    user_id: Uuid,
}

/// `GET /ws/chat/:thread_id`. Participation is checked once, before upgrading.
pub async fn chat_socket(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(thread_id): Path<Uuid>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, AppError> {
    let service = MessagingService::new(
        state.db.clone(),
        state.storage.clone(),
        state.broker.clone(),
    );
    let allowed = service
        .is_participant(thread_id, auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, thread_id = %thread_id, user_id = %auth.user_id, "failed to check thread access");
            AppError::internal("failed to open chat")
        })?;
    if !allowed {
        return Err(AppError::forbidden("Not allowed"));
    }

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return Ok(rejection.into_response()),
    };

    let chat = ChatContext {
        service,
        thread_id,
        user_id: auth.user_id,
    };
    Ok(ws.on_upgrade(move |socket| run_socket(socket, state, Group::Chat(thread_id), Some(chat))))
}

/// `GET /ws/notif`. Listen-only.
pub async fn notification_socket(
    State(state): State<AppState>,
    auth: AuthUser,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    match ws {
        Ok(ws) => ws.on_upgrade(move |socket| {
            run_socket(socket, state, Group::Notifications(auth.user_id), None)
        }),
        Err(rejection) => rejection.into_response(),
    }
}

async fn run_socket(socket: WebSocket, state: AppState, group: Group, chat: Option<ChatContext>) {
    let mut subscription = state.broker.join(group).await;
    let (mut sink, mut stream) = socket.split();
    tracing::debug!(group = %group.name(), "socket connected");

    loop {
        tokio::select! {
            event = subscription.receiver.recv() => {
                let Some(event) = event else { break };
                if let Err(err) = forward(&mut sink, &event).await {
                    tracing::debug!(error = ?err, group = %group.name(), "socket send failed");
                    break;
                }
            }
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let Some(chat) = &chat else { continue };
                        let Some(body) = parse_chat_frame(&text) else { continue };
                        match chat.service.send_message(chat.thread_id, chat.user_id, &body, None).await {
                            Ok(Some(_)) => {}
                            Ok(None) => {
                                tracing::warn!(thread_id = %chat.thread_id, user_id = %chat.user_id, "sender left the thread");
                                break;
                            }
                            Err(err) => {
                                tracing::error!(error = ?err, thread_id = %chat.thread_id, user_id = %chat.user_id, "failed to save chat message");
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        tracing::debug!(error = ?err, group = %group.name(), "socket receive failed");
                        break;
                    }
                }
            }
        }
    }

    state.broker.leave(subscription).await;
    tracing::debug!(group = %group.name(), "socket disconnected");
}

async fn forward(sink: &mut SplitSink<WebSocket, Message>, event: &GroupEvent) -> anyhow::Result<()> {
    let payload = event.client_payload()?;
    sink.send(Message::Text(payload)).await?;
    Ok(())
}
