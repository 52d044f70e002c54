use std::sync::Arc;

use action_flow::Terminal;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use fxportal_core_types::{ChannelSink, Progress, RunFailure};
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use super::state::ServeState;
use crate::runner::run_prompt;

pub(crate) fn router() -> Router<ServeState> {
    Router::new().route("/ws", get(websocket_handler))
}

pub fn log_message(msg: &str) -> Value {
    json!({ "type": "log", "msg": msg })
}

/// `meta` with the report, or `error` with the failure message.
pub fn terminal_message(terminal: &Terminal) -> Value {
    match terminal {
        Terminal::Report(report) => json!({ "type": "meta", "data": report }),
        Terminal::Failed(failure) => json!({ "type": "error", "msg": failure.message }),
    }
}

async fn websocket_handler(
    State(state): State<ServeState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: ServeState) {
    let Some(prompt) = receive_prompt(&mut socket).await else {
        return;
    };
    info!(target: "ws", prompt = %prompt, "Run requested");

    let permit = match Arc::clone(&state.runs).acquire_owned().await {
        Ok(permit) => permit,
        Err(err) => {
            let failure = Terminal::Failed(RunFailure::new(format!("server shutting down: {err}")));
            finish(&mut socket, &failure).await;
            return;
        }
    };

    let (sink, mut lines) = ChannelSink::pair();
    let progress = Progress::new(Arc::new(sink));
    let deps = state.deps.clone();
    let run = tokio::spawn(async move {
        let _permit = permit;
        run_prompt(&prompt, &deps, &progress).await
    });

    let mut connected = true;
    while let Some(line) = lines.recv().await {
        if send_json(&mut socket, &log_message(&line)).await.is_err() {
            debug!(target: "ws", "Client went away; the run continues to completion");
            connected = false;
            break;
        }
    }
    drop(lines);

    let terminal = match run.await {
        Ok(run) => run.terminal,
        Err(err) => {
            error!(target: "ws", ?err, "Run task aborted");
            Terminal::Failed(RunFailure::new(format!("run aborted: {err}")))
        }
    };
    if connected {
        finish(&mut socket, &terminal).await;
    }
}

/// First text frame is the prompt. Anything else before it is ignored.
async fn receive_prompt(socket: &mut WebSocket) -> Option<String> {
    while let Some(msg) = socket.recv().await {
        match msg {
            Ok(Message::Text(text)) => {
                let prompt = text.trim().to_string();
                if prompt.is_empty() {
                    let failure = Terminal::Failed(RunFailure::new("empty prompt"));
                    finish(socket, &failure).await;
                    return None;
                }
                return Some(prompt);
            }
            Ok(Message::Ping(payload)) => {
                let _ = socket.send(Message::Pong(payload)).await;
            }
            Ok(Message::Close(frame)) => {
                debug!(target: "ws", ?frame, "WebSocket closed before a prompt arrived");
                return None;
            }
            Ok(Message::Binary(_)) | Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(target: "ws", ?err, "WebSocket error");
                return None;
            }
        }
    }
    None
}

async fn finish(socket: &mut WebSocket, terminal: &Terminal) {
    if let Err(err) = send_json(socket, &terminal_message(terminal)).await {
        debug!(target: "ws", ?err, "Terminal message not delivered");
    }
    let _ = socket.send(Message::Close(None)).await;
}

async fn send_json(socket: &mut WebSocket, value: &Value) -> Result<(), axum::Error> {
    socket.send(Message::Text(value.to_string())).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use fxportal_core_types::{QueryIntent, QueryMode, RunReport};

    #[test]
    fn report_becomes_meta() {
        let day = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        let intent = QueryIntent::new(QueryMode::All, day, day, "default");
        let message = terminal_message(&Terminal::Report(RunReport::from_intent(&intent)));
        assert_eq!(
            message,
            json!({
                "type": "meta",
                "data": {"mode": "all", "start_date": "07/03/2025", "end_date": "07/03/2025", "currency": "default"}
            })
        );
    }

    #[test]
    fn failure_becomes_error() {
        let message = terminal_message(&Terminal::Failed(RunFailure::new("navigation timed out")));
        assert_eq!(message, json!({"type": "error", "msg": "navigation timed out"}));
        assert_eq!(log_message("🎉 Done."), json!({"type": "log", "msg": "🎉 Done."}));
    }
}
