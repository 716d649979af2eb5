//! WebSocket upgrade and per-connection handler.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, info};

use crate::state::AppState;
use crate::types::{ClientMsg, ServerMsg};

/// Client silence after which the agent pings.
pub const IDLE_PING: Duration = Duration::from_secs(30);

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut tx, mut rx) = socket.split();
    // subscribe before the greeting so nothing published in between is lost
    let mut events = state.events.subscribe();
    info!("client connected");

    let hello = ServerMsg::Connected {
        status: state.status().await,
        samples_count: state.samples_count().await,
        message: "Connected to vibration agent".into(),
    };
    if tx.send(Message::Text(hello.to_json())).await.is_err() {
        return;
    }

    let idle = sleep(IDLE_PING);
    tokio::pin!(idle);

    loop {
        tokio::select! {
            msg = rx.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    idle.as_mut().reset(Instant::now() + IDLE_PING);
                    let Some(reply) = answer(&state, &text).await else {
                        continue;
                    };
                    if tx.send(Message::Text(reply.to_json())).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => idle.as_mut().reset(Instant::now() + IDLE_PING),
            },
            ev = events.recv() => match ev {
                Ok(json) => {
                    if tx.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(n)) => debug!(skipped = n, "slow client, dropped broadcasts"),
                Err(RecvError::Closed) => break,
            },
            _ = &mut idle => {
                if tx.send(Message::Text(ServerMsg::Ping.to_json())).await.is_err() {
                    break;
                }
                idle.as_mut().reset(Instant::now() + IDLE_PING);
            }
        }
    }
    info!("client disconnected");
}

/// Reply to one client request; unknown or malformed requests get none.
async fn answer(state: &AppState, text: &str) -> Option<ServerMsg> {
    let req: ClientMsg = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(e) => {
            debug!(error = %e, "ignoring client message");
            return None;
        }
    };
    Some(match req {
        ClientMsg::Ping => ServerMsg::Pong,
        ClientMsg::GetState => ServerMsg::State {
            status: state.status().await,
            samples_count: state.samples_count().await,
        },
        ClientMsg::GetSamples { limit } => ServerMsg::Samples {
            samples: state.recent_samples(limit).await,
        },
    })
}
