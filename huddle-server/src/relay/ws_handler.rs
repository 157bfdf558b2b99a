use crate::RelayConfig;
use crate::relay::RelayService;
use axum::Router;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{info, warn};

pub fn router(service: RelayService) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/ws/{room}", get(ws_handler))
        .with_state(service)
}

pub async fn serve(config: RelayConfig) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.bind).await?;
    serve_on(listener, RelayService::new(config.max_message_size)).await
}

pub async fn serve_on(listener: TcpListener, service: RelayService) -> anyhow::Result<()> {
    info!("Signaling relay listening on {}", listener.local_addr()?);
    axum::serve(listener, router(service)).await?;
    Ok(())
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(room): Path<String>,
    State(service): State<RelayService>,
) -> impl IntoResponse {
    ws.max_message_size(service.max_message_size())
        .on_upgrade(move |socket| handle_socket(socket, room, service))
}

async fn handle_socket(socket: WebSocket, room: String, service: RelayService) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let conn = service.connect(&room, tx);
    info!("New WebSocket connection {} in room '{}'", conn, room);

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn({
        let service = service.clone();

        async move {
            while let Some(Ok(msg)) = receiver.next().await {
                match msg {
                    Message::Text(text) => {
                        if let Err(e) = service.route_frame(conn, &text) {
                            warn!("Dropped frame from connection {}: {}", conn, e);
                        }
                    }
                    Message::Binary(_) => {
                        warn!("Dropped binary frame from connection {}", conn);
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    service.disconnect(conn);
    info!("WebSocket disconnected: {}", conn);
}
