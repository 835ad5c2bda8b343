//! WebSocket transport for channels.
//!
//! # Responsibilities
//! - Open the client side of a shard channel (`tokio-tungstenite`)
//! - Adopt the server side of an upgraded axum socket
//! - Pump text frames between the socket and the channel queues

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use crate::channel::Channel;
use crate::error::{FetchError, FetchResult};

/// Connect to `url` and return the dispatcher side of the channel.
pub async fn connect(url: &str) -> FetchResult<Channel> {
    let (ws, response) = tokio_tungstenite::connect_async(url)
        .await
        .map_err(|e| FetchError::Handshake(format!("{}: {}", url, e)))?;

    tracing::debug!(url = %url, status = %response.status(), "WebSocket channel established");
    Ok(from_tungstenite(ws))
}

/// Wrap a client-side tungstenite stream.
pub fn from_tungstenite<S>(ws: WebSocketStream<S>) -> Channel
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut sink, mut stream) = ws.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
    let (in_tx, in_rx) = mpsc::unbounded_channel::<String>();

    tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            if let Err(e) = sink.send(Message::Text(frame.into())).await {
                tracing::warn!(error = %e, "WebSocket send failed");
                break;
            }
        }
        let _ = sink.send(Message::Close(None)).await;
    });

    tokio::spawn(async move {
        while let Some(msg) = stream.next().await {
            let frame = match msg {
                Ok(Message::Text(text)) => text.as_str().to_owned(),
                Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => text,
                    Err(_) => {
                        tracing::warn!("Dropping non-UTF-8 binary frame");
                        continue;
                    }
                },
                Ok(Message::Close(_)) => break,
                Ok(_) => continue,
                Err(e) => {
                    tracing::debug!(error = %e, "WebSocket receive ended");
                    break;
                }
            };
            if in_tx.send(frame).is_err() {
                break;
            }
        }
    });

    Channel::from_parts(out_tx, in_rx)
}

/// Wrap the server side of an upgraded axum socket.
pub fn from_axum(socket: axum::extract::ws::WebSocket) -> Channel {
    use axum::extract::ws::Message as AxumMessage;

    let (mut sink, mut stream) = socket.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
    let (in_tx, in_rx) = mpsc::unbounded_channel::<String>();

    tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            if let Err(e) = sink.send(AxumMessage::Text(frame.into())).await {
                tracing::warn!(error = %e, "WebSocket send failed");
                break;
            }
        }
        let _ = sink.send(AxumMessage::Close(None)).await;
    });

    tokio::spawn(async move {
        while let Some(msg) = stream.next().await {
            let frame = match msg {
                Ok(AxumMessage::Text(text)) => text.as_str().to_owned(),
                Ok(AxumMessage::Binary(data)) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => text,
                    Err(_) => {
                        tracing::warn!("Dropping non-UTF-8 binary frame");
                        continue;
                    }
                },
                Ok(AxumMessage::Close(_)) => break,
                Ok(_) => continue,
                Err(e) => {
                    tracing::debug!(error = %e, "WebSocket receive ended");
                    break;
                }
            };
            if in_tx.send(frame).is_err() {
                break;
            }
        }
    });

    Channel::from_parts(out_tx, in_rx)
}
