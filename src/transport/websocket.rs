//! WebSocket connector over tokio-tungstenite
//!
//! Each [`WebSocketConnector::open`] spawns one task that connects, then
//! pumps inbound frames to the [`EventSink`] and outbound frames from an
//! unbounded channel to the socket. The task always ends by emitting
//! `Closed`, mirroring browser WebSocket semantics: a failed connect reports
//! `Error` followed by `Closed`.

use super::{Connection, ConnectionEvent, Connector, EventSink};
use crate::error::{DashboardError, Result};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

enum Outbound {
    Text(String),
    Close,
}

/// Opens WebSocket connections on the current tokio runtime
#[derive(Debug, Clone, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    pub fn new() -> Self {
        Self
    }
}

impl Connector for WebSocketConnector {
    fn open(&mut self, url: &str, sink: EventSink) -> Box<dyn Connection> {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        tokio::spawn(drive(url.to_string(), sink, out_rx));
        Box::new(WebSocketConnection { out_tx })
    }
}

/// Writer side of a spawned WebSocket task
pub struct WebSocketConnection {
    out_tx: UnboundedSender<Outbound>,
}

impl Connection for WebSocketConnection {
    fn send(&mut self, text: String) -> Result<()> {
        self.out_tx
            .send(Outbound::Text(text))
            .map_err(|_| DashboardError::Channel("WebSocket task has stopped".to_string()))
    }

    fn close(&mut self) {
        let _ = self.out_tx.send(Outbound::Close);
    }
}

async fn drive(url: String, sink: EventSink, mut out_rx: UnboundedReceiver<Outbound>) {
    let stream = match connect_async(url.as_str()).await {
        Ok((stream, _response)) => stream,
        Err(e) => {
            tracing::debug!("Connect to {} failed: {}", url, e);
            sink.emit(ConnectionEvent::Error(DashboardError::from(e).to_string()));
            sink.emit(ConnectionEvent::Closed);
            return;
        }
    };

    if !sink.emit(ConnectionEvent::Open) {
        return;
    }
    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    sink.emit(ConnectionEvent::Message(text));
                }
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                    Ok(text) => {
                        sink.emit(ConnectionEvent::Message(text));
                    }
                    Err(_) => tracing::debug!("Dropping non-UTF-8 binary frame"),
                },
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!("Server closed connection: {:?}", frame);
                    break;
                }
                // Ping/pong are answered by tungstenite
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    sink.emit(ConnectionEvent::Error(DashboardError::from(e).to_string()));
                    break;
                }
                None => break,
            },
            outbound = out_rx.recv() => match outbound {
                Some(Outbound::Text(text)) => {
                    if let Err(e) = write.send(Message::Text(text)).await {
                        sink.emit(ConnectionEvent::Error(DashboardError::from(e).to_string()));
                        break;
                    }
                }
                Some(Outbound::Close) | None => {
                    let _ = write.send(Message::Close(None)).await;
                    break;
                }
            },
        }
    }

    sink.emit(ConnectionEvent::Closed);
}
