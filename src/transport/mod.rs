//! Transport to the measurement server
//!
//! The transport is split in two so the connection state machine can be
//! driven without a network:
//!
//! - [`TransportClient`] - owns the live connection, the outbound queue and
//!   the reconnect policy. It runs as a single event loop; every connection
//!   event, retry timer and handle call is processed in delivery order.
//! - [`Connector`] / [`Connection`] - open and drive one physical
//!   connection, reporting back through an [`EventSink`].
//!   [`WebSocketConnector`] is the real implementation.
//!
//! # Example
//!
//! ```ignore
//! use ats_dashboard::config::ClientConfig;
//! use ats_dashboard::store::MeasurementStore;
//! use ats_dashboard::transport::{TransportClient, WebSocketConnector};
//! use std::sync::Arc;
//!
//! let config = ClientConfig::default();
//! let store = Arc::new(MeasurementStore::new(config.grid));
//! let client = TransportClient::new(config.transport, store.clone(), WebSocketConnector::new());
//! let handle = client.handle();
//!
//! tokio::spawn(client.run());
//! handle.connect()?;
//! handle.send_command(&Command::start([1, 2], 1..=18))?;
//! ```

pub mod client;
pub mod websocket;

pub use client::{ClientEvent, ClientHandle, TransportClient};
pub use websocket::WebSocketConnector;

use crate::error::Result;
use tokio::sync::mpsc::UnboundedSender;

/// Something that happened on a physical connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The connection is open and can carry frames
    Open,
    /// A text frame arrived
    Message(String),
    /// The connection failed; a `Closed` event follows
    Error(String),
    /// The connection is gone
    Closed,
}

/// Where a connection reports its events
///
/// Each sink is stamped with the generation of the connection attempt it
/// belongs to, so the client can discard events from superseded attempts.
#[derive(Debug, Clone)]
pub struct EventSink {
    generation: u64,
    tx: UnboundedSender<ClientEvent>,
}

impl EventSink {
    pub(crate) fn new(generation: u64, tx: UnboundedSender<ClientEvent>) -> Self {
        Self { generation, tx }
    }

    /// Connection attempt this sink belongs to
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Report an event; returns false once the client has gone away
    pub fn emit(&self, event: ConnectionEvent) -> bool {
        self.tx
            .send(ClientEvent::Connection {
                generation: self.generation,
                event,
            })
            .is_ok()
    }
}

/// Opens physical connections
#[cfg_attr(test, mockall::automock)]
pub trait Connector: Send {
    /// Start connecting to `url`
    ///
    /// Must not block. The connection reports `Open` (or `Error` then
    /// `Closed`) through `sink` once the attempt resolves.
    fn open(&mut self, url: &str, sink: EventSink) -> Box<dyn Connection>;
}

/// One physical connection
#[cfg_attr(test, mockall::automock)]
pub trait Connection: Send {
    /// Queue a text frame for transmission
    fn send(&mut self, text: String) -> Result<()>;

    /// Close the connection
    fn close(&mut self);
}
