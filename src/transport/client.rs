//! Reconnecting transport client
//!
//! [`TransportClient`] is an event loop over [`ClientEvent`]s. All state it
//! owns (the connection, the outbound queue, the retry timer) is touched
//! only from that loop, so there is no locking inside the client.
//!
//! # Connection lifecycle
//!
//! ```text
//!            connect()             Open
//! Disconnected ────────► Connecting ────► Connected
//!      ▲                     │                │
//!      │        Closed       │     Closed     │
//!      └─────────────────────┴────────────────┘
//! ```
//!
//! `Error` events only update the status; the `Closed` that follows drives
//! the reconnect path. After a close, a retry is scheduled while fewer than
//! `max_reconnect_attempts` retries have been spent since the last
//! successful open. Once the budget is gone the client stays disconnected
//! until an explicit `connect()`.

use super::{Connection, ConnectionEvent, Connector, EventSink};
use crate::config::TransportConfig;
use crate::error::{DashboardError, Result};
use crate::protocol::{self, Command};
use crate::store::MeasurementStore;
use crate::types::ConnectionStatus;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

/// Everything the client loop reacts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Reported by a connection
    Connection {
        generation: u64,
        event: ConnectionEvent,
    },
    /// A scheduled reconnect fired
    RetryTimer { token: u64 },
    /// Explicit connect request
    Connect,
    /// Close the connection without reconnecting
    Disconnect,
    /// Send a serialized frame
    Send(String),
    /// Close the connection and stop the loop
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkState {
    Connecting,
    Open,
}

struct Link {
    generation: u64,
    state: LinkState,
    conn: Box<dyn Connection>,
}

struct PendingRetry {
    token: u64,
    task: JoinHandle<()>,
}

/// Owns the server connection and feeds the store
pub struct TransportClient<C: Connector> {
    config: TransportConfig,
    store: Arc<MeasurementStore>,
    connector: C,
    link: Option<Link>,
    queue: VecDeque<String>,
    reconnect_attempts: u32,
    retry: Option<PendingRetry>,
    generation: u64,
    retry_token: u64,
    events_tx: UnboundedSender<ClientEvent>,
    events_rx: UnboundedReceiver<ClientEvent>,
}

impl<C: Connector> TransportClient<C> {
    /// Create a disconnected client
    pub fn new(config: TransportConfig, store: Arc<MeasurementStore>, connector: C) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            config,
            store,
            connector,
            link: None,
            queue: VecDeque::new(),
            reconnect_attempts: 0,
            retry: None,
            generation: 0,
            retry_token: 0,
            events_tx,
            events_rx,
        }
    }

    /// Handle for driving this client from other tasks
    pub fn handle(&self) -> ClientHandle {
        ClientHandle {
            tx: self.events_tx.clone(),
        }
    }

    pub fn store(&self) -> &Arc<MeasurementStore> {
        &self.store
    }

    /// Process events until shutdown
    pub async fn run(mut self) {
        tracing::debug!("Transport client loop started");
        while let Some(event) = self.events_rx.recv().await {
            if !self.handle_event(event) {
                break;
            }
        }
        tracing::debug!("Transport client loop stopped");
    }

    /// Process every event that is already queued, without waiting
    ///
    /// Returns false if a shutdown was processed.
    pub fn process_pending(&mut self) -> bool {
        while let Ok(event) = self.events_rx.try_recv() {
            if !self.handle_event(event) {
                return false;
            }
        }
        true
    }

    /// Process one event; returns false on shutdown
    pub fn handle_event(&mut self, event: ClientEvent) -> bool {
        match event {
            ClientEvent::Connection { generation, event } => {
                self.on_connection_event(generation, event)
            }
            ClientEvent::RetryTimer { token } => self.on_retry_timer(token),
            ClientEvent::Connect => self.connect(),
            ClientEvent::Disconnect => self.disconnect(),
            ClientEvent::Send(text) => self.send_text(text),
            ClientEvent::Shutdown => {
                self.disconnect();
                return false;
            }
        }
        true
    }

    /// Open a connection unless one is already connecting or open
    ///
    /// Cancels any scheduled reconnect first.
    pub fn connect(&mut self) {
        if let Some(link) = &self.link {
            tracing::debug!(
                "Connection already {}, not reconnecting",
                if link.state == LinkState::Open { "open" } else { "in progress" }
            );
            return;
        }
        self.cancel_retry();
        self.open_link();
    }

    /// Close the connection and cancel any scheduled reconnect
    pub fn disconnect(&mut self) {
        self.cancel_retry();
        if let Some(mut link) = self.link.take() {
            tracing::info!("Closing connection to {}", self.config.url);
            link.conn.close();
        }
        self.store.connection_status.set(ConnectionStatus::Disconnected);
    }

    /// Serialize and send a message, queueing it while disconnected
    pub fn send<T: Serialize + ?Sized>(&mut self, message: &T) -> Result<()> {
        let text = protocol::encode(message)?;
        self.send_text(text);
        Ok(())
    }

    /// Send an already-serialized frame, queueing it while disconnected
    pub fn send_text(&mut self, text: String) {
        if let Some(link) = self.link.as_mut().filter(|l| l.state == LinkState::Open) {
            match link.conn.send(text.clone()) {
                Ok(()) => tracing::debug!("Sent message: {}", text),
                Err(e) => {
                    tracing::warn!("Send failed, queueing message: {}", e);
                    self.queue.push_back(text);
                }
            }
            return;
        }

        tracing::debug!("Not connected, queueing message: {}", text);
        self.queue.push_back(text);
        if self.link.is_none() {
            tracing::debug!("Connection closed, reconnecting to send queued messages");
            self.connect();
        }
    }

    // --- Introspection ---

    /// Reported connection status
    pub fn status(&self) -> ConnectionStatus {
        self.store.connection_status.get()
    }

    pub fn is_open(&self) -> bool {
        matches!(&self.link, Some(l) if l.state == LinkState::Open)
    }

    pub fn is_connecting(&self) -> bool {
        matches!(&self.link, Some(l) if l.state == LinkState::Connecting)
    }

    /// Automatic reconnects spent since the last successful open
    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    /// Messages waiting for a connection
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn has_pending_retry(&self) -> bool {
        self.retry.is_some()
    }

    /// Generation of the most recent connection attempt
    pub fn current_generation(&self) -> u64 {
        self.generation
    }

    // --- Internals ---

    fn open_link(&mut self) {
        self.generation += 1;
        let generation = self.generation;
        tracing::info!(
            "Connecting to {} (attempt generation {})",
            self.config.url,
            generation
        );

        self.store.connection_status.set(ConnectionStatus::Connecting);
        let sink = EventSink::new(generation, self.events_tx.clone());
        let conn = self.connector.open(&self.config.url, sink);
        self.link = Some(Link {
            generation,
            state: LinkState::Connecting,
            conn,
        });
    }

    fn is_current(&self, generation: u64) -> bool {
        self.link.as_ref().map(|l| l.generation) == Some(generation)
    }

    fn on_connection_event(&mut self, generation: u64, event: ConnectionEvent) {
        if !self.is_current(generation) {
            tracing::trace!("Ignoring {:?} from stale connection {}", event, generation);
            return;
        }

        match event {
            ConnectionEvent::Open => self.on_open(),
            ConnectionEvent::Message(text) => self.on_message(&text),
            ConnectionEvent::Error(error) => {
                tracing::error!("Connection error: {}", error);
                self.store.connection_status.set(ConnectionStatus::Error);
            }
            ConnectionEvent::Closed => self.on_closed(),
        }
    }

    fn on_open(&mut self) {
        let Some(link) = self.link.as_mut() else {
            return;
        };
        link.state = LinkState::Open;
        self.reconnect_attempts = 0;
        self.store.connection_status.set(ConnectionStatus::Connected);
        tracing::info!("Connected to {}", self.config.url);

        if !self.queue.is_empty() {
            tracing::debug!("Flushing {} queued messages", self.queue.len());
        }
        while let Some(text) = self.queue.pop_front() {
            if let Err(e) = link.conn.send(text.clone()) {
                tracing::warn!("Flush interrupted: {}", e);
                self.queue.push_front(text);
                break;
            }
        }
    }

    fn on_message(&self, text: &str) {
        tracing::debug!("Received frame: {}", text);
        match protocol::decode(text) {
            Ok(message) => self.store.apply_message(message),
            Err(e) => tracing::warn!("Dropping frame: {}", e),
        }
    }

    fn on_closed(&mut self) {
        self.link = None;
        self.store.connection_status.set(ConnectionStatus::Disconnected);
        tracing::info!("Connection to {} closed", self.config.url);

        if self.reconnect_attempts < self.config.max_reconnect_attempts {
            self.reconnect_attempts += 1;
            tracing::info!(
                "Reconnecting in {:?} ({}/{})",
                self.config.reconnect_delay(),
                self.reconnect_attempts,
                self.config.max_reconnect_attempts
            );
            self.schedule_retry();
        } else {
            tracing::warn!(
                "Giving up after {} reconnect attempts",
                self.config.max_reconnect_attempts
            );
        }
    }

    fn schedule_retry(&mut self) {
        self.cancel_retry();
        self.retry_token += 1;
        let token = self.retry_token;
        let delay = self.config.reconnect_delay();
        let tx = self.events_tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(ClientEvent::RetryTimer { token });
        });
        self.retry = Some(PendingRetry { token, task });
    }

    fn cancel_retry(&mut self) {
        if let Some(retry) = self.retry.take() {
            tracing::debug!("Cancelling scheduled reconnect");
            retry.task.abort();
        }
    }

    fn on_retry_timer(&mut self, token: u64) {
        match &self.retry {
            Some(retry) if retry.token == token => {
                self.retry = None;
                if self.link.is_none() {
                    self.open_link();
                }
            }
            _ => tracing::trace!("Ignoring cancelled reconnect timer {}", token),
        }
    }
}

impl<C: Connector> Drop for TransportClient<C> {
    fn drop(&mut self) {
        self.cancel_retry();
    }
}

/// Cloneable handle to a running [`TransportClient`]
///
/// Calls are delivered to the client loop and processed in order.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    tx: UnboundedSender<ClientEvent>,
}

impl ClientHandle {
    fn post(&self, event: ClientEvent) -> Result<()> {
        self.tx
            .send(event)
            .map_err(|_| DashboardError::Channel("Transport client has stopped".to_string()))
    }

    pub fn connect(&self) -> Result<()> {
        self.post(ClientEvent::Connect)
    }

    pub fn disconnect(&self) -> Result<()> {
        self.post(ClientEvent::Disconnect)
    }

    /// Serialize and send any message
    pub fn send<T: Serialize + ?Sized>(&self, message: &T) -> Result<()> {
        let text = protocol::encode(message)?;
        self.post(ClientEvent::Send(text))
    }

    pub fn send_command(&self, command: &Command) -> Result<()> {
        self.send(command)
    }

    pub fn shutdown(&self) -> Result<()> {
        self.post(ClientEvent::Shutdown)
    }
}
