//! Scripted in-memory connector
//!
//! Records every connection the client opens and every frame it sends, and
//! lets a test inject connection events on the most recent attempt.

use ats_dashboard::error::Result;
use ats_dashboard::transport::{Connection, ConnectionEvent, Connector, EventSink};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Shared {
    urls: Vec<String>,
    sinks: Vec<EventSink>,
    sent: Vec<String>,
    closed: usize,
}

/// Connector whose connections are driven by the test
#[derive(Clone, Default)]
pub struct ScriptedConnector {
    shared: Arc<Mutex<Shared>>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of connection attempts so far
    pub fn open_count(&self) -> usize {
        self.shared.lock().unwrap().sinks.len()
    }

    pub fn urls(&self) -> Vec<String> {
        self.shared.lock().unwrap().urls.clone()
    }

    /// Frames sent across all connections, in order
    pub fn sent(&self) -> Vec<String> {
        self.shared.lock().unwrap().sent.clone()
    }

    pub fn closed(&self) -> usize {
        self.shared.lock().unwrap().closed
    }

    /// Deliver an event on the most recent connection attempt
    pub fn emit(&self, event: ConnectionEvent) {
        let sink = self
            .shared
            .lock()
            .unwrap()
            .sinks
            .last()
            .cloned()
            .expect("no connection has been opened");
        assert!(sink.emit(event), "client dropped its event channel");
    }

    /// Deliver a text frame on the most recent connection attempt
    pub fn deliver(&self, frame: impl Into<String>) {
        self.emit(ConnectionEvent::Message(frame.into()));
    }

    /// Simulate a refused connection: error then close
    pub fn refuse(&self) {
        self.emit(ConnectionEvent::Error("connection refused".to_string()));
        self.emit(ConnectionEvent::Closed);
    }
}

impl Connector for ScriptedConnector {
    fn open(&mut self, url: &str, sink: EventSink) -> Box<dyn Connection> {
        let mut shared = self.shared.lock().unwrap();
        shared.urls.push(url.to_string());
        shared.sinks.push(sink);
        Box::new(ScriptedConnection {
            shared: self.shared.clone(),
        })
    }
}

struct ScriptedConnection {
    shared: Arc<Mutex<Shared>>,
}

impl Connection for ScriptedConnection {
    fn send(&mut self, text: String) -> Result<()> {
        self.shared.lock().unwrap().sent.push(text);
        Ok(())
    }

    fn close(&mut self) {
        self.shared.lock().unwrap().closed += 1;
    }
}
