//! # ATS Dashboard: measurement dashboard client
//!
//! Client-side state layer and live-data transport for a multi-channel
//! hardware measurement dashboard. A grid of devices and channels streams
//! per-channel voltage measurements over a persistent WebSocket; this crate
//! keeps the connection alive and exposes everything received as
//! observable state.
//!
//! ## Architecture
//!
//! - **Store**: [`MeasurementStore`] holds observable cells for selection,
//!   the results matrix, waveforms, history and status indicators
//! - **Protocol**: decodes server frames into typed messages and encodes
//!   outbound [`Command`]s
//! - **Transport**: [`TransportClient`] owns the connection, queues
//!   outbound frames while disconnected and reconnects on a bounded budget
//! - **Communication**: tokio channels between the client loop, the
//!   connection task and any number of store subscribers
//!
//! ## Example
//!
//! ```ignore
//! use ats_dashboard::{ClientConfig, Command, MeasurementStore, TransportClient};
//! use ats_dashboard::transport::WebSocketConnector;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> ats_dashboard::Result<()> {
//!     let config = ClientConfig::load_or_default(None);
//!     let store = Arc::new(MeasurementStore::new(config.grid));
//!
//!     let client = TransportClient::new(config.transport, store.clone(), WebSocketConnector::new());
//!     let handle = client.handle();
//!     tokio::spawn(client.run());
//!
//!     handle.connect()?;
//!     handle.send_command(&Command::start(1..=12, 1..=18))?;
//!
//!     let mut progress = store.progress.subscribe();
//!     while progress.changed().await.is_ok() {
//!         println!("{}%", *progress.borrow());
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod protocol;
pub mod store;
pub mod transport;
pub mod types;

// Re-export commonly used types
pub use config::{ClientConfig, GridConfig, TransportConfig};
pub use error::{DashboardError, Result};
pub use protocol::{Command, InboundMessage, MeasurementUpdate};
pub use store::{MeasurementStore, Observable};
pub use transport::{ClientHandle, TransportClient};
pub use types::{
    ChannelKey, ChannelWaveform, ConnectionStatus, HistoricalRun, HistoryEntry,
    MeasurementResult, MeasurementStatus, VoltageSample, WriterStatus,
};
