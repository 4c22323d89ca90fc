//! Observable state store for the measurement dashboard
//!
//! [`MeasurementStore`] is the single owner of all session state. It is
//! created once per session, shared by `Arc` between the transport client
//! (which writes into it) and any consumers (which subscribe to its cells).
//!
//! Every field is an [`Observable`] so consumers can watch exactly the
//! pieces they render. Mutation goes through the update operations in
//! [`updates`]; direct `set` calls on the cells are reserved for selection
//! state owned by the consumer.
//!
//! # Invariants
//!
//! - `results` always holds exactly `grid.slot_count()` entries. Updates
//!   replace matched entries in place and never insert or remove.
//! - A slot's `tested` flag only returns to `false` through
//!   [`MeasurementStore::initialize_matrix`].

pub mod observable;
pub mod updates;

pub use observable::Observable;

use crate::config::GridConfig;
use crate::types::{
    ChannelKey, ChannelWaveform, ConnectionStatus, HistoricalRun, HistoryEntry,
    MeasurementResult, MeasurementStatus, WriterStatus,
};
use std::collections::{BTreeSet, HashMap};

/// Progress text shown before any measurement has run
pub const PROGRESS_IDLE: &str = "Waiting";

/// All observable session state
#[derive(Debug)]
pub struct MeasurementStore {
    grid: GridConfig,

    // --- Selection (written by consumers) ---
    /// Devices chosen for the next measurement run
    pub selected_devices: Observable<BTreeSet<u32>>,
    /// Channels chosen for the next measurement run
    pub selected_channels: Observable<BTreeSet<u32>>,
    /// Result slot the user is inspecting
    pub selected_result: Observable<Option<MeasurementResult>>,

    // --- Measurement data ---
    /// Device × channel results matrix, device-major
    pub results: Observable<Vec<MeasurementResult>>,
    /// Latest waveform per channel
    pub waveforms: Observable<HashMap<ChannelKey, ChannelWaveform>>,
    /// Waveform currently under view
    pub current: Observable<Option<ChannelWaveform>>,
    /// Past runs, as last pushed by the server
    pub history: Observable<Vec<HistoryEntry>>,
    /// Stored waveforms of the past run last requested with
    /// `getHistoricalData`
    pub historical: Observable<Option<HistoricalRun>>,

    // --- Status ---
    pub measurement_status: Observable<MeasurementStatus>,
    pub writer_status: Observable<WriterStatus>,
    pub connection_status: Observable<ConnectionStatus>,
    /// Run progress, 0–100
    pub progress: Observable<u8>,
    pub progress_status: Observable<String>,
}

impl MeasurementStore {
    /// Create a fully initialized store for the given grid
    pub fn new(grid: GridConfig) -> Self {
        Self {
            grid,
            selected_devices: Observable::default(),
            selected_channels: Observable::default(),
            selected_result: Observable::default(),
            results: Observable::new(build_matrix(&grid)),
            waveforms: Observable::default(),
            current: Observable::default(),
            history: Observable::default(),
            historical: Observable::default(),
            measurement_status: Observable::default(),
            writer_status: Observable::default(),
            connection_status: Observable::default(),
            progress: Observable::new(0),
            progress_status: Observable::new(PROGRESS_IDLE.to_string()),
        }
    }

    /// Grid dimensions this store was built for
    pub fn grid(&self) -> GridConfig {
        self.grid
    }

    /// Reset all session data
    ///
    /// Selection and connection status are left alone; they belong to the
    /// consumer and the transport respectively.
    pub fn initialize(&self) {
        self.initialize_matrix();
        self.history.set(Vec::new());
        self.historical.set(None);
        self.waveforms.set(HashMap::new());
        self.current.set(None);
        self.progress.set(0);
        self.progress_status.set(PROGRESS_IDLE.to_string());
        self.measurement_status.set(MeasurementStatus::Stopped);
        self.writer_status.set(WriterStatus::Waiting);
        tracing::debug!(
            "Store initialized for {}x{} grid",
            self.grid.devices,
            self.grid.channels
        );
    }

    /// Rebuild the results matrix with every slot untested
    pub fn initialize_matrix(&self) {
        self.results.set(build_matrix(&self.grid));
    }

    /// Snapshot of one matrix slot
    pub fn result(&self, device: u32, channel: u32) -> Option<MeasurementResult> {
        self.results.with(|results| {
            results
                .iter()
                .find(|r| r.device == device && r.channel == channel)
                .copied()
        })
    }

    /// Cached waveform for one channel
    pub fn waveform(&self, key: ChannelKey) -> Option<ChannelWaveform> {
        self.waveforms.with(|w| w.get(&key).cloned())
    }

    /// Number of slots that have received a measurement
    pub fn tested_count(&self) -> usize {
        self.results
            .with(|results| results.iter().filter(|r| r.tested).count())
    }
}

impl Default for MeasurementStore {
    fn default() -> Self {
        Self::new(GridConfig::default())
    }
}

/// Build an untested matrix, devices and channels numbered from 1
pub fn build_matrix(grid: &GridConfig) -> Vec<MeasurementResult> {
    grid.device_ids()
        .flat_map(|device| {
            grid.channel_ids()
                .map(move |channel| MeasurementResult::untested(device, channel))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_store_has_full_matrix() {
        let store = MeasurementStore::default();
        let results = store.results.get();
        assert_eq!(results.len(), 12 * 18);
        assert_eq!(results[0], MeasurementResult::untested(1, 1));
        assert_eq!(results[17], MeasurementResult::untested(1, 18));
        assert_eq!(results[18], MeasurementResult::untested(2, 1));
        assert_eq!(*results.last().unwrap(), MeasurementResult::untested(12, 18));
        assert!(results.iter().all(|r| !r.tested && !r.passed && r.value == 0));
    }

    #[test]
    fn test_custom_grid() {
        let store = MeasurementStore::new(GridConfig {
            devices: 2,
            channels: 3,
        });
        assert_eq!(store.results.get().len(), 6);
        assert!(store.result(2, 3).is_some());
        assert!(store.result(3, 1).is_none());
    }

    #[test]
    fn test_initialize_clears_session_data() {
        let store = MeasurementStore::default();
        store.results.update(|r| r[0].tested = true);
        store.history.set(vec![HistoryEntry::default()]);
        store.historical.set(Some(HistoricalRun::default()));
        store
            .waveforms
            .update(|w| {
                w.insert(ChannelKey::new(1, 1), ChannelWaveform::empty(1, 1, true));
            });
        store.current.set(Some(ChannelWaveform::empty(1, 1, true)));
        store.progress.set(40);
        store.selected_devices.set([1, 2].into_iter().collect());

        store.initialize();

        assert_eq!(store.tested_count(), 0);
        assert!(store.history.get().is_empty());
        assert!(store.historical.get().is_none());
        assert!(store.waveforms.get().is_empty());
        assert!(store.current.get().is_none());
        assert_eq!(store.progress.get(), 0);
        assert_eq!(store.progress_status.get(), PROGRESS_IDLE);
        assert_eq!(store.selected_devices.get().len(), 2);
    }

    #[test]
    fn test_initialize_matrix_only_touches_results() {
        let store = MeasurementStore::default();
        store.results.update(|r| {
            r[5].tested = true;
            r[5].value = 1234;
        });
        store.current.set(Some(ChannelWaveform::empty(1, 6, true)));

        store.initialize_matrix();

        assert_eq!(store.result(1, 6), Some(MeasurementResult::untested(1, 6)));
        assert!(store.current.get().is_some());
    }
}
