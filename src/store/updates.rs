//! Update and selection operations on the store
//!
//! These are the only entry points the transport client uses to write
//! decoded server frames into [`MeasurementStore`].

use super::{MeasurementStore, PROGRESS_IDLE};
use crate::error::{DashboardError, Result, ResultExt};
use crate::protocol::{InboundMessage, LegacyMessage, MeasurementUpdate, StatusMessage};
use crate::types::{
    ChannelKey, ChannelWaveform, HistoricalRun, HistoryEntry, MeasurementResult,
    MeasurementStatus, WriterStatus,
};
use std::collections::BTreeSet;

const PROGRESS_DONE: &str = "Measurement complete";
const PROGRESS_STOPPED: &str = "Stopped";

impl MeasurementStore {
    /// Apply a decoded inbound frame
    pub fn apply_message(&self, message: InboundMessage) {
        match message {
            InboundMessage::Measurement(update) => self.apply_measurement_update(&update),
            InboundMessage::Batch { updates, skipped } => {
                if skipped > 0 {
                    tracing::debug!("Skipped {} non-measurement entries in batch", skipped);
                }
                for update in &updates {
                    self.apply_measurement_update(update);
                }
            }
            InboundMessage::Status(status) => self.apply_status(status),
            InboundMessage::Legacy(legacy) => self.apply_legacy(legacy),
        }
    }

    /// Scale a raw measurement and write it to the current view, the
    /// matching matrix slot and the waveform cache
    pub fn apply_measurement_update(&self, update: &MeasurementUpdate) {
        let waveform =
            ChannelWaveform::from_raw(update.device, update.channel, &update.voltages, update.passed);
        let last = waveform.last_value();

        self.current.set(Some(waveform.clone()));

        let mut matched = false;
        self.results.update(|results| {
            if let Some(slot) = results
                .iter_mut()
                .find(|r| r.device == update.device && r.channel == update.channel)
            {
                if let Some(value) = last {
                    slot.value = value;
                }
                slot.passed = update.passed;
                slot.tested = true;
                matched = true;
            }
        });
        if !matched {
            tracing::trace!(
                "No matrix slot for device {} channel {}",
                update.device,
                update.channel
            );
        }

        self.waveforms.update(|cache| {
            cache.insert(waveform.key(), waveform);
        });

        self.refresh_progress();
    }

    /// Select a result slot and bring its waveform into view
    ///
    /// Falls back to an empty waveform when nothing has been received for
    /// the slot yet.
    pub fn select_result(&self, result: MeasurementResult) {
        self.selected_result.set(Some(result));
        let waveform = self
            .waveform(result.key())
            .unwrap_or_else(|| ChannelWaveform::empty(result.device, result.channel, result.passed));
        self.current.set(Some(waveform));
    }

    /// Record the selection for a new run and reset progress
    pub fn begin_measurement(
        &self,
        devices: impl IntoIterator<Item = u32>,
        channels: impl IntoIterator<Item = u32>,
    ) {
        self.selected_devices.set(devices.into_iter().collect());
        self.selected_channels.set(channels.into_iter().collect());
        self.measurement_status.set(MeasurementStatus::Running);
        self.progress.set(0);
        self.progress_status.set(progress_text(0));
    }

    /// Replace the whole results matrix
    ///
    /// The replacement must hold exactly one entry per grid slot. Anything
    /// else (wrong size, duplicate or off-grid slots) is rejected and the
    /// current matrix is kept. Accepted entries are stored device-major.
    pub fn replace_results(&self, mut results: Vec<MeasurementResult>) -> Result<()> {
        let expected = self.grid.slot_count();
        if results.len() != expected {
            return Err(DashboardError::Protocol(format!(
                "results matrix has {} entries, expected {}",
                results.len(),
                expected
            )));
        }

        let keys: BTreeSet<ChannelKey> = results.iter().map(MeasurementResult::key).collect();
        if keys.len() != expected {
            return Err(DashboardError::Protocol(format!(
                "results matrix repeats {} slot(s)",
                expected - keys.len()
            )));
        }
        if let Some(stray) = keys.iter().find(|k| !self.in_grid(k)) {
            return Err(DashboardError::Protocol(format!(
                "results matrix has slot {} outside the {}x{} grid",
                stray, self.grid.devices, self.grid.channels
            )));
        }

        results.sort_by_key(MeasurementResult::key);
        self.results.set(results);
        self.refresh_progress();
        Ok(())
    }

    /// Store the waveforms of a past run
    pub fn replace_historical(&self, run: HistoricalRun) {
        tracing::debug!(
            "Received {} stored samples across {} channels for run {:?}",
            run.sample_count(),
            run.waveforms.len(),
            run.history_id
        );
        self.historical.set(Some(run));
    }

    fn in_grid(&self, key: &ChannelKey) -> bool {
        (1..=self.grid.devices).contains(&key.device)
            && (1..=self.grid.channels).contains(&key.channel)
    }

    /// Replace the history list with a server snapshot
    pub fn replace_history(&self, history: Vec<HistoryEntry>) {
        tracing::debug!("Received {} history entries", history.len());
        self.history.set(history);
    }

    /// Set the measurement status, updating progress text on stop
    pub fn set_measurement_status(&self, status: MeasurementStatus) {
        self.measurement_status.set(status);
        if status == MeasurementStatus::Stopped && self.progress.get() < 100 {
            let idle = self.progress_status.with(|s| s == PROGRESS_IDLE);
            if !idle {
                self.progress_status.set(PROGRESS_STOPPED.to_string());
            }
        }
    }

    fn apply_status(&self, status: StatusMessage) {
        match status {
            StatusMessage::InProgress => self.set_measurement_status(MeasurementStatus::Running),
            StatusMessage::Writing => self.writer_status.set(WriterStatus::Writing),
            StatusMessage::Completed => {
                self.set_measurement_status(MeasurementStatus::Stopped);
                self.writer_status.set(WriterStatus::Waiting);
            }
            StatusMessage::MeasurementHistory(history) => self.replace_history(history),
            StatusMessage::HistoricalData {
                history_id,
                samples,
            } => {
                let run = HistoricalRun::from_samples(history_id, &samples);
                let dropped = samples.len() - run.sample_count();
                if dropped > 0 {
                    tracing::debug!("Dropped {} incomplete stored samples", dropped);
                }
                self.replace_historical(run);
            }
            StatusMessage::Error(message) => {
                tracing::warn!(
                    "Server reported an error: {}",
                    message.as_deref().unwrap_or("(no message)")
                );
            }
            StatusMessage::Other(status) => {
                tracing::debug!("Ignoring unrecognized status '{}'", status);
            }
        }
    }

    fn apply_legacy(&self, legacy: LegacyMessage) {
        match legacy {
            LegacyMessage::MeasurementResults { results } => {
                if let Err(e) = self
                    .replace_results(results)
                    .context("Dropping legacy results frame")
                {
                    tracing::warn!("{}", e);
                }
            }
            LegacyMessage::MeasurementStatus { status } => match status.parse() {
                Ok(status) => self.set_measurement_status(status),
                Err(e) => tracing::warn!("{}", e),
            },
        }
    }

    /// Recompute progress over the selected slots
    fn refresh_progress(&self) {
        let devices = self.selected_devices.get();
        let channels = self.selected_channels.get();
        let total = devices.len() * channels.len();
        if total == 0 {
            return;
        }

        let done = self.results.with(|results| {
            results
                .iter()
                .filter(|r| r.tested && in_selection(r, &devices, &channels))
                .count()
        });
        let percent = ((done as f64 / total as f64) * 100.0).round().min(100.0) as u8;

        self.progress.set(percent);
        self.progress_status.set(progress_text(percent));
    }
}

fn in_selection(result: &MeasurementResult, devices: &BTreeSet<u32>, channels: &BTreeSet<u32>) -> bool {
    devices.contains(&result.device) && channels.contains(&result.channel)
}

fn progress_text(percent: u8) -> String {
    if percent >= 100 {
        PROGRESS_DONE.to_string()
    } else {
        format!("Measuring {}%", percent)
    }
}
