//! Test data builders for creating inbound frames

use ats_dashboard::MeasurementUpdate;
use serde_json::json;

/// Builder for measurement updates and their wire frames
pub struct UpdateBuilder {
    device: u32,
    channel: u32,
    voltages: Vec<f64>,
    passed: bool,
}

impl UpdateBuilder {
    pub fn new(device: u32, channel: u32) -> Self {
        Self {
            device,
            channel,
            voltages: vec![32768.0],
            passed: true,
        }
    }

    pub fn voltages(mut self, raw: &[u32]) -> Self {
        self.voltages = raw.iter().map(|&v| f64::from(v)).collect();
        self
    }

    pub fn passed(mut self, passed: bool) -> Self {
        self.passed = passed;
        self
    }

    pub fn build(self) -> MeasurementUpdate {
        MeasurementUpdate {
            device: self.device,
            channel: self.channel,
            voltages: self.voltages,
            passed: self.passed,
        }
    }

    /// Single-update JSON frame
    pub fn frame(self) -> String {
        serde_json::to_string(&self.build()).unwrap()
    }
}

/// Batch frame as sent by the server while a run is in progress
pub fn batch_frame(updates: Vec<UpdateBuilder>) -> String {
    let results: Vec<_> = updates.into_iter().map(UpdateBuilder::build).collect();
    json!({ "status": "in_progress", "results": results }).to_string()
}

/// Status-only frame
pub fn status_frame(status: &str) -> String {
    json!({ "status": status }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_builder() {
        let update = UpdateBuilder::new(2, 5)
            .voltages(&[1, 2, 3])
            .passed(false)
            .build();

        assert_eq!(update.device, 2);
        assert_eq!(update.channel, 5);
        assert_eq!(update.voltages, vec![1.0, 2.0, 3.0]);
        assert!(!update.passed);
    }
}
