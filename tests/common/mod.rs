//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod mock_helpers;

use ats_dashboard::config::TransportConfig;
use std::time::Duration;

/// Create a test timeout duration
pub fn test_timeout() -> Duration {
    Duration::from_secs(5)
}

/// Transport config pointing nowhere, with the standard retry policy
pub fn test_transport_config() -> TransportConfig {
    TransportConfig {
        url: "ws://test.invalid/ws".to_string(),
        ..TransportConfig::default()
    }
}

/// Slightly longer than the default reconnect delay
pub fn past_retry_delay() -> Duration {
    test_transport_config().reconnect_delay() + Duration::from_millis(1)
}
