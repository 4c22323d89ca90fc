//! Integration tests for decoded frames driving the store
//!
//! Exercises the same path the transport uses (`decode` then
//! `apply_message`) and what a subscribing view observes.

mod common;

use ats_dashboard::protocol::decode;
use ats_dashboard::types::{ChannelKey, MeasurementStatus, WriterStatus};
use ats_dashboard::{GridConfig, MeasurementStore};
use common::builders::{batch_frame, status_frame, UpdateBuilder};

fn feed(store: &MeasurementStore, frame: &str) {
    store.apply_message(decode(frame).unwrap());
}

#[tokio::test]
async fn test_subscribers_see_each_update() {
    let store = MeasurementStore::default();
    let mut current = store.current.subscribe();
    let mut results = store.results.subscribe();

    feed(&store, &UpdateBuilder::new(3, 7).voltages(&[0, 65536, 32768]).frame());

    assert!(current.has_changed().unwrap());
    assert!(results.has_changed().unwrap());
    let waveform = current.borrow_and_update().clone().unwrap();
    assert_eq!((waveform.device, waveform.channel), (3, 7));
    assert_eq!(waveform.voltages.len(), 3);
    assert_eq!(waveform.voltages[2].time, 2);

    let slot = results
        .borrow_and_update()
        .iter()
        .find(|r| r.device == 3 && r.channel == 7)
        .copied()
        .unwrap();
    assert_eq!(slot.value, 2500);
    assert!(slot.tested);
}

#[test]
fn test_select_previous_result_after_stream() {
    let store = MeasurementStore::default();
    feed(
        &store,
        &batch_frame(vec![
            UpdateBuilder::new(1, 1).voltages(&[1000, 2000]),
            UpdateBuilder::new(1, 2).voltages(&[13107]).passed(false),
        ]),
    );
    assert_eq!(store.current.get().unwrap().channel, 2);

    // Clicking the first slot brings its cached waveform back
    let first = store.result(1, 1).unwrap();
    store.select_result(first);
    assert_eq!(store.selected_result.get(), Some(first));
    assert_eq!(store.current.get(), store.waveform(ChannelKey::new(1, 1)));

    // A slot with no data yet shows an empty series
    let untouched = store.result(12, 18).unwrap();
    store.select_result(untouched);
    let current = store.current.get().unwrap();
    assert!(current.voltages.is_empty());
    assert_eq!((current.device, current.channel), (12, 18));
}

#[test]
fn test_full_run_status_sequence() {
    let store = MeasurementStore::new(GridConfig {
        devices: 2,
        channels: 2,
    });
    store.begin_measurement([1, 2], [1, 2]);
    assert_eq!(store.progress_status.get(), "Measuring 0%");

    feed(&store, &status_frame("in_progress"));
    feed(&store, &UpdateBuilder::new(1, 1).frame());
    assert_eq!(store.progress.get(), 25);
    assert_eq!(store.progress_status.get(), "Measuring 25%");

    feed(
        &store,
        &batch_frame(vec![
            UpdateBuilder::new(1, 2),
            UpdateBuilder::new(2, 1),
            UpdateBuilder::new(2, 2),
        ]),
    );
    assert_eq!(store.progress.get(), 100);
    assert_eq!(store.progress_status.get(), "Measurement complete");

    feed(&store, &status_frame("writing"));
    assert_eq!(store.writer_status.get(), WriterStatus::Writing);
    assert_eq!(store.measurement_status.get(), MeasurementStatus::Running);

    feed(&store, &status_frame("completed"));
    assert_eq!(store.writer_status.get(), WriterStatus::Waiting);
    assert_eq!(store.measurement_status.get(), MeasurementStatus::Stopped);
    assert_eq!(store.progress_status.get(), "Measurement complete");
}

#[test]
fn test_legacy_frames_drive_store() {
    let store = MeasurementStore::new(GridConfig {
        devices: 1,
        channels: 2,
    });

    feed(
        &store,
        r#"{"type":"measurement_results","results":[
            {"device":1,"channel":1,"value":1200,"passed":true,"tested":true},
            {"device":1,"channel":2,"value":0,"passed":false,"tested":false}
        ]}"#,
    );
    assert_eq!(store.tested_count(), 1);
    assert_eq!(store.result(1, 1).unwrap().value, 1200);

    feed(&store, r#"{"type":"measurement_status","status":"paused"}"#);
    assert_eq!(store.measurement_status.get(), MeasurementStatus::Paused);

    // Wrong matrix size is dropped, leaving the previous matrix
    feed(
        &store,
        r#"{"type":"measurement_results","results":[
            {"device":1,"channel":1,"value":0,"passed":false,"tested":false}
        ]}"#,
    );
    assert_eq!(store.results.get().len(), 2);
    assert_eq!(store.tested_count(), 1);
}

#[test]
fn test_initialize_between_runs() {
    let store = MeasurementStore::default();
    feed(&store, &UpdateBuilder::new(5, 5).frame());
    feed(
        &store,
        r#"{"status":"measurementHistory","history":[{"timestamp":1700000000,"deviceCount":12,"channelCount":18,"status":"completed"}]}"#,
    );
    assert_eq!(store.history.get().len(), 1);
    assert_eq!(
        store.history.get()[0].started_at().unwrap().timestamp(),
        1_700_000_000
    );

    store.initialize();

    assert_eq!(store.tested_count(), 0);
    assert!(store.history.get().is_empty());
    assert!(store.waveform(ChannelKey::new(5, 5)).is_none());
    assert_eq!(store.results.get().len(), 12 * 18);
}
