mod common;

use common::{at_ms, at_secs, batch_at_ms, snapshot};
use trackline::config::IngestConfig;
use trackline::{EntityEvent, LiveTracker, MalformedBatch, TelemetryBatch};

fn removed(events: &[EntityEvent], entity_id: &str) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, EntityEvent::Removed { .. }) && e.entity_id() == entity_id)
        .count()
}

#[test]
fn test_out_of_date_report_leaves_entity_untouched() {
    let mut tracker = LiveTracker::new(IngestConfig::default());
    tracker
        .apply_batch(batch_at_ms(10_000, vec![snapshot("a1", 40.0, -105.0, 90.0)]))
        .unwrap();

    // Newer batch, but the report inside it predates what we already have
    let mut late = snapshot("a1", 41.0, -104.0, 180.0);
    late.report_timestamp = Some(at_ms(5_000));
    let outcome = tracker.apply_batch(batch_at_ms(20_000, vec![late])).unwrap();

    assert_eq!(outcome.stale, 1);
    assert!(outcome.events.is_empty());

    let state = tracker.get("a1").unwrap();
    assert_eq!(state.latest_position.lat, 40.0);
    assert_eq!(state.latest_position.lon, -105.0);
    assert_eq!(state.heading_deg, 90.0);
    assert_eq!(state.last_accepted_timestamp, at_ms(10_000));

    // Still tracked on the next cycle
    let outcome = tracker
        .apply_batch(batch_at_ms(30_000, vec![snapshot("a1", 40.1, -105.0, 90.0)]))
        .unwrap();
    assert!(tracker.contains("a1"));
    assert_eq!(removed(&outcome.events, "a1"), 0);
    assert_eq!(tracker.get("a1").unwrap().latest_position.lat, 40.1);
}

#[test]
fn test_accepted_timestamps_strictly_increase() {
    let mut tracker = LiveTracker::new(IngestConfig::default());
    let offsets_ms = [0, 1_000, 1_000, 500, 3_000, 2_999, 3_001, 10_000, 9_000];

    let mut accepted = Vec::new();
    for (i, offset) in offsets_ms.iter().enumerate() {
        let mut report = snapshot("a1", 40.0 + i as f64 * 0.01, -105.0, 90.0);
        report.report_timestamp = Some(at_ms(*offset));
        // Batch clock keeps moving even when reports do not
        tracker
            .apply_batch(batch_at_ms(20_000 + i as i64 * 1_000, vec![report]))
            .unwrap();

        let last = tracker.get("a1").unwrap().last_accepted_timestamp;
        if accepted.last() != Some(&last) {
            accepted.push(last);
        }
    }

    assert_eq!(
        accepted,
        vec![at_ms(0), at_ms(1_000), at_ms(3_000), at_ms(3_001), at_ms(10_000)]
    );
    assert!(accepted.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_absent_entity_is_evicted_exactly_once() {
    let mut tracker = LiveTracker::new(IngestConfig::default());
    tracker
        .apply_batch(TelemetryBatch::new(
            at_secs(0),
            vec![snapshot("a1", 40.0, -105.0, 90.0), snapshot("b2", 41.0, -100.0, 270.0)],
        ))
        .unwrap();
    assert_eq!(tracker.len(), 2);

    let first = tracker
        .apply_batch(TelemetryBatch::new(at_secs(10), vec![snapshot("a1", 40.0, -104.9, 90.0)]))
        .unwrap();
    assert_eq!(removed(&first.events, "b2"), 1);
    assert!(!tracker.contains("b2"));
    assert!(tracker.get("b2").is_none());

    for secs in [20, 30, 40] {
        let outcome = tracker
            .apply_batch(TelemetryBatch::new(
                at_secs(secs),
                vec![snapshot("a1", 40.0, -104.8, 90.0)],
            ))
            .unwrap();
        assert_eq!(removed(&outcome.events, "b2"), 0);
        assert!(outcome.events.iter().all(|e| e.entity_id() != "b2"));
    }
    assert_eq!(tracker.entity_ids(), vec!["a1"]);

    // Coming back is a fresh sighting
    let outcome = tracker
        .apply_batch(TelemetryBatch::new(
            at_secs(50),
            vec![snapshot("a1", 40.0, -104.7, 90.0), snapshot("b2", 41.0, -99.0, 270.0)],
        ))
        .unwrap();
    assert!(outcome.events.contains(&EntityEvent::Added {
        entity_id: "b2".to_string()
    }));
}

#[test]
fn test_malformed_batch_changes_nothing() {
    let mut tracker = LiveTracker::new(IngestConfig::default());
    tracker
        .apply_batch(batch_at_ms(0, vec![snapshot("a1", 40.0, -105.0, 90.0)]))
        .unwrap();

    let missing_list = TelemetryBatch {
        as_of_timestamp: Some(at_ms(1_000)),
        snapshots: None,
    };
    assert!(matches!(
        tracker.apply_batch(missing_list),
        Err(MalformedBatch::MissingSnapshots)
    ));

    let missing_clock = TelemetryBatch {
        as_of_timestamp: None,
        snapshots: Some(Vec::new()),
    };
    assert!(tracker.apply_batch(missing_clock).is_err());

    // Neither rejection evicted anything
    assert!(tracker.contains("a1"));
    assert_eq!(tracker.get("a1").unwrap().last_accepted_timestamp, at_ms(0));
}

#[test]
fn test_invalid_position_does_not_keep_entity_alive() {
    let mut tracker = LiveTracker::new(IngestConfig::default());
    tracker
        .apply_batch(batch_at_ms(0, vec![snapshot("a1", 40.0, -105.0, 90.0)]))
        .unwrap();

    let outcome = tracker
        .apply_batch(batch_at_ms(1_000, vec![snapshot("a1", 95.0, -105.0, 90.0)]))
        .unwrap();
    assert_eq!(outcome.discarded, 1);
    assert_eq!(removed(&outcome.events, "a1"), 1);
    assert!(tracker.is_empty());
}

#[test]
fn test_batch_json_from_feed() {
    let json = r#"{
        "asOfTimestamp": "2025-01-15T12:00:05Z",
        "snapshots": [
            {"entityId": "a1", "lat": 40.0, "lon": -105.0, "altitudeFt": 0,
             "groundSpeedKt": 12, "verticalSpeedFpm": 0, "headingDeg": 350},
            {"entityId": "b2", "lat": 41.0, "lon": -100.0, "altitudeFt": 35000,
             "groundSpeedKt": 460, "verticalSpeedFpm": 0, "headingDeg": 270,
             "reportTimestamp": "2025-01-15T12:00:01Z"}
        ]
    }"#;
    let batch: TelemetryBatch = serde_json::from_str(json).unwrap();

    let mut tracker = LiveTracker::new(IngestConfig::default());
    let outcome = tracker.apply_batch(batch).unwrap();
    assert_eq!(outcome.accepted, 2);

    assert_eq!(tracker.get("a1").unwrap().last_accepted_timestamp, at_secs(5));
    assert_eq!(tracker.get("b2").unwrap().last_accepted_timestamp, at_secs(1));
}
