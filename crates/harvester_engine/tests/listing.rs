use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use harvester_core::{CandidateKey, KeyShape, PostingRecord, StopReason};
use harvester_engine::{
    BlockCause, BlockPhase, ExportOptions, FailureEnvelope, HarvestError, HarvestReport, ListingSink,
    SuccessEnvelope,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn key(id: u32) -> CandidateKey {
    KeyShape::new(r"^/jobs/view/\d+")
        .unwrap()
        .normalize(&format!("https://example.com/jobs/view/{id}/"), None)
        .unwrap()
}

fn record(id: u32, title: &str) -> PostingRecord {
    PostingRecord {
        title: title.to_string(),
        organization: "Ferrous Oy".to_string(),
        description: format!("Description of {title}.\n\nRemote friendly.\n"),
        posted_date: (id == 1).then(|| "2024-05-01".to_string()),
        ..PostingRecord::empty(key(id))
    }
}

#[test]
fn sink_writes_text_and_json_listings() {
    let temp = tempfile::TempDir::new().unwrap();
    let sink = ListingSink::new(temp.path(), ExportOptions::default());
    let records = vec![record(1, "Rust engineer"), record(2, "Platform engineer")];

    let summary = sink
        .write(&records, Some(StopReason::Stagnant), "2024-05-03T10:00:00Z")
        .unwrap();
    assert_eq!(summary.record_count, 2);

    let text = fs::read_to_string(&summary.text_path).unwrap();
    assert!(text.starts_with("harvested_utc: 2024-05-03T10:00:00Z\nstop_reason: stagnant\ncount: 2\n"));
    assert_eq!(text.matches("===== POSTING START =====").count(), 2);
    assert_eq!(text.matches("===== POSTING END =====").count(), 2);
    assert!(text.contains("#1\ntitle: Rust engineer\norganization: Ferrous Oy\nposted: 2024-05-01\nlink: https://example.com/jobs/view/1/\n"));
    assert!(text.contains("posted: -\nlink: https://example.com/jobs/view/2/"));

    let json: Value = serde_json::from_str(&fs::read_to_string(&summary.json_path).unwrap()).unwrap();
    assert_eq!(json["stopReason"], "stagnant");
    assert_eq!(json["count"], 2);
    assert_eq!(json["records"][0]["sourceLink"], "https://example.com/jobs/view/1/");
    assert_eq!(json["records"][0]["postedDate"], "2024-05-01");
    assert_eq!(json["records"][1]["postedDate"], Value::Null);
    assert_eq!(json["records"][1]["contactInfo"], "");
}

#[test]
fn partial_listings_are_marked() {
    let sink = ListingSink::new(&PathBuf::from("unused"), ExportOptions::default());
    let text = sink.render_text(&[], None, "2024-05-03T10:00:00Z");
    assert_eq!(
        text,
        "harvested_utc: 2024-05-03T10:00:00Z\nstop_reason: partial\ncount: 0\n\n"
    );
}

#[test]
fn success_envelope_shape() {
    let report = HarvestReport {
        records: vec![record(1, "Rust engineer")],
        stop_reason: StopReason::MaxResults,
        rounds: 3,
        visited: 7,
        elapsed: Duration::from_millis(1_250),
    };
    let value = serde_json::to_value(SuccessEnvelope::from_report(&report)).unwrap();
    assert_eq!(value["ok"], true);
    assert_eq!(value["count"], 1);
    assert_eq!(value["elapsedMs"], 1_250);
    assert_eq!(value["stopReason"], "max-results");
    assert_eq!(value["records"][0]["title"], "Rust engineer");
}

#[test]
fn failure_envelope_shape() {
    let auth = HarvestError::AuthRequired("landed on /login".into());
    assert_eq!(
        serde_json::to_value(FailureEnvelope::from_error(&auth)).unwrap(),
        json!({
            "ok": false,
            "error": "authentication required: landed on /login",
            "kind": "auth-required",
            "class": "client-fixable",
            "status": 401,
        })
    );

    let blocked = HarvestError::Blocked {
        phase: BlockPhase::Initial,
        cause: BlockCause::Interstitial,
        marker: "page shows \"#captcha-internal\"".into(),
        diagnostics: None,
    };
    let value = serde_json::to_value(FailureEnvelope::from_error(&blocked)).unwrap();
    assert_eq!(value["kind"], "blocked");
    assert_eq!(value["class"], "transient");
    assert_eq!(value["status"], 500);
    assert!(value["error"].as_str().unwrap().starts_with("blocked-initial: "));
}
