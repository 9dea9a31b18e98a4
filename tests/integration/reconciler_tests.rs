//! Reconciliation cycle scenarios

use std::sync::atomic::Ordering;

use serde_json::{json, Value};

use alert_sync::config::ExportConfig;

use crate::common::TestApp;

fn suppressed_alert(fingerprint: &str, silence_id: &str) -> Value {
    json!({
        "fingerprint": fingerprint,
        "status": {"state": "suppressed", "silencedBy": [silence_id]},
        "labels": {"alertname": "HighLatency", "severity": "warn"},
        "annotations": {"summary": "p99 over budget"}
    })
}

fn firing_group(id: &str, fingerprint: &str) -> Value {
    json!({
        "id": id,
        "state": "firing",
        "last_alert": {"payload": {"alerts": [{"fingerprint": fingerprint}]}}
    })
}

#[tokio::test]
async fn test_silenced_firing_alert_is_resolved() {
    let app = TestApp::new().await;
    app.am.set_alerts(vec![suppressed_alert("f1", "s1")]);
    app.am.add_silence("s1", "oncall@co");
    app.irm.set_groups(vec![firing_group("g1", "f1")]);

    app.run_cycle().await.expect("cycle should succeed");

    assert_eq!(app.irm.resolved(), vec!["g1"]);

    let scrape = app.scrape().await;
    assert!(scrape.contains("alert_sync_inconsistencies_found 1"));
    assert!(scrape.contains("alert_sync_inconsistencies_resolved_total 1"));
    assert!(scrape.contains("alert_sync_last_reconciliation_success 1"));

    // Exactly one series, suppressed, joined to its group, value 0 since the
    // alert is not active.
    assert_eq!(app.state.exporter.alert_state_series(), 1);
    assert!(scrape.contains(r#"suppressed="true""#));
    assert!(scrape.contains(r#"alert_group_id="g1""#));
    assert!(scrape.contains(r#"silenced_by="oncall@co""#));
    let series_line = scrape
        .lines()
        .find(|l| l.starts_with("alert_sync_alert_state{"))
        .expect("missing alert_state series");
    assert!(series_line.ends_with(" 0"));
}

#[tokio::test]
async fn test_resolved_group_is_excluded_from_reconciliation_only() {
    let app = TestApp::new().await;
    app.am.set_alerts(vec![suppressed_alert("f1", "s1")]);
    app.am.add_silence("s1", "oncall@co");
    app.irm.set_groups(vec![json!({
        "id": "g1",
        "state": "resolved",
        "last_alert": {"payload": {"alerts": [{"fingerprint": "f1"}]}}
    })]);

    app.run_cycle().await.expect("cycle should succeed");

    assert!(app.irm.resolved().is_empty());

    let scrape = app.scrape().await;
    assert!(scrape.contains("alert_sync_inconsistencies_found 0"));
    // The publish-side index does not exclude resolved groups.
    assert_eq!(app.state.exporter.alert_state_series(), 1);
    assert!(scrape.contains(r#"alert_group_id="g1""#));
}

#[tokio::test]
async fn test_fetch_failure_fails_cycle_and_preserves_series() {
    let app = TestApp::new().await;
    app.am.set_alerts(vec![suppressed_alert("f1", "s1")]);
    app.am.add_silence("s1", "oncall@co");
    app.irm.set_groups(vec![firing_group("g1", "f1")]);

    app.run_cycle().await.expect("first cycle should succeed");
    assert_eq!(app.state.exporter.alert_state_series(), 1);
    let resolves_after_first = app.irm.resolved().len();

    app.am.state.fail_alerts.store(true, Ordering::SeqCst);

    app.run_cycle().await.expect_err("cycle should fail");

    let scrape = app.scrape().await;
    assert!(scrape.contains("alert_sync_reconciliation_failures_total 1"));
    assert!(scrape.contains("alert_sync_last_reconciliation_success 0"));
    // No publish ran: the previous cycle's series are still exported.
    assert_eq!(app.state.exporter.alert_state_series(), 1);
    // No further resolve calls were issued.
    assert_eq!(app.irm.resolved().len(), resolves_after_first);
}

#[tokio::test]
async fn test_per_item_resolve_failure_does_not_fail_cycle() {
    let app = TestApp::new().await;
    app.am.set_alerts(vec![suppressed_alert("f1", "s1")]);
    app.am.add_silence("s1", "oncall@co");
    app.irm.set_groups(vec![firing_group("g1", "f1")]);
    app.irm.state.fail_resolve.store(true, Ordering::SeqCst);

    app.run_cycle().await.expect("cycle should still succeed");

    let scrape = app.scrape().await;
    assert!(scrape.contains("alert_sync_inconsistencies_failed_resolve_total 1"));
    assert!(scrape.contains("alert_sync_last_reconciliation_success 1"));
}

#[tokio::test]
async fn test_empty_am_snapshot_publishes_nothing() {
    let app = TestApp::new().await;
    app.irm.set_groups(vec![firing_group("g1", "f1")]);

    app.run_cycle().await.expect("cycle should succeed");

    assert!(app.irm.resolved().is_empty());
    assert_eq!(app.state.exporter.alert_state_series(), 0);
}

#[tokio::test]
async fn test_empty_irm_snapshot_still_publishes_alerts() {
    let app = TestApp::new().await;
    app.am.set_alerts(vec![
        suppressed_alert("f1", "s1"),
        json!({
            "fingerprint": "f2",
            "status": {"state": "active"},
            "labels": {"alertname": "DiskFull"}
        }),
    ]);
    app.am.add_silence("s1", "oncall@co");

    app.run_cycle().await.expect("cycle should succeed");

    assert!(app.irm.resolved().is_empty());
    assert_eq!(app.state.exporter.alert_state_series(), 2);

    let scrape = app.scrape().await;
    // The active alert exports value 1 with an empty group id.
    let active_line = scrape
        .lines()
        .find(|l| l.contains(r#"fingerprint="f2""#))
        .expect("missing series for f2");
    assert!(active_line.contains(r#"alert_group_id="""#));
    assert!(active_line.ends_with(" 1"));
}

#[tokio::test]
async fn test_group_enrichment_resolves_user_emails() {
    let app = TestApp::new().await;
    app.am.set_alerts(vec![suppressed_alert("f1", "s1")]);
    app.am.add_silence("s1", "oncall@co");
    app.irm.add_user("u1", "ack@co");
    app.irm.set_groups(vec![json!({
        "id": "g1",
        "state": "acknowledged",
        "acknowledged_by": "u1",
        "acknowledged_at": "2026-02-01T10:00:00Z",
        "created_at": "2026-02-01T09:00:00Z",
        "last_alert": {"payload": {"alerts": [{"fingerprint": "f1"}]}}
    })]);

    app.run_cycle().await.expect("cycle should succeed");

    let scrape = app.scrape().await;
    assert!(scrape.contains(r#"acknowledged_by="ack@co""#));
    assert!(scrape.contains(r#"acknowledged_at="2026-02-01T10:00:00+00:00""#));
    assert!(scrape.contains(r#"resolved_by="""#));
    assert!(scrape.contains(r#"resolved_at="""#));
}

#[tokio::test]
async fn test_silence_author_cache_fetches_once() {
    let app = TestApp::new().await;
    app.am.set_alerts(vec![suppressed_alert("f1", "s1")]);
    app.am.add_silence("s1", "oncall@co");
    app.irm.set_groups(vec![]);

    app.run_cycle().await.expect("cycle should succeed");
    app.run_cycle().await.expect("cycle should succeed");

    // Two publishes looked the author up twice, but only the first reached
    // the API.
    assert_eq!(app.am.silence_fetches(), 1);
}

#[tokio::test]
async fn test_user_email_cache_fetches_once() {
    let app = TestApp::new().await;
    app.am.set_alerts(vec![suppressed_alert("f1", "s1")]);
    app.am.add_silence("s1", "oncall@co");
    app.irm.add_user("u1", "ack@co");
    app.irm.set_groups(vec![json!({
        "id": "g1",
        "state": "acknowledged",
        "acknowledged_by": "u1",
        "last_alert": {"payload": {"alerts": [{"fingerprint": "f1"}]}}
    })]);

    app.run_cycle().await.expect("cycle should succeed");
    app.run_cycle().await.expect("cycle should succeed");

    assert_eq!(app.irm.user_fetches(), 1);
}

#[tokio::test]
async fn test_label_schema_is_stable_across_cycles() {
    let app = TestApp::with_export(ExportConfig {
        labels: vec!["severity".to_string()],
        annotations: vec!["summary".to_string()],
    })
    .await;
    app.am.set_alerts(vec![suppressed_alert("f1", "s1")]);
    app.am.add_silence("s1", "oncall@co");
    app.irm.set_groups(vec![firing_group("g1", "f1")]);

    app.run_cycle().await.expect("cycle should succeed");
    let labels_first = series_label_names(&app.scrape().await);

    app.am.set_alerts(vec![json!({
        "fingerprint": "f9",
        "status": {"state": "active"},
        "labels": {}
    })]);
    app.run_cycle().await.expect("cycle should succeed");
    let labels_second = series_label_names(&app.scrape().await);

    assert_eq!(labels_first, labels_second);
    assert!(labels_first.contains(&"severity".to_string()));
    assert!(labels_first.contains(&"summary".to_string()));
}

/// Label names of the first alert_state series in a scrape body
fn series_label_names(scrape: &str) -> Vec<String> {
    let line = scrape
        .lines()
        .find(|l| l.starts_with("alert_sync_alert_state{"))
        .expect("missing alert_state series");
    let inner = &line[line.find('{').unwrap() + 1..line.rfind('}').unwrap()];
    let mut names: Vec<String> = inner
        .split("\",")
        .filter_map(|pair| pair.split('=').next())
        .map(|name| name.trim().to_string())
        .collect();
    names.sort();
    names
}
