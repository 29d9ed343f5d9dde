// End-to-end assessment scenarios against the public SDK surface.
// All timing-sensitive paths run under a ManualClock so results are
// reproducible regardless of wall time.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use novin::{ManualClock, NovinSdk, SdkConfig, ThreatLevel};

fn sdk_at(hour: u32) -> (Arc<ManualClock>, NovinSdk) {
    let clock = ManualClock::starting_at(Utc.with_ymd_and_hms(2025, 6, 2, hour, 0, 0).unwrap());
    let sdk = NovinSdk::initialize_with_clock(SdkConfig::default(), clock.clone()).unwrap();
    (clock, sdk)
}

#[test]
fn glassbreak_away_high_crime_is_critical_or_elevated() {
    let (_clock, sdk) = sdk_at(2);
    let result = sdk
        .assess_blocking(
            r#"{"home_mode":"away",
                "events":[{"type":"glassbreak","confidence":0.98}],
                "crime_context":{"crime_rate_24h":0.45}}"#,
        )
        .unwrap();
    assert!(
        result.threat_level >= ThreatLevel::Elevated,
        "got {}",
        result.threat_level
    );
    assert!(result.confidence >= 0.7, "confidence={}", result.confidence);
}

#[test]
fn pet_at_home_low_crime_stays_low() {
    let (_clock, sdk) = sdk_at(14);
    let result = sdk
        .assess_blocking(
            r#"{"home_mode":"home",
                "events":[{"type":"pet","confidence":0.70}],
                "crime_context":{"crime_rate_24h":0.02}}"#,
        )
        .unwrap();
    assert!(result.threat_level <= ThreatLevel::Standard);
}

#[test]
fn fire_is_critical_and_fast() {
    let (_clock, sdk) = sdk_at(14);
    let result = sdk
        .assess_blocking(r#"{"home_mode":"home","events":[{"type":"fire","confidence":0.98}]}"#)
        .unwrap();
    assert_eq!(result.threat_level, ThreatLevel::Critical);
    assert!(result.processing_time_ms < 200.0);
}

#[test]
fn doorbell_then_quiet_motion_is_package_delivery() {
    let (clock, sdk) = sdk_at(14);
    sdk.assess_blocking(
        r#"{"home_mode":"home","location":"front_door",
            "events":[{"type":"doorbell","confidence":0.9}]}"#,
    )
    .unwrap();
    clock.advance(Duration::seconds(5));
    let result = sdk
        .assess_blocking(
            r#"{"home_mode":"home","location":"front_door",
                "events":[{"type":"motion","confidence":0.9}]}"#,
        )
        .unwrap();

    let record = sdk.find_audit_record(result.request_id).unwrap();
    assert_eq!(
        record.chain_pattern.map(|p| p.to_string()),
        Some("package_delivery".to_string())
    );
    assert!(result.threat_level <= ThreatLevel::Standard);
    assert!(result.summary.unwrap().to_lowercase().contains("delivery"));
}

#[test]
fn glass_then_motion_is_active_break_in() {
    let (clock, sdk) = sdk_at(22);
    sdk.assess_blocking(
        r#"{"home_mode":"away","location":"living_room",
            "events":[{"type":"glassbreak","confidence":0.95}]}"#,
    )
    .unwrap();
    clock.advance(Duration::seconds(3));
    let result = sdk
        .assess_blocking(
            r#"{"home_mode":"away","location":"living_room",
                "events":[{"type":"motion","confidence":0.9}]}"#,
        )
        .unwrap();

    let record = sdk.find_audit_record(result.request_id).unwrap();
    assert_eq!(
        record.chain_pattern.map(|p| p.to_string()),
        Some("active_break_in".to_string())
    );
    assert!(result.confidence >= 0.95);
    assert!(result.threat_level >= ThreatLevel::Elevated);
}

#[test]
fn outputs_are_always_bounded() {
    let (_clock, sdk) = sdk_at(3);
    let bodies = [
        r#"{"home_mode":"away","events":[{"type":"glassbreak","confidence":1.0}],"crime_context":{"crime_rate_24h":1.0,"nearby_incidents":10}}"#,
        r#"{"home_mode":"home","events":[{"type":"pet","confidence":0.0}]}"#,
        r#"{"events":[{"type":"thermostat","confidence":0.5}]}"#,
        r#"{"home_mode":"vacation","events":[{"type":"window","confidence":0.6},{"type":"motion","confidence":0.7}]}"#,
    ];
    for body in bodies {
        let result = sdk.assess_blocking(body).unwrap();
        assert!((0.0..=1.0).contains(&result.confidence));
        assert!(matches!(
            result.threat_level,
            ThreatLevel::Low | ThreatLevel::Standard | ThreatLevel::Elevated | ThreatLevel::Critical
        ));
    }
}

#[test]
fn adding_glassbreak_never_lowers_the_score() {
    // two independent instances so the chain buffer cannot bleed between runs
    let base = r#"{"home_mode":"away","events":[{"type":"motion","confidence":0.9}]}"#;
    let with_glass = r#"{"home_mode":"away","events":[{"type":"motion","confidence":0.9},{"type":"glassbreak","confidence":0.9}]}"#;

    let (_c1, sdk1) = sdk_at(2);
    let (_c2, sdk2) = sdk_at(2);
    let a = sdk1.assess_blocking(base).unwrap();
    let b = sdk2.assess_blocking(with_glass).unwrap();

    let score = |sdk: &NovinSdk, r: &novin::SecurityAssessment| {
        sdk.find_audit_record(r.request_id).unwrap().final_score
    };
    assert!(score(&sdk2, &b) >= score(&sdk1, &a));
}

#[test]
fn identical_requests_assess_identically() {
    let body = r#"{"home_mode":"away","events":[{"type":"door","confidence":0.85}],"crime_context":{"crime_rate_24h":0.3}}"#;
    let (_c1, sdk1) = sdk_at(23);
    let (_c2, sdk2) = sdk_at(23);
    let a = sdk1.assess_blocking(body).unwrap();
    let b = sdk2.assess_blocking(body).unwrap();
    assert_eq!(a.threat_level, b.threat_level);
    assert_eq!(a.confidence, b.confidence);
    assert_eq!(a.reasoning, b.reasoning);
    let fa = sdk1.find_audit_record(a.request_id).unwrap().final_score;
    let fb = sdk2.find_audit_record(b.request_id).unwrap().final_score;
    assert_eq!(fa, fb);
}

#[test]
fn input_hash_ignores_whitespace_and_key_order() {
    let (_clock, sdk) = sdk_at(10);
    let compact = r#"{"events":[{"confidence":0.9,"type":"motion"}],"home_mode":"home"}"#;
    let spaced = r#"{ "home_mode": "home", "events": [ { "type": "motion", "confidence": 0.9 } ] }"#;
    let a = sdk.assess_blocking(compact).unwrap();
    let b = sdk.assess_blocking(spaced).unwrap();
    let ha = sdk.find_audit_record(a.request_id).unwrap().input_hash;
    let hb = sdk.find_audit_record(b.request_id).unwrap().input_hash;
    assert_eq!(ha, hb);
    assert_eq!(ha.len(), 64); // sha-256 hex
}

#[test]
fn every_assessment_writes_exactly_one_audit_record() {
    let (_clock, sdk) = sdk_at(9);
    let body = r#"{"home_mode":"home","events":[{"type":"motion","confidence":0.5}]}"#;
    for _ in 0..7 {
        sdk.assess_blocking(body).unwrap();
    }
    let export: serde_json::Value = serde_json::from_str(&sdk.export_audit_trails()).unwrap();
    assert_eq!(export.as_array().unwrap().len(), 7);
}

#[test]
fn audit_ring_is_bounded() {
    let clock = ManualClock::starting_at(Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap());
    let config = SdkConfig {
        audit_capacity: 50,
        max_tokens: 10_000.0,
        refill_rate: 10_000.0,
        ..Default::default()
    };
    let sdk = NovinSdk::initialize_with_clock(config, clock).unwrap();
    let body = r#"{"home_mode":"home","events":[{"type":"motion","confidence":0.5}]}"#;
    for _ in 0..120 {
        sdk.assess_blocking(body).unwrap();
    }
    let export: serde_json::Value = serde_json::from_str(&sdk.export_audit_trails()).unwrap();
    assert!(export.as_array().unwrap().len() <= 50);
}

#[test]
fn feedback_dampens_repeat_offenders() {
    let (_clock, sdk) = sdk_at(22);
    let body = r#"{"home_mode":"away","events":[{"type":"motion","confidence":0.9}],"crime_context":{"crime_rate_24h":0.4}}"#;
    let before = sdk.assess_blocking(body).unwrap();
    let before_score = sdk.find_audit_record(before.request_id).unwrap().final_score;

    for _ in 0..25 {
        sdk.record_feedback("motion", true, None);
    }
    let after = sdk.assess_blocking(body).unwrap();
    let after_score = sdk.find_audit_record(after.request_id).unwrap().final_score;
    assert!(
        after_score < before_score,
        "dampening should lower the score: {before_score} → {after_score}"
    );
}

#[test]
fn user_patterns_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::starting_at(Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap());
    let config = SdkConfig {
        state_dir: Some(dir.path().to_path_buf()),
        ..Default::default()
    };
    {
        let sdk = NovinSdk::initialize_with_clock(config.clone(), clock.clone()).unwrap();
        for _ in 0..7 {
            sdk.record_feedback("motion", true, None);
        }
        // sdk drop joins the persist worker
    }
    let sdk = NovinSdk::initialize_with_clock(config, clock).unwrap();
    let body = r#"{"home_mode":"away","events":[{"type":"motion","confidence":0.9}],"crime_context":{"crime_rate_24h":0.4}}"#;
    let result = sdk.assess_blocking(body).unwrap();
    let record = sdk.find_audit_record(result.request_id).unwrap();
    assert!((record.temporal.dampening - 0.85).abs() < 1e-9);
}

#[test]
fn audit_trail_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::starting_at(Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap());
    let config = SdkConfig {
        state_dir: Some(dir.path().to_path_buf()),
        ..Default::default()
    };
    let first_id;
    {
        let sdk = NovinSdk::initialize_with_clock(config.clone(), clock.clone()).unwrap();
        let result = sdk
            .assess_blocking(r#"{"home_mode":"home","events":[{"type":"door","confidence":0.8}]}"#)
            .unwrap();
        first_id = result.request_id;
    }
    let sdk = NovinSdk::initialize_with_clock(config, clock).unwrap();
    assert!(sdk.find_audit_record(first_id).is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn async_surface_matches_blocking() {
    let (_clock, sdk) = sdk_at(2);
    let body = r#"{"home_mode":"away","events":[{"type":"glassbreak","confidence":0.98}]}"#;
    let async_result = sdk.assess(body).await.unwrap();
    let blocking_result = sdk.assess_blocking(body).unwrap();
    assert_eq!(async_result.threat_level, blocking_result.threat_level);
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_assessments_stay_consistent() {
    let (_clock, sdk) = sdk_at(22);
    let mut handles = Vec::new();
    for i in 0..32 {
        let sdk = sdk.clone();
        handles.push(tokio::spawn(async move {
            let body = format!(
                r#"{{"home_mode":"away","location":"zone_{}","events":[{{"type":"motion","confidence":0.8}}]}}"#,
                i % 4
            );
            sdk.assess(body).await
        }));
    }
    for handle in handles {
        let result = handle.await.unwrap().unwrap();
        assert!((0.0..=1.0).contains(&result.confidence));
    }
    assert_eq!(sdk.get_health().total_assessments, 32);
}

#[test]
fn sequential_burst_smoke() {
    let clock = ManualClock::starting_at(Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap());
    let config = SdkConfig {
        max_tokens: 1000.0,
        refill_rate: 1000.0,
        ..Default::default()
    };
    let sdk = NovinSdk::initialize_with_clock(config, clock.clone()).unwrap();
    let body = r#"{"home_mode":"away","events":[{"type":"motion","confidence":0.8}],"crime_context":{"crime_rate_24h":0.3}}"#;
    for _ in 0..500 {
        clock.advance(Duration::milliseconds(10));
        sdk.assess_blocking(body).unwrap();
    }
    let health = sdk.get_health();
    assert_eq!(health.total_assessments, 500);
    assert!(health.avg_processing_ms < 300.0, "avg={}", health.avg_processing_ms);
    assert_eq!(health.error_count, 0);
}

#[test]
fn pi_serialization_has_sorted_keys() {
    let (_clock, sdk) = sdk_at(10);
    let result = sdk
        .assess_blocking(r#"{"home_mode":"home","events":[{"type":"motion","confidence":0.5}]}"#)
        .unwrap();
    let pi = result.to_pi("full");
    let value: serde_json::Value = serde_json::from_str(&pi).unwrap();
    assert_eq!(value["threat"]["level"], "low");
    // canonical encoding: top-level keys appear in sorted order
    let event_pos = pi.find("\"event_type\"").unwrap();
    let meta_pos = pi.find("\"meta\"").unwrap();
    let processing_pos = pi.find("\"processing\"").unwrap();
    let threat_pos = pi.find("\"threat\"").unwrap();
    assert!(event_pos < meta_pos && meta_pos < processing_pos && processing_pos < threat_pos);
}
