// novin/src/analyzers/features.rs
//
// Feature extraction: request → NamedFeatures, every field clamped to its
// documented range at extraction time so nothing non-finite can reach the
// scorers. Cyclic temporal encodings come from precomputed 24/7/12-entry
// tables. extract_vector projects the named features into a fixed 16384-slot
// array via MurmurHash3-32 (seed 0) for downstream consumers that want a
// stable dense form.

use std::sync::OnceLock;

use chrono::{DateTime, Datelike, Timelike, Utc};

use crate::clock::SharedClock;
use crate::events::{AssessmentRequest, EventKind};
use crate::hashing::feature_slot;

pub const VECTOR_SIZE: usize = 16384;

// ── Cyclic encoding tables ────────────────────────────────────────────────────

static HOUR_TABLE: OnceLock<[(f64, f64); 24]> = OnceLock::new();
static WEEKDAY_TABLE: OnceLock<[(f64, f64); 7]> = OnceLock::new();
static MONTH_TABLE: OnceLock<[(f64, f64); 12]> = OnceLock::new();

fn cyclic<const N: usize>() -> [(f64, f64); N] {
    let mut table = [(0.0, 0.0); N];
    for (i, entry) in table.iter_mut().enumerate() {
        let theta = 2.0 * std::f64::consts::PI * i as f64 / N as f64;
        *entry = (theta.sin(), theta.cos());
    }
    table
}

// Hour phase is noon-centered (midnight → cos −1) so that the night band
// 20:00–04:00 is exactly hour_cos < −0.5.
fn hour_encoding(hour: u32) -> (f64, f64) {
    HOUR_TABLE.get_or_init(cyclic::<24>)[(hour as usize + 12) % 24]
}

fn weekday_encoding(weekday: u32) -> (f64, f64) {
    WEEKDAY_TABLE.get_or_init(cyclic::<7>)[weekday as usize % 7]
}

fn month_encoding(month0: u32) -> (f64, f64) {
    MONTH_TABLE.get_or_init(cyclic::<12>)[month0 as usize % 12]
}

fn clamp01(v: f64) -> f64 {
    if v.is_finite() {
        v.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

// ── Named features ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamedFeatures {
    // temporal
    pub hour_sin:               f64,
    pub hour_cos:               f64,
    pub weekday_sin:            f64,
    pub weekday_cos:            f64,
    pub month_sin:              f64,
    pub month_cos:              f64,
    pub is_weekend:             f64,
    pub hours_since_last_event: f64,
    // spatial
    pub latitude_norm:          f64,
    pub longitude_norm:         f64,
    pub crime_rate_24h:         f64,
    pub crime_rate_7d:          f64,
    pub crime_rate_30d:         f64,
    pub nearby_incidents:       f64,
    pub crime_severity:         f64,
    // event
    pub event_motion:           f64,
    pub event_door:             f64,
    pub event_window:           f64,
    pub event_sound:            f64,
    pub event_face:             f64,
    pub event_glassbreak:       f64,
    pub event_pet:              f64,
    pub event_fire:             f64,
    pub event_vehicle:          f64,
    pub event_confidence:       f64,
    pub event_duration:         f64,
    pub event_intensity:        f64,
    pub sensor_count:           f64,
    // behavioral
    pub recent_activity_freq:   f64,
    pub user_risk_score:        f64,
    pub user_trust_level:       f64,
    pub activity_consistency:   f64,
    // environmental
    pub temperature:            f64,
    pub humidity:               f64,
    pub precipitation:          f64,
    pub wind_speed:             f64,
    pub is_daylight:            f64,
    pub season_winter:          f64,
    pub season_spring:          f64,
    pub season_summer:          f64,
    pub season_fall:            f64,
}

impl NamedFeatures {
    /// Every feature as (name, value), the order fixed for vector hashing.
    pub fn pairs(&self) -> [(&'static str, f64); 41] {
        [
            ("hour_sin", self.hour_sin),
            ("hour_cos", self.hour_cos),
            ("weekday_sin", self.weekday_sin),
            ("weekday_cos", self.weekday_cos),
            ("month_sin", self.month_sin),
            ("month_cos", self.month_cos),
            ("is_weekend", self.is_weekend),
            ("hours_since_last_event", self.hours_since_last_event),
            ("latitude_norm", self.latitude_norm),
            ("longitude_norm", self.longitude_norm),
            ("crime_rate_24h", self.crime_rate_24h),
            ("crime_rate_7d", self.crime_rate_7d),
            ("crime_rate_30d", self.crime_rate_30d),
            ("nearby_incidents", self.nearby_incidents),
            ("crime_severity", self.crime_severity),
            ("event_motion", self.event_motion),
            ("event_door", self.event_door),
            ("event_window", self.event_window),
            ("event_sound", self.event_sound),
            ("event_face", self.event_face),
            ("event_glassbreak", self.event_glassbreak),
            ("event_pet", self.event_pet),
            ("event_fire", self.event_fire),
            ("event_vehicle", self.event_vehicle),
            ("event_confidence", self.event_confidence),
            ("event_duration", self.event_duration),
            ("event_intensity", self.event_intensity),
            ("sensor_count", self.sensor_count),
            ("recent_activity_freq", self.recent_activity_freq),
            ("user_risk_score", self.user_risk_score),
            ("user_trust_level", self.user_trust_level),
            ("activity_consistency", self.activity_consistency),
            ("temperature", self.temperature),
            ("humidity", self.humidity),
            ("precipitation", self.precipitation),
            ("wind_speed", self.wind_speed),
            ("is_daylight", self.is_daylight),
            ("season_winter", self.season_winter),
            ("season_spring", self.season_spring),
            ("season_summer", self.season_summer),
            ("season_fall", self.season_fall),
        ]
    }

    /// Lookup by wire name, used by the rule engine's condition vocabulary.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.pairs().iter().find(|(n, _)| *n == name).map(|(_, v)| *v)
    }
}

// ── Extraction ────────────────────────────────────────────────────────────────

/// Extract named features from a request. Pure given the resolved timestamp;
/// the clock is only consulted for unparsable timestamps.
pub fn extract(request: &AssessmentRequest, clock: &SharedClock) -> NamedFeatures {
    let ts = request.resolved_timestamp(clock);
    extract_at(request, ts, clock)
}

pub fn extract_at(
    request: &AssessmentRequest,
    ts: DateTime<Utc>,
    clock: &SharedClock,
) -> NamedFeatures {
    let mut f = NamedFeatures::default();

    // temporal
    let (hs, hc) = hour_encoding(ts.hour());
    let (ws, wc) = weekday_encoding(ts.weekday().num_days_from_monday());
    let (ms, mc) = month_encoding(ts.month0());
    f.hour_sin = hs;
    f.hour_cos = hc;
    f.weekday_sin = ws;
    f.weekday_cos = wc;
    f.month_sin = ms;
    f.month_cos = mc;
    f.is_weekend = if ts.weekday().num_days_from_monday() >= 5 { 1.0 } else { 0.0 };
    f.is_daylight = if (6..18).contains(&ts.hour()) { 1.0 } else { 0.0 };

    let month = ts.month();
    match month {
        12 | 1 | 2 => f.season_winter = 1.0,
        3..=5      => f.season_spring = 1.0,
        6..=8      => f.season_summer = 1.0,
        _          => f.season_fall = 1.0,
    }

    // activity history
    let history: Vec<DateTime<Utc>> = request
        .activity_history
        .iter()
        .map(|t| t.resolve(clock))
        .collect();

    f.hours_since_last_event = history
        .iter()
        .filter(|t| **t <= ts)
        .max()
        .map(|last| clamp01((ts - *last).num_seconds() as f64 / 3600.0 / 24.0))
        .unwrap_or(1.0);

    let recent = history
        .iter()
        .filter(|t| **t <= ts && (ts - **t).num_hours() < 24)
        .count();
    f.recent_activity_freq = clamp01(recent as f64 / 10.0);

    f.activity_consistency = if history.len() >= 2 {
        let hours: Vec<f64> = history.iter().map(|t| t.hour() as f64).collect();
        let mean = hours.iter().sum::<f64>() / hours.len() as f64;
        let var = hours.iter().map(|h| (h - mean).powi(2)).sum::<f64>() / hours.len() as f64;
        clamp01(1.0 - var.sqrt() / 12.0)
    } else {
        0.5
    };

    // spatial
    if let Some((lat, lon)) = request.coords() {
        let lat = lat.clamp(-90.0, 90.0);
        let lon = lon.clamp(-180.0, 180.0);
        f.latitude_norm = (lat + 90.0) / 180.0;
        f.longitude_norm = (lon + 180.0) / 360.0;
    } else {
        f.latitude_norm = 0.5;
        f.longitude_norm = 0.5;
    }

    if let Some(crime) = &request.crime_context {
        f.crime_rate_24h = clamp01(crime.crime_rate_24h.unwrap_or(0.0));
        f.crime_rate_7d = clamp01(crime.crime_rate_7d.unwrap_or(0.0));
        f.crime_rate_30d = clamp01(crime.crime_rate_30d.unwrap_or(0.0));
        f.nearby_incidents = clamp01(crime.nearby_incidents.unwrap_or(0.0).clamp(0.0, 10.0) / 10.0);
        f.crime_severity = clamp01(crime.avg_severity.unwrap_or(0.0));
    }

    // Event one-hots union over every event in the request; the primary
    // event (events[0], or the top-level fields) drives the scalar fields.
    let primary = request.primary_event();
    let all_events: Vec<_> = if request.events.is_empty() {
        vec![primary.clone()]
    } else {
        request.events.clone()
    };
    for event in &all_events {
        match event.kind() {
            EventKind::Motion     => f.event_motion = 1.0,
            EventKind::Door       => f.event_door = 1.0,
            EventKind::Window     => f.event_window = 1.0,
            EventKind::Sound      => f.event_sound = 1.0,
            EventKind::Face       => f.event_face = 1.0,
            EventKind::Glassbreak => f.event_glassbreak = 1.0,
            EventKind::Pet        => f.event_pet = 1.0,
            EventKind::Fire       => f.event_fire = 1.0,
            EventKind::Vehicle    => f.event_vehicle = 1.0,
            EventKind::Doorbell | EventKind::Other => {}
        }
        // A sound event carrying a glass signature marks both families
        if event.kind() == EventKind::Glassbreak
            && EventKind::normalize(&event.event_type) == EventKind::Sound
        {
            f.event_sound = 1.0;
        }
    }

    f.event_confidence = clamp01(primary.confidence);
    if let Some(meta) = &primary.metadata {
        f.event_duration = clamp01(meta.duration.unwrap_or(0.0).clamp(0.0, 600.0) / 600.0);
        f.event_intensity = clamp01(meta.intensity.unwrap_or(0.0));
        f.sensor_count =
            clamp01((meta.sensors_triggered.unwrap_or(0).min(6) as f64) / 6.0);
    }

    // behavioral profile
    let profile = request.user_risk_profile.clone().unwrap_or_default();
    f.user_risk_score = clamp01(profile.risk_score.unwrap_or(0.5));
    f.user_trust_level = clamp01(profile.trust_level.unwrap_or(0.5));

    // environmental
    if let Some(weather) = &request.weather {
        f.temperature = clamp01((weather.temperature.unwrap_or(10.0) + 20.0) / 60.0);
        f.humidity = clamp01(weather.humidity.unwrap_or(50.0) / 100.0);
        f.precipitation = clamp01(weather.precipitation.unwrap_or(0.0));
        f.wind_speed = clamp01(weather.wind_speed.unwrap_or(0.0).clamp(0.0, 30.0) / 30.0);
    } else {
        f.temperature = 0.5;
        f.humidity = 0.5;
    }

    f
}

/// Dense projection: every named feature added at its murmur3 slot.
pub fn extract_vector(features: &NamedFeatures) -> Vec<f32> {
    let mut vector = vec![0.0f32; VECTOR_SIZE];
    for (name, value) in features.pairs() {
        vector[feature_slot(name, VECTOR_SIZE as u32)] += value as f32;
    }
    vector
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::system_clock;
    use crate::events::AssessmentRequest;

    fn request(json: &str) -> AssessmentRequest {
        AssessmentRequest::parse(json).unwrap()
    }

    #[test]
    fn extraction_is_deterministic() {
        let req = request(
            r#"{"timestamp":1750000000,"home_mode":"away",
                "events":[{"type":"glassbreak","confidence":0.98}],
                "crime_context":{"crime_rate_24h":0.45}}"#,
        );
        let clock = system_clock();
        assert_eq!(extract(&req, &clock), extract(&req, &clock));
    }

    #[test]
    fn glassbreak_one_hot_and_confidence() {
        let clock = system_clock();
        let f = extract(
            &request(r#"{"timestamp":1750000000,"events":[{"type":"glassbreak","confidence":0.98}]}"#),
            &clock,
        );
        assert_eq!(f.event_glassbreak, 1.0);
        assert_eq!(f.event_motion, 0.0);
        assert!((f.event_confidence - 0.98).abs() < 1e-12);
    }

    #[test]
    fn metadata_clamps() {
        let clock = system_clock();
        let f = extract(
            &request(
                r#"{"timestamp":1750000000,"events":[{"type":"motion","confidence":1.0,
                    "metadata":{"duration":1200.0,"intensity":2.5,"sensors_triggered":9}}]}"#,
            ),
            &clock,
        );
        assert_eq!(f.event_duration, 1.0);
        assert_eq!(f.event_intensity, 1.0);
        assert_eq!(f.sensor_count, 1.0);
    }

    #[test]
    fn cyclic_encodings_are_on_unit_circle() {
        let clock = system_clock();
        let f = extract(
            &request(r#"{"timestamp":"2025-03-08T23:30:00Z","events":[{"type":"motion","confidence":0.5}]}"#),
            &clock,
        );
        assert!((f.hour_sin.powi(2) + f.hour_cos.powi(2) - 1.0).abs() < 1e-9);
        assert!((f.weekday_sin.powi(2) + f.weekday_cos.powi(2) - 1.0).abs() < 1e-9);
        // 23:30 UTC → night
        assert_eq!(f.is_daylight, 0.0);
        assert!(f.hour_cos < -0.5); // hour 23 sits deep in the night band
        assert_eq!(f.is_weekend, 1.0); // 2025-03-08 is a Saturday
        assert_eq!(f.season_spring, 1.0);
    }

    #[test]
    fn consistency_from_regular_history() {
        let clock = system_clock();
        // Same hour every day → stddev 0 → consistency 1
        let f = extract(
            &request(
                r#"{"timestamp":"2025-06-10T14:00:00Z",
                    "events":[{"type":"motion","confidence":0.5}],
                    "activity_history":["2025-06-08T09:00:00Z","2025-06-09T09:00:00Z","2025-06-10T09:00:00Z"]}"#,
            ),
            &clock,
        );
        assert!((f.activity_consistency - 1.0).abs() < 1e-9);
        assert!(f.hours_since_last_event < 0.25);
    }

    #[test]
    fn empty_history_defaults() {
        let clock = system_clock();
        let f = extract(
            &request(r#"{"timestamp":1750000000,"events":[{"type":"motion","confidence":0.5}]}"#),
            &clock,
        );
        assert_eq!(f.activity_consistency, 0.5);
        assert_eq!(f.hours_since_last_event, 1.0);
    }

    #[test]
    fn vector_projection_accumulates_named_values() {
        let clock = system_clock();
        let f = extract(
            &request(r#"{"timestamp":1750000000,"events":[{"type":"fire","confidence":1.0}]}"#),
            &clock,
        );
        let vector = extract_vector(&f);
        assert_eq!(vector.len(), VECTOR_SIZE);
        let slot = crate::hashing::feature_slot("event_fire", VECTOR_SIZE as u32);
        assert!(vector[slot] >= 1.0);
    }
}
