// novin/src/events.rs
//
// Shared domain types flowing through the assessment pipeline: the inbound
// request model, the chain-buffer element, threat levels, and the outbound
// assessment. Raw event-type strings are normalized here (substring matching
// via a case-insensitive Aho-Corasick automaton).

use std::collections::HashMap;
use std::sync::OnceLock;

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::clock::SharedClock;
use crate::error::SdkError;
use crate::hashing::canonical_json;

// ── Event kinds ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Motion,
    Door,
    Window,
    Sound,
    Face,
    Glassbreak,
    Pet,
    Fire,
    Vehicle,
    Doorbell,
    Other,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Motion     => write!(f, "motion"),
            Self::Door       => write!(f, "door"),
            Self::Window     => write!(f, "window"),
            Self::Sound      => write!(f, "sound"),
            Self::Face       => write!(f, "face"),
            Self::Glassbreak => write!(f, "glassbreak"),
            Self::Pet        => write!(f, "pet"),
            Self::Fire       => write!(f, "fire"),
            Self::Vehicle    => write!(f, "vehicle"),
            Self::Doorbell   => write!(f, "doorbell"),
            Self::Other      => write!(f, "other"),
        }
    }
}

// Substring → kind, checked in priority order on automaton hits
const KIND_PATTERNS: &[(&str, EventKind)] = &[
    ("motion",   EventKind::Motion),
    ("glass",    EventKind::Glassbreak),
    ("doorbell", EventKind::Doorbell),
    ("chime",    EventKind::Doorbell),
];

static KIND_AC: OnceLock<AhoCorasick> = OnceLock::new();

fn kind_automaton() -> &'static AhoCorasick {
    KIND_AC.get_or_init(|| {
        let patterns: Vec<&str> = KIND_PATTERNS.iter().map(|(p, _)| *p).collect();
        AhoCorasickBuilder::new()
            .ascii_case_insensitive(true)
            .match_kind(MatchKind::Standard)
            .build(&patterns)
            .expect("event kind automaton build failed")
    })
}

impl EventKind {
    /// Normalize a raw sensor type string. Any string containing "motion"
    /// maps to Motion, containing "glass" to Glassbreak, containing
    /// "doorbell"/"chime" to Doorbell; exact names cover the rest.
    pub fn normalize(raw: &str) -> Self {
        let mut hits = [false; 4];
        for m in kind_automaton().find_overlapping_iter(raw) {
            hits[m.pattern().as_usize()] = true;
        }
        for (i, (_, kind)) in KIND_PATTERNS.iter().enumerate() {
            if hits[i] {
                return *kind;
            }
        }
        match raw.trim().to_ascii_lowercase().as_str() {
            "door"    => Self::Door,
            "window"  => Self::Window,
            "sound"   => Self::Sound,
            "face"    => Self::Face,
            "fire"    => Self::Fire,
            "smoke"   => Self::Fire,
            "pet"     => Self::Pet,
            "vehicle" => Self::Vehicle,
            _         => Self::Other,
        }
    }

    /// Door-like kinds for the forced-entry and intrusion detectors.
    pub fn is_entry_point(&self) -> bool {
        matches!(self, Self::Door | Self::Window)
    }
}

// ── Home mode ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HomeMode {
    Home,
    Away,
    Vacation,
    #[default]
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for HomeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Home     => write!(f, "home"),
            Self::Away     => write!(f, "away"),
            Self::Vacation => write!(f, "vacation"),
            Self::Unknown  => write!(f, "unknown"),
        }
    }
}

// ── Request model ─────────────────────────────────────────────────────────────

/// Timestamp as it arrives on the wire: unix seconds or ISO8601 text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimestampField {
    Unix(f64),
    Text(String),
}

impl TimestampField {
    /// Resolve to UTC. Unparsable input falls back to the injected clock.
    pub fn resolve(&self, clock: &SharedClock) -> DateTime<Utc> {
        match self {
            Self::Unix(secs) if secs.is_finite() => {
                let millis = (secs * 1000.0) as i64;
                Utc.timestamp_millis_opt(millis).single().unwrap_or_else(|| clock.now())
            }
            Self::Unix(_) => clock.now(),
            Self::Text(text) => DateTime::parse_from_rfc3339(text)
                .map(|dt| dt.with_timezone(&Utc))
                .or_else(|_| {
                    chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S")
                        .map(|naive| Utc.from_utc_datetime(&naive))
                })
                .unwrap_or_else(|_| clock.now()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocationSpec {
    Coords { lat: f64, lon: f64 },
    Name(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventMetadata {
    pub duration:          Option<f64>,
    pub energy:            Option<f64>,
    pub intensity:         Option<f64>,
    pub sensors_triggered: Option<u32>,
    pub is_known:          Option<bool>,
    pub sound_type:        Option<String>,
    pub room:              Option<String>,
    pub samples:           Option<Vec<f64>>,
    pub sample_rate:       Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub confidence: f64,
    #[serde(default)]
    pub metadata:   Option<EventMetadata>,
}

impl RawEvent {
    pub fn kind(&self) -> EventKind {
        let kind = EventKind::normalize(&self.event_type);
        // A sound event carrying a glass-like sound_type is a glassbreak
        if kind == EventKind::Sound {
            if let Some(sound) = self.metadata.as_ref().and_then(|m| m.sound_type.as_deref()) {
                if EventKind::normalize(sound) == EventKind::Glassbreak {
                    return EventKind::Glassbreak;
                }
            }
        }
        kind
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrimeContext {
    pub crime_rate_24h:   Option<f64>,
    pub crime_rate_7d:    Option<f64>,
    pub crime_rate_30d:   Option<f64>,
    pub nearby_incidents: Option<f64>,
    pub avg_severity:     Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Weather {
    pub temperature:   Option<f64>,
    pub humidity:      Option<f64>,
    pub precipitation: Option<f64>,
    pub wind_speed:    Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserRiskProfile {
    pub risk_score:  Option<f64>,
    pub trust_level: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssessmentRequest {
    pub timestamp:         Option<TimestampField>,
    #[serde(default)]
    pub home_mode:         HomeMode,
    pub location:          Option<LocationSpec>,
    #[serde(default)]
    pub events:            Vec<RawEvent>,
    // Top-level event fields, honored when events[] is absent
    pub event_type:        Option<String>,
    pub confidence:        Option<f64>,
    pub metadata:          Option<EventMetadata>,
    pub crime_context:     Option<CrimeContext>,
    pub weather:           Option<Weather>,
    #[serde(default)]
    pub activity_history:  Vec<TimestampField>,
    pub user_risk_profile: Option<UserRiskProfile>,
}

impl AssessmentRequest {
    /// Parse and shape-validate a request body. Fails early on malformed
    /// JSON, missing events, or out-of-range confidences.
    pub fn parse(json: &str) -> Result<Self, SdkError> {
        let request: Self = serde_json::from_str(json)
            .map_err(|e| SdkError::InvalidInput(format!("unparsable request: {e}")))?;
        request.validate()?;
        Ok(request)
    }

    fn validate(&self) -> Result<(), SdkError> {
        if self.events.is_empty() && self.event_type.is_none() {
            return Err(SdkError::InvalidInput("request carries no events".into()));
        }
        for event in &self.events {
            if !(0.0..=1.0).contains(&event.confidence) || !event.confidence.is_finite() {
                return Err(SdkError::InvalidInput(format!(
                    "event confidence {} outside [0,1]",
                    event.confidence
                )));
            }
        }
        if let Some(conf) = self.confidence {
            if !(0.0..=1.0).contains(&conf) || !conf.is_finite() {
                return Err(SdkError::InvalidInput(format!(
                    "confidence {conf} outside [0,1]"
                )));
            }
        }
        Ok(())
    }

    /// The primary event: events[0], or the top-level fields when events[]
    /// is absent.
    pub fn primary_event(&self) -> RawEvent {
        if let Some(first) = self.events.first() {
            return first.clone();
        }
        RawEvent {
            event_type: self.event_type.clone().unwrap_or_default(),
            confidence: self.confidence.unwrap_or(0.5),
            metadata:   self.metadata.clone(),
        }
    }

    pub fn location_name(&self) -> Option<&str> {
        match &self.location {
            Some(LocationSpec::Name(name)) => Some(name.as_str()),
            _ => None,
        }
        .or_else(|| {
            self.primary_room()
        })
    }

    fn primary_room(&self) -> Option<&str> {
        self.events
            .first()
            .and_then(|e| e.metadata.as_ref())
            .or(self.metadata.as_ref())
            .and_then(|m| m.room.as_deref())
    }

    pub fn coords(&self) -> Option<(f64, f64)> {
        match &self.location {
            Some(LocationSpec::Coords { lat, lon }) => Some((*lat, *lon)),
            _ => None,
        }
    }

    pub fn resolved_timestamp(&self, clock: &SharedClock) -> DateTime<Utc> {
        self.timestamp
            .as_ref()
            .map(|t| t.resolve(clock))
            .unwrap_or_else(|| clock.now())
    }
}

// ── Chain buffer element ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityEvent {
    pub kind:       EventKind,
    pub timestamp:  DateTime<Utc>,
    pub location:   String,
    pub confidence: f64,
}

// ── Chain patterns ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainPatternKind {
    PackageDelivery,
    IntrusionSequence,
    ForcedEntry,
    ActiveBreakIn,
    ProwlerActivity,
}

impl std::fmt::Display for ChainPatternKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PackageDelivery   => write!(f, "package_delivery"),
            Self::IntrusionSequence => write!(f, "intrusion_sequence"),
            Self::ForcedEntry       => write!(f, "forced_entry"),
            Self::ActiveBreakIn     => write!(f, "active_break_in"),
            Self::ProwlerActivity   => write!(f, "prowler_activity"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainPattern {
    pub kind:         ChainPatternKind,
    pub events:       Vec<SecurityEvent>,
    pub threat_delta: f64,
    pub confidence:   f64,
    pub reasoning:    String,
}

// ── Threat levels ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatLevel {
    Low,
    Standard,
    Elevated,
    Critical,
}

impl ThreatLevel {
    /// Fixed bands over the final fused score.
    pub fn from_score(score: f64) -> Self {
        if score >= 0.9 {
            Self::Critical
        } else if score >= 0.7 {
            Self::Elevated
        } else if score >= 0.4 {
            Self::Standard
        } else {
            Self::Low
        }
    }
}

impl std::fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low      => write!(f, "low"),
            Self::Standard => write!(f, "standard"),
            Self::Elevated => write!(f, "elevated"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

// ── Assessment result ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityAssessment {
    pub threat_level:       ThreatLevel,
    pub confidence:         f64,
    pub processing_time_ms: f64,
    pub reasoning:          String,
    pub request_id:         Uuid,
    pub timestamp:          DateTime<Utc>,
    pub event_type:         String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary:            Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detailed_reasoning: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub context:            Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation:     Option<String>,
}

impl SecurityAssessment {
    /// Alternate wire form with sorted keys, for platform-integration
    /// consumers that diff serialized output.
    pub fn to_pi(&self, mode: &str) -> String {
        let value = serde_json::json!({
            "event_type": self.event_type,
            "threat": {
                "level":          self.threat_level.to_string(),
                "confidence_pct": (self.confidence * 100.0).round(),
            },
            "processing": {
                "time_ms": self.processing_time_ms,
            },
            "meta": {
                "request_id": self.request_id.to_string(),
                "timestamp":  self.timestamp.to_rfc3339(),
                "mode":       mode,
            },
        });
        canonical_json(&value)
    }
}

/// Free-form per-reasoner score map carried into the audit trail.
pub type ScoreMap = HashMap<String, f64>;

/// Convenience for tests and the CLI: parse a request into a raw JSON value
/// for input hashing.
pub fn request_value(json: &str) -> Result<Value, SdkError> {
    serde_json::from_str(json).map_err(|e| SdkError::InvalidInput(format!("unparsable request: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{system_clock, ManualClock};
    use chrono::Duration;

    #[test]
    fn normalizes_substring_kinds() {
        assert_eq!(EventKind::normalize("pir_motion_sensor"), EventKind::Motion);
        assert_eq!(EventKind::normalize("GlassBreak"), EventKind::Glassbreak);
        assert_eq!(EventKind::normalize("front_doorbell"), EventKind::Doorbell);
        assert_eq!(EventKind::normalize("chime"), EventKind::Doorbell);
        assert_eq!(EventKind::normalize("door"), EventKind::Door);
        assert_eq!(EventKind::normalize("thermostat"), EventKind::Other);
    }

    #[test]
    fn sound_with_glass_sound_type_is_glassbreak() {
        let event = RawEvent {
            event_type: "sound".into(),
            confidence: 0.9,
            metadata: Some(EventMetadata {
                sound_type: Some("glass_shatter".into()),
                ..Default::default()
            }),
        };
        assert_eq!(event.kind(), EventKind::Glassbreak);
    }

    #[test]
    fn rejects_out_of_range_confidence() {
        let err = AssessmentRequest::parse(
            r#"{"events":[{"type":"motion","confidence":1.4}]}"#,
        )
        .unwrap_err();
        assert_eq!(err.code(), "invalid_input");
    }

    #[test]
    fn rejects_eventless_request() {
        let err = AssessmentRequest::parse(r#"{"home_mode":"away"}"#).unwrap_err();
        assert_eq!(err.code(), "invalid_input");
    }

    #[test]
    fn top_level_event_fields_form_primary() {
        let request = AssessmentRequest::parse(
            r#"{"event_type":"motion","confidence":0.8,"home_mode":"home"}"#,
        )
        .unwrap();
        let primary = request.primary_event();
        assert_eq!(primary.kind(), EventKind::Motion);
        assert_eq!(primary.confidence, 0.8);
    }

    #[test]
    fn timestamp_unix_and_iso_agree() {
        let clock = system_clock();
        let unix = TimestampField::Unix(1_750_000_000.0).resolve(&clock);
        let iso = TimestampField::Text("2025-06-15T15:06:40+00:00".into()).resolve(&clock);
        assert_eq!(unix, iso);
    }

    #[test]
    fn bad_timestamp_falls_back_to_clock() {
        let manual = ManualClock::starting_at(
            chrono::Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap(),
        );
        let clock: SharedClock = manual.clone();
        let resolved = TimestampField::Text("not-a-date".into()).resolve(&clock);
        assert_eq!(resolved, clock.now());
        manual.advance(Duration::hours(1));
        assert_eq!(
            TimestampField::Text("nope".into()).resolve(&clock),
            clock.now()
        );
    }

    #[test]
    fn threat_bands() {
        assert_eq!(ThreatLevel::from_score(0.95), ThreatLevel::Critical);
        assert_eq!(ThreatLevel::from_score(0.9), ThreatLevel::Critical);
        assert_eq!(ThreatLevel::from_score(0.75), ThreatLevel::Elevated);
        assert_eq!(ThreatLevel::from_score(0.5), ThreatLevel::Standard);
        assert_eq!(ThreatLevel::from_score(0.1), ThreatLevel::Low);
    }
}
