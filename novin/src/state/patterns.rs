// novin/src/state/patterns.rs
//
// Per-home user pattern learning: false-positive counts per event kind, a
// delivery-frequency estimate, and dismissal timestamps for delivery-time
// insights. The false-positive counters sit in a DashMap so the hot
// dampening lookup on the assess path never contends with feedback writes;
// everything else is guarded by one mutex.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, Duration, Timelike, Utc, Weekday};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clock::SharedClock;

const MAX_DISMISSALS: usize = 1000;
const DEFAULT_DELIVERY_FREQUENCY: f64 = 0.3;

/// Persisted snapshot, one KV key. Corruption on load → defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPatternsData {
    pub delivery_frequency:     f64,
    pub false_positive_history: HashMap<String, u32>,
    pub dismissal_timestamps:   Vec<DateTime<Utc>>,
    pub total_events_assessed:  u64,
    pub total_user_interactions: u64,
    pub last_updated:           DateTime<Utc>,
    pub learning_rate:          f64,
}

impl UserPatternsData {
    fn fresh(now: DateTime<Utc>, learning_rate: f64) -> Self {
        Self {
            delivery_frequency:      DEFAULT_DELIVERY_FREQUENCY,
            false_positive_history:  HashMap::new(),
            dismissal_timestamps:    Vec::new(),
            total_events_assessed:   0,
            total_user_interactions: 0,
            last_updated:            now,
            learning_rate,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryInsights {
    pub frequency:    f64,
    pub peak_hour:    u32,
    pub peak_weekday: Weekday,
}

struct PatternCore {
    delivery_frequency:      f64,
    dismissal_timestamps:    Vec<DateTime<Utc>>,
    total_events_assessed:   u64,
    total_user_interactions: u64,
    last_updated:            DateTime<Utc>,
    learning_rate:           f64,
}

pub struct PatternStore {
    false_positives: DashMap<String, u32>,
    core:            Mutex<PatternCore>,
    clock:           SharedClock,
}

impl PatternStore {
    pub fn new(clock: SharedClock, learning_rate: f64) -> Self {
        let now = clock.now();
        Self::from_data(UserPatternsData::fresh(now, learning_rate), clock)
    }

    pub fn from_data(data: UserPatternsData, clock: SharedClock) -> Self {
        let false_positives = DashMap::new();
        for (kind, count) in data.false_positive_history {
            false_positives.insert(kind, count);
        }
        Self {
            false_positives,
            core: Mutex::new(PatternCore {
                delivery_frequency:      data.delivery_frequency.clamp(0.0, 1.0),
                dismissal_timestamps:    data.dismissal_timestamps,
                total_events_assessed:   data.total_events_assessed,
                total_user_interactions: data.total_user_interactions,
                last_updated:            data.last_updated,
                learning_rate:           data.learning_rate.clamp(f64::MIN_POSITIVE, 0.999),
            }),
            clock,
        }
    }

    /// Load from a persisted JSON snapshot; anything unparsable → defaults.
    pub fn from_json(json: Option<&str>, clock: SharedClock, learning_rate: f64) -> Self {
        match json.and_then(|j| serde_json::from_str::<UserPatternsData>(j).ok()) {
            Some(data) => Self::from_data(data, clock),
            None => Self::new(clock, learning_rate),
        }
    }

    pub fn record_assessment(&self) {
        let mut core = self.core.lock();
        core.total_events_assessed += 1;
        core.last_updated = self.clock.now();
    }

    /// User-marked feedback. Only false positives mutate the learned state.
    pub fn record_feedback(
        &self,
        event_type: &str,
        was_false_positive: bool,
        timestamp: Option<DateTime<Utc>>,
    ) {
        let now = timestamp.unwrap_or_else(|| self.clock.now());
        let mut core = self.core.lock();
        core.total_user_interactions += 1;
        core.last_updated = self.clock.now();
        if !was_false_positive {
            return;
        }

        let kind = event_type.trim().to_ascii_lowercase();
        *self.false_positives.entry(kind.clone()).or_insert(0) += 1;

        if kind.contains("doorbell") || kind.contains("motion") {
            core.delivery_frequency =
                (core.delivery_frequency + core.learning_rate).min(1.0);
            debug!(
                "delivery frequency bumped to {:.2} on {kind} dismissal",
                core.delivery_frequency
            );
        }

        core.dismissal_timestamps.push(now);
        let overflow = core.dismissal_timestamps.len().saturating_sub(MAX_DISMISSALS);
        if overflow > 0 {
            core.dismissal_timestamps.drain(..overflow);
        }
    }

    /// Score attenuation from accumulated false positives for this kind.
    pub fn dampening_factor(&self, event_type: &str) -> f64 {
        let kind = event_type.trim().to_ascii_lowercase();
        let count = self.false_positives.get(&kind).map(|c| *c).unwrap_or(0);
        match count {
            c if c > 20 => 0.5,
            c if c > 10 => 0.7,
            c if c > 5  => 0.85,
            _ => 1.0,
        }
    }

    /// Modal dismissal hour and weekday over the trailing 7 days. Defaults
    /// (14:00, Wednesday) when no recent dismissals exist.
    pub fn delivery_insights(&self) -> DeliveryInsights {
        let core = self.core.lock();
        let cutoff = self.clock.now() - Duration::days(7);
        let recent: Vec<&DateTime<Utc>> = core
            .dismissal_timestamps
            .iter()
            .filter(|t| **t >= cutoff)
            .collect();

        if recent.is_empty() {
            return DeliveryInsights {
                frequency:    core.delivery_frequency,
                peak_hour:    14,
                peak_weekday: Weekday::Wed,
            };
        }

        let mut hour_counts = [0u32; 24];
        let mut weekday_counts = [0u32; 7];
        for t in &recent {
            hour_counts[t.hour() as usize] += 1;
            weekday_counts[t.weekday().num_days_from_monday() as usize] += 1;
        }
        let peak_hour = (0..24).max_by_key(|h| hour_counts[*h as usize]).unwrap_or(14);
        let peak_weekday_idx = (0..7)
            .max_by_key(|d| weekday_counts[*d as usize])
            .unwrap_or(2);
        let peak_weekday = match peak_weekday_idx {
            0 => Weekday::Mon,
            1 => Weekday::Tue,
            2 => Weekday::Wed,
            3 => Weekday::Thu,
            4 => Weekday::Fri,
            5 => Weekday::Sat,
            _ => Weekday::Sun,
        };

        DeliveryInsights {
            frequency: core.delivery_frequency,
            peak_hour,
            peak_weekday,
        }
    }

    pub fn snapshot(&self) -> UserPatternsData {
        let core = self.core.lock();
        UserPatternsData {
            delivery_frequency:      core.delivery_frequency,
            false_positive_history:  self
                .false_positives
                .iter()
                .map(|e| (e.key().clone(), *e.value()))
                .collect(),
            dismissal_timestamps:    core.dismissal_timestamps.clone(),
            total_events_assessed:   core.total_events_assessed,
            total_user_interactions: core.total_user_interactions,
            last_updated:            core.last_updated,
            learning_rate:           core.learning_rate,
        }
    }
}
