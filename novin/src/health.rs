// novin/src/health.rs
//
// Health monitoring: rolling window of the last 100 processing times, error
// and assessment counters, an in-flight gauge, and a derived status enum.
// Error counting is atomic so the persist worker can report failures without
// taking the sample lock.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::clock::SharedClock;

const WINDOW: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Critical,
    Emergency,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy   => write!(f, "healthy"),
            Self::Degraded  => write!(f, "degraded"),
            Self::Critical  => write!(f, "critical"),
            Self::Emergency => write!(f, "emergency"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemHealth {
    pub status:             HealthStatus,
    pub uptime_secs:        i64,
    pub total_assessments:  u64,
    pub error_count:        u64,
    pub error_rate:         f64,
    pub avg_processing_ms:  f64,
    pub in_flight:          u64,
}

pub struct HealthMonitor {
    samples:     Mutex<VecDeque<f64>>,
    total:       AtomicU64,
    errors:      Arc<AtomicU64>,
    in_flight:   AtomicU64,
    started_at:  DateTime<Utc>,
    clock:       SharedClock,
}

impl HealthMonitor {
    pub fn new(clock: SharedClock) -> Self {
        let started_at = clock.now();
        Self {
            samples: Mutex::new(VecDeque::with_capacity(WINDOW)),
            total: AtomicU64::new(0),
            errors: Arc::new(AtomicU64::new(0)),
            in_flight: AtomicU64::new(0),
            started_at,
            clock,
        }
    }

    /// Shared error counter handle for out-of-band reporters (persist queue).
    pub fn error_counter(&self) -> Arc<AtomicU64> {
        self.errors.clone()
    }

    pub fn record_sample(&self, processing_ms: f64) {
        self.total.fetch_add(1, Ordering::Relaxed);
        let mut samples = self.samples.lock();
        samples.push_back(processing_ms);
        while samples.len() > WINDOW {
            samples.pop_front();
        }
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn enter(&self) {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
    }

    pub fn exit(&self) {
        // saturating: an unmatched exit must not wrap the gauge
        let _ = self
            .in_flight
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1));
    }

    pub fn snapshot(&self) -> SystemHealth {
        let total = self.total.load(Ordering::Relaxed);
        let errors = self.errors.load(Ordering::Relaxed);
        let in_flight = self.in_flight.load(Ordering::Relaxed);

        let avg = {
            let samples = self.samples.lock();
            if samples.is_empty() {
                0.0
            } else {
                samples.iter().sum::<f64>() / samples.len() as f64
            }
        };

        let attempts = total + errors;
        let error_rate = if attempts == 0 {
            0.0
        } else {
            errors as f64 / attempts as f64
        };

        let status = if error_rate > 0.5 {
            HealthStatus::Emergency
        } else if error_rate > 0.2 || avg > 500.0 {
            HealthStatus::Critical
        } else if error_rate > 0.05 || avg > 100.0 || in_flight > 50 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        SystemHealth {
            status,
            uptime_secs: (self.clock.now() - self.started_at).num_seconds(),
            total_assessments: total,
            error_count: errors,
            error_rate,
            avg_processing_ms: avg,
            in_flight,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{Duration, TimeZone};

    fn monitor() -> HealthMonitor {
        let clock = ManualClock::starting_at(Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap());
        HealthMonitor::new(clock)
    }

    #[test]
    fn healthy_baseline() {
        let m = monitor();
        for _ in 0..20 {
            m.record_sample(5.0);
        }
        let h = m.snapshot();
        assert_eq!(h.status, HealthStatus::Healthy);
        assert_eq!(h.total_assessments, 20);
        assert!((h.avg_processing_ms - 5.0).abs() < 1e-9);
    }

    #[test]
    fn slow_processing_degrades_then_criticals() {
        let m = monitor();
        for _ in 0..10 {
            m.record_sample(150.0);
        }
        assert_eq!(m.snapshot().status, HealthStatus::Degraded);
        for _ in 0..100 {
            m.record_sample(900.0);
        }
        assert_eq!(m.snapshot().status, HealthStatus::Critical);
    }

    #[test]
    fn error_rate_escalates_to_emergency() {
        let m = monitor();
        for _ in 0..5 {
            m.record_sample(5.0);
        }
        for _ in 0..10 {
            m.record_error();
        }
        // 10 errors / 15 attempts → emergency
        assert_eq!(m.snapshot().status, HealthStatus::Emergency);
    }

    #[test]
    fn in_flight_gauge_degrades() {
        let m = monitor();
        for _ in 0..60 {
            m.enter();
        }
        assert_eq!(m.snapshot().status, HealthStatus::Degraded);
        for _ in 0..60 {
            m.exit();
        }
        // extra exits must not wrap
        m.exit();
        assert_eq!(m.snapshot().in_flight, 0);
    }

    #[test]
    fn window_is_bounded_at_one_hundred() {
        let m = monitor();
        for _ in 0..150 {
            m.record_sample(900.0);
        }
        for _ in 0..100 {
            m.record_sample(1.0);
        }
        // old slow samples fully aged out
        let h = m.snapshot();
        assert!((h.avg_processing_ms - 1.0).abs() < 1e-9);
        assert_eq!(h.total_assessments, 250);
    }

    #[test]
    fn uptime_tracks_clock() {
        let clock = ManualClock::starting_at(Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap());
        let m = HealthMonitor::new(clock.clone());
        clock.advance(Duration::seconds(90));
        assert_eq!(m.snapshot().uptime_secs, 90);
    }
}
