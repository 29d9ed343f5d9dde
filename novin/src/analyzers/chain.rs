// novin/src/analyzers/chain.rs
//
// Event chain analysis over a single process-wide sliding buffer.
//
// The buffer is a pure time window: entries older than 60 s (configurable)
// are evicted on every access against the injected clock, capacity is capped
// at 100, and detectors re-scan the window each call — no per-pattern FSM
// state survives between calls. Detector order is fixed; the first match is
// returned.

use std::collections::{HashSet, VecDeque};

use chrono::Duration;
use parking_lot::Mutex;

use crate::clock::SharedClock;
use crate::events::{ChainPattern, ChainPatternKind, EventKind, SecurityEvent};

pub struct ChainAnalyzer {
    buffer:      Mutex<VecDeque<SecurityEvent>>,
    clock:       SharedClock,
    window_secs: i64,
    capacity:    usize,
}

impl ChainAnalyzer {
    pub fn new(clock: SharedClock, window_secs: i64, capacity: usize) -> Self {
        Self {
            buffer: Mutex::new(VecDeque::new()),
            clock,
            window_secs,
            capacity,
        }
    }

    /// Insert one event and run pattern detection over the resulting window.
    /// Insert + detect happen under one lock so concurrent callers each see
    /// a consistent snapshot.
    pub fn observe(&self, event: SecurityEvent) -> Option<ChainPattern> {
        let mut buffer = self.buffer.lock();
        buffer.push_back(event);
        self.evict(&mut buffer);

        let window: Vec<SecurityEvent> = buffer.iter().cloned().collect();
        drop(buffer);

        detect(&window)
    }

    fn evict(&self, buffer: &mut VecDeque<SecurityEvent>) {
        let cutoff = self.clock.now() - Duration::seconds(self.window_secs);
        while buffer.front().map(|e| e.timestamp < cutoff).unwrap_or(false) {
            buffer.pop_front();
        }
        while buffer.len() > self.capacity {
            buffer.pop_front();
        }
    }

    /// Current buffer size after eviction (test and health introspection).
    pub fn len(&self) -> usize {
        let mut buffer = self.buffer.lock();
        self.evict(&mut buffer);
        buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── Pattern detectors ─────────────────────────────────────────────────────────

fn detect(window: &[SecurityEvent]) -> Option<ChainPattern> {
    detect_package_delivery(window)
        .or_else(|| detect_intrusion_sequence(window))
        .or_else(|| detect_forced_entry(window))
        .or_else(|| detect_active_break_in(window))
        .or_else(|| detect_prowler(window))
}

fn seconds_between(a: &SecurityEvent, b: &SecurityEvent) -> i64 {
    (b.timestamp - a.timestamp).num_seconds()
}

/// (doorbell|chime) → motion at the same location, 2–30 s apart, with no
/// third event at that location within 20 s after the motion.
fn detect_package_delivery(window: &[SecurityEvent]) -> Option<ChainPattern> {
    for (i, pair) in window.windows(2).enumerate() {
        let (first, second) = (&pair[0], &pair[1]);
        if first.kind != EventKind::Doorbell || second.kind != EventKind::Motion {
            continue;
        }
        if first.location != second.location {
            continue;
        }
        let gap = seconds_between(first, second);
        if !(2..=30).contains(&gap) {
            continue;
        }
        let quiet_after = window[i + 2..].iter().all(|later| {
            later.location != second.location
                || seconds_between(second, later) > 20
        });
        if !quiet_after {
            continue;
        }
        return Some(ChainPattern {
            kind:         ChainPatternKind::PackageDelivery,
            events:       vec![first.clone(), second.clone()],
            threat_delta: -0.4,
            confidence:   0.85,
            reasoning:    format!(
                "doorbell then brief motion at {} with no follow-up activity",
                second.location
            ),
        });
    }
    None
}

/// motion → (door|window) → motion, each step within 30 s.
fn detect_intrusion_sequence(window: &[SecurityEvent]) -> Option<ChainPattern> {
    for triple in window.windows(3) {
        let (a, b, c) = (&triple[0], &triple[1], &triple[2]);
        if a.kind != EventKind::Motion || !b.kind.is_entry_point() || c.kind != EventKind::Motion {
            continue;
        }
        if seconds_between(a, b) > 30 || seconds_between(b, c) > 30 {
            continue;
        }
        return Some(ChainPattern {
            kind:         ChainPatternKind::IntrusionSequence,
            events:       vec![a.clone(), b.clone(), c.clone()],
            threat_delta: 0.5,
            confidence:   0.90,
            reasoning:    format!(
                "approach, {} opening, then interior motion",
                b.kind
            ),
        });
    }
    None
}

/// Three or more door/window events inside the trailing 15 s.
fn detect_forced_entry(window: &[SecurityEvent]) -> Option<ChainPattern> {
    let latest = window.last()?;
    let recent: Vec<SecurityEvent> = window
        .iter()
        .filter(|e| e.kind.is_entry_point() && seconds_between(e, latest) <= 15)
        .cloned()
        .collect();
    if recent.len() < 3 {
        return None;
    }
    Some(ChainPattern {
        kind:         ChainPatternKind::ForcedEntry,
        threat_delta: 0.6,
        confidence:   0.92,
        reasoning:    format!(
            "{} door/window events in 15 s suggests repeated forcing",
            recent.len()
        ),
        events:       recent,
    })
}

/// Glassbreak followed by motion within 20 s.
fn detect_active_break_in(window: &[SecurityEvent]) -> Option<ChainPattern> {
    for (i, glass) in window.iter().enumerate() {
        if glass.kind != EventKind::Glassbreak {
            continue;
        }
        for motion in &window[i + 1..] {
            if motion.kind != EventKind::Motion {
                continue;
            }
            let gap = seconds_between(glass, motion);
            if (0..=20).contains(&gap) {
                return Some(ChainPattern {
                    kind:         ChainPatternKind::ActiveBreakIn,
                    events:       vec![glass.clone(), motion.clone()],
                    threat_delta: 0.7,
                    confidence:   0.95,
                    reasoning:    "glass break immediately followed by interior motion".into(),
                });
            }
        }
    }
    None
}

/// Motion in three or more distinct locations inside the trailing 60 s.
fn detect_prowler(window: &[SecurityEvent]) -> Option<ChainPattern> {
    let latest = window.last()?;
    let motions: Vec<SecurityEvent> = window
        .iter()
        .filter(|e| e.kind == EventKind::Motion && seconds_between(e, latest) <= 60)
        .cloned()
        .collect();
    let locations: HashSet<&str> = motions.iter().map(|e| e.location.as_str()).collect();
    if locations.len() < 3 {
        return None;
    }
    Some(ChainPattern {
        kind:         ChainPatternKind::ProwlerActivity,
        threat_delta: 0.45,
        confidence:   0.88,
        reasoning:    format!(
            "motion across {} zones within a minute suggests perimeter probing",
            locations.len()
        ),
        events:       motions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    fn setup() -> (Arc<ManualClock>, ChainAnalyzer) {
        let clock = ManualClock::starting_at(Utc.with_ymd_and_hms(2025, 6, 1, 22, 0, 0).unwrap());
        let analyzer = ChainAnalyzer::new(clock.clone(), 60, 100);
        (clock, analyzer)
    }

    fn event(clock: &ManualClock, kind: EventKind, location: &str) -> SecurityEvent {
        SecurityEvent {
            kind,
            timestamp: clock.now(),
            location: location.to_string(),
            confidence: 0.9,
        }
    }

    #[test]
    fn package_delivery_fires_on_quiet_doorbell_motion() {
        let (clock, analyzer) = setup();
        assert!(analyzer
            .observe(event(&clock, EventKind::Doorbell, "front_door"))
            .is_none());
        clock.advance(Duration::seconds(5));
        let pattern = analyzer
            .observe(event(&clock, EventKind::Motion, "front_door"))
            .expect("pattern expected");
        assert_eq!(pattern.kind, ChainPatternKind::PackageDelivery);
        assert_eq!(pattern.threat_delta, -0.4);
        assert_eq!(pattern.confidence, 0.85);
    }

    #[test]
    fn package_delivery_suppressed_by_follow_up() {
        let (clock, analyzer) = setup();
        analyzer.observe(event(&clock, EventKind::Doorbell, "front_door"));
        clock.advance(Duration::seconds(5));
        analyzer.observe(event(&clock, EventKind::Motion, "front_door"));
        clock.advance(Duration::seconds(10));
        // a door opening at the same spot 10 s later is not a delivery
        let pattern = analyzer.observe(event(&clock, EventKind::Door, "front_door"));
        assert!(
            pattern.map(|p| p.kind) != Some(ChainPatternKind::PackageDelivery),
            "delivery should be suppressed by the follow-up event"
        );
    }

    #[test]
    fn active_break_in_beats_prowler() {
        let (clock, analyzer) = setup();
        analyzer.observe(event(&clock, EventKind::Glassbreak, "living_room"));
        clock.advance(Duration::seconds(3));
        let pattern = analyzer
            .observe(event(&clock, EventKind::Motion, "living_room"))
            .expect("pattern expected");
        assert_eq!(pattern.kind, ChainPatternKind::ActiveBreakIn);
        assert_eq!(pattern.confidence, 0.95);
        assert_eq!(pattern.threat_delta, 0.7);
    }

    #[test]
    fn intrusion_sequence_motion_entry_motion() {
        let (clock, analyzer) = setup();
        analyzer.observe(event(&clock, EventKind::Motion, "backyard"));
        clock.advance(Duration::seconds(10));
        analyzer.observe(event(&clock, EventKind::Door, "back_door"));
        clock.advance(Duration::seconds(8));
        let pattern = analyzer
            .observe(event(&clock, EventKind::Motion, "kitchen"))
            .expect("pattern expected");
        assert_eq!(pattern.kind, ChainPatternKind::IntrusionSequence);
    }

    #[test]
    fn forced_entry_three_entry_events() {
        let (clock, analyzer) = setup();
        analyzer.observe(event(&clock, EventKind::Door, "back_door"));
        clock.advance(Duration::seconds(4));
        analyzer.observe(event(&clock, EventKind::Window, "back_door"));
        clock.advance(Duration::seconds(4));
        let pattern = analyzer
            .observe(event(&clock, EventKind::Door, "back_door"))
            .expect("pattern expected");
        assert_eq!(pattern.kind, ChainPatternKind::ForcedEntry);
        assert_eq!(pattern.threat_delta, 0.6);
    }

    #[test]
    fn prowler_needs_three_distinct_locations() {
        let (clock, analyzer) = setup();
        analyzer.observe(event(&clock, EventKind::Motion, "backyard"));
        clock.advance(Duration::seconds(15));
        assert!(analyzer
            .observe(event(&clock, EventKind::Motion, "side_yard"))
            .is_none());
        clock.advance(Duration::seconds(15));
        let pattern = analyzer
            .observe(event(&clock, EventKind::Motion, "driveway"))
            .expect("pattern expected");
        assert_eq!(pattern.kind, ChainPatternKind::ProwlerActivity);
        assert_eq!(pattern.threat_delta, 0.45);
    }

    #[test]
    fn window_evicts_after_sixty_seconds() {
        let (clock, analyzer) = setup();
        analyzer.observe(event(&clock, EventKind::Motion, "backyard"));
        analyzer.observe(event(&clock, EventKind::Motion, "side_yard"));
        assert_eq!(analyzer.len(), 2);
        clock.advance(Duration::seconds(61));
        assert_eq!(analyzer.len(), 0);
        // stale motions no longer count toward prowler
        analyzer.observe(event(&clock, EventKind::Motion, "driveway"));
        assert_eq!(analyzer.len(), 1);
    }

    #[test]
    fn capacity_is_bounded() {
        let (clock, analyzer) = setup();
        for i in 0..150 {
            analyzer.observe(event(&clock, EventKind::Sound, &format!("loc_{i}")));
        }
        assert!(analyzer.len() <= 100);
    }
}
