// novin/src/state/audit.rs
//
// Structured audit trail: one record per completed assessment, held in a
// bounded in-memory ring (≤1000) and mirrored to the key-value store through
// the persist queue. The input hash is the privacy-safe identifier — raw
// request bodies never land on disk.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::{ChainPatternKind, ScoreMap, ThreatLevel};
use crate::state::kv::{PersistQueue, KEY_AUDIT_TRAIL};

/// Per-stage score breakdown, recorded for reproducibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionBreakdown {
    pub bayesian:     f64,
    pub rule:         f64,
    pub mental_model: f64,
    pub temporal:     f64,
    pub chain:        f64,
    pub final_score:  f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporalFactors {
    pub hour:      u32,
    pub is_night:  bool,
    pub modifier:  f64,
    pub dampening: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub request_id:         Uuid,
    pub timestamp:          DateTime<Utc>,
    pub input_hash:         String,
    pub config_version:     String,
    pub sdk_mode:           String,
    pub event_type:         String,
    pub location:           String,
    pub intermediate_scores: ScoreMap,
    pub rules_triggered:    Vec<String>,
    pub chain_pattern:      Option<ChainPatternKind>,
    pub motion_activity:    Option<String>,
    pub zone_risk:          f64,
    pub threat_level:       ThreatLevel,
    pub final_score:        f64,
    pub confidence:         f64,
    pub processing_time_ms: f64,
    pub fusion:             FusionBreakdown,
    pub temporal:           TemporalFactors,
}

pub struct AuditTrail {
    ring:     Mutex<VecDeque<AuditRecord>>,
    capacity: usize,
}

impl AuditTrail {
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: Mutex::new(VecDeque::with_capacity(capacity.min(64))),
            capacity,
        }
    }

    /// Restore the ring from a persisted JSON array; corruption → empty.
    pub fn from_json(json: Option<&str>, capacity: usize) -> Self {
        let trail = Self::new(capacity);
        if let Some(records) = json.and_then(|j| serde_json::from_str::<Vec<AuditRecord>>(j).ok()) {
            let mut ring = trail.ring.lock();
            for record in records.into_iter().rev().take(capacity).rev() {
                ring.push_back(record);
            }
        }
        trail
    }

    /// Append in completion order, trim to capacity, and hand a snapshot to
    /// the persist queue. The snapshot serialization happens on the caller
    /// once; disk IO happens on the worker.
    pub fn record(&self, record: AuditRecord, persist: Option<&PersistQueue>) {
        let snapshot = {
            let mut ring = self.ring.lock();
            ring.push_back(record);
            while ring.len() > self.capacity {
                ring.pop_front();
            }
            if persist.is_some() {
                serde_json::to_string(&ring.iter().collect::<Vec<_>>()).ok()
            } else {
                None
            }
        };
        if let (Some(queue), Some(json)) = (persist, snapshot) {
            queue.enqueue(KEY_AUDIT_TRAIL, json);
        }
    }

    pub fn find(&self, request_id: Uuid) -> Option<AuditRecord> {
        self.ring
            .lock()
            .iter()
            .rev()
            .find(|r| r.request_id == request_id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.ring.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All records as pretty-printed JSON, newest last.
    pub fn export(&self) -> String {
        let ring = self.ring.lock();
        serde_json::to_string_pretty(&ring.iter().collect::<Vec<_>>())
            .unwrap_or_else(|_| "[]".into())
    }
}
