// novin/src/sdk.rs
//
// Orchestrator. NovinSdk is a cheap-clone handle over one shared core; the
// host owns it explicitly, and an optional global registry covers call sites
// that want singleton ergonomics.
//
// assess() is re-entrant: per-call work (features, rules, CoT, fusion,
// explanation) allocates only call-local data, and the five stateful
// components — chain buffer, patterns, audit, limiter, health — each guard
// themselves. Nothing shared mutates before the rate-limit gate admits the
// call and the request parses, so rejected calls leave no trace.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use chrono::Timelike;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::analyzers::chain::ChainAnalyzer;
use crate::analyzers::cot;
use crate::analyzers::features;
use crate::analyzers::motion::{self, FuzzyIntent, MotionFeatures};
use crate::analyzers::rules::RuleEngine;
use crate::analyzers::zones::{Zone, ZoneClassifier};
use crate::clock::{system_clock, SharedClock};
use crate::config::{SdkConfig, SdkMode};
use crate::engine::{explain, fusion, temporal};
use crate::error::{Result, SdkError};
use crate::events::{
    AssessmentRequest, ChainPattern, EventKind, SecurityAssessment, SecurityEvent, ThreatLevel,
};
use crate::hashing::input_hash;
use crate::health::{HealthMonitor, SystemHealth};
use crate::limiter::RateLimiter;
use crate::state::audit::{AuditRecord, AuditTrail, FusionBreakdown, TemporalFactors};
use crate::state::kv::{KvStore, PersistQueue, KEY_AUDIT_TRAIL, KEY_USER_PATTERNS};
use crate::state::patterns::PatternStore;

const MENTAL_MODEL_GAIN: f64 = 0.1;

struct SdkCore {
    config:   SdkConfig,
    clock:    SharedClock,
    zones:    ZoneClassifier,
    rules:    RuleEngine,
    chain:    ChainAnalyzer,
    patterns: PatternStore,
    audit:    AuditTrail,
    limiter:  RateLimiter,
    health:   HealthMonitor,
    persist:  Option<PersistQueue>,
}

#[derive(Clone)]
pub struct NovinSdk {
    core: Arc<SdkCore>,
}

impl NovinSdk {
    /// Initialize with the system clock.
    pub fn initialize(config: SdkConfig) -> Result<Self> {
        Self::initialize_with_clock(config, system_clock())
    }

    /// Initialize with an injected clock (tests drive eviction and refill).
    pub fn initialize_with_clock(config: SdkConfig, clock: SharedClock) -> Result<Self> {
        let kv = KvStore::new(config.state_dir.clone());
        let health = HealthMonitor::new(clock.clone());

        let patterns = PatternStore::from_json(
            kv.get(KEY_USER_PATTERNS).as_deref(),
            clock.clone(),
            config.learning_rate,
        );
        let audit = AuditTrail::from_json(kv.get(KEY_AUDIT_TRAIL).as_deref(), config.audit_capacity);

        let persist = config
            .state_dir
            .is_some()
            .then(|| PersistQueue::start(kv, health.error_counter()));

        let core = SdkCore {
            zones: ZoneClassifier::with_defaults(),
            rules: RuleEngine::load(config.rules_path.as_deref()),
            chain: ChainAnalyzer::new(clock.clone(), config.chain_window_secs, config.chain_capacity),
            patterns,
            audit,
            limiter: RateLimiter::new(clock.clone(), config.max_tokens, config.refill_rate),
            health,
            persist,
            clock,
            config,
        };
        debug!("novin sdk initialized in {} mode", core.config.mode);
        Ok(Self { core: Arc::new(core) })
    }

    /// Blocking assessment; the full pipeline is CPU-bound.
    pub fn assess_blocking(&self, request_json: &str) -> Result<SecurityAssessment> {
        self.core.assess(request_json)
    }

    /// Future-returning form: offloads the same pipeline to a worker thread.
    pub async fn assess(&self, request_json: impl Into<String>) -> Result<SecurityAssessment> {
        let core = self.core.clone();
        let json: String = request_json.into();
        tokio::task::spawn_blocking(move || core.assess(&json))
            .await
            .map_err(|e| SdkError::Internal(format!("assessment task failed: {e}")))?
    }

    /// User feedback on a delivered assessment. Ignored in degraded and
    /// emergency modes.
    pub fn record_feedback(
        &self,
        event_type: &str,
        was_false_positive: bool,
        timestamp: Option<chrono::DateTime<chrono::Utc>>,
    ) {
        if matches!(self.core.config.mode, SdkMode::Degraded | SdkMode::Emergency) {
            return;
        }
        self.core
            .patterns
            .record_feedback(event_type, was_false_positive, timestamp);
        if let Some(queue) = &self.core.persist {
            if let Ok(json) = serde_json::to_string(&self.core.patterns.snapshot()) {
                queue.enqueue(KEY_USER_PATTERNS, json);
            }
        }
    }

    pub fn get_health(&self) -> SystemHealth {
        self.core.health.snapshot()
    }

    pub fn export_audit_trails(&self) -> String {
        self.core.audit.export()
    }

    pub fn find_audit_record(&self, request_id: Uuid) -> Option<AuditRecord> {
        self.core.audit.find(request_id)
    }

    pub fn mode(&self) -> SdkMode {
        self.core.config.mode
    }
}

// ── Global registry ───────────────────────────────────────────────────────────

static GLOBAL: OnceLock<NovinSdk> = OnceLock::new();

/// Install a process-wide instance. First call wins; later calls return the
/// already-installed handle.
pub fn init_global(config: SdkConfig) -> Result<&'static NovinSdk> {
    if let Some(sdk) = GLOBAL.get() {
        return Ok(sdk);
    }
    let sdk = NovinSdk::initialize(config)?;
    Ok(GLOBAL.get_or_init(|| sdk))
}

pub fn global() -> Result<&'static NovinSdk> {
    GLOBAL.get().ok_or(SdkError::NotInitialized)
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

impl SdkCore {
    fn assess(&self, request_json: &str) -> Result<SecurityAssessment> {
        if self.config.mode == SdkMode::Emergency {
            return Ok(self.emergency_assessment(request_json));
        }

        // 1. admission — rejected calls mutate nothing but the bucket
        if !self.limiter.allow(1.0) {
            return Err(SdkError::RateLimited);
        }

        // 2. parse + shape validation
        let request = AssessmentRequest::parse(request_json)?;
        let raw_value = crate::events::request_value(request_json)?;

        let started = Instant::now();
        self.health.enter();
        let result = self.run_pipeline(&request, &raw_value, started);
        self.health.exit();

        match &result {
            Ok(assessment) => {
                self.health.record_sample(assessment.processing_time_ms);
            }
            Err(SdkError::ProcessingFailed(detail)) => {
                warn!("assessment processing failed: {detail}");
                self.health.record_error();
            }
            Err(_) => {}
        }
        result
    }

    fn run_pipeline(
        &self,
        request: &AssessmentRequest,
        raw_value: &serde_json::Value,
        started: Instant,
    ) -> Result<SecurityAssessment> {
        let ts = request.resolved_timestamp(&self.clock);
        let hour = ts.hour();
        let mode = request.home_mode;
        let primary = request.primary_event();
        let kind = primary.kind();
        let sensors = primary
            .metadata
            .as_ref()
            .and_then(|m| m.sensors_triggered)
            .unwrap_or(1);

        // 3. features
        let features = features::extract_at(request, ts, &self.clock);

        // 4. reasoners
        let rule = self.rules.evaluate(&features, mode);

        if self.config.mode == SdkMode::Minimal {
            return self.finish(MinimalOutcome {
                raw_value,
                started,
                ts,
                hour,
                kind,
                score: rule.risk_score,
                confidence: rule.confidence,
                rule_score: rule.risk_score,
                rules_triggered: rule.rules_triggered,
            });
        }

        let cot = cot::assess(kind, &features, mode, sensors);
        let zone = self.zones.classify(request.location_name().unwrap_or(""));

        let chain_pattern = self.observe_chain(request, ts, &zone);

        let (motion_features, fuzzy) = self.analyze_motion(&primary, kind, &zone, hour, mode);

        // 5. fusion
        let evidence = fusion::extract_evidence(&features, mode);
        let fused = fusion::fuse(&evidence, rule.risk_score)?;

        // 6. dampening stages
        let mut score = fused.final_score;
        score += MENTAL_MODEL_GAIN * (cot.score - 0.5);

        let chain_delta = chain_pattern
            .as_ref()
            .map(|p| p.threat_delta * p.confidence)
            .unwrap_or(0.0);
        score += chain_delta;

        // life-safety events are never time-dampened
        let modifier = if matches!(kind, EventKind::Fire | EventKind::Glassbreak) {
            1.0
        } else {
            temporal::modifier(hour, mode)
        };
        score *= modifier;

        let dampening = if self.config.mode == SdkMode::Full {
            self.patterns.dampening_factor(&kind.to_string())
        } else {
            1.0
        };
        score *= dampening;
        score = score.clamp(0.0, 1.0);

        if !score.is_finite() {
            return Err(SdkError::ProcessingFailed("non-finite final score".into()));
        }

        // 7. band mapping
        let level = ThreatLevel::from_score(score);
        let confidence = chain_pattern
            .as_ref()
            .map(|p| fused.confidence.max(p.confidence))
            .unwrap_or(fused.confidence)
            .clamp(0.0, 1.0);

        // 8. explanation
        let insights = self.patterns.delivery_insights();
        let explanation = explain::build(&explain::ExplanationInput {
            level,
            chain_pattern: chain_pattern.as_ref(),
            motion: motion_features.as_ref(),
            zone: &zone,
            hour,
            mode,
            event_kind: kind,
            cot_trace: &cot.trace,
            delivery_insights: Some(&insights),
        });

        let processing_time_ms = started.elapsed().as_secs_f64() * 1000.0;
        let request_id = Uuid::new_v4();

        // 9. audit + pattern bookkeeping (post-decision, best-effort)
        if self.config.mode == SdkMode::Full {
            self.patterns.record_assessment();
        }

        let intermediate_scores: HashMap<String, f64> = HashMap::from([
            ("rule".to_string(), rule.risk_score),
            ("cot".to_string(), cot.score),
            ("bayesian".to_string(), fused.bayesian_contribution),
            ("fuzzy_threat".to_string(), fuzzy.as_ref().map(|f| f.threat).unwrap_or(0.0)),
        ]);

        self.audit.record(
            AuditRecord {
                request_id,
                timestamp: ts,
                input_hash: input_hash(raw_value),
                config_version: self.config.config_version.clone(),
                sdk_mode: self.config.mode.to_string(),
                event_type: kind.to_string(),
                location: zone.name.clone(),
                intermediate_scores,
                rules_triggered: rule.rules_triggered.clone(),
                chain_pattern: chain_pattern.as_ref().map(|p| p.kind),
                motion_activity: motion_features.as_ref().map(|m| m.activity_type.to_string()),
                zone_risk: zone.risk_score,
                threat_level: level,
                final_score: score,
                confidence,
                processing_time_ms,
                fusion: FusionBreakdown {
                    bayesian: fused.bayesian_contribution,
                    rule: fused.rule_contribution,
                    mental_model: cot.score,
                    temporal: modifier,
                    chain: chain_delta,
                    final_score: score,
                },
                temporal: TemporalFactors {
                    hour,
                    is_night: features.hour_cos < -0.5,
                    modifier,
                    dampening,
                },
            },
            self.persist.as_ref(),
        );

        Ok(SecurityAssessment {
            threat_level: level,
            confidence,
            processing_time_ms,
            reasoning: explanation.reasoning,
            request_id,
            timestamp: ts,
            event_type: kind.to_string(),
            summary: Some(explanation.summary),
            detailed_reasoning: Some(fused.explanation.join("; ")),
            context: explanation.context,
            recommendation: Some(explanation.recommendation),
        })
    }

    /// Every event in the request enters the chain buffer; the last detected
    /// pattern (if any) feeds the score and the explanation.
    fn observe_chain(
        &self,
        request: &AssessmentRequest,
        ts: chrono::DateTime<chrono::Utc>,
        zone: &Zone,
    ) -> Option<ChainPattern> {
        let mut pattern = None;
        let events = if request.events.is_empty() {
            vec![request.primary_event()]
        } else {
            request.events.clone()
        };
        for raw in &events {
            let location = raw
                .metadata
                .as_ref()
                .and_then(|m| m.room.clone())
                .map(|room| self.zones.classify(&room).name)
                .unwrap_or_else(|| zone.name.clone());
            let observed = self.chain.observe(SecurityEvent {
                kind: raw.kind(),
                timestamp: ts,
                location,
                confidence: raw.confidence,
            });
            if observed.is_some() {
                pattern = observed;
            }
        }
        pattern
    }

    fn analyze_motion(
        &self,
        primary: &crate::events::RawEvent,
        kind: EventKind,
        zone: &Zone,
        hour: u32,
        mode: crate::events::HomeMode,
    ) -> (Option<MotionFeatures>, Option<FuzzyIntent>) {
        if !matches!(kind, EventKind::Motion | EventKind::Pet) {
            return (None, None);
        }
        let meta = primary.metadata.clone().unwrap_or_default();
        let features = motion::analyze_metadata(&meta);
        let pet_hint = if kind == EventKind::Pet { 1.0 } else { 0.0 };
        let intent = motion::fuzzy_assess(
            features.duration_s,
            features.energy,
            zone.risk_score,
            hour,
            mode,
            pet_hint,
        );
        (Some(features), Some(intent))
    }

    fn emergency_assessment(&self, request_json: &str) -> SecurityAssessment {
        let kind = AssessmentRequest::parse(request_json)
            .map(|r| r.primary_event().kind())
            .unwrap_or(EventKind::Other);
        let now = self.clock.now();
        self.health.record_sample(0.0);
        SecurityAssessment {
            threat_level: ThreatLevel::Standard,
            confidence: 0.5,
            processing_time_ms: 0.0,
            reasoning: "emergency fallback: full pipeline unavailable, returning standard threat".into(),
            request_id: Uuid::new_v4(),
            timestamp: now,
            event_type: kind.to_string(),
            summary: Some("Assessment ran in emergency fallback mode.".into()),
            detailed_reasoning: None,
            context: Vec::new(),
            recommendation: Some("Review the event manually; automated reasoning was degraded.".into()),
        }
    }

    fn finish(&self, outcome: MinimalOutcome<'_>) -> Result<SecurityAssessment> {
        let MinimalOutcome {
            raw_value,
            started,
            ts,
            hour,
            kind,
            score,
            confidence,
            rule_score,
            rules_triggered,
        } = outcome;

        let level = ThreatLevel::from_score(score);
        let processing_time_ms = started.elapsed().as_secs_f64() * 1000.0;
        let request_id = Uuid::new_v4();

        self.audit.record(
            AuditRecord {
                request_id,
                timestamp: ts,
                input_hash: input_hash(raw_value),
                config_version: self.config.config_version.clone(),
                sdk_mode: self.config.mode.to_string(),
                event_type: kind.to_string(),
                location: "unknown".into(),
                intermediate_scores: HashMap::from([("rule".to_string(), rule_score)]),
                rules_triggered: rules_triggered.clone(),
                chain_pattern: None,
                motion_activity: None,
                zone_risk: 0.5,
                threat_level: level,
                final_score: score,
                confidence,
                processing_time_ms,
                fusion: FusionBreakdown {
                    bayesian: 0.0,
                    rule: rule_score,
                    mental_model: 0.5,
                    temporal: 1.0,
                    chain: 0.0,
                    final_score: score,
                },
                temporal: TemporalFactors {
                    hour,
                    is_night: false,
                    modifier: 1.0,
                    dampening: 1.0,
                },
            },
            self.persist.as_ref(),
        );

        Ok(SecurityAssessment {
            threat_level: level,
            confidence,
            processing_time_ms,
            reasoning: format!(
                "minimal mode: rule engine score {:.2} from [{}]",
                rule_score,
                rules_triggered.join(", ")
            ),
            request_id,
            timestamp: ts,
            event_type: kind.to_string(),
            summary: None,
            detailed_reasoning: None,
            context: Vec::new(),
            recommendation: None,
        })
    }
}

struct MinimalOutcome<'a> {
    raw_value:       &'a serde_json::Value,
    started:         Instant,
    ts:              chrono::DateTime<chrono::Utc>,
    hour:            u32,
    kind:            EventKind,
    score:           f64,
    confidence:      f64,
    rule_score:      f64,
    rules_triggered: Vec<String>,
}
