// novin/src/engine/fusion.rs
//
// Bayesian evidence accumulation fused with the rule-engine score.
//
// Evidence factors carry per-class likelihoods and a weight; presence is
// continuous in [0,1] so graded signals (crime rate, incident density)
// contribute proportionally. The update runs in log-odds with the likelihood
// ratio clamped at EPSILON — never naive probability multiplication — so a
// stack of strong factors cannot overflow or collapse to 0/1.
//
// Rule–Bayes blending depends on evidence diversity (mean weight of the
// contributing factors): diverse evidence shifts trust toward the Bayesian
// posterior, thin evidence leans on the declarative rules.

use serde::{Deserialize, Serialize};

use crate::analyzers::features::NamedFeatures;
use crate::error::SdkError;
use crate::events::HomeMode;

const EPSILON: f64 = 1e-9;
const BASE_RATE: f64 = 0.05;
const PRESENCE_FLOOR: f64 = 0.1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceFactor {
    pub name:                String,
    /// Continuous evidence strength in [0,1].
    pub present:             f64,
    pub threat_likelihood:   f64,
    pub no_threat_likelihood: f64,
    pub weight:              f64,
}

impl EvidenceFactor {
    fn new(name: &str, present: f64, threat: f64, no_threat: f64, weight: f64) -> Self {
        Self {
            name:                 name.to_string(),
            present:              present.clamp(0.0, 1.0),
            threat_likelihood:    threat,
            no_threat_likelihood: no_threat,
            weight,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionResult {
    pub final_score:           f64,
    pub confidence:            f64,
    pub explanation:           Vec<String>,
    pub bayesian_contribution: f64,
    pub rule_contribution:     f64,
}

/// Fixed mapping from named features to evidence factors. Factors whose
/// presence is ≤ the floor are skipped by the update.
pub fn extract_evidence(features: &NamedFeatures, mode: HomeMode) -> Vec<EvidenceFactor> {
    let mut factors = Vec::new();

    let night = if features.hour_cos < -0.5 { 1.0 } else { 0.0 };
    factors.push(EvidenceFactor::new("night", night, 0.80, 0.30, 1.5));

    // crime rate scales linearly from 0.2 → 0 presence to 1.0 → full
    let crime_presence = ((features.crime_rate_24h - 0.2) / 0.8).clamp(0.0, 1.0);
    factors.push(EvidenceFactor::new("high_crime", crime_presence, 0.90, 0.10, 2.0));

    factors.push(EvidenceFactor::new(
        "glass_break",
        features.event_glassbreak,
        0.95,
        0.05,
        2.5,
    ));
    factors.push(EvidenceFactor::new("fire", features.event_fire, 0.98, 0.05, 3.0));

    let away = match mode {
        HomeMode::Away | HomeMode::Vacation => 1.0,
        _ => 0.0,
    };
    factors.push(EvidenceFactor::new("away_mode", away, 0.90, 0.10, 2.0));

    // unknown face only counts when the match trust is low
    if features.user_trust_level < 0.5 {
        factors.push(EvidenceFactor::new(
            "unknown_face",
            features.event_face,
            0.90,
            0.05,
            2.2,
        ));
    }

    factors.push(EvidenceFactor::new("door_activity", features.event_door, 0.70, 0.30, 1.0));
    factors.push(EvidenceFactor::new(
        "window_activity",
        features.event_window,
        0.75,
        0.25,
        1.2,
    ));
    factors.push(EvidenceFactor::new(
        "multiple_sensors",
        if features.sensor_count > 0.5 { 1.0 } else { 0.0 },
        0.75,
        0.30,
        1.2,
    ));
    factors.push(EvidenceFactor::new(
        "nearby_incidents",
        features.nearby_incidents,
        0.80,
        0.25,
        1.0,
    ));

    if features.activity_consistency < 0.3 {
        factors.push(EvidenceFactor::new(
            "unusual_activity",
            1.0 - features.activity_consistency,
            0.70,
            0.35,
            0.8,
        ));
    }

    factors.push(EvidenceFactor::new("pet", features.event_pet, 0.10, 0.90, 0.5));

    factors
}

/// Log-odds posterior over the evidence set, from a 5% base rate.
pub fn bayesian_posterior(factors: &[EvidenceFactor]) -> Result<(f64, f64), SdkError> {
    let mut logit = (BASE_RATE / (1.0 - BASE_RATE)).ln();
    let mut weight_sum = 0.0;
    let mut contributing = 0usize;

    for factor in factors {
        if factor.present <= PRESENCE_FLOOR {
            continue;
        }
        let ratio = (factor.threat_likelihood / factor.no_threat_likelihood.max(EPSILON))
            .max(EPSILON);
        logit += ratio.ln() * factor.weight * factor.present;
        weight_sum += factor.weight;
        contributing += 1;
    }

    if !logit.is_finite() {
        return Err(SdkError::ProcessingFailed("non-finite log-odds".into()));
    }

    let posterior = 1.0 / (1.0 + (-logit).exp());
    let diversity = if contributing > 0 {
        weight_sum / contributing as f64
    } else {
        0.0
    };
    Ok((posterior, diversity))
}

/// Fuse the Bayesian posterior with the rule-engine risk score.
pub fn fuse(
    factors: &[EvidenceFactor],
    rule_score: f64,
) -> Result<FusionResult, SdkError> {
    let (bayes, diversity) = bayesian_posterior(factors)?;

    let (bayes_weight, rule_weight) = if diversity > 1.2 {
        (0.65, 0.35)
    } else {
        (0.55, 0.45)
    };

    let mut fused = bayes_weight * bayes + rule_weight * rule_score;
    let agreement = 1.0 - (bayes - rule_score).abs();
    let confidence = (0.6 * agreement + 0.4 * (diversity / 2.0).min(1.0)).clamp(0.0, 1.0);

    if !fused.is_finite() || !confidence.is_finite() {
        return Err(SdkError::ProcessingFailed("non-finite fusion output".into()));
    }

    // soft caps keep headroom for the dampening stages
    if fused > 0.95 && confidence > 0.8 {
        fused = 0.95;
    } else if fused < 0.05 && confidence > 0.8 {
        fused = 0.05;
    }
    fused = fused.clamp(0.0, 1.0);

    let mut explanation: Vec<String> = factors
        .iter()
        .filter(|f| f.present > PRESENCE_FLOOR)
        .map(|f| {
            if f.threat_likelihood >= f.no_threat_likelihood {
                format!("{} (+{:.1}w)", f.name, f.weight)
            } else {
                format!("{} (-{:.1}w)", f.name, f.weight)
            }
        })
        .collect();
    explanation.push(format!(
        "bayesian {:.3} / rules {:.3}, blended {:.0}/{:.0}",
        bayes,
        rule_score,
        bayes_weight * 100.0,
        rule_weight * 100.0
    ));

    Ok(FusionResult {
        final_score:           fused,
        confidence,
        explanation,
        bayesian_contribution: bayes,
        rule_contribution:     rule_score,
    })
}
