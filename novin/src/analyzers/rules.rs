// novin/src/analyzers/rules.rs
//
// Declarative rule engine. Rules ship as a packaged JSON resource (overridable
// via config); a missing or corrupt resource is non-fatal and falls back to a
// minimal built-in set. A rule fires when at least 70% of its conditions hold
// against the extracted features. The condition vocabulary is closed — an
// unrecognized condition never matches and is logged once at load.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::analyzers::features::NamedFeatures;
use crate::events::{HomeMode, ThreatLevel};

const PACKAGED_RULES: &str = include_str!("../../rules/default_rules.json");
const FIRE_FRACTION: f64 = 0.7;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub name:        String,
    pub conditions:  Vec<String>,
    pub weight:      f64,
    pub score:       f64,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleAssessment {
    pub risk_score:      f64,
    pub confidence:      f64,
    pub level:           ThreatLevel,
    pub rules_triggered: Vec<String>,
}

pub struct RuleEngine {
    rules: Vec<Rule>,
}

impl RuleEngine {
    /// Load the packaged rule set, or an override file when configured.
    pub fn load(override_path: Option<&Path>) -> Self {
        if let Some(path) = override_path {
            match std::fs::read_to_string(path) {
                Ok(text) => match serde_json::from_str::<Vec<Rule>>(&text) {
                    Ok(rules) => {
                        debug!("loaded {} rules from {}", rules.len(), path.display());
                        return Self { rules };
                    }
                    Err(e) => warn!("rule override {} unparsable ({e}); using packaged set", path.display()),
                },
                Err(e) => warn!("rule override {} unreadable ({e}); using packaged set", path.display()),
            }
        }
        match serde_json::from_str::<Vec<Rule>>(PACKAGED_RULES) {
            Ok(rules) => Self { rules },
            Err(e) => {
                warn!("packaged rules unparsable ({e}); using built-in fallback");
                Self { rules: builtin_fallback() }
            }
        }
    }

    pub fn from_rules(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn evaluate(&self, features: &NamedFeatures, mode: HomeMode) -> RuleAssessment {
        let mut weighted_score = 0.0;
        let mut weight_total = 0.0;
        let mut triggered = Vec::new();

        for rule in &self.rules {
            if rule.conditions.is_empty() {
                continue;
            }
            let matched = rule
                .conditions
                .iter()
                .filter(|c| condition_holds(c, features, mode))
                .count();
            let fraction = matched as f64 / rule.conditions.len() as f64;
            if fraction + 1e-9 < FIRE_FRACTION {
                continue;
            }

            let confidence = rule_confidence(features, mode);
            weighted_score += rule.weight * confidence * rule.score;
            weight_total += rule.weight * confidence;
            triggered.push(rule.name.clone());
        }

        let risk_score = if weight_total > 0.0 {
            weighted_score / weight_total
        } else {
            0.5
        };
        let confidence = if triggered.is_empty() {
            0.5
        } else {
            rule_confidence(features, mode)
        };

        RuleAssessment {
            risk_score,
            confidence,
            level: ThreatLevel::from_score(risk_score),
            rules_triggered: triggered,
        }
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

/// Per-rule confidence: base 0.7, +0.1 for each corroborating signal,
/// clamped to [0.3, 1.0].
fn rule_confidence(features: &NamedFeatures, mode: HomeMode) -> f64 {
    let mut confidence: f64 = 0.7;
    if features.crime_rate_24h > 0.2 {
        confidence += 0.1;
    }
    if features.sensor_count > 0.5 {
        confidence += 0.1;
    }
    if features.event_confidence > 0.7 {
        confidence += 0.1;
    }
    if mode == HomeMode::Away {
        confidence += 0.1;
    }
    confidence.clamp(0.3, 1.0)
}

fn is_night(features: &NamedFeatures) -> bool {
    features.hour_cos < -0.5
}

fn condition_holds(condition: &str, features: &NamedFeatures, mode: HomeMode) -> bool {
    match condition {
        // temporal
        "time_night"   => is_night(features),
        "time_day"     => !is_night(features),
        "recent_event" => features.hours_since_last_event < 0.1,
        "unusual_hour" => is_night(features) && features.hour_sin < 0.0,
        // spatial
        "high_crime" => features.crime_rate_24h > 0.2,
        "low_crime"  => features.crime_rate_24h < 0.05,
        // behavioral
        "away_mode"        => mode == HomeMode::Away || mode == HomeMode::Vacation,
        "high_risk_user"   => features.user_risk_score > 0.6,
        "unusual_activity" => features.activity_consistency < 0.3,
        // sensor
        "multiple_sensors" => features.sensor_count > 0.5,
        "high_confidence"  => features.event_confidence > 0.7,
        // event_* prefix: threshold 0.5 on the corresponding feature
        other if other.starts_with("event_") => {
            features.get(other).map(|v| v >= 0.5).unwrap_or(false)
        }
        other => {
            debug!("unknown rule condition {other:?} never matches");
            false
        }
    }
}

fn builtin_fallback() -> Vec<Rule> {
    vec![
        Rule {
            name:        "glassbreak_immediate".into(),
            conditions:  vec!["event_glassbreak".into(), "high_confidence".into()],
            weight:      2.5,
            score:       0.95,
            description: None,
        },
        Rule {
            name:        "fire_immediate".into(),
            conditions:  vec!["event_fire".into(), "high_confidence".into()],
            weight:      3.0,
            score:       1.0,
            description: None,
        },
        Rule {
            name:        "night_entry_away".into(),
            conditions:  vec!["time_night".into(), "event_door".into(), "away_mode".into()],
            weight:      2.0,
            score:       0.85,
            description: None,
        },
    ]
}
