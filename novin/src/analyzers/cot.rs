// novin/src/analyzers/cot.rs
//
// Deterministic chain-of-thought scorer: five fixed steps from a 0.5 prior,
// each appending one trace line. No randomness, no learned weights — the
// trace doubles as the human-readable reasoning for the explanation engine.

use serde::{Deserialize, Serialize};

use crate::analyzers::features::NamedFeatures;
use crate::events::{EventKind, HomeMode};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CotAssessment {
    pub score:      f64,
    pub confidence: f64,
    pub trace:      Vec<String>,
}

pub fn assess(
    kind: EventKind,
    features: &NamedFeatures,
    mode: HomeMode,
    sensors_triggered: u32,
) -> CotAssessment {
    let mut score: f64 = 0.5;
    let mut confidence: f64 = 0.5;
    let mut trace = Vec::with_capacity(5);

    // 1. observe
    trace.push(format!(
        "observed {} event with sensor confidence {:.2}",
        kind, features.event_confidence
    ));

    // 2. time context
    let night = features.hour_cos < -0.5;
    if night {
        score += 0.3;
        confidence += 0.1;
        trace.push("night hours raise baseline concern".into());
    } else {
        score -= 0.1;
        trace.push("daytime lowers baseline concern".into());
    }

    // 3. occupancy
    match mode {
        HomeMode::Away => {
            score += 0.4;
            confidence += 0.1;
            trace.push("home is in away mode; nobody should be present".into());
        }
        HomeMode::Vacation => {
            score += 0.3;
            confidence += 0.1;
            trace.push("home is in vacation mode; extended absence expected".into());
        }
        HomeMode::Home => {
            score -= 0.2;
            trace.push("occupants are home; most activity is expected".into());
        }
        HomeMode::Unknown => {
            trace.push("occupancy unknown; no adjustment".into());
        }
    }

    // 4. event severity
    let severity = match kind {
        EventKind::Glassbreak => {
            trace.push("glass break is a strong forced-entry indicator".into());
            0.6
        }
        EventKind::Fire => {
            trace.push("fire signature overrides occupancy reasoning".into());
            0.7
        }
        EventKind::Motion => {
            if features.event_confidence > 0.8 {
                trace.push("high-confidence motion detection".into());
                0.3
            } else {
                trace.push("low-confidence motion detection".into());
                0.1
            }
        }
        EventKind::Door | EventKind::Window => {
            trace.push("entry-point activity".into());
            0.4
        }
        EventKind::Face => {
            if features.user_trust_level < 0.3 {
                trace.push("face not matched to a trusted profile".into());
                0.5
            } else {
                trace.push("face matches a trusted profile".into());
                -0.3
            }
        }
        EventKind::Pet => {
            trace.push("pet-classified event is benign".into());
            -0.4
        }
        _ => {
            trace.push("no specific severity model for this event kind".into());
            0.1
        }
    };
    score += severity;
    if severity.abs() >= 0.3 {
        confidence += 0.1;
    }

    // 5. external context
    let crime = features.crime_rate_24h;
    score += crime * 0.3;
    if sensors_triggered > 2 {
        score += 0.1;
        confidence += 0.1;
        trace.push(format!(
            "external: crime rate {:.2}, {} sensors corroborate",
            crime, sensors_triggered
        ));
    } else {
        score -= 0.1;
        trace.push(format!(
            "external: crime rate {:.2}, limited sensor corroboration",
            crime
        ));
    }

    CotAssessment {
        score:      score.clamp(0.0, 1.0),
        confidence: confidence.clamp(0.3, 1.0),
        trace,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::features::NamedFeatures;

    fn night_features() -> NamedFeatures {
        NamedFeatures {
            hour_cos: -0.9,
            event_confidence: 0.9,
            ..Default::default()
        }
    }

    #[test]
    fn glassbreak_away_at_night_scores_high() {
        let cot = assess(EventKind::Glassbreak, &night_features(), HomeMode::Away, 1);
        // 0.5 + 0.3 + 0.4 + 0.6 - 0.1 = 1.7 → clamped
        assert_eq!(cot.score, 1.0);
        assert_eq!(cot.trace.len(), 5);
        assert!(cot.confidence >= 0.7);
    }

    #[test]
    fn pet_at_home_daytime_scores_low() {
        let features = NamedFeatures {
            hour_cos: 0.8,
            event_confidence: 0.7,
            ..Default::default()
        };
        let cot = assess(EventKind::Pet, &features, HomeMode::Home, 0);
        // 0.5 - 0.1 - 0.2 - 0.4 - 0.1 = -0.3 → clamped
        assert_eq!(cot.score, 0.0);
    }

    #[test]
    fn trusted_face_reduces_score() {
        let mut features = night_features();
        features.user_trust_level = 0.9;
        let trusted = assess(EventKind::Face, &features, HomeMode::Home, 0);
        features.user_trust_level = 0.1;
        let stranger = assess(EventKind::Face, &features, HomeMode::Home, 0);
        assert!(stranger.score > trusted.score);
    }

    #[test]
    fn sensor_corroboration_and_crime_push_up() {
        let mut features = night_features();
        features.crime_rate_24h = 0.5;
        let corroborated = assess(EventKind::Motion, &features, HomeMode::Away, 4);
        let lone = assess(EventKind::Motion, &features, HomeMode::Away, 1);
        assert!(corroborated.score > lone.score);
        assert!((corroborated.score - lone.score - 0.2).abs() < 1e-9);
    }

    #[test]
    fn deterministic() {
        let a = assess(EventKind::Door, &night_features(), HomeMode::Away, 3);
        let b = assess(EventKind::Door, &night_features(), HomeMode::Away, 3);
        assert_eq!(a.score, b.score);
        assert_eq!(a.trace, b.trace);
    }
}
