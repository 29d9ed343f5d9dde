// novin/src/engine/explain.rs
//
// Explanation synthesis. Pure function of the assessment inputs; templates
// are keyed by priority chain-pattern > motion-activity > threat-level, so
// the most specific story available is the one told. Tone drives how the
// host app renders and routes the notification.

use serde::{Deserialize, Serialize};

use crate::analyzers::motion::{ActivityType, MotionFeatures};
use crate::analyzers::zones::Zone;
use crate::events::{ChainPattern, ChainPatternKind, EventKind, HomeMode, ThreatLevel};
use crate::state::patterns::DeliveryInsights;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Urgent,
    Alerting,
    Reassuring,
    Informative,
}

impl std::fmt::Display for Tone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Urgent      => write!(f, "urgent"),
            Self::Alerting    => write!(f, "alerting"),
            Self::Reassuring  => write!(f, "reassuring"),
            Self::Informative => write!(f, "informative"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Explanation {
    pub summary:        String,
    pub reasoning:      String,
    pub context:        Vec<String>,
    pub recommendation: String,
    pub tone:           Tone,
}

pub struct ExplanationInput<'a> {
    pub level:             ThreatLevel,
    pub chain_pattern:     Option<&'a ChainPattern>,
    pub motion:            Option<&'a MotionFeatures>,
    pub zone:              &'a Zone,
    pub hour:              u32,
    pub mode:              HomeMode,
    pub event_kind:        EventKind,
    pub cot_trace:         &'a [String],
    pub delivery_insights: Option<&'a DeliveryInsights>,
}

pub fn build(input: &ExplanationInput<'_>) -> Explanation {
    let tone = tone_for(input.level, input.chain_pattern.map(|p| p.kind));
    let summary = summary_for(input);
    let recommendation = recommendation_for(input.level, input.chain_pattern.map(|p| p.kind));

    let mut context = Vec::new();
    context.push(format!("home mode: {}", input.mode));
    context.push(format!("time of day: {}", time_band(input.hour)));
    if input.zone.name != "unknown" {
        context.push(format!(
            "zone: {} ({}, base risk {:.2})",
            input.zone.name, input.zone.zone_type, input.zone.risk_score
        ));
    }
    if let Some(insights) = input.delivery_insights {
        if input.level <= ThreatLevel::Standard && insights.frequency > 0.4 {
            context.push(format!(
                "deliveries are frequent at this home (usual around {}:00)",
                insights.peak_hour
            ));
        }
    }

    let reasoning = input.cot_trace.join("; ");

    Explanation {
        summary,
        reasoning,
        context,
        recommendation,
        tone,
    }
}

fn tone_for(level: ThreatLevel, pattern: Option<ChainPatternKind>) -> Tone {
    if level == ThreatLevel::Critical || pattern == Some(ChainPatternKind::ActiveBreakIn) {
        return Tone::Urgent;
    }
    if level == ThreatLevel::Elevated || pattern == Some(ChainPatternKind::IntrusionSequence) {
        return Tone::Alerting;
    }
    if level == ThreatLevel::Low || pattern == Some(ChainPatternKind::PackageDelivery) {
        return Tone::Reassuring;
    }
    Tone::Informative
}

fn summary_for(input: &ExplanationInput<'_>) -> String {
    // chain pattern first — the most specific story
    if let Some(pattern) = input.chain_pattern {
        return match pattern.kind {
            ChainPatternKind::PackageDelivery => {
                "Looks like a package delivery at the door.".to_string()
            }
            ChainPatternKind::IntrusionSequence => format!(
                "Movement outside, then {} — someone may be working their way inside.",
                pattern
                    .events
                    .get(1)
                    .map(|e| format!("a {} opening", e.kind))
                    .unwrap_or_else(|| "an entry point opening".into())
            ),
            ChainPatternKind::ForcedEntry => {
                "Repeated door/window activity in seconds — consistent with forcing an entry point.".to_string()
            }
            ChainPatternKind::ActiveBreakIn => {
                "Glass broke and movement followed — treat this as a break-in in progress.".to_string()
            }
            ChainPatternKind::ProwlerActivity => {
                "Movement across several zones in under a minute — someone may be circling the property.".to_string()
            }
        };
    }

    // then motion activity
    if let Some(motion) = input.motion {
        let place = if input.zone.name == "unknown" {
            "the property".to_string()
        } else {
            format!("the {}", input.zone.name.replace('_', " "))
        };
        return match motion.activity_type {
            ActivityType::PackageDrop => format!("Brief activity at {place} — likely a drop-off."),
            ActivityType::Pet        => format!("Motion at {place} matches a pet, not a person."),
            ActivityType::Loitering  => format!(
                "Sustained presence at {place} for {:.0} seconds.",
                motion.duration_s
            ),
            ActivityType::Running    => format!("Fast movement detected at {place}."),
            ActivityType::Vehicle    => format!("Vehicle activity at {place}."),
            ActivityType::Walking    => format!("Someone walking at {place}."),
            ActivityType::Stationary => format!("A stationary presence at {place}."),
            ActivityType::Unknown    => format!("Unclassified motion at {place}."),
        };
    }

    // threat-level fallback
    match input.level {
        ThreatLevel::Critical => format!(
            "Critical: {} event requires immediate attention.",
            input.event_kind
        ),
        ThreatLevel::Elevated => format!(
            "Elevated concern from a {} event.",
            input.event_kind
        ),
        ThreatLevel::Standard => format!("A {} event worth a look.", input.event_kind),
        ThreatLevel::Low => format!("Routine {} event; nothing unusual.", input.event_kind),
    }
}

fn recommendation_for(level: ThreatLevel, pattern: Option<ChainPatternKind>) -> String {
    if pattern == Some(ChainPatternKind::ActiveBreakIn) || level == ThreatLevel::Critical {
        return "Check the live camera now and consider contacting emergency services.".into();
    }
    if pattern == Some(ChainPatternKind::PackageDelivery) {
        return "No action needed — collect the package when convenient.".into();
    }
    match level {
        ThreatLevel::Elevated => "Review the camera feed and confirm the activity is expected.".into(),
        ThreatLevel::Standard => "Glance at the event clip when you have a moment.".into(),
        _ => "No action needed.".into(),
    }
}

fn time_band(hour: u32) -> &'static str {
    match hour {
        5..=11  => "morning",
        12..=16 => "afternoon",
        17..=20 => "evening",
        _       => "night",
    }
}
