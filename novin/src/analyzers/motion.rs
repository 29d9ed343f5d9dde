// novin/src/analyzers/motion.rs
//
// Motion analysis in two layers:
//   analyze      — raw accelerometer-style samples (or event metadata) →
//                  duration/energy/peak/variance → activity class.
//                  The classification ladder is ordered; first match wins.
//   fuzzy_assess — trapezoidal membership kernel over duration, energy,
//                  zone risk, hour and home mode, firing four intent rules
//                  (delivery, pet, loitering, prowler) and defuzzifying to
//                  a crisp threat contribution.

use serde::{Deserialize, Serialize};

use crate::events::{EventMetadata, HomeMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Stationary,
    Walking,
    Running,
    Vehicle,
    Pet,
    PackageDrop,
    Loitering,
    Unknown,
}

impl std::fmt::Display for ActivityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stationary  => write!(f, "stationary"),
            Self::Walking     => write!(f, "walking"),
            Self::Running     => write!(f, "running"),
            Self::Vehicle     => write!(f, "vehicle"),
            Self::Pet         => write!(f, "pet"),
            Self::PackageDrop => write!(f, "package_drop"),
            Self::Loitering   => write!(f, "loitering"),
            Self::Unknown     => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotionFeatures {
    pub duration_s:     f64,
    pub energy:         f64,
    pub peak_intensity: f64,
    pub vector_norm:    f64,
    pub variance:       f64,
    pub activity_type:  ActivityType,
    pub confidence:     f64,
}

/// Classify from raw samples. `duration` is seconds; samples are expected in
/// [0,1] and the derived energy/peak are clamped there.
pub fn analyze(samples: &[f64], _sample_rate: f64, duration: f64) -> MotionFeatures {
    let duration = duration.max(0.0);
    if samples.is_empty() {
        return classify(duration, 0.0, 0.0, 0.0, 0.0);
    }

    let n = samples.len() as f64;
    let sum_sq: f64 = samples.iter().map(|x| x * x).sum();
    let energy = (sum_sq / n).sqrt().clamp(0.0, 1.0);
    let peak = samples.iter().cloned().fold(0.0f64, f64::max).clamp(0.0, 1.0);
    let vector_norm = sum_sq.sqrt();
    let mean = samples.iter().sum::<f64>() / n;
    let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;

    classify(duration, energy, peak, vector_norm, variance)
}

/// Classify from event metadata when no raw samples are attached.
pub fn analyze_metadata(meta: &EventMetadata) -> MotionFeatures {
    if let (Some(samples), Some(rate)) = (&meta.samples, meta.sample_rate) {
        let duration = meta
            .duration
            .unwrap_or_else(|| if rate > 0.0 { samples.len() as f64 / rate } else { 0.0 });
        return analyze(samples, rate, duration);
    }
    let duration = meta.duration.unwrap_or(0.0).max(0.0);
    let energy = meta.energy.or(meta.intensity).unwrap_or(0.0).clamp(0.0, 1.0);
    // Without samples there is no spread estimate; intensity stands in for peak
    let peak = meta.intensity.unwrap_or(energy).clamp(0.0, 1.0);
    classify(duration, energy, peak, energy, 0.05)
}

fn classify(duration: f64, energy: f64, peak: f64, vector_norm: f64, variance: f64) -> MotionFeatures {
    // Ladder order is fixed; first match wins.
    let (activity_type, confidence) = if energy < 0.1 && duration < 2.0 {
        (ActivityType::Stationary, 0.95)
    } else if duration < 10.0 && energy < 0.4 && variance < 0.1 {
        (ActivityType::PackageDrop, 0.88)
    } else if duration < 15.0 && energy < 0.5 && variance > 0.15 {
        (ActivityType::Pet, 0.82)
    } else if duration > 30.0 && energy > 0.3 && energy < 0.6 && variance < 0.12 {
        (ActivityType::Loitering, 0.85)
    } else if energy > 0.7 || peak > 0.8 {
        (ActivityType::Running, 0.90)
    } else if energy > 0.85 && duration > 5.0 {
        (ActivityType::Vehicle, 0.75)
    } else if energy > 0.3 && energy < 0.7 && duration > 5.0 {
        (ActivityType::Walking, 0.80)
    } else {
        (ActivityType::Unknown, 0.50)
    };

    MotionFeatures {
        duration_s: duration,
        energy,
        peak_intensity: peak,
        vector_norm,
        variance,
        activity_type,
        confidence,
    }
}

// ── Fuzzy intent kernel ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    Delivery,
    Pet,
    Loitering,
    Prowler,
}

impl std::fmt::Display for IntentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Delivery  => write!(f, "delivery"),
            Self::Pet       => write!(f, "pet"),
            Self::Loitering => write!(f, "loitering"),
            Self::Prowler   => write!(f, "prowler"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuzzyIntent {
    pub delivery:  f64,
    pub pet:       f64,
    pub loitering: f64,
    pub prowler:   f64,
    /// Strongest rule activation, None when nothing fired.
    pub dominant:  Option<IntentKind>,
    /// Defuzzified threat contribution in [0,1].
    pub threat:    f64,
}

/// Trapezoidal membership: 0 outside (a,d), ramps over [a,b] and [c,d],
/// flat 1 over [b,c]. Callers keep a < b and c < d.
fn trapezoid(x: f64, a: f64, b: f64, c: f64, d: f64) -> f64 {
    if x <= a || x >= d {
        0.0
    } else if x < b {
        (x - a) / (b - a)
    } else if x <= c {
        1.0
    } else {
        (d - x) / (d - c)
    }
}

/// Fire the four intent rules and defuzzify. `pet_hint` is 1.0 when the
/// sensor itself tagged the event as a pet.
pub fn fuzzy_assess(
    duration: f64,
    energy: f64,
    zone_risk: f64,
    hour: u32,
    mode: HomeMode,
    pet_hint: f64,
) -> FuzzyIntent {
    let h = hour as f64;

    // linguistic terms
    let dur_short = trapezoid(duration, -1.0, 0.0, 5.0, 15.0);
    let dur_medium = trapezoid(duration, 10.0, 20.0, 40.0, 60.0);
    let dur_long = trapezoid(duration, 45.0, 90.0, 1e9, 2e9);

    let energy_low = trapezoid(energy, -1.0, 0.0, 0.15, 0.35);
    let energy_medium = trapezoid(energy, 0.25, 0.4, 0.55, 0.7);

    let zone_interior = trapezoid(zone_risk, -1.0, 0.0, 0.35, 0.5);
    let zone_perimeter = trapezoid(zone_risk, 0.35, 0.45, 0.6, 0.7);
    let zone_entry = trapezoid(zone_risk, 0.55, 0.65, 1.0, 2.0);

    let day = trapezoid(h, 5.0, 7.0, 17.0, 20.0);
    let night = 1.0 - day;

    let away_like = match mode {
        HomeMode::Away | HomeMode::Vacation => 1.0,
        HomeMode::Unknown => 0.5,
        HomeMode::Home => 0.0,
    };

    // rules (min-conjunction)
    let delivery = dur_short.min(zone_entry).min(day);
    let pet = pet_hint.max(energy_low.min(zone_interior));
    let loitering = dur_long
        .max(dur_medium * 0.6)
        .min(energy_medium)
        .min(zone_perimeter.max(zone_entry));
    let prowler = dur_long
        .max(dur_medium * 0.7)
        .min(night)
        .min(zone_perimeter)
        .min(away_like);

    let activations = [
        (IntentKind::Delivery, delivery, 0.2),
        (IntentKind::Pet, pet, 0.1),
        (IntentKind::Loitering, loitering, 0.5),
        (IntentKind::Prowler, prowler, 0.75),
    ];

    let total: f64 = activations.iter().map(|(_, mu, _)| mu).sum();
    let threat = if total > 0.0 {
        activations.iter().map(|(_, mu, w)| mu * w).sum::<f64>() / total
    } else {
        0.0
    };

    let dominant = activations
        .iter()
        .filter(|(_, mu, _)| *mu > 0.0)
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(kind, _, _)| *kind);

    FuzzyIntent {
        delivery,
        pet,
        loitering,
        prowler,
        dominant,
        threat: threat.clamp(0.0, 1.0),
    }
}
