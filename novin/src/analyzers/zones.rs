// novin/src/analyzers/zones.rs
//
// Zone classification: free-text location → canonical zone with a base risk
// score and a categorical type. Lookup is case- and separator-insensitive:
// exact name, then alias, then substring-contains on the canonical name,
// then the unknown fallback (risk 0.5, public_area).

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::SdkError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneType {
    Entry,
    Perimeter,
    Interior,
    PublicArea,
    Garage,
    Restricted,
    Transition,
    Outdoor,
}

impl std::fmt::Display for ZoneType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Entry      => write!(f, "entry"),
            Self::Perimeter  => write!(f, "perimeter"),
            Self::Interior   => write!(f, "interior"),
            Self::PublicArea => write!(f, "public_area"),
            Self::Garage     => write!(f, "garage"),
            Self::Restricted => write!(f, "restricted"),
            Self::Transition => write!(f, "transition"),
            Self::Outdoor    => write!(f, "outdoor"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Zone {
    pub name:           String,
    pub risk_score:     f64,
    pub zone_type:      ZoneType,
    #[serde(default)]
    pub aliases:        Vec<String>,
    #[serde(default)]
    pub adjacent_zones: Vec<String>,
}

impl Zone {
    fn new(name: &str, risk: f64, zone_type: ZoneType, aliases: &[&str], adjacent: &[&str]) -> Self {
        Self {
            name:           name.to_string(),
            risk_score:     risk,
            zone_type,
            aliases:        aliases.iter().map(|a| a.to_string()).collect(),
            adjacent_zones: adjacent.iter().map(|a| a.to_string()).collect(),
        }
    }

    pub fn unknown() -> Self {
        Zone::new("unknown", 0.5, ZoneType::PublicArea, &[], &[])
    }
}

pub struct ZoneClassifier {
    zones: Vec<Zone>,
}

fn normalize(text: &str) -> String {
    text.trim()
        .to_ascii_lowercase()
        .replace([' ', '-'], "_")
}

impl ZoneClassifier {
    pub fn with_defaults() -> Self {
        Self::from_zones(default_zones()).expect("default zone table is unique")
    }

    /// Build from a configured zone set. Every name and alias must be unique
    /// across the whole set.
    pub fn from_zones(zones: Vec<Zone>) -> Result<Self, SdkError> {
        let mut seen = HashSet::new();
        for zone in &zones {
            let canonical = normalize(&zone.name);
            if !seen.insert(canonical.clone()) {
                return Err(SdkError::InvalidInput(format!(
                    "duplicate zone name or alias: {canonical}"
                )));
            }
            for alias in &zone.aliases {
                let alias = normalize(alias);
                if !seen.insert(alias.clone()) {
                    return Err(SdkError::InvalidInput(format!(
                        "duplicate zone name or alias: {alias}"
                    )));
                }
            }
        }
        Ok(Self { zones })
    }

    pub fn classify(&self, location: &str) -> Zone {
        let needle = normalize(location);
        if needle.is_empty() {
            return Zone::unknown();
        }

        // exact canonical name
        if let Some(zone) = self.zones.iter().find(|z| normalize(&z.name) == needle) {
            return zone.clone();
        }
        // alias
        if let Some(zone) = self
            .zones
            .iter()
            .find(|z| z.aliases.iter().any(|a| normalize(a) == needle))
        {
            return zone.clone();
        }
        // substring on canonical name, either direction
        if let Some(zone) = self.zones.iter().find(|z| {
            let canonical = normalize(&z.name);
            needle.contains(&canonical) || canonical.contains(&needle)
        }) {
            return zone.clone();
        }

        Zone::unknown()
    }

    /// Escalation multiplier across an ordered zone sequence:
    /// perimeter→entry ×1.8, entry→interior ×2.0, perimeter→different
    /// perimeter ×1.4; capped at 3.0.
    pub fn escalation(&self, sequence: &[Zone]) -> f64 {
        let mut factor: f64 = 1.0;
        for pair in sequence.windows(2) {
            let (from, to) = (&pair[0], &pair[1]);
            match (from.zone_type, to.zone_type) {
                (ZoneType::Perimeter, ZoneType::Entry) => factor *= 1.8,
                (ZoneType::Entry, ZoneType::Interior) => factor *= 2.0,
                (ZoneType::Perimeter, ZoneType::Perimeter) if from.name != to.name => {
                    factor *= 1.4
                }
                _ => {}
            }
        }
        factor.min(3.0)
    }
}

impl Default for ZoneClassifier {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn default_zones() -> Vec<Zone> {
    vec![
        Zone::new("front_door", 0.70, ZoneType::Entry,
                  &["main_entrance", "front_entry"], &["front_porch", "hallway"]),
        Zone::new("back_door", 0.75, ZoneType::Entry,
                  &["rear_entrance", "back_entry"], &["backyard", "kitchen"]),
        Zone::new("front_porch", 0.65, ZoneType::Entry,
                  &["porch", "stoop"], &["front_door", "driveway"]),
        Zone::new("backyard", 0.60, ZoneType::Perimeter,
                  &["back_yard", "rear_yard", "garden"], &["back_door", "side_yard"]),
        Zone::new("side_yard", 0.60, ZoneType::Perimeter,
                  &["side_passage"], &["backyard", "driveway"]),
        Zone::new("driveway", 0.55, ZoneType::Perimeter,
                  &["drive"], &["garage", "street"]),
        Zone::new("garage", 0.65, ZoneType::Garage,
                  &["car_port", "carport"], &["driveway", "hallway"]),
        Zone::new("living_room", 0.50, ZoneType::Interior,
                  &["lounge", "family_room"], &["hallway", "kitchen"]),
        Zone::new("kitchen", 0.45, ZoneType::Interior,
                  &[], &["living_room", "back_door"]),
        Zone::new("bedroom", 0.55, ZoneType::Interior,
                  &["master_bedroom"], &["hallway"]),
        Zone::new("home_office", 0.60, ZoneType::Restricted,
                  &["office", "study"], &["hallway"]),
        Zone::new("hallway", 0.50, ZoneType::Transition,
                  &["corridor", "stairs"], &["living_room", "bedroom"]),
        Zone::new("street", 0.30, ZoneType::PublicArea,
                  &["sidewalk", "curb"], &["driveway"]),
        Zone::new("patio", 0.55, ZoneType::Outdoor,
                  &["deck", "terrace"], &["backyard"]),
    ]
}
