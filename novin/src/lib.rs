// novin — on-device security-event risk assessment SDK.
//
// Given a JSON description of sensor events plus context (home mode,
// location, crime data, history), produces a bounded threat level with a
// confidence, a human-readable explanation, and a recommendation. Runs fully
// on-device: no network, deterministic for identical inputs under an
// injected clock.
//
// Pipeline: validate → extract features → {rules, chain-of-thought, event
// chains, motion, zones} → Bayesian–rule fusion → temporal/user-pattern
// dampening → explanation → audit record.

pub mod analyzers;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod hashing;
pub mod health;
pub mod limiter;
pub mod sdk;
pub mod state;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::{SdkConfig, SdkMode};
pub use error::{Result, SdkError};
pub use events::{AssessmentRequest, SecurityAssessment, ThreatLevel};
pub use health::{HealthStatus, SystemHealth};
pub use sdk::{global, init_global, NovinSdk};
