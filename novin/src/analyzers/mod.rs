// Per-call reasoners. All of these are pure given the extracted features
// except the chain analyzer, which owns the process-wide sliding buffer.
pub mod chain;
pub mod cot;
pub mod features;
pub mod motion;
pub mod rules;
pub mod zones;
