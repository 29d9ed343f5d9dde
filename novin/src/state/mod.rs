// Process-lifetime state owners. Each guards its own data behind an internal
// lock; persistence runs through the kv persist queue off the assess path.
pub mod audit;
pub mod kv;
pub mod patterns;
