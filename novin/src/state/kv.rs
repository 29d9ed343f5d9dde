// novin/src/state/kv.rs
//
// File-backed key-value store plus the out-of-band persist queue.
//
// Two keys live here: the audit-trail ring and the user-patterns snapshot.
// Writes go through a dedicated worker thread so persistence can never block
// an assessment; failures are logged, counted against the health monitor,
// and swallowed. Values are JSON; a corrupt value reads as absent so the
// owner reinitializes to defaults.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

pub const KEY_AUDIT_TRAIL: &str = "audit_trail";
pub const KEY_USER_PATTERNS: &str = "user_patterns";

#[derive(Clone)]
pub struct KvStore {
    dir: Option<PathBuf>,
}

impl KvStore {
    /// `None` → in-memory only; every write is a no-op.
    pub fn new(dir: Option<PathBuf>) -> Self {
        if let Some(dir) = &dir {
            if let Err(e) = std::fs::create_dir_all(dir) {
                warn!("state dir {} not creatable ({e}); persistence disabled", dir.display());
                return Self { dir: None };
            }
        }
        Self { dir }
    }

    fn path(&self, key: &str) -> Option<PathBuf> {
        self.dir.as_ref().map(|d| d.join(format!("{key}.json")))
    }

    /// Read a key. Missing or unreadable → None (the caller falls back to
    /// defaults; corruption is not an error here).
    pub fn get(&self, key: &str) -> Option<String> {
        let path = self.path(key)?;
        match std::fs::read_to_string(&path) {
            Ok(text) => Some(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!("kv read {} failed: {e}", path.display());
                None
            }
        }
    }

    /// Write atomically: temp file in the same directory, then rename.
    pub fn put(&self, key: &str, value: &str) -> std::io::Result<()> {
        let Some(path) = self.path(key) else {
            return Ok(());
        };
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }
}

// ── Persist queue ─────────────────────────────────────────────────────────────

pub enum PersistCmd {
    Write { key: &'static str, value: String },
    Shutdown,
}

/// Dedicated serialization queue: one worker thread draining writes in
/// completion order. Dropping the queue shuts the worker down.
pub struct PersistQueue {
    // mpsc Sender predates Sync on older toolchains; the mutex keeps the
    // queue shareable behind an Arc either way
    tx:     Mutex<Sender<PersistCmd>>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl PersistQueue {
    pub fn start(store: KvStore, error_count: Arc<AtomicU64>) -> Self {
        let (tx, rx) = mpsc::channel::<PersistCmd>();
        let handle = std::thread::Builder::new()
            .name("novin-persist".into())
            .spawn(move || {
                while let Ok(cmd) = rx.recv() {
                    match cmd {
                        PersistCmd::Write { key, value } => {
                            if let Err(e) = store.put(key, &value) {
                                warn!("persist of {key} failed: {e}");
                                error_count.fetch_add(1, Ordering::Relaxed);
                            } else {
                                debug!("persisted {key} ({} bytes)", value.len());
                            }
                        }
                        PersistCmd::Shutdown => break,
                    }
                }
            })
            .expect("persist worker spawn failed");
        Self { tx: Mutex::new(tx), handle: Some(handle) }
    }

    /// Enqueue a write. Best-effort: a dead worker is logged, not surfaced.
    pub fn enqueue(&self, key: &'static str, value: String) {
        if self.tx.lock().send(PersistCmd::Write { key, value }).is_err() {
            warn!("persist queue unavailable; dropping {key} write");
        }
    }
}

impl Drop for PersistQueue {
    fn drop(&mut self) {
        let _ = self.tx.lock().send(PersistCmd::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_and_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = KvStore::new(Some(dir.path().to_path_buf()));
        assert!(store.get("nope").is_none());
        store.put("alpha", "{\"x\":1}").unwrap();
        assert_eq!(store.get("alpha").unwrap(), "{\"x\":1}");
        // overwrite is atomic and total
        store.put("alpha", "{\"x\":2}").unwrap();
        assert_eq!(store.get("alpha").unwrap(), "{\"x\":2}");
    }

    #[test]
    fn memory_only_store_is_silent() {
        let store = KvStore::new(None);
        store.put("alpha", "ignored").unwrap();
        assert!(store.get("alpha").is_none());
    }

    #[test]
    fn queue_drains_writes() {
        let dir = tempfile::tempdir().unwrap();
        let store = KvStore::new(Some(dir.path().to_path_buf()));
        let errors = Arc::new(AtomicU64::new(0));
        {
            let queue = PersistQueue::start(store.clone(), errors.clone());
            queue.enqueue(KEY_AUDIT_TRAIL, "[1,2,3]".into());
            // Drop joins the worker, guaranteeing the write landed
        }
        assert_eq!(store.get(KEY_AUDIT_TRAIL).unwrap(), "[1,2,3]");
        assert_eq!(errors.load(Ordering::Relaxed), 0);
    }
}
