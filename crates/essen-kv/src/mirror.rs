use anyhow::{anyhow, Result};
use serde_json::Value;
use std::path::Path;
use tracing::warn;

use crate::{JsonFileKv, KvStore};

/// File name of the primary document inside a storage directory.
pub const PRIMARY_FILE: &str = "essen-db.json";
/// File name of the mirror document inside a storage directory.
pub const MIRROR_FILE: &str = "local-storage.json";

/// Primary store with a best-effort mirror.
///
/// Reads come from the primary and fall back to the mirror only when the
/// primary fails. Writes go to both sides and only fail when neither side
/// accepted the write. Deletes must succeed on both sides, otherwise a stale
/// copy could be read back later.
pub struct MirroredKv {
    primary: Box<dyn KvStore>,
    mirror: Box<dyn KvStore>,
}

impl MirroredKv {
    pub fn new(primary: Box<dyn KvStore>, mirror: Box<dyn KvStore>) -> Self {
        Self { primary, mirror }
    }

    /// Two JSON documents side by side in `dir`.
    pub fn open_local(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self::new(
            Box::new(JsonFileKv::new(dir.join(PRIMARY_FILE))),
            Box::new(JsonFileKv::new(dir.join(MIRROR_FILE))),
        )
    }
}

impl KvStore for MirroredKv {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        match self.primary.get(key) {
            Ok(v) => Ok(v),
            Err(e) => {
                warn!(key, error = %e, "kv primary read failed; using mirror");
                self.mirror.get(key)
            }
        }
    }

    fn set(&self, key: &str, value: &Value) -> Result<()> {
        let primary = self.primary.set(key, value);
        let mirror = self.mirror.set(key, value);
        match (primary, mirror) {
            (Ok(()), Ok(())) => Ok(()),
            (Err(e), Ok(())) => {
                warn!(key, error = %e, "kv primary write failed; mirror kept the value");
                Ok(())
            }
            (Ok(()), Err(e)) => {
                warn!(key, error = %e, "kv mirror write failed");
                Ok(())
            }
            (Err(p), Err(m)) => Err(anyhow!(
                "kv write failed on both stores for key {key}: primary: {p:#}; mirror: {m:#}"
            )),
        }
    }

    fn del(&self, key: &str) -> Result<()> {
        let primary = self.primary.del(key);
        let mirror = self.mirror.del(key);
        match (primary, mirror) {
            (Ok(()), Ok(())) => Ok(()),
            (Err(e), Ok(())) => Err(e.context(format!("kv primary delete failed for key {key}"))),
            (Ok(()), Err(e)) => Err(e.context(format!("kv mirror delete failed for key {key}"))),
            (Err(p), Err(m)) => Err(anyhow!(
                "kv delete failed on both stores for key {key}: primary: {p:#}; mirror: {m:#}"
            )),
        }
    }
}
