//! essen-kv
//!
//! Local key-value persistence for the Essen app.
//!
//! - [`KvStore`] is the collaborator contract (`get` / `set` / `del`).
//! - [`MemoryKv`] is process-local (tests, throwaway sessions).
//! - [`JsonFileKv`] keeps one JSON object document on disk.
//! - [`MirroredKv`] pairs a primary store with a mirror so a failure in one
//!   side does not lose data that the other side still has.

mod file;
mod mirror;

pub use file::JsonFileKv;
pub use mirror::MirroredKv;

use anyhow::{anyhow, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Durable key-value storage addressed by string keys.
pub trait KvStore: Send + Sync {
    /// `Ok(None)` when the key has never been written (or was deleted).
    fn get(&self, key: &str) -> Result<Option<Value>>;

    fn set(&self, key: &str, value: &Value) -> Result<()>;

    fn del(&self, key: &str) -> Result<()>;

    fn get_many(&self, keys: &[&str]) -> Result<BTreeMap<String, Option<Value>>> {
        let mut out = BTreeMap::new();
        for k in keys {
            out.insert((*k).to_string(), self.get(k)?);
        }
        Ok(out)
    }
}

impl<T: KvStore + ?Sized> KvStore for Box<T> {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &Value) -> Result<()> {
        (**self).set(key, value)
    }

    fn del(&self, key: &str) -> Result<()> {
        (**self).del(key)
    }
}

impl<T: KvStore + ?Sized> KvStore for std::sync::Arc<T> {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &Value) -> Result<()> {
        (**self).set(key, value)
    }

    fn del(&self, key: &str) -> Result<()> {
        (**self).del(key)
    }
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: Mutex<BTreeMap<String, Value>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KvStore for MemoryKv {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let map = self
            .entries
            .lock()
            .map_err(|_| anyhow!("memory kv poisoned"))?;
        Ok(map.get(key).cloned())
    }

    fn set(&self, key: &str, value: &Value) -> Result<()> {
        let mut map = self
            .entries
            .lock()
            .map_err(|_| anyhow!("memory kv poisoned"))?;
        map.insert(key.to_string(), value.clone());
        Ok(())
    }

    fn del(&self, key: &str) -> Result<()> {
        let mut map = self
            .entries
            .lock()
            .map_err(|_| anyhow!("memory kv poisoned"))?;
        map.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn memory_roundtrip_and_delete() {
        let kv = MemoryKv::new();
        assert_eq!(kv.get("fe_lock").unwrap(), None);
        kv.set("fe_lock", &json!({"salt": "s", "hash": "h"})).unwrap();
        assert_eq!(kv.get("fe_lock").unwrap(), Some(json!({"salt": "s", "hash": "h"})));
        kv.del("fe_lock").unwrap();
        assert!(kv.is_empty());
    }

    #[test]
    fn get_many_reports_absent_keys() {
        let kv = MemoryKv::new();
        kv.set("fe_profiles", &json!([])).unwrap();
        let got = kv.get_many(&["fe_profiles", "fe_plans"]).unwrap();
        assert_eq!(got["fe_profiles"], Some(json!([])));
        assert_eq!(got["fe_plans"], None);
    }
}
