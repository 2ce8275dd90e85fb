use essen_kv::KvStore;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::LockError;

/// Key the lock record lives under.
pub const LOCK_RECORD_KEY: &str = "fe_lock";

/// The persisted lock: a salt and the digest of `salt|pattern`.
///
/// Always written as a whole. Missing fields decode as empty strings, which
/// still counts as a record (unlock challenge), unlike an absent key (setup).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockRecord {
    pub salt: String,
    pub hash: String,
}

impl LockRecord {
    pub fn new(salt: impl Into<String>, hash: impl Into<String>) -> Self {
        Self {
            salt: salt.into(),
            hash: hash.into(),
        }
    }
}

/// Reads and replaces the single [`LockRecord`].
pub struct LockStore {
    kv: Box<dyn KvStore>,
}

impl LockStore {
    pub fn new(kv: Box<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// `None` when no record exists. Read failures and undecodable values
    /// are logged and treated as absent.
    pub fn load(&self) -> Option<LockRecord> {
        let raw = match self.kv.get(LOCK_RECORD_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "lock record read failed");
                return None;
            }
        };
        match serde_json::from_value::<LockRecord>(raw) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(error = %e, "stored lock record is not decodable; ignoring it");
                None
            }
        }
    }

    pub fn save(&self, record: &LockRecord) -> Result<(), LockError> {
        let value = serde_json::to_value(record)
            .map_err(|e| LockError::PersistenceWriteFailure(e.to_string()))?;
        self.kv
            .set(LOCK_RECORD_KEY, &value)
            .map_err(|e| LockError::PersistenceWriteFailure(format!("{e:#}")))
    }

    /// Removes the record so the next boot provisions or enrolls again.
    pub fn clear(&self) -> Result<(), LockError> {
        self.kv
            .del(LOCK_RECORD_KEY)
            .map_err(|e| LockError::PersistenceWriteFailure(format!("{e:#}")))
    }
}
