use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::KvStore;

/// Key-value store backed by a single JSON object document.
///
/// Every write rewrites the document through a sibling temp file and a
/// rename, so a crash mid-write leaves the previous document intact.
#[derive(Debug)]
pub struct JsonFileKv {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileKv {
    /// Parent directories are created on first write, not here.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self) -> Result<Map<String, Value>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("read kv document {:?}", self.path))
            }
        };
        if raw.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&raw)
            .with_context(|| format!("parse kv document {:?}", self.path))?
        {
            Value::Object(map) => Ok(map),
            other => bail!(
                "kv document {:?} is not a JSON object (found {})",
                self.path,
                type_name(&other)
            ),
        }
    }

    fn write_document(&self, doc: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create_dir_all {:?}", parent))?;
            }
        }
        let body = serde_json::to_string(doc).context("serialize kv document failed")?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, body).with_context(|| format!("write {:?}", tmp))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("rename {:?} -> {:?}", tmp, self.path))?;
        Ok(())
    }

    fn update(&self, f: impl FnOnce(&mut Map<String, Value>)) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| anyhow::anyhow!("kv write lock poisoned"))?;
        let mut doc = self.read_document()?;
        f(&mut doc);
        self.write_document(&doc)
    }
}

impl KvStore for JsonFileKv {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let doc = self.read_document()?;
        Ok(doc.get(key).filter(|v| !v.is_null()).cloned())
    }

    fn set(&self, key: &str, value: &Value) -> Result<()> {
        self.update(|doc| {
            doc.insert(key.to_string(), value.clone());
        })
    }

    fn del(&self, key: &str) -> Result<()> {
        self.update(|doc| {
            doc.remove(key);
        })
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
