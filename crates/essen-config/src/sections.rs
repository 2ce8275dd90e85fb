use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// Highest dot index on the 3x3 lock grid.
const MAX_DOT_INDEX: i64 = 8;

/// Minimum number of usable entries for a preset to be applied.
const MIN_PRESET_LEN: usize = 3;

/// Typed view of the merged configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub lock: LockConfig,
    pub storage: StorageConfig,
    pub daemon: DaemonConfig,
}

impl AppConfig {
    /// Build from the merged config JSON (produced by the layered loader).
    pub fn from_config_json(cfg: &Value) -> Result<Self> {
        if cfg.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(cfg.clone()).context("config does not match the expected shape")
    }
}

/// Pattern-lock configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// When false the lock is skipped and the app starts unlocked.
    pub enabled: bool,
    /// Dot indices (0..=8, left-to-right, top-to-bottom) used to provision the lock.
    pub preset_pattern: Vec<PresetEntry>,
    /// Re-provision from the preset at boot whenever the stored lock does not match it.
    pub enforce_preset: bool,
    /// Permit the non-cryptographic digest when SHA-256 is unavailable.
    pub allow_insecure_hash: bool,
    pub hint: HintConfig,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            preset_pattern: Vec::new(),
            enforce_preset: false,
            allow_insecure_hash: false,
            hint: HintConfig::default(),
        }
    }
}

impl LockConfig {
    /// The preset as dot indices, or `None` when fewer than three usable entries remain.
    ///
    /// Entries are read like integers typed into a form: numeric strings are
    /// accepted (leading digits only), anything outside 0..=8 is dropped.
    pub fn usable_preset(&self) -> Option<Vec<u8>> {
        let seq: Vec<u8> = self
            .preset_pattern
            .iter()
            .filter_map(PresetEntry::as_index)
            .filter(|n| (0..=MAX_DOT_INDEX).contains(n))
            .map(|n| n as u8)
            .collect();
        if seq.len() >= MIN_PRESET_LEN {
            Some(seq)
        } else {
            None
        }
    }
}

/// One entry of `lock.preset_pattern` as written in YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PresetEntry {
    Index(i64),
    Text(String),
    Other(Value),
}

impl PresetEntry {
    fn as_index(&self) -> Option<i64> {
        match self {
            PresetEntry::Index(n) => Some(*n),
            PresetEntry::Text(s) => leading_int(s),
            PresetEntry::Other(Value::Number(n)) => n.as_f64().map(|f| f.trunc() as i64),
            PresetEntry::Other(_) => None,
        }
    }
}

impl From<i64> for PresetEntry {
    fn from(n: i64) -> Self {
        PresetEntry::Index(n)
    }
}

fn leading_int(s: &str) -> Option<i64> {
    let t = s.trim_start();
    let (sign, digits) = match t.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, t.strip_prefix('+').unwrap_or(t)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

/// Optional guidance image drawn underneath the dot grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HintConfig {
    pub image: Option<String>,
    pub opacity: f32,
    pub show_in_unlock: bool,
}

impl Default for HintConfig {
    fn default() -> Self {
        Self {
            image: None,
            opacity: 0.18,
            show_in_unlock: false,
        }
    }
}

impl HintConfig {
    /// Setup screens always show a configured hint; unlock screens only on opt-in.
    pub fn visible(&self, unlock_screen: bool) -> bool {
        self.image.is_some() && (!unlock_screen || self.show_in_unlock)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the primary store and its mirror.
    pub dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".essen"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub addr: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8898".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preset(entries: Vec<PresetEntry>) -> LockConfig {
        LockConfig {
            preset_pattern: entries,
            ..LockConfig::default()
        }
    }

    #[test]
    fn out_of_range_entries_are_dropped() {
        let cfg = preset(vec![6.into(), 9.into(), 3.into(), (-1).into(), 0.into()]);
        assert_eq!(cfg.usable_preset(), Some(vec![6, 3, 0]));
    }

    #[test]
    fn numeric_strings_count_like_integers() {
        let cfg = preset(vec![
            PresetEntry::Text("6".into()),
            PresetEntry::Text(" 3x".into()),
            PresetEntry::Text("zero".into()),
            0.into(),
        ]);
        assert_eq!(cfg.usable_preset(), Some(vec![6, 3, 0]));
    }

    #[test]
    fn fewer_than_three_usable_entries_is_no_preset() {
        let cfg = preset(vec![1.into(), 12.into(), 2.into()]);
        assert_eq!(cfg.usable_preset(), None);
        assert_eq!(LockConfig::default().usable_preset(), None);
    }

    #[test]
    fn hint_hidden_on_unlock_unless_opted_in() {
        let mut hint = HintConfig {
            image: Some("muster.jpg".into()),
            ..HintConfig::default()
        };
        assert!(hint.visible(false));
        assert!(!hint.visible(true));
        hint.show_in_unlock = true;
        assert!(hint.visible(true));
        assert!(!HintConfig::default().visible(false));
    }
}
