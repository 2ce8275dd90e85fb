//! Shared runtime state for essen-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The lock session sits
//! behind an async mutex; digest computation never happens while it is held.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use anyhow::Result;
use essen_config::{AppConfig, LoadedConfig};
use essen_kv::{KvStore, MirroredKv};
use essen_lock::{AppShell, CryptoSuite, GridLayout, LockSession, LockStore, LockView};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex};
use tracing::info;

// ---------------------------------------------------------------------------
// BusMsg: SSE event bus payload
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal event bus and surfaced as SSE events.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat { ts_millis: i64 },
    Lock(LockView),
    LogLine { level: String, msg: String },
}

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// AppGate
// ---------------------------------------------------------------------------

/// Whether (and from when) the application behind the lock may be shown.
#[derive(Clone, Debug, Default)]
pub struct AppGate {
    opens_at: Arc<StdMutex<Option<Instant>>>,
}

impl AppGate {
    fn open_after(&self, after: Duration) {
        let mut slot = self.opens_at.lock().unwrap_or_else(|p| p.into_inner());
        if slot.is_none() {
            *slot = Some(Instant::now() + after);
        }
    }

    /// `None` while locked; otherwise the time left until the reveal is due.
    pub fn remaining(&self) -> Option<Duration> {
        let slot = self.opens_at.lock().unwrap_or_else(|p| p.into_inner());
        slot.map(|t| t.saturating_duration_since(Instant::now()))
    }

    pub fn is_open(&self) -> bool {
        self.remaining().is_some_and(|d| d.is_zero())
    }
}

/// Opens the gate and announces it on the bus.
struct GateShell {
    gate: AppGate,
    bus: broadcast::Sender<BusMsg>,
}

impl AppShell for GateShell {
    fn reveal(&mut self, after: Duration) {
        self.gate.open_after(after);
        info!(after_ms = after.as_millis() as u64, "application unlocked");
        let _ = self.bus.send(BusMsg::LogLine {
            level: "INFO".to_string(),
            msg: "application unlocked".to_string(),
        });
    }
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Cloneable (Arc) handle shared across all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    pub build: BuildInfo,
    /// Hash of the canonical merged config this process booted with.
    pub config_hash: String,
    pub lock: Arc<Mutex<LockSession>>,
    pub gate: AppGate,
}

impl AppState {
    /// Boots the lock session against `kv` and the given crypto suite.
    pub fn new(
        cfg: &AppConfig,
        config_hash: impl Into<String>,
        kv: Box<dyn KvStore>,
        crypto: CryptoSuite,
    ) -> Self {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);
        let gate = AppGate::default();
        let shell = GateShell {
            gate: gate.clone(),
            bus: bus.clone(),
        };
        let session = LockSession::boot(
            &cfg.lock,
            LockStore::new(kv),
            crypto,
            Box::new(shell),
            GridLayout::default(),
        );

        Self {
            bus,
            build: BuildInfo {
                service: "essen-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            config_hash: config_hash.into(),
            lock: Arc::new(Mutex::new(session)),
            gate,
        }
    }

    /// Production wiring: mirrored file store under `storage.dir` and
    /// probed crypto primitives.
    pub fn from_loaded(loaded: &LoadedConfig) -> Result<Self> {
        let cfg = loaded.app()?;
        let kv = MirroredKv::open_local(&cfg.storage.dir);
        let crypto = CryptoSuite::detect(cfg.lock.allow_insecure_hash);
        info!(
            config_hash = %loaded.config_hash,
            store = %cfg.storage.dir.display(),
            "booting lock session"
        );
        Ok(Self::new(&cfg, loaded.config_hash.clone(), Box::new(kv), crypto))
    }

    /// Current lock view, also pushed to SSE subscribers.
    pub async fn publish_view(&self) -> LockView {
        let view = self.lock.lock().await.view();
        let _ = self.bus.send(BusMsg::Lock(view.clone()));
        view
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Monotonically increasing uptime since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
    START.get_or_init(Instant::now).elapsed().as_secs()
}

/// Spawn a background task that emits a heartbeat SSE every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = chrono::Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    });
}

/// Clear the drawn gesture after `after`, then publish the new view.
pub fn schedule_clear(state: Arc<AppState>, after: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        let view = {
            let mut session = state.lock.lock().await;
            session.clear_gesture();
            session.view()
        };
        let _ = state.bus.send(BusMsg::Lock(view));
    });
}
