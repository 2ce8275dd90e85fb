//! Runtime driver for one lock screen.
//!
//! [`LockSession`] owns the recognizer, the machine, the store and the crypto
//! suite, and turns machine effects into side effects. Hosts either call
//! [`LockSession::drive`] (digests computed inline) or split the work with
//! [`LockSession::input`] / [`LockSession::complete`] so the digest can run
//! outside whatever lock guards the session.

use essen_config::{HintConfig, LockConfig};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::crypto::CryptoSuite;
use crate::digest::{HashKind, PatternHasher};
use crate::error::LockError;
use crate::gesture::{GestureRecognizer, Release};
use crate::grid::{GestureSequence, GridLayout, Point};
use crate::input::{InputEvent, Stroke};
use crate::machine::{
    DigestOutcome, LockEffect, LockEvent, LockMachine, LockMessage, LockState, PreparedDigest,
    ScreenMode,
};
use crate::salt::SaltSource;
use crate::store::LockStore;

/// The host application hidden behind the lock.
pub trait AppShell: Send {
    /// Show the application after `after`. Called at most once per session.
    fn reveal(&mut self, after: Duration);
}

/// Shell that only records the reveal in the log.
#[derive(Debug, Default)]
pub struct LogShell;

impl AppShell for LogShell {
    fn reveal(&mut self, after: Duration) {
        info!(after_ms = after.as_millis() as u64, "application revealed");
    }
}

/// Snapshot of everything a renderer needs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LockView {
    pub state: LockState,
    pub mode: Option<ScreenMode>,
    pub message: Option<LockMessage>,
    pub message_text: Option<String>,
    /// Dots highlighted on the grid, in drawing order.
    pub active: GestureSequence,
    pub drawing: bool,
    pub cursor: Option<Point>,
    /// Set while a drawn gesture is waiting for its delayed clear.
    pub clear_after_ms: Option<u64>,
    pub verifying: bool,
    pub revealed: bool,
    pub hint_image: Option<String>,
    pub hint_opacity: f32,
    pub hash_kind: Option<HashKind>,
    pub last_rejection: Option<String>,
    pub fault: Option<String>,
}

pub struct LockSession {
    machine: LockMachine,
    recognizer: GestureRecognizer,
    layout: GridLayout,
    store: LockStore,
    hasher: Option<Arc<dyn PatternHasher>>,
    salts: Box<dyn SaltSource>,
    shell: Box<dyn AppShell>,
    hint: HintConfig,
    mode: Option<ScreenMode>,
    message: Option<LockMessage>,
    clear_after: Option<Duration>,
    revealed: bool,
    last_rejection: Option<LockError>,
    fault: Option<LockError>,
}

impl LockSession {
    /// Reads the stored record and settles the boot flow, including any
    /// preset digests. A fatal digest failure leaves the session locked with
    /// [`LockSession::fault`] set.
    pub fn boot(
        cfg: &LockConfig,
        store: LockStore,
        crypto: CryptoSuite,
        shell: Box<dyn AppShell>,
        layout: GridLayout,
    ) -> Self {
        let stored = if cfg.enabled { store.load() } else { None };
        let (machine, effects) = LockMachine::boot(cfg, crypto.hasher.is_some(), stored);
        let mut session = Self {
            machine,
            recognizer: GestureRecognizer::new(),
            layout,
            store,
            hasher: crypto.hasher,
            salts: crypto.salts,
            shell,
            hint: cfg.hint.clone(),
            mode: None,
            message: None,
            clear_after: None,
            revealed: false,
            last_rejection: None,
            fault: None,
        };
        let job = session.run_effects(effects);
        if let Err(e) = session.settle(job) {
            warn!(error = %e, "lock boot did not settle");
        }
        info!(state = ?session.state(), "lock session ready");
        session
    }

    pub fn state(&self) -> LockState {
        self.machine.state()
    }

    pub fn is_revealed(&self) -> bool {
        self.revealed
    }

    pub fn fault(&self) -> Option<&LockError> {
        self.fault.as_ref()
    }

    pub fn hasher(&self) -> Option<Arc<dyn PatternHasher>> {
        self.hasher.clone()
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    /// Takes effect from the next stroke; a stroke in progress keeps its layout.
    pub fn set_layout(&mut self, layout: GridLayout) {
        self.layout = layout;
    }

    /// Feeds one input event. Returns a digest to compute when a release
    /// needs one; pass its outcome to [`LockSession::complete`].
    pub fn input(&mut self, event: &InputEvent) -> Result<Option<PreparedDigest>, LockError> {
        let Some(stroke) = event.stroke() else {
            return Ok(None);
        };
        if let Stroke::Begin(_) = stroke {
            if !self.machine.accepts_gesture() {
                debug!(state = ?self.state(), pending = ?self.machine.pending(), "stroke ignored");
                return Ok(None);
            }
            self.clear_after = None;
            self.last_rejection = None;
        }
        match self.recognizer.feed(&self.layout, stroke) {
            None | Some(Release::Idle) => Ok(None),
            Some(Release::TooShort(seq)) | Some(Release::Complete(seq)) => {
                let effects = self.machine.apply(LockEvent::GestureReleased(seq))?;
                Ok(self.run_effects(effects))
            }
        }
    }

    /// Applies a computed digest. May hand back a follow-up digest.
    pub fn complete(&mut self, outcome: DigestOutcome) -> Result<Option<PreparedDigest>, LockError> {
        match self.machine.apply(LockEvent::DigestReady(outcome)) {
            Ok(effects) => Ok(self.run_effects(effects)),
            Err(e) => {
                self.fault = Some(e.clone());
                Err(e)
            }
        }
    }

    /// [`LockSession::input`] with digests computed inline.
    pub fn drive(&mut self, event: &InputEvent) -> Result<(), LockError> {
        let job = self.input(event)?;
        self.settle(job)
    }

    /// Clears the drawn gesture, unless a new stroke has already started.
    pub fn clear_gesture(&mut self) {
        if self.recognizer.is_active() {
            return;
        }
        self.recognizer.clear();
        self.clear_after = None;
    }

    pub fn view(&self) -> LockView {
        let unlock_screen = self.mode == Some(ScreenMode::Unlock);
        let hint_visible = self.mode.is_some() && self.hint.visible(unlock_screen);
        LockView {
            state: self.state(),
            mode: self.mode,
            message: self.message,
            message_text: self.message.map(|m| m.text().to_string()),
            active: self.recognizer.visited().clone(),
            drawing: self.recognizer.is_active(),
            cursor: self.recognizer.cursor(),
            clear_after_ms: self.clear_after.map(|d| d.as_millis() as u64),
            verifying: self.machine.pending().is_some(),
            revealed: self.revealed,
            hint_image: if hint_visible { self.hint.image.clone() } else { None },
            hint_opacity: self.hint.opacity,
            hash_kind: self.hasher.as_ref().map(|h| h.kind()),
            last_rejection: self.last_rejection.as_ref().map(|e| e.code().to_string()),
            fault: self.fault.as_ref().map(|e| e.code().to_string()),
        }
    }

    fn settle(&mut self, mut job: Option<PreparedDigest>) -> Result<(), LockError> {
        while let Some(prepared) = job {
            let outcome = prepared.compute(self.hasher.as_deref());
            job = self.complete(outcome)?;
        }
        Ok(())
    }

    fn run_effects(&mut self, effects: Vec<LockEffect>) -> Option<PreparedDigest> {
        let mut next = None;
        for effect in effects {
            match effect {
                LockEffect::Show(mode) => self.mode = Some(mode),
                LockEffect::Message(msg) => self.message = Some(msg),
                LockEffect::ClearGesture { after } => {
                    if after.is_zero() {
                        self.recognizer.clear();
                        self.clear_after = None;
                    } else {
                        self.clear_after = Some(after);
                    }
                }
                LockEffect::Persist(record) => {
                    if let Err(e) = self.store.save(&record) {
                        warn!(error = %e, "lock record not persisted; next boot starts over");
                    }
                }
                LockEffect::Digest(job) => next = Some(job.prepare(self.salts.as_mut())),
                LockEffect::RevealApp { after } => {
                    if !self.revealed {
                        self.revealed = true;
                        self.shell.reveal(after);
                    }
                }
                LockEffect::Rejected(e) => {
                    info!(code = e.code(), "gesture rejected");
                    self.last_rejection = Some(e);
                }
            }
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::Sha256Hasher;
    use crate::grid::Dot;
    use crate::salt::WeakSaltSource;
    use essen_kv::MemoryKv;

    fn session(cfg: &LockConfig) -> LockSession {
        LockSession::boot(
            cfg,
            LockStore::new(Box::new(MemoryKv::new())),
            CryptoSuite::new(Some(Arc::new(Sha256Hasher)), Box::new(WeakSaltSource)),
            Box::new(LogShell),
            GridLayout::default(),
        )
    }

    fn at(ix: u8) -> (f64, f64) {
        let p = GridLayout::default().center(Dot::new(ix).unwrap());
        (p.x, p.y)
    }

    #[test]
    fn too_short_clears_immediately() {
        let mut s = session(&LockConfig::default());
        let (x, y) = at(0);
        s.drive(&InputEvent::PointerDown { x, y }).unwrap();
        let (x, y) = at(1);
        s.drive(&InputEvent::PointerMove { x, y }).unwrap();
        assert!(s.view().drawing);
        s.drive(&InputEvent::PointerUp).unwrap();

        let v = s.view();
        assert!(v.active.is_empty());
        assert_eq!(v.message, Some(LockMessage::TooShort));
        assert_eq!(v.last_rejection.as_deref(), Some("PATTERN_TOO_SHORT"));
        assert_eq!(v.state, LockState::AwaitingFirstDraw);
    }

    #[test]
    fn delayed_clear_is_skipped_once_a_new_stroke_runs() {
        let mut s = session(&LockConfig::default());
        for ix in [0u8, 1, 2] {
            let (x, y) = at(ix);
            let ev = if ix == 0 {
                InputEvent::PointerDown { x, y }
            } else {
                InputEvent::PointerMove { x, y }
            };
            s.drive(&ev).unwrap();
        }
        s.drive(&InputEvent::PointerUp).unwrap();
        assert_eq!(s.view().clear_after_ms, Some(200));
        assert_eq!(s.view().active.len(), 3);

        let (x, y) = at(4);
        s.drive(&InputEvent::PointerDown { x, y }).unwrap();
        s.clear_gesture();
        assert_eq!(s.view().active.indices(), vec![4]);
    }

    #[test]
    fn hint_shown_on_setup_only_by_default() {
        let mut cfg = LockConfig::default();
        cfg.hint.image = Some("hint.png".into());
        let s = session(&cfg);
        assert_eq!(s.view().mode, Some(ScreenMode::Setup));
        assert_eq!(s.view().hint_image.as_deref(), Some("hint.png"));
        assert!((s.view().hint_opacity - 0.18).abs() < f32::EPSILON);
    }
}
