//! Lock state machine.
//!
//! # Design
//!
//! [`LockMachine`] holds `{state, preset, provisional, record, pending}` and
//! never touches storage, crypto or the screen. Each transition consumes a
//! [`LockEvent`] and returns the [`LockEffect`]s the driver must carry out.
//! Digest computation is itself an effect ([`LockEffect::Digest`]); its
//! result comes back as [`LockEvent::DigestReady`]. While a digest is
//! outstanding the machine accepts no new gesture.
//!
//! # State diagram
//!
//! ```text
//! boot ─┬─ disabled / no digest ─────────────────────────────► Disabled
//!       ├─ no record, no preset ──► AwaitingFirstDraw ◄──────┐ (mismatch)
//!       │                               │ draw               │
//!       │                               ▼                    │
//!       │                          AwaitingConfirmDraw ──────┘
//!       │                               │ same draw + digest
//!       │                               ▼
//!       ├─ no record, preset ─► PresetBootstrap ─► AwaitingUnlockDraw ─► Unlocked
//!       ├─ record, enforced preset ─► PresetBootstrap (check, maybe re-provision)
//!       └─ record ───────────────────────────────► AwaitingUnlockDraw
//! ```

use essen_config::LockConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::digest::{pattern_digest, PatternHasher};
use crate::error::LockError;
use crate::grid::GestureSequence;
use crate::salt::SaltSource;
use crate::store::LockRecord;

/// Confirm prompt clears the first drawing after this long.
pub const CONFIRM_CLEAR_DELAY: Duration = Duration::from_millis(200);
/// Failed attempts stay visible this long before clearing.
pub const FAILURE_CLEAR_DELAY: Duration = Duration::from_millis(400);
/// Enrollment shows the saved message this long before revealing the app.
pub const ENROLL_REVEAL_DELAY: Duration = Duration::from_millis(400);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockState {
    /// Lock off (by config or for lack of a digest). **Terminal.**
    Disabled,
    /// Boot found no record; resolved immediately to setup or preset bootstrap.
    NoRecordNeedsEnrollment,
    /// Preset being checked against, or provisioned into, the store.
    PresetBootstrap,
    AwaitingFirstDraw,
    AwaitingConfirmDraw,
    AwaitingUnlockDraw,
    /// Host app revealed. **Terminal** for the session.
    Unlocked,
}

impl LockState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Disabled | Self::Unlocked)
    }

    pub fn awaits_draw(&self) -> bool {
        matches!(
            self,
            Self::AwaitingFirstDraw | Self::AwaitingConfirmDraw | Self::AwaitingUnlockDraw
        )
    }
}

/// Which lock screen is shown.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreenMode {
    Setup,
    Unlock,
}

/// Status line under the grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockMessage {
    DrawToSetup,
    DrawToUnlock,
    TooShort,
    ConfirmPrompt,
    ConfirmMismatch,
    WrongPattern,
    Saved,
}

impl LockMessage {
    pub fn text(&self) -> &'static str {
        match self {
            LockMessage::DrawToSetup => "Draw a pattern to set up the lock.",
            LockMessage::DrawToUnlock => "Draw the pattern to unlock.",
            LockMessage::TooShort => "Connect at least 3 dots.",
            LockMessage::ConfirmPrompt => "Draw the pattern again to confirm.",
            LockMessage::ConfirmMismatch => "Patterns did not match. Start over.",
            LockMessage::WrongPattern => "Wrong pattern. Try again.",
            LockMessage::Saved => "Pattern saved. Unlocked.",
        }
    }
}

/// Why a digest is being computed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DigestPurpose {
    /// Fresh salt + preset -> new record.
    PresetBootstrap,
    /// Stored salt + preset -> compare with stored hash.
    PresetCheck,
    /// Fresh salt + confirmed drawing -> new record.
    Enroll,
    /// Stored salt + drawing -> compare with stored hash.
    Unlock,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SaltPlan {
    Fresh,
    Stored(String),
}

/// A digest the driver must compute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DigestJob {
    pub purpose: DigestPurpose,
    pub sequence: GestureSequence,
    pub salt: SaltPlan,
}

impl DigestJob {
    /// Resolves the salt so the remaining work is a pure function of the hasher.
    pub fn prepare(self, salts: &mut dyn SaltSource) -> PreparedDigest {
        let salt = match self.salt {
            SaltPlan::Fresh => salts.generate(),
            SaltPlan::Stored(s) => s,
        };
        PreparedDigest {
            purpose: self.purpose,
            sequence: self.sequence,
            salt,
        }
    }
}

/// A digest job with its salt fixed; safe to compute off the session lock.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreparedDigest {
    pub purpose: DigestPurpose,
    pub sequence: GestureSequence,
    pub salt: String,
}

impl PreparedDigest {
    pub fn compute(self, hasher: Option<&dyn PatternHasher>) -> DigestOutcome {
        let hash = pattern_digest(hasher, &self.sequence, &self.salt);
        DigestOutcome {
            purpose: self.purpose,
            salt: self.salt,
            hash,
        }
    }
}

/// Result of a [`PreparedDigest`]; `hash` is `None` when no hasher was available.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DigestOutcome {
    pub purpose: DigestPurpose,
    pub salt: String,
    pub hash: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LockEvent {
    /// The user lifted the pointer; carries whatever the recognizer collected.
    GestureReleased(GestureSequence),
    DigestReady(DigestOutcome),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LockEffect {
    Show(ScreenMode),
    Message(LockMessage),
    /// Clear the drawn gesture, immediately when `after` is zero.
    ClearGesture { after: Duration },
    /// Replace the stored record (best effort).
    Persist(LockRecord),
    Digest(DigestJob),
    /// Reveal the host application. Emitted at most once per session.
    RevealApp { after: Duration },
    /// A recoverable failure worth surfacing.
    Rejected(LockError),
}

#[derive(Clone, Debug)]
pub struct LockMachine {
    state: LockState,
    preset: Option<GestureSequence>,
    provisional: Option<GestureSequence>,
    record: Option<LockRecord>,
    pending: Option<DigestPurpose>,
}

impl LockMachine {
    /// Decide the first screen from config, digest availability and the stored record.
    pub fn boot(
        cfg: &LockConfig,
        digest_available: bool,
        stored: Option<LockRecord>,
    ) -> (Self, Vec<LockEffect>) {
        let preset = cfg
            .usable_preset()
            .and_then(|ix| GestureSequence::from_indices(&ix).ok());
        let mut m = Self {
            state: LockState::Disabled,
            preset,
            provisional: None,
            record: None,
            pending: None,
        };

        if !cfg.enabled {
            info!("pattern lock disabled by config");
            return (m, vec![LockEffect::RevealApp { after: Duration::ZERO }]);
        }
        if !digest_available {
            warn!("pattern lock disabled: no SHA-256 and insecure digest disallowed");
            return (m, vec![LockEffect::RevealApp { after: Duration::ZERO }]);
        }

        let effects = match stored {
            None => {
                m.state = LockState::NoRecordNeedsEnrollment;
                match m.preset.clone() {
                    Some(preset) => {
                        info!(len = preset.len(), "no lock record; provisioning from preset");
                        m.state = LockState::PresetBootstrap;
                        vec![m.request(DigestPurpose::PresetBootstrap, preset, SaltPlan::Fresh)]
                    }
                    None => m.enter_first_draw(),
                }
            }
            Some(record) => {
                let check = match (&m.preset, cfg.enforce_preset) {
                    (Some(preset), true) => Some(preset.clone()),
                    _ => None,
                };
                let salt = record.salt.clone();
                m.record = Some(record);
                match check {
                    Some(preset) => {
                        m.state = LockState::PresetBootstrap;
                        vec![m.request(DigestPurpose::PresetCheck, preset, SaltPlan::Stored(salt))]
                    }
                    None => m.enter_unlock(),
                }
            }
        };
        (m, effects)
    }

    pub fn state(&self) -> LockState {
        self.state
    }

    pub fn record(&self) -> Option<&LockRecord> {
        self.record.as_ref()
    }

    pub fn pending(&self) -> Option<DigestPurpose> {
        self.pending
    }

    /// A new stroke may start: a draw is awaited and no digest is outstanding.
    pub fn accepts_gesture(&self) -> bool {
        self.state.awaits_draw() && self.pending.is_none()
    }

    /// Apply an event.
    ///
    /// # Errors
    /// [`LockError::HashUnavailable`] when a digest came back empty (the
    /// machine stays where it is), [`LockError::IllegalTransition`] for events
    /// the current state cannot accept.
    pub fn apply(&mut self, event: LockEvent) -> Result<Vec<LockEffect>, LockError> {
        match event {
            LockEvent::GestureReleased(seq) => self.on_release(seq),
            LockEvent::DigestReady(outcome) => self.on_digest(outcome),
        }
    }

    fn on_release(&mut self, seq: GestureSequence) -> Result<Vec<LockEffect>, LockError> {
        if !self.state.awaits_draw() {
            return Err(self.illegal(format!("GestureReleased({seq})")));
        }
        if self.pending.is_some() {
            debug!(%seq, "gesture ignored while a digest is outstanding");
            return Ok(Vec::new());
        }
        if !seq.is_complete() {
            return Ok(vec![
                LockEffect::Rejected(LockError::PatternTooShort { len: seq.len() }),
                LockEffect::Message(LockMessage::TooShort),
                LockEffect::ClearGesture { after: Duration::ZERO },
            ]);
        }

        match self.state {
            LockState::AwaitingFirstDraw => {
                self.provisional = Some(seq);
                self.state = LockState::AwaitingConfirmDraw;
                Ok(vec![
                    LockEffect::Message(LockMessage::ConfirmPrompt),
                    LockEffect::ClearGesture { after: CONFIRM_CLEAR_DELAY },
                ])
            }
            LockState::AwaitingConfirmDraw => {
                if self.provisional.as_ref() == Some(&seq) {
                    Ok(vec![self.request(DigestPurpose::Enroll, seq, SaltPlan::Fresh)])
                } else {
                    info!("enrollment confirmation differs; restarting setup");
                    self.provisional = None;
                    self.state = LockState::AwaitingFirstDraw;
                    Ok(vec![
                        LockEffect::Rejected(LockError::ConfirmMismatch),
                        LockEffect::Message(LockMessage::ConfirmMismatch),
                        LockEffect::ClearGesture { after: FAILURE_CLEAR_DELAY },
                    ])
                }
            }
            LockState::AwaitingUnlockDraw => {
                let Some(salt) = self.record.as_ref().map(|r| r.salt.clone()) else {
                    return Err(self.illegal("GestureReleased without a lock record".into()));
                };
                Ok(vec![self.request(DigestPurpose::Unlock, seq, SaltPlan::Stored(salt))])
            }
            other => Err(self.illegal(format!("GestureReleased in {other:?}"))),
        }
    }

    fn on_digest(&mut self, outcome: DigestOutcome) -> Result<Vec<LockEffect>, LockError> {
        if self.pending != Some(outcome.purpose) {
            return Err(self.illegal(format!("DigestReady({:?})", outcome.purpose)));
        }
        self.pending = None;

        let Some(hash) = outcome.hash else {
            error!(
                purpose = ?outcome.purpose,
                state = ?self.state,
                "pattern digest unavailable; lock cannot proceed"
            );
            return Err(LockError::HashUnavailable);
        };

        match outcome.purpose {
            DigestPurpose::PresetBootstrap => {
                let record = LockRecord::new(outcome.salt, hash);
                self.record = Some(record.clone());
                let mut effects = vec![LockEffect::Persist(record)];
                effects.extend(self.enter_unlock());
                Ok(effects)
            }
            DigestPurpose::PresetCheck => {
                let matches = self.record.as_ref().is_some_and(|r| r.hash == hash);
                if matches {
                    Ok(self.enter_unlock())
                } else {
                    info!("stored lock does not match the enforced preset; re-provisioning");
                    let Some(preset) = self.preset.clone() else {
                        return Err(self.illegal("PresetCheck without a preset".into()));
                    };
                    Ok(vec![self.request(DigestPurpose::PresetBootstrap, preset, SaltPlan::Fresh)])
                }
            }
            DigestPurpose::Enroll => {
                let record = LockRecord::new(outcome.salt, hash);
                self.record = Some(record.clone());
                self.provisional = None;
                self.state = LockState::Unlocked;
                info!("lock pattern enrolled");
                Ok(vec![
                    LockEffect::Persist(record),
                    LockEffect::Message(LockMessage::Saved),
                    LockEffect::RevealApp { after: ENROLL_REVEAL_DELAY },
                ])
            }
            DigestPurpose::Unlock => {
                let matches = self.record.as_ref().is_some_and(|r| r.hash == hash);
                if matches {
                    self.state = LockState::Unlocked;
                    info!("unlocked");
                    Ok(vec![LockEffect::RevealApp { after: Duration::ZERO }])
                } else {
                    Ok(vec![
                        LockEffect::Rejected(LockError::PatternMismatch),
                        LockEffect::Message(LockMessage::WrongPattern),
                        LockEffect::ClearGesture { after: FAILURE_CLEAR_DELAY },
                    ])
                }
            }
        }
    }

    fn request(
        &mut self,
        purpose: DigestPurpose,
        sequence: GestureSequence,
        salt: SaltPlan,
    ) -> LockEffect {
        self.pending = Some(purpose);
        LockEffect::Digest(DigestJob {
            purpose,
            sequence,
            salt,
        })
    }

    fn enter_first_draw(&mut self) -> Vec<LockEffect> {
        self.state = LockState::AwaitingFirstDraw;
        vec![
            LockEffect::Show(ScreenMode::Setup),
            LockEffect::Message(LockMessage::DrawToSetup),
        ]
    }

    fn enter_unlock(&mut self) -> Vec<LockEffect> {
        self.state = LockState::AwaitingUnlockDraw;
        vec![
            LockEffect::Show(ScreenMode::Unlock),
            LockEffect::Message(LockMessage::DrawToUnlock),
        ]
    }

    fn illegal(&self, event: String) -> LockError {
        LockError::IllegalTransition {
            from: self.state,
            event,
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
