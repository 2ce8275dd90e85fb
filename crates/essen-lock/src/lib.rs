//! essen-lock
//!
//! Pattern-lock gate in front of the essen application.
//!
//! - `grid`: dot identity, gesture sequences, skip-dot inference, screen geometry
//! - `input` / `gesture`: host events -> strokes -> recognised sequences
//! - `digest` / `salt` / `crypto`: salted pattern digests and primitive selection
//! - `store`: the single persisted lock record
//! - `machine`: pure state machine (events in, effects out)
//! - `session`: drives the machine against the real store, crypto and app shell

pub mod crypto;
pub mod digest;
pub mod error;
pub mod gesture;
pub mod grid;
pub mod input;
pub mod machine;
pub mod salt;
pub mod session;
pub mod store;

pub use crypto::{CryptoProbe, CryptoSuite};
pub use digest::{pattern_digest, HashKind, InsecureHasher, PatternHasher, Sha256Hasher};
pub use error::LockError;
pub use gesture::{GestureRecognizer, Release};
pub use grid::{Dot, GestureSequence, GridLayout, Point, Rect, MIN_PATTERN_LEN};
pub use input::{InputEvent, Stroke};
pub use machine::{
    DigestJob, DigestOutcome, DigestPurpose, LockEffect, LockEvent, LockMachine, LockMessage,
    LockState, PreparedDigest, SaltPlan, ScreenMode,
};
pub use salt::{OsSaltSource, SaltSource, WeakSaltSource};
pub use session::{AppShell, LockSession, LockView, LogShell};
pub use store::{LockRecord, LockStore, LOCK_RECORD_KEY};
