//! Scenario: Enrollment and Unlock Through Raw Input
//!
//! # Invariant under test
//!
//! The session turns host input events into gestures, runs enrollment
//! (draw, confirm, persist, reveal) and unlock (draw, verify, reveal), and
//! never reveals the app twice. Failures (too short, confirm mismatch, wrong
//! pattern) leave the stored record untouched and the user free to retry.
//!
//! GREEN when:
//! - [0,1,2,5,8] drawn twice persists a 32-hex salt + 64-hex hash, reveals
//!   after 400 ms, and a fresh session unlocks with the same drawing;
//! - skipped dots are inserted for rows, columns and long diagonals;
//! - no new stroke starts while a digest is outstanding;
//! - a missing digest is fatal and leaves the lock up;
//! - a failing store still lets enrollment finish.

use anyhow::{anyhow, Result};
use essen_config::LockConfig;
use essen_kv::{KvStore, MemoryKv};
use essen_lock::{
    AppShell, CryptoSuite, Dot, GestureSequence, GridLayout, InputEvent, LockError, LockRecord,
    LockSession, LockState, LockStore, OsSaltSource, PatternHasher, Point, ScreenMode,
    Sha256Hasher, LOCK_RECORD_KEY,
};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Stubs
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct RecordingShell(Arc<Mutex<Vec<Duration>>>);

impl AppShell for RecordingShell {
    fn reveal(&mut self, after: Duration) {
        self.0.lock().unwrap().push(after);
    }
}

/// Reads nothing, refuses every write.
struct ReadOnlyKv;

impl KvStore for ReadOnlyKv {
    fn get(&self, _key: &str) -> Result<Option<Value>> {
        Ok(None)
    }

    fn set(&self, _key: &str, _value: &Value) -> Result<()> {
        Err(anyhow!("disk full"))
    }

    fn del(&self, _key: &str) -> Result<()> {
        Err(anyhow!("disk full"))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn boot_with(kv: Box<dyn KvStore>, cfg: &LockConfig) -> (LockSession, RecordingShell) {
    let shell = RecordingShell::default();
    let session = LockSession::boot(
        cfg,
        LockStore::new(kv),
        CryptoSuite::new(Some(Arc::new(Sha256Hasher)), Box::new(OsSaltSource)),
        Box::new(shell.clone()),
        GridLayout::default(),
    );
    (session, shell)
}

fn boot(kv: &Arc<MemoryKv>) -> (LockSession, RecordingShell) {
    boot_with(Box::new(kv.clone()), &LockConfig::default())
}

fn center(ix: u8) -> Point {
    GridLayout::default().center(Dot::new(ix).unwrap())
}

/// Pointer stroke visiting the centers of `dots` only.
fn draw(session: &mut LockSession, dots: &[u8]) {
    let first = center(dots[0]);
    session
        .drive(&InputEvent::PointerDown { x: first.x, y: first.y })
        .unwrap();
    for &ix in &dots[1..] {
        let p = center(ix);
        session
            .drive(&InputEvent::PointerMove { x: p.x, y: p.y })
            .unwrap();
    }
    session.drive(&InputEvent::PointerUp).unwrap();
}

fn draw_touch(session: &mut LockSession, dots: &[u8]) {
    let touches = |ix: u8| vec![center(ix)];
    session
        .drive(&InputEvent::TouchStart { touches: touches(dots[0]) })
        .unwrap();
    for &ix in &dots[1..] {
        session
            .drive(&InputEvent::TouchMove { touches: touches(ix) })
            .unwrap();
    }
    session.drive(&InputEvent::TouchEnd).unwrap();
}

fn stored(kv: &MemoryKv) -> Option<LockRecord> {
    kv.get(LOCK_RECORD_KEY)
        .unwrap()
        .map(|v| serde_json::from_value(v).unwrap())
}

fn seed(kv: &MemoryKv, dots: &[u8], salt: &str) -> LockRecord {
    let record = LockRecord::new(
        salt,
        Sha256Hasher.digest(&GestureSequence::from_indices(dots).unwrap(), salt),
    );
    kv.set(LOCK_RECORD_KEY, &serde_json::to_value(&record).unwrap())
        .unwrap();
    record
}

// ---------------------------------------------------------------------------
// Enrollment
// ---------------------------------------------------------------------------

#[test]
fn enrollment_persists_and_reveals_after_delay() {
    let kv = Arc::new(MemoryKv::new());
    let (mut session, shell) = boot(&kv);
    assert_eq!(session.view().mode, Some(ScreenMode::Setup));

    draw(&mut session, &[0, 1, 2, 5, 8]);
    assert_eq!(session.state(), LockState::AwaitingConfirmDraw);
    assert_eq!(stored(&kv), None);

    draw(&mut session, &[0, 1, 2, 5, 8]);
    assert_eq!(session.state(), LockState::Unlocked);
    assert_eq!(*shell.0.lock().unwrap(), vec![Duration::from_millis(400)]);

    let record = stored(&kv).expect("record persisted");
    assert_eq!(record.salt.len(), 32);
    assert!(record.salt.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(record.hash.len(), 64);

    // Next launch: same drawing unlocks.
    let (mut again, shell) = boot(&kv);
    assert_eq!(again.state(), LockState::AwaitingUnlockDraw);
    draw_touch(&mut again, &[0, 1, 2, 5, 8]);
    assert_eq!(again.state(), LockState::Unlocked);
    assert_eq!(*shell.0.lock().unwrap(), vec![Duration::ZERO]);
}

#[test]
fn confirm_mismatch_stores_nothing_and_restarts() {
    let kv = Arc::new(MemoryKv::new());
    let (mut session, shell) = boot(&kv);

    draw(&mut session, &[0, 1, 2, 5, 8]);
    draw(&mut session, &[0, 3, 6]);

    assert_eq!(session.state(), LockState::AwaitingFirstDraw);
    assert_eq!(session.view().last_rejection.as_deref(), Some("CONFIRM_MISMATCH"));
    assert_eq!(session.view().clear_after_ms, Some(400));
    assert_eq!(stored(&kv), None);
    assert!(shell.0.lock().unwrap().is_empty());
}

#[test]
fn too_short_on_unlock_leaves_record_alone() {
    let kv = Arc::new(MemoryKv::new());
    let record = seed(&kv, &[0, 1, 2], "s");
    let (mut session, _) = boot(&kv);

    draw(&mut session, &[4, 5]);

    assert_eq!(session.state(), LockState::AwaitingUnlockDraw);
    assert_eq!(session.view().last_rejection.as_deref(), Some("PATTERN_TOO_SHORT"));
    assert_eq!(stored(&kv), Some(record));
}

// ---------------------------------------------------------------------------
// Skip-dot recognition
// ---------------------------------------------------------------------------

#[test]
fn skipped_dots_are_inserted() {
    for (stroke, want) in [
        ([0u8, 2], [0u8, 1, 2]),
        ([0, 8], [0, 4, 8]),
        ([1, 7], [1, 4, 7]),
        ([3, 5], [3, 4, 5]),
        ([8, 0], [8, 4, 0]),
    ] {
        let kv = Arc::new(MemoryKv::new());
        let (mut session, _) = boot(&kv);
        draw(&mut session, &stroke);
        assert_eq!(session.view().active.indices(), want.to_vec(), "{stroke:?}");
        assert_eq!(session.state(), LockState::AwaitingConfirmDraw);
    }
}

#[test]
fn skip_inferred_pattern_unlocks_like_the_explicit_one() {
    let kv = Arc::new(MemoryKv::new());
    seed(&kv, &[0, 1, 2], "s");
    let (mut session, _) = boot(&kv);

    draw(&mut session, &[0, 2]);
    assert_eq!(session.state(), LockState::Unlocked);
}

// ---------------------------------------------------------------------------
// Unlock failures
// ---------------------------------------------------------------------------

#[test]
fn wrong_pattern_allows_retry() {
    let kv = Arc::new(MemoryKv::new());
    seed(&kv, &[2, 4, 6, 7], "salt");
    let (mut session, shell) = boot(&kv);

    draw(&mut session, &[2, 4, 6]);
    assert_eq!(session.state(), LockState::AwaitingUnlockDraw);
    assert_eq!(session.view().last_rejection.as_deref(), Some("PATTERN_MISMATCH"));
    assert!(shell.0.lock().unwrap().is_empty());

    draw(&mut session, &[2, 4, 6, 7]);
    assert_eq!(session.state(), LockState::Unlocked);
    assert_eq!(shell.0.lock().unwrap().len(), 1);
}

#[test]
fn no_stroke_starts_while_digest_outstanding() {
    let kv = Arc::new(MemoryKv::new());
    seed(&kv, &[0, 1, 2], "s");
    let (mut session, _) = boot(&kv);

    let p = center(0);
    assert!(session.input(&InputEvent::PointerDown { x: p.x, y: p.y }).unwrap().is_none());
    for ix in [1u8, 2] {
        let p = center(ix);
        session.input(&InputEvent::PointerMove { x: p.x, y: p.y }).unwrap();
    }
    let job = session.input(&InputEvent::PointerUp).unwrap().expect("digest requested");
    assert!(session.view().verifying);

    let p = center(6);
    assert!(session.input(&InputEvent::PointerDown { x: p.x, y: p.y }).unwrap().is_none());
    assert!(!session.view().drawing);

    let outcome = job.compute(session.hasher().as_deref());
    assert!(session.complete(outcome).unwrap().is_none());
    assert_eq!(session.state(), LockState::Unlocked);
}

#[test]
fn missing_digest_is_fatal_and_keeps_lock_up() {
    let kv = Arc::new(MemoryKv::new());
    seed(&kv, &[0, 1, 2], "s");
    let (mut session, shell) = boot(&kv);

    session.input(&InputEvent::MouseDown { x: center(0).x, y: center(0).y }).unwrap();
    for ix in [1u8, 2] {
        session.input(&InputEvent::MouseMove { x: center(ix).x, y: center(ix).y }).unwrap();
    }
    let job = session.input(&InputEvent::MouseUp).unwrap().unwrap();

    assert_eq!(session.complete(job.compute(None)), Err(LockError::HashUnavailable));
    assert_eq!(session.state(), LockState::AwaitingUnlockDraw);
    assert_eq!(session.view().fault.as_deref(), Some("HASH_UNAVAILABLE"));
    assert!(shell.0.lock().unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Disabled lock and persistence failures
// ---------------------------------------------------------------------------

#[test]
fn disabled_lock_reveals_once_and_ignores_input() {
    let kv = Arc::new(MemoryKv::new());
    seed(&kv, &[0, 1, 2], "s");
    let cfg = LockConfig {
        enabled: false,
        ..LockConfig::default()
    };
    let (mut session, shell) = boot_with(Box::new(kv.clone()), &cfg);

    assert_eq!(session.state(), LockState::Disabled);
    assert_eq!(session.view().mode, None);
    draw(&mut session, &[0, 1, 2]);
    assert_eq!(*shell.0.lock().unwrap(), vec![Duration::ZERO]);
}

#[test]
fn no_hasher_disables_lock() {
    let kv = Arc::new(MemoryKv::new());
    let shell = RecordingShell::default();
    let session = LockSession::boot(
        &LockConfig::default(),
        LockStore::new(Box::new(kv.clone())),
        CryptoSuite::new(None, Box::new(OsSaltSource)),
        Box::new(shell.clone()),
        GridLayout::default(),
    );
    assert_eq!(session.state(), LockState::Disabled);
    assert!(session.is_revealed());
    assert_eq!(stored(&kv), None);
}

#[test]
fn failed_write_still_completes_enrollment() {
    let (mut session, shell) = boot_with(Box::new(ReadOnlyKv), &LockConfig::default());

    draw(&mut session, &[3, 4, 5, 8]);
    draw(&mut session, &[3, 4, 5, 8]);

    assert_eq!(session.state(), LockState::Unlocked);
    assert_eq!(shell.0.lock().unwrap().len(), 1);
    assert!(session.fault().is_none());
}
