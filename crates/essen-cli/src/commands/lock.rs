//! Pattern-lock command handlers.
//!
//! Covers all subcommands of `essen lock`: digest, status, draw and reset.
//! Output is `key=value` lines on stdout.

use anyhow::{bail, Result};
use essen_lock::{
    CryptoSuite, GestureSequence, GridLayout, HashKind, InputEvent, InsecureHasher, LockEffect,
    LockError, LockEvent, LockMachine, LockSession, LockState, LockStore, LogShell, PatternHasher,
    Sha256Hasher,
};
use std::path::PathBuf;
use tracing::info;

use super::{load_config, open_store};

// ---------------------------------------------------------------------------
// lock digest
// ---------------------------------------------------------------------------

pub fn lock_digest(pattern: &GestureSequence, salt: Option<String>, insecure: bool) -> Result<()> {
    if !pattern.is_complete() {
        bail!(LockError::PatternTooShort { len: pattern.len() });
    }
    let hasher: Box<dyn PatternHasher> = if insecure {
        Box::new(InsecureHasher)
    } else {
        Box::new(Sha256Hasher)
    };
    let salt = match salt {
        Some(s) => s,
        None => CryptoSuite::detect(insecure).salts.generate(),
    };

    println!("kind={}", kind_name(hasher.kind()));
    println!("pattern={pattern}");
    println!("salt={salt}");
    println!("hash={}", hasher.digest(pattern, &salt));
    Ok(())
}

// ---------------------------------------------------------------------------
// lock status
// ---------------------------------------------------------------------------

/// Reports where the lock would land on boot without writing anything.
///
/// Boot digests (preset bootstrap or enforcement check) are computed against
/// the loaded record; records the boot would persist are only reported.
pub fn lock_status(config_paths: &[String], store_dir: Option<PathBuf>) -> Result<()> {
    let (loaded, cfg) = load_config(config_paths)?;
    let (dir, kv) = open_store(&cfg, store_dir);
    let store = LockStore::new(Box::new(kv));
    let mut crypto = CryptoSuite::detect(cfg.lock.allow_insecure_hash);

    let stored = if cfg.lock.enabled { store.load() } else { None };
    let record_present = stored.is_some();
    let (mut machine, mut effects) = LockMachine::boot(&cfg.lock, crypto.hasher.is_some(), stored);

    let mut would_write = false;
    loop {
        let mut job = None;
        for effect in effects {
            match effect {
                LockEffect::Persist(_) => would_write = true,
                LockEffect::Digest(next) => job = Some(next),
                _ => {}
            }
        }
        let Some(job) = job else { break };
        let outcome = job
            .prepare(crypto.salts.as_mut())
            .compute(crypto.hasher.as_deref());
        effects = machine.apply(LockEvent::DigestReady(outcome))?;
    }

    let preset = cfg
        .lock
        .usable_preset()
        .and_then(|ix| GestureSequence::from_indices(&ix).ok())
        .map(|p| p.encode())
        .unwrap_or_else(|| "none".to_string());

    println!("config_hash={}", loaded.config_hash);
    println!("store_dir={}", dir.display());
    println!("lock_enabled={}", cfg.lock.enabled);
    println!("record={}", if record_present { "present" } else { "absent" });
    println!(
        "hash_kind={}",
        crypto.hash_kind().map(kind_name).unwrap_or("none")
    );
    println!("preset={preset} enforce_preset={}", cfg.lock.enforce_preset);
    println!("boot_state={}", state_name(machine.state()));
    println!("would_write_record={would_write}");
    Ok(())
}

// ---------------------------------------------------------------------------
// lock draw
// ---------------------------------------------------------------------------

pub fn lock_draw(
    config_paths: &[String],
    store_dir: Option<PathBuf>,
    patterns: &[GestureSequence],
) -> Result<()> {
    let (_, cfg) = load_config(config_paths)?;
    let (_, kv) = open_store(&cfg, store_dir);
    let mut session = LockSession::boot(
        &cfg.lock,
        LockStore::new(Box::new(kv)),
        CryptoSuite::detect(cfg.lock.allow_insecure_hash),
        Box::new(LogShell),
        GridLayout::default(),
    );
    println!("boot_state={}", state_name(session.state()));

    for (i, pattern) in patterns.iter().enumerate() {
        draw(&mut session, pattern)?;
        let view = session.view();
        println!(
            "draw={} pattern={} state={} rejection={}",
            i + 1,
            pattern,
            state_name(view.state),
            view.last_rejection.as_deref().unwrap_or("none")
        );
        if let Some(text) = view.message_text {
            println!("message={text}");
        }
        // Delayed clears have elapsed by the time the next pattern is drawn.
        session.clear_gesture();
    }

    println!("unlocked={}", session.is_revealed());
    Ok(())
}

/// One pointer stroke through the dot centers of `pattern`.
fn draw(session: &mut LockSession, pattern: &GestureSequence) -> Result<(), LockError> {
    let layout = session.layout().clone();
    for (i, dot) in pattern.dots().iter().enumerate() {
        let p = layout.center(*dot);
        let event = if i == 0 {
            InputEvent::PointerDown { x: p.x, y: p.y }
        } else {
            InputEvent::PointerMove { x: p.x, y: p.y }
        };
        session.drive(&event)?;
    }
    session.drive(&InputEvent::PointerUp)
}

// ---------------------------------------------------------------------------
// lock reset
// ---------------------------------------------------------------------------

pub fn lock_reset(config_paths: &[String], store_dir: Option<PathBuf>, yes: bool) -> Result<()> {
    if !yes {
        bail!(
            "REFUSING RESET: this forgets the current lock pattern. Re-run with: `essen lock reset --yes`"
        );
    }
    let (_, cfg) = load_config(config_paths)?;
    let (dir, kv) = open_store(&cfg, store_dir);
    LockStore::new(Box::new(kv)).clear()?;
    info!(store = %dir.display(), "lock record cleared");
    println!("lock_reset=ok store_dir={}", dir.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn kind_name(kind: HashKind) -> &'static str {
    match kind {
        HashKind::Sha256 => "sha256",
        HashKind::Insecure => "insecure",
    }
}

fn state_name(state: LockState) -> String {
    serde_json::to_value(state)
        .ok()
        .and_then(|v| v.as_str().map(String::from))
        .unwrap_or_else(|| format!("{state:?}"))
}
