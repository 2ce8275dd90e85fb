//! Salted pattern digests.
//!
//! The digest input is `salt + "|" + sequence.encode()`, e.g.
//! `"3fa9…|6-3-0-4-7-5"`. Two implementations exist behind [`PatternHasher`]:
//! SHA-256 (64 lowercase hex chars) and a deterministic, non-cryptographic
//! fallback (16 hex chars) that is only used when explicitly allowed.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::grid::GestureSequence;

/// Which digest a hasher produces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashKind {
    Sha256,
    Insecure,
}

/// Computes the stored digest of a gesture.
pub trait PatternHasher: Send + Sync {
    fn kind(&self) -> HashKind;

    /// Digest of an already-assembled input string.
    fn digest_str(&self, input: &str) -> String;

    fn digest(&self, sequence: &GestureSequence, salt: &str) -> String {
        self.digest_str(&digest_input(sequence, salt))
    }
}

/// `salt|i-j-k…`
pub fn digest_input(sequence: &GestureSequence, salt: &str) -> String {
    format!("{salt}|{}", sequence.encode())
}

/// Digest through whichever hasher is in effect; `None` when no hasher is available.
pub fn pattern_digest(
    hasher: Option<&dyn PatternHasher>,
    sequence: &GestureSequence,
    salt: &str,
) -> Option<String> {
    hasher.map(|h| h.digest(sequence, salt))
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Sha256Hasher;

impl PatternHasher for Sha256Hasher {
    fn kind(&self) -> HashKind {
        HashKind::Sha256
    }

    fn digest_str(&self, input: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(input.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Two multiplicative rolling hashes over UTF-16 code units, each finished
/// with an xor-shift and rendered as 8 zero-padded hex digits.
///
/// All arithmetic wraps at 32 bits, so output is identical on every platform.
#[derive(Clone, Copy, Debug, Default)]
pub struct InsecureHasher;

impl InsecureHasher {
    const SEED_A: u32 = 0xdead_beef;
    const SEED_B: u32 = 0x41c6_ce57;
    const MUL_A: u32 = 2_654_435_761;
    const MUL_B: u32 = 1_597_334_677;
}

impl PatternHasher for InsecureHasher {
    fn kind(&self) -> HashKind {
        HashKind::Insecure
    }

    fn digest_str(&self, input: &str) -> String {
        let units: Vec<u16> = input.encode_utf16().collect();
        let len = units.len() as u32;
        let mut h1 = Self::SEED_A ^ len;
        let mut h2 = Self::SEED_B ^ len;
        for ch in units {
            let ch = u32::from(ch);
            h1 = (h1 ^ ch).wrapping_mul(Self::MUL_A);
            h2 = (h2 ^ ch).wrapping_mul(Self::MUL_B);
        }
        h1 ^= h1 >> 16;
        h2 ^= h2 >> 16;
        format!("{h1:08x}{h2:08x}")
    }
}
