//! Startup probing of the crypto primitives and selection of the hasher and
//! salt source the lock runs with.

use rand::rngs::OsRng;
use rand::RngCore;
use std::sync::Arc;
use tracing::{info, warn};

use crate::digest::{HashKind, InsecureHasher, PatternHasher, Sha256Hasher};
use crate::salt::{OsSaltSource, SaltSource, WeakSaltSource};

/// SHA-256("abc"), FIPS 180-2 appendix B.1.
const SHA256_ABC: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

/// Which strong primitives are usable in this process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CryptoProbe {
    pub strong_digest: bool,
    pub strong_random: bool,
}

impl CryptoProbe {
    /// Known-answer test for SHA-256 plus one draw from the OS RNG.
    pub fn detect() -> Self {
        let strong_digest = Sha256Hasher.digest_str("abc") == SHA256_ABC;
        let mut scratch = [0u8; 16];
        let strong_random = OsRng.try_fill_bytes(&mut scratch).is_ok();
        Self {
            strong_digest,
            strong_random,
        }
    }

    pub fn none() -> Self {
        Self {
            strong_digest: false,
            strong_random: false,
        }
    }
}

/// Hasher + salt source selected once at startup.
pub struct CryptoSuite {
    pub hasher: Option<Arc<dyn PatternHasher>>,
    pub salts: Box<dyn SaltSource>,
}

impl CryptoSuite {
    pub fn detect(allow_insecure_hash: bool) -> Self {
        Self::from_probe(CryptoProbe::detect(), allow_insecure_hash)
    }

    pub fn from_probe(probe: CryptoProbe, allow_insecure_hash: bool) -> Self {
        let hasher: Option<Arc<dyn PatternHasher>> = if probe.strong_digest {
            Some(Arc::new(Sha256Hasher))
        } else if allow_insecure_hash {
            warn!("SHA-256 unavailable; lock falls back to the insecure digest");
            Some(Arc::new(InsecureHasher))
        } else {
            warn!("SHA-256 unavailable and insecure digest disallowed");
            None
        };

        let salts: Box<dyn SaltSource> = if probe.strong_random {
            Box::new(OsSaltSource)
        } else {
            warn!("OS randomness unavailable; salts use the thread PRNG");
            Box::new(WeakSaltSource)
        };

        info!(
            hash = ?hasher.as_ref().map(|h| h.kind()),
            strong_salt = salts.is_strong(),
            "lock crypto selected"
        );
        Self { hasher, salts }
    }

    /// Explicit parts; used by tests and embedders with their own primitives.
    pub fn new(hasher: Option<Arc<dyn PatternHasher>>, salts: Box<dyn SaltSource>) -> Self {
        Self { hasher, salts }
    }

    pub fn hash_kind(&self) -> Option<HashKind> {
        self.hasher.as_ref().map(|h| h.kind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_finds_strong_primitives() {
        let probe = CryptoProbe::detect();
        assert!(probe.strong_digest);
        assert!(probe.strong_random);
        assert_eq!(CryptoSuite::from_probe(probe, false).hash_kind(), Some(HashKind::Sha256));
    }

    #[test]
    fn weak_environment_respects_insecure_flag() {
        let allowed = CryptoSuite::from_probe(CryptoProbe::none(), true);
        assert_eq!(allowed.hash_kind(), Some(HashKind::Insecure));
        assert!(!allowed.salts.is_strong());

        let denied = CryptoSuite::from_probe(CryptoProbe::none(), false);
        assert_eq!(denied.hash_kind(), None);
    }
}
