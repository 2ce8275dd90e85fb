use rand::rngs::OsRng;
use rand::{Rng, RngCore};
use tracing::warn;

/// Bytes of OS randomness per salt (hex-encoded to 32 chars).
pub const SALT_BYTES: usize = 16;

const WEAK_SALT_LEN: usize = 11;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Produces the salt stored alongside a fresh lock record.
pub trait SaltSource: Send {
    fn generate(&mut self) -> String;

    fn is_strong(&self) -> bool;
}

/// 16 bytes from the operating system RNG, lowercase hex.
#[derive(Debug, Default)]
pub struct OsSaltSource;

impl SaltSource for OsSaltSource {
    fn generate(&mut self) -> String {
        let mut bytes = [0u8; SALT_BYTES];
        match OsRng.try_fill_bytes(&mut bytes) {
            Ok(()) => hex::encode(bytes),
            Err(e) => {
                warn!(error = %e, "OS randomness unavailable; using weak salt");
                WeakSaltSource.generate()
            }
        }
    }

    fn is_strong(&self) -> bool {
        true
    }
}

/// Short base-36 string from the thread-local PRNG.
#[derive(Debug, Default)]
pub struct WeakSaltSource;

impl SaltSource for WeakSaltSource {
    fn generate(&mut self) -> String {
        let mut rng = rand::thread_rng();
        (0..WEAK_SALT_LEN)
            .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
            .collect()
    }

    fn is_strong(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn os_salt_is_32_hex_chars_and_varies() {
        let mut src = OsSaltSource;
        let a = src.generate();
        let b = src.generate();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(a, b);
    }

    #[test]
    fn weak_salt_is_base36() {
        let s = WeakSaltSource.generate();
        assert_eq!(s.len(), WEAK_SALT_LEN);
        assert!(s.bytes().all(|b| BASE36.contains(&b)));
        assert!(!WeakSaltSource.is_strong());
    }
}
