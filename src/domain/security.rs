//! Secret comparison
//!
//! The admin secret is only ever held as a SHA-256 digest. Candidates are
//! hashed the same way and compared without early exit, so neither the
//! length nor the content of the secret leaks through timing.

use sha2::{Digest, Sha256};
use std::fmt;

/// Digest of the configured admin secret
#[derive(Clone)]
pub struct SecretDigest {
    digest: Option<[u8; 32]>,
}

impl fmt::Debug for SecretDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretDigest")
            .field("configured", &self.is_configured())
            .finish()
    }
}

impl SecretDigest {
    /// An empty secret yields a digest that matches nothing
    pub fn new(secret: &str) -> Self {
        let digest = if secret.is_empty() {
            None
        } else {
            Some(hash(secret))
        };
        Self { digest }
    }

    pub fn is_configured(&self) -> bool {
        self.digest.is_some()
    }

    pub fn matches(&self, candidate: &str) -> bool {
        match &self.digest {
            Some(expected) => constant_time_eq(expected, &hash(candidate)),
            None => false,
        }
    }
}

fn hash(value: &str) -> [u8; 32] {
    Sha256::digest(value.as_bytes()).into()
}

/// Compare two digests touching every byte
pub fn constant_time_eq(a: &[u8; 32], b: &[u8; 32]) -> bool {
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
