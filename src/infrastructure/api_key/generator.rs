//! API key secret generation
//!
//! Secrets are `mk_live_` followed by 32 random bytes in unpadded base64url.
//! Only the SHA-256 digest is persisted; lookups go through the digest.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Type prefix carried by every secret
pub const SECRET_PREFIX: &str = "mk_live_";

const SECRET_BYTES: usize = 32;
const DISPLAY_CHARS: usize = 8;

/// Freshly minted secret; `secret` is shown to the caller once
#[derive(Clone)]
pub struct GeneratedSecret {
    pub secret: String,
    /// Type prefix plus the first random characters, safe to display
    pub display_prefix: String,
    pub hash: String,
}

impl std::fmt::Debug for GeneratedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratedSecret")
            .field("display_prefix", &self.display_prefix)
            .field("secret", &"[redacted]")
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SecretGenerator;

impl SecretGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn generate(&self) -> GeneratedSecret {
        let mut random_bytes = [0u8; SECRET_BYTES];
        rand::thread_rng().fill_bytes(&mut random_bytes);

        let encoded = URL_SAFE_NO_PAD.encode(random_bytes);
        let secret = format!("{}{}", SECRET_PREFIX, encoded);
        let display_prefix = format!("{}{}", SECRET_PREFIX, &encoded[..DISPLAY_CHARS]);

        GeneratedSecret {
            hash: hash_secret(&secret),
            secret,
            display_prefix,
        }
    }
}

/// Digest under which a secret is stored and looked up
pub fn hash_secret(secret: &str) -> String {
    let digest = Sha256::digest(secret.as_bytes());
    format!("sha256${}", URL_SAFE_NO_PAD.encode(digest))
}

/// Cheap shape check so obviously foreign strings never reach storage
pub fn has_secret_shape(candidate: &str) -> bool {
    candidate
        .strip_prefix(SECRET_PREFIX)
        .is_some_and(|rest| !rest.is_empty() && URL_SAFE_NO_PAD.decode(rest).is_ok())
}
