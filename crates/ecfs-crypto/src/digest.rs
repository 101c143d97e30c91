//! Strong digest service for abbreviated no-key names.

use std::sync::OnceLock;

use sha2::{Digest, Sha256};

/// Size of the digest stored in a long-form no-key name
pub const DIGEST_SIZE: usize = 32;

/// Single-shot digest over a byte slice.
pub trait NameDigest: Send + Sync {
    fn digest(&self, data: &[u8]) -> anyhow::Result<[u8; DIGEST_SIZE]>;
}

/// SHA-256 digest handle.
#[derive(Debug, Clone, Default)]
pub struct Sha256Digest {
    template: Sha256,
}

impl Sha256Digest {
    pub fn new() -> Self {
        Self {
            template: Sha256::new(),
        }
    }
}

impl NameDigest for Sha256Digest {
    fn digest(&self, data: &[u8]) -> anyhow::Result<[u8; DIGEST_SIZE]> {
        let mut hasher = self.template.clone();
        hasher.update(data);
        Ok(hasher.finalize().into())
    }
}

static SHARED_SHA256: OnceLock<Sha256Digest> = OnceLock::new();

/// Process-wide SHA-256 handle, created on first use and never torn down.
///
/// Concurrent first callers race on the cell; exactly one handle is
/// installed and every caller gets that one.
pub fn shared_digest() -> &'static Sha256Digest {
    SHARED_SHA256.get_or_init(|| {
        tracing::debug!("allocating shared sha256 handle for no-key names");
        Sha256Digest::new()
    })
}
