//! Content digests for transfer verification.

use serde::{Deserialize, Serialize};
use sha3::digest::DynDigest;
use sha3::{Digest, Keccak512, Sha3_512};

/// Which 512-bit digest the peer verifies.
///
/// Hubs deployed before the digest family was standardized verify
/// Keccak-512 (their implementation predates the FIPS 202 padding change,
/// even where it was labeled SHA3-512); later hubs verify the standardized
/// SHA3-512. The two never agree on any input, so the variant must match
/// the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashVariant {
    #[default]
    Keccak512,
    Sha3_512,
}

/// Streaming hasher for one transfer session.
pub struct ContentHasher {
    variant: HashVariant,
    inner: Box<dyn DynDigest + Send>,
}

impl ContentHasher {
    /// Create a hasher for the given digest variant.
    #[must_use]
    pub fn new(variant: HashVariant) -> Self {
        let inner: Box<dyn DynDigest + Send> = match variant {
            HashVariant::Keccak512 => Box::new(Keccak512::new()),
            HashVariant::Sha3_512 => Box::new(Sha3_512::new()),
        };
        Self { variant, inner }
    }

    /// Feed bytes into the running digest.
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Finish the digest and return it as lowercase hex.
    ///
    /// The hasher resets to its initial state.
    pub fn finalize_hex(&mut self) -> String {
        hex::encode(self.inner.finalize_reset())
    }
}

impl std::fmt::Debug for ContentHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentHasher")
            .field("variant", &self.variant)
            .finish_non_exhaustive()
    }
}
