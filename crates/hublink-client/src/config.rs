//! Client configuration.

use hublink_transfer::HashVariant;
use serde::{Deserialize, Serialize};

/// Per-connection client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Digest variant the peer verifies for file transfers.
    ///
    /// Defaults to Keccak-512; see [`HashVariant`] for when the
    /// standardized SHA3-512 applies instead.
    #[serde(default)]
    pub hash: HashVariant,

    /// Session to switch to once the connection is established.
    #[serde(default)]
    pub session: Option<String>,
}
