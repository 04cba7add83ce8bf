//! Download session state and byte accounting.

use bytes::Bytes;

use crate::hash::{ContentHasher, HashVariant};
use crate::manager::{FailReason, TransferId};

/// Progress and terminal notifications for a download session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadUpdate {
    /// The server accepted the transfer and declared its size.
    Started { id: TransferId, size: u64 },
    /// A chunk of content was received and accounted.
    Progress {
        id: TransferId,
        chunk: Bytes,
        received: u64,
        total: u64,
    },
    /// The declared byte count was reached. `surplus` holds any bytes past
    /// the boundary; they belong to whatever the transport delivers next.
    Complete { id: TransferId, surplus: Bytes },
    /// The server's content digest matched ours.
    Succeeded { id: TransferId },
    /// The session failed and was removed from the queue.
    Failed {
        id: TransferId,
        reason: FailReason,
        message: Option<String>,
    },
}

/// One queued download.
#[derive(Debug)]
pub(crate) struct DownloadSession {
    id: TransferId,
    expected: Option<u64>,
    received: u64,
    hasher: ContentHasher,
}

impl DownloadSession {
    pub(crate) fn new(id: TransferId, variant: HashVariant) -> Self {
        Self {
            id,
            expected: None,
            received: 0,
            hasher: ContentHasher::new(variant),
        }
    }

    pub(crate) const fn id(&self) -> TransferId {
        self.id
    }

    /// Record the declared size from the server's acceptance reply.
    pub(crate) fn start(&mut self, size: u64) -> DownloadUpdate {
        self.expected = Some(size);
        DownloadUpdate::Started { id: self.id, size }
    }

    /// Total declared size, once the server has accepted.
    pub(crate) const fn expected(&self) -> Option<u64> {
        self.expected
    }

    /// Bytes accounted so far.
    pub(crate) const fn received(&self) -> u64 {
        self.received
    }

    /// True once every declared byte has been received.
    pub(crate) fn complete(&self) -> bool {
        self.expected == Some(self.received)
    }

    /// Account a chunk that is entirely within the declared size.
    pub(crate) fn accept(&mut self, chunk: &Bytes, total: u64) -> DownloadUpdate {
        self.hasher.update(chunk);
        self.received += chunk.len() as u64;
        DownloadUpdate::Progress {
            id: self.id,
            chunk: chunk.clone(),
            received: self.received,
            total,
        }
    }

    /// Compare the running digest against the server's hex digest.
    pub(crate) fn verdict(mut self, server_hex: &str) -> DownloadUpdate {
        if self.hasher.finalize_hex() == server_hex {
            DownloadUpdate::Succeeded { id: self.id }
        } else {
            DownloadUpdate::Failed {
                id: self.id,
                reason: FailReason::Hash,
                message: None,
            }
        }
    }

    pub(crate) fn fail(self, reason: FailReason, message: Option<String>) -> DownloadUpdate {
        DownloadUpdate::Failed {
            id: self.id,
            reason,
            message,
        }
    }
}
