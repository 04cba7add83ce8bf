//! FIFO transfer queues driven by server replies and raw content bytes.

use std::collections::VecDeque;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::download::{DownloadSession, DownloadUpdate};
use crate::hash::HashVariant;
use crate::upload::{UploadPhase, UploadSession, UploadSource, UploadStep, UploadUpdate};

/// Client-side transfer session identifier.
///
/// Used only to correlate progress and terminal events with the session
/// that caused them; it never appears on the wire.
pub type TransferId = Uuid;

/// Why a transfer session failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailReason {
    /// The content digest did not match.
    Hash,
    /// The server reported an error, possibly with a message.
    Server,
    /// Missing error details, or a local failure such as disconnect.
    Unknown,
}

/// Download and upload queues for one connection.
///
/// Replies are correlated to sessions strictly by arrival order: the queue
/// head is always the session the next server reply of that kind
/// addresses. Queue order is creation order and is never reordered.
#[derive(Debug)]
pub struct TransferManager {
    hash: HashVariant,
    downloads: VecDeque<DownloadSession>,
    uploads: VecDeque<UploadSession>,
}

impl TransferManager {
    /// Create a manager verifying content with the given digest variant.
    #[must_use]
    pub const fn new(hash: HashVariant) -> Self {
        Self {
            hash,
            downloads: VecDeque::new(),
            uploads: VecDeque::new(),
        }
    }

    /// Queue a download session behind any already in flight.
    pub fn queue_download(&mut self, id: TransferId) {
        self.downloads.push_back(DownloadSession::new(id, self.hash));
    }

    /// Queue an upload session behind any already in flight.
    pub fn queue_upload(
        &mut self,
        id: TransferId,
        filename: String,
        size: u64,
        source: UploadSource,
    ) {
        self.uploads
            .push_back(UploadSession::new(id, filename, size, source, self.hash));
    }

    /// Number of queued download sessions.
    #[must_use]
    pub fn pending_downloads(&self) -> usize {
        self.downloads.len()
    }

    /// Number of queued upload sessions.
    #[must_use]
    pub fn pending_uploads(&self) -> usize {
        self.uploads.len()
    }

    /// Server accepted the head download and declared its size.
    pub fn on_download_ok(&mut self, size: u64) -> Vec<DownloadUpdate> {
        match self.downloads.front_mut() {
            Some(head) => vec![head.start(size)],
            None => {
                tracing::warn!("file ok reply with no download in flight");
                Vec::new()
            }
        }
    }

    /// Server rejected the head download. A message means a server-side
    /// failure; its absence leaves the reason unknown.
    pub fn on_download_error(&mut self, message: Option<String>) -> Vec<DownloadUpdate> {
        let Some(head) = self.downloads.pop_front() else {
            tracing::warn!("file error reply with no download in flight");
            return Vec::new();
        };
        let reason = if message.is_some() {
            FailReason::Server
        } else {
            FailReason::Unknown
        };
        vec![head.fail(reason, message)]
    }

    /// Server finished the head download; verify its digest against ours.
    pub fn on_download_done(&mut self, server_hex: &str) -> Vec<DownloadUpdate> {
        let Some(head) = self.downloads.pop_front() else {
            tracing::warn!("file done reply with no download in flight");
            return Vec::new();
        };
        vec![head.verdict(server_hex)]
    }

    /// Fail and remove the head download, e.g. on a reply that consumed it
    /// without carrying the fields it should.
    pub fn fail_head_download(
        &mut self,
        reason: FailReason,
        message: Option<String>,
    ) -> Vec<DownloadUpdate> {
        let Some(head) = self.downloads.pop_front() else {
            return Vec::new();
        };
        vec![head.fail(reason, message)]
    }

    /// Account raw content bytes against the head download.
    ///
    /// A chunk reaching the declared size is split at the exact boundary:
    /// only the prefix is hashed and counted, and the suffix is handed
    /// back in [`DownloadUpdate::Complete`] for the transport to consume.
    pub fn handle_chunk(&mut self, chunk: Bytes) -> Vec<DownloadUpdate> {
        let Some(head) = self.downloads.front_mut() else {
            tracing::warn!(len = chunk.len(), "dropping content bytes: no download in flight");
            return Vec::new();
        };
        let Some(total) = head.expected() else {
            tracing::warn!(len = chunk.len(), "dropping content bytes: download not started");
            return Vec::new();
        };
        if head.complete() {
            tracing::warn!(len = chunk.len(), "dropping content bytes: download already complete");
            return Vec::new();
        }

        let remaining = total - head.received();
        if (chunk.len() as u64) < remaining {
            return vec![head.accept(&chunk, total)];
        }

        let boundary = usize::try_from(remaining).unwrap_or(chunk.len());
        let body = chunk.slice(..boundary);
        let surplus = chunk.slice(boundary..);
        let progress = head.accept(&body, total);
        let complete = DownloadUpdate::Complete {
            id: head.id(),
            surplus,
        };
        vec![progress, complete]
    }

    /// Server is ready to receive content for the head upload.
    pub fn on_upload_ready(&mut self) -> Vec<UploadUpdate> {
        match self.uploads.front_mut() {
            Some(head) => vec![head.server_ready()],
            None => {
                tracing::warn!("file upload ready reply with no upload in flight");
                Vec::new()
            }
        }
    }

    /// Server verified the head upload's digest.
    pub fn on_upload_success(&mut self) -> Vec<UploadUpdate> {
        let Some(head) = self.uploads.pop_front() else {
            tracing::warn!("file upload success reply with no upload in flight");
            return Vec::new();
        };
        vec![UploadUpdate::Succeeded { id: head.id() }]
    }

    /// Server rejected the head upload's digest.
    pub fn on_upload_hash_mismatch(&mut self) -> Vec<UploadUpdate> {
        let Some(head) = self.uploads.pop_front() else {
            tracing::warn!("file upload hash_mismatch reply with no upload in flight");
            return Vec::new();
        };
        vec![head.fail(FailReason::Hash, None)]
    }

    /// Server reported an upload error, possibly with a message.
    pub fn on_upload_error(&mut self, message: Option<String>) -> Vec<UploadUpdate> {
        let Some(head) = self.uploads.pop_front() else {
            tracing::warn!("file upload error reply with no upload in flight");
            return Vec::new();
        };
        vec![head.fail(FailReason::Server, message)]
    }

    /// True while the head upload is in its sending phase.
    #[must_use]
    pub fn upload_in_progress(&self) -> bool {
        self.uploads
            .front()
            .is_some_and(|u| u.phase() == UploadPhase::Sending)
    }

    /// Pump the next chunk of the sending upload.
    ///
    /// Returns [`UploadStep::Idle`] when no upload is sending. A source
    /// read error removes the session from the queue.
    pub async fn next_upload_chunk(&mut self) -> UploadStep {
        let Some(upload) = self.uploads.front_mut() else {
            return UploadStep::Idle;
        };
        if upload.phase() != UploadPhase::Sending {
            return UploadStep::Idle;
        }

        match upload.read_chunk().await {
            Ok(step) => step,
            Err(error) => {
                let id = upload.id();
                tracing::warn!(
                    filename = upload.filename(),
                    "reading upload source failed: {error}"
                );
                self.uploads.pop_front();
                UploadStep::Failed { id, error }
            }
        }
    }

    /// Drain every queued session, failing each with an unknown reason.
    ///
    /// Called on disconnect; nothing may be dropped silently.
    pub fn fail_all(&mut self) -> (Vec<DownloadUpdate>, Vec<UploadUpdate>) {
        let downloads = self
            .downloads
            .drain(..)
            .map(|d| d.fail(FailReason::Unknown, None))
            .collect();
        let uploads = self
            .uploads
            .drain(..)
            .map(|u| u.fail(FailReason::Unknown, None))
            .collect();
        (downloads, uploads)
    }
}

impl Default for TransferManager {
    fn default() -> Self {
        Self::new(HashVariant::default())
    }
}
