//! Upload session state and the step-driven chunk pump.

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::hash::{ContentHasher, HashVariant};
use crate::manager::{FailReason, TransferId};

/// Bytes read from the source and sent per pump step.
pub const UPLOAD_CHUNK_SIZE: usize = 65536;

/// The readable byte source of an upload.
pub type UploadSource = Box<dyn AsyncRead + Send + Unpin>;

/// Progress and terminal notifications for an upload session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadUpdate {
    /// The server is ready to receive content for the queue head.
    Ready { id: TransferId },
    /// Cumulative bytes sent after a pump step.
    Progress { id: TransferId, transferred: u64 },
    /// The server verified the content digest.
    Succeeded { id: TransferId },
    /// The session failed and was removed from the queue.
    Failed {
        id: TransferId,
        reason: FailReason,
        message: Option<String>,
    },
}

/// Outcome of one upload pump step.
///
/// The caller sends `Chunk` data as a binary frame, announces `Finished`
/// with the done command carrying the digest, and reports `Failed`
/// sessions to the application.
#[derive(Debug)]
pub enum UploadStep {
    /// Content read from the source; send it and report progress.
    Chunk {
        id: TransferId,
        data: Bytes,
        transferred: u64,
    },
    /// The source is exhausted; the digest is ready for the done command.
    Finished { id: TransferId, digest: String },
    /// Reading the source failed; the session was removed from the queue.
    Failed {
        id: TransferId,
        error: std::io::Error,
    },
    /// No upload is in its sending phase.
    Idle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UploadPhase {
    /// Request sent, waiting for the server's ready reply.
    Queued,
    /// Ready received; content is being pumped.
    Sending,
    /// Done command sent; waiting for the server's verdict.
    AwaitingVerdict,
}

/// One queued upload.
pub(crate) struct UploadSession {
    id: TransferId,
    filename: String,
    size: u64,
    transferred: u64,
    phase: UploadPhase,
    hasher: ContentHasher,
    source: UploadSource,
}

impl UploadSession {
    pub(crate) fn new(
        id: TransferId,
        filename: String,
        size: u64,
        source: UploadSource,
        variant: HashVariant,
    ) -> Self {
        Self {
            id,
            filename,
            size,
            transferred: 0,
            phase: UploadPhase::Queued,
            hasher: ContentHasher::new(variant),
            source,
        }
    }

    pub(crate) const fn id(&self) -> TransferId {
        self.id
    }

    pub(crate) fn filename(&self) -> &str {
        &self.filename
    }

    pub(crate) const fn phase(&self) -> UploadPhase {
        self.phase
    }

    /// The server is ready; the pump may start.
    pub(crate) fn server_ready(&mut self) -> UploadUpdate {
        self.phase = UploadPhase::Sending;
        UploadUpdate::Ready { id: self.id }
    }

    /// Read and account the next chunk from the source.
    pub(crate) async fn read_chunk(&mut self) -> Result<UploadStep, std::io::Error> {
        let mut buf = vec![0u8; UPLOAD_CHUNK_SIZE];
        let n = self.source.read(&mut buf).await?;
        if n == 0 {
            self.phase = UploadPhase::AwaitingVerdict;
            return Ok(UploadStep::Finished {
                id: self.id,
                digest: self.hasher.finalize_hex(),
            });
        }

        buf.truncate(n);
        let data = Bytes::from(buf);
        self.hasher.update(&data);
        self.transferred += data.len() as u64;
        Ok(UploadStep::Chunk {
            id: self.id,
            data,
            transferred: self.transferred,
        })
    }

    pub(crate) fn fail(self, reason: FailReason, message: Option<String>) -> UploadUpdate {
        UploadUpdate::Failed {
            id: self.id,
            reason,
            message,
        }
    }
}

impl std::fmt::Debug for UploadSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadSession")
            .field("id", &self.id)
            .field("filename", &self.filename)
            .field("size", &self.size)
            .field("transferred", &self.transferred)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}
