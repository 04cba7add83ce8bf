//! File-transfer session queues with streaming content verification.
//!
//! This crate provides:
//! - `TransferManager` - FIFO download/upload queues driven by server replies
//! - Byte accounting with exact frame-boundary splitting for downloads
//! - A resumable, step-driven upload pump
//! - `HashVariant`/`ContentHasher` - the 512-bit content digests peers verify
//!
//! The wire protocol never tags file replies with a request id; client and
//! server correlate strictly by arrival order, so the head of each queue is
//! always the session the next reply of that kind addresses.

pub mod download;
pub mod hash;
pub mod manager;
pub mod upload;

pub use download::DownloadUpdate;
pub use hash::{ContentHasher, HashVariant};
pub use manager::{FailReason, TransferId, TransferManager};
pub use upload::{UPLOAD_CHUNK_SIZE, UploadSource, UploadStep, UploadUpdate};
