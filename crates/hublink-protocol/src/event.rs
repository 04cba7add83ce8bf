//! The closed set of events applications observe.

use chrono::{DateTime, Utc};
use hublink_codec::{Quality, Scalar, TypedValue};
use hublink_transfer::{DownloadUpdate, UploadUpdate};
use serde::{Deserialize, Serialize};

/// One sample inside a completed range read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangePoint {
    pub timestamp: DateTime<Utc>,
    pub value: Scalar,
}

/// A completed historical range read for one tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeRead {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    /// Samples in the order the server delivered them.
    pub points: Vec<RangePoint>,
}

/// Everything the dispatcher can tell the application.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// A tag's value changed.
    TagValueUpdated {
        tag: String,
        timestamp: DateTime<Utc>,
        value: TypedValue,
    },
    /// A tag's quality changed.
    TagQualityUpdated { tag: String, quality: Quality },
    /// A tag's unit changed.
    TagUnitUpdated { tag: String, unit: String },
    /// The server finished a tag browse.
    TagsImported,
    /// A historical range read completed.
    RangeReadCompleted { tag: String, read: RangeRead },
    /// The server reported the persisted range of a tag.
    TagRangeAvailable {
        tag: String,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    /// Download session progress or outcome.
    Download(DownloadUpdate),
    /// Upload session progress or outcome.
    Upload(UploadUpdate),
    /// The transport reported an established connection.
    Connected,
    /// The transport reported a lost connection.
    Disconnected,
}

impl From<DownloadUpdate> for ClientEvent {
    fn from(update: DownloadUpdate) -> Self {
        Self::Download(update)
    }
}

impl From<UploadUpdate> for ClientEvent {
    fn from(update: UploadUpdate) -> Self {
        Self::Upload(update)
    }
}
