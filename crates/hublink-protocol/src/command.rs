//! Builders for every outgoing command line.
//!
//! Lines go to the transport verbatim; the transport appends its own
//! message boundary. Tag names travel unescaped (the hub forbids
//! delimiters in names); encoded values carry their own escaping.

use chrono::{DateTime, Utc};
use hublink_codec::{TypedValue, encode_value};

/// Request a tag browse.
pub const BROWSE: &str = "browse";

/// Drop every subscription of this connection.
pub const UNSUBSCRIBE_ALL: &str = "unsubscribe";

/// Server configuration operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl Operation {
    #[must_use]
    pub const fn as_wire(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Read => "READ",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

/// Which action hook a configuration change targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    PreAction,
    PostAction,
}

impl Target {
    #[must_use]
    pub const fn as_wire(self) -> &'static str {
        match self {
            Self::PreAction => "PRE_ACTION",
            Self::PostAction => "POST_ACTION",
        }
    }
}

/// What a configuration change does to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigCommand {
    Enable,
    Disable,
}

impl ConfigCommand {
    #[must_use]
    pub const fn as_wire(self) -> &'static str {
        match self {
            Self::Enable => "ENABLE",
            Self::Disable => "DISABLE",
        }
    }
}

/// Read the current value of a tag.
#[must_use]
pub fn read_tag(tag: &str) -> String {
    format!("read|{tag}")
}

/// Read every sample of a tag between two instants.
#[must_use]
pub fn read_tag_range(tag: &str, from: DateTime<Utc>, to: DateTime<Utc>) -> String {
    format!(
        "read|{tag}|{}|{}",
        from.timestamp_millis(),
        to.timestamp_millis()
    )
}

/// Ask which time range the hub has persisted for a tag.
#[must_use]
pub fn query_tag_range(tag: &str) -> String {
    format!("db|range|{tag}")
}

/// Subscribe to a tag's updates.
#[must_use]
pub fn subscribe_tag(tag: &str) -> String {
    format!("subscribe|{tag}")
}

/// Write a timestamped value to a tag.
#[must_use]
pub fn write_tag(tag: &str, timestamp: DateTime<Utc>, value: &TypedValue) -> String {
    let (payload, code) = encode_value(value);
    format!(
        "write|{tag}|{}|{code}|{payload}",
        timestamp.timestamp_millis()
    )
}

/// Switch this connection to a named session.
#[must_use]
pub fn switch_session(name: &str) -> String {
    format!("session|switch|{name}")
}

/// Change the server-side configuration of a tag.
#[must_use]
pub fn configuration(
    operation: Operation,
    target: Target,
    command: ConfigCommand,
    tag: &str,
) -> String {
    format!(
        "config|{}|{}|{}|{tag}",
        operation.as_wire(),
        target.as_wire(),
        command.as_wire()
    )
}

/// Request a file download.
#[must_use]
pub fn file_transfer(filename: &str) -> String {
    format!("file|transfer|{filename}")
}

/// Announce a file upload of the given size.
#[must_use]
pub fn file_upload(filename: &str, size: u64) -> String {
    format!("file|upload|{filename}|{size}")
}

/// Close an upload with the content digest for verification.
#[must_use]
pub fn file_upload_done(digest_hex: &str) -> String {
    format!("file|upload|done|{digest_hex}")
}
