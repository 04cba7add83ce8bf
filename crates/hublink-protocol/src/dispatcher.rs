//! Inbound line dispatch.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use hublink_codec::{Quality, ScalarType, decode_scalar, decode_value, split_unescaped};
use hublink_transfer::{FailReason, TransferManager};

use crate::correlator::RangeCorrelator;
use crate::event::ClientEvent;

/// Turns inbound protocol lines into typed client events.
///
/// Parse anomalies never abort the connection: malformed lines and replies
/// with no matching queued session are logged and dropped, and the
/// dispatcher keeps processing whatever follows.
#[derive(Debug)]
pub struct Dispatcher {
    ranges: RangeCorrelator,
    transfers: TransferManager,
}

impl Dispatcher {
    /// Create a dispatcher around a transfer manager.
    #[must_use]
    pub fn new(transfers: TransferManager) -> Self {
        Self {
            ranges: RangeCorrelator::new(),
            transfers,
        }
    }

    /// The transfer queues, for session creation and the upload pump.
    pub fn transfers_mut(&mut self) -> &mut TransferManager {
        &mut self.transfers
    }

    /// The transfer queues.
    #[must_use]
    pub fn transfers(&self) -> &TransferManager {
        &self.transfers
    }

    /// Number of range-read sessions pending for a tag.
    #[must_use]
    pub fn pending_ranges(&self, tag: &str) -> usize {
        self.ranges.pending(tag)
    }

    /// Process one protocol line.
    pub fn handle_line(&mut self, line: &str) -> Vec<ClientEvent> {
        let line = line.trim();
        let fields = split_unescaped(line, b'|');

        match fields[0] {
            "servertime" => {
                tracing::trace!("server heartbeat");
                Vec::new()
            }
            "browse" => Self::on_browse(&fields),
            "subscription" => Self::on_subscription(&fields),
            "read" => self.on_read(&fields),
            "readStart" => self.on_read_start(&fields),
            "readEnd" => self.on_read_end(&fields),
            "subscribe" => Self::on_subscribe(&fields),
            "file" => self.on_file(&fields),
            "db" => Self::on_db(&fields),
            other => {
                tracing::debug!("ignoring unrecognized command {other:?}");
                Vec::new()
            }
        }
    }

    /// Account raw content bytes against the active download.
    pub fn handle_content(&mut self, chunk: Bytes) -> Vec<ClientEvent> {
        self.transfers
            .handle_chunk(chunk)
            .into_iter()
            .map(ClientEvent::from)
            .collect()
    }

    /// Drop all correlation state and fail every queued transfer session.
    pub fn handle_disconnect(&mut self) -> Vec<ClientEvent> {
        self.ranges.clear();
        let (downloads, uploads) = self.transfers.fail_all();
        downloads
            .into_iter()
            .map(ClientEvent::from)
            .chain(uploads.into_iter().map(ClientEvent::from))
            .collect()
    }

    fn on_browse(fields: &[&str]) -> Vec<ClientEvent> {
        if fields.len() == 1 {
            return Vec::new();
        }
        if fields.len() < 7 {
            if fields[1] == "end" {
                return vec![ClientEvent::TagsImported];
            }
            return Vec::new();
        }

        full_update(
            fields[1], fields[2], fields[3], fields[4], fields[5], fields[6],
        )
    }

    fn on_subscription(fields: &[&str]) -> Vec<ClientEvent> {
        if fields.len() < 4 {
            tracing::warn!("invalid subscription update: {fields:?}");
            return Vec::new();
        }

        let tag = fields[2];
        match fields[1] {
            "value" => {
                if fields.len() < 6 {
                    tracing::warn!(tag, "invalid value subscription update");
                    return Vec::new();
                }
                value_update(tag, fields[3], fields[4], fields[5])
                    .into_iter()
                    .collect()
            }
            "quality" => quality_update(tag, fields[3]).into_iter().collect(),
            "unit" => vec![ClientEvent::TagUnitUpdated {
                tag: tag.to_owned(),
                unit: fields[3].to_owned(),
            }],
            other => {
                tracing::warn!("unknown subscription update kind {other:?}");
                Vec::new()
            }
        }
    }

    fn on_read(&mut self, fields: &[&str]) -> Vec<ClientEvent> {
        if fields.len() < 5 {
            if fields.get(2) == Some(&"queued") {
                tracing::trace!("read request queued by server");
            } else {
                tracing::warn!("unknown read reply: {fields:?}");
            }
            return Vec::new();
        }

        let tag = fields[1];
        if self.ranges.has_pending(tag) {
            // Data row of the oldest pending range read for this tag.
            let Some(timestamp) = parse_timestamp(fields[2]) else {
                tracing::warn!(tag, "dropped range row: bad timestamp {:?}", fields[2]);
                return Vec::new();
            };
            let Some(ty) = parse_scalar_type(fields[3]) else {
                tracing::warn!(tag, "dropped range row: unknown type code {:?}", fields[3]);
                return Vec::new();
            };
            match decode_scalar(ty, fields[4]) {
                Ok(value) => {
                    self.ranges.append(tag, timestamp, value);
                }
                Err(e) => tracing::warn!(tag, "dropped range row: {e}"),
            }
            return Vec::new();
        }

        if fields.len() >= 7 {
            // Unsolicited direct snapshot.
            return full_update(tag, fields[2], fields[3], fields[4], fields[5], fields[6]);
        }

        tracing::warn!(tag, "read reply with no pending range");
        Vec::new()
    }

    fn on_read_start(&mut self, fields: &[&str]) -> Vec<ClientEvent> {
        if fields.len() < 4 {
            tracing::warn!("unknown readStart reply: {fields:?}");
            return Vec::new();
        }

        let (Some(from), Some(to)) = (parse_timestamp(fields[2]), parse_timestamp(fields[3]))
        else {
            tracing::warn!("dropped readStart with bad bounds: {fields:?}");
            return Vec::new();
        };
        self.ranges.begin(fields[1], from, to);
        Vec::new()
    }

    fn on_read_end(&mut self, fields: &[&str]) -> Vec<ClientEvent> {
        if fields.len() < 2 {
            tracing::warn!("unknown readEnd reply: {fields:?}");
            return Vec::new();
        }

        let tag = fields[1];
        match self.ranges.finish(tag) {
            Some(read) => vec![ClientEvent::RangeReadCompleted {
                tag: tag.to_owned(),
                read,
            }],
            None => {
                tracing::warn!(tag, "readEnd with no pending range");
                Vec::new()
            }
        }
    }

    fn on_subscribe(fields: &[&str]) -> Vec<ClientEvent> {
        if fields.len() >= 8 && fields[1] == "ok" {
            return full_update(
                fields[2], fields[3], fields[4], fields[5], fields[6], fields[7],
            );
        }
        tracing::debug!("ignoring subscribe reply: {fields:?}");
        Vec::new()
    }

    fn on_file(&mut self, fields: &[&str]) -> Vec<ClientEvent> {
        if fields.len() < 2 {
            tracing::warn!("unknown file reply");
            return Vec::new();
        }

        match fields[1] {
            "ok" => {
                let size = fields.get(2).and_then(|f| f.parse::<u64>().ok());
                let updates = match size {
                    Some(size) => self.transfers.on_download_ok(size),
                    None => {
                        // The reply consumed the head session either way;
                        // keeping it queued would desynchronize every
                        // following file reply.
                        tracing::warn!("file ok reply without a size: {fields:?}");
                        self.transfers
                            .fail_head_download(FailReason::Unknown, None)
                    }
                };
                updates.into_iter().map(ClientEvent::from).collect()
            }
            "error" => {
                let message = fields.get(2).map(|m| (*m).to_owned());
                self.transfers
                    .on_download_error(message)
                    .into_iter()
                    .map(ClientEvent::from)
                    .collect()
            }
            "done" => {
                let updates = match fields.get(2) {
                    Some(digest) => self.transfers.on_download_done(digest),
                    None => {
                        tracing::warn!("file done reply without a digest");
                        self.transfers
                            .fail_head_download(FailReason::Unknown, None)
                    }
                };
                updates.into_iter().map(ClientEvent::from).collect()
            }
            "upload" => self.on_file_upload(fields),
            other => {
                tracing::warn!("unknown file reply kind {other:?}");
                Vec::new()
            }
        }
    }

    fn on_file_upload(&mut self, fields: &[&str]) -> Vec<ClientEvent> {
        if fields.len() < 3 {
            tracing::warn!("unknown file upload reply");
            return Vec::new();
        }

        let updates = match fields[2] {
            "ready" => self.transfers.on_upload_ready(),
            "success" => self.transfers.on_upload_success(),
            "hash_mismatch" => self.transfers.on_upload_hash_mismatch(),
            "error" => {
                let message = fields.get(3).map(|m| (*m).to_owned());
                self.transfers.on_upload_error(message)
            }
            other => {
                tracing::warn!("unknown file upload reply kind {other:?}");
                Vec::new()
            }
        };
        updates.into_iter().map(ClientEvent::from).collect()
    }

    fn on_db(fields: &[&str]) -> Vec<ClientEvent> {
        if fields.len() < 3 {
            tracing::warn!("unknown db reply: {fields:?}");
            return Vec::new();
        }

        let tag = fields[2];
        if fields[1] == "range" {
            if fields.len() < 5 {
                tracing::warn!(tag, "unknown db range reply: {fields:?}");
                return Vec::new();
            }
            let (Some(start), Some(end)) = (parse_timestamp(fields[3]), parse_timestamp(fields[4]))
            else {
                tracing::warn!(tag, "dropped db range with bad bounds: {fields:?}");
                return Vec::new();
            };
            return vec![ClientEvent::TagRangeAvailable {
                tag: tag.to_owned(),
                start,
                end,
            }];
        }

        tracing::warn!("unknown db reply: {fields:?}");
        Vec::new()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(TransferManager::default())
    }
}

fn parse_timestamp(field: &str) -> Option<DateTime<Utc>> {
    let millis: i64 = field.parse().ok()?;
    DateTime::from_timestamp_millis(millis)
}

fn parse_scalar_type(field: &str) -> Option<ScalarType> {
    field.parse::<u16>().ok().and_then(ScalarType::from_code)
}

/// Decode a full tag update, emitting unit, quality and value events.
fn full_update(
    tag: &str,
    timestamp: &str,
    type_code: &str,
    value: &str,
    unit: &str,
    quality: &str,
) -> Vec<ClientEvent> {
    let mut events = vec![ClientEvent::TagUnitUpdated {
        tag: tag.to_owned(),
        unit: unit.to_owned(),
    }];
    events.extend(quality_update(tag, quality));
    events.extend(value_update(tag, timestamp, type_code, value));
    events
}

fn quality_update(tag: &str, quality: &str) -> Option<ClientEvent> {
    match Quality::from_wire(quality) {
        Some(quality) => Some(ClientEvent::TagQualityUpdated {
            tag: tag.to_owned(),
            quality,
        }),
        None => {
            tracing::warn!(tag, "dropped quality update: unrecognized {quality:?}");
            None
        }
    }
}

fn value_update(tag: &str, timestamp: &str, type_code: &str, value: &str) -> Option<ClientEvent> {
    let Some(timestamp) = parse_timestamp(timestamp) else {
        tracing::warn!(tag, "dropped value update: bad timestamp");
        return None;
    };
    let Ok(code) = type_code.parse::<u16>() else {
        tracing::warn!(tag, "dropped value update: unknown type code {type_code:?}");
        return None;
    };
    match decode_value(code, value) {
        Ok(value) => Some(ClientEvent::TagValueUpdated {
            tag: tag.to_owned(),
            timestamp,
            value,
        }),
        Err(e) => {
            tracing::warn!(tag, "dropped value update: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use hublink_codec::{Scalar, TypedValue, VectorValue};
    use hublink_transfer::{DownloadUpdate, TransferId, UploadUpdate};
    use sha3::{Digest, Keccak512};

    use super::*;

    fn ms(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap()
    }

    #[test]
    fn test_servertime_is_a_heartbeat() {
        let mut d = Dispatcher::default();
        assert!(d.handle_line("servertime|1614834367000").is_empty());
    }

    #[test]
    fn test_browse_row_emits_unit_quality_value() {
        let mut d = Dispatcher::default();
        let events = d.handle_line("browse|rpm|1000|6|120.5|1/min|GOOD");
        assert_eq!(
            events,
            vec![
                ClientEvent::TagUnitUpdated {
                    tag: "rpm".into(),
                    unit: "1/min".into()
                },
                ClientEvent::TagQualityUpdated {
                    tag: "rpm".into(),
                    quality: Quality::Good
                },
                ClientEvent::TagValueUpdated {
                    tag: "rpm".into(),
                    timestamp: ms(1000),
                    value: TypedValue::Double(120.5)
                },
            ]
        );
    }

    #[test]
    fn test_browse_end_and_short_forms() {
        let mut d = Dispatcher::default();
        assert_eq!(d.handle_line("browse|end"), vec![ClientEvent::TagsImported]);
        assert!(d.handle_line("browse").is_empty());
        assert!(d.handle_line("browse|rpm|1000").is_empty());
    }

    #[test]
    fn test_subscription_updates() {
        let mut d = Dispatcher::default();
        assert_eq!(
            d.handle_line("subscription|value|rpm|2000|2|42"),
            vec![ClientEvent::TagValueUpdated {
                tag: "rpm".into(),
                timestamp: ms(2000),
                value: TypedValue::Int32(42)
            }]
        );
        assert_eq!(
            d.handle_line("subscription|quality|rpm|LAST_GOOD"),
            vec![ClientEvent::TagQualityUpdated {
                tag: "rpm".into(),
                quality: Quality::LastGood
            }]
        );
        assert_eq!(
            d.handle_line("subscription|unit|rpm|1/min"),
            vec![ClientEvent::TagUnitUpdated {
                tag: "rpm".into(),
                unit: "1/min".into()
            }]
        );
    }

    #[test]
    fn test_subscription_anomalies_are_dropped() {
        let mut d = Dispatcher::default();
        assert!(d.handle_line("subscription|value|rpm").is_empty());
        assert!(d.handle_line("subscription|quality|rpm|PERFECT").is_empty());
        assert!(d.handle_line("subscription|pressure|rpm|x").is_empty());
    }

    #[test]
    fn test_subscription_compound_value() {
        let mut d = Dispatcher::default();
        let events = d.handle_line("subscription|value|samples|0|1024|Vector#2#2#7#9");
        assert_eq!(
            events,
            vec![ClientEvent::TagValueUpdated {
                tag: "samples".into(),
                timestamp: ms(0),
                value: TypedValue::Vector(VectorValue::Int32(vec![7, 9]))
            }]
        );
    }

    #[test]
    fn test_read_queued_is_acknowledged_silently() {
        let mut d = Dispatcher::default();
        assert!(d.handle_line("read|rpm|queued").is_empty());
    }

    #[test]
    fn test_read_snapshot_without_pending_range() {
        let mut d = Dispatcher::default();
        let events = d.handle_line("read|rpm|1000|2|7|1/min|BAD");
        assert_eq!(events.len(), 3);
        assert!(matches!(
            &events[2],
            ClientEvent::TagValueUpdated { value: TypedValue::Int32(7), .. }
        ));
    }

    #[test]
    fn test_range_read_correlation() {
        let mut d = Dispatcher::default();
        assert!(d.handle_line("readStart|T|100|200").is_empty());
        assert!(d.handle_line("read|T|150|2|7").is_empty());

        let events = d.handle_line("readEnd|T");
        assert_eq!(
            events,
            vec![ClientEvent::RangeReadCompleted {
                tag: "T".into(),
                read: crate::event::RangeRead {
                    from: ms(100),
                    to: ms(200),
                    points: vec![crate::event::RangePoint {
                        timestamp: ms(150),
                        value: Scalar::Int32(7)
                    }],
                },
            }]
        );
        assert_eq!(d.pending_ranges("T"), 0);
    }

    #[test]
    fn test_overlapping_ranges_resolve_in_creation_order() {
        let mut d = Dispatcher::default();
        d.handle_line("readStart|T|100|200");
        d.handle_line("readStart|T|300|400");
        d.handle_line("read|T|110|2|1");
        d.handle_line("read|T|120|2|2");

        let first = d.handle_line("readEnd|T");
        let [
            ClientEvent::RangeReadCompleted { read, .. },
        ] = first.as_slice()
        else {
            panic!("expected one completed range");
        };
        assert_eq!((read.from, read.to), (ms(100), ms(200)));
        assert_eq!(read.points.len(), 2);

        d.handle_line("read|T|310|2|3");
        let second = d.handle_line("readEnd|T");
        let [
            ClientEvent::RangeReadCompleted { read, .. },
        ] = second.as_slice()
        else {
            panic!("expected one completed range");
        };
        assert_eq!((read.from, read.to), (ms(300), ms(400)));
        assert_eq!(read.points.len(), 1);
    }

    #[test]
    fn test_full_rows_append_while_range_is_pending() {
        let mut d = Dispatcher::default();
        d.handle_line("readStart|T|0|1000");
        // A 7-field row still belongs to the pending range, not a snapshot.
        assert!(d.handle_line("read|T|500|6|1.5|m|GOOD").is_empty());

        let events = d.handle_line("readEnd|T");
        let [ClientEvent::RangeReadCompleted { read, .. }] = events.as_slice() else {
            panic!("expected one completed range");
        };
        assert_eq!(read.points, vec![crate::event::RangePoint {
            timestamp: ms(500),
            value: Scalar::Double(1.5)
        }]);
    }

    #[test]
    fn test_read_end_without_pending_range_is_dropped() {
        let mut d = Dispatcher::default();
        assert!(d.handle_line("readEnd|T").is_empty());
    }

    #[test]
    fn test_subscribe_ok_emits_full_update() {
        let mut d = Dispatcher::default();
        let events = d.handle_line("subscribe|ok|rpm|1000|6|120.5|1/min|GOOD");
        assert_eq!(events.len(), 3);
        assert!(d.handle_line("subscribe|error|rpm").is_empty());
        assert!(d.handle_line("subscribe|ok|rpm|1000").is_empty());
    }

    #[test]
    fn test_db_range_reply() {
        let mut d = Dispatcher::default();
        assert_eq!(
            d.handle_line("db|range|rpm|1000|2000"),
            vec![ClientEvent::TagRangeAvailable {
                tag: "rpm".into(),
                start: ms(1000),
                end: ms(2000)
            }]
        );
        assert!(d.handle_line("db|range|rpm").is_empty());
        assert!(d.handle_line("db|vacuum|rpm").is_empty());
    }

    #[test]
    fn test_unknown_commands_do_not_disturb_processing() {
        let mut d = Dispatcher::default();
        assert!(d.handle_line("frobnicate|1|2|3").is_empty());
        assert!(d.handle_line("").is_empty());
        assert!(d.handle_line("   ").is_empty());
        // A valid line right after still decodes.
        assert_eq!(d.handle_line("subscription|unit|rpm|bar").len(), 1);
    }

    #[test]
    fn test_escaped_pipes_stay_inside_fields() {
        let mut d = Dispatcher::default();
        let events = d.handle_line("subscription|value|note|0|10|a\\|b");
        assert_eq!(
            events,
            vec![ClientEvent::TagValueUpdated {
                tag: "note".into(),
                timestamp: ms(0),
                value: TypedValue::String("a|b".into())
            }]
        );
    }

    #[test]
    fn test_download_through_dispatcher() {
        let mut d = Dispatcher::default();
        let id = TransferId::new_v4();
        d.transfers_mut().queue_download(id);

        let events = d.handle_line("file|ok|5");
        assert_eq!(
            events,
            vec![ClientEvent::Download(DownloadUpdate::Started { id, size: 5 })]
        );

        let events = d.handle_content(Bytes::from_static(b"hello world"));
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[1],
            ClientEvent::Download(DownloadUpdate::Complete { surplus, .. })
                if surplus.as_ref() == b" world"
        ));

        let digest = hex::encode(Keccak512::digest(b"hello"));
        let events = d.handle_line(&format!("file|done|{digest}"));
        assert_eq!(
            events,
            vec![ClientEvent::Download(DownloadUpdate::Succeeded { id })]
        );
    }

    #[test]
    fn test_download_hash_mismatch_reason_is_hash() {
        let mut d = Dispatcher::default();
        d.transfers_mut().queue_download(TransferId::new_v4());
        d.handle_line("file|ok|5");
        d.handle_content(Bytes::from_static(b"hello"));

        let wrong = hex::encode(Keccak512::digest(b"other"));
        let events = d.handle_line(&format!("file|done|{wrong}"));
        assert!(matches!(
            events.as_slice(),
            [ClientEvent::Download(DownloadUpdate::Failed {
                reason: FailReason::Hash,
                ..
            })]
        ));
    }

    #[test]
    fn test_file_ok_without_size_fails_the_head_download() {
        let mut d = Dispatcher::default();
        let id = TransferId::new_v4();
        d.transfers_mut().queue_download(id);
        let events = d.handle_line("file|ok");
        assert_eq!(
            events,
            vec![ClientEvent::Download(DownloadUpdate::Failed {
                id,
                reason: FailReason::Unknown,
                message: None
            })]
        );
        assert_eq!(d.transfers().pending_downloads(), 0);
    }

    #[test]
    fn test_file_replies_without_sessions_are_dropped() {
        let mut d = Dispatcher::default();
        assert!(d.handle_line("file|ok|10").is_empty());
        assert!(d.handle_line("file|error|nope").is_empty());
        assert!(d.handle_line("file|done|00").is_empty());
        assert!(d.handle_line("file|upload|ready").is_empty());
        assert!(d.handle_line("file|bogus").is_empty());
    }

    #[test]
    fn test_upload_replies_through_dispatcher() {
        let mut d = Dispatcher::default();
        let source: hublink_transfer::UploadSource =
            Box::new(std::io::Cursor::new(vec![1u8, 2, 3]));
        let id = TransferId::new_v4();
        d.transfers_mut().queue_upload(id, "a.bin".into(), 3, source);

        let events = d.handle_line("file|upload|ready");
        assert_eq!(events, vec![ClientEvent::Upload(UploadUpdate::Ready { id })]);

        let events = d.handle_line("file|upload|error|quota exceeded");
        assert_eq!(
            events,
            vec![ClientEvent::Upload(UploadUpdate::Failed {
                id,
                reason: FailReason::Server,
                message: Some("quota exceeded".into())
            })]
        );
    }

    #[test]
    fn test_disconnect_drains_everything() {
        let mut d = Dispatcher::default();
        d.handle_line("readStart|T|0|100");
        d.transfers_mut().queue_download(TransferId::new_v4());
        let source: hublink_transfer::UploadSource = Box::new(std::io::Cursor::new(vec![0u8]));
        d.transfers_mut().queue_upload(TransferId::new_v4(), "a.bin".into(), 1, source);

        let events = d.handle_disconnect();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| matches!(
            e,
            ClientEvent::Download(DownloadUpdate::Failed {
                reason: FailReason::Unknown,
                ..
            }) | ClientEvent::Upload(UploadUpdate::Failed {
                reason: FailReason::Unknown,
                ..
            })
        )));
        assert_eq!(d.pending_ranges("T"), 0);
    }
}
