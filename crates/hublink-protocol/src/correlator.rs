//! Per-tag FIFO correlation of historical range reads.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use hublink_codec::Scalar;

use crate::event::{RangePoint, RangeRead};

/// Pending range-read sessions, FIFO per tag.
///
/// The server never tags range rows or end markers with a request id;
/// they resolve against the oldest outstanding session for the tag.
/// Overlapping requests for one tag are legal and complete strictly in
/// creation order.
#[derive(Debug, Default)]
pub struct RangeCorrelator {
    pending: HashMap<String, VecDeque<RangeRead>>,
}

impl RangeCorrelator {
    /// Create an empty correlator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a new session to the back of the tag's queue.
    pub fn begin(&mut self, tag: &str, from: DateTime<Utc>, to: DateTime<Utc>) {
        self.pending
            .entry(tag.to_owned())
            .or_default()
            .push_back(RangeRead {
                from,
                to,
                points: Vec::new(),
            });
    }

    /// Number of sessions pending for the tag.
    #[must_use]
    pub fn pending(&self, tag: &str) -> usize {
        self.pending.get(tag).map_or(0, VecDeque::len)
    }

    /// True when the tag has at least one pending session.
    #[must_use]
    pub fn has_pending(&self, tag: &str) -> bool {
        self.pending(tag) > 0
    }

    /// Append a sample to the tag's oldest pending session.
    ///
    /// Returns false when the tag has no pending session.
    pub fn append(&mut self, tag: &str, timestamp: DateTime<Utc>, value: Scalar) -> bool {
        match self.pending.get_mut(tag).and_then(VecDeque::front_mut) {
            Some(session) => {
                session.points.push(RangePoint { timestamp, value });
                true
            }
            None => false,
        }
    }

    /// Pop and return the tag's oldest pending session.
    ///
    /// Drops the tag's queue entry entirely once it drains.
    pub fn finish(&mut self, tag: &str) -> Option<RangeRead> {
        let queue = self.pending.get_mut(tag)?;
        let session = queue.pop_front();
        if queue.is_empty() {
            self.pending.remove(tag);
        }
        session
    }

    /// Drop every pending session, e.g. on disconnect.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap()
    }

    #[test]
    fn test_sessions_finish_in_creation_order() {
        let mut correlator = RangeCorrelator::new();
        correlator.begin("t", ms(0), ms(100));
        correlator.begin("t", ms(100), ms(200));

        assert!(correlator.append("t", ms(50), Scalar::Int32(1)));

        let first = correlator.finish("t").unwrap();
        assert_eq!((first.from, first.to), (ms(0), ms(100)));
        assert_eq!(first.points.len(), 1);

        let second = correlator.finish("t").unwrap();
        assert_eq!((second.from, second.to), (ms(100), ms(200)));
        assert!(second.points.is_empty());

        assert!(!correlator.has_pending("t"));
        assert!(correlator.finish("t").is_none());
    }

    #[test]
    fn test_append_without_session_is_rejected() {
        let mut correlator = RangeCorrelator::new();
        assert!(!correlator.append("t", ms(0), Scalar::Bool(true)));
    }

    #[test]
    fn test_tags_are_independent() {
        let mut correlator = RangeCorrelator::new();
        correlator.begin("a", ms(0), ms(10));
        assert!(correlator.has_pending("a"));
        assert!(!correlator.has_pending("b"));

        correlator.clear();
        assert!(!correlator.has_pending("a"));
    }
}
