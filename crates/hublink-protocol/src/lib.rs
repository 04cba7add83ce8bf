//! Command dispatcher, range-read correlation and outgoing commands for
//! the hub protocol.
//!
//! This crate provides:
//! - `Dispatcher` - turns inbound protocol lines into typed client events
//! - `RangeCorrelator` - FIFO correlation of historical range reads
//! - `ClientEvent` - the closed set of events applications observe
//! - `command` - builders for every outgoing command line

pub mod command;
pub mod correlator;
pub mod dispatcher;
pub mod event;

pub use correlator::RangeCorrelator;
pub use dispatcher::Dispatcher;
pub use event::{ClientEvent, RangePoint, RangeRead};
