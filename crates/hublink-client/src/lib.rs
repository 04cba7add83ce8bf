//! Connection driver and application facade for the hub protocol.
//!
//! Provides:
//! - `Client` - queue transfers, send commands, observe events
//! - `Connection` - the single-sequence processing loop
//! - `EventBus` - broadcast fan-out of decoded events
//! - Transport boundary types (`Frame`, `TransportEvent`, `TransportLink`)
//!
//! Socket, TLS and WebSocket handling live behind the [`Transport`]
//! boundary and are not part of this crate.

pub mod client;
pub mod config;
pub mod connection;
pub mod events;
pub mod transport;

pub use client::{Client, SendError};
pub use config::ClientConfig;
pub use connection::Connection;
pub use events::EventBus;
pub use hublink_protocol::{ClientEvent, RangePoint, RangeRead};
pub use transport::{Frame, Transport, TransportError, TransportEvent, TransportLink};
