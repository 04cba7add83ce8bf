//! Application facade for one hub connection.

use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use hublink_codec::TypedValue;
use hublink_protocol::command::{self, ConfigCommand, Operation, Target};
use hublink_protocol::{ClientEvent, Dispatcher};
use hublink_transfer::{TransferId, TransferManager, UploadSource};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};

use crate::config::ClientConfig;
use crate::connection::{Command, Connection};
use crate::events::EventBus;
use crate::transport::TransportLink;

/// The connection's command inbox is gone.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("connection closed")]
    ConnectionClosed,
}

/// Handle applications use to drive one hub connection.
///
/// Cheap to clone; every clone feeds the same connection.
#[derive(Debug, Clone)]
pub struct Client {
    commands: mpsc::UnboundedSender<Command>,
    events: EventBus,
}

impl Client {
    /// Build a client together with its connection driver and transport
    /// link.
    ///
    /// Spawn [`Connection::run`] and wire the [`TransportLink`] to a
    /// transport implementation.
    #[must_use]
    pub fn new(config: ClientConfig) -> (Self, Connection, TransportLink) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        let (transport_tx, transport_rx) = mpsc::unbounded_channel();
        let events = EventBus::new();

        let connection = Connection::new(
            Dispatcher::new(TransferManager::new(config.hash)),
            config,
            commands_rx,
            transport_rx,
            frames_tx,
            events.clone(),
        );
        let link = TransportLink {
            frames: frames_rx,
            events: transport_tx,
        };

        (
            Self {
                commands: commands_tx,
                events,
            },
            connection,
            link,
        )
    }

    /// Subscribe to decoded events.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Stream adapter over a fresh event subscription.
    #[must_use]
    pub fn event_stream(&self) -> BoxStream<'static, ClientEvent> {
        self.events.stream()
    }

    /// Read the current value of a tag.
    ///
    /// # Errors
    /// Fails when the connection is gone.
    pub fn read(&self, tag: &str) -> Result<(), SendError> {
        self.line(command::read_tag(tag))
    }

    /// Read every sample of a tag between two instants.
    ///
    /// The completed range arrives as [`ClientEvent::RangeReadCompleted`].
    ///
    /// # Errors
    /// Fails when the connection is gone.
    pub fn read_range(
        &self,
        tag: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<(), SendError> {
        self.line(command::read_tag_range(tag, from, to))
    }

    /// Ask which time range the hub has persisted for a tag.
    ///
    /// # Errors
    /// Fails when the connection is gone.
    pub fn query_range(&self, tag: &str) -> Result<(), SendError> {
        self.line(command::query_tag_range(tag))
    }

    /// Subscribe to a tag's updates.
    ///
    /// # Errors
    /// Fails when the connection is gone.
    pub fn subscribe(&self, tag: &str) -> Result<(), SendError> {
        self.line(command::subscribe_tag(tag))
    }

    /// Drop every subscription of this connection.
    ///
    /// # Errors
    /// Fails when the connection is gone.
    pub fn unsubscribe_all(&self) -> Result<(), SendError> {
        self.line(command::UNSUBSCRIBE_ALL.to_owned())
    }

    /// Browse every tag the hub exposes.
    ///
    /// # Errors
    /// Fails when the connection is gone.
    pub fn browse(&self) -> Result<(), SendError> {
        self.line(command::BROWSE.to_owned())
    }

    /// Write a timestamped value to a tag.
    ///
    /// # Errors
    /// Fails when the connection is gone.
    pub fn write(
        &self,
        tag: &str,
        timestamp: DateTime<Utc>,
        value: &TypedValue,
    ) -> Result<(), SendError> {
        self.line(command::write_tag(tag, timestamp, value))
    }

    /// Switch this connection to a named session.
    ///
    /// # Errors
    /// Fails when the connection is gone.
    pub fn switch_session(&self, name: &str) -> Result<(), SendError> {
        self.line(command::switch_session(name))
    }

    /// Change the server-side configuration of a tag.
    ///
    /// # Errors
    /// Fails when the connection is gone.
    pub fn configure(
        &self,
        operation: Operation,
        target: Target,
        config_command: ConfigCommand,
        tag: &str,
    ) -> Result<(), SendError> {
        self.line(command::configuration(operation, target, config_command, tag))
    }

    /// Queue a download session without requesting a file yet.
    ///
    /// Only the oldest queued session ever accounts received bytes; the
    /// returned id correlates its progress and terminal events.
    ///
    /// # Errors
    /// Fails when the connection is gone.
    pub fn queue_download(&self) -> Result<TransferId, SendError> {
        let id = TransferId::new_v4();
        self.command(Command::QueueDownload { id })?;
        Ok(id)
    }

    /// Request a file for the oldest queued download session.
    ///
    /// # Errors
    /// Fails when the connection is gone.
    pub fn request_file(&self, filename: &str) -> Result<(), SendError> {
        self.line(command::file_transfer(filename))
    }

    /// Queue a download session and request the file in one step.
    ///
    /// # Errors
    /// Fails when the connection is gone.
    pub fn download(&self, filename: &str) -> Result<TransferId, SendError> {
        let id = self.queue_download()?;
        self.request_file(filename)?;
        Ok(id)
    }

    /// Queue an upload session and announce it to the server.
    ///
    /// Content is pumped from `source` once the server reports ready.
    ///
    /// # Errors
    /// Fails when the connection is gone.
    pub fn upload(
        &self,
        filename: &str,
        size: u64,
        source: UploadSource,
    ) -> Result<TransferId, SendError> {
        let id = TransferId::new_v4();
        self.command(Command::QueueUpload {
            id,
            filename: filename.to_owned(),
            size,
            source,
        })?;
        self.line(command::file_upload(filename, size))?;
        Ok(id)
    }

    fn command(&self, command: Command) -> Result<(), SendError> {
        self.commands
            .send(command)
            .map_err(|_| SendError::ConnectionClosed)
    }

    fn line(&self, line: String) -> Result<(), SendError> {
        self.command(Command::Line(line))
    }
}
