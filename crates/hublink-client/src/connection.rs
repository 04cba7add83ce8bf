//! The single-sequence processing loop of one connection.

use bytes::Bytes;
use hublink_protocol::{ClientEvent, Dispatcher, command};
use hublink_transfer::{FailReason, TransferId, UploadSource, UploadStep, UploadUpdate};
use tokio::sync::mpsc;

use crate::config::ClientConfig;
use crate::events::EventBus;
use crate::transport::{Frame, TransportEvent};

/// A request from the client facade.
pub(crate) enum Command {
    /// Send one pre-built command line.
    Line(String),
    /// Queue a download session behind any in flight.
    QueueDownload { id: TransferId },
    /// Queue an upload session behind any in flight.
    QueueUpload {
        id: TransferId,
        filename: String,
        size: u64,
        source: UploadSource,
    },
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Line(line) => f.debug_tuple("Line").field(line).finish(),
            Self::QueueDownload { id } => f.debug_struct("QueueDownload").field("id", id).finish(),
            Self::QueueUpload {
                id,
                filename,
                size,
                ..
            } => f
                .debug_struct("QueueUpload")
                .field("id", id)
                .field("filename", filename)
                .field("size", size)
                .finish_non_exhaustive(),
        }
    }
}

enum Tick {
    Command(Command),
    Transport(Option<TransportEvent>),
    Pump(UploadStep),
}

/// Drives one connection's inbound lines, binary chunks, client commands
/// and the upload pump on a single processing sequence.
///
/// All dispatcher and queue mutation happens here, in strict arrival
/// order; client commands are drained before transport events each tick,
/// and upload chunks are pumped only while both inboxes are idle, so a
/// large upload never blocks line processing.
#[derive(Debug)]
pub struct Connection {
    dispatcher: Dispatcher,
    config: ClientConfig,
    commands: mpsc::UnboundedReceiver<Command>,
    transport: mpsc::UnboundedReceiver<TransportEvent>,
    frames: mpsc::UnboundedSender<Frame>,
    events: EventBus,
    online: bool,
}

impl Connection {
    pub(crate) fn new(
        dispatcher: Dispatcher,
        config: ClientConfig,
        commands: mpsc::UnboundedReceiver<Command>,
        transport: mpsc::UnboundedReceiver<TransportEvent>,
        frames: mpsc::UnboundedSender<Frame>,
        events: EventBus,
    ) -> Self {
        Self {
            dispatcher,
            config,
            commands,
            transport,
            frames,
            events,
            online: true,
        }
    }

    /// Run until the transport event channel closes.
    ///
    /// Closure counts as a disconnect: every queued transfer fails with an
    /// unknown reason and range-read state is dropped.
    pub async fn run(mut self) {
        loop {
            let pumping = self.dispatcher.transfers().upload_in_progress();
            let tick = tokio::select! {
                biased;
                Some(command) = self.commands.recv() => Tick::Command(command),
                event = self.transport.recv() => Tick::Transport(event),
                step = self.dispatcher.transfers_mut().next_upload_chunk(), if pumping => {
                    Tick::Pump(step)
                }
            };

            match tick {
                Tick::Command(command) => self.on_command(command),
                Tick::Transport(Some(event)) => self.on_transport(event),
                Tick::Transport(None) => {
                    if self.online {
                        self.on_disconnect();
                    }
                    break;
                }
                Tick::Pump(step) => self.on_upload_step(step),
            }
        }
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::Line(line) => self.send_line(line),
            Command::QueueDownload { id } => self.dispatcher.transfers_mut().queue_download(id),
            Command::QueueUpload {
                id,
                filename,
                size,
                source,
            } => self
                .dispatcher
                .transfers_mut()
                .queue_upload(id, filename, size, source),
        }
    }

    fn on_transport(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Line(line) => {
                let events = self.dispatcher.handle_line(&line);
                self.events.emit_all(events);
            }
            TransportEvent::Binary(chunk) => {
                let events = self.dispatcher.handle_content(chunk);
                self.events.emit_all(events);
            }
            TransportEvent::Connected => {
                self.online = true;
                if let Some(session) = &self.config.session {
                    self.send_line(command::switch_session(session));
                }
                self.events.emit(ClientEvent::Connected);
            }
            TransportEvent::Disconnected => self.on_disconnect(),
        }
    }

    fn on_upload_step(&mut self, step: UploadStep) {
        match step {
            UploadStep::Chunk {
                id,
                data,
                transferred,
            } => {
                self.send_binary(data);
                self.events
                    .emit(ClientEvent::Upload(UploadUpdate::Progress {
                        id,
                        transferred,
                    }));
            }
            UploadStep::Finished { digest, .. } => {
                self.send_line(command::file_upload_done(&digest));
            }
            UploadStep::Failed { id, error } => {
                self.events.emit(ClientEvent::Upload(UploadUpdate::Failed {
                    id,
                    reason: FailReason::Unknown,
                    message: Some(error.to_string()),
                }));
            }
            UploadStep::Idle => {}
        }
    }

    fn on_disconnect(&mut self) {
        self.online = false;
        let events = self.dispatcher.handle_disconnect();
        self.events.emit_all(events);
        self.events.emit(ClientEvent::Disconnected);
    }

    fn send_line(&self, line: String) {
        if self.frames.send(Frame::Line(line)).is_err() {
            tracing::warn!("dropping outgoing line: transport gone");
        }
    }

    fn send_binary(&self, data: Bytes) {
        if self.frames.send(Frame::Binary(data)).is_err() {
            tracing::warn!("dropping outgoing binary frame: transport gone");
        }
    }
}
