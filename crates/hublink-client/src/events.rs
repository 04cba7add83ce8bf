//! Broadcast fan-out of decoded client events.

use futures::StreamExt;
use futures::stream::BoxStream;
use hublink_protocol::ClientEvent;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

const CHANNEL_CAPACITY: usize = 1024;

/// Broadcast bus carrying [`ClientEvent`]s to any number of subscribers.
///
/// Subscribers that fall behind by more than the channel capacity miss
/// the oldest events, as with any broadcast channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ClientEvent>,
}

impl EventBus {
    /// Create a bus with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Subscribe to events emitted from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.sender.subscribe()
    }

    /// Stream adapter over a fresh subscription. Lagged gaps are skipped.
    #[must_use]
    pub fn stream(&self) -> BoxStream<'static, ClientEvent> {
        BroadcastStream::new(self.subscribe())
            .filter_map(|res| async move { res.ok() })
            .boxed()
    }

    /// Emit one event to every subscriber.
    pub fn emit(&self, event: ClientEvent) {
        // A send error only means nobody is listening right now.
        let _ = self.sender.send(event);
    }

    /// Emit a batch of events in order.
    pub fn emit_all<I: IntoIterator<Item = ClientEvent>>(&self, events: I) {
        for event in events {
            self.emit(event);
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
