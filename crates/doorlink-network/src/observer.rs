//! Connected observer handle.
//!
//! An observer is one consumer of the broadcast stream, typically a
//! browser session behind a web layer. It also issues commands whose
//! replies land on its own stream as `command-feedback` /
//! `command-error` events.
//!
//! Dropping the handle disconnects the observer. Commands it still has in
//! flight resolve or time out normally; their outcome is discarded.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use doorlink_core::{CorrelationId, ModuleId};
use doorlink_protocol::CommandRequest;

use crate::broadcast::ObserverId;
use crate::error::Result;
use crate::events::ObserverEvent;
use crate::session::TransportSession;
use crate::sink::ChannelSink;

pub struct Observer {
    id: ObserverId,
    sink: Arc<ChannelSink>,
    events: mpsc::UnboundedReceiver<ObserverEvent>,
    session: TransportSession,
}

impl Observer {
    pub(crate) fn connect(session: TransportSession) -> Self {
        let (sink, events) = ChannelSink::channel();
        let sink = Arc::new(sink);
        let id = session.broadcaster().add(sink.clone());
        Self {
            id,
            sink,
            events,
            session,
        }
    }

    pub fn id(&self) -> ObserverId {
        self.id
    }

    /// Next event for this observer, `None` once the stream is closed.
    pub async fn recv(&mut self) -> Option<ObserverEvent> {
        self.events.recv().await
    }

    /// Next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<ObserverEvent> {
        self.events.try_recv().ok()
    }

    /// Submit a command; its outcome arrives on this observer's stream.
    pub async fn send_command(&self, request: CommandRequest) -> Result<CorrelationId> {
        self.session.send_command_to(request, self.sink.clone()).await
    }

    /// Submit a `STATUS` query for `module`.
    pub async fn request_status(&self, module: ModuleId) -> Result<CorrelationId> {
        self.send_command(CommandRequest::status(module)).await
    }

    /// Leave the broadcast set.
    pub fn disconnect(self) {
        drop(self);
    }
}

impl Drop for Observer {
    fn drop(&mut self) {
        self.session.broadcaster().remove(self.id);
        debug!(observer = %self.id, "Observer handle dropped");
    }
}
