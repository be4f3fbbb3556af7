//! Delivery endpoints for observer events.
//!
//! [`NotificationSink`] is the one capability both real observer
//! connections and one-shot reply adapters provide. The correlation table
//! and the broadcaster only ever talk to sinks.

use std::sync::{Mutex, PoisonError};

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::error::SessionError;
use crate::events::{CommandErrorKind, CommandReply, ObserverEvent};

/// Errors returned by a sink that could not take an event.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SinkError {
    /// The receiving side is gone.
    #[error("Observer disconnected")]
    Disconnected,

    /// A one-shot sink already delivered its result.
    #[error("Reply already delivered")]
    AlreadyDelivered,

    /// A one-shot sink was handed an event it does not carry.
    #[error("Unexpected {0} event for reply sink")]
    Unexpected(&'static str),
}

/// Anything that can receive observer events.
pub trait NotificationSink: Send + Sync {
    fn deliver(&self, event: ObserverEvent) -> Result<(), SinkError>;
}

/// Sink backed by an observer connection's event channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ObserverEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiving end of its channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ObserverEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelSink {
    fn deliver(&self, event: ObserverEvent) -> Result<(), SinkError> {
        self.tx.send(event).map_err(|_| SinkError::Disconnected)
    }
}

/// One-shot adapter turning a terminal event into a command result.
///
/// Accepts exactly one `command-feedback` or `command-error` event.
#[derive(Debug)]
pub struct ReplySink {
    tx: Mutex<Option<oneshot::Sender<Result<CommandReply, SessionError>>>>,
}

impl ReplySink {
    pub fn channel() -> (Self, oneshot::Receiver<Result<CommandReply, SessionError>>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                tx: Mutex::new(Some(tx)),
            },
            rx,
        )
    }
}

impl NotificationSink for ReplySink {
    fn deliver(&self, event: ObserverEvent) -> Result<(), SinkError> {
        let result = match event {
            ObserverEvent::CommandFeedback {
                module,
                correlation_id,
                target,
                status,
                raw_action,
                ..
            } => Ok(CommandReply {
                module,
                correlation_id,
                target,
                status,
                raw_action,
            }),
            ObserverEvent::CommandError {
                module,
                correlation_id,
                kind: CommandErrorKind::Timeout,
                ..
            } => Err(SessionError::Timeout {
                module,
                correlation_id,
            }),
            ObserverEvent::CommandError {
                module,
                correlation_id,
                kind: CommandErrorKind::Transport,
                error,
            } => Err(SessionError::SendFailed {
                module,
                correlation_id,
                message: error,
            }),
            other => return Err(SinkError::Unexpected(other.name())),
        };

        let tx = self
            .tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(SinkError::AlreadyDelivered)?;
        tx.send(result).map_err(|_| SinkError::Disconnected)
    }
}
