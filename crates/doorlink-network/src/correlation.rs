//! Correlation table for in-flight commands.
//!
//! Every correlated command gets one [`PendingCommand`] entry keyed by its
//! correlation id, plus a deadline timer. Exactly one terminal outcome is
//! delivered per entry: whichever of [`CorrelationTable::resolve`] and the
//! deadline removes the entry first delivers, the other finds nothing and
//! does nothing.
//!
//! # Architecture
//!
//! ```text
//! register(id) ──► HashMap<CorrelationId, PendingCommand> ◄── resolve(id)
//!      │                         ▲
//!      └── timer task ── sleep_until(deadline) ── expire(id)
//! ```
//!
//! Removal happens under the table lock; delivery happens after the lock
//! is released so a sink can never re-enter the table while it is held.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use doorlink_core::{CorrelationId, ModuleId, Target};
use doorlink_protocol::OutboundCommand;

use crate::error::{Result, SessionError};
use crate::events::{CommandErrorKind, ObserverEvent};
use crate::sink::NotificationSink;

/// Error text delivered when the reply window closes.
pub const TIMEOUT_MESSAGE: &str = "No FEEDBACK from hub";

/// One command awaiting a hub reply.
pub struct PendingCommand {
    pub correlation_id: CorrelationId,
    pub module: ModuleId,
    pub target: Target,
    pub action: String,
    pub deadline: Instant,
    requester: Arc<dyn NotificationSink>,
    timer: AbortHandle,
}

impl std::fmt::Debug for PendingCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingCommand")
            .field("correlation_id", &self.correlation_id)
            .field("module", &self.module)
            .field("target", &self.target)
            .field("action", &self.action)
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

/// Table of in-flight commands keyed by correlation id.
///
/// Cloning yields another handle to the same table.
#[derive(Clone, Default)]
pub struct CorrelationTable {
    entries: Arc<Mutex<HashMap<CorrelationId, PendingCommand>>>,
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CorrelationId, PendingCommand>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Track `command` until a reply arrives or `timeout` elapses.
    ///
    /// Must be called from within a Tokio runtime: the deadline runs as a
    /// spawned task.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::DuplicateCorrelationId`] if the id is already
    /// pending. The existing entry is left untouched.
    pub fn register(
        &self,
        command: &OutboundCommand,
        requester: Arc<dyn NotificationSink>,
        timeout: Duration,
    ) -> Result<()> {
        let id = command.correlation_id;
        let mut entries = self.lock();
        if entries.contains_key(&id) {
            error!(correlation_id = %id, "Correlation id registered twice");
            return Err(SessionError::DuplicateCorrelationId(id));
        }

        let deadline = Instant::now() + timeout;
        let table = self.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            table.expire(id);
        })
        .abort_handle();

        entries.insert(
            id,
            PendingCommand {
                correlation_id: id,
                module: command.module.clone(),
                target: command.target.clone(),
                action: command.action.clone(),
                deadline,
                requester,
                timer,
            },
        );
        debug!(correlation_id = %id, module = %command.module, pending = entries.len(), "Registered pending command");
        Ok(())
    }

    fn take(&self, id: CorrelationId) -> Option<PendingCommand> {
        self.lock().remove(&id)
    }

    /// Deliver `outcome` to the requester of `id`, if still pending.
    ///
    /// Returns `false` when the id was unknown, already resolved, or
    /// already expired. The table is not modified in that case.
    pub fn resolve(&self, id: CorrelationId, outcome: ObserverEvent) -> bool {
        let Some(pending) = self.take(id) else {
            debug!(correlation_id = %id, "No pending entry for reply");
            return false;
        };
        pending.timer.abort();
        deliver(&pending, outcome);
        true
    }

    /// Deliver a timeout error for `id`, if still pending.
    pub fn expire(&self, id: CorrelationId) -> bool {
        let Some(pending) = self.take(id) else {
            return false;
        };
        warn!(correlation_id = %id, module = %pending.module, "Timed out waiting for FEEDBACK");
        let outcome = ObserverEvent::CommandError {
            module: pending.module.clone(),
            correlation_id: id,
            kind: CommandErrorKind::Timeout,
            error: TIMEOUT_MESSAGE.to_string(),
        };
        deliver(&pending, outcome);
        true
    }

    /// Deliver a transport failure for `id`, if still pending.
    pub fn fail(&self, id: CorrelationId, message: impl Into<String>) -> bool {
        let Some(pending) = self.take(id) else {
            return false;
        };
        pending.timer.abort();
        let outcome = ObserverEvent::CommandError {
            module: pending.module.clone(),
            correlation_id: id,
            kind: CommandErrorKind::Transport,
            error: message.into(),
        };
        deliver(&pending, outcome);
        true
    }

    pub fn contains(&self, id: CorrelationId) -> bool {
        self.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Ids currently awaiting a reply, in ascending order.
    pub fn pending_ids(&self) -> Vec<CorrelationId> {
        let mut ids: Vec<_> = self.lock().keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

// A requester that went away is not an error for the table.
fn deliver(pending: &PendingCommand, outcome: ObserverEvent) {
    if let Err(e) = pending.requester.deliver(outcome) {
        debug!(correlation_id = %pending.correlation_id, error = %e, "Requester did not take outcome");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::ChannelSink;
    use doorlink_core::CanonicalStatus;
    use doorlink_protocol::CommandRequest;
    use tokio::sync::mpsc::UnboundedReceiver;

    const WINDOW: Duration = Duration::from_millis(5000);

    fn command(module: &str, id: u64, action: &str) -> OutboundCommand {
        CommandRequest::from_parts(Some(module), None, Some(action))
            .unwrap()
            .into_command(CorrelationId::new(id))
    }

    fn feedback(id: u64) -> ObserverEvent {
        ObserverEvent::CommandFeedback {
            module: ModuleId::new("D2").unwrap(),
            correlation_id: CorrelationId::new(id),
            target: Target::default(),
            status: CanonicalStatus::Locked,
            raw_action: "STATUS_LOCKED".into(),
            raw: format!("D2 FEEDBACK {id} D0 STATUS_LOCKED"),
        }
    }

    fn drain(rx: &mut UnboundedReceiver<ObserverEvent>) -> Vec<ObserverEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_delivers_once() {
        let table = CorrelationTable::new();
        let (sink, mut rx) = ChannelSink::channel();
        table.register(&command("D2", 7, "STATUS"), Arc::new(sink), WINDOW).unwrap();
        assert!(table.contains(CorrelationId::new(7)));

        assert!(table.resolve(CorrelationId::new(7), feedback(7)));
        assert!(!table.resolve(CorrelationId::new(7), feedback(7)));
        assert!(table.is_empty());

        // Deadline passing afterwards must not produce a second outcome.
        tokio::time::sleep(WINDOW * 2).await;
        assert_eq!(drain(&mut rx), vec![feedback(7)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_then_late_reply() {
        let table = CorrelationTable::new();
        let (sink, mut rx) = ChannelSink::channel();
        table.register(&command("D2", 7, "LOCK"), Arc::new(sink), WINDOW).unwrap();

        tokio::time::sleep(WINDOW + Duration::from_millis(1)).await;
        assert!(!table.contains(CorrelationId::new(7)));
        assert!(!table.resolve(CorrelationId::new(7), feedback(7)));

        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        match &events[0] {
            ObserverEvent::CommandError {
                module,
                correlation_id,
                kind,
                ..
            } => {
                assert_eq!(module.as_str(), "D2");
                assert_eq!(*correlation_id, CorrelationId::new(7));
                assert_eq!(*kind, CommandErrorKind::Timeout);
            }
            other => panic!("expected command-error, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_survives_until_deadline() {
        let table = CorrelationTable::new();
        let (sink, _rx) = ChannelSink::channel();
        table.register(&command("D1", 1, "STATUS"), Arc::new(sink), WINDOW).unwrap();

        tokio::time::sleep(WINDOW - Duration::from_millis(1)).await;
        assert!(table.contains(CorrelationId::new(1)));
    }

    #[tokio::test]
    async fn test_duplicate_registration_rejected() {
        let table = CorrelationTable::new();
        let (first, mut first_rx) = ChannelSink::channel();
        let (second, _second_rx) = ChannelSink::channel();
        table.register(&command("D1", 3, "STATUS"), Arc::new(first), WINDOW).unwrap();

        let err = table
            .register(&command("D1", 3, "STATUS"), Arc::new(second), WINDOW)
            .unwrap_err();
        assert!(matches!(err, SessionError::DuplicateCorrelationId(id) if id == CorrelationId::new(3)));

        // Original requester still owns the entry.
        assert!(table.resolve(CorrelationId::new(3), feedback(3)));
        assert_eq!(drain(&mut first_rx).len(), 1);
    }

    #[tokio::test]
    async fn test_fail_reports_transport_error() {
        let table = CorrelationTable::new();
        let (sink, mut rx) = ChannelSink::channel();
        table.register(&command("D4", 9, "UNLOCK"), Arc::new(sink), WINDOW).unwrap();

        assert!(table.fail(CorrelationId::new(9), "network unreachable"));
        assert!(!table.expire(CorrelationId::new(9)));

        let events = drain(&mut rx);
        assert!(matches!(
            &events[..],
            [ObserverEvent::CommandError { kind: CommandErrorKind::Transport, .. }]
        ));
    }

    #[tokio::test]
    async fn test_gone_requester_is_noop() {
        let table = CorrelationTable::new();
        let (sink, rx) = ChannelSink::channel();
        table.register(&command("D1", 5, "STATUS"), Arc::new(sink), WINDOW).unwrap();
        drop(rx);

        assert!(table.resolve(CorrelationId::new(5), feedback(5)));
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_pending_ids_sorted() {
        let table = CorrelationTable::new();
        for id in [4, 1, 3] {
            let (sink, _rx) = ChannelSink::channel();
            table.register(&command("D1", id, "STATUS"), Arc::new(sink), WINDOW).unwrap();
        }
        assert_eq!(
            table.pending_ids(),
            vec![CorrelationId::new(1), CorrelationId::new(3), CorrelationId::new(4)]
        );
    }
}
