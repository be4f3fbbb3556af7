//! Transport session: the one datagram endpoint between observers and the hub.
//!
//! The session owns the UDP socket, the correlation id counter and the
//! correlation table. Outbound commands are serialized through a single
//! send lock so ids reach the wire in allocation order; inbound datagrams
//! are decoded by a receive task that resolves pending commands and
//! publishes normalized state to every observer.
//!
//! # Architecture
//!
//! ```text
//! Observer ─► send_command ─► [id, register, encode] ─► UdpSocket ─► Hub
//!                                    │
//!                             CorrelationTable ◄── resolve ──┐
//!                                                            │
//! Hub ─► UdpFramed<HubCodec> ─► receive task ─► normalize ───┤
//!                                                            ▼
//!                                             ObserverBroadcaster ─► all observers
//! ```
//!
//! # Example Usage
//!
//! ```no_run
//! use doorlink_network::{SessionConfig, TransportSession};
//! use doorlink_protocol::CommandRequest;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let session = TransportSession::bind(SessionConfig::from_env()?).await?;
//!
//! let request = CommandRequest::from_parts(Some("D2"), None, Some("STATUS"))?;
//! let reply = session.send_command(request).await?;
//! println!("{} is {}", reply.module, reply.status);
//!
//! session.shutdown();
//! # Ok(())
//! # }
//! ```
//!
//! # Ordering
//!
//! Datagrams may be lost or arrive out of order. A reply either finds its
//! pending entry or it does not; in both cases its normalized status is
//! broadcast, since observers other than the requester may care.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bytes::BytesMut;
use futures::StreamExt;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio_util::codec::Encoder;
use tokio_util::udp::UdpFramed;
use tracing::{debug, error, info, trace, warn};

use doorlink_core::constants::{
    ACTION_LOCK, ACTION_UNLOCK, MAX_DATAGRAM_SIZE, MODULE_OFFLINE_TIMEOUT_MS,
};
use doorlink_core::{CorrelationId, Door, ModuleId, Target};
use doorlink_protocol::{
    CommandRequest, HubCodec, InboundMessage, Outbound, StatusFormat, acknowledged_target,
    classify, door_fields, normalize_event,
};

use crate::broadcast::ObserverBroadcaster;
use crate::config::SessionConfig;
use crate::correlation::CorrelationTable;
use crate::error::{Result, SessionError};
use crate::events::{CommandReply, DoorInfo, ObserverEvent};
use crate::observer::Observer;
use crate::poller::{ConvergencePoller, PollOutcome, StatusProbe};
use crate::sink::{NotificationSink, ReplySink};

/// Outbound half: everything that must be serialized per send.
struct Sender {
    next_id: u64,
    codec: HubCodec,
    buf: BytesMut,
}

impl Sender {
    fn allocate(&mut self) -> CorrelationId {
        let id = CorrelationId::new(self.next_id);
        self.next_id += 1;
        id
    }

    async fn send(&mut self, socket: &UdpSocket, item: Outbound, to: SocketAddr) -> Result<()> {
        self.buf.clear();
        self.codec.encode(item, &mut self.buf)?;
        socket.send_to(&self.buf, to).await?;
        Ok(())
    }
}

struct Inner {
    socket: Arc<UdpSocket>,
    hub_addr: SocketAddr,
    local_addr: SocketAddr,
    reply_timeout: Duration,
    poller: ConvergencePoller,
    sender: tokio::sync::Mutex<Sender>,
    table: CorrelationTable,
    broadcaster: ObserverBroadcaster,
    receiver: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(task) = self.receiver.get_mut().unwrap_or_else(PoisonError::into_inner).take() {
            debug!("TransportSession dropped - stopping receive task");
            task.abort();
        }
    }
}

/// Outcome of a lock or unlock request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actuation {
    pub reply: CommandReply,
    /// Present when the module acknowledged with a bare `LOCK`/`UNLOCK`
    pub convergence: Option<PollOutcome>,
}

/// Bridge between observers and one hub.
///
/// Cloning yields another handle to the same session.
#[derive(Clone)]
pub struct TransportSession {
    inner: Arc<Inner>,
}

impl TransportSession {
    /// Bind the datagram endpoint and start receiving.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Transport`] if the local socket cannot be bound.
    pub async fn bind(config: SessionConfig) -> Result<Self> {
        let socket = Arc::new(UdpSocket::bind(config.bind_addr).await?);
        let local_addr = socket.local_addr()?;
        info!("UDP socket listening {local_addr}, forwarding commands to {}", config.hub_addr);

        let table = CorrelationTable::new();
        let broadcaster = ObserverBroadcaster::new();
        let frames = UdpFramed::new(Arc::clone(&socket), HubCodec::new());
        let task = tokio::spawn(receive_loop(frames, table.clone(), broadcaster.clone()));

        Ok(Self {
            inner: Arc::new(Inner {
                socket,
                hub_addr: config.hub_addr,
                local_addr,
                reply_timeout: config.reply_timeout,
                poller: ConvergencePoller::new(config.poller),
                sender: tokio::sync::Mutex::new(Sender {
                    next_id: CorrelationId::FIRST.as_u64(),
                    codec: HubCodec::new(),
                    buf: BytesMut::with_capacity(MAX_DATAGRAM_SIZE),
                }),
                table,
                broadcaster,
                receiver: Mutex::new(Some(task)),
            }),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr
    }

    pub fn hub_addr(&self) -> SocketAddr {
        self.inner.hub_addr
    }

    pub fn broadcaster(&self) -> &ObserverBroadcaster {
        &self.inner.broadcaster
    }

    pub fn correlation_table(&self) -> &CorrelationTable {
        &self.inner.table
    }

    /// Last known state of `module`.
    pub fn door(&self, module: &ModuleId) -> Door {
        self.inner.broadcaster.door(module)
    }

    /// Whether `module` sent a HEARTBEAT or HELLO recently.
    pub fn is_online(&self, module: &ModuleId) -> bool {
        self.inner
            .broadcaster
            .is_online(module, Duration::from_millis(MODULE_OFFLINE_TIMEOUT_MS))
    }

    /// Connect a new observer to the broadcast set.
    pub fn connect_observer(&self) -> Observer {
        Observer::connect(self.clone())
    }

    /// Send a command and wait for its reply or timeout.
    pub async fn send_command(&self, request: CommandRequest) -> Result<CommandReply> {
        let (sink, rx) = ReplySink::channel();
        self.dispatch(request, Some(Arc::new(sink))).await?;
        rx.await.map_err(|_| SessionError::SessionClosed)?
    }

    /// Send a command whose outcome is delivered to `requester`.
    ///
    /// The requester receives exactly one `command-feedback` or
    /// `command-error` event for the returned id.
    pub async fn send_command_to(
        &self,
        request: CommandRequest,
        requester: Arc<dyn NotificationSink>,
    ) -> Result<CorrelationId> {
        self.dispatch(request, Some(requester)).await
    }

    /// Send a command without tracking its reply.
    pub async fn send_untracked(&self, request: CommandRequest) -> Result<CorrelationId> {
        self.dispatch(request, None).await
    }

    /// `STATUS` query against target `D0` of `module`.
    pub async fn request_status(&self, module: ModuleId) -> Result<CommandReply> {
        self.send_command(CommandRequest::status(module)).await
    }

    /// Transmit `text` to the hub as is. Only transport errors are reported.
    pub async fn send_raw(&self, text: &str) -> Result<()> {
        let mut sender = self.inner.sender.lock().await;
        sender
            .send(&self.inner.socket, Outbound::Raw(text.to_string()), self.inner.hub_addr)
            .await
            .inspect_err(|e| error!(error = %e, "UDP raw send error"))
    }

    /// Query status and report the door as the legacy UI expects it.
    ///
    /// Both positions are read from the reply text itself, so a legacy
    /// `OPEN,LOCKED` reports an open door with an engaged lock. Resolves to
    /// `None` on timeout or transport failure.
    pub async fn door_info(&self, module: ModuleId) -> Option<DoorInfo> {
        match self.request_status(module).await {
            Ok(reply) => {
                let fields = door_fields(&reply.raw_action);
                Some(DoorInfo {
                    module_id: reply.module,
                    target: reply.target,
                    status: reply.raw_action,
                    door_open: fields.door_open,
                    lock_locked: fields.lock_locked,
                })
            }
            Err(e) => {
                debug!(error = %e, "Door info unavailable");
                None
            }
        }
    }

    /// Lock `module` and wait for the lock to be reported.
    pub async fn lock(&self, module: ModuleId) -> Result<Actuation> {
        self.actuate(module, ACTION_LOCK).await
    }

    /// Unlock `module` and wait for the release to be reported.
    pub async fn unlock(&self, module: ModuleId) -> Result<Actuation> {
        self.actuate(module, ACTION_UNLOCK).await
    }

    async fn actuate(&self, module: ModuleId, action: &str) -> Result<Actuation> {
        let request = CommandRequest::new(module, Target::default(), action)?;
        let reply = self.send_command(request).await?;

        let convergence = match acknowledged_target(&reply.raw_action) {
            Some(expected) => Some(self.inner.poller.run(self, &reply.module, expected).await),
            None => None,
        };
        Ok(Actuation { reply, convergence })
    }

    async fn dispatch(
        &self,
        request: CommandRequest,
        requester: Option<Arc<dyn NotificationSink>>,
    ) -> Result<CorrelationId> {
        let mut sender = self.inner.sender.lock().await;
        let command = request.into_command(sender.allocate());
        let id = command.correlation_id;

        // Registered before sending so a fast reply always finds its entry.
        let tracked = requester.is_some();
        if let Some(requester) = requester {
            self.inner
                .table
                .register(&command, requester, self.inner.reply_timeout)?;
        }

        let line = command.to_string();
        match sender
            .send(&self.inner.socket, Outbound::Command(command), self.inner.hub_addr)
            .await
        {
            Ok(()) => {
                debug!(correlation_id = %id, tracked, "Sent COMMAND to {} -> {line}", self.inner.hub_addr);
                Ok(id)
            }
            Err(e) => {
                error!(correlation_id = %id, error = %e, "UDP send error");
                self.inner.table.fail(id, e.to_string());
                Err(e)
            }
        }
    }

    /// Stop the receive task. Idempotent.
    ///
    /// Pending commands still time out normally.
    pub fn shutdown(&self) {
        let task = self
            .inner
            .receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            info!("Stopping transport session on {}", self.inner.local_addr);
            task.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner
            .receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

impl StatusProbe for TransportSession {
    async fn query_status(&self, module: &ModuleId) -> Result<()> {
        self.send_untracked(CommandRequest::status(module.clone()))
            .await
            .map(|_| ())
    }

    fn lock_state(&self, module: &ModuleId) -> Option<bool> {
        self.door(module).lock_locked
    }
}

async fn receive_loop(
    mut frames: UdpFramed<HubCodec, Arc<UdpSocket>>,
    table: CorrelationTable,
    broadcaster: ObserverBroadcaster,
) {
    while let Some(frame) = frames.next().await {
        match frame {
            Ok((message, from)) => {
                trace!("UDP rx from {from} -> {}", message.raw());
                handle_inbound(&table, &broadcaster, message);
            }
            Err(e) => warn!(error = %e, "UDP socket error"),
        }
    }
    debug!("Receive loop ended");
}

/// Route one decoded datagram.
pub(crate) fn handle_inbound(
    table: &CorrelationTable,
    broadcaster: &ObserverBroadcaster,
    message: InboundMessage,
) {
    match message {
        InboundMessage::Feedback {
            module,
            correlation_id,
            target,
            raw_action,
            raw,
        } => {
            let normalized = classify(&raw_action);
            debug!(%module, %correlation_id, %target, action = %raw_action, status = %normalized.status, "FEEDBACK");
            if normalized.format == StatusFormat::Unrecognized {
                debug!(%module, action = %raw_action, "Unrecognized status format, passing through");
            }
            if normalized.updates_door() {
                broadcaster.apply_status(&module, normalized.status);
            }

            let feedback = ObserverEvent::CommandFeedback {
                module: module.clone(),
                correlation_id,
                target: target.clone(),
                status: normalized.status,
                raw_action: raw_action.clone(),
                raw,
            };
            table.resolve(correlation_id, feedback.clone());

            broadcaster.publish(&ObserverEvent::DoorFeedback {
                module,
                target,
                status: normalized.status,
                raw_action,
            });
            broadcaster.publish(&feedback);
        }
        InboundMessage::Event {
            module,
            target,
            raw_event,
            raw,
        } => {
            let normalized = normalize_event(&raw_event);
            debug!(%module, %target, event = %raw_event, status = %normalized.status, "EVENT");
            if normalized.updates_door() {
                broadcaster.apply_status(&module, normalized.status);
            }
            broadcaster.publish(&ObserverEvent::HubEvent {
                module,
                target,
                event: raw_event,
                status: normalized.status,
                raw,
            });
        }
        InboundMessage::Heartbeat { module, raw } => {
            broadcaster.mark_seen(&module);
            broadcaster.publish(&ObserverEvent::HubHeartbeat { module, raw });
        }
        InboundMessage::Hello { module, raw } => {
            info!(%module, "Module said HELLO");
            broadcaster.mark_seen(&module);
            broadcaster.publish(&ObserverEvent::HubHello { module, raw });
        }
        InboundMessage::Raw { raw } => {
            broadcaster.publish(&ObserverEvent::HubRaw { raw });
        }
    }
}
