//! Command correlation and status bridge between observers and a door hub.
//!
//! This crate owns the one UDP endpoint that talks to the hub, matches
//! FEEDBACK replies to the commands that caused them, normalizes module
//! statuses and fans the result out to every connected observer.
//!
//! # Components
//!
//! - **TransportSession**: socket, id allocation, receive loop
//! - **CorrelationTable**: in-flight commands with exactly-once outcomes
//! - **ObserverBroadcaster**: observer set and door records
//! - **ConvergencePoller**: waits for a lock to report its new position
//!
//! # Example
//!
//! ```no_run
//! use doorlink_network::{SessionConfig, TransportSession};
//! use doorlink_core::ModuleId;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let session = TransportSession::bind(SessionConfig::default()).await?;
//! let mut observer = session.connect_observer();
//!
//! let outcome = session.lock(ModuleId::new("D1")?).await?;
//! println!("converged: {:?}", outcome.convergence.map(|c| c.converged()));
//!
//! while let Some(event) = observer.recv().await {
//!     println!("{}", event.name());
//! }
//! # Ok(())
//! # }
//! ```

mod broadcast;
mod config;
mod correlation;
mod error;
mod events;
mod observer;
mod poller;
mod session;
mod sink;

pub use broadcast::{ObserverBroadcaster, ObserverId};
pub use config::{ENV_HUB_HOST, ENV_HUB_PORT, PollerConfig, SessionConfig};
pub use correlation::{CorrelationTable, PendingCommand, TIMEOUT_MESSAGE};
pub use error::{Result, SessionError};
pub use events::{CommandErrorKind, CommandReply, DoorInfo, ObserverEvent};
pub use observer::Observer;
pub use poller::{ConvergencePoller, PollOutcome, PollState, StatusProbe};
pub use session::{Actuation, TransportSession};
pub use sink::{ChannelSink, NotificationSink, ReplySink, SinkError};
