//! Convergence polling after lock actuation.
//!
//! A `LOCK`/`UNLOCK` acknowledgement only says the module accepted the
//! command. The poller then re-queries status until the door record shows
//! the expected lock position or the attempt budget runs out.
//!
//! # States
//!
//! - `Polling`: queries still being issued
//! - `Converged`: the door record reached the expected lock position
//! - `Exhausted`: budget spent, last known state left as is
//!
//! Exhaustion is a soft outcome, not an error. There is no backoff.

use std::future::Future;

use serde::Serialize;
use tracing::{debug, info, warn};

use doorlink_core::{CanonicalStatus, ModuleId};

use crate::config::PollerConfig;
use crate::error::Result;

/// What the poller needs from a session.
pub trait StatusProbe {
    /// Issue one status query for `module`. The reply arrives through the
    /// normal broadcast path, not through this call.
    fn query_status(&self, module: &ModuleId) -> impl Future<Output = Result<()>> + Send;

    /// Current lock position of `module`'s door record.
    fn lock_state(&self, module: &ModuleId) -> Option<bool>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PollState {
    Polling,
    Converged,
    Exhausted,
}

/// Terminal result of one polling run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollOutcome {
    pub module: ModuleId,
    pub expected: CanonicalStatus,
    pub state: PollState,
    /// Status queries issued
    pub attempts: u32,
}

impl PollOutcome {
    pub fn converged(&self) -> bool {
        self.state == PollState::Converged
    }
}

/// Re-queries status until a module reports the expected lock position.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConvergencePoller {
    config: PollerConfig,
}

impl ConvergencePoller {
    pub fn new(config: PollerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> PollerConfig {
        self.config
    }

    /// Poll `module` until its lock matches `expected`.
    ///
    /// `expected` must be `Locked` or `Unlocked`; any other status has no
    /// lock position to wait for and ends immediately as `Exhausted`.
    pub async fn run<P: StatusProbe>(
        &self,
        probe: &P,
        module: &ModuleId,
        expected: CanonicalStatus,
    ) -> PollOutcome {
        let mut outcome = PollOutcome {
            module: module.clone(),
            expected,
            state: PollState::Polling,
            attempts: 0,
        };

        let Some(want) = expected.lock_state() else {
            warn!(%module, %expected, "No lock position to converge to");
            outcome.state = PollState::Exhausted;
            return outcome;
        };

        while outcome.state == PollState::Polling {
            if let Err(e) = probe.query_status(module).await {
                warn!(%module, error = %e, "Status query failed during polling");
            }
            outcome.attempts += 1;

            tokio::time::sleep(self.config.interval).await;

            if probe.lock_state(module) == Some(want) {
                info!(%module, %expected, attempts = outcome.attempts, "Lock state converged");
                outcome.state = PollState::Converged;
            } else if outcome.attempts >= self.config.max_attempts {
                info!(%module, %expected, attempts = outcome.attempts, "Gave up waiting for lock state");
                outcome.state = PollState::Exhausted;
            } else {
                debug!(%module, attempt = outcome.attempts, "Lock state not reached yet");
            }
        }

        outcome
    }
}
