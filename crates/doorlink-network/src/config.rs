//! Session configuration.
//!
//! The hub address is supplied by whoever starts the bridge. The process
//! reads it from `HUB_HOST` / `HUB_PORT`; tests pass a loopback address
//! directly.
//!
//! ```
//! use doorlink_network::SessionConfig;
//!
//! let config = SessionConfig::from_vars(|key| match key {
//!     "HUB_HOST" => Some("127.0.0.1".to_string()),
//!     "HUB_PORT" => Some("4000".to_string()),
//!     _ => None,
//! })
//! .unwrap();
//! assert_eq!(config.hub_addr.port(), 4000);
//! ```

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, ToSocketAddrs};
use std::time::Duration;

use doorlink_core::constants::{
    DEFAULT_HUB_HOST, DEFAULT_HUB_PORT, POLL_INTERVAL_MS, POLL_MAX_ATTEMPTS, REPLY_TIMEOUT_MS,
};

use crate::error::{Result, SessionError};

/// Environment variable naming the hub host.
pub const ENV_HUB_HOST: &str = "HUB_HOST";

/// Environment variable naming the hub UDP port.
pub const ENV_HUB_PORT: &str = "HUB_PORT";

/// Configuration for a transport session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Hub address commands are sent to
    pub hub_addr: SocketAddr,

    /// Local endpoint; port 0 picks an ephemeral port the hub replies to
    pub bind_addr: SocketAddr,

    /// Reply window for correlated commands
    pub reply_timeout: Duration,

    /// Convergence polling after lock/unlock
    pub poller: PollerConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let host = DEFAULT_HUB_HOST
            .parse::<Ipv4Addr>()
            .unwrap_or(Ipv4Addr::LOCALHOST);
        Self {
            hub_addr: SocketAddr::V4(SocketAddrV4::new(host, DEFAULT_HUB_PORT)),
            bind_addr: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0)),
            reply_timeout: Duration::from_millis(REPLY_TIMEOUT_MS),
            poller: PollerConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Configuration for the given hub with every other setting defaulted.
    pub fn for_hub(hub_addr: SocketAddr) -> Self {
        Self {
            hub_addr,
            ..Self::default()
        }
    }

    /// Read `HUB_HOST` / `HUB_PORT` from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build a configuration from a variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Config`] if the port is not a valid `u16`
    /// or the host does not resolve to any address.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let host = lookup(ENV_HUB_HOST)
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_HUB_HOST.to_string());
        let port = match lookup(ENV_HUB_PORT).filter(|p| !p.trim().is_empty()) {
            Some(p) => p
                .trim()
                .parse::<u16>()
                .map_err(|e| SessionError::Config(format!("{ENV_HUB_PORT}={p:?}: {e}")))?,
            None => DEFAULT_HUB_PORT,
        };

        let hub_addr = (host.trim(), port)
            .to_socket_addrs()
            .map_err(|e| SessionError::Config(format!("{ENV_HUB_HOST}={host:?}: {e}")))?
            .find(SocketAddr::is_ipv4)
            .ok_or_else(|| SessionError::Config(format!("{ENV_HUB_HOST}={host:?}: no IPv4 address")))?;

        Ok(Self::for_hub(hub_addr))
    }
}

/// Configuration for convergence polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    /// Delay between a status query and the check of the door record
    pub interval: Duration,

    /// Status queries issued before giving up
    pub max_attempts: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(POLL_INTERVAL_MS),
            max_attempts: POLL_MAX_ATTEMPTS,
        }
    }
}
