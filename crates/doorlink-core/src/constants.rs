//! Core constants for the door hub datagram protocol.
//!
//! The hub speaks a line-oriented text protocol over UDP. Every datagram
//! carries exactly one newline-terminated message whose tokens are
//! separated by whitespace:
//!
//! ```text
//! <MODULE> COMMAND <CORRELATION_ID> <TARGET> <ACTION>     (bridge -> hub)
//! <MODULE> FEEDBACK <CORRELATION_ID> <TARGET> <ACTION...> (hub -> bridge)
//! <MODULE> EVENT <TARGET> <EVENT...>                      (hub -> bridge)
//! <MODULE> HEARTBEAT ...                                  (hub -> bridge)
//! <MODULE> HELLO ...                                      (hub -> bridge)
//! ```
//!
//! # Usage
//!
//! ```
//! use doorlink_core::constants::*;
//! use std::time::Duration;
//!
//! assert_eq!(KIND_COMMAND, "COMMAND");
//! let window = Duration::from_millis(REPLY_TIMEOUT_MS);
//! assert_eq!(window.as_secs(), 5);
//! ```

// ============================================================================
// Message Kinds
// ============================================================================

/// Outbound command issued by the bridge.
pub const KIND_COMMAND: &str = "COMMAND";

/// Reply to a correlated command.
pub const KIND_FEEDBACK: &str = "FEEDBACK";

/// Unsolicited state change reported by a module.
pub const KIND_EVENT: &str = "EVENT";

/// Periodic liveness message from a module.
pub const KIND_HEARTBEAT: &str = "HEARTBEAT";

/// Module announcement after boot.
pub const KIND_HELLO: &str = "HELLO";

// ============================================================================
// Command Defaults
// ============================================================================

/// Module addressed when a command omits one.
pub const DEFAULT_MODULE: &str = "D1";

/// Door target addressed when a command omits one.
pub const DEFAULT_TARGET: &str = "D0";

/// Action sent when a command omits one.
pub const DEFAULT_ACTION: &str = "STATUS";

/// Prefix prepended to bare numeric module ids (`"2"` becomes `"D2"`).
pub const MODULE_PREFIX: char = 'D';

// ============================================================================
// Actions
// ============================================================================

/// Status query action.
pub const ACTION_STATUS: &str = "STATUS";

/// Lock actuation action.
pub const ACTION_LOCK: &str = "LOCK";

/// Unlock actuation action.
pub const ACTION_UNLOCK: &str = "UNLOCK";

/// Prefix of resolved status replies (`STATUS_LOCKED`, `STATUS_OPEN`, ...).
pub const STATUS_PREFIX: &str = "STATUS_";

// ============================================================================
// Status Tokens
// ============================================================================

/// Lock engaged.
pub const TOKEN_LOCKED: &str = "LOCKED";

/// Lock released.
pub const TOKEN_UNLOCKED: &str = "UNLOCKED";

/// Door leaf open.
pub const TOKEN_OPEN: &str = "OPEN";

/// Door leaf closed.
pub const TOKEN_CLOSED: &str = "CLOSED";

// ============================================================================
// Timing
// ============================================================================

/// Window in which a FEEDBACK must arrive for a correlated command.
///
/// Applied uniformly to every command type. Expiry delivers a timeout
/// error to the requester; the bridge never retries on its own.
pub const REPLY_TIMEOUT_MS: u64 = 5000;

/// Delay between status queries while waiting for a lock to converge.
pub const POLL_INTERVAL_MS: u64 = 500;

/// Status queries issued before convergence polling gives up.
pub const POLL_MAX_ATTEMPTS: u32 = 20;

/// A module with no HEARTBEAT or HELLO for this long is reported offline.
pub const MODULE_OFFLINE_TIMEOUT_MS: u64 = 10_000;

// ============================================================================
// Network
// ============================================================================

/// Hub host used when `HUB_HOST` is not set.
pub const DEFAULT_HUB_HOST: &str = "192.168.8.108";

/// Hub UDP port used when `HUB_PORT` is not set.
pub const DEFAULT_HUB_PORT: u16 = 12345;

/// Initial capacity of the outbound datagram buffer.
pub const MAX_DATAGRAM_SIZE: usize = 2048;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polling_budget_covers_ten_seconds() {
        assert_eq!(POLL_INTERVAL_MS * u64::from(POLL_MAX_ATTEMPTS), 10_000);
    }

    #[test]
    fn test_status_prefix_matches_query_action() {
        assert!(STATUS_PREFIX.starts_with(ACTION_STATUS));
    }
}
