//! Status normalization across module firmware revisions.
//!
//! Door modules in the field report their state in three encodings:
//!
//! | Encoding        | Example              | Meaning                                   |
//! |-----------------|----------------------|-------------------------------------------|
//! | prefixed        | `STATUS_LOCKED`      | resolved state                            |
//! | bare echo       | `STATUS`             | query echoed back, state not resolved     |
//! | legacy pair     | `CLOSED,UNLOCKED`    | door and lock position in any order       |
//!
//! [`classify`] maps any of these to a [`CanonicalStatus`] and reports which
//! encoding it recognized. The function is total: unrecognized text yields
//! `Unknown` instead of an error.
//!
//! ```
//! use doorlink_core::CanonicalStatus;
//! use doorlink_protocol::normalize;
//!
//! assert_eq!(normalize("status_locked"), CanonicalStatus::Locked);
//! assert_eq!(normalize("CLOSED,UNLOCKED"), CanonicalStatus::Unlocked);
//! assert_eq!(normalize("STATUS"), CanonicalStatus::Unknown);
//! ```

use doorlink_core::{
    CanonicalStatus,
    constants::{
        ACTION_LOCK, ACTION_STATUS, ACTION_UNLOCK, STATUS_PREFIX, TOKEN_CLOSED, TOKEN_LOCKED,
        TOKEN_OPEN, TOKEN_UNLOCKED,
    },
};
use serde::{Deserialize, Serialize};

/// Encoding the normalizer recognized in a raw status string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatusFormat {
    /// `STATUS_<STATE>`
    Prefixed,
    /// Bare `STATUS` echoed without a resolved state.
    BareEcho,
    /// Free text scanned for door/lock tokens (legacy replies and events).
    TokenScan,
    /// Nothing recognizable; kept only for diagnostics.
    Unrecognized,
}

/// Result of normalizing one raw status string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Normalized {
    pub status: CanonicalStatus,
    pub format: StatusFormat,
}

impl Normalized {
    /// Whether this result carries door state worth folding into a record.
    ///
    /// Prefixed replies always do, `STATUS_UNKNOWN` included. A token scan
    /// does only when it found a canonical state. Bare echoes and
    /// unrecognized text never do.
    pub fn updates_door(&self) -> bool {
        match self.format {
            StatusFormat::Prefixed => true,
            StatusFormat::TokenScan => self.status.is_known(),
            StatusFormat::BareEcho | StatusFormat::Unrecognized => false,
        }
    }
}

/// Map a raw FEEDBACK action to its canonical status.
pub fn normalize(raw_action: &str) -> CanonicalStatus {
    classify(raw_action).status
}

/// Map a raw FEEDBACK action to its canonical status and source encoding.
pub fn classify(raw_action: &str) -> Normalized {
    let upper = raw_action.trim().to_uppercase();

    if let Some(suffix) = upper.strip_prefix(STATUS_PREFIX) {
        let status = match suffix {
            TOKEN_LOCKED => CanonicalStatus::Locked,
            TOKEN_UNLOCKED => CanonicalStatus::Unlocked,
            TOKEN_OPEN => CanonicalStatus::Open,
            _ => CanonicalStatus::Unknown,
        };
        return Normalized {
            status,
            format: StatusFormat::Prefixed,
        };
    }

    if upper == ACTION_STATUS {
        return Normalized {
            status: CanonicalStatus::Unknown,
            format: StatusFormat::BareEcho,
        };
    }

    if upper.contains(TOKEN_OPEN) || upper.contains(TOKEN_CLOSED) {
        return Normalized {
            status: scan_tokens(&upper),
            format: StatusFormat::TokenScan,
        };
    }

    Normalized {
        status: CanonicalStatus::Unknown,
        format: StatusFormat::Unrecognized,
    }
}

/// Normalize free-text EVENT payloads such as `DOOR OPEN` or `LOCK LOCKED`.
pub fn normalize_event(raw_event: &str) -> Normalized {
    let status = scan_tokens(&raw_event.trim().to_uppercase());
    Normalized {
        status,
        format: if status.is_known() {
            StatusFormat::TokenScan
        } else {
            StatusFormat::Unrecognized
        },
    }
}

/// Lock state a command acknowledgement is expected to converge to.
///
/// Only the bare `LOCK`/`UNLOCK` echo counts: the module accepted the
/// actuation but has not reported the resulting state yet.
pub fn acknowledged_target(raw_action: &str) -> Option<CanonicalStatus> {
    match raw_action.trim() {
        ACTION_LOCK => Some(CanonicalStatus::Locked),
        ACTION_UNLOCK => Some(CanonicalStatus::Unlocked),
        _ => None,
    }
}

/// Door and lock positions read independently from one reply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoorFields {
    pub door_open: Option<bool>,
    pub lock_locked: Option<bool>,
}

/// Read both positions from a raw reply without collapsing them.
///
/// Unlike [`classify`], `OPEN,LOCKED` reports an open door *and* an
/// engaged lock. `STATUS_CLOSED` and `CLOSED` report a closed door.
/// Anything else leaves both positions unknown.
pub fn door_fields(raw_action: &str) -> DoorFields {
    let upper = raw_action.trim().to_uppercase();
    let mut fields = DoorFields::default();
    let mut read = |token: &str| match token {
        TOKEN_OPEN => fields.door_open = Some(true),
        TOKEN_CLOSED => fields.door_open = Some(false),
        TOKEN_LOCKED => fields.lock_locked = Some(true),
        TOKEN_UNLOCKED => fields.lock_locked = Some(false),
        _ => {}
    };

    if let Some(suffix) = upper.strip_prefix(STATUS_PREFIX) {
        read(suffix);
    } else if upper.contains(TOKEN_OPEN) || upper.contains(TOKEN_CLOSED) {
        upper
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
            .for_each(read);
    }
    fields
}

// Lock position wins over door position. CLOSED alone has no canonical
// counterpart and stays Unknown.
fn scan_tokens(upper: &str) -> CanonicalStatus {
    let mut lock_state = None;
    let mut door_state = None;
    for token in upper
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
    {
        match token {
            TOKEN_LOCKED => lock_state = Some(CanonicalStatus::Locked),
            TOKEN_UNLOCKED => lock_state = Some(CanonicalStatus::Unlocked),
            TOKEN_OPEN => door_state = Some(CanonicalStatus::Open),
            TOKEN_CLOSED => door_state = Some(CanonicalStatus::Unknown),
            _ => {}
        }
    }
    lock_state.or(door_state).unwrap_or(CanonicalStatus::Unknown)
}
