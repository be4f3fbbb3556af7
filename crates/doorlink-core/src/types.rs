use crate::{
    Result,
    constants::{DEFAULT_MODULE, DEFAULT_TARGET, MODULE_PREFIX},
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one addressable door-lock module (e.g. `"D1"`).
///
/// Module ids travel as a single whitespace-free token on the wire, so
/// construction rejects empty strings and embedded whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleId(String);

impl ModuleId {
    /// Create a module id from a wire token.
    ///
    /// # Errors
    /// Returns `Error::InvalidModuleId` if the token is empty or contains whitespace.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() || id.chars().any(char::is_whitespace) {
            return Err(Error::InvalidModuleId(format!("{id:?}")));
        }
        Ok(ModuleId(id))
    }

    /// Accept either `"D2"` or a bare `"2"`, prefixing numeric ids with `D`.
    ///
    /// # Errors
    /// Same as [`ModuleId::new`] after trimming.
    pub fn from_loose(id: &str) -> Result<Self> {
        let id = id.trim();
        if id.starts_with(MODULE_PREFIX) {
            Self::new(id)
        } else {
            Self::new(format!("{MODULE_PREFIX}{id}"))
        }
    }

    /// Get the module id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ModuleId {
    fn default() -> Self {
        ModuleId(DEFAULT_MODULE.to_string())
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for ModuleId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ModuleId::new(s)
    }
}

/// Door target inside a module (`"D0"`, `"D1"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Target(String);

impl Target {
    /// Create a target from a wire token.
    ///
    /// # Errors
    /// Returns `Error::InvalidMessageFormat` if the token is empty or contains whitespace.
    pub fn new(target: impl Into<String>) -> Result<Self> {
        let target = target.into();
        if target.is_empty() || target.chars().any(char::is_whitespace) {
            return Err(Error::InvalidMessageFormat(format!(
                "Invalid target: {target:?}"
            )));
        }
        Ok(Target(target))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Target {
    fn default() -> Self {
        Target(DEFAULT_TARGET.to_string())
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tag linking an outbound COMMAND to its eventual FEEDBACK.
///
/// Allocated by the transport session, strictly increasing from 1 and
/// never reused within the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(u64);

impl CorrelationId {
    /// First id handed out by a fresh session.
    pub const FIRST: CorrelationId = CorrelationId(1);

    #[must_use]
    pub const fn new(id: u64) -> Self {
        CorrelationId(id)
    }

    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for CorrelationId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.parse::<u64>()
            .map(CorrelationId)
            .map_err(|_| Error::InvalidCorrelationId(s.to_string()))
    }
}

/// Normalized door status.
///
/// The only status vocabulary consumed downstream of the normalizer,
/// whatever firmware revision produced the raw text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CanonicalStatus {
    Locked,
    Unlocked,
    Open,
    Unknown,
}

impl CanonicalStatus {
    /// Wire spelling of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Locked => "LOCKED",
            Self::Unlocked => "UNLOCKED",
            Self::Open => "OPEN",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Lock position implied by this status, if any.
    #[must_use]
    pub fn lock_state(&self) -> Option<bool> {
        match self {
            Self::Locked => Some(true),
            Self::Unlocked => Some(false),
            Self::Open | Self::Unknown => None,
        }
    }

    #[must_use]
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl fmt::Display for CanonicalStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last observed state of one physical lock module.
///
/// Both fields are tri-state: `None` means unknown. A fresh record knows
/// nothing; fields change only when a canonical status is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Door {
    pub module_id: ModuleId,
    pub door_open: Option<bool>,
    pub lock_locked: Option<bool>,
}

impl Door {
    #[must_use]
    pub fn new(module_id: ModuleId) -> Self {
        Self {
            module_id,
            door_open: None,
            lock_locked: None,
        }
    }

    /// Fold a canonical status into this record.
    ///
    /// - `Locked`: locked and closed
    /// - `Unlocked`: unlocked and closed
    /// - `Open`: open, lock knowledge kept as is
    /// - `Unknown`: both fields reset
    pub fn apply(&mut self, status: CanonicalStatus) {
        match status {
            CanonicalStatus::Locked => {
                self.lock_locked = Some(true);
                self.door_open = Some(false);
            }
            CanonicalStatus::Unlocked => {
                self.lock_locked = Some(false);
                self.door_open = Some(false);
            }
            CanonicalStatus::Open => {
                self.door_open = Some(true);
            }
            CanonicalStatus::Unknown => {
                self.lock_locked = None;
                self.door_open = None;
            }
        }
    }
}
