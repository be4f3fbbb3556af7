use doorlink_core::{
    CorrelationId, Error, ModuleId, Result, Target,
    constants::{ACTION_STATUS, DEFAULT_ACTION, KIND_COMMAND},
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Command payload before a correlation id has been assigned.
///
/// Absent or empty parts fall back to the protocol defaults: module
/// `D1`, target `D0`, action `STATUS`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub module: ModuleId,
    pub target: Target,
    pub action: String,
}

impl CommandRequest {
    pub fn new(module: ModuleId, target: Target, action: impl Into<String>) -> Result<Self> {
        let action = action.into();
        let action = action.trim();
        if action.chars().any(char::is_whitespace) {
            return Err(Error::InvalidMessageFormat(format!(
                "Action must be a single token: {action:?}"
            )));
        }
        let action = if action.is_empty() {
            DEFAULT_ACTION.to_string()
        } else {
            action.to_string()
        };
        Ok(Self {
            module,
            target,
            action,
        })
    }

    /// Build a request from loosely supplied parts, applying defaults.
    pub fn from_parts(module: Option<&str>, target: Option<&str>, action: Option<&str>) -> Result<Self> {
        let module = match module.map(str::trim).filter(|m| !m.is_empty()) {
            Some(m) => ModuleId::new(m)?,
            None => ModuleId::default(),
        };
        let target = match target.map(str::trim).filter(|t| !t.is_empty()) {
            Some(t) => Target::new(t)?,
            None => Target::default(),
        };
        Self::new(module, target, action.unwrap_or(DEFAULT_ACTION))
    }

    /// `STATUS` query against the default target of `module`.
    pub fn status(module: ModuleId) -> Self {
        Self {
            module,
            target: Target::default(),
            action: ACTION_STATUS.to_string(),
        }
    }

    /// Attach a correlation id, producing the wire command.
    pub fn into_command(self, correlation_id: CorrelationId) -> OutboundCommand {
        OutboundCommand {
            module: self.module,
            correlation_id,
            target: self.target,
            action: self.action,
        }
    }
}

/// Fully addressed command ready for encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundCommand {
    pub module: ModuleId,
    pub correlation_id: CorrelationId,
    pub target: Target,
    pub action: String,
}

impl fmt::Display for OutboundCommand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} {KIND_COMMAND} {} {} {}",
            self.module, self.correlation_id, self.target, self.action
        )
    }
}

/// Anything the session can put on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Command(OutboundCommand),
    /// Caller-supplied text, sent as is with a trailing newline.
    Raw(String),
}

/// Decoded hub datagram.
///
/// Every variant that came from a recognizable line also keeps the
/// trimmed original text for diagnostic passthrough.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InboundMessage {
    Feedback {
        module: ModuleId,
        correlation_id: CorrelationId,
        target: Target,
        raw_action: String,
        raw: String,
    },
    Event {
        module: ModuleId,
        target: Target,
        raw_event: String,
        raw: String,
    },
    Heartbeat {
        module: ModuleId,
        raw: String,
    },
    Hello {
        module: ModuleId,
        raw: String,
    },
    Raw {
        raw: String,
    },
}

/// Message type enum for pattern matching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Feedback,
    Event,
    Heartbeat,
    Hello,
    Raw,
}

impl InboundMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Feedback { .. } => MessageKind::Feedback,
            Self::Event { .. } => MessageKind::Event,
            Self::Heartbeat { .. } => MessageKind::Heartbeat,
            Self::Hello { .. } => MessageKind::Hello,
            Self::Raw { .. } => MessageKind::Raw,
        }
    }

    /// Originating module, when the line named one.
    pub fn module(&self) -> Option<&ModuleId> {
        match self {
            Self::Feedback { module, .. }
            | Self::Event { module, .. }
            | Self::Heartbeat { module, .. }
            | Self::Hello { module, .. } => Some(module),
            Self::Raw { .. } => None,
        }
    }

    pub fn raw(&self) -> &str {
        match self {
            Self::Feedback { raw, .. }
            | Self::Event { raw, .. }
            | Self::Heartbeat { raw, .. }
            | Self::Hello { raw, .. }
            | Self::Raw { raw } => raw,
        }
    }
}
