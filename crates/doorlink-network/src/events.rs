//! Observer-facing events.
//!
//! Events serialize with a `type` tag carrying the names web clients
//! listen for (`door-feedback`, `hub-event`, ...), so a web layer can
//! forward them as JSON unchanged.

use doorlink_core::{CanonicalStatus, CorrelationId, ModuleId, Target};
use serde::{Deserialize, Serialize};

/// Why a correlated command failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommandErrorKind {
    /// No FEEDBACK within the reply window.
    Timeout,
    /// The datagram never left the host.
    Transport,
}

/// Event delivered to observers and to command requesters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ObserverEvent {
    /// Normalized status reported by a module, broadcast to everyone.
    #[serde(rename_all = "camelCase")]
    DoorFeedback {
        module: ModuleId,
        target: Target,
        status: CanonicalStatus,
        raw_action: String,
    },

    /// Reply to one correlated command.
    #[serde(rename_all = "camelCase")]
    CommandFeedback {
        module: ModuleId,
        correlation_id: CorrelationId,
        target: Target,
        status: CanonicalStatus,
        raw_action: String,
        raw: String,
    },

    /// Free-text event reported by a module.
    #[serde(rename_all = "camelCase")]
    HubEvent {
        module: ModuleId,
        target: Target,
        event: String,
        status: CanonicalStatus,
        raw: String,
    },

    HubHeartbeat {
        module: ModuleId,
        raw: String,
    },

    HubHello {
        module: ModuleId,
        raw: String,
    },

    /// Anything the decoder could not classify.
    HubRaw {
        raw: String,
    },

    /// Terminal failure of one correlated command.
    #[serde(rename_all = "camelCase")]
    CommandError {
        module: ModuleId,
        correlation_id: CorrelationId,
        kind: CommandErrorKind,
        error: String,
    },
}

impl ObserverEvent {
    /// Event name as seen by web clients.
    pub fn name(&self) -> &'static str {
        match self {
            Self::DoorFeedback { .. } => "door-feedback",
            Self::CommandFeedback { .. } => "command-feedback",
            Self::HubEvent { .. } => "hub-event",
            Self::HubHeartbeat { .. } => "hub-heartbeat",
            Self::HubHello { .. } => "hub-hello",
            Self::HubRaw { .. } => "hub-raw",
            Self::CommandError { .. } => "command-error",
        }
    }
}

/// Successful reply to a correlated command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandReply {
    pub module: ModuleId,
    pub correlation_id: CorrelationId,
    pub target: Target,
    pub status: CanonicalStatus,
    pub raw_action: String,
}

/// Door snapshot returned by the legacy door-info query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoorInfo {
    pub module_id: ModuleId,
    pub target: Target,
    pub status: String,
    pub door_open: Option<bool>,
    pub lock_locked: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_door_feedback_json_shape() {
        let event = ObserverEvent::DoorFeedback {
            module: ModuleId::new("D2").unwrap(),
            target: Target::default(),
            status: CanonicalStatus::Locked,
            raw_action: "STATUS_LOCKED".to_string(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "door-feedback");
        assert_eq!(value["module"], "D2");
        assert_eq!(value["target"], "D0");
        assert_eq!(value["status"], "LOCKED");
        assert_eq!(value["rawAction"], "STATUS_LOCKED");
    }

    #[test]
    fn test_command_error_json_shape() {
        let event = ObserverEvent::CommandError {
            module: ModuleId::new("D2").unwrap(),
            correlation_id: CorrelationId::new(7),
            kind: CommandErrorKind::Timeout,
            error: "No FEEDBACK from hub".to_string(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], event.name());
        assert_eq!(value["correlationId"], 7);
        assert_eq!(value["kind"], "timeout");
    }

    #[test]
    fn test_hub_event_keeps_event_text() {
        let event = ObserverEvent::HubEvent {
            module: ModuleId::new("D1").unwrap(),
            target: Target::default(),
            event: "DOOR OPEN".to_string(),
            status: CanonicalStatus::Open,
            raw: "D1 EVENT D0 DOOR OPEN".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "hub-event");
        assert_eq!(value["event"], "DOOR OPEN");
        assert_eq!(value["raw"], "D1 EVENT D0 DOOR OPEN");

        let back: ObserverEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
