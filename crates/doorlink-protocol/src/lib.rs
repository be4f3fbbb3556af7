pub mod codec;
pub mod message;
pub mod normalizer;

pub use codec::{HubCodec, decode_datagram, decode_line};
pub use message::{CommandRequest, InboundMessage, MessageKind, Outbound, OutboundCommand};
pub use normalizer::{
    DoorFields, Normalized, StatusFormat, acknowledged_target, classify, door_fields, normalize,
    normalize_event,
};
