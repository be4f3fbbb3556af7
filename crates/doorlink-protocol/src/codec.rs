//! Tokio codec for hub datagrams.
//!
//! The hub protocol needs no stream framing: one datagram carries one
//! complete message. `HubCodec` therefore treats the whole buffer handed
//! to it as a single line, which is exactly what `tokio_util::udp::UdpFramed`
//! provides per received datagram.
//!
//! # Architecture
//!
//! ```text
//! UDP datagram -> Decoder -> InboundMessage (never fails, demotes to Raw)
//! Outbound     -> Encoder -> "<MODULE> COMMAND <ID> <TARGET> <ACTION>\n"
//! ```
//!
//! # Decode Failures
//!
//! A malformed line is never an error at this layer. Lines that look like
//! a known kind but cannot be decoded (for instance a FEEDBACK with a
//! non-numeric correlation id) are logged and passed on as
//! [`InboundMessage::Raw`], so a single bad datagram cannot stall the
//! receive loop.
//!
//! ```
//! use doorlink_protocol::{InboundMessage, decode_line};
//!
//! let msg = decode_line("D2 FEEDBACK x D0 STATUS_LOCKED");
//! assert!(matches!(msg, InboundMessage::Raw { .. }));
//! ```

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::debug;

use crate::message::{InboundMessage, Outbound};
use doorlink_core::{
    CorrelationId, Error, ModuleId, Result, Target,
    constants::{KIND_EVENT, KIND_FEEDBACK, KIND_HEARTBEAT, KIND_HELLO},
};

/// Decode one hub line into a typed message.
///
/// Tokens are split on runs of whitespace; surrounding whitespace
/// (including the trailing newline) is ignored.
pub fn decode_line(line: &str) -> InboundMessage {
    let raw = line.trim();
    match try_decode(raw) {
        Ok(msg) => msg,
        Err(e) => {
            debug!(error = %e, raw, "Demoting undecodable datagram to RAW");
            InboundMessage::Raw {
                raw: raw.to_string(),
            }
        }
    }
}

/// Decode one datagram payload.
///
/// Payloads that are not valid UTF-8 are demoted to RAW with the bad
/// bytes replaced, so they never reach door state.
pub fn decode_datagram(datagram: &[u8]) -> InboundMessage {
    match std::str::from_utf8(datagram) {
        Ok(text) => decode_line(text),
        Err(e) => {
            let raw = String::from_utf8_lossy(datagram).trim().to_string();
            debug!(error = %e, raw = %raw, "Demoting non-UTF-8 datagram to RAW");
            InboundMessage::Raw { raw }
        }
    }
}

fn try_decode(raw: &str) -> Result<InboundMessage> {
    let tokens: Vec<&str> = raw.split_whitespace().collect();
    if tokens.len() < 2 {
        return Ok(InboundMessage::Raw {
            raw: raw.to_string(),
        });
    }

    let module = ModuleId::new(tokens[0])?;
    let msg = match tokens[1] {
        KIND_FEEDBACK if tokens.len() >= 5 => InboundMessage::Feedback {
            module,
            correlation_id: tokens[2].parse::<CorrelationId>()?,
            target: Target::new(tokens[3])?,
            raw_action: tokens[4..].join(" "),
            raw: raw.to_string(),
        },
        KIND_EVENT if tokens.len() >= 4 => InboundMessage::Event {
            module,
            target: Target::new(tokens[2])?,
            raw_event: tokens[3..].join(" "),
            raw: raw.to_string(),
        },
        KIND_HEARTBEAT => InboundMessage::Heartbeat {
            module,
            raw: raw.to_string(),
        },
        KIND_HELLO => InboundMessage::Hello {
            module,
            raw: raw.to_string(),
        },
        _ => InboundMessage::Raw {
            raw: raw.to_string(),
        },
    };
    Ok(msg)
}

/// Datagram codec for the hub protocol.
#[derive(Debug, Default, Clone, Copy)]
pub struct HubCodec {
    // A frame was handed out since the buffer was last seen empty.
    emitted: bool,
}

impl HubCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for HubCodec {
    type Item = InboundMessage;
    type Error = Error;

    /// Consume the whole buffer as one datagram.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<InboundMessage>> {
        if src.is_empty() {
            return Ok(None);
        }
        let datagram = src.split();
        Ok(Some(decode_datagram(&datagram)))
    }

    /// `UdpFramed` calls this once per received datagram and then again
    /// until it yields `None`. An empty buffer is therefore either an empty
    /// datagram (nothing emitted yet) or the drained remains of the last
    /// one; only the former becomes a RAW message.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<InboundMessage>> {
        if !src.is_empty() {
            self.emitted = true;
            return self.decode(src);
        }
        if std::mem::take(&mut self.emitted) {
            return Ok(None);
        }
        self.emitted = true;
        Ok(Some(InboundMessage::Raw { raw: String::new() }))
    }
}

impl Encoder<Outbound> for HubCodec {
    type Error = Error;

    fn encode(&mut self, item: Outbound, dst: &mut BytesMut) -> Result<()> {
        let line = match item {
            Outbound::Command(cmd) => cmd.to_string(),
            Outbound::Raw(text) => text.trim_end_matches(['\r', '\n']).to_string(),
        };
        dst.reserve(line.len() + 1);
        dst.put_slice(line.as_bytes());
        dst.put_u8(b'\n');
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{CommandRequest, MessageKind};
    use rstest::rstest;

    #[test]
    fn test_encode_command() {
        let cmd = CommandRequest::from_parts(Some("D2"), None, Some("LOCK"))
            .unwrap()
            .into_command(CorrelationId::new(7));
        let mut buf = BytesMut::new();
        HubCodec::new().encode(Outbound::Command(cmd), &mut buf).unwrap();
        assert_eq!(&buf[..], b"D2 COMMAND 7 D0 LOCK\n");
    }

    #[test]
    fn test_encode_raw_single_newline() {
        let mut buf = BytesMut::new();
        HubCodec::new()
            .encode(Outbound::Raw("D1 PING\n".to_string()), &mut buf)
            .unwrap();
        assert_eq!(&buf[..], b"D1 PING\n");
    }

    #[test]
    fn test_decode_feedback() {
        let msg = decode_line("D2 FEEDBACK 7 D0 STATUS_LOCKED\n");
        match msg {
            InboundMessage::Feedback {
                module,
                correlation_id,
                target,
                raw_action,
                raw,
            } => {
                assert_eq!(module.as_str(), "D2");
                assert_eq!(correlation_id, CorrelationId::new(7));
                assert_eq!(target.as_str(), "D0");
                assert_eq!(raw_action, "STATUS_LOCKED");
                assert_eq!(raw, "D2 FEEDBACK 7 D0 STATUS_LOCKED");
            }
            other => panic!("expected feedback, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_feedback_joins_action_tokens() {
        let msg = decode_line("D1  FEEDBACK\t3 D0 CLOSED,   UNLOCKED");
        match msg {
            InboundMessage::Feedback { raw_action, .. } => assert_eq!(raw_action, "CLOSED, UNLOCKED"),
            other => panic!("expected feedback, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_event() {
        match decode_line("D1 EVENT D0 DOOR OPEN") {
            InboundMessage::Event {
                module,
                target,
                raw_event,
                ..
            } => {
                assert_eq!(module.as_str(), "D1");
                assert_eq!(target.as_str(), "D0");
                assert_eq!(raw_event, "DOOR OPEN");
            }
            other => panic!("expected event, got {other:?}"),
        }
    }

    #[rstest]
    #[case("", MessageKind::Raw)]
    #[case("HELLO", MessageKind::Raw)]
    #[case("D1 HELLO", MessageKind::Hello)]
    #[case("D1 HEARTBEAT D0=CLOSED,LOCKED", MessageKind::Heartbeat)]
    #[case("D1 FEEDBACK 1 D0", MessageKind::Raw)]
    #[case("D1 FEEDBACK abc D0 STATUS", MessageKind::Raw)]
    #[case("D1 EVENT D0", MessageKind::Raw)]
    #[case("D1 COMMAND 1 D0 LOCK", MessageKind::Raw)]
    #[case("D1 feedback 1 D0 LOCK", MessageKind::Raw)]
    fn test_decode_kinds(#[case] line: &str, #[case] expected: MessageKind) {
        assert_eq!(decode_line(line).kind(), expected);
    }

    #[test]
    fn test_decoder_consumes_whole_datagram() {
        let mut codec = HubCodec::new();
        let mut buf = BytesMut::from(&b"D4 HELLO\n"[..]);
        let msg = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(msg.kind(), MessageKind::Hello);
        assert!(buf.is_empty());
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_decoder_tolerates_invalid_utf8() {
        let mut codec = HubCodec::new();
        let mut buf = BytesMut::from(&[0xff, 0xfe, b' ', b'x'][..]);
        let msg = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(msg.kind(), MessageKind::Raw);
    }

    #[test]
    fn test_invalid_utf8_demoted_to_raw() {
        let mut buf = BytesMut::from(&b"D2 FEEDBACK 7 D0 STATUS_LOCKED\xff"[..]);
        match HubCodec::new().decode(&mut buf).unwrap() {
            Some(InboundMessage::Raw { raw }) => {
                assert!(raw.starts_with("D2 FEEDBACK 7 D0 STATUS_LOCKED"));
            }
            other => panic!("expected raw, got {other:?}"),
        }
        assert!(buf.is_empty());
    }

    #[test]
    fn test_datagram_sequence_through_decode_eof() {
        let mut codec = HubCodec::new();

        // Empty datagram: one RAW, then drained.
        let mut buf = BytesMut::new();
        assert_eq!(
            codec.decode_eof(&mut buf).unwrap(),
            Some(InboundMessage::Raw { raw: String::new() })
        );
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), None);

        // Regular datagram: one message, then drained.
        buf.extend_from_slice(b"D1 HELLO\n");
        assert_eq!(codec.decode_eof(&mut buf).unwrap().map(|m| m.kind()), Some(MessageKind::Hello));
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), None);

        // Another empty datagram after a regular one.
        assert!(matches!(
            codec.decode_eof(&mut buf).unwrap(),
            Some(InboundMessage::Raw { .. })
        ));
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), None);
    }
}
