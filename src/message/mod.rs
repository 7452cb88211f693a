//! SNMP message wrappers.
//!
//! Messages encapsulate PDUs with version and security information:
//! [`CommunityMessage`] for v1/v2c, [`V3Message`] for SNMPv3/USM.

mod community;
mod v3;

pub use community::CommunityMessage;
pub use v3::{
    MsgFlags, MsgGlobalData, ScopedPdu, SecurityLevel, SecurityModel, V3Message, V3MessageData,
};

use crate::ber::Decoder;
use crate::error::{DecodeErrorKind, Error, Result};
use crate::pdu::Pdu;
use crate::version::Version;
use bytes::Bytes;

/// Decoded SNMP message of any version.
#[derive(Debug)]
pub enum Message {
    /// SNMPv1 or SNMPv2c message with community string
    Community(CommunityMessage),
    /// SNMPv3 message with USM security
    V3(V3Message),
}

impl Message {
    /// Try to get a reference to the PDU.
    ///
    /// Returns `None` for V3 messages whose payload is still encrypted.
    pub fn try_pdu(&self) -> Option<&Pdu> {
        match self {
            Message::Community(m) => Some(&m.pdu),
            Message::V3(m) => m.pdu(),
        }
    }

    /// Try to consume and return the PDU.
    ///
    /// Returns `None` for V3 messages whose payload is still encrypted.
    pub fn try_into_pdu(self) -> Option<Pdu> {
        match self {
            Message::Community(m) => Some(m.into_pdu()),
            Message::V3(m) => m.into_pdu(),
        }
    }

    /// Get the SNMP version.
    pub fn version(&self) -> Version {
        match self {
            Message::Community(m) => m.version,
            Message::V3(_) => Version::V3,
        }
    }

    /// Decode a message, dispatching on the version field.
    pub fn decode(data: Bytes) -> Result<Self> {
        let mut decoder = Decoder::new(data);
        let mut seq = decoder.read_sequence()?;

        let version_num = seq.read_integer()?;
        let version = Version::from_i32(version_num).ok_or_else(|| {
            Error::decode(seq.offset(), DecodeErrorKind::UnknownVersion(version_num))
        })?;

        match version {
            Version::V1 | Version::V2c => {
                let msg = CommunityMessage::decode_from_sequence(&mut seq, version)?;
                Ok(Message::Community(msg))
            }
            Version::V3 => {
                let msg = V3Message::decode_from_sequence(&mut seq)?;
                Ok(Message::V3(msg))
            }
        }
    }
}

impl From<CommunityMessage> for Message {
    fn from(msg: CommunityMessage) -> Self {
        Message::Community(msg)
    }
}

impl From<V3Message> for Message {
    fn from(msg: V3Message) -> Self {
        Message::V3(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;

    #[test]
    fn test_decode_dispatches_on_version() {
        let pdu = Pdu::get_request(1, &[oid!(1, 3, 6, 1)]);
        let v2c = CommunityMessage::v2c(b"public".as_ref(), pdu).encode();
        assert!(matches!(
            Message::decode(v2c).unwrap(),
            Message::Community(_)
        ));

        let discovery = V3Message::discovery_request(42).encode();
        assert!(matches!(Message::decode(discovery).unwrap(), Message::V3(_)));
    }

    #[test]
    fn test_decode_rejects_unknown_version() {
        use crate::ber::EncodeBuf;

        let mut buf = EncodeBuf::new();
        buf.push_sequence(|buf| {
            buf.push_integer(2); // never assigned
        });
        let err = Message::decode(buf.finish()).unwrap_err();
        assert!(matches!(
            err,
            Error::Decode {
                kind: DecodeErrorKind::UnknownVersion(2),
                ..
            }
        ));
    }
}
