//! Community-based SNMP message format (v1/v2c).
//!
//! V1 and V2c share the structure
//! `SEQUENCE { version INTEGER, community OCTET STRING, pdu PDU }`
//! and differ only in the version number.

use crate::ber::{Decoder, EncodeBuf};
use crate::error::{DecodeErrorKind, Error, Result};
use crate::pdu::{GetBulkPdu, Pdu, TrapV1Pdu};
use crate::version::Version;
use bytes::Bytes;

/// Community-based SNMP message (v1/v2c).
#[derive(Debug, Clone)]
pub struct CommunityMessage {
    /// SNMP version (V1 or V2c)
    pub version: Version,
    /// Community string
    pub community: Bytes,
    /// Protocol data unit
    pub pdu: Pdu,
}

impl CommunityMessage {
    /// Create a new community message.
    ///
    /// # Panics
    /// Panics if version is V3 (use `V3Message` instead).
    pub fn new(version: Version, community: impl Into<Bytes>, pdu: Pdu) -> Self {
        assert!(
            matches!(version, Version::V1 | Version::V2c),
            "CommunityMessage only supports V1/V2c, not {:?}",
            version
        );
        Self {
            version,
            community: community.into(),
            pdu,
        }
    }

    /// Create a V1 message.
    pub fn v1(community: impl Into<Bytes>, pdu: Pdu) -> Self {
        Self::new(Version::V1, community, pdu)
    }

    /// Create a V2c message.
    pub fn v2c(community: impl Into<Bytes>, pdu: Pdu) -> Self {
        Self::new(Version::V2c, community, pdu)
    }

    /// Encode to BER.
    pub fn encode(&self) -> Bytes {
        let mut buf = EncodeBuf::new();
        buf.push_sequence(|buf| {
            self.pdu.encode(buf);
            buf.push_octet_string(&self.community);
            buf.push_integer(self.version.as_i32());
        });
        buf.finish()
    }

    /// Decode from BER.
    pub fn decode(data: Bytes) -> Result<Self> {
        let mut decoder = Decoder::new(data);
        let mut seq = decoder.read_sequence()?;

        let version_num = seq.read_integer()?;
        let version = Version::from_i32(version_num).ok_or_else(|| {
            Error::decode(seq.offset(), DecodeErrorKind::UnknownVersion(version_num))
        })?;

        Self::decode_from_sequence(&mut seq, version)
    }

    /// Decode from a sequence decoder whose version has been consumed.
    pub(crate) fn decode_from_sequence(seq: &mut Decoder, version: Version) -> Result<Self> {
        if version == Version::V3 {
            return Err(Error::decode(
                seq.offset(),
                DecodeErrorKind::UnknownVersion(3),
            ));
        }

        let community = seq.read_octet_string()?;
        let pdu = Pdu::decode(seq)?;

        Ok(CommunityMessage {
            version,
            community,
            pdu,
        })
    }

    /// Consume and return the PDU.
    pub fn into_pdu(self) -> Pdu {
        self.pdu
    }

    /// Encode a GETBULK request message (v2c only; GETBULK does not
    /// exist in SNMPv1).
    pub fn encode_bulk(version: Version, community: impl Into<Bytes>, pdu: &GetBulkPdu) -> Bytes {
        debug_assert!(version != Version::V1, "GETBULK not supported in SNMPv1");

        let community = community.into();
        let mut buf = EncodeBuf::new();
        buf.push_sequence(|buf| {
            pdu.encode(buf);
            buf.push_octet_string(&community);
            buf.push_integer(version.as_i32());
        });
        buf.finish()
    }

    /// Encode an SNMPv1 trap message.
    pub fn encode_trap_v1(community: impl Into<Bytes>, pdu: &TrapV1Pdu) -> Bytes {
        let community = community.into();
        let mut buf = EncodeBuf::new();
        buf.push_sequence(|buf| {
            pdu.encode(buf);
            buf.push_octet_string(&community);
            buf.push_integer(Version::V1.as_i32());
        });
        buf.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;

    #[test]
    fn test_v1_roundtrip() {
        let pdu = Pdu::get_request(42, &[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)]);
        let msg = CommunityMessage::v1(b"public".as_ref(), pdu);

        let decoded = CommunityMessage::decode(msg.encode()).unwrap();
        assert_eq!(decoded.version, Version::V1);
        assert_eq!(decoded.community.as_ref(), b"public");
        assert_eq!(decoded.pdu.request_id, 42);
    }

    #[test]
    fn test_v2c_roundtrip() {
        let pdu = Pdu::get_request(123, &[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)]);
        let msg = CommunityMessage::v2c(b"private".as_ref(), pdu);

        let decoded = CommunityMessage::decode(msg.encode()).unwrap();
        assert_eq!(decoded.version, Version::V2c);
        assert_eq!(decoded.community.as_ref(), b"private");
        assert_eq!(decoded.pdu.request_id, 123);
    }

    #[test]
    fn test_known_wire_bytes() {
        // v2c GET of 1.3.6.1 with request_id 1, community "public"
        let pdu = Pdu::get_request(1, &[oid!(1, 3, 6, 1)]);
        let encoded = CommunityMessage::v2c(b"public".as_ref(), pdu).encode();
        let expected: &[u8] = &[
            0x30, 0x21, // SEQUENCE
            0x02, 0x01, 0x01, // version 1 (v2c)
            0x04, 0x06, b'p', b'u', b'b', b'l', b'i', b'c', // community
            0xA0, 0x14, // GetRequest
            0x02, 0x01, 0x01, // request-id
            0x02, 0x01, 0x00, // error-status
            0x02, 0x01, 0x00, // error-index
            0x30, 0x09, // varbind list
            0x30, 0x07, // varbind
            0x06, 0x03, 0x2B, 0x06, 0x01, // OID 1.3.6.1
            0x05, 0x00, // NULL
        ];
        assert_eq!(&encoded[..], expected);
    }
}
