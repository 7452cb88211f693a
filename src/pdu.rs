//! SNMP Protocol Data Units.

use crate::ber::{tag, Decoder, EncodeBuf};
use crate::error::{DecodeErrorKind, Error, ErrorStatus, Result};
use crate::oid::Oid;
use crate::varbind::{decode_varbind_list, encode_varbind_list, VarBind};

/// PDU type tag (context-specific, constructed).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PduType {
    GetRequest = 0xA0,
    GetNextRequest = 0xA1,
    Response = 0xA2,
    SetRequest = 0xA3,
    TrapV1 = 0xA4,
    GetBulkRequest = 0xA5,
    InformRequest = 0xA6,
    TrapV2 = 0xA7,
    Report = 0xA8,
}

impl PduType {
    /// Create from a tag byte.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0xA0 => Some(Self::GetRequest),
            0xA1 => Some(Self::GetNextRequest),
            0xA2 => Some(Self::Response),
            0xA3 => Some(Self::SetRequest),
            0xA4 => Some(Self::TrapV1),
            0xA5 => Some(Self::GetBulkRequest),
            0xA6 => Some(Self::InformRequest),
            0xA7 => Some(Self::TrapV2),
            0xA8 => Some(Self::Report),
            _ => None,
        }
    }

    /// Get the tag byte.
    pub fn tag(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for PduType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::GetRequest => "GetRequest",
            Self::GetNextRequest => "GetNextRequest",
            Self::Response => "Response",
            Self::SetRequest => "SetRequest",
            Self::TrapV1 => "TrapV1",
            Self::GetBulkRequest => "GetBulkRequest",
            Self::InformRequest => "InformRequest",
            Self::TrapV2 => "TrapV2",
            Self::Report => "Report",
        };
        f.write_str(name)
    }
}

/// Generic PDU for request/response operations.
///
/// For GETBULK the error-status and error-index fields are repurposed as
/// non-repeaters and max-repetitions; [`GetBulkPdu`] keeps that mapping
/// out of sight.
#[derive(Debug, Clone)]
pub struct Pdu {
    pub pdu_type: PduType,
    /// Request ID correlating requests and responses.
    pub request_id: i32,
    /// Error status (0 in requests).
    pub error_status: i32,
    /// 1-based index of the varbind the error applies to.
    pub error_index: i32,
    pub varbinds: Vec<VarBind>,
}

impl Pdu {
    /// Create a GET request.
    pub fn get_request(request_id: i32, oids: &[Oid]) -> Self {
        Self {
            pdu_type: PduType::GetRequest,
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds: oids.iter().map(|oid| VarBind::null(oid.clone())).collect(),
        }
    }

    /// Create a GETNEXT request.
    pub fn get_next_request(request_id: i32, oids: &[Oid]) -> Self {
        Self {
            pdu_type: PduType::GetNextRequest,
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds: oids.iter().map(|oid| VarBind::null(oid.clone())).collect(),
        }
    }

    /// Create a SET request.
    pub fn set_request(request_id: i32, varbinds: Vec<VarBind>) -> Self {
        Self {
            pdu_type: PduType::SetRequest,
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds,
        }
    }

    /// Create an SNMPv2 trap (unconfirmed notification).
    pub fn trap_v2(request_id: i32, varbinds: Vec<VarBind>) -> Self {
        Self {
            pdu_type: PduType::TrapV2,
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds,
        }
    }

    /// Create an InformRequest (confirmed notification).
    pub fn inform(request_id: i32, varbinds: Vec<VarBind>) -> Self {
        Self {
            pdu_type: PduType::InformRequest,
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds,
        }
    }

    /// Encode to BER.
    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_constructed(self.pdu_type.tag(), |buf| {
            encode_varbind_list(buf, &self.varbinds);
            buf.push_integer(self.error_index);
            buf.push_integer(self.error_status);
            buf.push_integer(self.request_id);
        });
    }

    /// Decode from BER.
    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let pdu_tag = decoder.read_tag()?;
        let pdu_type = PduType::from_tag(pdu_tag).ok_or_else(|| {
            Error::decode(decoder.offset(), DecodeErrorKind::UnknownPduType(pdu_tag))
        })?;

        let len = decoder.read_length()?;
        let mut pdu = decoder.sub_decoder(len)?;

        let request_id = pdu.read_integer()?;
        let error_status = pdu.read_integer()?;
        let error_index = pdu.read_integer()?;
        let varbinds = decode_varbind_list(&mut pdu)?;

        Ok(Pdu {
            pdu_type,
            request_id,
            error_status,
            error_index,
            varbinds,
        })
    }

    /// Check if this is an error response.
    pub fn is_error(&self) -> bool {
        self.error_status != 0
    }

    /// Get the error status as an enum.
    pub fn error_status_enum(&self) -> ErrorStatus {
        ErrorStatus::from_i32(self.error_status)
    }
}

/// GETBULK request PDU (RFC 3416 Section 4.2.3).
#[derive(Debug, Clone)]
pub struct GetBulkPdu {
    pub request_id: i32,
    /// Leading OIDs that get a single GETNEXT each.
    pub non_repeaters: i32,
    /// Maximum repetitions for the remaining OIDs.
    pub max_repetitions: i32,
    pub varbinds: Vec<VarBind>,
}

impl GetBulkPdu {
    /// Create a GETBULK request.
    pub fn new(request_id: i32, non_repeaters: i32, max_repetitions: i32, oids: &[Oid]) -> Self {
        Self {
            request_id,
            non_repeaters,
            max_repetitions,
            varbinds: oids.iter().map(|oid| VarBind::null(oid.clone())).collect(),
        }
    }

    /// Convert to the generic PDU shape (non-repeaters and
    /// max-repetitions occupy the error fields on the wire).
    pub fn into_pdu(self) -> Pdu {
        Pdu {
            pdu_type: PduType::GetBulkRequest,
            request_id: self.request_id,
            error_status: self.non_repeaters,
            error_index: self.max_repetitions,
            varbinds: self.varbinds,
        }
    }

    /// Encode to BER.
    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_constructed(tag::pdu::GET_BULK_REQUEST, |buf| {
            encode_varbind_list(buf, &self.varbinds);
            buf.push_integer(self.max_repetitions);
            buf.push_integer(self.non_repeaters);
            buf.push_integer(self.request_id);
        });
    }

    /// Decode from BER.
    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let mut pdu = decoder.read_constructed(tag::pdu::GET_BULK_REQUEST)?;

        let request_id = pdu.read_integer()?;
        let non_repeaters = pdu.read_integer()?;
        let max_repetitions = pdu.read_integer()?;
        let varbinds = decode_varbind_list(&mut pdu)?;

        Ok(GetBulkPdu {
            request_id,
            non_repeaters,
            max_repetitions,
            varbinds,
        })
    }
}

/// SNMPv1 Trap PDU (RFC 1157 Section 4.1.6).
///
/// Structurally unlike every other PDU; replaced by TrapV2 in v2c/v3.
#[derive(Debug, Clone)]
pub struct TrapV1Pdu {
    /// sysObjectID of the entity generating the trap.
    pub enterprise: Oid,
    /// IP address of the generating agent.
    pub agent_addr: [u8; 4],
    /// Generic trap type (0..=6).
    pub generic_trap: i32,
    /// Vendor trap code, meaningful when generic_trap is 6.
    pub specific_trap: i32,
    /// sysUpTime at trap generation.
    pub time_stamp: u32,
    pub varbinds: Vec<VarBind>,
}

impl TrapV1Pdu {
    /// Encode to BER.
    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_constructed(tag::pdu::TRAP_V1, |buf| {
            encode_varbind_list(buf, &self.varbinds);
            buf.push_unsigned32(tag::application::TIMETICKS, self.time_stamp);
            buf.push_integer(self.specific_trap);
            buf.push_integer(self.generic_trap);
            buf.push_ip_address(self.agent_addr);
            buf.push_oid(&self.enterprise);
        });
    }

    /// Decode from BER.
    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let mut pdu = decoder.read_constructed(tag::pdu::TRAP_V1)?;

        let enterprise = pdu.read_oid()?;
        let agent_addr = pdu.read_ip_address()?;
        let generic_trap = pdu.read_integer()?;
        let specific_trap = pdu.read_integer()?;
        let time_stamp = pdu.read_unsigned32(tag::application::TIMETICKS)?;
        let varbinds = decode_varbind_list(&mut pdu)?;

        Ok(TrapV1Pdu {
            enterprise,
            agent_addr,
            generic_trap,
            specific_trap,
            time_stamp,
            varbinds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;
    use crate::value::Value;

    #[test]
    fn test_get_request_roundtrip() {
        let pdu = Pdu::get_request(12345, &[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)]);

        let mut buf = EncodeBuf::new();
        pdu.encode(&mut buf);
        let mut decoder = Decoder::new(buf.finish());
        let decoded = Pdu::decode(&mut decoder).unwrap();

        assert_eq!(decoded.pdu_type, PduType::GetRequest);
        assert_eq!(decoded.request_id, 12345);
        assert_eq!(decoded.error_status, 0);
        assert_eq!(decoded.error_index, 0);
        assert_eq!(decoded.varbinds.len(), 1);
        assert_eq!(decoded.varbinds[0].value, Value::Null);
    }

    #[test]
    fn test_pdu_tag_bytes() {
        assert_eq!(PduType::GetRequest.tag(), 0xA0);
        assert_eq!(PduType::GetNextRequest.tag(), 0xA1);
        assert_eq!(PduType::Response.tag(), 0xA2);
        assert_eq!(PduType::SetRequest.tag(), 0xA3);
        assert_eq!(PduType::TrapV1.tag(), 0xA4);
        assert_eq!(PduType::GetBulkRequest.tag(), 0xA5);
        assert_eq!(PduType::InformRequest.tag(), 0xA6);
        assert_eq!(PduType::TrapV2.tag(), 0xA7);
        assert_eq!(PduType::Report.tag(), 0xA8);
    }

    #[test]
    fn test_unknown_pdu_tag_rejected() {
        let mut decoder = Decoder::from_slice(&[0xA9, 0x00]);
        assert!(matches!(
            Pdu::decode(&mut decoder).unwrap_err(),
            Error::Decode {
                kind: DecodeErrorKind::UnknownPduType(0xA9),
                ..
            }
        ));
    }

    #[test]
    fn test_getbulk_roundtrip() {
        let pdu = GetBulkPdu::new(12345, 1, 10, &[oid!(1, 3, 6, 1, 2, 1, 1)]);

        let mut buf = EncodeBuf::new();
        pdu.encode(&mut buf);
        let mut decoder = Decoder::new(buf.finish());
        let decoded = GetBulkPdu::decode(&mut decoder).unwrap();

        assert_eq!(decoded.request_id, 12345);
        assert_eq!(decoded.non_repeaters, 1);
        assert_eq!(decoded.max_repetitions, 10);
    }

    #[test]
    fn test_getbulk_into_pdu_field_mapping() {
        let pdu = GetBulkPdu::new(7, 2, 25, &[oid!(1, 3, 6)]).into_pdu();
        assert_eq!(pdu.pdu_type, PduType::GetBulkRequest);
        assert_eq!(pdu.error_status, 2);
        assert_eq!(pdu.error_index, 25);
    }

    #[test]
    fn test_trap_v1_roundtrip() {
        let trap = TrapV1Pdu {
            enterprise: oid!(1, 3, 6, 1, 4, 1, 9999),
            agent_addr: [192, 168, 1, 1],
            generic_trap: 2, // linkDown
            specific_trap: 0,
            time_stamp: 12345678,
            varbinds: vec![VarBind::new(
                oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 1, 1),
                Value::Integer(1),
            )],
        };

        let mut buf = EncodeBuf::new();
        trap.encode(&mut buf);
        let mut decoder = Decoder::new(buf.finish());
        let decoded = TrapV1Pdu::decode(&mut decoder).unwrap();

        assert_eq!(decoded.enterprise, oid!(1, 3, 6, 1, 4, 1, 9999));
        assert_eq!(decoded.agent_addr, [192, 168, 1, 1]);
        assert_eq!(decoded.generic_trap, 2);
        assert_eq!(decoded.time_stamp, 12345678);
        assert_eq!(decoded.varbinds.len(), 1);
    }

    #[test]
    fn test_error_response() {
        let pdu = Pdu {
            pdu_type: PduType::Response,
            request_id: 1,
            error_status: 2,
            error_index: 1,
            varbinds: vec![],
        };
        assert!(pdu.is_error());
        assert_eq!(pdu.error_status_enum(), ErrorStatus::NoSuchName);
    }
}
