//! SNMP value types.
//!
//! [`Value`] covers the SMIv1/SMIv2 type set, the SNMPv2 exception
//! markers, and the Opaque-wrapped float/double extension used by
//! net-snmp agents for sensor data.

use crate::ber::{tag, Decoder, EncodeBuf};
use crate::error::{DecodeErrorKind, Error, Result};
use crate::oid::Oid;
use bytes::Bytes;

/// SNMP value.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Value {
    /// BOOLEAN (ASN.1 primitive; rare on the wire but legal in Opaque use)
    Boolean(bool),

    /// INTEGER. Carried as i64 internally; encoded minimally.
    Integer(i64),

    /// BIT STRING, kept as raw content bytes (first byte is the
    /// unused-bit count per X.690).
    BitString(Bytes),

    /// OCTET STRING (arbitrary bytes).
    OctetString(Bytes),

    /// NULL, the value of every varbind in a request.
    Null,

    /// OBJECT IDENTIFIER
    ObjectIdentifier(Oid),

    /// IpAddress (4 bytes, network order)
    IpAddress([u8; 4]),

    /// Counter32 (unsigned 32-bit, wrapping)
    Counter32(u32),

    /// Gauge32 / Unsigned32 (unsigned 32-bit, non-wrapping)
    Gauge32(u32),

    /// TimeTicks (hundredths of seconds)
    TimeTicks(u32),

    /// Opaque: arbitrary bytes without an embedded float/double marker
    Opaque(Bytes),

    /// Counter64 (unsigned 64-bit, wrapping; SNMPv2c/v3 only)
    Counter64(u64),

    /// Uinteger32 (RFC 1442 UInteger32, application tag 7)
    Uinteger32(u32),

    /// Opaque-wrapped IEEE 754 single float
    OpaqueFloat(f32),

    /// Opaque-wrapped IEEE 754 double float
    OpaqueDouble(f64),

    /// noSuchObject exception: the OID is not implemented by the agent.
    NoSuchObject,

    /// noSuchInstance exception: the object exists but this instance
    /// does not.
    NoSuchInstance,

    /// endOfMibView exception: nothing lexicographically follows the
    /// requested OID. Normal walk termination.
    EndOfMibView,

    /// Unrecognized tag, preserved for forward compatibility.
    Unknown { tag: u8, data: Bytes },
}

impl Value {
    /// Try to get as i64 (Integer only).
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as u32 (Counter32, Gauge32, TimeTicks, Uinteger32, or a
    /// non-negative in-range Integer).
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::Counter32(v) | Value::Gauge32(v) | Value::TimeTicks(v) | Value::Uinteger32(v) => {
                Some(*v)
            }
            Value::Integer(v) => u32::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Try to get as u64 (Counter64, any unsigned 32-bit type, or a
    /// non-negative Integer).
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Counter64(v) => Some(*v),
            Value::Counter32(v) | Value::Gauge32(v) | Value::TimeTicks(v) | Value::Uinteger32(v) => {
                Some(*v as u64)
            }
            Value::Integer(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Try to get as f64 (OpaqueFloat or OpaqueDouble).
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::OpaqueFloat(v) => Some(*v as f64),
            Value::OpaqueDouble(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as bytes (OctetString, Opaque, or BitString).
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::OctetString(v) | Value::Opaque(v) | Value::BitString(v) => Some(v),
            _ => None,
        }
    }

    /// Try to get as UTF-8 string (OctetString or Opaque).
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::OctetString(v) | Value::Opaque(v) => std::str::from_utf8(v).ok(),
            _ => None,
        }
    }

    /// Try to get as OID.
    pub fn as_oid(&self) -> Option<&Oid> {
        match self {
            Value::ObjectIdentifier(oid) => Some(oid),
            _ => None,
        }
    }

    /// Try to get as IPv4 address.
    pub fn as_ip(&self) -> Option<std::net::Ipv4Addr> {
        match self {
            Value::IpAddress(bytes) => Some(std::net::Ipv4Addr::from(*bytes)),
            _ => None,
        }
    }

    /// Check if this is an exception marker (noSuchObject,
    /// noSuchInstance, or endOfMibView).
    pub fn is_exception(&self) -> bool {
        matches!(
            self,
            Value::NoSuchObject | Value::NoSuchInstance | Value::EndOfMibView
        )
    }

    /// Encode to BER.
    pub fn encode(&self, buf: &mut EncodeBuf) {
        match self {
            Value::Boolean(v) => {
                buf.push_byte(if *v { 0xFF } else { 0x00 });
                buf.push_length(1);
                buf.push_tag(tag::universal::BOOLEAN);
            }
            Value::Integer(v) => buf.push_integer64(*v),
            Value::BitString(data) => {
                buf.push_bytes(data);
                buf.push_length(data.len());
                buf.push_tag(tag::universal::BIT_STRING);
            }
            Value::OctetString(data) => buf.push_octet_string(data),
            Value::Null => buf.push_null(),
            Value::ObjectIdentifier(oid) => buf.push_oid(oid),
            Value::IpAddress(addr) => buf.push_ip_address(*addr),
            Value::Counter32(v) => buf.push_unsigned32(tag::application::COUNTER32, *v),
            Value::Gauge32(v) => buf.push_unsigned32(tag::application::GAUGE32, *v),
            Value::TimeTicks(v) => buf.push_unsigned32(tag::application::TIMETICKS, *v),
            Value::Opaque(data) => {
                buf.push_bytes(data);
                buf.push_length(data.len());
                buf.push_tag(tag::application::OPAQUE);
            }
            Value::Counter64(v) => buf.push_unsigned64(tag::application::COUNTER64, *v),
            Value::Uinteger32(v) => buf.push_unsigned32(tag::application::UINTEGER32, *v),
            Value::OpaqueFloat(v) => {
                // Opaque wrapping a 0x9F 0x78 marker plus big-endian f32
                let raw = v.to_be_bytes();
                buf.push_bytes(&raw);
                buf.push_byte(4);
                buf.push_byte(tag::opaque_special::FLOAT);
                buf.push_byte(tag::opaque_special::MARKER);
                buf.push_length(3 + raw.len());
                buf.push_tag(tag::application::OPAQUE);
            }
            Value::OpaqueDouble(v) => {
                let raw = v.to_be_bytes();
                buf.push_bytes(&raw);
                buf.push_byte(8);
                buf.push_byte(tag::opaque_special::DOUBLE);
                buf.push_byte(tag::opaque_special::MARKER);
                buf.push_length(3 + raw.len());
                buf.push_tag(tag::application::OPAQUE);
            }
            Value::NoSuchObject => {
                buf.push_length(0);
                buf.push_tag(tag::context::NO_SUCH_OBJECT);
            }
            Value::NoSuchInstance => {
                buf.push_length(0);
                buf.push_tag(tag::context::NO_SUCH_INSTANCE);
            }
            Value::EndOfMibView => {
                buf.push_length(0);
                buf.push_tag(tag::context::END_OF_MIB_VIEW);
            }
            Value::Unknown { tag, data } => {
                buf.push_bytes(data);
                buf.push_length(data.len());
                buf.push_tag(*tag);
            }
        }
    }

    /// Decode a value from the decoder, dispatching on the tag.
    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let value_tag = decoder.read_tag()?;
        let len = decoder.read_length()?;

        match value_tag {
            tag::universal::BOOLEAN => {
                if len != 1 {
                    return Err(Error::decode(
                        decoder.offset(),
                        DecodeErrorKind::InvalidBoolean,
                    ));
                }
                let bytes = decoder.read_bytes(1)?;
                Ok(Value::Boolean(bytes[0] != 0))
            }
            tag::universal::INTEGER => Ok(Value::Integer(decoder.read_integer64_value(len)?)),
            tag::universal::BIT_STRING => Ok(Value::BitString(decoder.read_bytes(len)?)),
            tag::universal::OCTET_STRING => Ok(Value::OctetString(decoder.read_bytes(len)?)),
            tag::universal::NULL => {
                if len != 0 {
                    return Err(Error::decode(decoder.offset(), DecodeErrorKind::InvalidNull));
                }
                Ok(Value::Null)
            }
            tag::universal::OBJECT_IDENTIFIER => {
                Ok(Value::ObjectIdentifier(decoder.read_oid_value(len)?))
            }
            tag::application::IP_ADDRESS => {
                if len != 4 {
                    return Err(Error::decode(
                        decoder.offset(),
                        DecodeErrorKind::InvalidIpAddressLength { length: len },
                    ));
                }
                let bytes = decoder.read_bytes(4)?;
                Ok(Value::IpAddress([bytes[0], bytes[1], bytes[2], bytes[3]]))
            }
            tag::application::COUNTER32 => {
                Ok(Value::Counter32(decoder.read_unsigned32_value(len)?))
            }
            tag::application::GAUGE32 => Ok(Value::Gauge32(decoder.read_unsigned32_value(len)?)),
            tag::application::TIMETICKS => {
                Ok(Value::TimeTicks(decoder.read_unsigned32_value(len)?))
            }
            tag::application::OPAQUE => {
                let data = decoder.read_bytes(len)?;
                decode_opaque(data, decoder.offset())
            }
            tag::application::COUNTER64 => {
                Ok(Value::Counter64(decoder.read_unsigned64_value(len)?))
            }
            tag::application::UINTEGER32 => {
                Ok(Value::Uinteger32(decoder.read_unsigned32_value(len)?))
            }
            tag::context::NO_SUCH_OBJECT => {
                decoder.read_bytes(len)?;
                Ok(Value::NoSuchObject)
            }
            tag::context::NO_SUCH_INSTANCE => {
                decoder.read_bytes(len)?;
                Ok(Value::NoSuchInstance)
            }
            tag::context::END_OF_MIB_VIEW => {
                decoder.read_bytes(len)?;
                Ok(Value::EndOfMibView)
            }
            other => Ok(Value::Unknown {
                tag: other,
                data: decoder.read_bytes(len)?,
            }),
        }
    }
}

/// Interpret Opaque content: an embedded `0x9F 0x78/0x79` TLV is a
/// float or double, anything else stays raw bytes.
fn decode_opaque(data: Bytes, base_offset: usize) -> Result<Value> {
    if data.len() >= 3 && data[0] == tag::opaque_special::MARKER {
        let subtag = data[1];
        let payload_len = data[2] as usize;
        let payload = &data[3..];
        match subtag {
            tag::opaque_special::FLOAT => {
                if payload_len != 4 || payload.len() != 4 {
                    return Err(Error::decode(
                        base_offset,
                        DecodeErrorKind::InvalidOpaqueFloat {
                            length: payload.len(),
                        },
                    ));
                }
                let raw = [payload[0], payload[1], payload[2], payload[3]];
                return Ok(Value::OpaqueFloat(f32::from_be_bytes(raw)));
            }
            tag::opaque_special::DOUBLE => {
                if payload_len != 8 || payload.len() != 8 {
                    return Err(Error::decode(
                        base_offset,
                        DecodeErrorKind::InvalidOpaqueFloat {
                            length: payload.len(),
                        },
                    ));
                }
                let mut raw = [0u8; 8];
                raw.copy_from_slice(payload);
                return Ok(Value::OpaqueDouble(f64::from_be_bytes(raw)));
            }
            _ => {}
        }
    }
    Ok(Value::Opaque(data))
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Integer(v) => write!(f, "{}", v),
            Value::BitString(data) => write!(f, "BITS({} bytes)", data.len()),
            Value::OctetString(data) => match std::str::from_utf8(data) {
                Ok(s) => write!(f, "{}", s),
                Err(_) => write!(f, "{}", crate::util::Hex(data)),
            },
            Value::Null => write!(f, "NULL"),
            Value::ObjectIdentifier(oid) => write!(f, "{}", oid),
            Value::IpAddress(addr) => write!(f, "{}", std::net::Ipv4Addr::from(*addr)),
            Value::Counter32(v) => write!(f, "{}", v),
            Value::Gauge32(v) => write!(f, "{}", v),
            Value::TimeTicks(v) => write!(f, "{}", v),
            Value::Opaque(data) => write!(f, "{}", crate::util::Hex(data)),
            Value::Counter64(v) => write!(f, "{}", v),
            Value::Uinteger32(v) => write!(f, "{}", v),
            Value::OpaqueFloat(v) => write!(f, "{}", v),
            Value::OpaqueDouble(v) => write!(f, "{}", v),
            Value::NoSuchObject => write!(f, "noSuchObject"),
            Value::NoSuchInstance => write!(f, "noSuchInstance"),
            Value::EndOfMibView => write!(f, "endOfMibView"),
            Value::Unknown { tag, data } => {
                write!(f, "unknown(0x{:02X}, {} bytes)", tag, data.len())
            }
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::OctetString(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::OctetString(Bytes::from(s.into_bytes()))
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self {
        Value::OctetString(Bytes::copy_from_slice(b))
    }
}
