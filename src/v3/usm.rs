//! USM security parameters (RFC 3414 Section 2.4).
//!
//! The parameters travel inside the message as an OCTET STRING wrapping
//! a BER SEQUENCE:
//!
//! ```text
//! UsmSecurityParameters ::= SEQUENCE {
//!     msgAuthoritativeEngineID     OCTET STRING,
//!     msgAuthoritativeEngineBoots  INTEGER (0..2147483647),
//!     msgAuthoritativeEngineTime   INTEGER (0..2147483647),
//!     msgUserName                  OCTET STRING (SIZE(0..32)),
//!     msgAuthenticationParameters  OCTET STRING,
//!     msgPrivacyParameters         OCTET STRING
//! }
//! ```

use bytes::Bytes;

use crate::ber::{tag, Decoder, EncodeBuf};
use crate::error::{DecodeErrorKind, Error, Result};

/// USM security parameters.
#[derive(Debug, Clone)]
pub struct UsmSecurityParams {
    /// Authoritative engine ID
    pub engine_id: Bytes,
    /// Engine boot count
    pub engine_boots: u32,
    /// Engine time (seconds since last boot)
    pub engine_time: u32,
    /// User name
    pub username: Bytes,
    /// Authentication parameters (truncated HMAC, or empty)
    pub auth_params: Bytes,
    /// Privacy parameters (wire salt, or empty)
    pub priv_params: Bytes,
}

impl UsmSecurityParams {
    /// Create new security parameters.
    pub fn new(
        engine_id: impl Into<Bytes>,
        engine_boots: u32,
        engine_time: u32,
        username: impl Into<Bytes>,
    ) -> Self {
        Self {
            engine_id: engine_id.into(),
            engine_boots,
            engine_time,
            username: username.into(),
            auth_params: Bytes::new(),
            priv_params: Bytes::new(),
        }
    }

    /// Create empty parameters, as sent in a discovery request.
    pub fn empty() -> Self {
        Self {
            engine_id: Bytes::new(),
            engine_boots: 0,
            engine_time: 0,
            username: Bytes::new(),
            auth_params: Bytes::new(),
            priv_params: Bytes::new(),
        }
    }

    /// Set the authentication parameters.
    pub fn with_auth_params(mut self, auth_params: impl Into<Bytes>) -> Self {
        self.auth_params = auth_params.into();
        self
    }

    /// Set the privacy parameters.
    pub fn with_priv_params(mut self, priv_params: impl Into<Bytes>) -> Self {
        self.priv_params = priv_params.into();
        self
    }

    /// Install a zeroed MAC placeholder of the algorithm's length.
    ///
    /// The digest is computed over the fully serialized message with the
    /// placeholder in place, then written over it.
    pub fn with_auth_placeholder(mut self, mac_len: usize) -> Self {
        self.auth_params = Bytes::from(vec![0u8; mac_len]);
        self
    }

    /// Encode to BER bytes.
    pub fn encode(&self) -> Bytes {
        let mut buf = EncodeBuf::new();
        buf.push_sequence(|buf| {
            buf.push_octet_string(&self.priv_params);
            buf.push_octet_string(&self.auth_params);
            buf.push_octet_string(&self.username);
            buf.push_unsigned32(tag::universal::INTEGER, self.engine_time);
            buf.push_unsigned32(tag::universal::INTEGER, self.engine_boots);
            buf.push_octet_string(&self.engine_id);
        });
        buf.finish()
    }

    /// Decode from BER bytes.
    pub fn decode(data: Bytes) -> Result<Self> {
        let mut decoder = Decoder::new(data);
        let mut seq = decoder.read_sequence()?;

        let engine_id = seq.read_octet_string()?;

        let raw_boots = seq.read_integer()?;
        if raw_boots < 0 {
            return Err(Error::decode(
                seq.offset(),
                DecodeErrorKind::NegativeEngineCounter(raw_boots),
            ));
        }

        let raw_time = seq.read_integer()?;
        if raw_time < 0 {
            return Err(Error::decode(
                seq.offset(),
                DecodeErrorKind::NegativeEngineCounter(raw_time),
            ));
        }

        let username = seq.read_octet_string()?;
        let auth_params = seq.read_octet_string()?;
        let priv_params = seq.read_octet_string()?;

        Ok(Self {
            engine_id,
            engine_boots: raw_boots as u32,
            engine_time: raw_time as u32,
            username,
            auth_params,
            priv_params,
        })
    }

    /// Locate msgAuthenticationParameters inside a serialized message.
    ///
    /// Returns `(offset, length)` of the MAC bytes. Walking the BER
    /// structure is preferred over scanning for the zeroed byte pattern:
    /// it cannot false-match user data and works for verification where
    /// the field is not zero.
    pub fn find_auth_params_offset(encoded_msg: &[u8]) -> Option<(usize, usize)> {
        // Message layout:
        //   SEQUENCE {
        //     INTEGER version
        //     SEQUENCE msgGlobalData { ... }
        //     OCTET STRING msgSecurityParameters {
        //       SEQUENCE {
        //         OCTET STRING engineID
        //         INTEGER boots
        //         INTEGER time
        //         OCTET STRING username
        //         OCTET STRING authParams   <-- target
        //         OCTET STRING privParams
        //       }
        //     }
        //     ...
        //   }
        let mut offset = 0;

        // Outer SEQUENCE header
        if *encoded_msg.first()? != tag::universal::SEQUENCE {
            return None;
        }
        offset += 1;
        let (_, len_size) = parse_length(encoded_msg.get(offset..)?)?;
        offset += len_size;

        // version INTEGER
        if *encoded_msg.get(offset)? != tag::universal::INTEGER {
            return None;
        }
        offset += 1;
        let (ver_len, len_size) = parse_length(encoded_msg.get(offset..)?)?;
        offset += len_size + ver_len;

        // msgGlobalData SEQUENCE (skipped whole)
        if *encoded_msg.get(offset)? != tag::universal::SEQUENCE {
            return None;
        }
        offset += 1;
        let (global_len, len_size) = parse_length(encoded_msg.get(offset..)?)?;
        offset += len_size + global_len;

        // msgSecurityParameters OCTET STRING header
        if *encoded_msg.get(offset)? != tag::universal::OCTET_STRING {
            return None;
        }
        offset += 1;
        let (_, len_size) = parse_length(encoded_msg.get(offset..)?)?;
        offset += len_size;

        // USM SEQUENCE header
        if *encoded_msg.get(offset)? != tag::universal::SEQUENCE {
            return None;
        }
        offset += 1;
        let (_, len_size) = parse_length(encoded_msg.get(offset..)?)?;
        offset += len_size;

        // engineID, boots, time, username
        for _ in 0..4 {
            offset = skip_tlv(encoded_msg, offset)?;
        }

        // authParams OCTET STRING
        if *encoded_msg.get(offset)? != tag::universal::OCTET_STRING {
            return None;
        }
        offset += 1;
        let (auth_len, len_size) = parse_length(encoded_msg.get(offset..)?)?;
        let auth_start = offset + len_size;
        if auth_start + auth_len > encoded_msg.len() {
            return None;
        }

        Some((auth_start, auth_len))
    }
}

/// Parse a BER length, returning `(length, bytes_consumed)`.
fn parse_length(data: &[u8]) -> Option<(usize, usize)> {
    let first = *data.first()?;
    if first < 0x80 {
        Some((first as usize, 1))
    } else if first == 0x80 {
        // Indefinite form
        None
    } else {
        let count = (first & 0x7F) as usize;
        if count == 0 || count > 4 || data.len() < 1 + count {
            return None;
        }
        let mut len = 0usize;
        for &byte in &data[1..1 + count] {
            len = (len << 8) | (byte as usize);
        }
        Some((len, 1 + count))
    }
}

/// Skip a TLV, returning the offset just past it.
fn skip_tlv(data: &[u8], offset: usize) -> Option<usize> {
    data.get(offset)?;
    let pos = offset + 1;
    let (len, len_size) = parse_length(data.get(pos..)?)?;
    let end = pos + len_size + len;
    if end > data.len() {
        return None;
    }
    Some(end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_roundtrip() {
        let decoded = UsmSecurityParams::decode(UsmSecurityParams::empty().encode()).unwrap();

        assert!(decoded.engine_id.is_empty());
        assert_eq!(decoded.engine_boots, 0);
        assert_eq!(decoded.engine_time, 0);
        assert!(decoded.username.is_empty());
        assert!(decoded.auth_params.is_empty());
        assert!(decoded.priv_params.is_empty());
    }

    #[test]
    fn test_full_roundtrip() {
        let params = UsmSecurityParams::new(b"engine-id".as_ref(), 1234, 5678, b"admin".as_ref())
            .with_auth_params(b"auth12345678".as_ref())
            .with_priv_params(b"priv1234".as_ref());

        let decoded = UsmSecurityParams::decode(params.encode()).unwrap();
        assert_eq!(decoded.engine_id.as_ref(), b"engine-id");
        assert_eq!(decoded.engine_boots, 1234);
        assert_eq!(decoded.engine_time, 5678);
        assert_eq!(decoded.username.as_ref(), b"admin");
        assert_eq!(decoded.auth_params.as_ref(), b"auth12345678");
        assert_eq!(decoded.priv_params.as_ref(), b"priv1234");
    }

    #[test]
    fn test_auth_placeholder_is_zeroed() {
        let params = UsmSecurityParams::new(b"engine".as_ref(), 100, 200, b"user".as_ref())
            .with_auth_placeholder(24);
        assert_eq!(params.auth_params.len(), 24);
        assert!(params.auth_params.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_rejects_negative_counters() {
        use crate::ber::EncodeBuf;

        for (boots, time) in [(-1, 100), (100, -1)] {
            let mut buf = EncodeBuf::new();
            buf.push_sequence(|buf| {
                buf.push_octet_string(&[]);
                buf.push_octet_string(&[]);
                buf.push_octet_string(&[]);
                buf.push_integer(time);
                buf.push_integer(boots);
                buf.push_octet_string(&[]);
            });

            let err = UsmSecurityParams::decode(buf.finish()).unwrap_err();
            assert!(matches!(
                err,
                Error::Decode {
                    kind: DecodeErrorKind::NegativeEngineCounter(_),
                    ..
                }
            ));
        }
    }

    #[test]
    fn test_accepts_max_counters() {
        let params =
            UsmSecurityParams::new(Bytes::new(), i32::MAX as u32, i32::MAX as u32, Bytes::new());
        let decoded = UsmSecurityParams::decode(params.encode()).unwrap();
        assert_eq!(decoded.engine_boots, i32::MAX as u32);
        assert_eq!(decoded.engine_time, i32::MAX as u32);
    }

    #[test]
    fn test_find_auth_params_offset() {
        use crate::message::{MsgFlags, MsgGlobalData, ScopedPdu, SecurityLevel, V3Message};
        use crate::oid;
        use crate::pdu::Pdu;

        let global =
            MsgGlobalData::new(12345, 1472, MsgFlags::new(SecurityLevel::AuthNoPriv, true));
        let usm = UsmSecurityParams::new(b"engine123".as_ref(), 100, 200, b"testuser".as_ref())
            .with_auth_placeholder(12);
        let pdu = Pdu::get_request(42, &[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)]);
        let msg = V3Message::new(global, usm.encode(), ScopedPdu::with_empty_context(pdu));

        let encoded = msg.encode();
        let (offset, len) = UsmSecurityParams::find_auth_params_offset(&encoded).unwrap();
        assert_eq!(len, 12);
        assert!(encoded[offset..offset + len].iter().all(|&b| b == 0));

        // The located region really is msgAuthenticationParameters: the
        // field after it is the (empty) privacy parameters
        assert_eq!(encoded[offset + len], tag::universal::OCTET_STRING);
        assert_eq!(encoded[offset + len + 1], 0);
    }

    #[test]
    fn test_find_auth_params_offset_handles_garbage() {
        assert!(UsmSecurityParams::find_auth_params_offset(&[]).is_none());
        assert!(UsmSecurityParams::find_auth_params_offset(&[0x30]).is_none());
        assert!(UsmSecurityParams::find_auth_params_offset(&[0x04, 0x02, 0x00, 0x00]).is_none());
    }
}
