//! SNMPv3 message format (RFC 3412).
//!
//! ```text
//! SEQUENCE {
//!     INTEGER version (3)
//!     SEQUENCE msgGlobalData {
//!         INTEGER msgID
//!         INTEGER msgMaxSize
//!         OCTET STRING msgFlags (1 byte)
//!         INTEGER msgSecurityModel
//!     }
//!     OCTET STRING msgSecurityParameters (opaque, USM-encoded)
//!     msgData (plaintext ScopedPDU, or OCTET STRING of ciphertext)
//! }
//! ```

use crate::ber::{Decoder, EncodeBuf};
use crate::error::{DecodeErrorKind, Error, Result};
use crate::pdu::Pdu;
use bytes::Bytes;

/// SNMPv3 security model identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum SecurityModel {
    /// User-based Security Model (RFC 3414). The only model implemented;
    /// the tagged enum leaves room for TSM without an inheritance tree.
    Usm = 3,
}

impl SecurityModel {
    /// Create from the wire value.
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            3 => Some(Self::Usm),
            _ => None,
        }
    }

    /// Get the wire value.
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

/// SNMPv3 security level, ordered weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SecurityLevel {
    /// No authentication, no privacy
    NoAuthNoPriv,
    /// Authentication only
    AuthNoPriv,
    /// Authentication and privacy (encryption)
    AuthPriv,
}

impl SecurityLevel {
    /// Decode from the msgFlags byte.
    pub fn from_flags(flags: u8) -> Option<Self> {
        let auth = flags & 0x01 != 0;
        let priv_ = flags & 0x02 != 0;

        match (auth, priv_) {
            (false, false) => Some(Self::NoAuthNoPriv),
            (true, false) => Some(Self::AuthNoPriv),
            (true, true) => Some(Self::AuthPriv),
            // Privacy without authentication is forbidden by RFC 3412
            (false, true) => None,
        }
    }

    /// Encode to the msgFlags byte (without the reportable bit).
    pub fn to_flags(self) -> u8 {
        match self {
            Self::NoAuthNoPriv => 0x00,
            Self::AuthNoPriv => 0x01,
            Self::AuthPriv => 0x03,
        }
    }

    /// Check if authentication is required.
    pub fn requires_auth(self) -> bool {
        matches!(self, Self::AuthNoPriv | Self::AuthPriv)
    }

    /// Check if privacy (encryption) is required.
    pub fn requires_priv(self) -> bool {
        matches!(self, Self::AuthPriv)
    }
}

/// Message flags (RFC 3412 Section 6.4): security level plus the
/// reportable bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MsgFlags {
    pub security_level: SecurityLevel,
    /// Whether the peer may answer errors with a Report PDU.
    pub reportable: bool,
}

impl MsgFlags {
    /// Create new message flags.
    pub fn new(security_level: SecurityLevel, reportable: bool) -> Self {
        Self {
            security_level,
            reportable,
        }
    }

    /// Decode from the flags byte.
    pub fn from_byte(byte: u8) -> Result<Self> {
        let security_level = SecurityLevel::from_flags(byte)
            .ok_or_else(|| Error::decode(0, DecodeErrorKind::InvalidMsgFlags))?;
        Ok(Self {
            security_level,
            reportable: byte & 0x04 != 0,
        })
    }

    /// Encode to the flags byte.
    pub fn to_byte(self) -> u8 {
        let mut flags = self.security_level.to_flags();
        if self.reportable {
            flags |= 0x04;
        }
        flags
    }
}

/// msgGlobalData header.
#[derive(Debug, Clone)]
pub struct MsgGlobalData {
    /// Message identifier for request/response correlation
    pub msg_id: i32,
    /// Maximum message size the sender can accept
    pub msg_max_size: i32,
    /// Security level plus reportable bit
    pub msg_flags: MsgFlags,
    /// Security model (USM)
    pub msg_security_model: SecurityModel,
}

impl MsgGlobalData {
    /// Create new global data with the USM security model.
    pub fn new(msg_id: i32, msg_max_size: i32, msg_flags: MsgFlags) -> Self {
        Self {
            msg_id,
            msg_max_size,
            msg_flags,
            msg_security_model: SecurityModel::Usm,
        }
    }

    /// Encode into a buffer.
    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_sequence(|buf| {
            buf.push_integer(self.msg_security_model.as_i32());
            // msgFlags is a one-byte OCTET STRING
            buf.push_octet_string(&[self.msg_flags.to_byte()]);
            buf.push_integer(self.msg_max_size);
            buf.push_integer(self.msg_id);
        });
    }

    /// Decode from a decoder.
    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        // RFC 3412 Section 6.1 lower bound
        const MSG_MAX_SIZE_MINIMUM: i32 = 484;

        let mut seq = decoder.read_sequence()?;

        let msg_id = seq.read_integer()?;
        let msg_max_size = seq.read_integer()?;
        if msg_max_size < MSG_MAX_SIZE_MINIMUM {
            return Err(Error::decode(
                seq.offset(),
                DecodeErrorKind::MsgMaxSizeTooSmall {
                    value: msg_max_size,
                    minimum: MSG_MAX_SIZE_MINIMUM,
                },
            ));
        }

        let flags_bytes = seq.read_octet_string()?;
        if flags_bytes.len() != 1 {
            return Err(Error::decode(seq.offset(), DecodeErrorKind::InvalidMsgFlags));
        }
        let msg_flags = MsgFlags::from_byte(flags_bytes[0])?;

        let model_raw = seq.read_integer()?;
        let msg_security_model = SecurityModel::from_i32(model_raw).ok_or_else(|| {
            Error::decode(
                seq.offset(),
                DecodeErrorKind::UnknownSecurityModel(model_raw),
            )
        })?;

        Ok(Self {
            msg_id,
            msg_max_size,
            msg_flags,
            msg_security_model,
        })
    }
}

/// Scoped PDU: contextEngineID + contextName + PDU. This is what USM
/// privacy encrypts.
#[derive(Debug, Clone)]
pub struct ScopedPdu {
    /// Context engine ID (usually the authoritative engine ID)
    pub context_engine_id: Bytes,
    /// Context name (usually empty)
    pub context_name: Bytes,
    /// The inner PDU
    pub pdu: Pdu,
}

impl ScopedPdu {
    /// Create a new scoped PDU.
    pub fn new(
        context_engine_id: impl Into<Bytes>,
        context_name: impl Into<Bytes>,
        pdu: Pdu,
    ) -> Self {
        Self {
            context_engine_id: context_engine_id.into(),
            context_name: context_name.into(),
            pdu,
        }
    }

    /// Create with empty context identifiers (the common case).
    pub fn with_empty_context(pdu: Pdu) -> Self {
        Self {
            context_engine_id: Bytes::new(),
            context_name: Bytes::new(),
            pdu,
        }
    }

    /// Encode into a buffer.
    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_sequence(|buf| {
            self.pdu.encode(buf);
            buf.push_octet_string(&self.context_name);
            buf.push_octet_string(&self.context_engine_id);
        });
    }

    /// Encode to standalone bytes (the plaintext handed to the cipher).
    pub fn encode_to_bytes(&self) -> Bytes {
        let mut buf = EncodeBuf::new();
        self.encode(&mut buf);
        buf.finish()
    }

    /// Decode from a decoder.
    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let mut seq = decoder.read_sequence()?;

        let context_engine_id = seq.read_octet_string()?;
        let context_name = seq.read_octet_string()?;
        let pdu = Pdu::decode(&mut seq)?;

        Ok(Self {
            context_engine_id,
            context_name,
            pdu,
        })
    }
}

/// SNMPv3 message.
#[derive(Debug, Clone)]
pub struct V3Message {
    pub global_data: MsgGlobalData,
    /// Security parameters blob (USM-encoded)
    pub security_params: Bytes,
    /// Plaintext scoped PDU or ciphertext
    pub data: V3MessageData,
}

/// Message payload: plaintext or ciphertext.
#[derive(Debug, Clone)]
pub enum V3MessageData {
    /// Plaintext scoped PDU (noAuthNoPriv or authNoPriv)
    Plaintext(ScopedPdu),
    /// Encrypted scoped PDU (authPriv), raw ciphertext
    Encrypted(Bytes),
}

impl V3Message {
    /// Create a plaintext message.
    pub fn new(global_data: MsgGlobalData, security_params: Bytes, scoped_pdu: ScopedPdu) -> Self {
        Self {
            global_data,
            security_params,
            data: V3MessageData::Plaintext(scoped_pdu),
        }
    }

    /// Create a message carrying ciphertext.
    pub fn new_encrypted(
        global_data: MsgGlobalData,
        security_params: Bytes,
        encrypted: Bytes,
    ) -> Self {
        Self {
            global_data,
            security_params,
            data: V3MessageData::Encrypted(encrypted),
        }
    }

    /// Get the scoped PDU if the payload is plaintext.
    pub fn scoped_pdu(&self) -> Option<&ScopedPdu> {
        match &self.data {
            V3MessageData::Plaintext(pdu) => Some(pdu),
            V3MessageData::Encrypted(_) => None,
        }
    }

    /// Consume and return the scoped PDU if plaintext.
    pub fn into_scoped_pdu(self) -> Option<ScopedPdu> {
        match self.data {
            V3MessageData::Plaintext(pdu) => Some(pdu),
            V3MessageData::Encrypted(_) => None,
        }
    }

    /// Get the inner PDU if plaintext.
    pub fn pdu(&self) -> Option<&Pdu> {
        self.scoped_pdu().map(|s| &s.pdu)
    }

    /// Consume and return the inner PDU if plaintext.
    pub fn into_pdu(self) -> Option<Pdu> {
        self.into_scoped_pdu().map(|s| s.pdu)
    }

    /// Get the message ID.
    pub fn msg_id(&self) -> i32 {
        self.global_data.msg_id
    }

    /// Get the security level.
    pub fn security_level(&self) -> SecurityLevel {
        self.global_data.msg_flags.security_level
    }

    /// Encode to BER.
    ///
    /// For authenticated messages the security parameters must already
    /// contain the zeroed MAC placeholder; the caller computes the HMAC
    /// over these bytes and patches it in afterwards.
    pub fn encode(&self) -> Bytes {
        let mut buf = EncodeBuf::new();

        buf.push_sequence(|buf| {
            match &self.data {
                V3MessageData::Plaintext(scoped_pdu) => scoped_pdu.encode(buf),
                V3MessageData::Encrypted(ciphertext) => buf.push_octet_string(ciphertext),
            }
            buf.push_octet_string(&self.security_params);
            self.global_data.encode(buf);
            buf.push_integer(3);
        });

        buf.finish()
    }

    /// Decode from BER.
    ///
    /// Encrypted payloads are returned as raw ciphertext; the USM layer
    /// decrypts before the scoped PDU becomes accessible.
    pub fn decode(data: Bytes) -> Result<Self> {
        let mut decoder = Decoder::new(data);
        let mut seq = decoder.read_sequence()?;

        let version = seq.read_integer()?;
        if version != 3 {
            return Err(Error::decode(
                seq.offset(),
                DecodeErrorKind::UnknownVersion(version),
            ));
        }

        Self::decode_from_sequence(&mut seq)
    }

    /// Decode from a sequence decoder whose version has been consumed.
    pub(crate) fn decode_from_sequence(seq: &mut Decoder) -> Result<Self> {
        let global_data = MsgGlobalData::decode(seq)?;
        let security_params = seq.read_octet_string()?;

        let data = if global_data.msg_flags.security_level.requires_priv() {
            V3MessageData::Encrypted(seq.read_octet_string()?)
        } else {
            V3MessageData::Plaintext(ScopedPdu::decode(seq)?)
        };

        Ok(Self {
            global_data,
            security_params,
            data,
        })
    }

    /// Create an engine discovery request.
    ///
    /// Reportable, noAuthNoPriv, empty USM security parameters, empty
    /// varbind list: the peer answers with a Report carrying its engine
    /// ID, boots, and time.
    pub fn discovery_request(msg_id: i32) -> Self {
        let global_data = MsgGlobalData::new(
            msg_id,
            crate::v3::DEFAULT_MSG_MAX_SIZE as i32,
            MsgFlags::new(SecurityLevel::NoAuthNoPriv, true),
        );

        let security_params = crate::v3::UsmSecurityParams::empty().encode();
        let pdu = Pdu::get_request(0, &[]);
        let scoped_pdu = ScopedPdu::with_empty_context(pdu);

        Self::new(global_data, security_params, scoped_pdu)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ber::EncodeBuf;
    use crate::oid;

    #[test]
    fn test_security_level_flags() {
        assert_eq!(SecurityLevel::NoAuthNoPriv.to_flags(), 0x00);
        assert_eq!(SecurityLevel::AuthNoPriv.to_flags(), 0x01);
        assert_eq!(SecurityLevel::AuthPriv.to_flags(), 0x03);

        assert_eq!(
            SecurityLevel::from_flags(0x00),
            Some(SecurityLevel::NoAuthNoPriv)
        );
        assert_eq!(
            SecurityLevel::from_flags(0x01),
            Some(SecurityLevel::AuthNoPriv)
        );
        assert_eq!(
            SecurityLevel::from_flags(0x03),
            Some(SecurityLevel::AuthPriv)
        );
        // Privacy without authentication is invalid
        assert_eq!(SecurityLevel::from_flags(0x02), None);
    }

    #[test]
    fn test_msg_flags_roundtrip() {
        let flags = MsgFlags::new(SecurityLevel::AuthPriv, true);
        let byte = flags.to_byte();
        assert_eq!(byte, 0x07);

        let decoded = MsgFlags::from_byte(byte).unwrap();
        assert_eq!(decoded.security_level, SecurityLevel::AuthPriv);
        assert!(decoded.reportable);
    }

    #[test]
    fn test_msg_global_data_roundtrip() {
        let global =
            MsgGlobalData::new(12345, 1472, MsgFlags::new(SecurityLevel::AuthNoPriv, true));

        let mut buf = EncodeBuf::new();
        global.encode(&mut buf);
        let mut decoder = Decoder::new(buf.finish());
        let decoded = MsgGlobalData::decode(&mut decoder).unwrap();

        assert_eq!(decoded.msg_id, 12345);
        assert_eq!(decoded.msg_max_size, 1472);
        assert_eq!(decoded.msg_flags.security_level, SecurityLevel::AuthNoPriv);
        assert!(decoded.msg_flags.reportable);
        assert_eq!(decoded.msg_security_model, SecurityModel::Usm);
    }

    #[test]
    fn test_msg_global_data_rejects_small_max_size() {
        let global = MsgGlobalData {
            msg_id: 100,
            msg_max_size: 400, // below the RFC 3412 minimum of 484
            msg_flags: MsgFlags::new(SecurityLevel::NoAuthNoPriv, true),
            msg_security_model: SecurityModel::Usm,
        };

        let mut buf = EncodeBuf::new();
        global.encode(&mut buf);
        let mut decoder = Decoder::new(buf.finish());
        assert!(matches!(
            MsgGlobalData::decode(&mut decoder).unwrap_err(),
            Error::Decode {
                kind: DecodeErrorKind::MsgMaxSizeTooSmall {
                    value: 400,
                    minimum: 484
                },
                ..
            }
        ));
    }

    #[test]
    fn test_msg_global_data_rejects_unknown_security_model() {
        let mut buf = EncodeBuf::new();
        buf.push_sequence(|buf| {
            buf.push_integer(99); // unknown model
            buf.push_octet_string(&[0x04]);
            buf.push_integer(1472);
            buf.push_integer(100);
        });
        let mut decoder = Decoder::new(buf.finish());
        assert!(matches!(
            MsgGlobalData::decode(&mut decoder).unwrap_err(),
            Error::Decode {
                kind: DecodeErrorKind::UnknownSecurityModel(99),
                ..
            }
        ));
    }

    #[test]
    fn test_scoped_pdu_roundtrip() {
        let pdu = Pdu::get_request(42, &[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)]);
        let scoped = ScopedPdu::new(b"engine".as_ref(), b"ctx".as_ref(), pdu);

        let mut buf = EncodeBuf::new();
        scoped.encode(&mut buf);
        let mut decoder = Decoder::new(buf.finish());
        let decoded = ScopedPdu::decode(&mut decoder).unwrap();

        assert_eq!(decoded.context_engine_id.as_ref(), b"engine");
        assert_eq!(decoded.context_name.as_ref(), b"ctx");
        assert_eq!(decoded.pdu.request_id, 42);
    }

    #[test]
    fn test_v3_message_plaintext_roundtrip() {
        let global =
            MsgGlobalData::new(100, 1472, MsgFlags::new(SecurityLevel::NoAuthNoPriv, true));
        let pdu = Pdu::get_request(42, &[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)]);
        let scoped = ScopedPdu::with_empty_context(pdu);
        let msg = V3Message::new(global, Bytes::from_static(b"usm-params"), scoped);

        let decoded = V3Message::decode(msg.encode()).unwrap();
        assert_eq!(decoded.msg_id(), 100);
        assert_eq!(decoded.security_level(), SecurityLevel::NoAuthNoPriv);
        assert_eq!(decoded.security_params.as_ref(), b"usm-params");
        assert_eq!(decoded.scoped_pdu().unwrap().pdu.request_id, 42);
    }

    #[test]
    fn test_v3_message_encrypted_roundtrip() {
        let global = MsgGlobalData::new(200, 1472, MsgFlags::new(SecurityLevel::AuthPriv, false));
        let msg = V3Message::new_encrypted(
            global,
            Bytes::from_static(b"usm-params"),
            Bytes::from_static(b"encrypted-data"),
        );

        let decoded = V3Message::decode(msg.encode()).unwrap();
        assert_eq!(decoded.msg_id(), 200);
        assert_eq!(decoded.security_level(), SecurityLevel::AuthPriv);
        assert!(decoded.pdu().is_none());
        match &decoded.data {
            V3MessageData::Encrypted(data) => assert_eq!(data.as_ref(), b"encrypted-data"),
            V3MessageData::Plaintext(_) => panic!("expected encrypted data"),
        }
    }

    #[test]
    fn test_discovery_request_shape() {
        let msg = V3Message::discovery_request(77);
        assert_eq!(msg.msg_id(), 77);
        assert_eq!(msg.security_level(), SecurityLevel::NoAuthNoPriv);
        assert!(msg.global_data.msg_flags.reportable);

        let decoded = V3Message::decode(msg.encode()).unwrap();
        let scoped = decoded.scoped_pdu().unwrap();
        assert!(scoped.context_engine_id.is_empty());
        assert!(scoped.pdu.varbinds.is_empty());

        let usm = crate::v3::UsmSecurityParams::decode(decoded.security_params.clone()).unwrap();
        assert!(usm.engine_id.is_empty());
        assert_eq!(usm.engine_boots, 0);
    }
}
