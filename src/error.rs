//! Error types for snmpkit.
//!
//! The single [`Error`] enum covers network failures, BER codec errors,
//! SNMP protocol errors returned by agents (RFC 3416), and SNMPv3
//! security failures. Kind enums ([`DecodeErrorKind`], [`AuthErrorKind`],
//! [`CryptoErrorKind`], ...) carry the detail without allocating.
//!
//! Errors propagate to the caller unchanged; the library never retries
//! transparently and logging never affects what is returned.

use std::net::SocketAddr;
use std::time::Duration;

/// Result type alias using the library's [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;

/// Authentication error kinds (SNMPv3 USM).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    /// No authentication key available (keys not derived yet).
    NoAuthKey,
    /// HMAC verification failed (constant-time compare returned false).
    HmacMismatch,
    /// Authentication parameters have the wrong length for the protocol.
    WrongMacLength { expected: usize, actual: usize },
    /// Could not locate the authentication parameters in the message.
    AuthParamsNotFound,
    /// Inbound authenticated message but no auth protocol configured.
    NoAuthProtocol,
    /// Non-Report response carried a lower security level than the
    /// session requires.
    DowngradedSecurityLevel,
}

impl std::fmt::Display for AuthErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoAuthKey => write!(f, "no authentication key available"),
            Self::HmacMismatch => write!(f, "HMAC verification failed"),
            Self::WrongMacLength { expected, actual } => {
                write!(f, "wrong MAC length: expected {}, got {}", expected, actual)
            }
            Self::AuthParamsNotFound => write!(f, "could not locate auth params in message"),
            Self::NoAuthProtocol => {
                write!(f, "authenticated message but no auth protocol configured")
            }
            Self::DowngradedSecurityLevel => {
                write!(f, "response security level below the session's level")
            }
        }
    }
}

/// Cryptographic error kinds (privacy encryption/decryption).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoErrorKind {
    /// No privacy key available (keys not derived yet).
    NoPrivKey,
    /// Invalid key length for the cipher.
    InvalidKeyLength,
    /// Cipher init or operation failed.
    CipherError,
    /// privParameters field has the wrong length.
    InvalidPrivParamsLength { expected: usize, actual: usize },
    /// Ciphertext length is not a multiple of the cipher block size.
    InvalidCiphertextLength { length: usize, block_size: usize },
    /// Localized key material is shorter than the cipher requires.
    InsufficientKeyMaterial { required: usize, available: usize },
}

impl std::fmt::Display for CryptoErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoPrivKey => write!(f, "no privacy key available"),
            Self::InvalidKeyLength => write!(f, "invalid key length"),
            Self::CipherError => write!(f, "cipher operation failed"),
            Self::InvalidPrivParamsLength { expected, actual } => write!(
                f,
                "invalid privParameters length: expected {}, got {}",
                expected, actual
            ),
            Self::InvalidCiphertextLength { length, block_size } => write!(
                f,
                "ciphertext length {} not multiple of block size {}",
                length, block_size
            ),
            Self::InsufficientKeyMaterial {
                required,
                available,
            } => write!(
                f,
                "localized key too short: cipher needs {} bytes, have {}",
                required, available
            ),
        }
    }
}

/// BER decode error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeErrorKind {
    /// Expected a different tag.
    UnexpectedTag { expected: u8, actual: u8 },
    /// Data truncated unexpectedly.
    TruncatedData,
    /// Invalid BER length encoding.
    InvalidLength,
    /// Indefinite length form (0x80) is forbidden in SNMP.
    IndefiniteLength,
    /// Length field uses too many octets.
    LengthTooLong { octets: usize },
    /// Length exceeds the decoder's sanity cap.
    LengthExceedsMax { length: usize, max: usize },
    /// Integer value overflows its Rust representation.
    IntegerOverflow,
    /// Zero-length integer.
    ZeroLengthInteger,
    /// Integer64 encoded with too many bytes.
    Integer64TooLong { length: usize },
    /// Invalid OID encoding.
    InvalidOidEncoding,
    /// OID exceeds the RFC 2578 sub-identifier cap.
    OidTooLong { count: usize, max: usize },
    /// NULL with non-zero length.
    InvalidNull,
    /// Boolean with content length other than one.
    InvalidBoolean,
    /// IpAddress with content length other than four.
    InvalidIpAddressLength { length: usize },
    /// Opaque float/double wrapper with the wrong payload size.
    InvalidOpaqueFloat { length: usize },
    /// Unknown SNMP version.
    UnknownVersion(i32),
    /// Unknown PDU type tag.
    UnknownPduType(u8),
    /// Unknown msgSecurityModel.
    UnknownSecurityModel(i32),
    /// msgMaxSize below the RFC 3412 minimum (484 octets).
    MsgMaxSizeTooSmall { value: i32, minimum: i32 },
    /// Invalid msgFlags (privacy without authentication).
    InvalidMsgFlags,
    /// msgAuthoritativeEngineBoots or EngineTime is negative.
    NegativeEngineCounter(i32),
    /// Discovery response carried an empty engine ID.
    EmptyEngineId,
    /// Missing PDU in message.
    MissingPdu,
    /// Response carried no varbinds where at least one was expected.
    EmptyResponse,
    /// TLV extends past the end of data.
    TlvOverflow,
}

impl std::fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnexpectedTag { expected, actual } => {
                write!(f, "expected tag 0x{:02X}, got 0x{:02X}", expected, actual)
            }
            Self::TruncatedData => write!(f, "unexpected end of data"),
            Self::InvalidLength => write!(f, "invalid length encoding"),
            Self::IndefiniteLength => write!(f, "indefinite length encoding not supported"),
            Self::LengthTooLong { octets } => {
                write!(f, "length encoding too long ({} octets)", octets)
            }
            Self::LengthExceedsMax { length, max } => {
                write!(f, "length {} exceeds maximum {}", length, max)
            }
            Self::IntegerOverflow => write!(f, "integer overflow"),
            Self::ZeroLengthInteger => write!(f, "zero-length integer"),
            Self::Integer64TooLong { length } => write!(f, "integer64 too long: {} bytes", length),
            Self::InvalidOidEncoding => write!(f, "invalid OID encoding"),
            Self::OidTooLong { count, max } => {
                write!(f, "OID has {} arcs, exceeds maximum {}", count, max)
            }
            Self::InvalidNull => write!(f, "NULL with non-zero length"),
            Self::InvalidBoolean => write!(f, "BOOLEAN must have exactly one content byte"),
            Self::InvalidIpAddressLength { length } => {
                write!(f, "IP address must be 4 bytes, got {}", length)
            }
            Self::InvalidOpaqueFloat { length } => {
                write!(f, "opaque float wrapper with bad payload length {}", length)
            }
            Self::UnknownVersion(v) => write!(f, "unknown SNMP version: {}", v),
            Self::UnknownPduType(t) => write!(f, "unknown PDU type: 0x{:02X}", t),
            Self::UnknownSecurityModel(m) => write!(f, "unknown security model: {}", m),
            Self::MsgMaxSizeTooSmall { value, minimum } => {
                write!(f, "msgMaxSize {} below RFC 3412 minimum {}", value, minimum)
            }
            Self::InvalidMsgFlags => write!(f, "invalid msgFlags: privacy without authentication"),
            Self::NegativeEngineCounter(v) => {
                write!(f, "negative authoritative engine counter: {}", v)
            }
            Self::EmptyEngineId => write!(f, "discovery response carried an empty engine ID"),
            Self::MissingPdu => write!(f, "missing PDU in message"),
            Self::EmptyResponse => write!(f, "empty response"),
            Self::TlvOverflow => write!(f, "TLV extends past end of data"),
        }
    }
}

/// Encode-side error kinds (v3 assembly preconditions).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeErrorKind {
    /// V3 security is not configured on this client.
    NoSecurityConfig,
    /// Engine discovery has not completed.
    EngineNotDiscovered,
    /// Localized keys have not been derived.
    KeysNotDerived,
    /// No auth key available for an authenticated message.
    MissingAuthKey,
    /// No privacy key available for an encrypted message.
    NoPrivKey,
    /// Could not locate the MAC placeholder in the serialized message.
    MissingAuthParams,
}

impl std::fmt::Display for EncodeErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoSecurityConfig => write!(f, "V3 security config not set"),
            Self::EngineNotDiscovered => write!(f, "engine not discovered"),
            Self::KeysNotDerived => write!(f, "keys not derived"),
            Self::MissingAuthKey => write!(f, "auth key not available for encoding"),
            Self::NoPrivKey => write!(f, "privacy key not available"),
            Self::MissingAuthParams => {
                write!(f, "could not find auth params position in encoded message")
            }
        }
    }
}

/// OID validation error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OidErrorKind {
    /// An arc failed to parse as a non-negative integer.
    InvalidArc,
    /// First arc must be 0, 1, or 2.
    InvalidFirstArc(u32),
    /// Second arc too large for the first arc value.
    InvalidSecondArc { first: u32, second: u32 },
    /// BER requires at least two arcs.
    TooShort,
    /// OID has too many arcs.
    TooManyArcs { count: usize, max: usize },
}

impl std::fmt::Display for OidErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidArc => write!(f, "invalid arc value"),
            Self::InvalidFirstArc(v) => write!(f, "first arc must be 0, 1, or 2, got {}", v),
            Self::InvalidSecondArc { first, second } => {
                write!(f, "second arc {} too large for first arc {}", second, first)
            }
            Self::TooShort => write!(f, "OID must have at least 2 arcs"),
            Self::TooManyArcs { count, max } => {
                write!(f, "OID has {} arcs, exceeds maximum {}", count, max)
            }
        }
    }
}

/// SNMP protocol error status codes (RFC 3416).
///
/// Returned by agents in the error-status field of a Response PDU and
/// surfaced through [`Error::Snmp`]. Codes 0..=5 date from SNMPv1, the
/// rest were added for SET processing in SNMPv2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorStatus {
    NoError,
    TooBig,
    NoSuchName,
    BadValue,
    ReadOnly,
    GenErr,
    NoAccess,
    WrongType,
    WrongLength,
    WrongEncoding,
    WrongValue,
    NoCreation,
    InconsistentValue,
    ResourceUnavailable,
    CommitFailed,
    UndoFailed,
    AuthorizationError,
    NotWritable,
    InconsistentName,
    /// Unknown or future error status code.
    Unknown(i32),
}

impl ErrorStatus {
    /// Create from the raw status code.
    pub fn from_i32(value: i32) -> Self {
        match value {
            0 => Self::NoError,
            1 => Self::TooBig,
            2 => Self::NoSuchName,
            3 => Self::BadValue,
            4 => Self::ReadOnly,
            5 => Self::GenErr,
            6 => Self::NoAccess,
            7 => Self::WrongType,
            8 => Self::WrongLength,
            9 => Self::WrongEncoding,
            10 => Self::WrongValue,
            11 => Self::NoCreation,
            12 => Self::InconsistentValue,
            13 => Self::ResourceUnavailable,
            14 => Self::CommitFailed,
            15 => Self::UndoFailed,
            16 => Self::AuthorizationError,
            17 => Self::NotWritable,
            18 => Self::InconsistentName,
            other => Self::Unknown(other),
        }
    }

    /// Convert to the raw status code.
    pub fn as_i32(&self) -> i32 {
        match self {
            Self::NoError => 0,
            Self::TooBig => 1,
            Self::NoSuchName => 2,
            Self::BadValue => 3,
            Self::ReadOnly => 4,
            Self::GenErr => 5,
            Self::NoAccess => 6,
            Self::WrongType => 7,
            Self::WrongLength => 8,
            Self::WrongEncoding => 9,
            Self::WrongValue => 10,
            Self::NoCreation => 11,
            Self::InconsistentValue => 12,
            Self::ResourceUnavailable => 13,
            Self::CommitFailed => 14,
            Self::UndoFailed => 15,
            Self::AuthorizationError => 16,
            Self::NotWritable => 17,
            Self::InconsistentName => 18,
            Self::Unknown(code) => *code,
        }
    }
}

impl std::fmt::Display for ErrorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoError => write!(f, "noError"),
            Self::TooBig => write!(f, "tooBig"),
            Self::NoSuchName => write!(f, "noSuchName"),
            Self::BadValue => write!(f, "badValue"),
            Self::ReadOnly => write!(f, "readOnly"),
            Self::GenErr => write!(f, "genErr"),
            Self::NoAccess => write!(f, "noAccess"),
            Self::WrongType => write!(f, "wrongType"),
            Self::WrongLength => write!(f, "wrongLength"),
            Self::WrongEncoding => write!(f, "wrongEncoding"),
            Self::WrongValue => write!(f, "wrongValue"),
            Self::NoCreation => write!(f, "noCreation"),
            Self::InconsistentValue => write!(f, "inconsistentValue"),
            Self::ResourceUnavailable => write!(f, "resourceUnavailable"),
            Self::CommitFailed => write!(f, "commitFailed"),
            Self::UndoFailed => write!(f, "undoFailed"),
            Self::AuthorizationError => write!(f, "authorizationError"),
            Self::NotWritable => write!(f, "notWritable"),
            Self::InconsistentName => write!(f, "inconsistentName"),
            Self::Unknown(code) => write!(f, "unknown({})", code),
        }
    }
}

/// The main error type for all snmpkit operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// I/O error during network communication.
    #[error("I/O error{}: {source}", target.map(|t| format!(" communicating with {}", t)).unwrap_or_default())]
    Io {
        target: Option<SocketAddr>,
        #[source]
        source: std::io::Error,
    },

    /// No response arrived within the transport's timeout.
    #[error("timeout after {elapsed:?}{}", target.map(|t| format!(" waiting for {}", t)).unwrap_or_default())]
    Timeout {
        target: Option<SocketAddr>,
        elapsed: Duration,
    },

    /// SNMP protocol error returned by the agent.
    #[error("SNMP error{}: {status} at index {index}", target.map(|t| format!(" from {}", t)).unwrap_or_default())]
    Snmp {
        target: Option<SocketAddr>,
        status: ErrorStatus,
        index: u32,
        oid: Option<crate::oid::Oid>,
    },

    /// Invalid OID.
    #[error("invalid OID{}: {kind}", input.as_deref().map(|s| format!(" {:?}", s)).unwrap_or_default())]
    InvalidOid {
        kind: OidErrorKind,
        // Only allocated when parsing string input
        input: Option<Box<str>>,
    },

    /// BER decoding error.
    #[error("decode error at offset {offset}: {kind}")]
    Decode {
        offset: usize,
        kind: DecodeErrorKind,
    },

    /// Message assembly error.
    #[error("encode error: {kind}")]
    Encode { kind: EncodeErrorKind },

    /// Response request ID does not match the request.
    #[error("request ID mismatch: expected {expected}, got {actual}")]
    RequestIdMismatch { expected: i32, actual: i32 },

    /// Response carried an unexpected PDU type.
    #[error("unexpected PDU type: {actual}")]
    UnexpectedPduType { actual: crate::pdu::PduType },

    /// Agent reported usmStatsUnknownEngineIDs (SNMPv3).
    #[error("unknown engine ID")]
    UnknownEngineId { target: Option<SocketAddr> },

    /// Agent reported usmStatsNotInTimeWindows (SNMPv3). The session has
    /// already absorbed the agent's boots/time, so a caller retry will be
    /// inside the window.
    #[error("message not in time window")]
    NotInTimeWindow { target: Option<SocketAddr> },

    /// Authentication failed (SNMPv3).
    #[error("authentication failed: {kind}")]
    AuthenticationFailed {
        target: Option<SocketAddr>,
        kind: AuthErrorKind,
    },

    /// Decryption failed (SNMPv3).
    #[error("decryption failed: {kind}")]
    DecryptionFailed {
        target: Option<SocketAddr>,
        kind: CryptoErrorKind,
    },

    /// Encryption failed (SNMPv3).
    #[error("encryption failed: {kind}")]
    EncryptionFailed {
        target: Option<SocketAddr>,
        kind: CryptoErrorKind,
    },

    /// Walk received an OID that is not strictly greater than the request
    /// start, which would loop forever against a misbehaving agent.
    /// Suppressed by the `"c"` application option.
    #[error("OID not increasing: {previous} >= {current}")]
    NonIncreasingOid {
        previous: crate::oid::Oid,
        current: crate::oid::Oid,
    },

    /// GETBULK requested with an SNMPv1 client.
    #[error("GETBULK is not supported in SNMPv1")]
    GetBulkNotSupportedInV1,

    /// Invalid client configuration (missing passphrase for a declared
    /// protocol, missing username, privacy without authentication).
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a decode error.
    pub fn decode(offset: usize, kind: DecodeErrorKind) -> Self {
        Self::Decode { offset, kind }
    }

    /// Create an encode error.
    pub fn encode(kind: EncodeErrorKind) -> Self {
        Self::Encode { kind }
    }

    /// Create an authentication error.
    pub fn auth(target: Option<SocketAddr>, kind: AuthErrorKind) -> Self {
        Self::AuthenticationFailed { target, kind }
    }

    /// Create a decryption error.
    pub fn decrypt(target: Option<SocketAddr>, kind: CryptoErrorKind) -> Self {
        Self::DecryptionFailed { target, kind }
    }

    /// Create an encryption error.
    pub fn encrypt(target: Option<SocketAddr>, kind: CryptoErrorKind) -> Self {
        Self::EncryptionFailed { target, kind }
    }

    /// Create an invalid OID error.
    pub fn invalid_oid(kind: OidErrorKind) -> Self {
        Self::InvalidOid { kind, input: None }
    }

    /// Create an invalid OID error carrying the input string that failed.
    pub fn invalid_oid_with_input(kind: OidErrorKind, input: impl Into<Box<str>>) -> Self {
        Self::InvalidOid {
            kind,
            input: Some(input.into()),
        }
    }

    /// Get the target address if this error carries one.
    pub fn target(&self) -> Option<SocketAddr> {
        match self {
            Self::Io { target, .. }
            | Self::Timeout { target, .. }
            | Self::Snmp { target, .. }
            | Self::UnknownEngineId { target }
            | Self::NotInTimeWindow { target }
            | Self::AuthenticationFailed { target, .. }
            | Self::DecryptionFailed { target, .. }
            | Self::EncryptionFailed { target, .. } => *target,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_roundtrip() {
        for code in 0..=18 {
            let status = ErrorStatus::from_i32(code);
            assert_eq!(status.as_i32(), code);
        }
        assert_eq!(ErrorStatus::from_i32(99), ErrorStatus::Unknown(99));
        assert_eq!(ErrorStatus::Unknown(99).as_i32(), 99);
    }

    #[test]
    fn test_error_target_extraction() {
        let addr: SocketAddr = "192.0.2.1:161".parse().unwrap();
        let err = Error::Timeout {
            target: Some(addr),
            elapsed: Duration::from_secs(5),
        };
        assert_eq!(err.target(), Some(addr));

        let err = Error::decode(3, DecodeErrorKind::TruncatedData);
        assert_eq!(err.target(), None);
    }

    #[test]
    fn test_display_messages() {
        let err = Error::decode(
            7,
            DecodeErrorKind::UnexpectedTag {
                expected: 0x30,
                actual: 0x04,
            },
        );
        assert_eq!(
            err.to_string(),
            "decode error at offset 7: expected tag 0x30, got 0x04"
        );

        let err = Error::DecryptionFailed {
            target: None,
            kind: CryptoErrorKind::InvalidCiphertextLength {
                length: 9,
                block_size: 8,
            },
        };
        assert_eq!(
            err.to_string(),
            "decryption failed: ciphertext length 9 not multiple of block size 8"
        );
    }
}
