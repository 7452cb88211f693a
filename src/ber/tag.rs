//! BER tag definitions for SNMP.
//!
//! Tag encoding follows X.690 Section 8.1.2:
//! - Bits 7-6: Class (00=Universal, 01=Application, 10=Context-specific)
//! - Bit 5: Primitive (0) or Constructed (1)
//! - Bits 4-0: Tag number

/// Tag class bits (bits 7-6).
pub mod class {
    pub const UNIVERSAL: u8 = 0x00;
    pub const APPLICATION: u8 = 0x40;
    pub const CONTEXT_SPECIFIC: u8 = 0x80;
    pub const PRIVATE: u8 = 0xC0;
}

/// Constructed bit (bit 5).
pub const CONSTRUCTED: u8 = 0x20;

/// Universal tags.
pub mod universal {
    pub const BOOLEAN: u8 = 0x01;
    pub const INTEGER: u8 = 0x02;
    pub const BIT_STRING: u8 = 0x03;
    pub const OCTET_STRING: u8 = 0x04;
    pub const NULL: u8 = 0x05;
    pub const OBJECT_IDENTIFIER: u8 = 0x06;
    pub const SEQUENCE: u8 = 0x30; // Constructed
}

/// Application tags (SNMP SMI types, RFC 2578).
pub mod application {
    pub const IP_ADDRESS: u8 = 0x40;
    pub const COUNTER32: u8 = 0x41;
    pub const GAUGE32: u8 = 0x42; // Also Unsigned32
    pub const TIMETICKS: u8 = 0x43;
    pub const OPAQUE: u8 = 0x44;
    pub const COUNTER64: u8 = 0x46;
    pub const UINTEGER32: u8 = 0x47;
}

/// Context-specific tags: varbind exception values (SNMPv2+).
pub mod context {
    pub const NO_SUCH_OBJECT: u8 = 0x80;
    pub const NO_SUCH_INSTANCE: u8 = 0x81;
    pub const END_OF_MIB_VIEW: u8 = 0x82;
}

/// Opaque-wrapped special types. A float or double travels inside an
/// Opaque as `0x9F <subtag> <len> <big-endian IEEE 754>`.
pub mod opaque_special {
    /// Leading marker byte of the embedded TLV.
    pub const MARKER: u8 = 0x9F;
    pub const FLOAT: u8 = 0x78;
    pub const DOUBLE: u8 = 0x79;
}

/// PDU tags (context-specific, constructed).
pub mod pdu {
    use super::class::CONTEXT_SPECIFIC;
    use super::CONSTRUCTED;

    pub const GET_REQUEST: u8 = CONTEXT_SPECIFIC | CONSTRUCTED; // 0xA0
    pub const GET_NEXT_REQUEST: u8 = CONTEXT_SPECIFIC | CONSTRUCTED | 0x01; // 0xA1
    pub const RESPONSE: u8 = CONTEXT_SPECIFIC | CONSTRUCTED | 0x02; // 0xA2
    pub const SET_REQUEST: u8 = CONTEXT_SPECIFIC | CONSTRUCTED | 0x03; // 0xA3
    pub const TRAP_V1: u8 = CONTEXT_SPECIFIC | CONSTRUCTED | 0x04; // 0xA4
    pub const GET_BULK_REQUEST: u8 = CONTEXT_SPECIFIC | CONSTRUCTED | 0x05; // 0xA5
    pub const INFORM_REQUEST: u8 = CONTEXT_SPECIFIC | CONSTRUCTED | 0x06; // 0xA6
    pub const TRAP_V2: u8 = CONTEXT_SPECIFIC | CONSTRUCTED | 0x07; // 0xA7
    pub const REPORT: u8 = CONTEXT_SPECIFIC | CONSTRUCTED | 0x08; // 0xA8
}

/// Check if a tag indicates a constructed type.
#[inline]
pub const fn is_constructed(tag: u8) -> bool {
    tag & CONSTRUCTED != 0
}

/// Get the class bits of a tag.
#[inline]
pub const fn tag_class(tag: u8) -> u8 {
    tag & 0xC0
}
