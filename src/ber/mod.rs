//! BER (Basic Encoding Rules) codec for SNMP.
//!
//! Encoding uses a reverse buffer ([`EncodeBuf`]) so constructed lengths
//! never need to be pre-computed; decoding ([`Decoder`]) is zero-copy over
//! `Bytes` with every read bounds-checked. Parsing is permissive where
//! net-snmp is permissive (non-minimal integers and lengths are accepted)
//! and strict where SNMP demands it (indefinite lengths are rejected).

mod decode;
mod encode;
mod length;
pub mod tag;

pub use decode::Decoder;
pub use encode::EncodeBuf;
pub use length::{decode_length, encode_length, MAX_LENGTH};
