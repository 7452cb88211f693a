//! BER encoding.
//!
//! [`EncodeBuf`] writes a message back-to-front: content goes in first,
//! then its length header, then its tag. Constructed types therefore
//! never need their length pre-computed, and the only data movement is
//! one `reverse()` when the buffer is finished.
//!
//! Because the buffer is reversed at the end, multi-byte content is
//! pushed least-significant-first and composite structures are pushed
//! in reverse field order.

use super::length::encode_length;
use super::tag;
use bytes::Bytes;

/// Buffer for BER encoding that writes backwards.
pub struct EncodeBuf {
    buf: Vec<u8>,
}

impl EncodeBuf {
    /// Create an encode buffer with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(512)
    }

    /// Create an encode buffer with the given capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Push one byte; it will precede everything pushed before it in
    /// the final output.
    pub fn push_byte(&mut self, byte: u8) {
        self.buf.push(byte);
    }

    /// Push a slice so that it appears in its given order in the final
    /// output.
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend(bytes.iter().rev().copied());
    }

    /// Push a length header for `len` content bytes.
    pub fn push_length(&mut self, len: usize) {
        // encode_length already emits its bytes in push order
        let (bytes, count) = encode_length(len);
        self.buf.extend_from_slice(&bytes[..count]);
    }

    /// Push a tag byte.
    pub fn push_tag(&mut self, tag: u8) {
        self.buf.push(tag);
    }

    /// Number of bytes encoded so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Check if nothing has been encoded yet.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Encode a constructed type (SEQUENCE, PDU, ...).
    ///
    /// The closure encodes the content, in reverse field order; the
    /// header is prepended once the content size is known.
    pub fn push_constructed<F>(&mut self, tag: u8, f: F)
    where
        F: FnOnce(&mut Self),
    {
        let before = self.buf.len();
        f(self);
        let content_len = self.buf.len() - before;
        self.push_length(content_len);
        self.push_tag(tag);
    }

    /// Encode a SEQUENCE.
    pub fn push_sequence<F>(&mut self, f: F)
    where
        F: FnOnce(&mut Self),
    {
        self.push_constructed(tag::universal::SEQUENCE, f);
    }

    /// Encode an INTEGER in minimal two's-complement form.
    pub fn push_integer(&mut self, value: i32) {
        self.push_integer64(value as i64);
    }

    /// Encode a 64-bit INTEGER in minimal two's-complement form.
    pub fn push_integer64(&mut self, value: i64) {
        let len = twos_complement_len(value);
        self.push_le_bytes(value as u64, len);
        self.push_length(len);
        self.push_tag(tag::universal::INTEGER);
    }

    /// Encode an unsigned 32-bit value under an application tag
    /// (Counter32, Gauge32, TimeTicks, Uinteger32) or as the
    /// non-negative INTEGERs of USM security parameters.
    pub fn push_unsigned32(&mut self, tag: u8, value: u32) {
        // Fits in i64, so the signed minimal form is also the unsigned
        // one, sign pad included
        let len = twos_complement_len(value as i64);
        self.push_le_bytes(value as u64, len);
        self.push_length(len);
        self.push_tag(tag);
    }

    /// Encode an unsigned 64-bit value under an application tag
    /// (Counter64).
    pub fn push_unsigned64(&mut self, tag: u8, value: u64) {
        let len = if value >> 63 != 0 {
            // Top bit set: all eight bytes plus a 0x00 sign pad
            self.push_le_bytes(value, 8);
            self.buf.push(0x00);
            9
        } else {
            let len = twos_complement_len(value as i64);
            self.push_le_bytes(value, len);
            len
        };
        self.push_length(len);
        self.push_tag(tag);
    }

    /// Encode an OCTET STRING.
    pub fn push_octet_string(&mut self, data: &[u8]) {
        self.push_bytes(data);
        self.push_length(data.len());
        self.push_tag(tag::universal::OCTET_STRING);
    }

    /// Encode a NULL.
    pub fn push_null(&mut self) {
        self.push_length(0);
        self.push_tag(tag::universal::NULL);
    }

    /// Encode an OBJECT IDENTIFIER.
    pub fn push_oid(&mut self, oid: &crate::oid::Oid) {
        let ber = oid.to_ber_smallvec();
        self.push_bytes(&ber);
        self.push_length(ber.len());
        self.push_tag(tag::universal::OBJECT_IDENTIFIER);
    }

    /// Encode an IpAddress.
    pub fn push_ip_address(&mut self, addr: [u8; 4]) {
        self.push_bytes(&addr);
        self.push_length(4);
        self.push_tag(tag::application::IP_ADDRESS);
    }

    /// Push the low `len` bytes of `value`, least significant first, so
    /// the finished output reads big-endian.
    fn push_le_bytes(&mut self, value: u64, len: usize) {
        for shift in 0..len {
            self.buf.push((value >> (8 * shift)) as u8);
        }
    }

    /// Finalize and return the encoded bytes.
    pub fn finish(self) -> Bytes {
        Bytes::from(self.finish_vec())
    }

    /// Finalize and return a `Vec<u8>`.
    pub fn finish_vec(mut self) -> Vec<u8> {
        self.buf.reverse();
        self.buf
    }
}

impl Default for EncodeBuf {
    fn default() -> Self {
        Self::new()
    }
}

/// Minimal two's-complement width of `value` in bytes.
///
/// All but one of the leading sign bits are redundant, so the value
/// needs `64 - sign_bits + 1` bits, rounded up to whole bytes. Zero
/// still takes one byte.
fn twos_complement_len(value: i64) -> usize {
    let sign_bits = if value < 0 {
        value.leading_ones()
    } else {
        value.leading_zeros()
    } as usize;
    (64 - sign_bits + 8) / 8
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Encode through a closure and return the finished wire bytes.
    fn emit(f: impl FnOnce(&mut EncodeBuf)) -> Vec<u8> {
        let mut buf = EncodeBuf::new();
        f(&mut buf);
        buf.finish_vec()
    }

    #[test]
    fn test_twos_complement_len_boundaries() {
        // Positive widths grow at 2^(8n-1)
        assert_eq!(twos_complement_len(0), 1);
        assert_eq!(twos_complement_len(127), 1);
        assert_eq!(twos_complement_len(128), 2);
        assert_eq!(twos_complement_len(32767), 2);
        assert_eq!(twos_complement_len(32768), 3);
        assert_eq!(twos_complement_len(i64::MAX), 8);

        // Negative widths grow at -2^(8n-1) - 1
        assert_eq!(twos_complement_len(-1), 1);
        assert_eq!(twos_complement_len(-128), 1);
        assert_eq!(twos_complement_len(-129), 2);
        assert_eq!(twos_complement_len(-32768), 2);
        assert_eq!(twos_complement_len(-32769), 3);
        assert_eq!(twos_complement_len(i64::MIN), 8);
    }

    #[test]
    fn test_integer_tlvs() {
        assert_eq!(emit(|b| b.push_integer(0)), [0x02, 0x01, 0x00]);
        assert_eq!(emit(|b| b.push_integer(42)), [0x02, 0x01, 0x2A]);
        // 255 keeps a sign pad to stay positive
        assert_eq!(emit(|b| b.push_integer(255)), [0x02, 0x02, 0x00, 0xFF]);
        assert_eq!(emit(|b| b.push_integer(0x1234)), [0x02, 0x02, 0x12, 0x34]);
        assert_eq!(emit(|b| b.push_integer(-1)), [0x02, 0x01, 0xFF]);
        assert_eq!(emit(|b| b.push_integer(-32768)), [0x02, 0x02, 0x80, 0x00]);
        assert_eq!(
            emit(|b| b.push_integer(i32::MIN)),
            [0x02, 0x04, 0x80, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn test_integer64_tlvs() {
        assert_eq!(
            emit(|b| b.push_integer64(i64::MIN)),
            [0x02, 0x08, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]
        );
        assert_eq!(
            emit(|b| b.push_integer64(i64::MAX)),
            [0x02, 0x08, 0x7F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]
        );
    }

    #[test]
    fn test_unsigned32_sign_pad() {
        assert_eq!(emit(|b| b.push_unsigned32(0x41, 0)), [0x41, 0x01, 0x00]);
        assert_eq!(emit(|b| b.push_unsigned32(0x41, 127)), [0x41, 0x01, 0x7F]);
        // 128 has its top content bit set, so a pad byte keeps it
        // unsigned on the wire
        assert_eq!(
            emit(|b| b.push_unsigned32(0x41, 128)),
            [0x41, 0x02, 0x00, 0x80]
        );
        assert_eq!(
            emit(|b| b.push_unsigned32(0x43, u32::MAX)),
            [0x43, 0x05, 0x00, 0xFF, 0xFF, 0xFF, 0xFF]
        );
    }

    #[test]
    fn test_unsigned64_sign_pad() {
        assert_eq!(emit(|b| b.push_unsigned64(0x46, 0)), [0x46, 0x01, 0x00]);
        assert_eq!(
            emit(|b| b.push_unsigned64(0x46, 1 << 62)),
            [0x46, 0x08, 0x40, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]
        );
        // The full 64-bit range needs the ninth pad byte
        assert_eq!(
            emit(|b| b.push_unsigned64(0x46, u64::MAX)),
            [0x46, 0x09, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]
        );
    }

    #[test]
    fn test_nested_constructed() {
        // SEQUENCE { OCTET STRING "hi", SEQUENCE { NULL } }
        let wire = emit(|b| {
            b.push_sequence(|b| {
                b.push_sequence(|b| b.push_null());
                b.push_octet_string(b"hi");
            })
        });
        assert_eq!(
            wire,
            [0x30, 0x08, 0x04, 0x02, b'h', b'i', 0x30, 0x02, 0x05, 0x00]
        );
    }

    #[test]
    fn test_long_form_header() {
        let payload = [0xAB; 200];
        let wire = emit(|b| b.push_octet_string(&payload));
        assert_eq!(&wire[..3], [0x04, 0x81, 200]);
        assert_eq!(&wire[3..], payload);
    }

    #[test]
    fn test_ip_address() {
        assert_eq!(
            emit(|b| b.push_ip_address([192, 0, 2, 1])),
            [0x40, 0x04, 192, 0, 2, 1]
        );
    }

    #[test]
    fn test_oid_agrees_with_oid_codec() {
        let oid = crate::oid!(1, 3, 6, 1, 2, 1, 1, 1, 0);
        let wire = emit(|b| b.push_oid(&oid));
        assert_eq!(wire[0], 0x06);
        assert_eq!(wire[1] as usize, oid.to_ber().len());
        assert_eq!(&wire[2..], &oid.to_ber()[..]);
    }
}
