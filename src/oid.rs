//! Object Identifier (OID) type.
//!
//! OIDs are stored as `SmallVec<[u32; 16]>` so common MIB-2 names never
//! touch the heap.

use crate::error::{DecodeErrorKind, Error, OidErrorKind, Result};
use smallvec::SmallVec;
use std::fmt;

/// Maximum number of arcs (sub-identifiers) allowed in an OID.
///
/// Per RFC 2578 Section 3.5 there are at most 128 sub-identifiers in a
/// value; enforcing it at decode time bounds what a hostile packet can
/// make us allocate.
pub const MAX_OID_LEN: usize = 128;

/// Object Identifier.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Oid {
    arcs: SmallVec<[u32; 16]>,
}

impl Oid {
    /// Create an empty OID.
    pub fn empty() -> Self {
        Self {
            arcs: SmallVec::new(),
        }
    }

    /// Create an OID from arc values.
    ///
    /// # Examples
    ///
    /// ```
    /// use snmpkit::oid::Oid;
    ///
    /// let oid = Oid::new(vec![1, 3, 6, 1, 2, 1]);
    /// assert_eq!(oid.arcs(), &[1, 3, 6, 1, 2, 1]);
    /// ```
    pub fn new(arcs: impl IntoIterator<Item = u32>) -> Self {
        Self {
            arcs: arcs.into_iter().collect(),
        }
    }

    /// Create an OID from a slice of arcs.
    pub fn from_slice(arcs: &[u32]) -> Self {
        Self {
            arcs: SmallVec::from_slice(arcs),
        }
    }

    /// Parse an OID from dotted notation (e.g. `"1.3.6.1.2.1.1.1.0"`).
    ///
    /// A leading dot is accepted (`".1.3.6.1"`), matching the canonical
    /// textual form used by net-snmp tooling.
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() || s == "." {
            return Ok(Self::empty());
        }

        let mut arcs = SmallVec::new();
        for part in s.split('.') {
            if part.is_empty() {
                continue;
            }
            let arc: u32 = part.parse().map_err(|_| {
                Error::invalid_oid_with_input(OidErrorKind::InvalidArc, s.to_string())
            })?;
            arcs.push(arc);
        }

        Ok(Self { arcs })
    }

    /// Get the arc values.
    pub fn arcs(&self) -> &[u32] {
        &self.arcs
    }

    /// Number of arcs.
    pub fn len(&self) -> usize {
        self.arcs.len()
    }

    /// Check if the OID has no arcs.
    pub fn is_empty(&self) -> bool {
        self.arcs.is_empty()
    }

    /// Check if this OID starts with `other`.
    ///
    /// An OID always starts with itself and with the empty OID.
    pub fn starts_with(&self, other: &Oid) -> bool {
        self.arcs.len() >= other.arcs.len() && self.arcs[..other.arcs.len()] == other.arcs[..]
    }

    /// Check if this OID is a strict descendant of `root`, i.e. its
    /// textual form is prefixed by `root` plus a dot.
    pub fn is_descendant_of(&self, root: &Oid) -> bool {
        self.arcs.len() > root.arcs.len() && self.starts_with(root)
    }

    /// Create a child OID by appending one arc.
    pub fn child(&self, arc: u32) -> Oid {
        let mut arcs = self.arcs.clone();
        arcs.push(arc);
        Oid { arcs }
    }

    /// Get the parent OID (all arcs except the last).
    pub fn parent(&self) -> Option<Oid> {
        if self.arcs.is_empty() {
            None
        } else {
            Some(Oid {
                arcs: SmallVec::from_slice(&self.arcs[..self.arcs.len() - 1]),
            })
        }
    }

    /// Validate arc constraints per X.690 Section 8.19.4.
    ///
    /// BER needs at least two arcs, arc1 must be 0, 1, or 2, and arc2
    /// must be <= 39 when arc1 is 0 or 1.
    pub fn validate(&self) -> Result<()> {
        if self.arcs.len() < 2 {
            return Err(Error::invalid_oid(OidErrorKind::TooShort));
        }

        let arc1 = self.arcs[0];
        if arc1 > 2 {
            return Err(Error::invalid_oid(OidErrorKind::InvalidFirstArc(arc1)));
        }

        let arc2 = self.arcs[1];
        if arc1 < 2 && arc2 >= 40 {
            return Err(Error::invalid_oid(OidErrorKind::InvalidSecondArc {
                first: arc1,
                second: arc2,
            }));
        }

        if self.arcs.len() > MAX_OID_LEN {
            return Err(Error::invalid_oid(OidErrorKind::TooManyArcs {
                count: self.arcs.len(),
                max: MAX_OID_LEN,
            }));
        }

        Ok(())
    }

    /// Encode to BER into a stack-allocated buffer.
    ///
    /// X.690 Section 8.19: the first two arcs pack into one
    /// sub-identifier as `40*arc1 + arc2`, every sub-identifier is
    /// base-128 with the continuation bit on all but the last byte.
    pub fn to_ber_smallvec(&self) -> SmallVec<[u8; 64]> {
        let mut bytes = SmallVec::new();

        if self.arcs.is_empty() {
            return bytes;
        }

        let first_subid = if self.arcs.len() >= 2 {
            self.arcs[0] * 40 + self.arcs[1]
        } else {
            self.arcs[0] * 40
        };
        encode_subidentifier(&mut bytes, first_subid);

        for &arc in self.arcs.iter().skip(2) {
            encode_subidentifier(&mut bytes, arc);
        }

        bytes
    }

    /// Encode to BER.
    pub fn to_ber(&self) -> Vec<u8> {
        self.to_ber_smallvec().to_vec()
    }

    /// Decode from BER content bytes.
    ///
    /// Fails on empty input, on a continuation chain that runs past the
    /// end of the content, and on non-canonical 0x80 padding at the start
    /// of a sub-identifier. Enforces [`MAX_OID_LEN`].
    pub fn from_ber(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::decode(0, DecodeErrorKind::InvalidOidEncoding));
        }

        let mut arcs = SmallVec::new();

        let (first_subid, consumed) = decode_subidentifier(data, 0)?;
        if first_subid < 40 {
            arcs.push(0);
            arcs.push(first_subid);
        } else if first_subid < 80 {
            arcs.push(1);
            arcs.push(first_subid - 40);
        } else {
            arcs.push(2);
            arcs.push(first_subid - 80);
        }

        let mut i = consumed;
        while i < data.len() {
            let (arc, consumed) = decode_subidentifier(data, i)?;
            arcs.push(arc);
            i += consumed;

            if arcs.len() > MAX_OID_LEN {
                return Err(Error::decode(
                    i,
                    DecodeErrorKind::OidTooLong {
                        count: arcs.len(),
                        max: MAX_OID_LEN,
                    },
                ));
            }
        }

        Ok(Self { arcs })
    }
}

/// Encode a sub-identifier in base-128.
#[inline]
fn encode_subidentifier(bytes: &mut SmallVec<[u8; 64]>, value: u32) {
    if value == 0 {
        bytes.push(0);
        return;
    }

    let mut temp = value;
    let mut count = 0;
    while temp > 0 {
        count += 1;
        temp >>= 7;
    }

    for i in (0..count).rev() {
        let mut byte = ((value >> (i * 7)) & 0x7F) as u8;
        if i > 0 {
            byte |= 0x80;
        }
        bytes.push(byte);
    }
}

/// Decode one base-128 sub-identifier starting at `data[start]`,
/// returning `(value, bytes_consumed)`.
fn decode_subidentifier(data: &[u8], start: usize) -> Result<(u32, usize)> {
    // A leading 0x80 is non-canonical zero padding
    if data[start] == 0x80 {
        return Err(Error::decode(start, DecodeErrorKind::InvalidOidEncoding));
    }

    let mut value: u32 = 0;
    let mut i = start;
    loop {
        let byte = match data.get(i) {
            Some(b) => *b,
            // Continuation chain overruns the content length
            None => return Err(Error::decode(i, DecodeErrorKind::InvalidOidEncoding)),
        };
        i += 1;

        if value > (u32::MAX >> 7) {
            return Err(Error::decode(i, DecodeErrorKind::IntegerOverflow));
        }
        value = (value << 7) | ((byte & 0x7F) as u32);

        if byte & 0x80 == 0 {
            break;
        }
    }

    Ok((value, i - start))
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({})", self)
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for arc in &self.arcs {
            if !first {
                write!(f, ".")?;
            }
            write!(f, "{}", arc)?;
            first = false;
        }
        Ok(())
    }
}

impl std::str::FromStr for Oid {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<&[u32]> for Oid {
    fn from(arcs: &[u32]) -> Self {
        Self::from_slice(arcs)
    }
}

impl<const N: usize> From<[u32; N]> for Oid {
    fn from(arcs: [u32; N]) -> Self {
        Self::new(arcs)
    }
}

impl PartialOrd for Oid {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Oid {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.arcs.cmp(&other.arcs)
    }
}

/// Macro to create an OID from literal arcs.
///
/// # Examples
///
/// ```
/// use snmpkit::oid;
///
/// let sys_descr = oid!(1, 3, 6, 1, 2, 1, 1, 1, 0);
/// assert_eq!(sys_descr.to_string(), "1.3.6.1.2.1.1.1.0");
/// ```
#[macro_export]
macro_rules! oid {
    ($($arc:expr),* $(,)?) => {
        $crate::oid::Oid::from_slice(&[$($arc),*])
    };
}
