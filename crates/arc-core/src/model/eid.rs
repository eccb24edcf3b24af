//! 192-bit entity identifiers.
//!
//! An [`Eid`] is three unsigned 64-bit words in big-endian significance
//! `[w0, w1, w2]`. Two flavors exist:
//!
//! - **time-derived** ([`crate::model::EidGenerator`]): `w0` holds signed
//!   Unix seconds shifted left 16 bits plus the top 16 fractional-second
//!   bits; `w1` continues the fraction and carries entropy in its low bits;
//!   `w2` is entropy.
//! - **literal-derived** ([`Eid::from_literal`]): `w0` is always zero and
//!   `w1`/`w2` are a 128-bit content hash.
//!
//! Comparison is lexicographic over the words, which is also log order.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::codec::primitives::{zigzag_decode, zigzag_encode};
use crate::error::EidError;
use crate::limits::EID_LEN;
use crate::model::tag::is_tag_separator;
use crate::util::base32;

/// Entropy bit mask for `w1`: slightly finer than 1 ns of resolution.
pub const ENTROPY_MASK: u64 = 0x3_FFFF_FFFF;

/// `2^64 / 1e9`: spreads nanoseconds over a 64-bit fraction.
pub const NANOSEC_STEP: u64 = 0x4_4B82_FA1C;

/// A 24-byte, order-preserving storage key.
pub type Key24 = [u8; 24];

/// A 16-byte storage key holding only `w1` and `w2`.
pub type Key16 = [u8; 16];

/// A 192-bit entity identifier `[w0, w1, w2]`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Eid(pub [u64; 3]);

impl Eid {
    /// The canonical "no id" value.
    pub const NIL: Eid = Eid([0, 0, 0]);

    /// Reserved wildcard value.
    pub const WILDCARD: Eid = Eid([1, 1, 1]);

    /// Tolerance used by the monotonicity contract: later ids are never
    /// less than `prev.sub(EPSILON)`.
    pub const EPSILON: Eid = Eid([0, ENTROPY_MASK, 0]);

    /// Forms an id explicitly from its words.
    #[inline]
    pub const fn new(w0: u64, w1: u64, w2: u64) -> Self {
        Eid([w0, w1, w2])
    }

    /// Forms an id from a signed time word and two raw words.
    #[inline]
    pub const fn from_ints(x0: i64, x1: u64, x2: u64) -> Self {
        Eid([x0 as u64, x1, x2])
    }

    /// Derives an id from literal bytes.
    ///
    /// `w0` is zero, `w1`/`w2` are the first 128 bits of SHA-256. Pure and
    /// deterministic.
    pub fn from_literal(literal: &[u8]) -> Self {
        let hash = Sha256::digest(literal);
        let mut w1 = [0u8; 8];
        let mut w2 = [0u8; 8];
        w1.copy_from_slice(&hash[0..8]);
        w2.copy_from_slice(&hash[8..16]);
        Eid([0, u64::from_be_bytes(w1), u64::from_be_bytes(w2)])
    }

    /// Derives an id from a single tag token.
    #[inline]
    pub fn from_token(token: &str) -> Self {
        Self::from_literal(token.as_bytes())
    }

    /// Derives an id from text after stripping every tag separator.
    ///
    /// `"a.b"` and `"a b"` and `"ab"` all yield the same id.
    pub fn from_string(unclean: &str) -> Self {
        let cleaned: String = unclean.chars().filter(|c| !is_tag_separator(*c)).collect();
        Self::from_literal(cleaned.as_bytes())
    }

    /// Forms a time-derived id without entropy.
    ///
    /// Nanoseconds are spread over a 64-bit fraction: its top 16 bits
    /// land in the low bits of `w0` and the rest in the top of `w1`.
    pub fn from_unix_parts(secs: i64, nanos: u32) -> Self {
        let frac = (nanos as u64).wrapping_mul(NANOSEC_STEP);
        Eid([((secs as u64) << 16) | (frac >> 48), frac << 16, 0])
    }

    #[inline]
    pub const fn is_nil(&self) -> bool {
        self.0[0] == 0 && self.0[1] == 0 && self.0[2] == 0
    }

    #[inline]
    pub const fn is_set(&self) -> bool {
        !self.is_nil()
    }

    #[inline]
    pub const fn is_wildcard(&self) -> bool {
        self.0[0] == 1 && self.0[1] == 1 && self.0[2] == 1
    }

    /// Returns true for `NIL` or `WILDCARD`.
    #[inline]
    pub const fn is_sentinel(&self) -> bool {
        self.is_nil() || self.is_wildcard()
    }

    /// Rejects the reserved sentinel values.
    pub fn ensure_live(self) -> Result<Self, EidError> {
        if self.is_sentinel() {
            Err(EidError::InvalidSentinel { id: self })
        } else {
            Ok(self)
        }
    }

    /// True when `w0` is zero, i.e. the id came from a literal hash.
    #[inline]
    pub const fn is_literal(&self) -> bool {
        self.0[0] == 0
    }

    // =========================================================================
    // Combination
    // =========================================================================

    /// Commutative, associative combination: word-wise wrapping add.
    ///
    /// Tag literals folded in any order produce the same id.
    #[inline]
    pub const fn fold(self, other: Eid) -> Eid {
        Eid([
            self.0[0].wrapping_add(other.0[0]),
            self.0[1].wrapping_add(other.0[1]),
            self.0[2].wrapping_add(other.0[2]),
        ])
    }

    /// Non-commutative combination: word-wise wrapping subtract.
    ///
    /// Used to derive a dependent id from a parent in a fixed direction.
    #[inline]
    pub const fn sequence(self, other: Eid) -> Eid {
        Eid([
            self.0[0].wrapping_sub(other.0[0]),
            self.0[1].wrapping_sub(other.0[1]),
            self.0[2].wrapping_sub(other.0[2]),
        ])
    }

    /// Ordered addition: carries from `w2` into `w1`, never into `w0`.
    ///
    /// `w0` is the signed time field and is only ever added word-wise.
    pub const fn add(self, other: Eid) -> Eid {
        let (w2, carry) = self.0[2].overflowing_add(other.0[2]);
        let w1 = self.0[1].wrapping_add(other.0[1]).wrapping_add(carry as u64);
        Eid([self.0[0].wrapping_add(other.0[0]), w1, w2])
    }

    /// Ordered subtraction, the inverse of [`Eid::add`].
    pub const fn sub(self, other: Eid) -> Eid {
        let (w2, borrow) = self.0[2].overflowing_sub(other.0[2]);
        let w1 = self.0[1].wrapping_sub(other.0[1]).wrapping_sub(borrow as u64);
        Eid([self.0[0].wrapping_sub(other.0[0]), w1, w2])
    }

    #[inline]
    pub const fn xor(self, other: Eid) -> Eid {
        Eid([
            self.0[0] ^ other.0[0],
            self.0[1] ^ other.0[1],
            self.0[2] ^ other.0[2],
        ])
    }

    /// Folds in the literal id of `token`.
    pub fn with_token(self, token: &str) -> Eid {
        self.fold(Eid::from_token(token))
    }

    /// Folds in the literal id of `literal`.
    pub fn with_literal(self, literal: &[u8]) -> Eid {
        self.fold(Eid::from_literal(literal))
    }

    /// Three-way comparison: -1, 0 or 1.
    #[inline]
    pub fn compare_to(&self, other: &Eid) -> i32 {
        match self.cmp(other) {
            Ordering::Less => -1,
            Ordering::Equal => 0,
            Ordering::Greater => 1,
        }
    }

    // =========================================================================
    // Time
    // =========================================================================

    /// Unix time in seconds (time-derived ids only).
    #[inline]
    pub const fn unix(&self) -> i64 {
        (self.0[0] as i64) >> 16
    }

    /// Unix time in milliseconds (time-derived ids only).
    #[inline]
    pub const fn unix_millis(&self) -> i64 {
        ((self.0[0] as i64 as i128 * 1000) >> 16) as i64
    }

    // =========================================================================
    // Binary forms
    // =========================================================================

    /// Big-endian serialization of the three words.
    pub fn to_be_bytes(&self) -> [u8; EID_LEN] {
        let mut out = [0u8; EID_LEN];
        out[0..8].copy_from_slice(&self.0[0].to_be_bytes());
        out[8..16].copy_from_slice(&self.0[1].to_be_bytes());
        out[16..24].copy_from_slice(&self.0[2].to_be_bytes());
        out
    }

    /// Inverse of [`Eid::to_be_bytes`].
    pub fn from_be_bytes(bytes: &[u8; EID_LEN]) -> Self {
        let word = |i: usize| {
            let mut w = [0u8; 8];
            w.copy_from_slice(&bytes[i * 8..i * 8 + 8]);
            u64::from_be_bytes(w)
        };
        Eid([word(0), word(1), word(2)])
    }

    /// Reads up to 24 big-endian bytes, right-aligned (shorter input
    /// fills the low-order words).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EidError> {
        if bytes.len() > EID_LEN {
            return Err(EidError::TooLong { len: bytes.len() });
        }
        let mut buf = [0u8; EID_LEN];
        buf[EID_LEN - bytes.len()..].copy_from_slice(bytes);
        Ok(Self::from_be_bytes(&buf))
    }

    /// Appends the big-endian bytes to `dst`.
    pub fn append_to(&self, dst: &mut Vec<u8>) {
        dst.extend_from_slice(&self.to_be_bytes());
    }

    /// 24-byte storage key: zig-zag `w0` then raw `w1`, `w2`.
    pub fn to_key24(&self) -> Key24 {
        let mut key = [0u8; 24];
        key[0..8].copy_from_slice(&zigzag_encode(self.0[0] as i64).to_be_bytes());
        key[8..16].copy_from_slice(&self.0[1].to_be_bytes());
        key[16..24].copy_from_slice(&self.0[2].to_be_bytes());
        key
    }

    /// Exact inverse of [`Eid::to_key24`].
    pub fn from_key24(key: &Key24) -> Self {
        let mut raw = Self::from_be_bytes(key);
        raw.0[0] = zigzag_decode(raw.0[0]) as u64;
        raw
    }

    /// 16-byte storage key: raw `w1`, `w2` only.
    pub fn to_key16(&self) -> Key16 {
        let mut key = [0u8; 16];
        key[0..8].copy_from_slice(&self.0[1].to_be_bytes());
        key[8..16].copy_from_slice(&self.0[2].to_be_bytes());
        key
    }

    /// Inverse of [`Eid::to_key16`]; `w0` is zero.
    pub fn from_key16(key: &Key16) -> Self {
        let mut w1 = [0u8; 8];
        let mut w2 = [0u8; 8];
        w1.copy_from_slice(&key[0..8]);
        w2.copy_from_slice(&key[8..16]);
        Eid([0, u64::from_be_bytes(w1), u64::from_be_bytes(w2)])
    }

    /// UUID view of `w1`, `w2` (the time word is dropped).
    pub fn to_uuid(&self) -> Uuid {
        Uuid::from_bytes(self.to_key16())
    }

    /// Lifts a UUID into `w1`, `w2` with `w0 == 0`.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self::from_key16(uuid.as_bytes())
    }

    // =========================================================================
    // Text forms
    // =========================================================================

    /// Canonical base-32 form: a zero byte plus the 24 id bytes, which
    /// gives 200 bits and exactly 40 symbols.
    pub fn base32(&self) -> String {
        let mut buf = [0u8; EID_LEN + 1];
        buf[1..].copy_from_slice(&self.to_be_bytes());
        base32::encode(&buf)
    }

    /// Lowercase hex of the 24 id bytes.
    pub fn base16(&self) -> String {
        let mut s = String::with_capacity(EID_LEN * 2);
        for byte in self.to_be_bytes() {
            s.push(HEX_CHARS[(byte >> 4) as usize] as char);
            s.push(HEX_CHARS[(byte & 0xF) as usize] as char);
        }
        s
    }

    /// Last 40 bits of `w2` in base-32 (8 chars), for logs.
    ///
    /// Low collision for casual inspection only.
    pub fn base32_suffix(&self) -> String {
        const SUFFIX_BYTES: usize = 5; // 40 bits: divisible by 5 and 8
        let bytes = self.0[2].to_be_bytes();
        base32::encode(&bytes[8 - SUFFIX_BYTES..])
    }

    /// Last 28 bits of `w2` in hex (7 chars), for logs.
    pub fn base16_suffix(&self) -> String {
        const NIBBLES: u32 = 7;
        (0..NIBBLES)
            .rev()
            .map(|i| HEX_CHARS[((self.0[2] >> (4 * i)) & 0xF) as usize] as char)
            .collect()
    }
}

const HEX_CHARS: &[u8; 16] = b"0123456789abcdef";

/// Length of [`Eid::base32`] output.
pub const BASE32_LEN: usize = 40;

/// Length of [`Eid::base16`] output.
pub const BASE16_LEN: usize = 48;

impl FromStr for Eid {
    type Err = EidError;

    /// Parses the 40-char base-32 or 48-char hex form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.len() {
            BASE32_LEN => {
                let bytes = base32::decode(s).map_err(|c| EidError::InvalidChar { char: c })?;
                // 200 bits: a leading zero byte then the id.
                if bytes.len() != EID_LEN + 1 || bytes[0] != 0 {
                    return Err(EidError::InvalidEncoding { len: s.len() });
                }
                Self::from_bytes(&bytes[1..])
            }
            BASE16_LEN => {
                let mut buf = [0u8; EID_LEN];
                let digits = s.as_bytes();
                for (i, out) in buf.iter_mut().enumerate() {
                    let hi = hex_value(digits[i * 2])?;
                    let lo = hex_value(digits[i * 2 + 1])?;
                    *out = (hi << 4) | lo;
                }
                Ok(Self::from_be_bytes(&buf))
            }
            len => Err(EidError::InvalidEncoding { len }),
        }
    }
}

fn hex_value(c: u8) -> Result<u8, EidError> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        b'A'..=b'F' => Ok(c - b'A' + 10),
        _ => Err(EidError::InvalidChar { char: c as char }),
    }
}

impl fmt::Display for Eid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base32())
    }
}

impl fmt::Debug for Eid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Eid({:016x}:{:016x}:{:016x})",
            self.0[0], self.0[1], self.0[2]
        )
    }
}

impl From<[u64; 3]> for Eid {
    fn from(words: [u64; 3]) -> Self {
        Eid(words)
    }
}

impl From<Eid> for [u64; 3] {
    fn from(id: Eid) -> Self {
        id.0
    }
}
