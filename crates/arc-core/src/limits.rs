//! Wire format constants and security limits for decoding.
//!
//! Every length read from an untrusted source is checked against one of
//! these before anything is allocated.

/// Magic prefix of an uncompressed transaction.
pub const MAGIC_UNCOMPRESSED: &[u8; 3] = b"ATX";

/// Magic prefix of a zstd-compressed transaction envelope.
pub const MAGIC_COMPRESSED: &[u8; 4] = b"ATXZ";

/// Current transaction format version (byte 3 of the header).
pub const FORMAT_VERSION: u8 = 1;

/// Oldest format version this crate still decodes.
pub const MIN_FORMAT_VERSION: u8 = 1;

/// Fixed header: magic, version, status, reserved, route_to[0..2].
pub const TX_HEADER_LEN: usize = 24;

/// Op count and arena length, both `u32`.
pub const TX_COUNTS_LEN: usize = 8;

/// Width of an encoded EID.
pub const EID_LEN: usize = 24;

/// Width of one op record: op code, three EIDs, series index, payload span.
pub const OP_RECORD_LEN: usize = 4 + 3 * EID_LEN + 16 + 8;

/// Maximum number of ops in one transaction.
pub const MAX_OPS_PER_TX: usize = 1 << 20;

/// Maximum arena size in bytes.
pub const MAX_ARENA_LEN: usize = 64 * 1024 * 1024;

/// Maximum encoded transaction size accepted by the compressed envelope.
pub const MAX_TX_SIZE: usize =
    TX_HEADER_LEN + TX_COUNTS_LEN + MAX_OPS_PER_TX * OP_RECORD_LEN + MAX_ARENA_LEN;

/// Maximum length of a text value inside a payload.
pub const MAX_STRING_LEN: usize = 16 * 1024 * 1024;

/// Maximum length of a bytes value inside a payload.
pub const MAX_BYTES_LEN: usize = 32 * 1024 * 1024;

/// Maximum number of bytes in an unsigned LEB128 varint.
pub const MAX_VARINT_BYTES: usize = 10;
