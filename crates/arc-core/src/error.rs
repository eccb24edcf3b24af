//! Error types for EID handling, transaction encoding/decoding, and validation.

use thiserror::Error;

use crate::model::Eid;

/// Coarse classification of a decode failure.
///
/// Callers reading from a stream use this to decide whether to wait for more
/// bytes (`UnexpectedEnd`), to discard the unit of work (`MalformedTx`), or
/// to treat the source itself as failed (`Io`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The byte source ran dry before a complete section was read.
    UnexpectedEnd,
    /// The bytes were read but do not describe a valid transaction.
    MalformedTx,
    /// The byte source returned an error other than end of input.
    Io,
}

impl ErrorKind {
    /// Returns a short stable label (e.g. for log fields).
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UnexpectedEnd => "unexpected_end",
            ErrorKind::MalformedTx => "malformed_tx",
            ErrorKind::Io => "io",
        }
    }
}

/// Error during binary decoding.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    // === Unexpected end ===
    #[error("unexpected end of input while reading {context}")]
    UnexpectedEnd { context: &'static str },

    // === Malformed transaction ===
    #[error("invalid magic bytes: expected ATX or ATXZ, found {found:?}")]
    InvalidMagic { found: [u8; 4] },

    #[error("unsupported format version: {version}")]
    UnsupportedVersion { version: u8 },

    #[error("invalid tx status: {status}")]
    InvalidStatus { status: u8 },

    #[error("invalid op code {op_code} in op {op_index}")]
    InvalidOpCode { op_index: usize, op_code: u32 },

    #[error("reserved bits are non-zero in {context}")]
    ReservedBitsSet { context: &'static str },

    #[error("{field} length {len} exceeds maximum {max}")]
    LengthExceedsLimit {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("op {op_index} payload [{offset}, +{len}) exceeds arena length {arena_len}")]
    PayloadOutOfBounds {
        op_index: usize,
        offset: u32,
        len: u32,
        arena_len: usize,
    },

    #[error("invalid UTF-8 in {field}")]
    InvalidUtf8 { field: &'static str },

    #[error("invalid value data type: {data_type}")]
    InvalidDataType { data_type: u8 },

    #[error("invalid bool value: {value} (expected 0x00 or 0x01)")]
    InvalidBool { value: u8 },

    #[error("varint exceeds maximum length (10 bytes)")]
    VarintTooLong,

    #[error("varint overflow (value exceeds u64)")]
    VarintOverflow,

    #[error("payload has {remaining} trailing bytes after {context}")]
    TrailingBytes {
        context: &'static str,
        remaining: usize,
    },

    // === Compression ===
    #[error("zstd decompression failed: {0}")]
    DecompressionFailed(String),

    #[error("decompressed size {actual} doesn't match declared {declared}")]
    UncompressedSizeMismatch { declared: usize, actual: usize },

    // === Byte source ===
    #[error("io error while reading {context}: {message}")]
    Io {
        context: &'static str,
        message: String,
    },
}

impl DecodeError {
    /// Returns the coarse kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DecodeError::UnexpectedEnd { .. } => ErrorKind::UnexpectedEnd,
            DecodeError::Io { .. } => ErrorKind::Io,
            _ => ErrorKind::MalformedTx,
        }
    }

    /// Returns true if more bytes could have completed the read.
    pub fn is_unexpected_end(&self) -> bool {
        self.kind() == ErrorKind::UnexpectedEnd
    }
}

/// Error during binary encoding.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodeError {
    #[error("{field} length {len} exceeds maximum {max}")]
    LengthExceedsLimit {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("op {op_index} payload [{offset}, +{len}) exceeds arena length {arena_len}")]
    PayloadOutOfBounds {
        op_index: usize,
        offset: u32,
        len: u32,
        arena_len: usize,
    },

    #[error("tx failed validation: {0}")]
    Invalid(#[from] ValidationError),

    #[error("zstd compression failed: {0}")]
    CompressionFailed(String),

    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for EncodeError {
    fn from(err: std::io::Error) -> Self {
        EncodeError::Io(err.to_string())
    }
}

/// Error raised by EID construction and parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EidError {
    #[error("reserved sentinel id {id:?} where a live id is required")]
    InvalidSentinel { id: Eid },

    #[error("encoded id has length {len}, expected 40 (base32) or 48 (base16)")]
    InvalidEncoding { len: usize },

    #[error("encoded id contains invalid character {char:?}")]
    InvalidChar { char: char },

    #[error("binary id has {len} bytes, at most 24 allowed")]
    TooLong { len: usize },
}

/// Error during semantic validation of a transaction.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("op {op_index} has a reserved sentinel {field} id")]
    InvalidSentinel {
        op_index: usize,
        field: &'static str,
    },

    #[error("op {op_index} payload [{offset}, +{len}) exceeds arena length {arena_len}")]
    PayloadOutOfBounds {
        op_index: usize,
        offset: u32,
        len: u32,
        arena_len: usize,
    },

    #[error("op {op_index} payload overlaps the payload of op {other_index}")]
    OverlappingPayload { op_index: usize, other_index: usize },

    #[error("op {op_index} ({op_code:?}) must not carry a payload")]
    UnexpectedPayload {
        op_index: usize,
        op_code: crate::model::OpCode,
    },

    #[error("op {op_index} sets attr {attr} to {found:?}, expected {expected:?}")]
    TypeMismatch {
        op_index: usize,
        attr: Eid,
        expected: crate::model::DataType,
        found: Option<crate::model::DataType>,
    },
}

/// Error from the app and type registries.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    #[error("no app registered for {key}")]
    AppNotFound { key: String },

    #[error("schema {schema_id} not found")]
    SchemaNotFound { schema_id: Eid },

    #[error("{what} {key} is already registered")]
    AlreadyRegistered { what: &'static str, key: String },

    #[error("attr def {name:?} could not be resolved: {reason}")]
    Unresolved { name: String, reason: &'static str },
}

/// Error raised while mapping a typed value to and from attribute ops.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BindingError {
    #[error("required field for attr {attr} has no value")]
    MissingField { attr: String },

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}
