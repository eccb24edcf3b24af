//! Transaction encoding/decoding.
//!
//! Wire layout (all integers big-endian):
//!
//! ```text
//! "ATX" | version u8 | status u8 | 3 reserved zero bytes
//! route_to[0] u64 | route_to[1] u64
//! op_count u32 | arena_len u32
//! op_count * (op_code u32 | parent | target | attr | si.0 u64 | si.1 u64 | offset u32 | len u32)
//! arena_len bytes of arena
//! ```
//!
//! The compressed envelope is `"ATXZ" | uncompressed_len u32 | zstd frame`.

use std::io::Read;

use tracing::debug;

use crate::codec::primitives::{ByteSource, IoSource, Reader, Writer};
use crate::error::{DecodeError, EncodeError};
use crate::limits::{
    FORMAT_VERSION, MAGIC_COMPRESSED, MAGIC_UNCOMPRESSED, MAX_ARENA_LEN, MAX_OPS_PER_TX,
    MAX_TX_SIZE, MIN_FORMAT_VERSION, OP_RECORD_LEN, TX_COUNTS_LEN, TX_HEADER_LEN,
};
use crate::model::{OpCode, PayloadSpan, SeriesIndex, Tx, TxHeader, TxOp, TxStatus};
use crate::validate::validate_tx;

// =============================================================================
// OPTIONS
// =============================================================================

/// Limits applied while decoding untrusted input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Largest op count accepted.
    pub max_ops: usize,
    /// Largest arena accepted, in bytes.
    pub max_arena_len: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            max_ops: MAX_OPS_PER_TX,
            max_arena_len: MAX_ARENA_LEN,
        }
    }
}

impl DecodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_ops(mut self, max_ops: usize) -> Self {
        self.max_ops = max_ops;
        self
    }

    pub fn with_max_arena_len(mut self, max_arena_len: usize) -> Self {
        self.max_arena_len = max_arena_len;
        self
    }
}

/// Options for encoding transactions.
#[derive(Debug, Clone, Copy, Default)]
pub struct EncodeOptions {
    /// Run [`validate_tx`] before encoding.
    ///
    /// Bounds are always checked; this adds the sentinel, overlap and
    /// payload-kind checks.
    pub validate: bool,
}

impl EncodeOptions {
    /// Creates default (non-validating) encoding options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options that validate before encoding.
    pub fn validated() -> Self {
        Self { validate: true }
    }
}

// =============================================================================
// ENCODING
// =============================================================================

/// Exact number of bytes [`encode_tx`] produces for `tx`.
pub fn encoded_len(tx: &Tx) -> usize {
    TX_HEADER_LEN + TX_COUNTS_LEN + tx.ops.len() * OP_RECORD_LEN + tx.arena.len()
}

/// Encodes a transaction to its uncompressed wire form.
///
/// Pure: `tx` is not modified and no I/O happens.
pub fn encode_tx(tx: &Tx) -> Result<Vec<u8>, EncodeError> {
    encode_tx_with_options(tx, EncodeOptions::default())
}

/// Encodes a transaction with options.
pub fn encode_tx_with_options(tx: &Tx, options: EncodeOptions) -> Result<Vec<u8>, EncodeError> {
    let mut out = Vec::with_capacity(encoded_len(tx));
    encode_tx_into_with_options(tx, &mut out, options)?;
    Ok(out)
}

/// Appends the encoded transaction to `out`.
///
/// On error nothing is appended.
pub fn encode_tx_into(tx: &Tx, out: &mut Vec<u8>) -> Result<(), EncodeError> {
    encode_tx_into_with_options(tx, out, EncodeOptions::default())
}

fn encode_tx_into_with_options(
    tx: &Tx,
    out: &mut Vec<u8>,
    options: EncodeOptions,
) -> Result<(), EncodeError> {
    check_encodable(tx)?;
    if options.validate {
        validate_tx(tx)?;
    }

    let start = out.len();
    let mut writer = Writer::from_vec(std::mem::take(out));

    // Header
    writer.write_bytes(MAGIC_UNCOMPRESSED);
    writer.write_byte(FORMAT_VERSION);
    writer.write_byte(tx.header.status as u8);
    writer.write_bytes(&[0u8; 3]);
    writer.write_u64(tx.header.route_to[0]);
    writer.write_u64(tx.header.route_to[1]);

    // Counts (bounds checked above)
    writer.write_u32(tx.ops.len() as u32);
    writer.write_u32(tx.arena.len() as u32);

    for op in &tx.ops {
        encode_op(&mut writer, op);
    }
    writer.write_bytes(&tx.arena);

    *out = writer.into_bytes();
    debug!(
        op_count = tx.ops.len(),
        arena_len = tx.arena.len(),
        bytes = out.len() - start,
        "encoded tx"
    );
    Ok(())
}

fn encode_op(writer: &mut Writer, op: &TxOp) {
    writer.write_u32(op.op_code as u32);
    writer.write_eid(&op.parent);
    writer.write_eid(&op.target);
    writer.write_eid(&op.attr);
    writer.write_u64(op.si.0);
    writer.write_u64(op.si.1);
    writer.write_u32(op.payload.offset);
    writer.write_u32(op.payload.len);
}

fn check_encodable(tx: &Tx) -> Result<(), EncodeError> {
    if tx.ops.len() > MAX_OPS_PER_TX {
        return Err(EncodeError::LengthExceedsLimit {
            field: "ops",
            len: tx.ops.len(),
            max: MAX_OPS_PER_TX,
        });
    }
    if tx.arena.len() > MAX_ARENA_LEN {
        return Err(EncodeError::LengthExceedsLimit {
            field: "arena",
            len: tx.arena.len(),
            max: MAX_ARENA_LEN,
        });
    }
    for (op_index, op) in tx.ops.iter().enumerate() {
        if !op.payload.fits(tx.arena.len()) {
            return Err(EncodeError::PayloadOutOfBounds {
                op_index,
                offset: op.payload.offset,
                len: op.payload.len,
                arena_len: tx.arena.len(),
            });
        }
    }
    Ok(())
}

/// Encodes a transaction inside the zstd envelope.
pub fn encode_tx_compressed(tx: &Tx, level: i32) -> Result<Vec<u8>, EncodeError> {
    encode_tx_compressed_with_options(tx, level, EncodeOptions::default())
}

/// Encodes a transaction inside the zstd envelope, with options.
pub fn encode_tx_compressed_with_options(
    tx: &Tx,
    level: i32,
    options: EncodeOptions,
) -> Result<Vec<u8>, EncodeError> {
    let uncompressed = encode_tx_with_options(tx, options)?;

    let compressed = zstd::encode_all(uncompressed.as_slice(), level)
        .map_err(|e| EncodeError::CompressionFailed(e.to_string()))?;

    let mut writer = Writer::with_capacity(MAGIC_COMPRESSED.len() + 4 + compressed.len());
    writer.write_bytes(MAGIC_COMPRESSED);
    writer.write_u32(uncompressed.len() as u32);
    writer.write_bytes(&compressed);

    debug!(
        uncompressed = uncompressed.len(),
        compressed = writer.len(),
        level,
        "compressed tx"
    );
    Ok(writer.into_bytes())
}

// =============================================================================
// DECODING
// =============================================================================

/// Unwraps an `ATXZ` envelope, returning the uncompressed transaction bytes.
pub fn decompress(input: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let mut reader = Reader::new(input);
    let magic = reader.read_bytes(MAGIC_COMPRESSED.len(), "magic")?;
    if magic != MAGIC_COMPRESSED {
        let mut found = [0u8; 4];
        found.copy_from_slice(magic);
        return Err(DecodeError::InvalidMagic { found });
    }
    let declared_size = reader.read_u32("uncompressed_size")? as usize;
    if declared_size > MAX_TX_SIZE {
        return Err(DecodeError::LengthExceedsLimit {
            field: "uncompressed_size",
            len: declared_size,
            max: MAX_TX_SIZE,
        });
    }

    let mut decoder = zstd::Decoder::new(reader.remaining())
        .map_err(|e| DecodeError::DecompressionFailed(e.to_string()))?;

    // Read at most one byte past the declared size so a lying header is
    // caught without inflating an unbounded stream.
    let mut decompressed = Vec::with_capacity(declared_size);
    (&mut decoder)
        .take(declared_size as u64 + 1)
        .read_to_end(&mut decompressed)
        .map_err(|e| DecodeError::DecompressionFailed(e.to_string()))?;

    if decompressed.len() != declared_size {
        return Err(DecodeError::UncompressedSizeMismatch {
            declared: declared_size,
            actual: decompressed.len(),
        });
    }
    Ok(decompressed)
}

/// Decodes a transaction from a complete buffer.
///
/// Accepts both the plain (`ATX`) and compressed (`ATXZ`) forms. The
/// whole buffer must be consumed.
pub fn decode_tx(input: &[u8]) -> Result<Tx, DecodeError> {
    decode_tx_with_options(input, DecodeOptions::default())
}

/// Decodes a transaction from a complete buffer with custom limits.
pub fn decode_tx_with_options(input: &[u8], options: DecodeOptions) -> Result<Tx, DecodeError> {
    if input.starts_with(MAGIC_COMPRESSED) {
        let decompressed = decompress(input)?;
        return decode_tx_with_options(&decompressed, options);
    }
    let mut reader = Reader::new(input);
    let tx = decode_tx_from(&mut reader, options)?;
    reader.expect_end("tx")?;
    Ok(tx)
}

/// Reads exactly one uncompressed transaction from `source`.
///
/// Bytes after the transaction are left unread.
pub fn read_tx<R: Read>(source: R) -> Result<Tx, DecodeError> {
    read_tx_with_options(source, DecodeOptions::default())
}

/// [`read_tx`] with custom limits.
pub fn read_tx_with_options<R: Read>(source: R, options: DecodeOptions) -> Result<Tx, DecodeError> {
    decode_tx_from(&mut IoSource::new(source), options)
}

/// Decodes one uncompressed transaction from any byte source.
///
/// Both count fields are checked against `options` before anything is
/// allocated, and every payload span is checked against the arena.
pub fn decode_tx_from<S: ByteSource>(source: &mut S, options: DecodeOptions) -> Result<Tx, DecodeError> {
    let header = decode_header(source)?;

    let op_count = source.read_u32("op_count")? as usize;
    if op_count > options.max_ops {
        return Err(DecodeError::LengthExceedsLimit {
            field: "ops",
            len: op_count,
            max: options.max_ops,
        });
    }
    let arena_len = source.read_u32("arena_len")? as usize;
    if arena_len > options.max_arena_len {
        return Err(DecodeError::LengthExceedsLimit {
            field: "arena",
            len: arena_len,
            max: options.max_arena_len,
        });
    }

    // Reads in bounded chunks so a lying op count cannot force a large
    // allocation ahead of the bytes that back it.
    let mut ops = Vec::with_capacity(op_count.min(1024));
    for op_index in 0..op_count {
        let op = decode_op(source, op_index)?;
        if !op.payload.fits(arena_len) {
            return Err(DecodeError::PayloadOutOfBounds {
                op_index,
                offset: op.payload.offset,
                len: op.payload.len,
                arena_len,
            });
        }
        ops.push(op);
    }

    let arena = source.read_vec(arena_len, "arena")?;

    debug!(
        op_count,
        arena_len,
        bytes = encoded_len_parts(op_count, arena_len),
        "decoded tx"
    );
    Ok(Tx { header, ops, arena })
}

fn encoded_len_parts(op_count: usize, arena_len: usize) -> usize {
    TX_HEADER_LEN + TX_COUNTS_LEN + op_count * OP_RECORD_LEN + arena_len
}

fn decode_header<S: ByteSource>(source: &mut S) -> Result<TxHeader, DecodeError> {
    let mut head = [0u8; 8];
    source.read_exact_into(&mut head, "tx header")?;

    if &head[0..3] != MAGIC_UNCOMPRESSED {
        let mut found = [0u8; 4];
        found.copy_from_slice(&head[0..4]);
        return Err(DecodeError::InvalidMagic { found });
    }
    let version = head[3];
    if !(MIN_FORMAT_VERSION..=FORMAT_VERSION).contains(&version) {
        return Err(DecodeError::UnsupportedVersion { version });
    }
    let status = TxStatus::from_u8(head[4]).ok_or(DecodeError::InvalidStatus { status: head[4] })?;
    if head[5..8] != [0, 0, 0] {
        return Err(DecodeError::ReservedBitsSet { context: "tx header" });
    }

    let route_to = [source.read_u64("route_to")?, source.read_u64("route_to")?];
    Ok(TxHeader { status, route_to })
}

fn decode_op<S: ByteSource>(source: &mut S, op_index: usize) -> Result<TxOp, DecodeError> {
    let mut record = [0u8; OP_RECORD_LEN];
    source.read_exact_into(&mut record, "op record")?;
    let mut reader = Reader::new(&record);

    let code = reader.read_u32("op_code")?;
    let op_code = OpCode::from_u32(code).ok_or(DecodeError::InvalidOpCode { op_index, op_code: code })?;
    let parent = reader.read_eid("parent")?;
    let target = reader.read_eid("target")?;
    let attr = reader.read_eid("attr")?;
    let si = SeriesIndex(reader.read_u64("si")?, reader.read_u64("si")?);
    let payload = PayloadSpan {
        offset: reader.read_u32("payload_offset")?,
        len: reader.read_u32("payload_len")?,
    };

    Ok(TxOp {
        op_code,
        parent,
        target,
        attr,
        si,
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Eid, Value};

    fn make_test_tx() -> Tx {
        let mut tx = Tx::with_header(TxHeader {
            status: TxStatus::Syncing,
            route_to: [888_854_513, 7_777_435],
        });
        let mut op = TxOp::new(OpCode::UpsertAttr);
        op.parent = Eid([1, 2, 3]);
        op.target = Eid([4, 555, 666]);
        op.attr = Eid([0, 111_312_232, 22_232_334_444]);
        op.si = SeriesIndex(7383, 76549);
        tx.push_op_value(&mut op, &Value::Text("Hello".to_string())).unwrap();

        op.op_code = OpCode::RemoveAttr;
        tx.push_op_raw(&mut op, None).unwrap();
        tx
    }

    #[test]
    fn test_tx_roundtrip() {
        let tx = make_test_tx();
        let encoded = encode_tx(&tx).unwrap();
        assert_eq!(encoded.len(), encoded_len(&tx));
        let decoded = decode_tx(&encoded).unwrap();
        assert_eq!(decoded, tx);
    }

    #[test]
    fn test_tx_compressed_roundtrip() {
        let tx = make_test_tx();
        let encoded = encode_tx_compressed(&tx, 3).unwrap();
        assert_eq!(&encoded[0..4], MAGIC_COMPRESSED);
        let decoded = decode_tx(&encoded).unwrap();
        assert_eq!(decoded, tx);
        assert_eq!(decompress(&encoded).unwrap(), encode_tx(&tx).unwrap());
    }

    #[test]
    fn test_header_layout() {
        let tx = make_test_tx();
        let encoded = encode_tx(&tx).unwrap();
        assert_eq!(&encoded[0..3], b"ATX");
        assert_eq!(encoded[3], FORMAT_VERSION);
        assert_eq!(encoded[4], TxStatus::Syncing as u8);
        assert_eq!(&encoded[5..8], &[0, 0, 0]);
        assert_eq!(&encoded[8..16], &888_854_513u64.to_be_bytes());
        assert_eq!(&encoded[16..24], &7_777_435u64.to_be_bytes());
        assert_eq!(&encoded[24..28], &2u32.to_be_bytes());
        assert_eq!(&encoded[28..32], &(tx.arena.len() as u32).to_be_bytes());
        assert_eq!(&encoded[32..36], &(OpCode::UpsertAttr as u32).to_be_bytes());
    }

    #[test]
    fn test_empty_tx() {
        let tx = Tx::new();
        let encoded = encode_tx(&tx).unwrap();
        assert_eq!(encoded.len(), TX_HEADER_LEN + TX_COUNTS_LEN);
        assert_eq!(decode_tx(&encoded).unwrap(), tx);
    }

    #[test]
    fn test_invalid_magic() {
        let data = [b'X'; 40];
        assert!(matches!(decode_tx(&data), Err(DecodeError::InvalidMagic { .. })));
    }

    #[test]
    fn test_unsupported_version() {
        let mut data = encode_tx(&Tx::new()).unwrap();
        data[3] = 99;
        assert_eq!(decode_tx(&data), Err(DecodeError::UnsupportedVersion { version: 99 }));
    }

    #[test]
    fn test_invalid_status_and_reserved() {
        let mut data = encode_tx(&Tx::new()).unwrap();
        data[4] = 9;
        assert_eq!(decode_tx(&data), Err(DecodeError::InvalidStatus { status: 9 }));

        let mut data = encode_tx(&Tx::new()).unwrap();
        data[6] = 1;
        assert!(matches!(decode_tx(&data), Err(DecodeError::ReservedBitsSet { .. })));
    }

    #[test]
    fn test_invalid_op_code() {
        let mut data = encode_tx(&make_test_tx()).unwrap();
        data[32..36].copy_from_slice(&77u32.to_be_bytes());
        assert_eq!(
            decode_tx(&data),
            Err(DecodeError::InvalidOpCode { op_index: 0, op_code: 77 })
        );
    }

    #[test]
    fn test_payload_past_declared_arena() {
        let tx = make_test_tx();
        let mut data = encode_tx(&tx).unwrap();
        // Shrink the declared arena below the first payload.
        data[28..32].copy_from_slice(&1u32.to_be_bytes());
        assert!(matches!(
            decode_tx(&data),
            Err(DecodeError::PayloadOutOfBounds { op_index: 0, arena_len: 1, .. })
        ));
    }

    #[test]
    fn test_limits_are_enforced() {
        let data = encode_tx(&make_test_tx()).unwrap();
        let tight = DecodeOptions::new().with_max_ops(1);
        assert!(matches!(
            decode_tx_with_options(&data, tight),
            Err(DecodeError::LengthExceedsLimit { field: "ops", len: 2, max: 1 })
        ));
        let tight = DecodeOptions::new().with_max_arena_len(2);
        assert!(matches!(
            decode_tx_with_options(&data, tight),
            Err(DecodeError::LengthExceedsLimit { field: "arena", .. })
        ));
    }

    #[test]
    fn test_huge_op_count_fails_as_end() {
        let mut data = encode_tx(&Tx::new()).unwrap();
        data[24..28].copy_from_slice(&1000u32.to_be_bytes());
        let err = decode_tx(&data).unwrap_err();
        assert!(err.is_unexpected_end());
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut data = encode_tx(&make_test_tx()).unwrap();
        data.push(0);
        assert!(matches!(decode_tx(&data), Err(DecodeError::TrailingBytes { .. })));
    }

    #[test]
    fn test_read_tx_leaves_rest_of_stream() {
        let tx = make_test_tx();
        let mut stream = encode_tx(&tx).unwrap();
        stream.extend_from_slice(b"next");
        let mut cursor = std::io::Cursor::new(stream);
        assert_eq!(read_tx(&mut cursor).unwrap(), tx);
        let mut rest = Vec::new();
        cursor.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b"next");
    }

    #[test]
    fn test_encode_rejects_dangling_payload() {
        let mut tx = make_test_tx();
        tx.ops[0].payload.len = 1_000;
        assert!(matches!(
            encode_tx(&tx),
            Err(EncodeError::PayloadOutOfBounds { op_index: 0, .. })
        ));
    }

    #[test]
    fn test_encode_into_appends() {
        let tx = make_test_tx();
        let mut out = b"prefix".to_vec();
        encode_tx_into(&tx, &mut out).unwrap();
        assert_eq!(&out[..6], b"prefix");
        assert_eq!(decode_tx(&out[6..]).unwrap(), tx);
    }

    #[test]
    fn test_compressed_size_mismatch() {
        let tx = make_test_tx();
        let mut encoded = encode_tx_compressed(&tx, 3).unwrap();
        encoded[4..8].copy_from_slice(&5u32.to_be_bytes());
        assert!(matches!(
            decode_tx(&encoded),
            Err(DecodeError::UncompressedSizeMismatch { declared: 5, .. })
        ));
    }
}
