//! Transactions: a header, an ordered op list, and one payload arena.
//!
//! Ops never own payload bytes. Each records a [`PayloadSpan`] into the
//! arena of the transaction that holds it, so a `Tx` can be encoded as
//! fixed-size records followed by the raw arena.

use crate::codec::primitives::{Reader, Writer};
use crate::error::{DecodeError, EncodeError};
use crate::limits::MAX_ARENA_LEN;
use crate::model::{AttrValue, Eid};

/// Sync status carried in a transaction header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum TxStatus {
    #[default]
    Synced = 0,
    Syncing = 1,
    Closed = 2,
    Error = 3,
}

impl TxStatus {
    /// Creates a TxStatus from its wire representation.
    pub fn from_u8(v: u8) -> Option<TxStatus> {
        match v {
            0 => Some(TxStatus::Synced),
            1 => Some(TxStatus::Syncing),
            2 => Some(TxStatus::Closed),
            3 => Some(TxStatus::Error),
            _ => None,
        }
    }
}

/// What an op does to its target cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum OpCode {
    /// Metadata about the transaction or session, not cell state.
    MetaAttr = 1,
    /// Creates or replaces a cell; `attr` names its schema.
    UpsertCell = 2,
    /// Sets one attribute slot on a cell.
    UpsertAttr = 3,
    /// Removes one attribute slot. Carries no payload.
    RemoveAttr = 4,
    /// Marks the end of a unit of work. Carries no payload.
    Commit = 5,
}

impl OpCode {
    /// Creates an OpCode from its wire representation.
    pub fn from_u32(v: u32) -> Option<OpCode> {
        match v {
            1 => Some(OpCode::MetaAttr),
            2 => Some(OpCode::UpsertCell),
            3 => Some(OpCode::UpsertAttr),
            4 => Some(OpCode::RemoveAttr),
            5 => Some(OpCode::Commit),
            _ => None,
        }
    }

    /// Whether ops of this kind may reference payload bytes.
    pub fn allows_payload(self) -> bool {
        !matches!(self, OpCode::RemoveAttr | OpCode::Commit)
    }
}

/// Position of a slot within a versioned attribute series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SeriesIndex(pub u64, pub u64);

/// Byte range of an op's payload inside the arena.
///
/// A zero length means "no payload".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PayloadSpan {
    pub offset: u32,
    pub len: u32,
}

impl PayloadSpan {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// One past the last byte, computed without overflow.
    #[inline]
    pub fn end(&self) -> u64 {
        self.offset as u64 + self.len as u64
    }

    /// True when the span lies inside an arena of `arena_len` bytes.
    #[inline]
    pub fn fits(&self, arena_len: usize) -> bool {
        self.end() <= arena_len as u64
    }
}

/// One attribute operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxOp {
    pub op_code: OpCode,
    pub parent: Eid,
    pub target: Eid,
    pub attr: Eid,
    pub si: SeriesIndex,
    pub payload: PayloadSpan,
}

impl TxOp {
    /// Creates an op with nil ids and no payload.
    pub fn new(op_code: OpCode) -> Self {
        Self {
            op_code,
            parent: Eid::NIL,
            target: Eid::NIL,
            attr: Eid::NIL,
            si: SeriesIndex::default(),
            payload: PayloadSpan::default(),
        }
    }
}

/// Fixed header fields of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TxHeader {
    pub status: TxStatus,
    pub route_to: [u64; 2],
}

/// A batch of ops plus the arena their payloads live in.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Tx {
    pub header: TxHeader,
    pub ops: Vec<TxOp>,
    pub arena: Vec<u8>,
}

impl Tx {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty transaction with the given header.
    pub fn with_header(header: TxHeader) -> Self {
        Self {
            header,
            ..Self::default()
        }
    }

    /// Appends `op` as-is. Its payload span must already describe arena
    /// bytes (see [`Tx::marshal_value`] / [`Tx::marshal_raw`]).
    pub fn push_op(&mut self, op: TxOp) {
        self.ops.push(op);
    }

    /// Encodes `value` onto the end of the arena and points `op.payload`
    /// at it.
    ///
    /// On error the arena is left as it was.
    pub fn marshal_value<V: AttrValue>(&mut self, op: &mut TxOp, value: &V) -> Result<(), EncodeError> {
        let start = self.arena.len();
        let mut writer = Writer::from_vec(std::mem::take(&mut self.arena));
        value.encode(&mut writer);
        self.arena = writer.into_bytes();
        self.finish_payload(op, start)
    }

    /// Copies `bytes` verbatim onto the end of the arena and points
    /// `op.payload` at them.
    ///
    /// `None` records a zero-length payload at the current arena end.
    pub fn marshal_raw(&mut self, op: &mut TxOp, bytes: Option<&[u8]>) -> Result<(), EncodeError> {
        let start = self.arena.len();
        if let Some(bytes) = bytes {
            self.arena.extend_from_slice(bytes);
        }
        self.finish_payload(op, start)
    }

    /// [`Tx::marshal_value`] followed by [`Tx::push_op`].
    ///
    /// `op` keeps the recorded span, so callers can tweak and reuse it.
    pub fn push_op_value<V: AttrValue>(&mut self, op: &mut TxOp, value: &V) -> Result<(), EncodeError> {
        self.marshal_value(op, value)?;
        self.push_op(*op);
        Ok(())
    }

    /// [`Tx::marshal_raw`] followed by [`Tx::push_op`].
    pub fn push_op_raw(&mut self, op: &mut TxOp, bytes: Option<&[u8]>) -> Result<(), EncodeError> {
        self.marshal_raw(op, bytes)?;
        self.push_op(*op);
        Ok(())
    }

    fn finish_payload(&mut self, op: &mut TxOp, start: usize) -> Result<(), EncodeError> {
        let end = self.arena.len();
        if end > MAX_ARENA_LEN {
            self.arena.truncate(start);
            return Err(EncodeError::LengthExceedsLimit {
                field: "arena",
                len: end,
                max: MAX_ARENA_LEN,
            });
        }
        // MAX_ARENA_LEN fits in u32, so neither cast truncates.
        op.payload = PayloadSpan {
            offset: start as u32,
            len: (end - start) as u32,
        };
        Ok(())
    }

    /// Returns the payload bytes `op` refers to.
    pub fn payload(&self, op: &TxOp) -> Result<&[u8], DecodeError> {
        let span = op.payload;
        if !span.fits(self.arena.len()) {
            return Err(DecodeError::PayloadOutOfBounds {
                op_index: self.ops.iter().position(|o| o == op).unwrap_or(self.ops.len()),
                offset: span.offset,
                len: span.len,
                arena_len: self.arena.len(),
            });
        }
        let start = span.offset as usize;
        Ok(&self.arena[start..start + span.len as usize])
    }

    /// Decodes the payload of `op` as a `V`, requiring it to be consumed
    /// exactly.
    pub fn load_value<V: AttrValue>(&self, op: &TxOp) -> Result<V, DecodeError> {
        let mut reader = Reader::new(self.payload(op)?);
        let value = V::decode(&mut reader)?;
        reader.expect_end("payload")?;
        Ok(value)
    }

    /// Number of ops.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Drops all ops and payloads, keeping the header and allocations.
    pub fn clear(&mut self) {
        self.ops.clear();
        self.arena.clear();
    }
}
