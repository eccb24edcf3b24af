//! Semantic validation for transactions.
//!
//! Structural checks (magic, counts, payload bounds) happen during decode.
//! The checks here need a whole-transaction view or outside context:
//! sentinel ids, overlapping payloads, payloads on ops that must not carry
//! one, and optional advisory attribute typing.

use rustc_hash::FxHashMap;

use crate::error::ValidationError;
use crate::model::{DataType, Eid, OpCode, Tx};

/// Advisory attribute typing for [`validate_tx_values`].
///
/// Attributes not registered here are not checked.
#[derive(Debug, Clone, Default)]
pub struct SchemaContext {
    attrs: FxHashMap<Eid, DataType>,
}

impl SchemaContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the expected value type of an attribute.
    pub fn add_attr(&mut self, attr: Eid, data_type: DataType) {
        self.attrs.insert(attr, data_type);
    }

    pub fn attr_type(&self, attr: &Eid) -> Option<DataType> {
        self.attrs.get(attr).copied()
    }
}

/// Validates a transaction's internal consistency.
///
/// - `attr` ids of attribute ops are never `NIL` or `WILDCARD`, and the
///   `target` of cell and attribute ops is never `WILDCARD`
/// - every payload lies inside the arena
/// - no two non-empty payloads overlap
/// - `RemoveAttr` and `Commit` ops carry no payload
pub fn validate_tx(tx: &Tx) -> Result<(), ValidationError> {
    let arena_len = tx.arena.len();
    for (op_index, op) in tx.ops.iter().enumerate() {
        match op.op_code {
            OpCode::UpsertAttr | OpCode::RemoveAttr | OpCode::MetaAttr => {
                if op.attr.is_sentinel() {
                    return Err(ValidationError::InvalidSentinel { op_index, field: "attr" });
                }
            }
            OpCode::UpsertCell | OpCode::Commit => {}
        }
        if op.op_code != OpCode::MetaAttr && op.target.is_wildcard() {
            return Err(ValidationError::InvalidSentinel { op_index, field: "target" });
        }
        if !op.payload.fits(arena_len) {
            return Err(ValidationError::PayloadOutOfBounds {
                op_index,
                offset: op.payload.offset,
                len: op.payload.len,
                arena_len,
            });
        }
        if !op.op_code.allows_payload() && !op.payload.is_empty() {
            return Err(ValidationError::UnexpectedPayload {
                op_index,
                op_code: op.op_code,
            });
        }
    }
    check_overlaps(tx)
}

fn check_overlaps(tx: &Tx) -> Result<(), ValidationError> {
    let mut spans: Vec<(usize, u64, u64)> = tx
        .ops
        .iter()
        .enumerate()
        .filter(|(_, op)| !op.payload.is_empty())
        .map(|(i, op)| (i, op.payload.offset as u64, op.payload.end()))
        .collect();
    spans.sort_unstable_by_key(|&(i, start, _)| (start, i));

    let mut furthest: Option<(usize, u64)> = None;
    for (op_index, start, end) in spans {
        if let Some((other_index, other_end)) = furthest {
            if start < other_end {
                return Err(ValidationError::OverlappingPayload {
                    op_index: op_index.max(other_index),
                    other_index: op_index.min(other_index),
                });
            }
        }
        if furthest.is_none_or(|(_, e)| end > e) {
            furthest = Some((op_index, end));
        }
    }
    Ok(())
}

/// Checks `UpsertAttr` payloads against the advisory attribute types.
///
/// Payloads are expected to be tagged [`crate::model::Value`]s; only the
/// leading type byte is inspected.
pub fn validate_tx_values(tx: &Tx, schema: &SchemaContext) -> Result<(), ValidationError> {
    for (op_index, op) in tx.ops.iter().enumerate() {
        if op.op_code != OpCode::UpsertAttr {
            continue;
        }
        let Some(expected) = schema.attr_type(&op.attr) else {
            continue;
        };
        let found = tx
            .arena
            .get(op.payload.offset as usize)
            .filter(|_| !op.payload.is_empty() && op.payload.fits(tx.arena.len()))
            .and_then(|b| DataType::from_u8(*b));
        if found != Some(expected) {
            return Err(ValidationError::TypeMismatch {
                op_index,
                attr: op.attr,
                expected,
                found,
            });
        }
    }
    Ok(())
}
