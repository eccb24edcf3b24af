//! Builder API for ergonomic transaction construction.
//!
//! # Example
//!
//! ```rust
//! use arc_core::model::{Eid, TxBuilder, TxStatus, Value};
//!
//! let profile = Eid::from_token("profile");
//! let cell = Eid::now();
//!
//! let tx = TxBuilder::new()
//!     .status(TxStatus::Syncing)
//!     .upsert_cell(Eid::NIL, cell, profile, |c| c
//!         .attr(Eid::from_token("name"), "Alice")
//!         .attr(Eid::from_token("age"), 41i64)
//!     )
//!     .commit()
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(tx.ops.len(), 4);
//! ```

use crate::error::EncodeError;
use crate::model::{Eid, OpCode, SeriesIndex, Tx, TxOp, TxStatus, Value};

/// Builder for constructing a Tx.
///
/// Marshalling can only fail when the arena outgrows its limit; the first
/// such error is kept and returned by [`TxBuilder::build`].
#[derive(Debug, Clone, Default)]
pub struct TxBuilder {
    tx: Tx,
    error: Option<EncodeError>,
}

impl TxBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the header status.
    pub fn status(mut self, status: TxStatus) -> Self {
        self.tx.header.status = status;
        self
    }

    /// Sets both routing words of the header.
    pub fn route_to(mut self, route_0: u64, route_1: u64) -> Self {
        self.tx.header.route_to = [route_0, route_1];
        self
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Adds a MetaAttr op carrying `value`.
    pub fn meta(self, attr: Eid, value: impl Into<Value>) -> Self {
        let mut op = TxOp::new(OpCode::MetaAttr);
        op.attr = attr;
        self.push_value(op, &value.into())
    }

    /// Adds an UpsertCell op for `cell` under `parent`, followed by the
    /// attributes added in `f`.
    pub fn upsert_cell<F>(mut self, parent: Eid, cell: Eid, schema: Eid, f: F) -> Self
    where
        F: FnOnce(CellBuilder) -> CellBuilder,
    {
        let mut op = TxOp::new(OpCode::UpsertCell);
        op.parent = parent;
        op.target = cell;
        op.attr = schema;
        self.tx.push_op(op);

        let builder = f(CellBuilder::default());
        for (attr, si, value) in builder.attrs {
            self = self.upsert_attr_at(parent, cell, attr, si, value);
        }
        self
    }

    /// Adds an UpsertAttr op at the default series index.
    pub fn upsert_attr(self, target: Eid, attr: Eid, value: impl Into<Value>) -> Self {
        self.upsert_attr_at(Eid::NIL, target, attr, SeriesIndex::default(), value)
    }

    /// Adds an UpsertAttr op at an explicit series index.
    pub fn upsert_attr_at(
        self,
        parent: Eid,
        target: Eid,
        attr: Eid,
        si: SeriesIndex,
        value: impl Into<Value>,
    ) -> Self {
        let mut op = TxOp::new(OpCode::UpsertAttr);
        op.parent = parent;
        op.target = target;
        op.attr = attr;
        op.si = si;
        self.push_value(op, &value.into())
    }

    /// Adds an UpsertAttr op whose payload is `bytes` verbatim.
    pub fn upsert_raw(mut self, target: Eid, attr: Eid, si: SeriesIndex, bytes: &[u8]) -> Self {
        let mut op = TxOp::new(OpCode::UpsertAttr);
        op.target = target;
        op.attr = attr;
        op.si = si;
        if let Err(err) = self.tx.push_op_raw(&mut op, Some(bytes)) {
            self.error.get_or_insert(err);
        }
        self
    }

    /// Adds a RemoveAttr op (no payload).
    pub fn remove_attr(mut self, target: Eid, attr: Eid, si: SeriesIndex) -> Self {
        let mut op = TxOp::new(OpCode::RemoveAttr);
        op.target = target;
        op.attr = attr;
        op.si = si;
        op.payload.offset = self.tx.arena.len() as u32;
        self.tx.push_op(op);
        self
    }

    /// Adds a Commit op (no payload).
    pub fn commit(mut self) -> Self {
        let mut op = TxOp::new(OpCode::Commit);
        op.payload.offset = self.tx.arena.len() as u32;
        self.tx.push_op(op);
        self
    }

    fn push_value(mut self, mut op: TxOp, value: &Value) -> Self {
        if let Err(err) = self.tx.push_op_value(&mut op, value) {
            self.error.get_or_insert(err);
        }
        self
    }

    /// Finishes the transaction.
    pub fn build(self) -> Result<Tx, EncodeError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.tx),
        }
    }
}

/// Collects attribute values for one cell.
#[derive(Debug, Clone, Default)]
pub struct CellBuilder {
    attrs: Vec<(Eid, SeriesIndex, Value)>,
}

impl CellBuilder {
    /// Sets `attr` at the default series index.
    pub fn attr(self, attr: Eid, value: impl Into<Value>) -> Self {
        self.attr_at(attr, SeriesIndex::default(), value)
    }

    /// Sets `attr` at series index `si`.
    pub fn attr_at(mut self, attr: Eid, si: SeriesIndex, value: impl Into<Value>) -> Self {
        self.attrs.push((attr, si, value.into()));
        self
    }

    /// Number of attributes collected.
    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }
}
