//! Explicit mappings between Rust structs and cell attributes.
//!
//! A [`CellBinding`] is built once per type. It lists each attribute's tag
//! with a getter and a setter, so writing a value to a transaction and
//! reading it back needs no runtime type inspection.
//!
//! ```rust
//! use arc_core::model::{CellBinding, Eid, Tx, Value};
//!
//! #[derive(Default, Debug, PartialEq)]
//! struct Login {
//!     user: String,
//!     host: Option<String>,
//! }
//!
//! let binding = CellBinding::<Login>::new("arc.login")
//!     .bind("user.tag", |l| Some(l.user.clone().into()), |l, v| match v {
//!         Value::Text(s) => { l.user = s; true }
//!         _ => false,
//!     })
//!     .bind("host.addr", |l| l.host.clone().map(Value::from), |l, v| match v {
//!         Value::Text(s) => { l.host = Some(s); true }
//!         _ => false,
//!     });
//!
//! let cell = Eid::now();
//! let src = Login { user: "alan1".into(), host: Some("batwing ave".into()) };
//! let mut tx = Tx::new();
//! binding.write_cell(&mut tx, Eid::NIL, cell, &src).unwrap();
//!
//! let mut dst = Login::default();
//! binding.read_cell(&tx, cell, &mut dst).unwrap();
//! assert_eq!(dst, src);
//! ```

use tracing::trace;

use crate::error::{BindingError, DecodeError};
use crate::model::{Eid, OpCode, TagSpec, Tx, TxOp, Value};

/// Reads a field as a [`Value`]. `None` means the field has no value.
pub type Getter<T> = fn(&T) -> Option<Value>;

/// Stores a [`Value`] into a field. Returns false when the value's type
/// does not fit the field.
pub type Setter<T> = fn(&mut T, Value) -> bool;

/// One attribute of a bound type.
pub struct AttrBinding<T> {
    pub attr: TagSpec,
    pub get: Getter<T>,
    pub set: Setter<T>,
}

impl<T> Clone for AttrBinding<T> {
    fn clone(&self) -> Self {
        Self {
            attr: self.attr.clone(),
            get: self.get,
            set: self.set,
        }
    }
}

impl<T> std::fmt::Debug for AttrBinding<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttrBinding").field("attr", &self.attr.canonic).finish()
    }
}

/// The attribute table for one cell type.
pub struct CellBinding<T> {
    schema: TagSpec,
    attrs: Vec<AttrBinding<T>>,
}

impl<T> Clone for CellBinding<T> {
    fn clone(&self) -> Self {
        Self {
            schema: self.schema.clone(),
            attrs: self.attrs.clone(),
        }
    }
}

impl<T> std::fmt::Debug for CellBinding<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CellBinding")
            .field("schema", &self.schema.canonic)
            .field("attrs", &self.attrs)
            .finish()
    }
}

impl<T> CellBinding<T> {
    /// Starts a binding for cells of the data model named `schema`.
    pub fn new(schema: &str) -> Self {
        Self {
            schema: TagSpec::parse(schema),
            attrs: Vec::new(),
        }
    }

    /// Adds an attribute named by the tag expression `attr`.
    pub fn bind(mut self, attr: &str, get: Getter<T>, set: Setter<T>) -> Self {
        self.attrs.push(AttrBinding {
            attr: TagSpec::parse(attr),
            get,
            set,
        });
        self
    }

    /// The composite id of the data model.
    pub fn schema_id(&self) -> Eid {
        self.schema.id
    }

    pub fn schema(&self) -> &TagSpec {
        &self.schema
    }

    pub fn attrs(&self) -> &[AttrBinding<T>] {
        &self.attrs
    }

    /// Appends an UpsertCell op, one UpsertAttr per bound attribute, and a
    /// Commit.
    ///
    /// Every field is read before anything is appended, so a missing field
    /// leaves `tx` untouched.
    pub fn write_cell(&self, tx: &mut Tx, parent: Eid, cell: Eid, src: &T) -> Result<(), BindingError> {
        let values = self
            .attrs
            .iter()
            .map(|binding| {
                (binding.get)(src).ok_or_else(|| BindingError::MissingField {
                    attr: binding.attr.canonic.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let ops_before = tx.ops.len();
        let arena_before = tx.arena.len();
        let result = self.append_ops(tx, parent, cell, &values);
        if result.is_err() {
            tx.ops.truncate(ops_before);
            tx.arena.truncate(arena_before);
        }
        result
    }

    fn append_ops(&self, tx: &mut Tx, parent: Eid, cell: Eid, values: &[Value]) -> Result<(), BindingError> {
        let mut op = TxOp::new(OpCode::UpsertCell);
        op.parent = parent;
        op.target = cell;
        op.attr = self.schema.id;
        tx.push_op_raw(&mut op, None)?;

        for (binding, value) in self.attrs.iter().zip(values) {
            let mut op = TxOp::new(OpCode::UpsertAttr);
            op.parent = parent;
            op.target = cell;
            op.attr = binding.attr.id;
            tx.push_op_value(&mut op, value)?;
        }

        let mut commit = TxOp::new(OpCode::Commit);
        tx.push_op_raw(&mut commit, None)?;
        Ok(())
    }

    /// Applies the UpsertAttr ops of `tx` that target `cell` to `dst`.
    ///
    /// Ops apply in order, so a later op for the same attribute wins.
    /// Attributes with no binding are skipped. Returns the number of ops
    /// applied.
    pub fn read_cell(&self, tx: &Tx, cell: Eid, dst: &mut T) -> Result<usize, BindingError> {
        let mut applied = 0;
        for op in tx.ops.iter().filter(|op| op.op_code == OpCode::UpsertAttr && op.target == cell) {
            let Some(binding) = self.attrs.iter().find(|b| b.attr.id == op.attr) else {
                trace!(attr = %op.attr.base32_suffix(), "skipping unbound attr");
                continue;
            };
            let value: Value = tx.load_value(op)?;
            let data_type = value.data_type() as u8;
            if !(binding.set)(dst, value) {
                return Err(BindingError::Decode(DecodeError::InvalidDataType { data_type }));
            }
            applied += 1;
        }
        Ok(applied)
    }
}
