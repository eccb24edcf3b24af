//! Typed attribute values carried in a transaction's payload arena.
//!
//! Anything that implements [`AttrValue`] can be marshalled into the arena
//! with [`crate::model::Tx::marshal_value`] and loaded back with
//! [`crate::model::Tx::load_value`]. The built-in [`Value`] enum covers the
//! common scalar types and tags every payload with a [`DataType`] byte.

use crate::codec::primitives::{Reader, Writer};
use crate::error::DecodeError;
use crate::model::{Eid, TagSpec};

/// A value that can be written to and read from an op payload.
///
/// Implementations must be self-delimiting: `decode` reads exactly the
/// bytes `encode` wrote.
pub trait AttrValue: Sized {
    /// Appends the encoded value to `writer`.
    fn encode(&self, writer: &mut Writer);

    /// Reads one value from `reader`.
    fn decode(reader: &mut Reader<'_>) -> Result<Self, DecodeError>;
}

/// Type tag of a [`Value`] payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DataType {
    Bool = 1,
    Int64 = 2,
    Float64 = 3,
    Text = 4,
    Bytes = 5,
    Eid = 6,
    Tag = 7,
}

impl DataType {
    /// Creates a DataType from its wire representation.
    pub fn from_u8(v: u8) -> Option<DataType> {
        match v {
            1 => Some(DataType::Bool),
            2 => Some(DataType::Int64),
            3 => Some(DataType::Float64),
            4 => Some(DataType::Text),
            5 => Some(DataType::Bytes),
            6 => Some(DataType::Eid),
            7 => Some(DataType::Tag),
            _ => None,
        }
    }
}

/// A dynamically typed attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int64(i64),
    Float64(f64),
    /// UTF-8 text.
    Text(String),
    /// Opaque bytes.
    Bytes(Vec<u8>),
    /// A reference to another entity.
    Eid(Eid),
    /// A composite tag; the id and canonic string survive encoding, the
    /// literal list is rebuilt from the canonic string.
    Tag(TagSpec),
}

impl Value {
    /// Returns the data type of this value.
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Bool(_) => DataType::Bool,
            Value::Int64(_) => DataType::Int64,
            Value::Float64(_) => DataType::Float64,
            Value::Text(_) => DataType::Text,
            Value::Bytes(_) => DataType::Bytes,
            Value::Eid(_) => DataType::Eid,
            Value::Tag(_) => DataType::Tag,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_eid(&self) -> Option<Eid> {
        match self {
            Value::Eid(id) => Some(*id),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<Eid> for Value {
    fn from(v: Eid) -> Self {
        Value::Eid(v)
    }
}

impl From<TagSpec> for Value {
    fn from(v: TagSpec) -> Self {
        Value::Tag(v)
    }
}
