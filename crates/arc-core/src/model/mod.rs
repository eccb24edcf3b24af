//! Data model types for Arc.
//!
//! This module contains the core types for representing Arc data:
//! - Entity ids (192-bit, time-ordered or literal)
//! - Tags (order-independent composite ids)
//! - Values (typed attribute payloads)
//! - Transactions (ops plus a payload arena)
//! - Builders and bindings (ergonomic construction)

pub mod binding;
pub mod builder;
pub mod eid;
pub mod generator;
pub mod tag;
pub mod tx;
pub mod value;

pub use binding::{AttrBinding, CellBinding, Getter, Setter};
pub use builder::{CellBuilder, TxBuilder};
pub use eid::{Eid, Key16, Key24, BASE16_LEN, BASE32_LEN, ENTROPY_MASK, NANOSEC_STEP};
pub use generator::{Clock, EidGenerator, SystemClock};
pub use tag::{TagLiteral, TagSpec};
pub use tx::{OpCode, PayloadSpan, SeriesIndex, Tx, TxHeader, TxOp, TxStatus};
pub use value::{AttrValue, DataType, Value};
