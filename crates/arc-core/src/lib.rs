//! Arc core: time-ordered entity ids, tags, and the transaction wire format.
//!
//! This crate provides the identity and transport primitives that Arc hosts
//! and apps share: 192-bit entity ids, order-independent tag composition,
//! and a binary transaction format with an append-only log codec.
//!
//! # Overview
//!
//! - **Time-ordered ids**: [`Eid::now`] ids sort by issue time and never
//!   regress within a process
//! - **Literal ids**: hashing a token yields a stable id with a zero high word
//! - **Tags**: combining literal ids by word-wise addition makes
//!   `"a.b"` and `"b.a"` the same id
//! - **Transactions**: fixed-width op records point into a single payload arena
//!
//! # Quick Start
//!
//! ```rust
//! use arc_core::{decode_tx, encode_tx, Eid, TagSpec, TxBuilder, Value};
//!
//! let login = TagSpec::parse("arc.login");
//! let cell = Eid::now();
//!
//! let tx = TxBuilder::new()
//!     .upsert_cell(Eid::NIL, cell, login.id, |c| c
//!         .attr(TagSpec::parse("user.tag").id, "alan1")
//!         .attr(TagSpec::parse("host.addr").id, "batwing ave")
//!     )
//!     .commit()
//!     .build()
//!     .unwrap();
//!
//! let bytes = encode_tx(&tx).unwrap();
//! let decoded = decode_tx(&bytes).unwrap();
//! assert_eq!(decoded, tx);
//! assert_eq!(decoded.load_value::<Value>(&decoded.ops[1]).unwrap(), Value::from("alan1"));
//! ```
//!
//! # Modules
//!
//! - [`model`]: Core data types (Eid, TagSpec, Value, Tx, builders, bindings)
//! - [`codec`]: Binary encoding/decoding, compression and log streaming
//! - [`validate`]: Semantic validation
//! - [`registry`]: App and type lookup
//! - [`error`]: Error types
//! - [`limits`]: Wire constants and decode limits
//!
//! # Security
//!
//! The decoder is designed to safely handle untrusted input:
//! - Op counts and arena sizes are bounded by configurable limits
//! - Every payload span is checked against the arena before use
//! - Truncated input is reported as [`ErrorKind::UnexpectedEnd`], never a panic
//!
//! # Wire Format
//!
//! Transactions use a big-endian binary format with optional zstd compression:
//! - Uncompressed: `ATX` magic + version + header + op records + arena
//! - Compressed: `ATXZ` magic + uncompressed size + zstd data
//!
//! [`decode_tx`] detects and handles both formats.

pub mod codec;
pub mod error;
pub mod limits;
pub mod model;
pub mod registry;
pub mod util;
pub mod validate;

// Re-export commonly used types at crate root
pub use codec::{
    decode_tx, decode_tx_with_options, encode_tx, encode_tx_compressed, read_tx, DecodeOptions,
    EncodeOptions, TxLogReader, TxLogWriter,
};
pub use error::{
    BindingError, DecodeError, EidError, EncodeError, ErrorKind, RegistryError, ValidationError,
};
pub use model::{
    AttrValue, CellBinding, DataType, Eid, EidGenerator, OpCode, PayloadSpan, SeriesIndex,
    TagSpec, Tx, TxBuilder, TxHeader, TxOp, TxStatus, Value,
};
pub use registry::{AppModule, AppRegistry, AttrDef, AttrSchema, MemoryRegistry, TypeRegistry};
pub use validate::{validate_tx, validate_tx_values, SchemaContext};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
