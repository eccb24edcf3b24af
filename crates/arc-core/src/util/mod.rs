//! Text encodings shared by the id and tag types.

pub mod base32;
