//! Binary encoding/decoding for Arc transactions.

pub mod log;
pub mod primitives;
pub mod tx;
pub mod value;

pub use log::{TxLogReader, TxLogWriter};
pub use primitives::{ByteSource, IoSource, Reader, Writer, zigzag_decode, zigzag_encode};
pub use tx::{
    decode_tx, decode_tx_from, decode_tx_with_options, decompress, encode_tx,
    encode_tx_compressed, encode_tx_compressed_with_options, encode_tx_into,
    encode_tx_with_options, encoded_len, read_tx, read_tx_with_options, DecodeOptions,
    EncodeOptions,
};
pub use value::{decode_value, decode_value_of, encode_value, encode_value_raw};
