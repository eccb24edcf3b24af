//! Append-only transaction logs.
//!
//! A log is encoded transactions written back-to-back with no framing of
//! its own; each transaction's header and counts already delimit it.

use std::io::{Read, Write};

use tracing::debug;

use crate::codec::primitives::{ByteSource, IoSource};
use crate::codec::tx::{DecodeOptions, decode_tx_from, encode_tx_into};
use crate::error::{DecodeError, EncodeError};
use crate::model::Tx;

/// Appends encoded transactions to a byte sink.
#[derive(Debug)]
pub struct TxLogWriter<W: Write> {
    inner: W,
    buf: Vec<u8>,
    written: u64,
}

impl<W: Write> TxLogWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            buf: Vec::new(),
            written: 0,
        }
    }

    /// Encodes `tx` and writes it in full.
    pub fn append(&mut self, tx: &Tx) -> Result<(), EncodeError> {
        self.buf.clear();
        encode_tx_into(tx, &mut self.buf)?;
        self.inner.write_all(&self.buf)?;
        self.written += 1;
        debug!(seq = self.written, bytes = self.buf.len(), "appended tx to log");
        Ok(())
    }

    /// Number of transactions appended so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn flush(&mut self) -> Result<(), EncodeError> {
        self.inner.flush()?;
        Ok(())
    }

    /// Flushes and returns the sink.
    pub fn into_inner(mut self) -> Result<W, EncodeError> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

/// Reads transactions back from a log, one at a time.
#[derive(Debug)]
pub struct TxLogReader<R: Read> {
    source: IoSource<R>,
    options: DecodeOptions,
    failed: bool,
}

impl<R: Read> TxLogReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_options(inner, DecodeOptions::default())
    }

    pub fn with_options(inner: R, options: DecodeOptions) -> Self {
        Self {
            source: IoSource::new(inner),
            options,
            failed: false,
        }
    }

    /// Returns the next transaction, or `None` at a clean end of log.
    ///
    /// A log that ends partway through a transaction yields
    /// [`DecodeError::UnexpectedEnd`].
    pub fn read_next(&mut self) -> Result<Option<Tx>, DecodeError> {
        let start = self.source.position();
        match decode_tx_from(&mut self.source, self.options) {
            Ok(tx) => Ok(Some(tx)),
            Err(err) if err.is_unexpected_end() && self.source.position() == start => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Total bytes consumed from the underlying reader.
    pub fn position(&self) -> usize {
        self.source.position()
    }

    pub fn into_inner(self) -> R {
        self.source.into_inner()
    }
}

impl<R: Read> Iterator for TxLogReader<R> {
    type Item = Result<Tx, DecodeError>;

    /// Stops after the first error; the stream position is then unknown.
    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = self.read_next().transpose();
        self.failed = matches!(item, Some(Err(_)));
        item
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Eid, OpCode, TxOp, TxStatus};

    fn tx_with(n: u64) -> Tx {
        let mut tx = Tx::new();
        tx.header.status = TxStatus::Synced;
        tx.header.route_to = [n, n + 1];
        let mut op = TxOp::new(OpCode::UpsertAttr);
        op.target = Eid([n, n, n]);
        tx.push_op_raw(&mut op, Some(&n.to_be_bytes())).unwrap();
        tx
    }

    #[test]
    fn test_log_roundtrip() {
        let mut writer = TxLogWriter::new(Vec::new());
        for n in 0..3 {
            writer.append(&tx_with(n)).unwrap();
        }
        assert_eq!(writer.written(), 3);
        let log = writer.into_inner().unwrap();

        let mut reader = TxLogReader::new(log.as_slice());
        for n in 0..3 {
            assert_eq!(reader.read_next().unwrap(), Some(tx_with(n)));
        }
        assert_eq!(reader.read_next().unwrap(), None);
        assert_eq!(reader.position(), log.len());
    }

    #[test]
    fn test_empty_log() {
        let mut reader = TxLogReader::new(&[0u8; 0][..]);
        assert_eq!(reader.read_next().unwrap(), None);
    }

    #[test]
    fn test_torn_tail_is_unexpected_end() {
        let mut writer = TxLogWriter::new(Vec::new());
        writer.append(&tx_with(1)).unwrap();
        writer.append(&tx_with(2)).unwrap();
        let mut log = writer.into_inner().unwrap();
        log.truncate(log.len() - 3);

        let results: Vec<_> = TxLogReader::new(log.as_slice()).collect();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap(), &tx_with(1));
        assert!(results[1].as_ref().unwrap_err().is_unexpected_end());
    }
}
