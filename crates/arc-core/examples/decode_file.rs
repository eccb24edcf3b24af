//! Simple inspector for Arc transaction logs.
//!
//! Reads a file of back-to-back encoded transactions (or a single
//! compressed one) and prints a summary of each.

use std::fs;

use arc_core::codec::{decode_tx, TxLogReader};
use arc_core::limits::MAGIC_COMPRESSED;
use arc_core::model::{OpCode, Tx, Value};

fn format_value(tx: &Tx, op: &arc_core::TxOp) -> String {
    if op.payload.is_empty() {
        return "-".to_string();
    }
    match tx.load_value::<Value>(op) {
        Ok(Value::Text(s)) => {
            let preview: String = s.chars().take(60).collect();
            if s.len() > 60 {
                format!("\"{}...\"", preview)
            } else {
                format!("\"{}\"", preview)
            }
        }
        Ok(Value::Int64(v)) => format!("{}", v),
        Ok(Value::Float64(v)) => format!("{:.6}", v),
        Ok(Value::Bool(b)) => format!("{}", b),
        Ok(Value::Bytes(b)) => format!("BYTES[{}]", b.len()),
        Ok(Value::Eid(id)) => format!("EID({})", id),
        Ok(Value::Tag(spec)) => format!("TAG({})", spec),
        Err(_) => format!("RAW[{}]", op.payload.len),
    }
}

fn print_tx(index: usize, tx: &Tx) {
    println!(
        "\n=== Tx {} ({:?}, route {:x}:{:x}) ===",
        index, tx.header.status, tx.header.route_to[0], tx.header.route_to[1]
    );
    println!("Ops: {}  Arena: {} bytes", tx.ops.len(), tx.arena.len());

    let count = |code: OpCode| tx.ops.iter().filter(|op| op.op_code == code).count();
    println!("  MetaAttr: {}", count(OpCode::MetaAttr));
    println!("  UpsertCell: {}", count(OpCode::UpsertCell));
    println!("  UpsertAttr: {}", count(OpCode::UpsertAttr));
    println!("  RemoveAttr: {}", count(OpCode::RemoveAttr));
    println!("  Commit: {}", count(OpCode::Commit));

    for (i, op) in tx.ops.iter().take(20).enumerate() {
        println!(
            "[{}] {:?} target ..{} attr ..{} si ({}, {}) = {}",
            i,
            op.op_code,
            op.target.base32_suffix(),
            op.attr.base32_suffix(),
            op.si.0,
            op.si.1,
            format_value(tx, op)
        );
    }
    if tx.ops.len() > 20 {
        println!("... and {} more ops", tx.ops.len() - 20);
    }
}

fn main() {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "tx.log".to_string());

    println!("Reading: {}", path);

    let data = fs::read(&path).expect("Failed to read file");
    println!("File size: {} bytes", data.len());

    if data.starts_with(MAGIC_COMPRESSED) {
        let tx = decode_tx(&data).expect("Failed to decode");
        print_tx(0, &tx);
        return;
    }

    let mut reader = TxLogReader::new(data.as_slice());
    let mut index = 0;
    loop {
        match reader.read_next() {
            Ok(Some(tx)) => {
                print_tx(index, &tx);
                index += 1;
            }
            Ok(None) => break,
            Err(err) => {
                println!("\nStopped at byte {}: {}", reader.position(), err);
                break;
            }
        }
    }
    println!("\n{} transactions", index);
}
