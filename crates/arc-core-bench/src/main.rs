//! Benchmark for Arc id generation and transaction serialization.
//!
//! Loads login records from a JSON file (or synthesizes them), writes them
//! as cells through a binding, and times encoding, compression, decoding
//! and log streaming.

use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use arc_core::codec::{TxLogReader, TxLogWriter};
use arc_core::model::{CellBinding, Eid, EidGenerator, TagSpec, Tx, Value};
use serde::{Deserialize, Serialize};

// =============================================================================
// JSON DATA STRUCTURES
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
struct Login {
    user: String,
    host: String,
    #[serde(default)]
    visits: i64,
    #[serde(default)]
    verified: bool,
}

#[derive(Debug, Serialize)]
struct Timing {
    name: &'static str,
    nanos_per_iter: f64,
    mb_per_sec: Option<f64>,
}

#[derive(Debug, Serialize)]
struct Summary {
    records: usize,
    ops: usize,
    arena_bytes: usize,
    encoded_bytes: usize,
    compressed_bytes: usize,
    timings: Vec<Timing>,
}

// =============================================================================
// BINDING
// =============================================================================

fn login_binding() -> CellBinding<Login> {
    CellBinding::<Login>::new("arc.login")
        .bind(
            "user.tag",
            |l| Some(Value::Text(l.user.clone())),
            |l, v| match v {
                Value::Text(s) => {
                    l.user = s;
                    true
                }
                _ => false,
            },
        )
        .bind(
            "host.addr",
            |l| Some(Value::Text(l.host.clone())),
            |l, v| match v {
                Value::Text(s) => {
                    l.host = s;
                    true
                }
                _ => false,
            },
        )
        .bind(
            "visit.count",
            |l| Some(Value::Int64(l.visits)),
            |l, v| match v {
                Value::Int64(n) => {
                    l.visits = n;
                    true
                }
                _ => false,
            },
        )
        .bind(
            "verified",
            |l| Some(Value::Bool(l.verified)),
            |l, v| match v {
                Value::Bool(b) => {
                    l.verified = b;
                    true
                }
                _ => false,
            },
        )
}

fn synthesize(count: usize) -> Vec<Login> {
    (0..count)
        .map(|i| Login {
            user: format!("user{}", i),
            host: format!("{}.{}.{}.{}", 10, (i >> 16) & 0xFF, (i >> 8) & 0xFF, i & 0xFF),
            visits: (i % 977) as i64,
            verified: i % 3 == 0,
        })
        .collect()
}

fn build_tx(binding: &CellBinding<Login>, logins: &[Login]) -> Tx {
    let mut tx = Tx::new();
    for login in logins {
        binding
            .write_cell(&mut tx, Eid::NIL, Eid::now(), login)
            .expect("Failed to write cell");
    }
    tx
}

fn per_iter(elapsed: Duration, iters: u32) -> f64 {
    elapsed.as_nanos() as f64 / iters as f64
}

fn throughput(bytes: usize, nanos_per_iter: f64) -> f64 {
    (bytes as f64 / 1_000_000.0) / (nanos_per_iter / 1e9)
}

fn main() {
    let data_path = std::env::args().nth(1);

    let logins = match data_path.as_deref().filter(|p| Path::new(p).exists()) {
        Some(path) => {
            println!("Loading logins from: {}", path);
            let json = fs::read_to_string(path).expect("Failed to read logins file");
            serde_json::from_str::<Vec<Login>>(&json).expect("Failed to parse JSON")
        }
        None => {
            println!("No data file, synthesizing 100000 logins");
            synthesize(100_000)
        }
    };

    if logins.is_empty() {
        println!("No logins to benchmark");
        return;
    }

    let mut timings = Vec::new();

    // =========================================================================
    // Id generation
    // =========================================================================

    const ID_ITERS: u32 = 1_000_000;
    let generator = EidGenerator::new();
    let start = Instant::now();
    let mut last = Eid::NIL;
    for _ in 0..ID_ITERS {
        last = generator.next();
    }
    let eid_ns = per_iter(start.elapsed(), ID_ITERS);
    assert!(last.is_set());
    println!("\nEidGenerator::next: {:.1} ns/id", eid_ns);
    timings.push(Timing {
        name: "eid_next",
        nanos_per_iter: eid_ns,
        mb_per_sec: None,
    });

    let start = Instant::now();
    let mut last_uuid = uuid::Uuid::nil();
    for _ in 0..ID_ITERS {
        last_uuid = uuid::Uuid::now_v7();
    }
    let uuid_ns = per_iter(start.elapsed(), ID_ITERS);
    assert!(!last_uuid.is_nil());
    println!("Uuid::now_v7:       {:.1} ns/id", uuid_ns);
    timings.push(Timing {
        name: "uuid_v7",
        nanos_per_iter: uuid_ns,
        mb_per_sec: None,
    });

    const TAG_ITERS: u32 = 100_000;
    let start = Instant::now();
    for _ in 0..TAG_ITERS {
        std::hint::black_box(TagSpec::parse(std::hint::black_box("arc.login.host.addr")));
    }
    let tag_ns = per_iter(start.elapsed(), TAG_ITERS);
    println!("TagSpec::parse (4 tokens): {:.1} ns", tag_ns);
    timings.push(Timing {
        name: "tag_parse",
        nanos_per_iter: tag_ns,
        mb_per_sec: None,
    });

    // =========================================================================
    // Transaction encoding
    // =========================================================================

    let binding = login_binding();
    let build_start = Instant::now();
    let tx = build_tx(&binding, &logins);
    let build_time = build_start.elapsed();
    println!(
        "\nBuilt tx: {} ops, {} arena bytes in {:?}",
        tx.ops.len(),
        tx.arena.len(),
        build_time
    );

    const ENCODE_ITERS: u32 = 10;
    let start = Instant::now();
    let mut encoded = Vec::new();
    for _ in 0..ENCODE_ITERS {
        encoded = arc_core::encode_tx(&tx).expect("Failed to encode");
    }
    let encode_ns = per_iter(start.elapsed(), ENCODE_ITERS);
    let encode_mbps = throughput(encoded.len(), encode_ns);
    println!("\nUncompressed: {} bytes, {:.2} MB/s", encoded.len(), encode_mbps);
    timings.push(Timing {
        name: "encode",
        nanos_per_iter: encode_ns,
        mb_per_sec: Some(encode_mbps),
    });

    let start = Instant::now();
    let compressed = arc_core::encode_tx_compressed(&tx, 3).expect("Failed to compress");
    let compress_ns = start.elapsed().as_nanos() as f64;
    println!(
        "Compressed (level 3): {} bytes, ratio {:.1}x",
        compressed.len(),
        encoded.len() as f64 / compressed.len() as f64
    );
    timings.push(Timing {
        name: "encode_compressed",
        nanos_per_iter: compress_ns,
        mb_per_sec: Some(throughput(encoded.len(), compress_ns)),
    });

    // =========================================================================
    // Transaction decoding
    // =========================================================================

    for _ in 0..3 {
        let _ = arc_core::decode_tx(&encoded).expect("Failed to decode");
    }
    let start = Instant::now();
    for _ in 0..ENCODE_ITERS {
        let decoded = arc_core::decode_tx(&encoded).expect("Failed to decode");
        assert_eq!(decoded.ops.len(), tx.ops.len());
    }
    let decode_ns = per_iter(start.elapsed(), ENCODE_ITERS);
    let decode_mbps = throughput(encoded.len(), decode_ns);
    println!("\nDecode (uncompressed): {:.2} MB/s", decode_mbps);
    timings.push(Timing {
        name: "decode",
        nanos_per_iter: decode_ns,
        mb_per_sec: Some(decode_mbps),
    });

    let start = Instant::now();
    for _ in 0..ENCODE_ITERS {
        let decoded = arc_core::decode_tx(&compressed).expect("Failed to decode compressed");
        assert_eq!(decoded.ops.len(), tx.ops.len());
    }
    let decode_z_ns = per_iter(start.elapsed(), ENCODE_ITERS);
    let decode_z_mbps = throughput(encoded.len(), decode_z_ns);
    println!("Decode (compressed): {:.2} MB/s (uncompressed equivalent)", decode_z_mbps);
    timings.push(Timing {
        name: "decode_compressed",
        nanos_per_iter: decode_z_ns,
        mb_per_sec: Some(decode_z_mbps),
    });

    // Read every cell back through the binding.
    let decoded = arc_core::decode_tx(&encoded).expect("Failed to decode");
    let start = Instant::now();
    let mut first = Login::default();
    let applied = binding
        .read_cell(&decoded, decoded.ops[0].target, &mut first)
        .expect("Failed to read cell");
    assert_eq!(applied, binding.attrs().len());
    assert_eq!(first.user, logins[0].user);
    println!("read_cell (first cell): {:?}", start.elapsed());

    // =========================================================================
    // Log streaming
    // =========================================================================

    const CHUNK: usize = 1000;
    let mut writer = TxLogWriter::new(Vec::new());
    let log_start = Instant::now();
    for chunk in logins.chunks(CHUNK) {
        writer.append(&build_tx(&binding, chunk)).expect("Failed to append");
    }
    let log = writer.into_inner().expect("Failed to flush log");
    let append_ns = log_start.elapsed().as_nanos() as f64;

    let read_start = Instant::now();
    let mut ops = 0;
    for tx in TxLogReader::new(log.as_slice()) {
        ops += tx.expect("Failed to read log").ops.len();
    }
    let read_ns = read_start.elapsed().as_nanos() as f64;
    assert_eq!(ops, tx.ops.len());
    println!(
        "\nLog: {} bytes, append {:.2} MB/s, read {:.2} MB/s",
        log.len(),
        throughput(log.len(), append_ns),
        throughput(log.len(), read_ns)
    );
    timings.push(Timing {
        name: "log_read",
        nanos_per_iter: read_ns,
        mb_per_sec: Some(throughput(log.len(), read_ns)),
    });

    // =========================================================================
    // Summary
    // =========================================================================

    let summary = Summary {
        records: logins.len(),
        ops: tx.ops.len(),
        arena_bytes: tx.arena.len(),
        encoded_bytes: encoded.len(),
        compressed_bytes: compressed.len(),
        timings,
    };
    println!("\n=== Summary ===");
    println!(
        "{}",
        serde_json::to_string_pretty(&summary).expect("Failed to serialize summary")
    );
}
