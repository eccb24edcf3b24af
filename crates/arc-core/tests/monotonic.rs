//! Cross-thread ordering of generated ids.

use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;

use arc_core::model::{Eid, EidGenerator};

const THREADS: usize = 4;
const PER_THREAD: usize = 50_000;

#[test]
fn shared_generator_never_regresses() {
    let generator = Arc::new(EidGenerator::new());
    let latest = Arc::new(Mutex::new(Eid::NIL));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let generator = Arc::clone(&generator);
            let latest = Arc::clone(&latest);
            thread::spawn(move || {
                let mut window = [Eid::NIL; 64];
                for i in 0..PER_THREAD {
                    // Snapshot only; other threads keep calling next() meanwhile.
                    let seen = *latest.lock();
                    let now = generator.next();
                    assert!(now >= seen.sub(Eid::EPSILON), "{now:?} behind {seen:?}");
                    {
                        let mut latest = latest.lock();
                        *latest = (*latest).max(now);
                    }

                    for prev in window.iter().filter(|p| p.is_set()) {
                        assert!(now > *prev, "{now:?} not after {prev:?}");
                    }
                    window[i & 63] = now;
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
#[ignore = "ten million ids; run with --ignored"]
fn ten_million_ids_stay_within_epsilon_of_last_64() {
    let generator = EidGenerator::new();
    let mut window = [Eid::NIL; 64];
    for slot in window.iter_mut() {
        *slot = generator.next();
    }
    for i in 0..10_000_000usize {
        let now = generator.next();
        for prev in &window {
            assert!(now >= prev.sub(Eid::EPSILON), "{now:?} behind {prev:?} at {i}");
        }
        window[i & 63] = now;
    }
}

#[test]
fn global_ids_are_distinct_across_threads() {
    let handles: Vec<_> = (0..THREADS)
        .map(|_| thread::spawn(|| (0..1000).map(|_| Eid::now()).collect::<Vec<_>>()))
        .collect();

    let mut all: Vec<Eid> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
    let total = all.len();
    all.sort_unstable();
    all.dedup();
    assert_eq!(all.len(), total);
    assert!(all.iter().all(|id| !id.is_sentinel() && !id.is_literal()));
}
