//! Time-based EID generation.
//!
//! All generator calls share one piece of state: a rolling entropy seed and
//! the last issued time stamp. Both live behind a single mutex so the clock
//! read, the monotonic clamp, and the seed update form one atomic step.
//! That is what makes the ordering contract hold across threads:
//!
//! ```text
//! for every `now` issued after `prev`:  now >= prev.sub(Eid::EPSILON)
//! ```
//!
//! A stamp is the 128-bit `(w0, w1)` time value with the low entropy bits
//! cleared. Each call issues a stamp at least one tick (`ENTROPY_MASK + 1`)
//! past the previous one, so a regressing wall clock or a burst of calls in
//! the same nanosecond still yields strictly increasing stamps. The
//! entropy bits then vary freely below the stamp, which is the jitter
//! `EPSILON` tolerates.

use std::time::{SystemTime, UNIX_EPOCH};

use lazy_static::lazy_static;
use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::error::EidError;
use crate::model::eid::{ENTROPY_MASK, Eid, NANOSEC_STEP};

const TICK: u128 = ENTROPY_MASK as u128 + 1;
const STAMP_MASK: u128 = !(ENTROPY_MASK as u128);
const INITIAL_SEED: u64 = 0x3773_0000_0000_3773;

/// Source of wall-clock time as `(unix_seconds, nanoseconds)`.
pub trait Clock: Send + Sync {
    fn now(&self) -> (i64, u32);
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> (i64, u32) {
        unix_parts(SystemTime::now())
    }
}

/// Splits a `SystemTime` into signed seconds and non-negative nanos.
pub fn unix_parts(t: SystemTime) -> (i64, u32) {
    match t.duration_since(UNIX_EPOCH) {
        Ok(d) => (d.as_secs() as i64, d.subsec_nanos()),
        Err(before) => {
            let d = before.duration();
            let secs = -(d.as_secs() as i64);
            match d.subsec_nanos() {
                0 => (secs, 0),
                n => (secs - 1, 1_000_000_000 - n),
            }
        }
    }
}

#[derive(Debug)]
struct GenState {
    seed: u64,
    last: u128,
}

impl GenState {
    /// Advances the seed and returns two entropy words (splitmix64).
    fn next_entropy(&mut self, frac: u64) -> (u64, u64) {
        self.seed = self.seed.wrapping_add(0x9E37_79B9_7F4A_7C15 ^ frac.wrapping_mul(377_377_733));
        let a = mix64(self.seed);
        self.seed = self.seed.wrapping_add(0x9E37_79B9_7F4A_7C15);
        (a, mix64(self.seed))
    }
}

#[inline]
fn mix64(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[inline]
fn stamp_of(id: Eid) -> u128 {
    ((id.0[0] as u128) << 64) | id.0[1] as u128
}

/// Issues time-ordered, collision-resistant EIDs.
///
/// Most callers want [`Eid::now`], which uses the process-wide instance.
pub struct EidGenerator {
    clock: Box<dyn Clock>,
    state: Mutex<GenState>,
}

impl std::fmt::Debug for EidGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EidGenerator").finish_non_exhaustive()
    }
}

impl Default for EidGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl EidGenerator {
    /// Creates a generator on the system clock.
    pub fn new() -> Self {
        Self::with_clock(Box::new(SystemClock))
    }

    /// Creates a generator reading time from `clock`.
    ///
    /// The seed is salted with the process id and the current time so
    /// separate processes diverge.
    pub fn with_clock(clock: Box<dyn Clock>) -> Self {
        let (secs, nanos) = SystemClock.now();
        let salt = (std::process::id() as u64) << 32 ^ (secs as u64) ^ (nanos as u64).rotate_left(17);
        Self {
            clock,
            state: Mutex::new(GenState {
                seed: INITIAL_SEED ^ mix64(salt),
                last: 0,
            }),
        }
    }

    /// Replaces the entropy seed (for reproducible tests).
    pub fn with_seed(self, seed: u64) -> Self {
        self.state.lock().seed = seed;
        self
    }

    /// Returns the next id. Never returns `NIL` or `WILDCARD`.
    pub fn next(&self) -> Eid {
        let mut st = self.state.lock();
        let (secs, nanos) = self.clock.now();
        let frac = (nanos as u64).wrapping_mul(NANOSEC_STEP);
        let observed = stamp_of(Eid::from_unix_parts(secs, nanos)) & STAMP_MASK;

        let mut stamp = observed;
        loop {
            let floor = st.last.saturating_add(TICK);
            if stamp < floor {
                stamp = floor;
            }
            // w1 must hold at least one tick so `sub(EPSILON)` never wraps it.
            if (stamp as u64 as u128) < TICK {
                stamp += TICK;
            }
            st.last = stamp;

            let (e1, e2) = st.next_entropy(frac);
            let id = Eid([
                (stamp >> 64) as u64,
                stamp as u64 | (e1 & ENTROPY_MASK),
                e2,
            ]);
            if !id.is_sentinel() {
                if stamp != observed {
                    trace!(
                        id = %id.base32_suffix(),
                        ahead = (stamp - observed.min(stamp)) as u64,
                        "eid stamp clamped past last issued"
                    );
                }
                return id;
            }
            warn!(?id, "generator hit a reserved sentinel, resampling");
        }
    }

    /// Maps `t` to an id using this generator's entropy.
    ///
    /// Unlike [`EidGenerator::next`] this does not clamp against earlier
    /// ids; callers asking for an explicit time get that time. A result
    /// equal to a reserved sentinel is reported, not corrected.
    pub fn from_time(&self, t: SystemTime, add_entropy: bool) -> Result<Eid, EidError> {
        let (secs, nanos) = unix_parts(t);
        let mut id = Eid::from_unix_parts(secs, nanos);
        if add_entropy {
            let frac = (nanos as u64).wrapping_mul(NANOSEC_STEP);
            let (e1, e2) = self.state.lock().next_entropy(frac);
            id.0[1] ^= e1 & ENTROPY_MASK;
            id.0[2] ^= e2;
        }
        id.ensure_live()
    }
}

lazy_static! {
    static ref GLOBAL: EidGenerator = EidGenerator::new();
}

/// The process-wide generator behind [`Eid::now`].
pub fn global() -> &'static EidGenerator {
    &GLOBAL
}

impl Eid {
    /// Returns a fresh time-derived id from the process-wide generator.
    ///
    /// Statistically unique even when called in rapid succession.
    pub fn now() -> Eid {
        GLOBAL.next()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
    use std::time::Duration;

    use super::*;

    /// A clock tests can move by hand.
    #[derive(Default)]
    struct ManualClock {
        secs: AtomicI64,
        nanos: AtomicU32,
    }

    impl ManualClock {
        fn set(&self, secs: i64, nanos: u32) {
            self.secs.store(secs, Ordering::SeqCst);
            self.nanos.store(nanos, Ordering::SeqCst);
        }
    }

    impl Clock for Arc<ManualClock> {
        fn now(&self) -> (i64, u32) {
            (self.secs.load(Ordering::SeqCst), self.nanos.load(Ordering::SeqCst))
        }
    }

    fn manual(secs: i64, nanos: u32) -> (Arc<ManualClock>, EidGenerator) {
        let clock = Arc::new(ManualClock::default());
        clock.set(secs, nanos);
        let generator = EidGenerator::with_clock(Box::new(clock.clone())).with_seed(42);
        (clock, generator)
    }

    #[test]
    fn test_same_instant_still_increases() {
        let (_clock, generator) = manual(1_700_000_000, 0);
        let mut prev = generator.next();
        for _ in 0..10_000 {
            let now = generator.next();
            assert!(now > prev.sub(Eid::EPSILON));
            assert_ne!(now, prev);
            prev = now;
        }
        assert_eq!(prev.unix(), 1_700_000_000);
    }

    #[test]
    fn test_clock_regression_is_clamped() {
        let (clock, generator) = manual(1_700_000_100, 999_999_999);
        let high = generator.next();
        clock.set(1_700_000_000, 0);
        let after = generator.next();
        assert!(after >= high.sub(Eid::EPSILON));
        assert_eq!(after.unix(), 1_700_000_100);
    }

    #[test]
    fn test_window_of_64() {
        let generator = EidGenerator::new();
        let mut prev_ids = [Eid::NIL; 64];
        for slot in prev_ids.iter_mut() {
            *slot = generator.next();
        }
        for i in 0..200_000usize {
            let now = generator.next();
            for prev in &prev_ids {
                let floor = prev.sub(Eid::EPSILON);
                assert!(now >= floor, "{floor:?} > {now:?}");
            }
            prev_ids[i & 63] = now;
        }
    }

    #[test]
    fn test_epoch_never_yields_sentinel() {
        let (_clock, generator) = manual(0, 0);
        for _ in 0..1_000 {
            let id = generator.next();
            assert!(!id.is_sentinel());
            assert!(id.0[1] > ENTROPY_MASK);
        }
    }

    #[test]
    fn test_from_time_keeps_the_requested_time() {
        let generator = EidGenerator::new();
        let t = UNIX_EPOCH + Duration::new(1_600_000_000, 250_000_000);
        let plain = generator.from_time(t, false).unwrap();
        assert_eq!(plain, Eid::from_unix_parts(1_600_000_000, 250_000_000));

        let a = generator.from_time(t, true).unwrap();
        let b = generator.from_time(t, true).unwrap();
        assert_ne!(a, b);
        assert_eq!(a.0[0], plain.0[0]);
        assert_eq!(a.0[1] & !ENTROPY_MASK, plain.0[1] & !ENTROPY_MASK);
    }

    #[test]
    fn test_from_time_reports_sentinel() {
        let generator = EidGenerator::new();
        assert_eq!(
            generator.from_time(UNIX_EPOCH, false),
            Err(EidError::InvalidSentinel { id: Eid::NIL })
        );
    }

    #[test]
    fn test_unix_parts_before_epoch() {
        let t = UNIX_EPOCH - Duration::new(1, 250_000_000);
        assert_eq!(unix_parts(t), (-2, 750_000_000));
        assert_eq!(unix_parts(UNIX_EPOCH - Duration::from_secs(3)), (-3, 0));
    }

    #[test]
    fn test_global_now() {
        let a = Eid::now();
        let b = Eid::now();
        assert!(b > a.sub(Eid::EPSILON));
        assert!(!a.is_literal());
        assert!(a.unix() > 1_500_000_000);
    }
}
