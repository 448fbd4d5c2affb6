//! Shared CPU tick counter and its background driver thread.
//!
//! Ticks are the emulator's only clock: instruction cost, sleep durations,
//! and batch cadence are all denominated in ticks. One dedicated thread
//! advances the counter once per [`TICK_PERIOD`] while the scheduler is
//! active; it is the *only* writer. Everything else takes relaxed reads.
//!
//! The contract is monotonicity, not rate: a reader that observed tick `t`
//! will only ever observe values `>= t`, and an operation costing `k` ticks
//! completes in finite time.

use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Interval between increments of the shared counter.
pub const TICK_PERIOD: Duration = Duration::from_millis(1);

/// Monotonic 64-bit tick counter.
///
/// Padded to its own cache line; every worker polls it between steps and
/// false sharing with neighboring state would put the hot loop on a
/// contended line.
#[derive(Debug, Default)]
pub struct TickCounter {
    ticks: CachePadded<AtomicU64>,
}

impl TickCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current tick. Relaxed: readers only need monotonicity.
    #[inline]
    pub fn now(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Advance the counter by `n` ticks. Called by the tick thread; tests
    /// drive it directly to make tick arithmetic deterministic.
    #[inline]
    pub fn advance(&self, n: u64) {
        self.ticks.fetch_add(n, Ordering::Relaxed);
    }
}

/// Handle to the background tick thread.
///
/// The thread increments the counter once per [`TICK_PERIOD`] until the
/// shared `finished` flag is set, then exits. `join` is idempotent.
#[derive(Debug)]
pub struct TickThread {
    handle: Option<JoinHandle<()>>,
}

impl TickThread {
    pub fn spawn(ticks: Arc<TickCounter>, finished: Arc<AtomicBool>) -> Self {
        let handle = thread::Builder::new()
            .name("tick-source".into())
            .spawn(move || {
                while !finished.load(Ordering::Acquire) {
                    thread::sleep(TICK_PERIOD);
                    ticks.advance(1);
                }
            })
            .expect("spawn tick thread");
        Self {
            handle: Some(handle),
        }
    }

    /// Wait for the tick thread to exit. Safe to call more than once.
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            // The tick thread has no panicking paths; a join error here
            // would mean the loop itself panicked.
            let _ = handle.join();
        }
    }
}

impl Drop for TickThread {
    fn drop(&mut self) {
        self.join();
    }
}
