//! The batch generator: a background producer of synthetic processes.
//!
//! One generator thread exists for the lifetime of the runtime; a single
//! atomic toggles it between IDLE and RUNNING. `start` transitions
//! IDLE→RUNNING via compare-and-set, so concurrent callers race to exactly
//! one transition and a second start is a no-op. `stop` swaps back.
//!
//! While RUNNING, the thread polls the tick counter once per millisecond
//! and, every `batch_freq` ticks, synthesizes `process<counter>`, registers
//! it, and enqueues it. The thread exits as soon as the shared `finished`
//! flag is set.

use crate::rng::SynthRng;
use crate::runtime::Shared;
use crate::synth;
use crate::ticks::TICK_PERIOD;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

/// Control handle for the generator thread.
pub struct BatchGenerator {
    running: Arc<AtomicBool>,
    counter: Arc<AtomicU64>,
    rng: Arc<Mutex<SynthRng>>,
}

impl BatchGenerator {
    pub(crate) fn new(rng: SynthRng) -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            counter: Arc::new(AtomicU64::new(0)),
            rng: Arc::new(Mutex::new(rng)),
        }
    }

    /// IDLE → RUNNING. Returns false (no-op) when already running.
    pub fn start(&self) -> bool {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// RUNNING → IDLE. Returns false when already idle.
    pub fn stop(&self) -> bool {
        self.running.swap(false, Ordering::AcqRel)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Processes synthesized so far.
    pub fn generated(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }

    /// Spawn the generator thread. Called once by the runtime.
    pub(crate) fn spawn(&self, shared: Arc<Shared>) -> JoinHandle<()> {
        let running = Arc::clone(&self.running);
        let counter = Arc::clone(&self.counter);
        let rng = Arc::clone(&self.rng);
        thread::Builder::new()
            .name("batch-generator".into())
            .spawn(move || generator_loop(shared, running, counter, rng))
            .expect("spawn batch generator thread")
    }
}

fn generator_loop(
    shared: Arc<Shared>,
    running: Arc<AtomicBool>,
    counter: Arc<AtomicU64>,
    rng: Arc<Mutex<SynthRng>>,
) {
    let mut last_tick = shared.ticks.now();
    let mut was_running = false;

    while !shared.is_finished() {
        if !running.load(Ordering::Acquire) {
            was_running = false;
            thread::sleep(TICK_PERIOD);
            continue;
        }
        if !was_running {
            // RUNNING edge: restart the cadence from the current tick.
            was_running = true;
            last_tick = shared.ticks.now();
        }

        let now = shared.ticks.now();
        if now.saturating_sub(last_tick) >= shared.config.batch_freq {
            let n = counter.fetch_add(1, Ordering::Relaxed) + 1;
            let name = format!("process{n}");
            let program = {
                let mut rng = rng.lock().expect("generator rng mutex poisoned");
                let count =
                    rng.range_u32(shared.config.min_ins, shared.config.max_ins);
                synth::synthesize(&name, count, &mut rng)
            };
            // A name collision (user created a `processN`) drops this batch
            // slot; the next cadence uses a fresh counter value.
            let _ = shared.create_process(&name, program);
            last_tick = now;
        }
        thread::sleep(TICK_PERIOD);
    }
}
