//! The runtime: the single value that owns the emulator's shared state.
//!
//! Everything the original design kept in file-global singletons — the
//! configuration, the tick counter, the process-id allocator — lives on one
//! [`Runtime`] value and is passed to every component at construction.
//! There is no hidden global state.
//!
//! # Thread groups
//!
//! ```text
//! Runtime::start ──┬── tick thread        (1)
//!                  ├── worker threads     (num_cpu)
//!                  └── batch generator    (1, toggled by start/stop)
//! ```
//!
//! [`Runtime::finish`] sets the shared `finished` flag and signals the
//! ready queue; all three groups observe it within one polling interval.
//! [`Runtime::join_all`] then joins every thread and is idempotent; `Drop`
//! invokes both as a backstop so shared state outlives every thread.

use crate::batch::BatchGenerator;
use crate::config::Config;
use crate::instruction::Instruction;
use crate::process::{Process, ProcessHandle, ProcessId};
use crate::queue::ReadyQueue;
use crate::registry::{ProcessRegistry, RegistryError};
use crate::report::SystemReport;
use crate::rng::SynthRng;
use crate::sink::{FileSinkFactory, SinkFactory};
use crate::synth;
use crate::ticks::{TickCounter, TickThread};
use crate::workers;
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{SystemTime, UNIX_EPOCH};

/// Errors from creating and enqueueing a process.
#[derive(Debug)]
#[non_exhaustive]
pub enum SpawnError {
    /// The name is already registered; nothing was enqueued.
    DuplicateName(String),
    /// The process log sink could not be created.
    Sink(io::Error),
}

impl fmt::Display for SpawnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpawnError::DuplicateName(name) => {
                write!(f, "process name '{name}' already exists")
            }
            SpawnError::Sink(err) => write!(f, "failed to create process log: {err}"),
        }
    }
}

impl std::error::Error for SpawnError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SpawnError::Sink(err) => Some(err),
            _ => None,
        }
    }
}

/// State shared by workers, the batch generator, and the shell-facing API.
pub(crate) struct Shared {
    pub(crate) config: Config,
    pub(crate) ticks: Arc<TickCounter>,
    pub(crate) finished: Arc<AtomicBool>,
    pub(crate) queue: ReadyQueue,
    pub(crate) registry: ProcessRegistry,
    next_pid: AtomicU64,
    sinks: Arc<dyn SinkFactory>,
}

impl Shared {
    pub(crate) fn new(config: Config, sinks: Arc<dyn SinkFactory>) -> Arc<Self> {
        Arc::new(Self {
            config,
            ticks: Arc::new(TickCounter::new()),
            finished: Arc::new(AtomicBool::new(false)),
            queue: ReadyQueue::new(),
            registry: ProcessRegistry::new(),
            next_pid: AtomicU64::new(1),
            sinks,
        })
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Create a process, register it, and enqueue it.
    ///
    /// The duplicate check runs before the sink is created so an existing
    /// process's log file is not truncated by a name collision.
    pub(crate) fn create_process(
        &self,
        name: &str,
        instructions: Vec<Instruction>,
    ) -> Result<ProcessHandle, SpawnError> {
        if self.registry.contains(name) {
            return Err(SpawnError::DuplicateName(name.to_string()));
        }
        let sink = self.sinks.create(name).map_err(SpawnError::Sink)?;
        let id = ProcessId(self.next_pid.fetch_add(1, Ordering::Relaxed));
        let process = Process::new(id, name, instructions, sink);
        self.registry
            .register(Arc::clone(&process))
            .map_err(|err| match err {
                RegistryError::DuplicateName(name) => SpawnError::DuplicateName(name),
            })?;
        self.queue.push(Arc::clone(&process));
        Ok(process)
    }
}

/// The emulator runtime. See the module docs for the thread model.
pub struct Runtime {
    shared: Arc<Shared>,
    generator: BatchGenerator,
    synth_rng: Mutex<SynthRng>,
    tick_thread: Option<TickThread>,
    worker_threads: Vec<JoinHandle<()>>,
    generator_thread: Option<JoinHandle<()>>,
    started: bool,
}

impl Runtime {
    /// Construct with per-process log files in the working directory and a
    /// wall-clock-derived synthesis seed.
    pub fn new(config: Config) -> Self {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(1);
        Self::with_sinks(config, Arc::new(FileSinkFactory::new(".")), seed)
    }

    /// Construct with an explicit sink factory and synthesis seed. Tests
    /// use this for captured logs and reproducible programs.
    pub fn with_sinks(config: Config, sinks: Arc<dyn SinkFactory>, seed: u64) -> Self {
        config.validate();
        let shared = Shared::new(config, sinks);
        let mut master = SynthRng::new(seed);
        let generator = BatchGenerator::new(master.fork());
        Self {
            shared,
            generator,
            synth_rng: Mutex::new(master),
            tick_thread: None,
            worker_threads: Vec::new(),
            generator_thread: None,
            started: false,
        }
    }

    /// Spawn the tick thread, the worker pool, and the generator thread.
    /// Idempotent. The batch generator stays idle until
    /// [`Runtime::generator_start`].
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        self.tick_thread = Some(TickThread::spawn(
            Arc::clone(&self.shared.ticks),
            Arc::clone(&self.shared.finished),
        ));
        self.worker_threads = workers::spawn_workers(&self.shared);
        self.generator_thread = Some(self.generator.spawn(Arc::clone(&self.shared)));
    }

    /// Begin synthesizing batch processes. Returns false when already
    /// running: the second start is a no-op.
    pub fn generator_start(&self) -> bool {
        self.generator.start()
    }

    /// Stop synthesizing. Returns false when the generator was idle.
    pub fn generator_stop(&self) -> bool {
        self.generator.stop()
    }

    /// Create one synthesized process (the `screen -s` path).
    pub fn create_synthetic_process(&self, name: &str) -> Result<ProcessHandle, SpawnError> {
        let program = {
            let mut rng = self.synth_rng.lock().expect("synth rng mutex poisoned");
            let count = rng.range_u32(self.shared.config.min_ins, self.shared.config.max_ins);
            synth::synthesize(name, count, &mut rng)
        };
        self.shared.create_process(name, program)
    }

    /// Create a process from an explicit program. Scenario tests and
    /// manually authored programs use this.
    pub fn submit_program(
        &self,
        name: &str,
        instructions: Vec<Instruction>,
    ) -> Result<ProcessHandle, SpawnError> {
        self.shared.create_process(name, instructions)
    }

    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    pub fn registry(&self) -> &ProcessRegistry {
        &self.shared.registry
    }

    pub fn ticks(&self) -> &TickCounter {
        &self.shared.ticks
    }

    pub fn queue_len(&self) -> usize {
        self.shared.queue.len()
    }

    /// Point-in-time utilization and listing snapshot.
    pub fn report(&self) -> SystemReport {
        SystemReport::capture(&self.shared.registry, self.shared.config.num_cpu)
    }

    /// Signal shutdown: set the finished flag and wake the ready queue.
    pub fn finish(&self) {
        self.shared.finished.store(true, Ordering::Release);
        self.shared.queue.shutdown();
    }

    /// Join the tick thread, all workers, and the generator. Idempotent;
    /// call after [`Runtime::finish`].
    pub fn join_all(&mut self) {
        if let Some(mut tick) = self.tick_thread.take() {
            tick.join();
        }
        for handle in self.worker_threads.drain(..) {
            // Worker loops catch their own panics; a join error here is a
            // bug in the loop itself, not in a process program.
            let _ = handle.join();
        }
        if let Some(handle) = self.generator_thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.finish();
        self.join_all();
    }
}
