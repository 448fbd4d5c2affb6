//! coresim: a tick-driven CPU scheduler emulator.
//!
//! Models a machine with a configurable number of logical cores, a pool of
//! synthetic processes each holding a tiny imperative instruction stream,
//! and a scheduler dispatching those processes under FCFS or preemptive
//! round-robin. A shared monotonic tick counter advances in the background;
//! instruction cost, sleep durations, and batch-generation cadence are all
//! denominated in ticks.
//!
//! # Architecture
//!
//! ```text
//!  batch generator ──synthesize──► registry ──enqueue──► ready queue
//!       (1 thread)                (name → handle)        (FIFO + condvar)
//!                                                             │
//!  tick thread ──1 ms──► tick counter ◄──observe── worker pool (num_cpu)
//!       (1 thread)         (atomic)                    │
//!                                                 interpreter step
//!                                            (PRINT / DECLARE / ADD /
//!                                             SUBTRACT / SLEEP / FOR)
//! ```
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Immutable run configuration and the key/value file loader |
//! | [`ticks`] | Monotonic tick counter plus its background driver |
//! | [`instruction`] | Structural instruction model and program text parser |
//! | [`process`] | Process records: cursor, scratch memory, lifecycle FSM |
//! | [`interp`] | One-instruction stepping with FOR frames and faults |
//! | [`queue`] | FIFO ready queue with blocking pop and shutdown sentinel |
//! | [`registry`] | Name → handle map, at most one registration per name |
//! | [`synth`] | Random well-formed program synthesis |
//! | [`batch`] | Background producer of synthesized processes |
//! | [`workers`] | Per-core dispatch loops (FCFS / RR) |
//! | [`report`] | Utilization snapshots, listings, report file |
//! | [`sink`] | Per-process log sinks (file, memory) |
//! | [`rng`] | Deterministic PRNG for synthesis |
//! | [`runtime`] | The `Runtime` value owning all shared state |
//!
//! # Example
//!
//! ```no_run
//! use coresim_rs::{Config, Runtime};
//!
//! let (config, warnings) = Config::load("config.txt").expect("config");
//! for w in &warnings {
//!     eprintln!("config: {w}");
//! }
//! let mut rt = Runtime::new(config);
//! rt.start();
//! rt.generator_start();
//! // ... drive via shell commands ...
//! rt.finish();
//! rt.join_all();
//! ```

pub mod batch;
pub mod config;
pub mod instruction;
pub mod interp;
pub mod process;
pub mod queue;
pub mod registry;
pub mod report;
pub mod rng;
pub mod sink;
pub mod synth;
pub mod ticks;
pub mod workers;

pub mod runtime;

pub use config::{Config, ConfigError, SchedulerPolicy};
pub use instruction::{parse_program, Instruction, Operand, ParseError, ParseErrorKind};
pub use interp::{StepOutcome, MEMORY_MAX};
pub use process::{Process, ProcessHandle, ProcessId, ProcessStatus};
pub use queue::{Popped, ReadyQueue};
pub use registry::{ProcessRegistry, RegistryError};
pub use report::{ProcessLine, SystemReport, REPORT_FILE};
pub use rng::SynthRng;
pub use runtime::{Runtime, SpawnError};
pub use sink::{
    FileSink, FileSinkFactory, LogSink, MemorySink, MemorySinkFactory, NullSink,
    SharedMemorySinkFactory, SinkFactory,
};
pub use synth::{synthesize, MAX_FOR_DEPTH, VARIABLE_ALPHABET};
pub use ticks::{TickCounter, TickThread, TICK_PERIOD};
