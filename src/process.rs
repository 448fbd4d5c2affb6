//! The process record: identity, program, cursor, scratch memory, and the
//! lifecycle state machine.
//!
//! # Ownership
//!
//! A process is created once, wrapped in an [`Arc`], and owned by the
//! registry for the rest of the run. The ready queue and workers hold
//! shared, non-owning clones of the same handle; nothing is ever removed
//! from the registry, so FINISHED processes stay visible to listings and
//! reports.
//!
//! # Locking discipline
//!
//! Identity (`id`, `name`), the instruction list, the creation timestamp,
//! and the log sink are immutable after construction and never locked. All
//! mutable fields live in one [`Mutex`]-guarded state block; public
//! accessors take the lock per call, and workers hold it only across
//! single-field reads/writes — never across an interpreter step's log I/O —
//! so listings and reports never stall behind execution.
//!
//! # Lifecycle
//!
//! ```text
//! Ready ──► Running ──► Finished
//!   ▲         │ ▲
//!   │         ▼ │ (deadline passed)
//!   └──── Sleeping
//! ```
//!
//! `core_assigned >= 0` only while Running or Sleeping-on-core (FCFS holds
//! the core across a sleep; RR releases it and requeues).

use crate::instruction::Instruction;
use crate::sink::{now_timestamp, LogSink};
use ahash::AHashMap;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

/// Monotonically assigned process id, unique across a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessId(pub u64);

impl std::fmt::Display for ProcessId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessStatus {
    /// Runnable; in the ready queue or about to be.
    Ready,
    /// Dispatched on a core.
    Running,
    /// Parked on a SLEEP instruction until its tick deadline.
    Sleeping,
    /// Terminal: completed or faulted. Never requeued.
    Finished,
}

impl std::fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProcessStatus::Ready => "Ready",
            ProcessStatus::Running => "Running",
            ProcessStatus::Sleeping => "Sleeping",
            ProcessStatus::Finished => "Finished",
        };
        write!(f, "{s}")
    }
}

/// Runtime record of an active FOR execution.
#[derive(Clone, Debug)]
pub(crate) struct ForFrame {
    /// The FOR's body, cloned into the frame at push time.
    pub body: Vec<Instruction>,
    /// Total iterations requested.
    pub repeat: u32,
    /// Iterations fully completed.
    pub iteration: u32,
    /// Cursor into `body` for the current iteration.
    pub inner_ip: usize,
}

impl ForFrame {
    pub(crate) fn new(body: Vec<Instruction>, repeat: u32) -> Self {
        Self {
            body,
            repeat,
            iteration: 0,
            inner_ip: 0,
        }
    }
}

/// Mutable process state, guarded by the per-process mutex.
#[derive(Debug)]
pub(crate) struct ProcState {
    /// Outer instruction pointer; `0..=instructions.len()`.
    pub ip: usize,
    /// Scratch memory. Values are 16-bit by construction; every write path
    /// clamps into `[0, 65535]`.
    pub memory: AHashMap<String, u16>,
    /// Active FOR frames, innermost last.
    pub for_stack: Vec<ForFrame>,
    pub status: ProcessStatus,
    /// Core id while Running/Sleeping-on-core, −1 otherwise.
    pub core_assigned: i32,
    /// Tick at which a sleeping process becomes runnable.
    pub sleep_until_tick: u64,
    /// The cursor is parked on a SLEEP whose completion has not yet been
    /// consumed by `wake`.
    pub sleep_pending: bool,
    /// Set on the first interpreter fault; terminal together with Finished.
    pub error_flag: bool,
}

/// A synthetic process.
pub struct Process {
    id: ProcessId,
    name: String,
    instructions: Vec<Instruction>,
    created_at: String,
    sink: Arc<dyn LogSink>,
    state: Mutex<ProcState>,
}

/// Shared, non-owning reference to a process record.
pub type ProcessHandle = Arc<Process>;

impl Process {
    /// Construct a process in the Ready state with an empty scratch memory.
    pub fn new(
        id: ProcessId,
        name: impl Into<String>,
        instructions: Vec<Instruction>,
        sink: Arc<dyn LogSink>,
    ) -> ProcessHandle {
        Arc::new(Self {
            id,
            name: name.into(),
            instructions,
            created_at: now_timestamp(),
            sink,
            state: Mutex::new(ProcState {
                ip: 0,
                memory: AHashMap::new(),
                for_stack: Vec::new(),
                status: ProcessStatus::Ready,
                core_assigned: -1,
                sleep_until_tick: 0,
                sleep_pending: false,
                error_flag: false,
            }),
        })
    }

    pub fn id(&self) -> ProcessId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn created_at(&self) -> &str {
        &self.created_at
    }

    pub(crate) fn lock_state(&self) -> MutexGuard<'_, ProcState> {
        self.state.lock().expect("process mutex poisoned")
    }

    // ------------------------------------------------------------------
    // Observers (each takes the lock for the duration of one read)
    // ------------------------------------------------------------------

    pub fn status(&self) -> ProcessStatus {
        self.lock_state().status
    }

    pub fn is_finished(&self) -> bool {
        self.status() == ProcessStatus::Finished
    }

    /// Outer instruction pointer: completed top-level instructions.
    pub fn ip(&self) -> usize {
        self.lock_state().ip
    }

    /// `(ip, total)` as shown by listings.
    pub fn progress(&self) -> (usize, usize) {
        (self.ip(), self.instructions.len())
    }

    pub fn core_assigned(&self) -> i32 {
        self.lock_state().core_assigned
    }

    pub fn sleep_until_tick(&self) -> u64 {
        self.lock_state().sleep_until_tick
    }

    pub fn error_flag(&self) -> bool {
        self.lock_state().error_flag
    }

    /// Scratch memory, name-sorted for stable display.
    pub fn memory_snapshot(&self) -> Vec<(String, u16)> {
        let state = self.lock_state();
        let mut pairs: Vec<_> = state
            .memory
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        drop(state);
        pairs.sort();
        pairs
    }

    // ------------------------------------------------------------------
    // Transitions (workers)
    // ------------------------------------------------------------------

    /// Ready/queued, no core.
    pub fn mark_ready(&self) {
        let mut state = self.lock_state();
        state.status = ProcessStatus::Ready;
        state.core_assigned = -1;
    }

    /// Dispatched: Running on `core`.
    pub fn begin_running(&self, core: i32) {
        debug_assert!(core >= 0);
        let mut state = self.lock_state();
        state.status = ProcessStatus::Running;
        state.core_assigned = core;
    }

    /// Release the core without changing status.
    pub fn release_core(&self) {
        self.lock_state().core_assigned = -1;
    }

    /// A sleep deadline exists that `wake` has not yet consumed.
    pub(crate) fn sleep_pending(&self) -> bool {
        self.lock_state().sleep_pending
    }

    // ------------------------------------------------------------------
    // Log sink
    // ------------------------------------------------------------------

    /// Append a timestamped log record for a PRINT executed on `core`.
    pub(crate) fn append_log(&self, core: i32, msg: &str) -> io::Result<()> {
        self.sink
            .append(&format!("({}) Core:{core} \"{msg}\"", now_timestamp()))
    }

    /// Append the terminal fault record.
    pub(crate) fn append_fault(&self, core: i32, msg: &str) {
        // A sink failure here has nowhere left to go; the fault flag is
        // already the terminal signal.
        let _ = self
            .sink
            .append(&format!("({}) Core:{core} Fault: {msg}", now_timestamp()));
    }
}

impl std::fmt::Debug for Process {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Process")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("instructions", &self.instructions.len())
            .field("state", &*self.lock_state())
            .finish()
    }
}
