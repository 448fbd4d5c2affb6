//! Per-process log sinks.
//!
//! Every process owns exactly one sink; all log writes for a process go
//! through it and are serialized by its internal mutex, then flushed, so a
//! line is on disk (or captured) before the instruction that produced it is
//! considered executed. There is deliberately no second ad-hoc stream per
//! write.
//!
//! Sinks are fallible: a failed append surfaces to the interpreter, which
//! turns it into a process fault instead of panicking a worker thread.

use chrono::Local;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Timestamp in the emulator's display format: `MM/DD/YYYY HH:MM:SS AM/PM`.
pub fn now_timestamp() -> String {
    Local::now().format("%m/%d/%Y %I:%M:%S %p").to_string()
}

/// Destination for a process's log lines.
///
/// Implementations are `Send + Sync`; appends from the owning worker and
/// reads from observers may overlap.
pub trait LogSink: Send + Sync + 'static {
    /// Append one line (no trailing newline in `line`) and flush.
    fn append(&self, line: &str) -> io::Result<()>;
}

// ============================================================================
// FileSink
// ============================================================================

/// File-backed sink: one `<name>.txt` per process, created eagerly with a
/// `Process: <name>` header.
pub struct FileSink {
    out: Mutex<BufWriter<File>>,
}

impl FileSink {
    /// Create/truncate the log file for `name` under `dir` and write the
    /// header line.
    pub fn create(dir: &Path, name: &str) -> io::Result<Self> {
        let file = File::create(dir.join(format!("{name}.txt")))?;
        let sink = Self {
            out: Mutex::new(BufWriter::new(file)),
        };
        sink.append(&format!("Process: {name}"))?;
        Ok(sink)
    }
}

impl LogSink for FileSink {
    fn append(&self, line: &str) -> io::Result<()> {
        let mut out = self.out.lock().expect("file sink mutex poisoned");
        writeln!(out, "{line}")?;
        out.flush()
    }
}

// ============================================================================
// MemorySink
// ============================================================================

/// In-memory sink for tests: captures lines for later inspection.
#[derive(Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the captured lines.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().expect("memory sink mutex poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().expect("memory sink mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LogSink for MemorySink {
    fn append(&self, line: &str) -> io::Result<()> {
        self.lines
            .lock()
            .expect("memory sink mutex poisoned")
            .push(line.to_string());
        Ok(())
    }
}

// ============================================================================
// NullSink
// ============================================================================

/// Discards everything. For load tests where log contents are irrelevant.
pub struct NullSink;

impl LogSink for NullSink {
    fn append(&self, _line: &str) -> io::Result<()> {
        Ok(())
    }
}

// ============================================================================
// Sink factories
// ============================================================================

/// Creates the sink for a newly constructed process.
///
/// The runtime owns one factory; production uses [`FileSinkFactory`],
/// tests swap in [`MemorySinkFactory`] to capture output.
pub trait SinkFactory: Send + Sync + 'static {
    fn create(&self, name: &str) -> io::Result<Arc<dyn LogSink>>;
}

/// Produces a [`FileSink`] per process in a fixed directory.
pub struct FileSinkFactory {
    dir: PathBuf,
}

impl FileSinkFactory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl SinkFactory for FileSinkFactory {
    fn create(&self, name: &str) -> io::Result<Arc<dyn LogSink>> {
        Ok(Arc::new(FileSink::create(&self.dir, name)?))
    }
}

/// Produces [`MemorySink`]s and retains a handle to each, keyed by process
/// name, so tests can read any process's log after the run.
#[derive(Default)]
pub struct MemorySinkFactory {
    sinks: Mutex<Vec<(String, Arc<MemorySink>)>>,
}

impl MemorySinkFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink created for `name`, if any.
    pub fn sink_for(&self, name: &str) -> Option<Arc<MemorySink>> {
        self.sinks
            .lock()
            .expect("sink factory mutex poisoned")
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, s)| Arc::clone(s))
    }
}

impl SinkFactory for MemorySinkFactory {
    fn create(&self, name: &str) -> io::Result<Arc<dyn LogSink>> {
        let sink = Arc::new(MemorySink::new());
        sink.append(&format!("Process: {name}"))?;
        self.sinks
            .lock()
            .expect("sink factory mutex poisoned")
            .push((name.to_string(), Arc::clone(&sink)));
        Ok(sink)
    }
}

/// One shared [`MemorySink`] handed to every process. Scenario tests use it
/// to observe the global interleaving of PRINT lines across processes.
#[derive(Default)]
pub struct SharedMemorySinkFactory {
    sink: Arc<MemorySink>,
}

impl SharedMemorySinkFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sink(&self) -> Arc<MemorySink> {
        Arc::clone(&self.sink)
    }
}

impl SinkFactory for SharedMemorySinkFactory {
    fn create(&self, _name: &str) -> io::Result<Arc<dyn LogSink>> {
        Ok(Arc::clone(&self.sink) as Arc<dyn LogSink>)
    }
}
