//! CPU utilization snapshot, process listing, and the report file writer.
//!
//! A [`SystemReport`] is built from a consistent registry snapshot plus the
//! core count; rendering it produces the text shown by `screen -ls` and
//! written to `csopesy-log.txt` by `report-util`. Utilization counts the
//! distinct cores currently holding a non-finished process.

use crate::process::{ProcessHandle, ProcessStatus};
use crate::registry::ProcessRegistry;
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::Path;

/// Default report file name.
pub const REPORT_FILE: &str = "csopesy-log.txt";

/// One process line of the listing.
#[derive(Clone, Debug)]
pub struct ProcessLine {
    pub name: String,
    pub created_at: String,
    pub core: i32,
    pub current: usize,
    pub total: usize,
    pub status: ProcessStatus,
    pub errored: bool,
}

/// Point-in-time system summary.
#[derive(Clone, Debug)]
pub struct SystemReport {
    pub cores_total: u32,
    pub cores_used: u32,
    pub running: Vec<ProcessLine>,
    pub finished: Vec<ProcessLine>,
}

impl SystemReport {
    /// Snapshot the registry. `cores_total` is the configured worker count.
    pub fn capture(registry: &ProcessRegistry, cores_total: u32) -> Self {
        let mut running = Vec::new();
        let mut finished = Vec::new();
        let mut cores_in_use: BTreeSet<i32> = BTreeSet::new();

        for handle in registry.snapshot() {
            let line = line_for(&handle);
            if line.status == ProcessStatus::Finished {
                finished.push(line);
            } else {
                if line.core >= 0 {
                    cores_in_use.insert(line.core);
                }
                running.push(line);
            }
        }

        Self {
            cores_total,
            cores_used: cores_in_use.len() as u32,
            running,
            finished,
        }
    }

    pub fn cores_available(&self) -> u32 {
        self.cores_total.saturating_sub(self.cores_used)
    }

    /// Utilization percentage: distinct busy cores over total.
    pub fn utilization_pct(&self) -> f64 {
        if self.cores_total == 0 {
            return 0.0;
        }
        f64::from(self.cores_used) / f64::from(self.cores_total) * 100.0
    }

    /// The listing text shared by `screen -ls` and the report file.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "----------------------------------------");
        let _ = writeln!(out, "CPU Stats:");
        let _ = writeln!(
            out,
            "Cores Used:      {} / {}",
            self.cores_used, self.cores_total
        );
        let _ = writeln!(out, "Cores Available: {}", self.cores_available());
        let _ = writeln!(out, "CPU Utilization: {:.2}%", self.utilization_pct());
        let _ = writeln!(out, "----------------------------------------");

        let _ = writeln!(out, "\nRunning Processes:");
        if self.running.is_empty() {
            let _ = writeln!(out, "No running processes.");
        }
        for line in &self.running {
            let _ = writeln!(
                out,
                "{:<15}{:<24}Core: {:<4}{} / {}",
                format!("- {}", line.name),
                format!("({})", line.created_at),
                line.core,
                line.current,
                line.total
            );
        }

        let _ = writeln!(out, "\nFinished Processes:");
        if self.finished.is_empty() {
            let _ = writeln!(out, "No finished processes.");
        }
        for line in &self.finished {
            let label = if line.errored { "Faulted" } else { "Finished" };
            let _ = writeln!(
                out,
                "{:<15}{:<24}{:<10}{} / {}",
                format!("- {}", line.name),
                format!("({})", line.created_at),
                label,
                line.current,
                line.total
            );
        }
        let _ = writeln!(out, "----------------------------------------");
        out
    }

    /// Write the rendered report to `path`.
    pub fn write_to(&self, path: impl AsRef<Path>) -> io::Result<()> {
        fs::write(path, self.render())
    }
}

fn line_for(handle: &ProcessHandle) -> ProcessLine {
    let (current, total) = handle.progress();
    ProcessLine {
        name: handle.name().to_string(),
        created_at: handle.created_at().to_string(),
        core: handle.core_assigned(),
        current,
        total,
        status: handle.status(),
        errored: handle.error_flag(),
    }
}
