//! Emulator configuration and the config-file loader.
//!
//! The config file is whitespace-separated `key value` pairs:
//!
//! ```text
//! num-cpu 4
//! scheduler "rr"
//! quantum-cycles 5
//! batch-process-freq 1
//! min-ins 1000
//! max-ins 2000
//! delays-per-exec 0
//! ```
//!
//! Loading is forgiving by contract: a missing file is the only fatal
//! error. Unknown keys and out-of-range values are reported as warnings and
//! the value is clamped (or the default kept); the emulator always starts
//! with a legal configuration.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::str::FromStr;

/// Hard bounds on worker count.
pub const NUM_CPU_MIN: u32 = 1;
pub const NUM_CPU_MAX: u32 = 128;

/// Scheduling policy for the worker pool.
///
/// Policy is a plain tagged choice consulted inside the worker loop; the two
/// paths share dispatch setup and teardown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerPolicy {
    /// First-come-first-served: a dispatched process runs to completion.
    Fcfs,
    /// Round-robin: a dispatched process runs at most `quantum` instructions.
    Rr,
}

impl FromStr for SchedulerPolicy {
    type Err = ();

    /// Accepts `fcfs` / `rr`, case-insensitive, optionally double-quoted.
    fn from_str(s: &str) -> Result<Self, ()> {
        match s.trim_matches('"').to_ascii_lowercase().as_str() {
            "fcfs" => Ok(SchedulerPolicy::Fcfs),
            "rr" => Ok(SchedulerPolicy::Rr),
            _ => Err(()),
        }
    }
}

impl fmt::Display for SchedulerPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerPolicy::Fcfs => write!(f, "fcfs"),
            SchedulerPolicy::Rr => write!(f, "rr"),
        }
    }
}

/// Immutable emulator configuration.
///
/// All tick-denominated fields (`batch_freq`, `delay_per_exec`) count ticks
/// of the shared counter, not wall time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    /// Number of logical cores, i.e. worker threads. `[1, 128]`.
    pub num_cpu: u32,
    /// Dispatch policy.
    pub scheduler: SchedulerPolicy,
    /// RR time slice in instructions. `>= 1`. Ignored under FCFS.
    pub quantum: u32,
    /// Ticks between synthesized batch processes. `>= 1`.
    pub batch_freq: u64,
    /// Minimum synthesized instruction count. `>= 1`.
    pub min_ins: u32,
    /// Maximum synthesized instruction count. `>= min_ins`.
    pub max_ins: u32,
    /// Ticks observed to elapse before each interpreter step. `>= 0`.
    pub delay_per_exec: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_cpu: 1,
            scheduler: SchedulerPolicy::Fcfs,
            quantum: 1,
            batch_freq: 1,
            min_ins: 1,
            max_ins: 5,
            delay_per_exec: 0,
        }
    }
}

impl Config {
    /// Check invariants on a hand-built configuration.
    ///
    /// [`Config::load`] clamps instead; `validate` exists for configs
    /// constructed in code.
    ///
    /// # Panics
    /// Panics on any out-of-range field.
    pub fn validate(&self) {
        assert!(
            (NUM_CPU_MIN..=NUM_CPU_MAX).contains(&self.num_cpu),
            "num_cpu must be in [{NUM_CPU_MIN}, {NUM_CPU_MAX}]"
        );
        assert!(self.quantum >= 1, "quantum must be >= 1");
        assert!(self.batch_freq >= 1, "batch_freq must be >= 1");
        assert!(self.min_ins >= 1, "min_ins must be >= 1");
        assert!(self.max_ins >= self.min_ins, "max_ins must be >= min_ins");
    }

    /// Load a configuration from the key/value file at `path`.
    ///
    /// Returns the configuration plus human-readable warnings for every
    /// unknown key and every clamped value. Only a missing/unreadable file
    /// is an error.
    pub fn load(path: impl AsRef<Path>) -> Result<(Config, Vec<String>), ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                ConfigError::MissingFile(path.display().to_string())
            } else {
                ConfigError::Io(err)
            }
        })?;
        Ok(Config::parse(&text))
    }

    /// Parse config text. Infallible: every malformed entry degrades to a
    /// warning and the previous (or default) value.
    pub fn parse(text: &str) -> (Config, Vec<String>) {
        let mut cfg = Config::default();
        let mut warnings = Vec::new();
        let mut tokens = text.split_whitespace();

        while let Some(key) = tokens.next() {
            let Some(value) = tokens.next() else {
                warnings.push(format!("key '{key}' has no value; ignored"));
                break;
            };
            match key {
                "num-cpu" => {
                    let v = parse_clamped(key, value, NUM_CPU_MIN, NUM_CPU_MAX, &mut warnings);
                    if let Some(v) = v {
                        cfg.num_cpu = v;
                    }
                }
                "scheduler" => match value.parse::<SchedulerPolicy>() {
                    Ok(policy) => cfg.scheduler = policy,
                    Err(()) => warnings.push(format!(
                        "scheduler '{value}' is not one of fcfs/rr; keeping {}",
                        cfg.scheduler
                    )),
                },
                "quantum-cycles" => {
                    if let Some(v) = parse_clamped(key, value, 1, u32::MAX, &mut warnings) {
                        cfg.quantum = v;
                    }
                }
                "batch-process-freq" => {
                    if let Some(v) = parse_clamped(key, value, 1, u32::MAX, &mut warnings) {
                        cfg.batch_freq = u64::from(v);
                    }
                }
                "min-ins" => {
                    if let Some(v) = parse_clamped(key, value, 1, u32::MAX, &mut warnings) {
                        cfg.min_ins = v;
                    }
                }
                "max-ins" => {
                    if let Some(v) = parse_clamped(key, value, 1, u32::MAX, &mut warnings) {
                        cfg.max_ins = v;
                    }
                }
                "delays-per-exec" => {
                    if let Some(v) = parse_clamped(key, value, 0, u32::MAX, &mut warnings) {
                        cfg.delay_per_exec = u64::from(v);
                    }
                }
                _ => warnings.push(format!("unknown key '{key}'; ignored")),
            }
        }

        if cfg.max_ins < cfg.min_ins {
            warnings.push(format!(
                "max-ins {} < min-ins {}; raising max-ins to {}",
                cfg.max_ins, cfg.min_ins, cfg.min_ins
            ));
            cfg.max_ins = cfg.min_ins;
        }

        (cfg, warnings)
    }
}

/// Parse an integer field, clamping into `[lo, hi]` with a warning.
/// A non-numeric value keeps the current setting (warned, `None`).
fn parse_clamped(
    key: &str,
    value: &str,
    lo: u32,
    hi: u32,
    warnings: &mut Vec<String>,
) -> Option<u32> {
    match value.parse::<i64>() {
        Ok(n) => {
            let clamped = n.clamp(i64::from(lo), i64::from(hi)) as u32;
            if i64::from(clamped) != n {
                warnings.push(format!("{key} {n} out of range; clamped to {clamped}"));
            }
            Some(clamped)
        }
        Err(_) => {
            warnings.push(format!("{key} '{value}' is not an integer; ignored"));
            None
        }
    }
}

/// Errors from config loading. Bad values are not errors (they clamp).
#[derive(Debug)]
#[non_exhaustive]
pub enum ConfigError {
    /// Config file does not exist.
    MissingFile(String),
    /// Other I/O failure while reading the file.
    Io(io::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingFile(path) => write!(f, "config file not found: {path}"),
            ConfigError::Io(err) => write!(f, "failed to read config file: {err}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(err) => Some(err),
            _ => None,
        }
    }
}
