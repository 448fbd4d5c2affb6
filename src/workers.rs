//! The worker pool: one thread per logical core, pulling from the ready
//! queue and driving the interpreter.
//!
//! # Dispatch
//!
//! Both policies share setup (transition to Running, assign the core) and
//! teardown (release the core on Done/Fault, never requeue a finished
//! process); the policy itself is a tagged choice inside the loop:
//!
//! - **FCFS** holds the core until the process finishes. A sleeping process
//!   keeps its core and the worker spin-yields in 1 ms slices until the
//!   deadline passes.
//! - **RR** counts interpreter steps; at `quantum` the process goes back to
//!   the queue. A sleep releases the core immediately and requeues; the
//!   process is observed still-sleeping on later dispatches and requeued
//!   again until its deadline passes.
//!
//! # Tick cost
//!
//! The tick thread is the only writer of the counter. Workers charge
//! per-instruction cost by *observing* `delay_per_exec` ticks elapse before
//! each step.
//!
//! # Panic isolation
//!
//! Each step runs under `catch_unwind`; a panic becomes a fault on that
//! process and the worker keeps serving the queue. No panic crosses a
//! thread boundary.

use crate::config::SchedulerPolicy;
use crate::interp::{self, StepOutcome};
use crate::process::ProcessHandle;
use crate::queue::Popped;
use crate::runtime::Shared;
use crate::ticks::TICK_PERIOD;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Spawn one worker thread per configured core.
pub(crate) fn spawn_workers(shared: &Arc<Shared>) -> Vec<JoinHandle<()>> {
    (0..shared.config.num_cpu)
        .map(|core| {
            let shared = Arc::clone(shared);
            thread::Builder::new()
                .name(format!("core-{core}"))
                .spawn(move || worker_loop(core as i32, shared))
                .expect("spawn worker thread")
        })
        .collect()
}

fn worker_loop(core: i32, shared: Arc<Shared>) {
    loop {
        match shared.queue.pop_blocking() {
            Popped::Shutdown => return,
            Popped::Process(process) => match shared.config.scheduler {
                SchedulerPolicy::Fcfs => run_fcfs(core, &process, &shared),
                SchedulerPolicy::Rr => run_rr(core, &process, &shared),
            },
        }
    }
}

/// FCFS dispatch: run to completion, holding the core across sleeps.
fn run_fcfs(core: i32, process: &ProcessHandle, shared: &Shared) {
    process.begin_running(core);
    loop {
        if shared.is_finished() {
            process.mark_ready();
            return;
        }
        if process.sleep_pending() {
            if shared.ticks.now() < process.sleep_until_tick() {
                // The slot is held: FCFS does not release the core during
                // sleep.
                thread::sleep(TICK_PERIOD);
                continue;
            }
            if let StepOutcome::Done = interp::wake(process) {
                process.release_core();
                return;
            }
            continue;
        }
        observe_exec_delay(shared);
        match guarded_step(core, process, shared) {
            StepOutcome::Advanced | StepOutcome::YieldSleep => continue,
            StepOutcome::Done | StepOutcome::Fault(_) => {
                process.release_core();
                return;
            }
        }
    }
}

/// RR dispatch: up to `quantum` steps, releasing the core on sleep.
fn run_rr(core: i32, process: &ProcessHandle, shared: &Shared) {
    // A requeued sleeper whose deadline has not passed goes straight back.
    if process.sleep_pending() && shared.ticks.now() < process.sleep_until_tick() {
        if shared.is_finished() {
            // Requeueing now would keep the queue non-empty and stall
            // worker exit; the process is abandoned mid-sleep.
            return;
        }
        let only_sleepers = shared.queue.is_empty();
        shared.queue.push(Arc::clone(process));
        if only_sleepers {
            // Nothing runnable: pace the requeue cycle to the tick period
            // instead of spinning on pop/push.
            thread::sleep(TICK_PERIOD);
        }
        return;
    }

    process.begin_running(core);
    if process.sleep_pending() {
        if let StepOutcome::Done = interp::wake(process) {
            process.release_core();
            return;
        }
    }

    let mut executed = 0u32;
    loop {
        if shared.is_finished() {
            process.mark_ready();
            return;
        }
        observe_exec_delay(shared);
        match guarded_step(core, process, shared) {
            StepOutcome::Advanced => {
                executed += 1;
                if executed >= shared.config.quantum {
                    process.mark_ready();
                    shared.queue.push(Arc::clone(process));
                    return;
                }
            }
            StepOutcome::YieldSleep => {
                process.mark_ready();
                shared.queue.push(Arc::clone(process));
                return;
            }
            StepOutcome::Done | StepOutcome::Fault(_) => {
                process.release_core();
                return;
            }
        }
    }
}

/// Block until `delay_per_exec` ticks have been observed to elapse (or
/// shutdown is signalled).
fn observe_exec_delay(shared: &Shared) {
    let delay = shared.config.delay_per_exec;
    if delay == 0 {
        return;
    }
    let target = shared.ticks.now() + delay;
    while shared.ticks.now() < target && !shared.is_finished() {
        thread::sleep(TICK_PERIOD);
    }
}

/// One interpreter step with panic isolation.
fn guarded_step(core: i32, process: &ProcessHandle, shared: &Shared) -> StepOutcome {
    let now = shared.ticks.now();
    match catch_unwind(AssertUnwindSafe(|| interp::step(process, core, now))) {
        Ok(outcome) => outcome,
        Err(_) => interp::fault(process, core, "panic during step".to_string()),
    }
}
