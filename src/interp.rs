//! The instruction interpreter: executes one instruction of a process per
//! call.
//!
//! # Stepping model
//!
//! [`step`] resolves the process cursor down through any active FOR frames
//! to the next *primitive* instruction (PRINT / DECLARE / ADD / SUBTRACT /
//! SLEEP), executes it, and advances the cursor. Encountering a FOR pushes
//! a frame and continues into its body within the same call, so every call
//! executes exactly one primitive; quantum accounting counts calls.
//!
//! The outer `ip` moves past a FOR only when its frame pops. Frame pops are
//! drained eagerly after each advance, so a process whose final primitive
//! completes its last FOR iteration reaches Finished in that same step.
//!
//! # Sleep
//!
//! SLEEP parks the process without advancing the cursor: observers see it
//! on the SLEEP instruction. The worker later calls [`wake`] once the tick
//! deadline passes, which consumes the pending sleep and advances the
//! cursor (the inner cursor when sleeping inside a FOR body).
//!
//! # Faults
//!
//! Any malformed construct that survives to execution (zero-repeat FOR,
//! empty variable name) and any log-sink failure becomes a [`StepOutcome::Fault`]:
//! the process is marked Finished with its error flag set, the fault is
//! logged, and it is never requeued. Faults never propagate to other
//! processes.
//!
//! # Locking
//!
//! The per-process lock is held for cursor and memory manipulation only.
//! PRINT performs its sink I/O with the lock released; the sink serializes
//! its own writes.

use crate::instruction::{Instruction, Operand};
use crate::process::{ForFrame, ProcState, Process, ProcessStatus};

/// Saturation bound for scratch-memory values.
pub const MEMORY_MAX: u16 = u16::MAX;

/// Result of one interpreter step, dispatched on by the worker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// Instruction executed; the process is ready for another step.
    Advanced,
    /// The process parked on a SLEEP; requeue on wake.
    YieldSleep,
    /// The process ran off the end of its program; it is Finished.
    Done,
    /// Interpreter fault; the process is Finished with its error flag set.
    Fault(String),
}

/// Execute one instruction of `process` on `core` at tick `now`.
///
/// Precondition: the process is Running with no pending sleep.
pub fn step(process: &Process, core: i32, now: u64) -> StepOutcome {
    let mut state = process.lock_state();
    debug_assert_eq!(state.status, ProcessStatus::Running);
    debug_assert!(!state.sleep_pending);

    let instr = match fetch(&mut state, process.instructions()) {
        Fetched::Primitive(instr) => instr,
        Fetched::Completed => {
            state.status = ProcessStatus::Finished;
            state.core_assigned = -1;
            return StepOutcome::Done;
        }
        Fetched::Fault(msg) => {
            drop(state);
            return fault(process, core, msg);
        }
    };

    match instr {
        Instruction::Print(msg) => {
            // Sink I/O happens with the process lock released; only the
            // owning worker mutates the cursor, so it cannot move under us.
            drop(state);
            if let Err(err) = process.append_log(core, &msg) {
                return fault(process, core, format!("log write failed: {err}"));
            }
            let mut state = process.lock_state();
            advance(&mut state);
            finish_check(&mut state, process.instructions().len())
        }
        Instruction::Declare(name, literal) => {
            if name.is_empty() {
                drop(state);
                return fault(process, core, "DECLARE with empty variable name".to_string());
            }
            let value = clamp16(i64::from(literal));
            state.memory.insert(name, value);
            advance(&mut state);
            finish_check(&mut state, process.instructions().len())
        }
        Instruction::Add { dest, src1, src2 } | Instruction::Subtract { dest, src1, src2 }
            if dest.is_empty() =>
        {
            let _ = (src1, src2);
            drop(state);
            fault(process, core, "arithmetic with empty destination name".to_string())
        }
        Instruction::Add { dest, src1, src2 } => {
            let a = resolve(&mut state, &src1);
            let b = resolve(&mut state, &src2);
            state.memory.insert(dest, clamp16(a + b));
            advance(&mut state);
            finish_check(&mut state, process.instructions().len())
        }
        Instruction::Subtract { dest, src1, src2 } => {
            let a = resolve(&mut state, &src1);
            let b = resolve(&mut state, &src2);
            state.memory.insert(dest, clamp16(a - b));
            advance(&mut state);
            finish_check(&mut state, process.instructions().len())
        }
        Instruction::Sleep(ticks) => {
            state.status = ProcessStatus::Sleeping;
            state.sleep_until_tick = now.saturating_add(ticks);
            state.sleep_pending = true;
            StepOutcome::YieldSleep
        }
        // fetch never returns a FOR; it pushes a frame instead.
        Instruction::For { .. } => unreachable!("fetch resolved to a primitive"),
    }
}

/// Consume a completed sleep: advance the cursor past the SLEEP instruction
/// and resume Running. Returns `Done` when the SLEEP was the final
/// instruction.
///
/// Precondition: a sleep is pending and its deadline has passed.
pub fn wake(process: &Process) -> StepOutcome {
    let mut state = process.lock_state();
    debug_assert!(state.sleep_pending, "wake without a pending sleep");
    state.sleep_pending = false;
    state.status = ProcessStatus::Running;
    advance(&mut state);
    finish_check(&mut state, process.instructions().len())
}

/// Terminal fault path: flag, finish, log. Also used by workers to convert
/// a caught panic into a process fault.
pub fn fault(process: &Process, core: i32, msg: String) -> StepOutcome {
    {
        let mut state = process.lock_state();
        state.error_flag = true;
        state.status = ProcessStatus::Finished;
        state.core_assigned = -1;
    }
    process.append_fault(core, &msg);
    StepOutcome::Fault(msg)
}

// ============================================================================
// Cursor machinery
// ============================================================================

enum Fetched {
    Primitive(Instruction),
    Completed,
    Fault(String),
}

/// Resolve the cursor to the next primitive, pushing FOR frames as they are
/// encountered and draining empty-bodied frames.
fn fetch(state: &mut ProcState, instructions: &[Instruction]) -> Fetched {
    loop {
        if let Some(frame) = state.for_stack.last_mut() {
            if frame.inner_ip < frame.body.len() {
                match frame.body[frame.inner_ip].clone() {
                    Instruction::For { body, repeat } => {
                        if repeat == 0 {
                            return Fetched::Fault("FOR with repeat count 0".to_string());
                        }
                        state.for_stack.push(ForFrame::new(body, repeat));
                        continue;
                    }
                    primitive => return Fetched::Primitive(primitive),
                }
            }
            // Iteration boundary; reached here only for empty bodies
            // (non-empty bodies are drained in `advance`).
            frame.iteration += 1;
            frame.inner_ip = 0;
            if frame.iteration >= frame.repeat {
                state.for_stack.pop();
                bump_cursor(state);
            }
            continue;
        }

        if state.ip >= instructions.len() {
            return Fetched::Completed;
        }
        match instructions[state.ip].clone() {
            Instruction::For { body, repeat } => {
                if repeat == 0 {
                    return Fetched::Fault("FOR with repeat count 0".to_string());
                }
                state.for_stack.push(ForFrame::new(body, repeat));
                continue;
            }
            primitive => return Fetched::Primitive(primitive),
        }
    }
}

/// Move the innermost cursor one slot forward.
fn bump_cursor(state: &mut ProcState) {
    match state.for_stack.last_mut() {
        Some(frame) => frame.inner_ip += 1,
        None => state.ip += 1,
    }
}

/// Advance past the just-executed primitive, then drain every FOR frame
/// whose final iteration just completed so the outer `ip` reflects it
/// immediately.
fn advance(state: &mut ProcState) {
    bump_cursor(state);
    while let Some(frame) = state.for_stack.last_mut() {
        if frame.inner_ip < frame.body.len() {
            break;
        }
        frame.iteration += 1;
        frame.inner_ip = 0;
        if frame.iteration >= frame.repeat {
            state.for_stack.pop();
            bump_cursor(state);
        } else {
            break;
        }
    }
}

fn finish_check(state: &mut ProcState, total: usize) -> StepOutcome {
    if state.for_stack.is_empty() && state.ip >= total {
        state.status = ProcessStatus::Finished;
        state.core_assigned = -1;
        StepOutcome::Done
    } else {
        StepOutcome::Advanced
    }
}

/// Operand value. Variable reads auto-initialize absent names to 0; that
/// counts as the name's first assignment.
fn resolve(state: &mut ProcState, operand: &Operand) -> i64 {
    match operand {
        Operand::Lit(value) => i64::from(*value),
        Operand::Var(name) => i64::from(*state.memory.entry(name.clone()).or_insert(0)),
    }
}

#[inline]
fn clamp16(value: i64) -> u16 {
    value.clamp(0, i64::from(MEMORY_MAX)) as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::{parse_program, Operand};
    use crate::process::{ProcessHandle, ProcessId};
    use crate::sink::{LogSink, MemorySink};
    use std::sync::Arc;

    fn running(instructions: Vec<Instruction>) -> (ProcessHandle, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let proc = Process::new(
            ProcessId(1),
            "p1",
            instructions,
            Arc::clone(&sink) as Arc<dyn LogSink>,
        );
        proc.begin_running(0);
        (proc, sink)
    }

    /// Step until Done/Fault, with a cap against runaway loops.
    fn run_to_end(proc: &Process) -> StepOutcome {
        for _ in 0..100_000 {
            match step(proc, 0, 0) {
                StepOutcome::Advanced => continue,
                StepOutcome::YieldSleep => {
                    if wake(proc) == StepOutcome::Done {
                        return StepOutcome::Done;
                    }
                }
                done => return done,
            }
        }
        panic!("program did not terminate");
    }

    fn mem(proc: &Process, name: &str) -> Option<u16> {
        proc.memory_snapshot()
            .into_iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    #[test]
    fn declare_add_print_runs_to_completion() {
        let program = parse_program("DECLARE x 3\nADD x x 2\nPRINT \"hi\"").unwrap();
        let (proc, sink) = running(program);
        assert_eq!(run_to_end(&proc), StepOutcome::Done);
        assert_eq!(mem(&proc, "x"), Some(5));
        assert_eq!(proc.ip(), 3);
        assert_eq!(proc.status(), ProcessStatus::Finished);
        let lines = sink.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("\"hi\""));
    }

    #[test]
    fn arithmetic_saturates_both_directions() {
        let program =
            parse_program("DECLARE y 65534\nADD y y 5\nSUBTRACT y y 100000").unwrap();
        let (proc, _) = running(program);

        assert_eq!(step(&proc, 0, 0), StepOutcome::Advanced);
        assert_eq!(mem(&proc, "y"), Some(65534));
        assert_eq!(step(&proc, 0, 0), StepOutcome::Advanced);
        assert_eq!(mem(&proc, "y"), Some(65535));
        assert_eq!(step(&proc, 0, 0), StepOutcome::Done);
        assert_eq!(mem(&proc, "y"), Some(0));
    }

    #[test]
    fn declare_literal_above_range_clamps() {
        let (proc, _) = running(vec![Instruction::declare("x", 1_000_000)]);
        run_to_end(&proc);
        assert_eq!(mem(&proc, "x"), Some(MEMORY_MAX));
    }

    #[test]
    fn variable_reads_auto_initialize_to_zero() {
        let program = parse_program("ADD x q 5").unwrap();
        let (proc, _) = running(program);
        run_to_end(&proc);
        assert_eq!(mem(&proc, "x"), Some(5));
        assert_eq!(mem(&proc, "q"), Some(0), "read created the key");
    }

    #[test]
    fn redeclaration_overwrites() {
        let program = parse_program("DECLARE x 3\nDECLARE x 9").unwrap();
        let (proc, _) = running(program);
        run_to_end(&proc);
        assert_eq!(mem(&proc, "x"), Some(9));
    }

    #[test]
    fn sleep_yields_without_advancing_cursor() {
        let program = parse_program("SLEEP 10\nPRINT \"done\"").unwrap();
        let (proc, _) = running(program);
        assert_eq!(step(&proc, 0, 100), StepOutcome::YieldSleep);
        assert_eq!(proc.status(), ProcessStatus::Sleeping);
        assert_eq!(proc.sleep_until_tick(), 110);
        assert_eq!(proc.ip(), 0, "cursor stays on the SLEEP");
        assert!(proc.sleep_pending());

        assert_eq!(wake(&proc), StepOutcome::Advanced);
        assert_eq!(proc.status(), ProcessStatus::Running);
        assert_eq!(proc.ip(), 1);
        assert!(!proc.sleep_pending());
    }

    #[test]
    fn sleep_as_final_instruction_finishes_on_wake() {
        let program = parse_program("SLEEP 1").unwrap();
        let (proc, _) = running(program);
        assert_eq!(step(&proc, 0, 0), StepOutcome::YieldSleep);
        assert_eq!(wake(&proc), StepOutcome::Done);
        assert_eq!(proc.status(), ProcessStatus::Finished);
    }

    #[test]
    fn for_loop_repeats_body() {
        // S5: outer ip lands past the FOR, counter reaches repeat count.
        let program = parse_program("DECLARE c 0\nFOR 3 {\nADD c c 1\n}").unwrap();
        let (proc, _) = running(program);
        assert_eq!(step(&proc, 0, 0), StepOutcome::Advanced); // DECLARE
        assert_eq!(step(&proc, 0, 0), StepOutcome::Advanced); // ADD #1
        assert_eq!(proc.ip(), 1, "outer ip parked on the FOR");
        assert_eq!(step(&proc, 0, 0), StepOutcome::Advanced); // ADD #2
        assert_eq!(step(&proc, 0, 0), StepOutcome::Done); // ADD #3 pops the frame
        assert_eq!(mem(&proc, "c"), Some(3));
        assert_eq!(proc.ip(), 2);
        assert_eq!(proc.status(), ProcessStatus::Finished);
    }

    #[test]
    fn nested_for_multiplies_iterations() {
        let program =
            parse_program("DECLARE c 0\nFOR 2 {\nFOR 3 {\nADD c c 1\n}\n}\nADD c c 10").unwrap();
        let (proc, _) = running(program);
        assert_eq!(run_to_end(&proc), StepOutcome::Done);
        assert_eq!(mem(&proc, "c"), Some(16));
        assert_eq!(proc.ip(), 3);
    }

    #[test]
    fn empty_for_body_is_skipped() {
        let (proc, sink) = running(vec![
            Instruction::For {
                body: vec![],
                repeat: 5,
            },
            Instruction::print("after"),
        ]);
        assert_eq!(step(&proc, 0, 0), StepOutcome::Done);
        assert_eq!(sink.lines().len(), 1, "the PRINT after the FOR ran");
        assert_eq!(proc.ip(), 2);
    }

    #[test]
    fn sleep_inside_for_body_resumes_in_frame() {
        let program = parse_program("DECLARE c 0\nFOR 2 {\nSLEEP 1\nADD c c 1\n}").unwrap();
        let (proc, _) = running(program);
        assert_eq!(step(&proc, 0, 0), StepOutcome::Advanced); // DECLARE
        assert_eq!(step(&proc, 0, 0), StepOutcome::YieldSleep); // SLEEP iter 1
        assert_eq!(wake(&proc), StepOutcome::Advanced);
        assert_eq!(step(&proc, 0, 0), StepOutcome::Advanced); // ADD iter 1
        assert_eq!(step(&proc, 0, 0), StepOutcome::YieldSleep); // SLEEP iter 2
        assert_eq!(wake(&proc), StepOutcome::Advanced);
        assert_eq!(step(&proc, 0, 0), StepOutcome::Done); // ADD iter 2
        assert_eq!(mem(&proc, "c"), Some(2));
    }

    #[test]
    fn zero_repeat_for_faults_terminally() {
        let (proc, sink) = running(vec![Instruction::For {
            body: vec![Instruction::print("never")],
            repeat: 0,
        }]);
        let outcome = step(&proc, 0, 0);
        assert!(matches!(outcome, StepOutcome::Fault(_)), "{outcome:?}");
        assert!(proc.error_flag());
        assert_eq!(proc.status(), ProcessStatus::Finished);
        let lines = sink.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("Fault:"), "{}", lines[0]);
    }

    #[test]
    fn empty_declare_name_faults() {
        let (proc, _) = running(vec![Instruction::declare("", 1)]);
        assert!(matches!(step(&proc, 0, 0), StepOutcome::Fault(_)));
        assert!(proc.error_flag());
    }

    #[test]
    fn sink_failure_becomes_a_fault() {
        struct FailingSink;
        impl LogSink for FailingSink {
            fn append(&self, _line: &str) -> std::io::Result<()> {
                Err(std::io::Error::other("disk full"))
            }
        }
        let proc = Process::new(
            ProcessId(9),
            "doomed",
            vec![Instruction::print("x")],
            Arc::new(FailingSink),
        );
        proc.begin_running(1);
        let outcome = step(&proc, 1, 0);
        assert!(matches!(outcome, StepOutcome::Fault(_)), "{outcome:?}");
        assert!(proc.error_flag());
        assert_eq!(proc.status(), ProcessStatus::Finished);
    }

    #[test]
    fn empty_program_is_done_immediately() {
        let (proc, _) = running(vec![]);
        assert_eq!(step(&proc, 0, 0), StepOutcome::Done);
        assert_eq!(proc.status(), ProcessStatus::Finished);
    }

    #[test]
    fn print_logs_carry_the_core_id() {
        let (proc, sink) = running(vec![Instruction::print("hello")]);
        proc.begin_running(3);
        assert_eq!(step(&proc, 3, 0), StepOutcome::Done);
        assert!(sink.lines()[0].contains("Core:3"), "{:?}", sink.lines());
    }

    #[test]
    fn literal_operands_work_in_both_positions() {
        let (proc, _) = running(vec![Instruction::Add {
            dest: "x".into(),
            src1: Operand::lit(7),
            src2: Operand::lit(8),
        }]);
        run_to_end(&proc);
        assert_eq!(mem(&proc, "x"), Some(15));
    }
}
