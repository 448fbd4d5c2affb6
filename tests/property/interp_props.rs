//! Property tests for the interpreter: stepped execution of arbitrary
//! well-formed programs matches a flat reference evaluation, stays inside
//! cursor bounds, and terminates.

use coresim_rs::interp::{step, wake, StepOutcome};
use coresim_rs::process::{Process, ProcessHandle, ProcessId};
use coresim_rs::sink::MemorySink;
use coresim_rs::{Instruction, Operand};
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;

static NAMES: [&str; 6] = ["x", "y", "z", "a", "b", "c"];

fn arb_name() -> impl Strategy<Value = String> {
    prop::sample::select(NAMES.as_slice()).prop_map(str::to_string)
}

fn arb_operand() -> impl Strategy<Value = Operand> {
    prop_oneof![
        arb_name().prop_map(Operand::Var),
        (0u32..100_000).prop_map(Operand::Lit),
    ]
}

fn arb_instruction() -> impl Strategy<Value = Instruction> {
    let leaf = prop_oneof![
        "[a-z]{1,8}".prop_map(Instruction::Print),
        (arb_name(), 0u32..100_000).prop_map(|(n, v)| Instruction::Declare(n, v)),
        (arb_name(), arb_operand(), arb_operand())
            .prop_map(|(dest, src1, src2)| Instruction::Add { dest, src1, src2 }),
        (arb_name(), arb_operand(), arb_operand())
            .prop_map(|(dest, src1, src2)| Instruction::Subtract { dest, src1, src2 }),
        (1u64..4).prop_map(Instruction::Sleep),
    ];
    leaf.prop_recursive(3, 24, 3, |inner| {
        (prop::collection::vec(inner, 1..4), 1u32..4)
            .prop_map(|(body, repeat)| Instruction::For { body, repeat })
    })
}

fn arb_program() -> impl Strategy<Value = Vec<Instruction>> {
    prop::collection::vec(arb_instruction(), 0..10)
}

/// Flat reference semantics: no frames, no yielding, same saturation.
fn eval_model(
    instructions: &[Instruction],
    memory: &mut BTreeMap<String, u16>,
    prints: &mut u64,
) {
    fn resolve(memory: &mut BTreeMap<String, u16>, op: &Operand) -> i64 {
        match op {
            Operand::Lit(v) => i64::from(*v),
            Operand::Var(name) => i64::from(*memory.entry(name.clone()).or_insert(0)),
        }
    }
    fn clamp(v: i64) -> u16 {
        v.clamp(0, 65535) as u16
    }
    for instr in instructions {
        match instr {
            Instruction::Print(_) => *prints += 1,
            Instruction::Declare(name, value) => {
                memory.insert(name.clone(), clamp(i64::from(*value)));
            }
            Instruction::Add { dest, src1, src2 } => {
                let v = resolve(memory, src1) + resolve(memory, src2);
                memory.insert(dest.clone(), clamp(v));
            }
            Instruction::Subtract { dest, src1, src2 } => {
                let v = resolve(memory, src1) - resolve(memory, src2);
                memory.insert(dest.clone(), clamp(v));
            }
            Instruction::Sleep(_) => {}
            Instruction::For { body, repeat } => {
                for _ in 0..*repeat {
                    eval_model(body, memory, prints);
                }
            }
        }
    }
}

/// Drive a process to completion on a synthetic core, waking sleeps
/// immediately. Panics on fault or on blowing the step cap.
fn drive(program: Vec<Instruction>, cap: u64) -> (ProcessHandle, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let total = program.len();
    let proc = Process::new(ProcessId(1), "prop", program, Arc::clone(&sink) as _);
    proc.begin_running(0);
    let mut steps = 0u64;
    loop {
        let outcome = step(&proc, 0, steps);
        assert!(proc.ip() <= total, "ip {} beyond {}", proc.ip(), total);
        match outcome {
            StepOutcome::Advanced => {}
            StepOutcome::YieldSleep => {
                if wake(&proc) == StepOutcome::Done {
                    break;
                }
            }
            StepOutcome::Done => break,
            StepOutcome::Fault(msg) => panic!("unexpected fault: {msg}"),
        }
        steps += 1;
        assert!(steps <= cap, "program did not terminate in {cap} steps");
    }
    (proc, sink)
}

proptest! {
    #[test]
    fn stepped_execution_matches_flat_evaluation(program in arb_program()) {
        let mut expected_memory = BTreeMap::new();
        let mut expected_prints = 0u64;
        eval_model(&program, &mut expected_memory, &mut expected_prints);

        let total = program.len();
        let (proc, sink) = drive(program, 2_000_000);

        prop_assert_eq!(proc.ip(), total);
        prop_assert!(proc.is_finished());
        prop_assert!(!proc.error_flag());

        let got: BTreeMap<String, u16> = proc.memory_snapshot().into_iter().collect();
        prop_assert_eq!(got, expected_memory);
        prop_assert_eq!(sink.len() as u64, expected_prints);
    }

    #[test]
    fn memory_values_always_saturate(program in arb_program()) {
        // The type already bounds values at 65535; this pins the clamp
        // semantics at the extremes through arbitrary operand mixes.
        let (proc, _) = drive(program, 2_000_000);
        for (_, value) in proc.memory_snapshot() {
            prop_assert!(value <= 65535);
        }
    }
}
