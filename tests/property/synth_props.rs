//! Property tests for program synthesis: every generated program is
//! well-formed by construction and executes to completion without faults.

use coresim_rs::interp::{step, wake, StepOutcome};
use coresim_rs::process::{Process, ProcessId};
use coresim_rs::sink::NullSink;
use coresim_rs::{synthesize, Instruction, Operand, SynthRng, MAX_FOR_DEPTH, VARIABLE_ALPHABET};
use proptest::prelude::*;
use std::sync::Arc;

fn for_depth(instructions: &[Instruction]) -> u32 {
    instructions
        .iter()
        .map(|i| match i {
            Instruction::For { body, .. } => 1 + for_depth(body),
            _ => 0,
        })
        .max()
        .unwrap_or(0)
}

fn assert_well_formed(instructions: &[Instruction], name: &str) {
    for instr in instructions {
        match instr {
            Instruction::Print(msg) => {
                assert_eq!(msg, &format!("Hello world from {name}!"));
            }
            Instruction::Declare(var, value) => {
                assert!(VARIABLE_ALPHABET.contains(&var.as_str()));
                assert!((1..=20).contains(value));
            }
            Instruction::Add { dest, src1, src2 }
            | Instruction::Subtract { dest, src1, src2 } => {
                assert!(VARIABLE_ALPHABET.contains(&dest.as_str()));
                for src in [src1, src2] {
                    match src {
                        Operand::Var(v) => assert!(VARIABLE_ALPHABET.contains(&v.as_str())),
                        Operand::Lit(l) => assert!(*l <= 20),
                    }
                }
            }
            Instruction::Sleep(ticks) => assert!((1..=5).contains(ticks)),
            Instruction::For { body, repeat } => {
                assert!((1..=5).contains(repeat));
                assert!((1..=3).contains(&(body.len() as u32)));
                assert_well_formed(body, name);
            }
        }
    }
}

proptest! {
    #[test]
    fn synthesized_programs_are_well_formed(seed in any::<u64>(), count in 1u32..60) {
        let mut rng = SynthRng::new(seed);
        let program = synthesize("proc1", count, &mut rng);

        prop_assert_eq!(program.len(), count as usize);
        prop_assert!(for_depth(&program) <= MAX_FOR_DEPTH);
        let leading = count.min(3) as usize;
        for instr in &program[..leading] {
            prop_assert!(matches!(instr, Instruction::Declare(_, _)));
        }
        assert_well_formed(&program, "proc1");
    }

    #[test]
    fn synthesized_programs_never_fault(seed in any::<u64>(), count in 1u32..40) {
        let mut rng = SynthRng::new(seed);
        let program = synthesize("proc1", count, &mut rng);
        let total = program.len();

        let proc = Process::new(ProcessId(1), "proc1", program, Arc::new(NullSink));
        proc.begin_running(0);
        let mut steps = 0u64;
        loop {
            match step(&proc, 0, steps) {
                StepOutcome::Advanced => {}
                StepOutcome::YieldSleep => {
                    if wake(&proc) == StepOutcome::Done {
                        break;
                    }
                }
                StepOutcome::Done => break,
                StepOutcome::Fault(msg) => prop_assert!(false, "fault: {}", msg),
            }
            steps += 1;
            prop_assert!(steps < 5_000_000, "did not terminate");
        }
        prop_assert_eq!(proc.ip(), total);
        prop_assert!(!proc.error_flag());
    }
}
