//! Random well-formed program synthesis for batch-generated processes.
//!
//! Programs are drawn over a fixed six-variable alphabet and open with up
//! to three DECLAREs so later arithmetic has declared operands to draw
//! from. A FOR counts as one instruction toward the requested count no
//! matter how large its body; nesting is capped at depth 3 here, by
//! construction — the interpreter does not assert it.

use crate::instruction::{Instruction, Operand};
use crate::rng::SynthRng;

/// Scratch-variable alphabet for synthesized programs.
pub const VARIABLE_ALPHABET: [&str; 6] = ["x", "y", "z", "a", "b", "c"];

/// Maximum FOR nesting depth the generator will emit.
pub const MAX_FOR_DEPTH: u32 = 3;

const DECLARE_LIT_MIN: u32 = 1;
const DECLARE_LIT_MAX: u32 = 20;
const SOURCE_LIT_MAX: u32 = 20;
const SLEEP_MIN: u32 = 1;
const SLEEP_MAX: u32 = 5;
const FOR_REPEAT_MAX: u32 = 5;
const FOR_BODY_MAX: u32 = 3;
const LEADING_DECLARES: u32 = 3;

/// Synthesize a program of exactly `count` instructions for process `name`.
///
/// The first `min(count, 3)` instructions are DECLAREs; the remainder is
/// sampled uniformly over the full opcode set.
pub fn synthesize(name: &str, count: u32, rng: &mut SynthRng) -> Vec<Instruction> {
    let mut program = Vec::with_capacity(count as usize);
    let mut declared: Vec<&'static str> = Vec::new();

    let leading = count.min(LEADING_DECLARES);
    for _ in 0..leading {
        program.push(gen_declare(rng, &mut declared));
    }
    for _ in leading..count {
        program.push(gen_instruction(name, rng, &mut declared, 0));
    }
    program
}

fn gen_declare(rng: &mut SynthRng, declared: &mut Vec<&'static str>) -> Instruction {
    let var = *rng.pick(&VARIABLE_ALPHABET);
    declared.push(var);
    Instruction::Declare(var.to_string(), rng.range_u32(DECLARE_LIT_MIN, DECLARE_LIT_MAX))
}

/// One instruction from the uniform opcode distribution. `for_depth` is the
/// number of enclosing FOR bodies; at the cap, FOR is excluded from the
/// draw.
fn gen_instruction(
    name: &str,
    rng: &mut SynthRng,
    declared: &mut Vec<&'static str>,
    for_depth: u32,
) -> Instruction {
    let opcodes = if for_depth < MAX_FOR_DEPTH { 6 } else { 5 };
    let roll = rng.index(opcodes);
    match roll {
        0 => gen_declare(rng, declared),
        1 | 2 => {
            let dest = rng.pick(&VARIABLE_ALPHABET).to_string();
            let src1 = gen_source(rng, declared);
            let src2 = gen_source(rng, declared);
            if roll == 1 {
                Instruction::Add { dest, src1, src2 }
            } else {
                Instruction::Subtract { dest, src1, src2 }
            }
        }
        3 => Instruction::Print(format!("Hello world from {name}!")),
        4 => Instruction::Sleep(u64::from(rng.range_u32(SLEEP_MIN, SLEEP_MAX))),
        _ => {
            let repeat = rng.range_u32(1, FOR_REPEAT_MAX);
            let body_len = rng.range_u32(1, FOR_BODY_MAX);
            let body = (0..body_len)
                .map(|_| gen_instruction(name, rng, declared, for_depth + 1))
                .collect();
            Instruction::For { body, repeat }
        }
    }
}

/// Arithmetic source: a declared variable or a small literal, evenly.
fn gen_source(rng: &mut SynthRng, declared: &[&'static str]) -> Operand {
    if !declared.is_empty() && rng.chance(1, 2) {
        Operand::Var(rng.pick(declared).to_string())
    } else {
        Operand::Lit(rng.range_u32(0, SOURCE_LIT_MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn max_for_depth(instructions: &[Instruction]) -> u32 {
        instructions
            .iter()
            .map(|i| match i {
                Instruction::For { body, .. } => 1 + max_for_depth(body),
                _ => 0,
            })
            .max()
            .unwrap_or(0)
    }

    fn walk(instructions: &[Instruction], check: &mut impl FnMut(&Instruction)) {
        for instr in instructions {
            check(instr);
            if let Instruction::For { body, .. } = instr {
                walk(body, check);
            }
        }
    }

    #[test]
    fn count_is_exact_and_for_counts_once() {
        let mut rng = SynthRng::new(1);
        for count in [1, 2, 3, 5, 20, 100] {
            let program = synthesize("p", count, &mut rng);
            assert_eq!(program.len(), count as usize);
        }
    }

    #[test]
    fn programs_open_with_declares() {
        let mut rng = SynthRng::new(2);
        let program = synthesize("p", 10, &mut rng);
        for instr in &program[..3] {
            assert!(matches!(instr, Instruction::Declare(_, _)), "{instr:?}");
        }
        // A two-instruction program is all DECLAREs.
        let tiny = synthesize("p", 2, &mut rng);
        assert!(tiny
            .iter()
            .all(|i| matches!(i, Instruction::Declare(_, _))));
    }

    #[test]
    fn declare_literals_stay_in_range() {
        let mut rng = SynthRng::new(3);
        let program = synthesize("p", 200, &mut rng);
        walk(&program, &mut |instr| {
            if let Instruction::Declare(name, value) = instr {
                assert!(VARIABLE_ALPHABET.contains(&name.as_str()));
                assert!((1..=20).contains(value), "literal {value}");
            }
        });
    }

    #[test]
    fn sources_are_alphabet_vars_or_small_literals() {
        let mut rng = SynthRng::new(4);
        let program = synthesize("p", 300, &mut rng);
        let mut check_src = |src: &Operand| match src {
            Operand::Var(name) => assert!(VARIABLE_ALPHABET.contains(&name.as_str())),
            Operand::Lit(value) => assert!(*value <= 20),
        };
        walk(&program, &mut |instr| match instr {
            Instruction::Add { src1, src2, .. } | Instruction::Subtract { src1, src2, .. } => {
                check_src(src1);
                check_src(src2);
            }
            _ => {}
        });
    }

    #[test]
    fn sleep_ticks_and_for_shapes_stay_in_range() {
        let mut rng = SynthRng::new(5);
        let program = synthesize("p", 400, &mut rng);
        walk(&program, &mut |instr| match instr {
            Instruction::Sleep(ticks) => assert!((1..=5).contains(ticks)),
            Instruction::For { body, repeat } => {
                assert!((1..=5).contains(repeat));
                assert!((1..=3).contains(&(body.len() as u32)));
            }
            _ => {}
        });
    }

    #[test]
    fn for_nesting_never_exceeds_cap() {
        let mut rng = SynthRng::new(6);
        for _ in 0..50 {
            let program = synthesize("p", 50, &mut rng);
            assert!(max_for_depth(&program) <= MAX_FOR_DEPTH);
        }
    }

    #[test]
    fn print_message_names_the_process() {
        let mut rng = SynthRng::new(7);
        let program = synthesize("proc42", 200, &mut rng);
        let mut saw_print = false;
        walk(&program, &mut |instr| {
            if let Instruction::Print(msg) = instr {
                saw_print = true;
                assert_eq!(msg, "Hello world from proc42!");
            }
        });
        assert!(saw_print, "200 draws should include a PRINT");
    }

    #[test]
    fn same_seed_synthesizes_identical_programs() {
        let a = synthesize("p", 30, &mut SynthRng::new(99));
        let b = synthesize("p", 30, &mut SynthRng::new(99));
        assert_eq!(a, b);
    }
}
