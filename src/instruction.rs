//! The process instruction set: structural model plus a small text format.
//!
//! Instructions are a tagged enum; a `FOR` carries its body as an ordered
//! child sequence rather than a re-parsed marker encoding, so the
//! interpreter never parses anything at execution time. Serde derives keep
//! programs serializable for fixtures and scenario artifacts.
//!
//! The text format is line-oriented and exists for manually authored
//! programs:
//!
//! ```text
//! DECLARE x 3
//! ADD x x 2
//! FOR 3 {
//!     ADD c c 1
//! }
//! PRINT "hi"
//! SLEEP 4
//! ```
//!
//! Malformed programs are rejected at parse time; nothing malformed ever
//! reaches a process record.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Source operand of an arithmetic instruction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    /// Named scratch variable; reads auto-initialize absent names to 0.
    Var(String),
    /// Integer literal. Carried as `u32`; values above 65535 are legal in
    /// source form and saturate through the ALU.
    Lit(u32),
}

impl Operand {
    pub fn var(name: impl Into<String>) -> Self {
        Operand::Var(name.into())
    }

    pub fn lit(value: u32) -> Self {
        Operand::Lit(value)
    }
}

/// One process instruction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    /// Append a timestamped message to the process log.
    Print(String),
    /// Set a variable to a literal. Re-declaration overwrites.
    Declare(String, u32),
    /// `dest = clamp(src1 + src2)`.
    Add {
        dest: String,
        src1: Operand,
        src2: Operand,
    },
    /// `dest = clamp(src1 - src2)`; underflow saturates to 0.
    Subtract {
        dest: String,
        src1: Operand,
        src2: Operand,
    },
    /// Park the process until the given number of ticks elapses.
    Sleep(u64),
    /// Execute `body` in order, `repeat` times. `repeat >= 1`.
    For {
        body: Vec<Instruction>,
        repeat: u32,
    },
}

impl Instruction {
    pub fn print(msg: impl Into<String>) -> Self {
        Instruction::Print(msg.into())
    }

    pub fn declare(name: impl Into<String>, value: u32) -> Self {
        Instruction::Declare(name.into(), value)
    }
}

// ============================================================================
// Text format
// ============================================================================

/// Errors from the program text parser.
#[derive(Debug, PartialEq, Eq)]
pub struct ParseError {
    /// 1-based source line the error was detected on.
    pub line: usize,
    pub kind: ParseErrorKind,
}

#[derive(Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseErrorKind {
    /// First token of a line is not an opcode.
    UnknownOpcode(String),
    /// Opcode is missing a required operand.
    MissingOperand(&'static str),
    /// Trailing tokens after a complete instruction.
    TrailingTokens,
    /// Operand is not a non-negative integer.
    BadLiteral(String),
    /// PRINT message opened a quote that never closes.
    UnterminatedString,
    /// `FOR` block missing its closing `}`.
    UnclosedFor,
    /// `}` with no open `FOR` block.
    UnexpectedBrace,
    /// `FOR` repeat count of zero.
    ZeroRepeat,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: ", self.line)?;
        match &self.kind {
            ParseErrorKind::UnknownOpcode(op) => write!(f, "unknown opcode '{op}'"),
            ParseErrorKind::MissingOperand(what) => write!(f, "missing {what}"),
            ParseErrorKind::TrailingTokens => write!(f, "unexpected trailing tokens"),
            ParseErrorKind::BadLiteral(tok) => write!(f, "bad literal '{tok}'"),
            ParseErrorKind::UnterminatedString => write!(f, "unterminated string"),
            ParseErrorKind::UnclosedFor => write!(f, "FOR block is never closed"),
            ParseErrorKind::UnexpectedBrace => write!(f, "'}}' without an open FOR block"),
            ParseErrorKind::ZeroRepeat => write!(f, "FOR repeat count must be >= 1"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Parse a program: one instruction per line, `#` comments, blank lines
/// ignored, `FOR <repeat> {` ... `}` blocks, opcodes case-insensitive.
pub fn parse_program(src: &str) -> Result<Vec<Instruction>, ParseError> {
    let mut lines = src
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line))
        .collect::<Vec<_>>()
        .into_iter();
    let program = parse_block(&mut lines, None)?;
    Ok(program)
}

/// Parse instructions until EOF or, inside a FOR, the closing brace.
/// `open_line` is the line of the enclosing `FOR` for error reporting.
fn parse_block(
    lines: &mut std::vec::IntoIter<(usize, &str)>,
    open_line: Option<usize>,
) -> Result<Vec<Instruction>, ParseError> {
    let mut out = Vec::new();

    while let Some((line_no, raw)) = lines.next() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line == "}" {
            return match open_line {
                Some(_) => Ok(out),
                None => Err(ParseError {
                    line: line_no,
                    kind: ParseErrorKind::UnexpectedBrace,
                }),
            };
        }

        let mut tokens = line.split_whitespace();
        let opcode = tokens.next().expect("non-empty line has a first token");

        let instr = match opcode.to_ascii_uppercase().as_str() {
            "PRINT" => Instruction::Print(parse_message(line_no, line, "PRINT")?),
            "DECLARE" => {
                let name = required(line_no, tokens.next(), "variable name")?;
                let value = parse_literal(line_no, tokens.next(), "literal value")?;
                no_trailing(line_no, tokens.next())?;
                Instruction::Declare(name.to_string(), value)
            }
            "ADD" | "SUBTRACT" => {
                let dest = required(line_no, tokens.next(), "destination variable")?;
                let src1 = parse_operand(line_no, tokens.next(), "first source")?;
                let src2 = parse_operand(line_no, tokens.next(), "second source")?;
                no_trailing(line_no, tokens.next())?;
                if opcode.eq_ignore_ascii_case("ADD") {
                    Instruction::Add {
                        dest: dest.to_string(),
                        src1,
                        src2,
                    }
                } else {
                    Instruction::Subtract {
                        dest: dest.to_string(),
                        src1,
                        src2,
                    }
                }
            }
            "SLEEP" => {
                let ticks = parse_literal(line_no, tokens.next(), "tick count")?;
                no_trailing(line_no, tokens.next())?;
                Instruction::Sleep(u64::from(ticks))
            }
            "FOR" => {
                let repeat = parse_literal(line_no, tokens.next(), "repeat count")?;
                if repeat == 0 {
                    return Err(ParseError {
                        line: line_no,
                        kind: ParseErrorKind::ZeroRepeat,
                    });
                }
                match tokens.next() {
                    Some("{") => {}
                    _ => {
                        return Err(ParseError {
                            line: line_no,
                            kind: ParseErrorKind::MissingOperand("'{' opening the FOR body"),
                        })
                    }
                }
                no_trailing(line_no, tokens.next())?;
                let body = parse_block(lines, Some(line_no))?;
                Instruction::For { body, repeat }
            }
            other => {
                return Err(ParseError {
                    line: line_no,
                    kind: ParseErrorKind::UnknownOpcode(other.to_string()),
                })
            }
        };
        out.push(instr);
    }

    match open_line {
        Some(line) => Err(ParseError {
            line,
            kind: ParseErrorKind::UnclosedFor,
        }),
        None => Ok(out),
    }
}

fn required<'a>(
    line: usize,
    token: Option<&'a str>,
    what: &'static str,
) -> Result<&'a str, ParseError> {
    token.ok_or(ParseError {
        line,
        kind: ParseErrorKind::MissingOperand(what),
    })
}

fn no_trailing(line: usize, token: Option<&str>) -> Result<(), ParseError> {
    match token {
        None => Ok(()),
        Some(_) => Err(ParseError {
            line,
            kind: ParseErrorKind::TrailingTokens,
        }),
    }
}

fn parse_literal(line: usize, token: Option<&str>, what: &'static str) -> Result<u32, ParseError> {
    let token = required(line, token, what)?;
    token.parse::<u32>().map_err(|_| ParseError {
        line,
        kind: ParseErrorKind::BadLiteral(token.to_string()),
    })
}

fn parse_operand(
    line: usize,
    token: Option<&str>,
    what: &'static str,
) -> Result<Operand, ParseError> {
    let token = required(line, token, what)?;
    // A leading digit means literal; anything else is a variable name.
    if token.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        let value = token.parse::<u32>().map_err(|_| ParseError {
            line,
            kind: ParseErrorKind::BadLiteral(token.to_string()),
        })?;
        Ok(Operand::Lit(value))
    } else {
        Ok(Operand::Var(token.to_string()))
    }
}

/// Extract a PRINT message: the quoted remainder of the line, or the bare
/// remainder when unquoted.
fn parse_message(line_no: usize, line: &str, opcode: &str) -> Result<String, ParseError> {
    let rest = line[opcode.len()..].trim();
    if rest.is_empty() {
        return Err(ParseError {
            line: line_no,
            kind: ParseErrorKind::MissingOperand("message"),
        });
    }
    if let Some(stripped) = rest.strip_prefix('"') {
        match stripped.rfind('"') {
            Some(end) if stripped[end + 1..].trim().is_empty() => {
                Ok(stripped[..end].to_string())
            }
            _ => Err(ParseError {
                line: line_no,
                kind: ParseErrorKind::UnterminatedString,
            }),
        }
    } else {
        Ok(rest.to_string())
    }
}
