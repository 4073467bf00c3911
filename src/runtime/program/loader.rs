//! Text loader for script assembly (`.scr`)
//!
//! One instruction per line. `#` starts a comment outside string literals,
//! `name:` on its own line defines a label, and jump or call targets may be
//! either labels or instruction indices.
//!
//! ```text
//! # count down from 3
//!     push 3
//!     store_local 0
//! top:
//!     load_local 0
//!     jump_if_false done
//!     load_local 0
//!     push 1
//!     sub
//!     store_local 0
//!     sys os.sleepms 1
//!     pop
//!     jump top
//! done:
//!     exit
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use hashbrown::HashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::runtime::program::Program;
use crate::runtime::value::Value;
use crate::std::Role;
use crate::vm::Instr;

/// Errors raised while loading a program.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("line {line}: unknown label `{label}`")]
    UnknownLabel { line: usize, label: String },

    #[error("line {line}: duplicate label `{label}`")]
    DuplicateLabel { line: usize, label: String },

    #[error(transparent)]
    Walk(#[from] walkdir::Error),
}

/// A jump/call target before labels are resolved.
enum Target {
    Index(usize),
    Label(String),
}

/// Instruction with an unresolved target.
enum Pending {
    Ready(Instr),
    Jump(Target),
    JumpIfFalse(Target),
    Call(Target, u8),
}

static LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([a-z_]+)(?:\s+(.*))?$").expect("valid regex"));
static LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*):$").expect("valid regex"));
static STRING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^"((?:[^"\\]|\\.)*)"$"#).expect("valid regex"));

/// Line parser over the shared instruction grammar.
struct Parser {
    line_re: &'static Regex,
    label_re: &'static Regex,
    string_re: &'static Regex,
}

impl Parser {
    fn new() -> Self {
        Self {
            line_re: &LINE_RE,
            label_re: &LABEL_RE,
            string_re: &STRING_RE,
        }
    }

    fn parse_string(
        &self,
        line: usize,
        text: &str,
    ) -> Result<String, LoadError> {
        let caps = self.string_re.captures(text).ok_or_else(|| LoadError::Syntax {
            line,
            message: format!("expected string literal, found `{}`", text),
        })?;
        let mut out = String::new();
        let mut chars = caps[1].chars();
        while let Some(c) = chars.next() {
            if c != '\\' {
                out.push(c);
                continue;
            }
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => {}
            }
        }
        Ok(out)
    }

    fn parse_value(
        &self,
        line: usize,
        text: &str,
    ) -> Result<Value, LoadError> {
        if text == "unit" {
            return Ok(Value::Unit);
        }
        if text.starts_with('"') {
            return self.parse_string(line, text).map(Value::from);
        }
        text.parse::<i64>().map(Value::Int).map_err(|_| LoadError::Syntax {
            line,
            message: format!("invalid literal `{}`", text),
        })
    }

    fn parse_line(
        &self,
        line: usize,
        text: &str,
    ) -> Result<Pending, LoadError> {
        let caps = self.line_re.captures(text).ok_or_else(|| LoadError::Syntax {
            line,
            message: format!("cannot parse `{}`", text),
        })?;
        let op = caps.get(1).map_or("", |m| m.as_str());
        let rest = caps.get(2).map_or("", |m| m.as_str().trim());
        let operands: Vec<&str> = rest.split_whitespace().collect();

        let expect = |count: usize| -> Result<(), LoadError> {
            if operands.len() == count {
                Ok(())
            } else {
                Err(LoadError::Syntax {
                    line,
                    message: format!("`{}` takes {} operand(s), found {}", op, count, operands.len()),
                })
            }
        };
        let number = |text: &str| -> Result<u64, LoadError> {
            text.parse::<u64>().map_err(|_| LoadError::Syntax {
                line,
                message: format!("expected a number, found `{}`", text),
            })
        };
        let slot = |text: &str| -> Result<u16, LoadError> {
            u16::try_from(number(text)?).map_err(|_| LoadError::Syntax {
                line,
                message: format!("slot `{}` out of range", text),
            })
        };
        let argc = |text: &str| -> Result<u8, LoadError> {
            u8::try_from(number(text)?).map_err(|_| LoadError::Syntax {
                line,
                message: format!("argument count `{}` out of range", text),
            })
        };
        let target = |text: &str| -> Target {
            match text.parse::<usize>() {
                Ok(index) => Target::Index(index),
                Err(_) => Target::Label(text.to_string()),
            }
        };

        let simple = |instr: Instr| -> Result<Pending, LoadError> {
            expect(0)?;
            Ok(Pending::Ready(instr))
        };

        match op {
            "nop" => simple(Instr::Nop),
            "pop" => simple(Instr::Pop),
            "dup" => simple(Instr::Dup),
            "swap" => simple(Instr::Swap),
            "add" => simple(Instr::Add),
            "sub" => simple(Instr::Sub),
            "mul" => simple(Instr::Mul),
            "div" => simple(Instr::Div),
            "mod" => simple(Instr::Mod),
            "eq" => simple(Instr::Eq),
            "lt" => simple(Instr::Lt),
            "not" => simple(Instr::Not),
            "return" => simple(Instr::Return),
            "exit" => simple(Instr::Exit),
            "push" => {
                if rest.is_empty() {
                    return Err(LoadError::Syntax {
                        line,
                        message: "`push` needs a value".to_string(),
                    });
                }
                Ok(Pending::Ready(Instr::Push(self.parse_value(line, rest)?)))
            }
            "trap" => {
                let msg = self.parse_string(line, rest)?;
                Ok(Pending::Ready(Instr::Trap(Arc::from(msg))))
            }
            "load_local" | "store_local" | "load_global" | "store_global" => {
                expect(1)?;
                let n = slot(operands[0])?;
                Ok(Pending::Ready(match op {
                    "load_local" => Instr::LoadLocal(n),
                    "store_local" => Instr::StoreLocal(n),
                    "load_global" => Instr::LoadGlobal(n),
                    _ => Instr::StoreGlobal(n),
                }))
            }
            "jump" => {
                expect(1)?;
                Ok(Pending::Jump(target(operands[0])))
            }
            "jump_if_false" => {
                expect(1)?;
                Ok(Pending::JumpIfFalse(target(operands[0])))
            }
            "call" => {
                expect(2)?;
                Ok(Pending::Call(target(operands[0]), argc(operands[1])?))
            }
            "sys" => {
                expect(2)?;
                let (role, name) = operands[0].split_once('.').ok_or_else(|| LoadError::Syntax {
                    line,
                    message: format!("expected `role.function`, found `{}`", operands[0]),
                })?;
                let role: Role = role
                    .parse()
                    .map_err(|message| LoadError::Syntax { line, message })?;
                Ok(Pending::Ready(Instr::sys(role, name, argc(operands[1])?)))
            }
            other => Err(LoadError::Syntax {
                line,
                message: format!("unknown instruction `{}`", other),
            }),
        }
    }
}

/// Strip a trailing `#` comment that is not inside a string literal.
fn strip_comment(line: &str) -> &str {
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..i],
            _ => {}
        }
    }
    line
}

/// Parse assembly source into a program.
pub fn parse_program(
    name: &str,
    source: &str,
) -> Result<Program, LoadError> {
    let parser = Parser::new();
    let mut labels: HashMap<String, usize> = HashMap::new();
    let mut pending: Vec<(usize, Pending)> = Vec::new();

    for (index, raw) in source.lines().enumerate() {
        let line = index + 1;
        let text = strip_comment(raw).trim();
        if text.is_empty() {
            continue;
        }
        if let Some(caps) = parser.label_re.captures(text) {
            let label = caps[1].to_string();
            if labels.insert(label.clone(), pending.len()).is_some() {
                return Err(LoadError::DuplicateLabel { line, label });
            }
            continue;
        }
        pending.push((line, parser.parse_line(line, text)?));
    }

    let resolve = |line: usize, target: Target| -> Result<usize, LoadError> {
        match target {
            Target::Index(index) => Ok(index),
            Target::Label(label) => labels
                .get(&label)
                .copied()
                .ok_or(LoadError::UnknownLabel { line, label }),
        }
    };

    let code = pending
        .into_iter()
        .map(|(line, p)| {
            Ok(match p {
                Pending::Ready(instr) => instr,
                Pending::Jump(t) => Instr::Jump(resolve(line, t)?),
                Pending::JumpIfFalse(t) => Instr::JumpIfFalse(resolve(line, t)?),
                Pending::Call(t, argc) => Instr::Call {
                    target: resolve(line, t)?,
                    argc,
                },
            })
        })
        .collect::<Result<Vec<_>, LoadError>>()?;

    Ok(Program::new(name, code))
}
