//! Script engine - line-oriented parser and tracing interpreter.
//!
//! Executes a small scripting language one statement at a time under the
//! control of a [`TraceHook`]: the interpreter pauses at source lines
//! according to its current [`StepMode`] and a shared breakpoint table, and
//! asks the hook how to proceed.

pub mod ast;
pub mod breakpoints;
pub mod interp;
pub mod parser;
pub mod value;

pub use breakpoints::{Breakpoint, BreakpointTable, SharedBreakpoints};
pub use interp::{run, Frame, PauseCtx, MAX_CALL_DEPTH};
pub use parser::{parse, parse_expr_str};
pub use value::{Value, UNPRINTABLE};

use thiserror::Error;

/// Engine-level errors
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("syntax error at line {line}: {message}")]
    Syntax { line: u32, message: String },

    #[error("runtime error at line {line}: {message}")]
    Runtime { line: u32, message: String },

    /// Execution was halted by the trace hook. Not a fault.
    #[error("execution halted")]
    Halted,
}

/// Stepping granularity for the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMode {
    /// Pause at every source line, entering called functions.
    Into,
    /// Pause at the next line at or above the current call depth.
    Over,
    /// Run until a registered breakpoint matches.
    Continue,
}

/// Hook decision returned from a pause point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resume {
    /// Keep executing under the given step mode.
    Step(StepMode),
    /// Halt execution entirely.
    Halt,
}

/// Per-line trace callback implemented by the debugger core.
pub trait TraceHook {
    /// Called at each pause point with a live view of the frame chain.
    /// The returned [`Resume`] becomes the interpreter's next step mode.
    fn on_pause(&mut self, ctx: &PauseCtx<'_>) -> Resume;

    /// Called when the traced program emits output via `print`.
    fn on_output(&mut self, text: &str);
}
