//! Common types for the debug subsystem.

use std::collections::BTreeMap;
use std::fmt;

/// Stepping command sent from the controller to the tracer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepCommand {
    /// Pause at the next line, entering called functions.
    StepInto,
    /// Pause at the next line, skipping over called functions.
    StepOver,
    /// Run until the next breakpoint.
    Continue,
    /// Halt execution entirely.
    Stop,
}

/// Variable bindings at a pause point, rendered to display strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableSnapshot {
    pub locals: BTreeMap<String, String>,
    pub globals: BTreeMap<String, String>,
}

/// One call frame captured at a pause point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSnapshot {
    pub file: String,
    pub function: String,
    pub line: u32,
    pub locals: BTreeMap<String, String>,
}

/// Message published by the tracer on the output channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    /// Execution paused at a line; full state attached.
    StateUpdate {
        file: String,
        line: u32,
        variables: VariableSnapshot,
        /// Innermost frame first.
        call_stack: Vec<FrameSnapshot>,
    },
    /// A line printed by the traced program.
    Output(String),
    /// The traced program faulted.
    Error(String),
}

/// What a breakpoint toggle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleAction {
    Added,
    Removed,
}

impl fmt::Display for ToggleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToggleAction::Added => write!(f, "added"),
            ToggleAction::Removed => write!(f, "removed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToggleResult {
    pub action: ToggleAction,
    pub line: u32,
}

/// Non-blocking view of the session: the running flag, the breakpoint
/// registry, and whatever the tracer last published.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub running: bool,
    pub breakpoints: BTreeMap<String, Vec<u32>>,
    pub variables: VariableSnapshot,
    pub call_stack: Vec<FrameSnapshot>,
}

/// Last snapshot published by the tracer; replaced wholesale at each pause.
#[derive(Debug, Clone, Default)]
pub struct LastSnapshot {
    pub variables: VariableSnapshot,
    pub call_stack: Vec<FrameSnapshot>,
}
