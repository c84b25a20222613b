//! Execution tracer.
//!
//! Runs a program through the engine and speaks the pause/resume protocol:
//! at every pause point it publishes a state update on the output channel,
//! then blocks reading the next command from the command channel.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex};

use crate::engine::breakpoints::lock;
use crate::engine::{
    self, Breakpoint, EngineError, PauseCtx, Resume, SharedBreakpoints, StepMode, TraceHook, Value,
    UNPRINTABLE,
};

use super::types::{FrameSnapshot, LastSnapshot, OutputEvent, StepCommand, VariableSnapshot};

/// Executes source under trace for one session at a time. All cross-thread
/// state is shared with the controller through the handles passed in at
/// construction.
pub struct Tracer {
    source_name: String,
    breakpoints: SharedBreakpoints,
    running: Arc<AtomicBool>,
    last: Arc<Mutex<LastSnapshot>>,
    commands: Arc<Mutex<Receiver<StepCommand>>>,
    output: Sender<OutputEvent>,
}

/// Clears the running flag when dropped; covers every exit path, panics
/// included.
struct RunningGuard(Arc<AtomicBool>);

impl RunningGuard {
    fn arm(flag: &Arc<AtomicBool>) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(Arc::clone(flag))
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Tracer {
    pub fn new(
        source_name: impl Into<String>,
        breakpoints: SharedBreakpoints,
        running: Arc<AtomicBool>,
        last: Arc<Mutex<LastSnapshot>>,
        commands: Arc<Mutex<Receiver<StepCommand>>>,
        output: Sender<OutputEvent>,
    ) -> Self {
        Self {
            source_name: source_name.into(),
            breakpoints,
            running,
            last,
            commands,
            output,
        }
    }

    /// Execute `source` under trace. Faults are published on the output
    /// channel, never returned; the running flag is cleared on every exit
    /// path.
    pub fn start(&mut self, source: &str) {
        let _running = RunningGuard::arm(&self.running);
        log::info!("trace started ({} bytes of source)", source.len());

        let file = self.source_name.clone();
        let breakpoints = Arc::clone(&self.breakpoints);
        match engine::run(source, &file, breakpoints, self) {
            Ok(()) => log::info!("trace completed"),
            Err(EngineError::Halted) => log::info!("trace halted by request"),
            Err(e) => {
                log::warn!("trace fault: {e}");
                let _ = self.output.send(OutputEvent::Error(e.to_string()));
            }
        }
    }

    /// Register a breakpoint. Duplicate registration replaces attributes
    /// without duplicating the entry.
    pub fn set_breakpoint(&self, file: &str, line: u32, bp: Breakpoint) {
        log::debug!("breakpoint set {file}:{line}");
        lock(&self.breakpoints).set(file, line, bp);
    }

    /// Remove a breakpoint; absent entries are a no-op.
    pub fn clear_breakpoint(&self, file: &str, line: u32) {
        log::debug!("breakpoint cleared {file}:{line}");
        lock(&self.breakpoints).clear(file, line);
    }

    /// Empty the registry for every file.
    pub fn clear_all_breakpoints(&self) {
        lock(&self.breakpoints).clear_all();
    }
}

impl TraceHook for Tracer {
    fn on_pause(&mut self, ctx: &PauseCtx<'_>) -> Resume {
        // values are copied out immediately; later steps may mutate or
        // destroy them
        let variables = snapshot_variables(ctx);
        let call_stack = snapshot_call_stack(ctx);

        *lock(&self.last) = LastSnapshot {
            variables: variables.clone(),
            call_stack: call_stack.clone(),
        };

        let _ = self.output.send(OutputEvent::StateUpdate {
            file: ctx.file().to_string(),
            line: ctx.line(),
            variables,
            call_stack,
        });

        let command = lock(&self.commands).recv();
        match command {
            Ok(StepCommand::StepInto) => Resume::Step(StepMode::Into),
            Ok(StepCommand::StepOver) => Resume::Step(StepMode::Over),
            Ok(StepCommand::Continue) => Resume::Step(StepMode::Continue),
            // stop token, or the controller went away entirely
            Ok(StepCommand::Stop) | Err(_) => Resume::Halt,
        }
    }

    fn on_output(&mut self, text: &str) {
        let _ = self.output.send(OutputEvent::Output(text.to_string()));
    }
}

fn render(value: &Value) -> String {
    value.repr().unwrap_or_else(|_| UNPRINTABLE.to_string())
}

fn snapshot_variables(ctx: &PauseCtx<'_>) -> VariableSnapshot {
    let mut locals = BTreeMap::new();
    for (name, value) in &ctx.current().locals {
        locals.insert(name.clone(), render(value));
    }

    // runtime-reserved names stay out of the global view; locals are
    // reported as-is
    let mut globals = BTreeMap::new();
    for (name, value) in ctx.globals() {
        if name.starts_with("__") {
            continue;
        }
        globals.insert(name.clone(), render(value));
    }

    VariableSnapshot { locals, globals }
}

fn snapshot_call_stack(ctx: &PauseCtx<'_>) -> Vec<FrameSnapshot> {
    ctx.frames()
        .map(|frame| FrameSnapshot {
            file: ctx.file().to_string(),
            function: frame.function.clone(),
            line: frame.line,
            locals: frame
                .locals
                .iter()
                .filter(|(name, _)| !name.starts_with("__"))
                .map(|(name, value)| (name.clone(), render(value)))
                .collect(),
        })
        .collect()
}
