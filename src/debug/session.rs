//! Debug session controller.
//!
//! Manages the one-session-at-a-time lifecycle: runs the tracer in its own
//! thread and provides a non-blocking API over its blocking pause/resume
//! protocol. Only `stop_debugging` waits, and only for thread termination.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::engine::breakpoints::lock;
use crate::engine::{Breakpoint, SharedBreakpoints};

use super::tracer::Tracer;
use super::types::{
    LastSnapshot, OutputEvent, SessionState, StepCommand, ToggleAction, ToggleResult,
};

/// Owns one tracer configuration and at most one live execution thread.
///
/// Breakpoints, the last-published snapshot and the command/output channels
/// outlive individual runs, so state set between sessions carries over.
pub struct DebugSession {
    source_name: String,
    breakpoints: SharedBreakpoints,
    running: Arc<AtomicBool>,
    last: Arc<Mutex<LastSnapshot>>,
    command_tx: Sender<StepCommand>,
    commands: Arc<Mutex<Receiver<StepCommand>>>,
    output_tx: Sender<OutputEvent>,
    output_rx: Receiver<OutputEvent>,
    worker: Option<JoinHandle<()>>,
}

impl DebugSession {
    pub fn new() -> Self {
        let (command_tx, command_rx) = mpsc::channel();
        let (output_tx, output_rx) = mpsc::channel();
        Self {
            source_name: "<string>".into(),
            breakpoints: SharedBreakpoints::default(),
            running: Arc::new(AtomicBool::new(false)),
            last: Arc::default(),
            command_tx,
            commands: Arc::new(Mutex::new(command_rx)),
            output_tx,
            output_rx,
            worker: None,
        }
    }

    /// File identifier traced frames and breakpoints are keyed by.
    pub fn set_source_name(&mut self, name: impl Into<String>) {
        self.source_name = name.into();
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Whether an execution thread is currently alive.
    pub fn is_active(&self) -> bool {
        self.worker.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Start a new debug session. Dropped silently if the previous
    /// session's thread is still alive.
    pub fn start_debugging(&mut self, source: &str) {
        if self.is_active() {
            log::debug!("start request dropped: a session is already running");
            return;
        }
        if let Some(handle) = self.worker.take() {
            // reap the finished thread
            let _ = handle.join();
        }

        let mut tracer = Tracer::new(
            self.source_name.clone(),
            Arc::clone(&self.breakpoints),
            Arc::clone(&self.running),
            Arc::clone(&self.last),
            Arc::clone(&self.commands),
            self.output_tx.clone(),
        );
        let source = source.to_string();
        log::info!("debug session starting");
        self.worker = Some(std::thread::spawn(move || tracer.start(&source)));
    }

    /// Stop the current session and wait for its thread to terminate.
    /// A no-op when nothing is running.
    pub fn stop_debugging(&mut self) {
        let Some(handle) = self.worker.take() else {
            return;
        };
        if !handle.is_finished() {
            let _ = self.command_tx.send(StepCommand::Stop);
        }
        let _ = handle.join();

        // stale commands (including a stop that raced with completion) must
        // not leak into the next session
        let commands = lock(&self.commands);
        while commands.try_recv().is_ok() {}
        log::info!("debug session stopped");
    }

    /// Fire-and-forget: the next state update reflects the effect.
    pub fn step_into(&self) {
        let _ = self.command_tx.send(StepCommand::StepInto);
    }

    pub fn step_over(&self) {
        let _ = self.command_tx.send(StepCommand::StepOver);
    }

    pub fn continue_execution(&self) {
        let _ = self.command_tx.send(StepCommand::Continue);
    }

    /// Add or remove the breakpoint at (file, line), checked against the
    /// authoritative registry under a single lock.
    pub fn toggle_breakpoint(&self, file: &str, line: u32) -> ToggleResult {
        let mut table = lock(&self.breakpoints);
        if table.contains(file, line) {
            table.clear(file, line);
            log::debug!("breakpoint removed {file}:{line}");
            ToggleResult {
                action: ToggleAction::Removed,
                line,
            }
        } else {
            table.set(file, line, Breakpoint::default());
            log::debug!("breakpoint added {file}:{line}");
            ToggleResult {
                action: ToggleAction::Added,
                line,
            }
        }
    }

    pub fn set_breakpoint(&self, file: &str, line: u32, bp: Breakpoint) {
        lock(&self.breakpoints).set(file, line, bp);
    }

    pub fn clear_breakpoint(&self, file: &str, line: u32) {
        lock(&self.breakpoints).clear(file, line);
    }

    pub fn clear_all_breakpoints(&self) {
        lock(&self.breakpoints).clear_all();
    }

    /// Non-blocking snapshot: running flag, registry, and whatever the
    /// tracer last published.
    pub fn state(&self) -> SessionState {
        let last = lock(&self.last);
        SessionState {
            running: self.running.load(Ordering::SeqCst),
            breakpoints: lock(&self.breakpoints).lines(),
            variables: last.variables.clone(),
            call_stack: last.call_stack.clone(),
        }
    }

    /// Non-blocking poll of the output channel.
    pub fn next_output(&self) -> Option<OutputEvent> {
        self.output_rx.try_recv().ok()
    }
}

impl Default for DebugSession {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DebugSession {
    fn drop(&mut self) {
        self.stop_debugging();
    }
}
