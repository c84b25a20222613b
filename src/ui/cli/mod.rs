//! CLI - reedline-based REPL interface
//!
//! Thin interactive driver over the debug session: load a script, toggle
//! breakpoints, run, step, and inspect published state.

use std::time::{Duration, Instant};

use anyhow::Result;
use colored::Colorize;
use reedline::{
    Prompt, PromptHistorySearch, PromptHistorySearchStatus, Reedline, Signal,
};
use std::borrow::Cow;

use crate::debug::{Breakpoint, DebugSession, OutputEvent, SessionState};

/// Custom prompt showing the session status and loaded script.
pub struct DebugPrompt {
    /// Short name of the loaded script
    source: String,
    /// Whether a debugging session is active
    is_debugging: bool,
}

impl DebugPrompt {
    pub fn new() -> Self {
        Self {
            source: "<string>".into(),
            is_debugging: false,
        }
    }

    pub fn set_source(&mut self, source: impl Into<String>) {
        self.source = source.into();
    }

    pub fn set_debugging(&mut self, debugging: bool) {
        self.is_debugging = debugging;
    }
}

impl Default for DebugPrompt {
    fn default() -> Self {
        Self::new()
    }
}

impl Prompt for DebugPrompt {
    fn render_prompt_left(&self) -> Cow<'_, str> {
        let status = if self.is_debugging { "dbg" } else { "---" };
        Cow::Owned(format!("[{}:{}]", status, self.source))
    }

    fn render_prompt_right(&self) -> Cow<'_, str> {
        Cow::Borrowed("")
    }

    fn render_prompt_indicator(&self, _prompt_mode: reedline::PromptEditMode) -> Cow<'_, str> {
        Cow::Borrowed("> ")
    }

    fn render_prompt_multiline_indicator(&self) -> Cow<'_, str> {
        Cow::Borrowed("... ")
    }

    fn render_prompt_history_search_indicator(
        &self,
        history_search: PromptHistorySearch,
    ) -> Cow<'_, str> {
        let prefix = match history_search.status {
            PromptHistorySearchStatus::Passing => "",
            PromptHistorySearchStatus::Failing => "(failed) ",
        };
        Cow::Owned(format!("(search: {}{}) ", prefix, history_search.term))
    }
}

/// Command parsing result
#[derive(Debug)]
pub enum ParsedCommand {
    /// Load a script: o <path>
    Open(String),
    /// Start debugging the loaded script: run
    Run,
    /// Toggle (or conditionally set) a breakpoint: db <line> [cond]
    BreakpointToggle(u32, Option<String>),
    /// Delete a breakpoint: db- <line>
    BreakpointDelete(u32),
    /// Clear all breakpoints: dbc
    BreakpointsClear,
    /// Continue execution: dc
    Continue,
    /// Step into: ds
    StepInto,
    /// Step over: dso
    StepOver,
    /// Stop the session: stop
    Stop,
    /// Show session state: st
    State,
    /// Show the last call stack: bt
    Backtrace,
    /// Show the last variable snapshot: vars
    Variables,
    /// Help: ? or help
    Help,
    /// Quit: q or exit
    Quit,
    /// Unknown command
    Unknown(String),
}

/// Parse a command string into a structured command
fn parse_command(input: &str) -> ParsedCommand {
    let input = input.trim();
    let parts: Vec<&str> = input.splitn(2, ' ').collect();
    let cmd = parts.first().unwrap_or(&"");
    let arg = parts.get(1).map(|s| s.trim());

    match *cmd {
        // File operations
        "o" | "open" | "load" => {
            if let Some(path) = arg {
                return ParsedCommand::Open(path.to_string());
            }
            ParsedCommand::Unknown(input.to_string())
        }

        // Session control
        "run" | "r" => ParsedCommand::Run,
        "stop" => ParsedCommand::Stop,
        "dc" | "continue" | "c" => ParsedCommand::Continue,
        "ds" | "step" => ParsedCommand::StepInto,
        "dso" | "next" | "n" => ParsedCommand::StepOver,

        // Breakpoints
        "db" => {
            if let Some(arg) = arg {
                if let Some(line_str) = arg.strip_prefix('-') {
                    if let Ok(line) = line_str.trim().parse() {
                        return ParsedCommand::BreakpointDelete(line);
                    }
                } else {
                    let mut pieces = arg.splitn(2, ' ');
                    if let Some(Ok(line)) = pieces.next().map(str::parse) {
                        let cond = pieces.next().map(|s| s.trim().to_string());
                        return ParsedCommand::BreakpointToggle(line, cond);
                    }
                }
            }
            ParsedCommand::Unknown(input.to_string())
        }
        "db-" => {
            if let Some(Ok(line)) = arg.map(str::parse) {
                return ParsedCommand::BreakpointDelete(line);
            }
            ParsedCommand::Unknown(input.to_string())
        }
        "dbc" => ParsedCommand::BreakpointsClear,

        // Inspection
        "st" | "state" => ParsedCommand::State,
        "bt" | "backtrace" => ParsedCommand::Backtrace,
        "vars" => ParsedCommand::Variables,

        // Help
        "?" | "help" => ParsedCommand::Help,

        // Quit
        "q" | "quit" | "exit" => ParsedCommand::Quit,

        _ => ParsedCommand::Unknown(input.to_string()),
    }
}

/// Print the help message
fn print_help() {
    println!("{}", "Linestep CLI Commands".bold().cyan());
    println!("{}", "═".repeat(50).cyan());

    println!("\n{}", "Files:".bold().yellow());
    println!("  {}        Load a script", "o <path>".green());

    println!("\n{}", "Session:".bold().yellow());
    println!("  {}             Start debugging the loaded script", "run".green());
    println!("  {}            Stop the running session", "stop".green());
    println!("  {}              Continue to the next breakpoint", "dc".green());
    println!("  {}              Step into", "ds".green());
    println!("  {}             Step over", "dso".green());

    println!("\n{}", "Breakpoints:".bold().yellow());
    println!("  {}   Toggle breakpoint (optional condition)", "db <line> [cond]".green());
    println!("  {}       Delete breakpoint", "db- <line>".green());
    println!("  {}             Clear all breakpoints", "dbc".green());

    println!("\n{}", "Inspection:".bold().yellow());
    println!("  {}              Show session state", "st".green());
    println!("  {}              Show the last call stack", "bt".green());
    println!("  {}            Show the last variables", "vars".green());

    println!("\n{}", "Other:".bold().yellow());
    println!("  {}               Show this help", "?".green());
    println!("  {}               Quit linestep", "q".green());
}

/// REPL-side state: the session plus the loaded script text.
struct CliState {
    session: DebugSession,
    source: Option<String>,
}

fn print_event(evt: &OutputEvent) {
    match evt {
        OutputEvent::StateUpdate {
            file,
            line,
            call_stack,
            ..
        } => {
            let function = call_stack
                .first()
                .map(|f| f.function.as_str())
                .unwrap_or("<module>");
            println!(
                "{} paused at {}:{} in {}",
                "[*]".cyan(),
                file,
                line,
                function.bold()
            );
        }
        OutputEvent::Output(text) => println!("{text}"),
        OutputEvent::Error(message) => println!("{} {}", "[!]".red(), message),
    }
}

/// Drain the output channel, giving the tracer a beat to reach its next
/// pause point.
fn pump_output(session: &DebugSession) {
    let deadline = Instant::now() + Duration::from_millis(250);
    let mut seen = false;
    loop {
        while let Some(evt) = session.next_output() {
            seen = true;
            print_event(&evt);
        }
        if seen || Instant::now() >= deadline {
            break;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
}

fn print_state(state: &SessionState) {
    println!("{}", "Session".bold().cyan());
    println!("  running: {}", state.running);
    if state.breakpoints.is_empty() {
        println!("  breakpoints: {}", "none".dimmed());
    } else {
        for (file, lines) in &state.breakpoints {
            let lines: Vec<String> = lines.iter().map(u32::to_string).collect();
            println!("  breakpoints: {} @ {}", file, lines.join(", "));
        }
    }
    print_backtrace(state);
    print_variables(state);
}

fn print_backtrace(state: &SessionState) {
    if state.call_stack.is_empty() {
        println!("  call stack: {}", "empty".dimmed());
        return;
    }
    for (i, frame) in state.call_stack.iter().enumerate() {
        println!(
            "  #{} {} at {}:{}",
            i,
            frame.function.bold(),
            frame.file,
            frame.line
        );
    }
}

fn print_variables(state: &SessionState) {
    if state.variables.locals.is_empty() && state.variables.globals.is_empty() {
        println!("  variables: {}", "none".dimmed());
        return;
    }
    for (name, value) in &state.variables.locals {
        println!("  {} = {}", name.green(), value);
    }
    for (name, value) in &state.variables.globals {
        if !state.variables.locals.contains_key(name) {
            println!("  {} = {} {}", name.green(), value, "(global)".dimmed());
        }
    }
}

fn open_script(state: &mut CliState, path: &str) {
    match std::fs::read_to_string(path) {
        Ok(text) => {
            println!("[*] Loaded {} ({} lines)", path, text.lines().count());
            state.session.set_source_name(path.to_string());
            state.source = Some(text);
        }
        Err(e) => {
            println!("{} Failed to read {}: {}", "[✗]".red(), path, e);
        }
    }
}

/// Execute a parsed command. Returns `true` when the REPL should quit.
fn execute_command(cmd: ParsedCommand, state: &mut CliState) -> bool {
    match cmd {
        ParsedCommand::Open(path) => open_script(state, &path),
        ParsedCommand::Run => match &state.source {
            None => println!("{} No script loaded (use 'o <path>')", "[!]".yellow()),
            Some(source) => {
                if state.session.is_active() {
                    println!("{} A session is already running", "[!]".yellow());
                } else {
                    let source = source.clone();
                    state.session.start_debugging(&source);
                }
            }
        },
        ParsedCommand::Stop => {
            state.session.stop_debugging();
            println!("[*] Debug session stopped");
        }
        ParsedCommand::Continue => state.session.continue_execution(),
        ParsedCommand::StepInto => state.session.step_into(),
        ParsedCommand::StepOver => state.session.step_over(),
        ParsedCommand::BreakpointToggle(line, None) => {
            let file = state.session.source_name().to_string();
            let result = state.session.toggle_breakpoint(&file, line);
            println!("[*] Breakpoint {} at {}:{}", result.action, file, result.line);
        }
        ParsedCommand::BreakpointToggle(line, Some(cond)) => {
            let file = state.session.source_name().to_string();
            state.session.set_breakpoint(
                &file,
                line,
                Breakpoint {
                    condition: Some(cond.clone()),
                    ..Breakpoint::default()
                },
            );
            println!("[*] Breakpoint at {}:{} (if {})", file, line, cond);
        }
        ParsedCommand::BreakpointDelete(line) => {
            let file = state.session.source_name().to_string();
            state.session.clear_breakpoint(&file, line);
            println!("[*] Breakpoint deleted at {}:{}", file, line);
        }
        ParsedCommand::BreakpointsClear => {
            state.session.clear_all_breakpoints();
            println!("[*] All breakpoints cleared");
        }
        ParsedCommand::State => print_state(&state.session.state()),
        ParsedCommand::Backtrace => print_backtrace(&state.session.state()),
        ParsedCommand::Variables => print_variables(&state.session.state()),
        ParsedCommand::Help => print_help(),
        ParsedCommand::Quit => {
            println!("[*] Shutting down...");
            return true;
        }
        ParsedCommand::Unknown(input) => {
            println!("{} Unknown command: '{}'", "[!]".red(), input);
            println!("    Type '?' for help");
        }
    }
    false
}

/// Run the CLI REPL
pub fn run_cli(script: Option<String>) -> Result<()> {
    let mut line_editor = Reedline::create();
    let mut prompt = DebugPrompt::new();
    let mut state = CliState {
        session: DebugSession::new(),
        source: None,
    };

    println!(
        "{}",
        "╔══════════════════════════════════════════════════════════════╗".cyan()
    );
    println!(
        "{}",
        "║  Linestep CLI - Type '?' for help, 'q' to quit               ║".cyan()
    );
    println!(
        "{}",
        "╚══════════════════════════════════════════════════════════════╝".cyan()
    );

    if let Some(path) = script {
        open_script(&mut state, &path);
    }

    loop {
        prompt.set_debugging(state.session.is_active());
        prompt.set_source(state.session.source_name().to_string());

        let sig = line_editor.read_line(&prompt)?;
        match sig {
            Signal::Success(buffer) => {
                let input = buffer.trim();
                if input.is_empty() {
                    pump_output(&state.session);
                    continue;
                }

                let cmd = parse_command(input);
                if execute_command(cmd, &mut state) {
                    break;
                }
                pump_output(&state.session);
            }
            Signal::CtrlD | Signal::CtrlC => {
                println!("\n[*] Interrupted");
                break;
            }
        }
    }

    state.session.stop_debugging();
    Ok(())
}
