//! Integration tests for the debug session lifecycle.
//!
//! These drive a real execution thread through the controller API and
//! observe the output channel, the way a front end would.

use std::thread;
use std::time::{Duration, Instant};

use linestep::debug::{
    Breakpoint, DebugSession, FrameSnapshot, OutputEvent, ToggleAction, VariableSnapshot,
};

const WAIT: Duration = Duration::from_secs(2);

fn next_event(session: &DebugSession, timeout: Duration) -> Option<OutputEvent> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(evt) = session.next_output() {
            return Some(evt);
        }
        if Instant::now() >= deadline {
            return None;
        }
        thread::sleep(Duration::from_millis(5));
    }
}

fn expect_update(session: &DebugSession) -> (u32, VariableSnapshot, Vec<FrameSnapshot>) {
    match next_event(session, WAIT) {
        Some(OutputEvent::StateUpdate {
            line,
            variables,
            call_stack,
            ..
        }) => (line, variables, call_stack),
        other => panic!("expected a state update, got {other:?}"),
    }
}

fn wait_until_idle(session: &DebugSession) {
    let deadline = Instant::now() + WAIT;
    while session.is_active() {
        assert!(Instant::now() < deadline, "execution thread should have finished");
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn three_line_scenario_publishes_three_updates() {
    let mut session = DebugSession::new();
    session.start_debugging("x = 1\ny = 2\nprint(x + y)");

    let (line, _, _) = expect_update(&session);
    assert_eq!(line, 1);
    session.continue_execution();

    let (line, _, _) = expect_update(&session);
    assert_eq!(line, 2);
    session.continue_execution();

    let (line, variables, _) = expect_update(&session);
    assert_eq!(line, 3);
    assert_eq!(variables.locals.get("x").map(String::as_str), Some("1"));
    assert_eq!(variables.locals.get("y").map(String::as_str), Some("2"));
    session.continue_execution();

    match next_event(&session, WAIT) {
        Some(OutputEvent::Output(text)) => assert_eq!(text, "3"),
        other => panic!("expected program output, got {other:?}"),
    }

    wait_until_idle(&session);
    assert!(session.next_output().is_none());
    assert!(!session.state().running);
}

#[test]
fn toggle_breakpoint_is_idempotent_over_two_calls() {
    let session = DebugSession::new();

    let first = session.toggle_breakpoint("a.py", 5);
    assert_eq!(first.action, ToggleAction::Added);
    assert_eq!(first.line, 5);
    assert_eq!(session.state().breakpoints["a.py"], vec![5]);

    let second = session.toggle_breakpoint("a.py", 5);
    assert_eq!(second.action, ToggleAction::Removed);
    assert_eq!(second.line, 5);
    assert!(session.state().breakpoints.is_empty());
}

#[test]
fn repeated_toggles_never_duplicate_entries() {
    let session = DebugSession::new();
    for _ in 0..3 {
        session.toggle_breakpoint("a.py", 7);
        session.toggle_breakpoint("a.py", 7);
    }
    session.toggle_breakpoint("a.py", 7);
    assert_eq!(session.state().breakpoints["a.py"], vec![7]);
}

#[test]
fn fault_publishes_one_error_and_no_more_updates() {
    let mut session = DebugSession::new();
    session.start_debugging("x = 1\ny = x + z\nprint(y)");

    let (line, _, _) = expect_update(&session);
    assert_eq!(line, 1);
    session.step_into();

    let (line, _, _) = expect_update(&session);
    assert_eq!(line, 2);
    session.step_into();

    match next_event(&session, WAIT) {
        Some(OutputEvent::Error(message)) => {
            assert!(message.contains("'z' is not defined"), "{message}");
        }
        other => panic!("expected an error message, got {other:?}"),
    }

    wait_until_idle(&session);
    assert!(session.next_output().is_none());
    assert!(!session.state().running);
}

#[test]
fn stop_debugging_waits_for_thread_termination() {
    let mut session = DebugSession::new();
    session.start_debugging("i = 0\nwhile i < 100:\n    i = i + 1\nprint(i)");

    let (line, _, _) = expect_update(&session);
    assert_eq!(line, 1);

    session.stop_debugging();
    assert!(!session.is_active());
    assert!(!session.state().running);

    // the session is reusable afterwards
    session.start_debugging("a = 1");
    let (line, _, _) = expect_update(&session);
    assert_eq!(line, 1);
    session.continue_execution();
    wait_until_idle(&session);
}

#[test]
fn stop_with_no_session_is_a_noop() {
    let mut session = DebugSession::new();
    session.toggle_breakpoint("a.py", 2);
    session.stop_debugging();
    assert_eq!(session.state().breakpoints["a.py"], vec![2]);
}

#[test]
fn second_start_while_running_is_dropped() {
    let mut session = DebugSession::new();
    session.toggle_breakpoint("a.py", 5);
    session.start_debugging("a = 1\nb = 2");

    let (line, _, _) = expect_update(&session);
    assert_eq!(line, 1);

    // still paused, so this start must be silently dropped
    session.start_debugging("zzz = 99");
    assert!(session.is_active());
    assert_eq!(session.state().breakpoints["a.py"], vec![5]);

    session.step_into();
    let (line, variables, _) = expect_update(&session);
    assert_eq!(line, 2);
    assert!(variables.locals.contains_key("a"));
    assert!(!variables.locals.contains_key("zzz"));

    session.step_into();
    wait_until_idle(&session);
    assert!(session.next_output().is_none());
}

#[test]
fn speculative_commands_are_buffered() {
    let mut session = DebugSession::new();
    session.start_debugging("x = 1\ny = 2\nprint(x + y)");

    // enqueue all three resumes before consuming anything
    session.continue_execution();
    session.continue_execution();
    session.continue_execution();

    wait_until_idle(&session);

    let mut updates = 0;
    let mut outputs = Vec::new();
    while let Some(evt) = session.next_output() {
        match evt {
            OutputEvent::StateUpdate { .. } => updates += 1,
            OutputEvent::Output(text) => outputs.push(text),
            OutputEvent::Error(message) => panic!("unexpected error: {message}"),
        }
    }
    assert_eq!(updates, 3);
    assert_eq!(outputs, vec!["3"]);
}

#[test]
fn step_over_skips_called_function_lines() {
    let mut session = DebugSession::new();
    session.start_debugging("def add(a, b):\n    c = a + b\n    return c\nx = add(1, 2)\nprint(x)");

    let mut lines = Vec::new();
    for _ in 0..3 {
        let (line, _, _) = expect_update(&session);
        lines.push(line);
        session.step_over();
    }
    assert_eq!(lines, vec![1, 4, 5]);

    match next_event(&session, WAIT) {
        Some(OutputEvent::Output(text)) => assert_eq!(text, "3"),
        other => panic!("expected program output, got {other:?}"),
    }
    wait_until_idle(&session);
}

#[test]
fn step_into_enters_called_functions() {
    let mut session = DebugSession::new();
    session.start_debugging("def add(a, b):\n    c = a + b\n    return c\nx = add(1, 2)\nprint(x)");

    let mut lines = Vec::new();
    for _ in 0..5 {
        let (line, _, call_stack) = expect_update(&session);
        lines.push((line, call_stack.len()));
        session.step_into();
    }
    assert_eq!(lines, vec![(1, 1), (4, 1), (2, 2), (3, 2), (5, 1)]);
    wait_until_idle(&session);
}

#[test]
fn continue_runs_to_the_next_breakpoint() {
    let mut session = DebugSession::new();
    session.toggle_breakpoint("<string>", 5);
    session.start_debugging("a = 1\nb = 2\nc = 3\nd = 4\ne = 5\nprint(e)");

    let (line, _, _) = expect_update(&session);
    assert_eq!(line, 1);
    session.continue_execution();

    let (line, variables, _) = expect_update(&session);
    assert_eq!(line, 5);
    assert_eq!(variables.locals.get("d").map(String::as_str), Some("4"));
    session.continue_execution();

    match next_event(&session, WAIT) {
        Some(OutputEvent::Output(text)) => assert_eq!(text, "5"),
        other => panic!("expected program output, got {other:?}"),
    }
    wait_until_idle(&session);
    assert!(session.next_output().is_none());
}

#[test]
fn conditional_breakpoint_pauses_when_condition_holds() {
    let mut session = DebugSession::new();
    session.set_breakpoint(
        "<string>",
        3,
        Breakpoint {
            condition: Some("i == 3".into()),
            ..Breakpoint::default()
        },
    );
    session.start_debugging("i = 0\nwhile i < 5:\n    i = i + 1\nprint(i)");

    let (line, _, _) = expect_update(&session);
    assert_eq!(line, 1);
    session.continue_execution();

    let (line, variables, _) = expect_update(&session);
    assert_eq!(line, 3);
    assert_eq!(variables.locals.get("i").map(String::as_str), Some("3"));
    session.continue_execution();

    match next_event(&session, WAIT) {
        Some(OutputEvent::Output(text)) => assert_eq!(text, "5"),
        other => panic!("expected program output, got {other:?}"),
    }
    wait_until_idle(&session);
}

#[test]
fn state_keeps_last_snapshot_after_completion() {
    let mut session = DebugSession::new();
    session.start_debugging("x = 1\ny = 2\nprint(x + y)");
    session.continue_execution();
    session.continue_execution();
    session.continue_execution();
    wait_until_idle(&session);

    let state = session.state();
    assert!(!state.running);
    assert_eq!(state.variables.locals.get("x").map(String::as_str), Some("1"));
    assert_eq!(state.variables.locals.get("y").map(String::as_str), Some("2"));
    assert_eq!(state.call_stack.len(), 1);
    assert_eq!(state.call_stack[0].function, "<module>");
}

#[test]
fn dropping_a_paused_session_does_not_hang() {
    let mut session = DebugSession::new();
    session.start_debugging("x = 1\ny = 2");
    let (line, _, _) = expect_update(&session);
    assert_eq!(line, 1);
    drop(session);
}
