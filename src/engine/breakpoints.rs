//! Breakpoint table shared between the controller thread and the interpreter.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Poison-tolerant lock: a panicked holder yields its guard instead of
/// wedging the session.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Attributes of a single registered breakpoint.
#[derive(Debug, Clone, Default)]
pub struct Breakpoint {
    /// Auto-removed after its first hit.
    pub temporary: bool,
    /// Condition expression; the breakpoint only hits when it evaluates
    /// truthy in the paused frame. Evaluation faults count as a hit.
    pub condition: Option<String>,
    /// Only hit while executing inside the named function.
    pub func_name: Option<String>,
}

/// Registry of breakpoints, keyed by file identifier then line number.
/// Ordered and duplicate-free by construction.
#[derive(Debug, Clone, Default)]
pub struct BreakpointTable {
    files: BTreeMap<String, BTreeMap<u32, Breakpoint>>,
}

/// Handle shared between the session controller and a running interpreter.
pub type SharedBreakpoints = Arc<Mutex<BreakpointTable>>;

impl BreakpointTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a breakpoint. Re-registering the same (file, line) replaces
    /// the attributes; it never duplicates the entry.
    pub fn set(&mut self, file: &str, line: u32, bp: Breakpoint) {
        self.files.entry(file.to_string()).or_default().insert(line, bp);
    }

    /// Remove a breakpoint. Absent entries are a no-op.
    pub fn clear(&mut self, file: &str, line: u32) {
        if let Some(lines) = self.files.get_mut(file) {
            lines.remove(&line);
            if lines.is_empty() {
                self.files.remove(file);
            }
        }
    }

    /// Empty the registry for every file.
    pub fn clear_all(&mut self) {
        self.files.clear();
    }

    pub fn contains(&self, file: &str, line: u32) -> bool {
        self.files.get(file).is_some_and(|lines| lines.contains_key(&line))
    }

    pub fn get(&self, file: &str, line: u32) -> Option<&Breakpoint> {
        self.files.get(file)?.get(&line)
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Line numbers per file, for state reporting.
    pub fn lines(&self) -> BTreeMap<String, Vec<u32>> {
        self.files
            .iter()
            .map(|(file, lines)| (file.clone(), lines.keys().copied().collect()))
            .collect()
    }
}
