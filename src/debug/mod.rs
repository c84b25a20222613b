//! Debug module - execution tracer and session controller.
//!
//! Two threads matter: the caller's (issuing commands, polling output) and
//! the single execution thread running the traced program. They meet at the
//! command and output channels, the shared breakpoint table, and the
//! last-published snapshot; nothing else crosses the boundary.

pub mod session;
pub mod tracer;
pub mod types;

pub use crate::engine::Breakpoint;
pub use session::DebugSession;
pub use tracer::Tracer;
pub use types::{
    FrameSnapshot, OutputEvent, SessionState, StepCommand, ToggleAction, ToggleResult,
    VariableSnapshot,
};
