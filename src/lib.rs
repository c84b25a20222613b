//! Linestep - Interactive line-stepping script debugger
//!
//! Executes a small line-oriented scripting language under trace: the
//! engine pauses before each source line, the tracer publishes call-stack
//! and variable snapshots over a channel, and the session controller turns
//! that blocking protocol into a non-blocking debugging API.

pub mod debug;
pub mod engine;
pub mod ui;
