//! UI module - interactive front ends over the debug session.

pub mod cli;
