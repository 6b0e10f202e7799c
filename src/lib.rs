//! A tiny interactive command interpreter with in-place line editing.
//!
//! This crate provides the building blocks of a minimal Unix shell: a
//! raw-mode line editor with a navigable command history, a resolver that
//! turns a completed line into an argument vector with optional stream
//! redirections or a two-stage pipeline, and an orchestrator that spawns
//! and reaps the corresponding child processes. It is intentionally small
//! and easy to read, suitable for experiments with terminal handling and
//! process management.
//!
//! The binary in `src/main.rs` wires the pieces into a read-eval loop; the
//! modules are public so the same building blocks can be driven directly,
//! as the tests do.

pub mod editor;
pub mod executor;
pub mod history;
pub mod lexer;
pub mod parser;

pub use editor::{EditorError, LineEditor, RawMode};
pub use history::HistoryLog;
pub use parser::Dispatch;
