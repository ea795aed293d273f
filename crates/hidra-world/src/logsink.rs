//! Log sink callback surface
//!
//! Outer layers may attach a callback receiving `(tag, level, message)`
//! for every meaningful engine event. The callback must be non-blocking
//! best-effort and must not panic; it is invoked while the world lock
//! is held.

use std::sync::Arc;

/// Severity of a sink entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Diagnostic detail
    Debug,
    /// Normal progress
    Info,
    /// Recoverable anomaly (refused mutation, fuel exhaustion)
    Warning,
    /// Scoped failure (gene error)
    Error,
    /// World-halting failure
    Fatal,
}

/// Callback receiving engine log events.
pub type LogSink = Arc<dyn Fn(&str, LogLevel, &str) + Send + Sync>;
