// Keyloom Device Edge
// Abstract source/sink traits the engine is wired against

use std::io;
use std::time::Duration;

use crate::event::KeyEvent;

/// Outcome of a single bounded wait on a key source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourcePoll {
    /// An event arrived within the wait budget
    Event(KeyEvent),
    /// The wait budget elapsed with nothing to read
    Timeout,
    /// The source is gone for good; the engine shuts down cleanly
    Closed,
}

/// A raw key event producer (a grabbed keyboard device, a test script, ...).
///
/// `poll` blocks for at most `timeout`; `None` blocks until an event arrives
/// or the source closes. The bounded form exists so the engine can wake up
/// for timed-hook deadlines while the keyboard is idle.
///
/// I/O failures are fatal to the engine and must be reported as errors, not
/// swallowed into `Timeout`.
pub trait KeySource {
    fn poll(&mut self, timeout: Option<Duration>) -> io::Result<SourcePoll>;
}

/// A key event consumer (a virtual uinput device, a test buffer, ...).
///
/// The sink must write events in the order it receives them. It runs on the
/// emitter worker, hence the `Send` bound.
pub trait KeySink: Send {
    fn emit(&mut self, event: KeyEvent) -> io::Result<()>;
}
