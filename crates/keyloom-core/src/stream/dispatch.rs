// Keyloom Dispatch
// Bottom of the pull chain: a rerun buffer in front of the key source

use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use crate::event::KeyEvent;
use crate::io::{KeySource, SourcePoll};

/// The dispatch stage owns the rerun buffer: events replayed by a sluice
/// flush or injected by button actions queue here and are yielded before
/// anything new is read from the source.
pub struct Dispatch {
    source: Box<dyn KeySource>,
    rerun: VecDeque<KeyEvent>,
}

impl Dispatch {
    pub fn new(source: Box<dyn KeySource>) -> Self {
        Self {
            source,
            rerun: VecDeque::new(),
        }
    }

    /// Yield the rerun head if there is one, otherwise wait on the source
    /// for at most `timeout`.
    pub fn pull(&mut self, timeout: Option<Duration>) -> io::Result<SourcePoll> {
        if let Some(event) = self.rerun.pop_front() {
            return Ok(SourcePoll::Event(event));
        }
        self.source.poll(timeout)
    }

    /// Prepend `events` to the rerun buffer, preserving their relative
    /// order. Replayed events therefore come out ahead of anything a
    /// timeout pushed in the meantime.
    pub fn rerun(&mut self, events: impl IntoIterator<Item = KeyEvent>) {
        let mut events: Vec<KeyEvent> = events.into_iter().collect();
        while let Some(event) = events.pop() {
            self.rerun.push_front(event);
        }
    }

    /// Push a single synthetic event at the head of the rerun buffer
    pub fn inject(&mut self, event: KeyEvent) {
        self.rerun.push_front(event);
    }

    /// Number of events waiting in the rerun buffer
    pub fn pending(&self) -> usize {
        self.rerun.len()
    }
}
