// Keyloom Sluice
// A depth-counted gate that can hold the stream back and replay it later

use smallvec::SmallVec;

use crate::event::KeyEvent;

type Holdback = SmallVec<[KeyEvent; 8]>;

/// While blocked, the sluice silently accumulates everything that makes it
/// past the input hooks; on the unblock that returns the depth to zero the
/// holdback is handed back for replay through the dispatch rerun buffer.
///
/// Block/unblock pairs must balance over a button's press/release cycle.
pub struct Sluice {
    depth: u32,
    buffer: Holdback,
}

impl Sluice {
    pub fn new() -> Self {
        Self {
            depth: 0,
            buffer: Holdback::new(),
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.depth > 0
    }

    /// Number of events currently held back
    pub fn held(&self) -> usize {
        self.buffer.len()
    }

    /// Close the gate, or deepen an existing closure
    pub fn block(&mut self) {
        self.depth += 1;
    }

    /// Open one level of the gate. At depth zero the holdback is drained
    /// and returned in arrival order for replay; otherwise the returned
    /// vector is empty.
    pub fn unblock(&mut self) -> Vec<KeyEvent> {
        debug_assert!(self.depth > 0, "sluice unblock without matching block");
        if self.depth == 0 {
            log::warn!("sluice unblock without matching block, ignoring");
            return Vec::new();
        }
        self.depth -= 1;
        if self.depth == 0 {
            self.buffer.drain(..).collect()
        } else {
            Vec::new()
        }
    }

    /// Hold an event back. Only meaningful while blocked.
    pub fn hold_back(&mut self, event: KeyEvent) {
        debug_assert!(self.is_blocked(), "sluice holdback while open");
        self.buffer.push(event);
    }
}

impl Default for Sluice {
    fn default() -> Self {
        Self::new()
    }
}
