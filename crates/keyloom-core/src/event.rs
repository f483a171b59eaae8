// Keyloom Key Events
// The immutable press/release events flowing through the pull chain

use std::fmt;
use std::time::Instant;

use crate::key::Keycode;

/// The edge of a key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Switch {
    Press,
    Release,
}

impl Switch {
    /// Returns true for a press edge
    pub fn is_press(self) -> bool {
        matches!(self, Switch::Press)
    }

    /// Returns true for a release edge
    pub fn is_release(self) -> bool {
        matches!(self, Switch::Release)
    }
}

impl fmt::Display for Switch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Switch::Press => write!(f, "press"),
            Switch::Release => write!(f, "release"),
        }
    }
}

/// A single key event.
///
/// Events are immutable once created; stages drop, copy, or replay them but
/// never edit them in place. `time` is the monotonic arrival instant stamped
/// by whoever created the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub switch: Switch,
    pub keycode: Keycode,
    pub time: Instant,
}

impl KeyEvent {
    pub fn new(switch: Switch, keycode: Keycode, time: Instant) -> Self {
        Self {
            switch,
            keycode,
            time,
        }
    }

    /// A press of `keycode` stamped now
    pub fn press(keycode: Keycode) -> Self {
        Self::new(Switch::Press, keycode, Instant::now())
    }

    /// A release of `keycode` stamped now
    pub fn release(keycode: Keycode) -> Self {
        Self::new(Switch::Release, keycode, Instant::now())
    }

    pub fn is_press_of(&self, keycode: Keycode) -> bool {
        self.switch.is_press() && self.keycode == keycode
    }

    pub fn is_release_of(&self, keycode: Keycode) -> bool {
        self.switch.is_release() && self.keycode == keycode
    }
}

impl fmt::Display for KeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.switch, self.keycode)
    }
}
