// Keyloom Key Type
// Opaque key code identifier carried by every event

use std::fmt;

/// A key code as reported by the key source.
///
/// The engine treats codes as opaque identifiers; translation to and from
/// platform scan codes is the source/sink driver's business.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Keycode(pub u32);

impl Keycode {
    /// Raw numeric value of the code
    pub fn code(self) -> u32 {
        self.0
    }
}

impl From<u32> for Keycode {
    fn from(code: u32) -> Self {
        Keycode(code)
    }
}

impl fmt::Display for Keycode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "key:{}", self.0)
    }
}
