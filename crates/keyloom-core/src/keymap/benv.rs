// Keyloom Button Environments
// Per-binding runtime state: alternation guard and pending releases

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::button::Button;
use crate::key::Keycode;
use crate::runtime::Kenv;

/// The last half-cycle a binding executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LastAction {
    None,
    Press,
    Release,
}

/// Deferred release behavior recorded during a press.
///
/// Press interpretation pushes one thunk per thing it will have to undo;
/// the central release hook replays them newest-first, so nested presses
/// unwind in reverse order.
pub type ReleaseThunk = Box<dyn FnOnce(&mut Kenv) + Send>;

type ReleaseStack = SmallVec<[ReleaseThunk; 2]>;

/// Runtime environment of one binding in the keymap.
///
/// Created once per layout entry when the keymap is built; shared into hook
/// closures behind `Arc`, which is why the interior state sits behind
/// mutexes even though the input pipeline is single-threaded.
pub struct BEnv {
    keycode: Keycode,
    binding: Arc<Button>,
    last_action: Mutex<LastAction>,
    pending: Mutex<ReleaseStack>,
}

impl BEnv {
    pub fn new(keycode: Keycode, binding: Arc<Button>) -> Self {
        Self {
            keycode,
            binding,
            last_action: Mutex::new(LastAction::None),
            pending: Mutex::new(ReleaseStack::new()),
        }
    }

    pub fn keycode(&self) -> Keycode {
        self.keycode
    }

    pub fn binding(&self) -> &Arc<Button> {
        &self.binding
    }

    pub fn last_action(&self) -> LastAction {
        *self.last_action.lock()
    }

    /// Claim the press half-cycle. Returns false for a duplicate press
    /// (the binding is already down), in which case the caller must drop
    /// the event.
    pub fn begin_press(&self) -> bool {
        let mut last = self.last_action.lock();
        if *last == LastAction::Press {
            return false;
        }
        *last = LastAction::Press;
        true
    }

    /// Claim the release half-cycle. Only legal after a press.
    pub fn begin_release(&self) -> bool {
        let mut last = self.last_action.lock();
        if *last != LastAction::Press {
            return false;
        }
        *last = LastAction::Release;
        true
    }

    /// Queue release behavior to run when this press cycle ends
    pub fn push_releases(&self, thunks: impl IntoIterator<Item = ReleaseThunk>) {
        self.pending.lock().extend(thunks);
    }

    /// Take every queued release thunk, oldest first
    pub fn take_releases(&self) -> Vec<ReleaseThunk> {
        self.pending.lock().drain(..).collect()
    }
}

impl fmt::Debug for BEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BEnv")
            .field("keycode", &self.keycode)
            .field("binding", &self.binding)
            .field("last_action", &self.last_action())
            .field("pending", &self.pending.lock().len())
            .finish()
    }
}
