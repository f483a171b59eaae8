// Keyloom Button Capabilities
// The capability surface handed to every button action

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::button::Button;
use crate::event::{KeyEvent, Switch};
use crate::key::Keycode;
use crate::keymap::{BEnv, LayerOp};
use crate::output::SinkCtx;
use crate::runtime::Engine;
use crate::stream::hooks::{Hook, HookId, HookVerdict};

/// Everything a button action is allowed to do, bundled with the identity
/// of the binding it is acting for.
///
/// Actions receive this by `&mut` at invocation instead of reaching for
/// engine internals; hook closures that outlive the invocation capture the
/// binding's `Arc<BEnv>` and rebuild a `Kenv` when they fire.
pub struct Kenv<'e> {
    engine: &'e mut Engine,
    benv: Arc<BEnv>,
}

impl<'e> Kenv<'e> {
    pub(crate) fn new(engine: &'e mut Engine, benv: Arc<BEnv>) -> Self {
        Self { engine, benv }
    }

    /// The physical key this action runs for
    pub fn keycode(&self) -> Keycode {
        self.benv.keycode()
    }

    /// The button definition currently bound, for self-referential
    /// primitives
    pub fn my_binding(&self) -> Arc<Button> {
        self.benv.binding().clone()
    }

    pub(crate) fn benv(&self) -> &Arc<BEnv> {
        &self.benv
    }

    pub fn settings(&self) -> &crate::settings::Settings {
        self.engine.settings()
    }

    /// Write an event to the output cell
    pub fn emit(&mut self, event: KeyEvent) {
        self.engine.emit_event(event);
    }

    /// Delay without yielding to other button actions
    pub fn pause(&self, duration: Duration) {
        thread::sleep(duration);
    }

    /// `true` blocks the sluice; `false` unblocks it and replays whatever
    /// it held back. Calls must balance over a press/release cycle.
    pub fn hold(&mut self, enable: bool) {
        self.engine.hold(enable);
    }

    /// Mutate the layer stack; failures are reported and dropped
    pub fn layer_op(&mut self, op: &LayerOp) {
        self.engine.layer_op(op);
    }

    /// Push a synthetic event at the head of the dispatch rerun buffer
    pub fn inject(&mut self, event: KeyEvent) {
        self.engine.inject(event);
    }

    /// Install a hook on the input chain; it observes the next pulled event
    pub fn register_input(&mut self, hook: Hook<Engine>) -> HookId {
        self.engine.register_input(hook)
    }

    /// Install a hook on the outbound side
    pub fn register_output(&mut self, hook: Hook<SinkCtx>) -> HookId {
        self.engine.register_output(hook)
    }

    /// Await the next event matching `predicate` (no deadline)
    pub fn await_event(
        &mut self,
        predicate: impl Fn(&KeyEvent) -> bool + Send + 'static,
        action: impl FnOnce(&mut Engine, &KeyEvent) -> HookVerdict + Send + 'static,
    ) -> HookId {
        self.engine.await_input(predicate, action)
    }

    /// Await the next `switch` edge of this binding's own keycode
    pub fn await_my(
        &mut self,
        switch: Switch,
        action: impl FnOnce(&mut Engine, &KeyEvent) -> HookVerdict + Send + 'static,
    ) -> HookId {
        let keycode = self.keycode();
        self.engine
            .await_input(move |e| e.switch == switch && e.keycode == keycode, action)
    }
}
