// Keyloom Engine
// The pull chain assembled, plus the app loop that drives it

pub mod kenv;
mod press;

pub use kenv::Kenv;

use std::io;
use std::time::Instant;

use crate::event::{KeyEvent, Switch};
use crate::io::{KeySink, KeySource, SourcePoll};
use crate::keymap::{ConfigError, Keymap, LayerOp, Layout};
use crate::output::{OutputStage, SinkCtx};
use crate::settings::Settings;
use crate::stream::hooks::{run_entries, Hook, HookId, HookVerdict, Hooks};
use crate::stream::{Dispatch, Sluice};

/// Errors surfaced by the engine. Everything else (protocol violations,
/// duplicate presses, layer misuse) is logged and swallowed to keep the
/// loop alive.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("key source error: {0}")]
    Source(io::Error),

    #[error("key sink error: {0}")]
    Sink(io::Error),

    #[error("layout error: {0}")]
    Config(#[from] ConfigError),
}

/// The event engine: dispatch, input hooks, and sluice stacked over the
/// source, a keymap resolving presses to buttons, and the output stage on
/// its own worker.
///
/// All pipeline state lives here and is only ever touched from the thread
/// running `run`; button actions execute synchronously inside the loop.
pub struct Engine {
    dispatch: Dispatch,
    input_hooks: Hooks<Engine>,
    sluice: Sluice,
    keymap: Keymap,
    output: OutputStage,
    settings: Settings,
    fall_through: bool,
    fatal: Option<io::Error>,
}

impl Engine {
    pub fn new(
        source: impl KeySource + 'static,
        sink: impl KeySink + 'static,
        layout: &Layout,
        settings: Settings,
    ) -> Result<Self, EngineError> {
        let keymap = Keymap::from_layout(layout)?;
        let output = OutputStage::spawn(Box::new(sink)).map_err(EngineError::Sink)?;
        Ok(Self {
            dispatch: Dispatch::new(Box::new(source)),
            input_hooks: Hooks::new(),
            sluice: Sluice::new(),
            keymap,
            output,
            settings,
            fall_through: layout.fall_through,
            fatal: None,
        })
    }

    /// Run the app loop until the source closes or an I/O failure
    /// surfaces. Presses dispatch to their resolved button; releases are
    /// the business of the hooks their presses installed.
    pub fn run(&mut self) -> Result<(), EngineError> {
        log::info!(
            "engine started: {} layers, base layer '{}'",
            self.keymap.layer_count(),
            self.keymap.base()
        );

        while let Some(event) = self.pull()? {
            match event.switch {
                Switch::Press => self.press_key(event),
                Switch::Release => log::trace!("uncaught {event} ignored"),
            }
            if let Some(e) = self.fatal.take() {
                return Err(EngineError::Sink(e));
            }
        }

        log::info!("key source closed, engine stopping");
        Ok(())
    }

    pub fn keymap(&self) -> &Keymap {
        &self.keymap
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    // ---- pull chain ------------------------------------------------------

    /// Sluice stage: pass events through while open, hold them back while
    /// blocked. `None` means the source closed; anything still held back
    /// is dropped with the rest of the pending state.
    fn pull(&mut self) -> Result<Option<KeyEvent>, EngineError> {
        loop {
            let Some(event) = self.pull_hooked()? else {
                return Ok(None);
            };
            if self.sluice.is_blocked() {
                self.sluice.hold_back(event);
                continue;
            }
            return Ok(Some(event));
        }
    }

    /// Hook stage over dispatch: fire due timeouts, bound the source wait
    /// by the earliest deadline, and offer every pulled event to the
    /// registered hooks before yielding it.
    fn pull_hooked(&mut self) -> Result<Option<KeyEvent>, EngineError> {
        loop {
            self.fire_expired_hooks();
            let budget = self
                .input_hooks
                .next_deadline()
                .map(|d| d.saturating_duration_since(Instant::now()));
            match self.dispatch.pull(budget).map_err(EngineError::Source)? {
                SourcePoll::Event(event) => match self.offer_input(&event) {
                    HookVerdict::Catch => continue,
                    HookVerdict::NoCatch => return Ok(Some(event)),
                },
                SourcePoll::Timeout => continue,
                SourcePoll::Closed => return Ok(None),
            }
        }
    }

    fn fire_expired_hooks(&mut self) {
        loop {
            let expired = self.input_hooks.pop_expired(Instant::now());
            match expired {
                Some(action) => action(self),
                None => break,
            }
        }
    }

    fn offer_input(&mut self, event: &KeyEvent) -> HookVerdict {
        let entries = self.input_hooks.begin_offer();
        let (survivors, verdict) = run_entries(entries, self, event);
        self.input_hooks.finish_offer(survivors);
        verdict
    }

    // ---- key dispatch ----------------------------------------------------

    /// Resolve and press the button bound at `event.keycode`, then arm the
    /// release cycle. The release hook is registered before the loop pulls
    /// again, so the release cannot race past it.
    fn press_key(&mut self, event: KeyEvent) {
        let keycode = event.keycode;
        let Some(benv) = self.keymap.lookup(keycode) else {
            self.press_unmapped(event);
            return;
        };

        if !benv.begin_press() {
            // TODO: auto-repeat lands here as a duplicate press and is
            // dropped; decide whether repeats should re-trigger the button.
            log::debug!("duplicate press of {keycode} dropped");
            return;
        }

        let binding = benv.binding().clone();
        let mut releases = Vec::new();
        {
            let mut kenv = Kenv::new(self, benv.clone());
            press::press_button(&mut kenv, &binding, &mut releases);
        }
        benv.push_releases(releases);

        let hook_benv = benv.clone();
        self.await_input(
            move |e| e.is_release_of(keycode),
            move |engine: &mut Engine, _event: &KeyEvent| {
                if !hook_benv.begin_release() {
                    log::warn!("out-of-order release of {keycode} dropped");
                    return HookVerdict::Catch;
                }
                let thunks = hook_benv.take_releases();
                let mut kenv = Kenv::new(engine, hook_benv.clone());
                for thunk in thunks.into_iter().rev() {
                    thunk(&mut kenv);
                }
                HookVerdict::Catch
            },
        );
    }

    /// Fall-through policy for keycodes the keymap does not resolve
    fn press_unmapped(&mut self, event: KeyEvent) {
        let keycode = event.keycode;
        if !self.fall_through {
            log::debug!("no binding for {keycode}, dropped");
            return;
        }
        self.emit_event(event);
        self.await_input(
            move |e| e.is_release_of(keycode),
            move |engine: &mut Engine, _event: &KeyEvent| {
                engine.emit_event(KeyEvent::release(keycode));
                HookVerdict::Catch
            },
        );
    }

    // ---- capabilities backing Kenv ---------------------------------------

    pub(crate) fn emit_event(&mut self, event: KeyEvent) {
        if let Err(e) = self.output.send(event) {
            log::error!("output rejected {event}: {e}");
            self.fatal = Some(e);
        }
    }

    pub(crate) fn hold(&mut self, enable: bool) {
        if enable {
            self.sluice.block();
            return;
        }
        let drained = self.sluice.unblock();
        if !drained.is_empty() {
            log::debug!("sluice replaying {} held events", drained.len());
            self.dispatch.rerun(drained);
        }
    }

    pub(crate) fn layer_op(&mut self, op: &LayerOp) {
        if let Err(e) = self.keymap.apply(op) {
            log::warn!("layer operation dropped: {e}");
        }
    }

    pub(crate) fn inject(&mut self, event: KeyEvent) {
        self.dispatch.inject(event);
    }

    pub(crate) fn register_input(&mut self, hook: Hook<Engine>) -> HookId {
        self.input_hooks.register(hook)
    }

    pub(crate) fn register_output(&mut self, hook: Hook<SinkCtx>) -> HookId {
        self.output.register_hook(hook)
    }

    pub(crate) fn await_input(
        &mut self,
        predicate: impl Fn(&KeyEvent) -> bool + Send + 'static,
        action: impl FnOnce(&mut Engine, &KeyEvent) -> HookVerdict + Send + 'static,
    ) -> HookId {
        self.input_hooks.register(Hook::new(predicate, action))
    }
}
