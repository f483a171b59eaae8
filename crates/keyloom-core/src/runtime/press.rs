// Keyloom Button Interpreter
// Press semantics for every button variant
//
// Pressing a button runs its immediate effects and records how to undo them
// as release thunks. The thunks run newest-first when the key's release
// cycle fires, so nested presses (around, held tap-next branches) unwind in
// reverse press order. Decision buttons block the sluice, park their choice
// in a hook, and leave their release behavior to whichever branch wins.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::button::{Button, MultiTapStep};
use crate::event::{KeyEvent, Switch};
use crate::keymap::{LayerOp, ReleaseThunk};
use crate::runtime::{Engine, Kenv};
use crate::stream::hooks::{Hook, HookVerdict};

/// Run the press half of `button`, pushing its release behavior onto
/// `releases` in press order.
pub(crate) fn press_button(k: &mut Kenv, button: &Arc<Button>, releases: &mut Vec<ReleaseThunk>) {
    match &**button {
        Button::Emit(code) => {
            let code = *code;
            k.emit(KeyEvent::press(code));
            releases.push(Box::new(move |k: &mut Kenv| {
                k.emit(KeyEvent::release(code));
            }));
        }

        Button::LayerToggle(tag) => {
            let tag = tag.clone();
            k.layer_op(&LayerOp::PushLayer(tag.clone()));
            releases.push(Box::new(move |k: &mut Kenv| {
                k.layer_op(&LayerOp::PopLayer(tag));
            }));
        }

        Button::LayerSwitch(tag) => {
            k.layer_op(&LayerOp::SetBase(tag.clone()));
        }

        Button::TapNext { tap, hold } => {
            press_tap_next(k, tap.clone(), hold.clone());
        }

        Button::TapHold { delay, tap, hold } => {
            press_tap_hold(k, *delay, tap.clone(), hold.clone());
        }

        Button::MultiTap { steps, last } => {
            if steps.is_empty() {
                press_button(k, last, releases);
            } else {
                arm_multi_tap(k, steps.clone(), last.clone(), 0);
            }
        }

        Button::Around { outer, inner } => {
            press_button(k, outer, releases);
            press_button(k, inner, releases);
        }

        Button::AroundNext(wrapped) => {
            press_around_next(k, wrapped.clone());
        }

        Button::TapMacro(children) => {
            for child in children.iter() {
                tap_button(k, child);
            }
        }

        Button::ComposeSeq(children) => {
            let leader = k.settings().compose_key;
            let delay = k.settings().seq_delay;
            k.emit(KeyEvent::press(leader));
            k.emit(KeyEvent::release(leader));
            for child in children.iter() {
                if let Some(delay) = delay {
                    k.pause(delay);
                }
                tap_button(k, child);
            }
        }

        Button::Pause(duration) => {
            k.pause(*duration);
        }

        Button::Trans => {
            // Resolution strips transparency before dispatch
            log::warn!("transparent binding reached the runtime for {}", k.keycode());
        }

        Button::Block => {}
    }
}

/// Press and immediately release `button`
pub(crate) fn tap_button(k: &mut Kenv, button: &Arc<Button>) {
    let mut releases = Vec::new();
    press_button(k, button, &mut releases);
    for thunk in releases.into_iter().rev() {
        thunk(k);
    }
}

/// The first event after the press decides: my own release means tap,
/// anything else means hold. Either way the sluice reopens first so the
/// deciding event (and anything behind it) resolves against the post-
/// decision state.
fn press_tap_next(k: &mut Kenv, tap: Arc<Button>, hold: Arc<Button>) {
    k.hold(true);
    let keycode = k.keycode();
    let benv = k.benv().clone();
    k.await_event(
        |_| true,
        move |engine: &mut Engine, event: &KeyEvent| {
            let mut k = Kenv::new(engine, benv);
            k.hold(false);
            if event.is_release_of(keycode) {
                tap_button(&mut k, &tap);
            } else {
                let mut releases = Vec::new();
                press_button(&mut k, &hold, &mut releases);
                k.benv().push_releases(releases);
            }
            HookVerdict::NoCatch
        },
    );
}

/// Tap if the key comes back up before the deadline, hold otherwise.
fn press_tap_hold(k: &mut Kenv, delay: Duration, tap: Arc<Button>, hold: Arc<Button>) {
    k.hold(true);
    let keycode = k.keycode();
    let deadline = Instant::now() + delay;
    let match_benv = k.benv().clone();
    let timeout_benv = k.benv().clone();

    let hook = Hook::new(
        move |e: &KeyEvent| e.is_release_of(keycode),
        move |engine: &mut Engine, _event: &KeyEvent| {
            let mut k = Kenv::new(engine, match_benv);
            k.hold(false);
            tap_button(&mut k, &tap);
            HookVerdict::NoCatch
        },
    )
    .with_timeout(deadline, move |engine: &mut Engine| {
        let mut k = Kenv::new(engine, timeout_benv);
        k.hold(false);
        let mut releases = Vec::new();
        press_button(&mut k, &hold, &mut releases);
        k.benv().push_releases(releases);
    });
    k.register_input(hook);
}

/// Arm the hook for multi-tap step `index`: a press of the same key within
/// the gap advances the chain, a timeout taps the step's button. Advancing
/// past the final step presses `last` and keeps it down until the key comes
/// back up.
fn arm_multi_tap(k: &mut Kenv, steps: Arc<[MultiTapStep]>, last: Arc<Button>, index: usize) {
    let keycode = k.keycode();

    if index == steps.len() {
        // The press that got us here was consumed at the hook stage, so the
        // loop never armed a release cycle for it; watch for the release
        // ourselves.
        let mut releases = Vec::new();
        press_button(k, &last, &mut releases);
        let benv = k.benv().clone();
        k.await_my(
            Switch::Release,
            move |engine: &mut Engine, _event: &KeyEvent| {
                let mut k = Kenv::new(engine, benv);
                for thunk in releases.into_iter().rev() {
                    thunk(&mut k);
                }
                HookVerdict::Catch
            },
        );
        return;
    }

    let gap = steps[index].gap.unwrap_or(k.settings().tap_gap);
    let deadline = Instant::now() + gap;
    let tap_btn = steps[index].button.clone();
    let match_benv = k.benv().clone();
    let timeout_benv = k.benv().clone();
    let next_steps = steps.clone();

    let hook = Hook::new(
        move |e: &KeyEvent| e.is_press_of(keycode),
        move |engine: &mut Engine, _event: &KeyEvent| {
            let mut k = Kenv::new(engine, match_benv);
            arm_multi_tap(&mut k, next_steps, last, index + 1);
            HookVerdict::Catch
        },
    )
    .with_timeout(deadline, move |engine: &mut Engine| {
        let mut k = Kenv::new(engine, timeout_benv);
        tap_button(&mut k, &tap_btn);
    });
    k.register_input(hook);
}

/// Wrap the next pressed key: press the wrapped button ahead of it, release
/// the wrapped button when that key's release shows up. Both foreign events
/// stay in the stream.
fn press_around_next(k: &mut Kenv, wrapped: Arc<Button>) {
    let benv = k.benv().clone();
    k.await_event(
        |e| e.switch.is_press(),
        move |engine: &mut Engine, event: &KeyEvent| {
            let mut k = Kenv::new(engine, benv);
            let mut releases = Vec::new();
            press_button(&mut k, &wrapped, &mut releases);

            let inner = event.keycode;
            let benv = k.benv().clone();
            k.await_event(
                move |e| e.is_release_of(inner),
                move |engine: &mut Engine, _event: &KeyEvent| {
                    let mut k = Kenv::new(engine, benv);
                    for thunk in releases.into_iter().rev() {
                        thunk(&mut k);
                    }
                    HookVerdict::NoCatch
                },
            );
            HookVerdict::NoCatch
        },
    );
}
