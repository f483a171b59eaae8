// Keyloom Button Trees
// The tagged union of button behaviors a layout binds to key codes

use std::sync::Arc;
use std::time::Duration;

use crate::key::Keycode;
use crate::keymap::LayerTag;

/// One step of a multi-tap chain: how long the engine waits for the next
/// press, and what gets tapped if the wait times out at this step.
#[derive(Debug, Clone)]
pub struct MultiTapStep {
    /// Gap allowed before the next press; `None` falls back to the
    /// configured default tap gap.
    pub gap: Option<Duration>,
    pub button: Arc<Button>,
}

/// A button behavior, resolved from the user's layout by the loader.
///
/// Buttons form a tree: composite variants hold their children behind `Arc`
/// so decision hooks can keep a child alive across pull cycles without
/// cloning the subtree. Alias references are resolved away before the
/// engine ever sees a layout, so there is no reference variant here.
#[derive(Debug, Clone)]
pub enum Button {
    /// Emit the key code on press, and its release on release
    Emit(Keycode),
    /// Activate a layer while held
    LayerToggle(LayerTag),
    /// Replace the base layer on press
    LayerSwitch(LayerTag),
    /// Tap or hold, decided by the first event after the press
    TapNext { tap: Arc<Button>, hold: Arc<Button> },
    /// Tap or hold, decided by a deadline or an earlier release
    TapHold {
        delay: Duration,
        tap: Arc<Button>,
        hold: Arc<Button>,
    },
    /// Count consecutive presses within per-step gaps; exhausting the
    /// chain presses `last` for as long as the key stays down
    MultiTap {
        steps: Arc<[MultiTapStep]>,
        last: Arc<Button>,
    },
    /// Press outer, press inner; release inner, release outer
    Around { outer: Arc<Button>, inner: Arc<Button> },
    /// Wrap the next pressed key in a press/release of this button
    AroundNext(Arc<Button>),
    /// Tap each child in order
    TapMacro(Arc<[Arc<Button>]>),
    /// Tap the configured compose leader, then each child in order
    ComposeSeq(Arc<[Arc<Button>]>),
    /// Delay inside a macro sequence
    Pause(Duration),
    /// Transparent: resolution falls through to lower layers
    Trans,
    /// Consume one press/release cycle without emitting
    Block,
}

impl Button {
    pub fn emit(keycode: impl Into<Keycode>) -> Self {
        Button::Emit(keycode.into())
    }

    pub fn layer_toggle(tag: impl Into<LayerTag>) -> Self {
        Button::LayerToggle(tag.into())
    }

    pub fn layer_switch(tag: impl Into<LayerTag>) -> Self {
        Button::LayerSwitch(tag.into())
    }

    pub fn tap_next(tap: Button, hold: Button) -> Self {
        Button::TapNext {
            tap: Arc::new(tap),
            hold: Arc::new(hold),
        }
    }

    pub fn tap_hold(delay_ms: u64, tap: Button, hold: Button) -> Self {
        Button::TapHold {
            delay: Duration::from_millis(delay_ms),
            tap: Arc::new(tap),
            hold: Arc::new(hold),
        }
    }

    pub fn multi_tap<I>(steps: I, last: Button) -> Self
    where
        I: IntoIterator<Item = (Option<u64>, Button)>,
    {
        let steps: Vec<MultiTapStep> = steps
            .into_iter()
            .map(|(gap_ms, button)| MultiTapStep {
                gap: gap_ms.map(Duration::from_millis),
                button: Arc::new(button),
            })
            .collect();
        Button::MultiTap {
            steps: steps.into(),
            last: Arc::new(last),
        }
    }

    pub fn around(outer: Button, inner: Button) -> Self {
        Button::Around {
            outer: Arc::new(outer),
            inner: Arc::new(inner),
        }
    }

    pub fn around_next(button: Button) -> Self {
        Button::AroundNext(Arc::new(button))
    }

    pub fn tap_macro<I>(buttons: I) -> Self
    where
        I: IntoIterator<Item = Button>,
    {
        let buttons: Vec<Arc<Button>> = buttons.into_iter().map(Arc::new).collect();
        Button::TapMacro(buttons.into())
    }

    pub fn compose_seq<I>(buttons: I) -> Self
    where
        I: IntoIterator<Item = Button>,
    {
        let buttons: Vec<Arc<Button>> = buttons.into_iter().map(Arc::new).collect();
        Button::ComposeSeq(buttons.into())
    }

    pub fn pause(ms: u64) -> Self {
        Button::Pause(Duration::from_millis(ms))
    }

    /// Collect every layer tag referenced anywhere in this tree.
    ///
    /// Used by keymap construction to reject dangling layer references
    /// before the engine starts.
    pub fn layer_refs(&self, out: &mut Vec<LayerTag>) {
        match self {
            Button::LayerToggle(tag) | Button::LayerSwitch(tag) => out.push(tag.clone()),
            Button::TapNext { tap, hold } => {
                tap.layer_refs(out);
                hold.layer_refs(out);
            }
            Button::TapHold { tap, hold, .. } => {
                tap.layer_refs(out);
                hold.layer_refs(out);
            }
            Button::MultiTap { steps, last } => {
                for step in steps.iter() {
                    step.button.layer_refs(out);
                }
                last.layer_refs(out);
            }
            Button::Around { outer, inner } => {
                outer.layer_refs(out);
                inner.layer_refs(out);
            }
            Button::AroundNext(button) => button.layer_refs(out),
            Button::TapMacro(buttons) | Button::ComposeSeq(buttons) => {
                for button in buttons.iter() {
                    button.layer_refs(out);
                }
            }
            Button::Emit(_) | Button::Pause(_) | Button::Trans | Button::Block => {}
        }
    }

    /// Whether resolution should skip this entry and keep descending the
    /// layer stack
    pub fn is_transparent(&self) -> bool {
        matches!(self, Button::Trans)
    }
}
