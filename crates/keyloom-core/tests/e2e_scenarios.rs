// Keyloom End-to-End Scenarios
//
// These tests drive the whole engine - scripted source, pull chain, button
// runtime, emitter worker, collecting sink - through complete user
// workflows without real hardware. Timed behaviors use generous margins so
// slow machines stay on the right side of every deadline.

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use keyloom_core::{
    Button, Engine, KeyEvent, KeySink, KeySource, Keycode, Layout, Settings, SourcePoll, Switch,
};

// =========================================================================
// Test Helpers
// =========================================================================

const P: Switch = Switch::Press;
const R: Switch = Switch::Release;

/// Key source replaying a script of `(delay_ms, switch, code)` steps, each
/// delay measured from the moment the engine starts waiting for that step.
/// Closes once the script is exhausted.
struct ScriptSource {
    steps: VecDeque<(Duration, Switch, Keycode)>,
    due: Option<Instant>,
}

impl ScriptSource {
    fn new<I>(steps: I) -> Self
    where
        I: IntoIterator<Item = (u64, Switch, u32)>,
    {
        Self {
            steps: steps
                .into_iter()
                .map(|(ms, switch, code)| (Duration::from_millis(ms), switch, Keycode(code)))
                .collect(),
            due: None,
        }
    }
}

impl KeySource for ScriptSource {
    fn poll(&mut self, timeout: Option<Duration>) -> io::Result<SourcePoll> {
        let Some(&(delay, switch, keycode)) = self.steps.front() else {
            return Ok(SourcePoll::Closed);
        };
        let due = *self.due.get_or_insert_with(|| Instant::now() + delay);
        let remaining = due.saturating_duration_since(Instant::now());

        if let Some(budget) = timeout {
            if budget < remaining {
                thread::sleep(budget);
                return Ok(SourcePoll::Timeout);
            }
        }

        thread::sleep(remaining);
        self.steps.pop_front();
        self.due = None;
        Ok(SourcePoll::Event(KeyEvent::new(
            switch,
            keycode,
            Instant::now(),
        )))
    }
}

/// Sink recording everything that reaches the virtual device
#[derive(Clone, Default)]
struct CaptureSink(Arc<Mutex<Vec<(Switch, u32)>>>);

impl KeySink for CaptureSink {
    fn emit(&mut self, event: KeyEvent) -> io::Result<()> {
        self.0.lock().push((event.switch, event.keycode.code()));
        Ok(())
    }
}

/// Run a script against a layout and return the emitted stream
fn run_scenario<I>(layout: &Layout, script: I) -> Vec<(Switch, u32)>
where
    I: IntoIterator<Item = (u64, Switch, u32)>,
{
    run_scenario_with(layout, Settings::default(), script)
}

fn run_scenario_with<I>(layout: &Layout, settings: Settings, script: I) -> Vec<(Switch, u32)>
where
    I: IntoIterator<Item = (u64, Switch, u32)>,
{
    let sink = CaptureSink::default();
    let captured = sink.0.clone();
    let mut engine = Engine::new(ScriptSource::new(script), sink, layout, settings).unwrap();
    engine.run().unwrap();
    drop(engine);
    let output = captured.lock().clone();
    output
}

// =========================================================================
// Scenario 1: plain emit
// =========================================================================

#[test]
fn e2e_simple_emit() {
    let layout = Layout::new("base").layer("base", [(30, Button::emit(30u32))]);
    let output = run_scenario(&layout, [(0, P, 30), (20, R, 30)]);
    assert_eq!(output, vec![(P, 30), (R, 30)]);
}

#[test]
fn e2e_emit_alternates_over_repeated_taps() {
    let layout = Layout::new("base").layer("base", [(16, Button::emit(30u32))]);
    let output = run_scenario(
        &layout,
        [(0, P, 16), (10, R, 16), (10, P, 16), (10, R, 16)],
    );
    assert_eq!(output, vec![(P, 30), (R, 30), (P, 30), (R, 30)]);
}

// =========================================================================
// Scenarios 2 & 3: tap-next
// =========================================================================

#[test]
fn e2e_tap_next_as_tap() {
    let layout = Layout::new("base").layer(
        "base",
        [(16, Button::tap_next(Button::emit(30u32), Button::emit(48u32)))],
    );
    let output = run_scenario(&layout, [(0, P, 16), (20, R, 16)]);
    assert_eq!(output, vec![(P, 30), (R, 30)]);
}

#[test]
fn e2e_tap_next_as_hold() {
    let layout = Layout::new("base").layer(
        "base",
        [
            (16, Button::tap_next(Button::emit(30u32), Button::emit(48u32))),
            (45, Button::emit(45u32)),
        ],
    );
    // The interposed press decides for hold; its own press must come out
    // after the hold button's press
    let output = run_scenario(
        &layout,
        [(0, P, 16), (20, P, 45), (20, R, 16), (20, R, 45)],
    );
    assert_eq!(output, vec![(P, 48), (P, 45), (R, 48), (R, 45)]);
}

// =========================================================================
// Scenario 4: layer toggle
// =========================================================================

#[test]
fn e2e_layer_toggle() {
    let layout = Layout::new("base")
        .layer(
            "base",
            [(16, Button::emit(30u32)), (57, Button::layer_toggle("fn"))],
        )
        .layer("fn", [(16, Button::emit(44u32))]);

    let output = run_scenario(
        &layout,
        [
            (0, P, 57),
            (10, P, 16),
            (10, R, 16),
            (10, R, 57),
            (10, P, 16),
            (10, R, 16),
        ],
    );
    assert_eq!(output, vec![(P, 44), (R, 44), (P, 30), (R, 30)]);
}

#[test]
fn e2e_transparent_entry_falls_through_to_base() {
    let layout = Layout::new("base")
        .layer(
            "base",
            [(16, Button::emit(30u32)), (57, Button::layer_toggle("fn"))],
        )
        .layer("fn", [(16, Button::Trans), (17, Button::emit(44u32))]);

    let output = run_scenario(
        &layout,
        [(0, P, 57), (10, P, 16), (10, R, 16), (10, R, 57)],
    );
    assert_eq!(output, vec![(P, 30), (R, 30)]);
}

// =========================================================================
// Scenario 5: tap-hold
// =========================================================================

#[test]
fn e2e_tap_hold_timeout_presses_hold_button() {
    let layout = Layout::new("base").layer(
        "base",
        [(
            16,
            Button::tap_hold(150, Button::emit(30u32), Button::emit(48u32)),
        )],
    );
    let output = run_scenario(&layout, [(0, P, 16), (300, R, 16)]);
    assert_eq!(output, vec![(P, 48), (R, 48)]);
}

#[test]
fn e2e_tap_hold_quick_release_taps() {
    let layout = Layout::new("base").layer(
        "base",
        [(
            16,
            Button::tap_hold(150, Button::emit(30u32), Button::emit(48u32)),
        )],
    );
    let output = run_scenario(&layout, [(0, P, 16), (20, R, 16)]);
    assert_eq!(output, vec![(P, 30), (R, 30)]);
}

#[test]
fn e2e_tap_hold_replays_held_events_after_decision() {
    let layout = Layout::new("base").layer(
        "base",
        [
            (
                16,
                Button::tap_hold(150, Button::emit(30u32), Button::emit(42u32)),
            ),
            (45, Button::emit(45u32)),
        ],
    );
    // The interposed key is held back by the sluice until the deadline
    // decides for hold, then replays after the hold press
    let output = run_scenario(
        &layout,
        [(0, P, 16), (30, P, 45), (30, R, 45), (200, R, 16)],
    );
    assert_eq!(output, vec![(P, 42), (P, 45), (R, 45), (R, 42)]);
}

// =========================================================================
// Scenario 6: fall-through policy
// =========================================================================

#[test]
fn e2e_unknown_key_without_fall_through() {
    let layout = Layout::new("base").layer("base", [(16, Button::emit(30u32))]);
    let output = run_scenario(&layout, [(0, P, 99), (10, R, 99)]);
    assert!(output.is_empty());
}

#[test]
fn e2e_unknown_key_with_fall_through() {
    let layout = Layout::new("base")
        .layer("base", [(16, Button::emit(30u32))])
        .with_fall_through(true);
    let output = run_scenario(&layout, [(0, P, 99), (10, R, 99)]);
    assert_eq!(output, vec![(P, 99), (R, 99)]);
}

// =========================================================================
// Multi-tap
// =========================================================================

#[test]
fn e2e_multi_tap_single_tap_times_out_to_first_step() {
    let layout = Layout::new("base").layer(
        "base",
        [
            (
                16,
                Button::multi_tap([(Some(100), Button::emit(30u32))], Button::emit(48u32)),
            ),
            (45, Button::emit(45u32)),
        ],
    );
    // One tap, then silence past the gap: the step button is tapped on
    // timeout. The trailing key keeps the source open across the deadline.
    let output = run_scenario(
        &layout,
        [(0, P, 16), (20, R, 16), (300, P, 45), (10, R, 45)],
    );
    assert_eq!(output, vec![(P, 30), (R, 30), (P, 45), (R, 45)]);
}

#[test]
fn e2e_multi_tap_double_tap_reaches_last_button() {
    let layout = Layout::new("base").layer(
        "base",
        [(
            16,
            Button::multi_tap([(Some(100), Button::emit(30u32))], Button::emit(48u32)),
        )],
    );
    // Second press lands within the gap: the chain is exhausted and the
    // final button rides the key until its release
    let output = run_scenario(
        &layout,
        [(0, P, 16), (20, R, 16), (20, P, 16), (100, R, 16)],
    );
    assert_eq!(output, vec![(P, 48), (R, 48)]);
}

#[test]
fn e2e_multi_tap_uses_default_gap_from_settings() {
    let layout = Layout::new("base").layer(
        "base",
        [
            (
                16,
                Button::multi_tap([(None, Button::emit(30u32))], Button::emit(48u32)),
            ),
            (45, Button::emit(45u32)),
        ],
    );
    let mut settings = Settings::default();
    settings.tap_gap = Duration::from_millis(80);

    let output = run_scenario_with(
        &layout,
        settings,
        [(0, P, 16), (20, R, 16), (250, P, 45), (10, R, 45)],
    );
    assert_eq!(output, vec![(P, 30), (R, 30), (P, 45), (R, 45)]);
}

// =========================================================================
// Around, macros, compose
// =========================================================================

#[test]
fn e2e_around_wraps_inner_button() {
    let layout = Layout::new("base").layer(
        "base",
        [(16, Button::around(Button::emit(42u32), Button::emit(30u32)))],
    );
    let output = run_scenario(&layout, [(0, P, 16), (30, R, 16)]);
    assert_eq!(output, vec![(P, 42), (P, 30), (R, 30), (R, 42)]);
}

#[test]
fn e2e_around_composes_with_tap_next() {
    let layout = Layout::new("base").layer(
        "base",
        [(
            16,
            Button::around(
                Button::emit(42u32),
                Button::tap_next(Button::emit(30u32), Button::emit(48u32)),
            ),
        )],
    );
    // Quick release resolves the nested tap-next as a tap inside the
    // around shell
    let output = run_scenario(&layout, [(0, P, 16), (20, R, 16)]);
    assert_eq!(output, vec![(P, 42), (P, 30), (R, 30), (R, 42)]);
}

#[test]
fn e2e_tap_macro_taps_children_in_order() {
    let layout = Layout::new("base").layer(
        "base",
        [(
            16,
            Button::tap_macro([Button::emit(35u32), Button::emit(18u32), Button::emit(38u32)]),
        )],
    );
    let output = run_scenario(&layout, [(0, P, 16), (30, R, 16)]);
    assert_eq!(
        output,
        vec![(P, 35), (R, 35), (P, 18), (R, 18), (P, 38), (R, 38)]
    );
}

#[test]
fn e2e_compose_seq_leads_with_compose_key() {
    let layout = Layout::new("base").layer(
        "base",
        [(
            16,
            Button::compose_seq([Button::emit(30u32), Button::emit(18u32)]),
        )],
    );
    let mut settings = Settings::default();
    settings.compose_key = Keycode(125);

    let output = run_scenario_with(&layout, settings, [(0, P, 16), (30, R, 16)]);
    assert_eq!(
        output,
        vec![(P, 125), (R, 125), (P, 30), (R, 30), (P, 18), (R, 18)]
    );
}

#[test]
fn e2e_around_next_wraps_the_following_key() {
    let layout = Layout::new("base").layer(
        "base",
        [
            (16, Button::around_next(Button::emit(42u32))),
            (45, Button::emit(45u32)),
        ],
    );
    let output = run_scenario(
        &layout,
        [(0, P, 16), (10, R, 16), (20, P, 45), (20, R, 45)],
    );
    assert_eq!(output, vec![(P, 42), (P, 45), (R, 42), (R, 45)]);
}

// =========================================================================
// Layer switch and blocking
// =========================================================================

#[test]
fn e2e_layer_switch_is_persistent() {
    let layout = Layout::new("base")
        .layer(
            "base",
            [(16, Button::emit(30u32)), (17, Button::layer_switch("alt"))],
        )
        .layer("alt", [(16, Button::emit(44u32))]);

    let output = run_scenario(
        &layout,
        [(0, P, 17), (10, R, 17), (10, P, 16), (10, R, 16)],
    );
    assert_eq!(output, vec![(P, 44), (R, 44)]);
}

#[test]
fn e2e_block_swallows_press_and_release() {
    let layout = Layout::new("base")
        .layer("base", [(16, Button::Block), (45, Button::emit(45u32))])
        .with_fall_through(true);
    let output = run_scenario(
        &layout,
        [(0, P, 16), (10, R, 16), (10, P, 45), (10, R, 45)],
    );
    assert_eq!(output, vec![(P, 45), (R, 45)]);
}
