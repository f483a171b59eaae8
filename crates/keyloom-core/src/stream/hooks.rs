// Keyloom Hooks
// One-shot predicate/action hooks with optional deadlines
//
// The same registry type serves both hook layers of the pipeline: the input
// chain offers events with the engine as context, the emitter worker offers
// outbound events with the sink context. Actions are FnOnce boxes, so a hook
// firing more than once is unrepresentable.

use std::time::Instant;

use crate::event::KeyEvent;

/// Identifier handed back by `Hooks::register`
pub type HookId = u64;

/// What a hook action decides about the event it matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookVerdict {
    /// Consume the event; it never reaches the stages above
    Catch,
    /// Leave the event in the stream for the remaining hooks and the
    /// stages above
    NoCatch,
}

pub type HookPredicate = Box<dyn Fn(&KeyEvent) -> bool + Send>;
pub type HookAction<C> = Box<dyn FnOnce(&mut C, &KeyEvent) -> HookVerdict + Send>;
pub type TimeoutAction<C> = Box<dyn FnOnce(&mut C) + Send>;

/// Deadline half of a timed hook.
pub struct HookTimeout<C> {
    pub deadline: Instant,
    pub action: TimeoutAction<C>,
}

/// A one-shot hook: fires on the first matching event, or on its deadline,
/// whichever comes first. Never both.
pub struct Hook<C> {
    predicate: HookPredicate,
    action: HookAction<C>,
    timeout: Option<HookTimeout<C>>,
}

impl<C> Hook<C> {
    pub fn new(
        predicate: impl Fn(&KeyEvent) -> bool + Send + 'static,
        action: impl FnOnce(&mut C, &KeyEvent) -> HookVerdict + Send + 'static,
    ) -> Self {
        Self {
            predicate: Box::new(predicate),
            action: Box::new(action),
            timeout: None,
        }
    }

    /// Attach an absolute deadline and the action to run if it elapses
    /// before any event matches
    pub fn with_timeout(
        mut self,
        deadline: Instant,
        on_timeout: impl FnOnce(&mut C) + Send + 'static,
    ) -> Self {
        self.timeout = Some(HookTimeout {
            deadline,
            action: Box::new(on_timeout),
        });
        self
    }
}

pub struct HookEntry<C> {
    pub id: HookId,
    pub hook: Hook<C>,
}

/// Registration-ordered hook registry.
///
/// Offering is a two-phase affair driven by the owner: `begin_offer` hands
/// out the current entries, `run_entries` plays the event against them with
/// full access to the context, and `finish_offer` splices the survivors back
/// in front of anything the actions registered meanwhile. The split exists
/// because actions need `&mut` to the very structure that owns the registry.
pub struct Hooks<C> {
    next_id: HookId,
    entries: Vec<HookEntry<C>>,
}

impl<C> Hooks<C> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }

    /// Register a hook, preserving registration order. O(1).
    pub fn register(&mut self, hook: Hook<C>) -> HookId {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push(HookEntry { id, hook });
        id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Earliest deadline among registered timed hooks, if any
    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries
            .iter()
            .filter_map(|e| e.hook.timeout.as_ref().map(|t| t.deadline))
            .min()
    }

    /// Remove and return the timeout action of the expired hook with the
    /// earliest deadline. Ties resolve in registration order. The hook is
    /// gone afterwards; its match action never runs.
    pub fn pop_expired(&mut self, now: Instant) -> Option<TimeoutAction<C>> {
        let idx = self
            .entries
            .iter()
            .enumerate()
            .filter_map(|(i, e)| {
                e.hook
                    .timeout
                    .as_ref()
                    .filter(|t| t.deadline <= now)
                    .map(|t| (t.deadline, e.id, i))
            })
            .min()?
            .2;
        let entry = self.entries.remove(idx);
        entry.hook.timeout.map(|t| t.action)
    }

    /// Take the current entries for an offering round
    pub fn begin_offer(&mut self) -> Vec<HookEntry<C>> {
        std::mem::take(&mut self.entries)
    }

    /// Put the surviving entries back, ahead of any hooks registered while
    /// the round ran (newer registrations observe the next event only)
    pub fn finish_offer(&mut self, survivors: Vec<HookEntry<C>>) {
        self.entries.splice(0..0, survivors);
    }
}

impl<C> Default for Hooks<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Offer one event to a round of entries, in registration order.
///
/// A matching hook runs its action and is dropped. `Catch` stops the round:
/// the event is consumed and the remaining entries are kept *without* being
/// offered the event. Non-matching entries are kept. Returns the survivors
/// (original order) and the overall verdict.
pub fn run_entries<C>(
    entries: Vec<HookEntry<C>>,
    ctx: &mut C,
    event: &KeyEvent,
) -> (Vec<HookEntry<C>>, HookVerdict) {
    let mut survivors = Vec::with_capacity(entries.len());
    let mut verdict = HookVerdict::NoCatch;

    for entry in entries {
        if verdict == HookVerdict::Catch || !(entry.hook.predicate)(event) {
            survivors.push(entry);
            continue;
        }
        verdict = (entry.hook.action)(ctx, event);
    }

    (survivors, verdict)
}
