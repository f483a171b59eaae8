// Keyloom Pull Chain Stages
// Dispatch, hooks, and sluice: the stages between the source and the loop

pub mod dispatch;
pub mod hooks;
pub mod sluice;

pub use dispatch::Dispatch;
pub use hooks::{
    run_entries, Hook, HookAction, HookEntry, HookId, HookPredicate, HookTimeout, HookVerdict,
    Hooks, TimeoutAction,
};
pub use sluice::Sluice;
