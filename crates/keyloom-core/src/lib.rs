// Keyloom Core Library
// Pull-chain event engine for layered keyboard remapping

pub mod button;
pub mod event;
pub mod io;
pub mod key;
pub mod keymap;
pub mod output;
pub mod runtime;
pub mod settings;
pub mod stream;

pub use button::{Button, MultiTapStep};
pub use event::{KeyEvent, Switch};
pub use io::{KeySink, KeySource, SourcePoll};
pub use key::Keycode;
pub use keymap::{
    BEnv, ConfigError, Keymap, KeymapError, LastAction, Layer, LayerOp, LayerTag, Layout,
};
pub use output::SinkCtx;
pub use runtime::{Engine, EngineError, Kenv};
pub use settings::{Settings, SettingsError};
pub use stream::{Dispatch, Hook, HookId, HookVerdict, Hooks, Sluice};
