// Keyloom Keymap
// Layer table, active-layer stack, and keycode resolution

pub mod benv;

pub use benv::{BEnv, LastAction, ReleaseThunk};

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::button::Button;
use crate::key::Keycode;

/// Interned layer name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LayerTag(Arc<str>);

impl LayerTag {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for LayerTag {
    fn from(name: &str) -> Self {
        LayerTag(name.into())
    }
}

impl From<String> for LayerTag {
    fn from(name: String) -> Self {
        LayerTag(name.into())
    }
}

impl fmt::Display for LayerTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Layer-stack mutations available to button actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerOp {
    PushLayer(LayerTag),
    PopLayer(LayerTag),
    SetBase(LayerTag),
}

/// The resolved button map handed to the engine by the loader: every alias
/// already flattened, every tree complete.
#[derive(Debug, Clone)]
pub struct Layout {
    pub layers: HashMap<LayerTag, HashMap<Keycode, Button>>,
    pub base: LayerTag,
    pub fall_through: bool,
}

impl Layout {
    pub fn new(base: impl Into<LayerTag>) -> Self {
        Self {
            layers: HashMap::new(),
            base: base.into(),
            fall_through: false,
        }
    }

    pub fn with_fall_through(mut self, fall_through: bool) -> Self {
        self.fall_through = fall_through;
        self
    }

    /// Add a layer from `(keycode, button)` pairs
    pub fn layer<I>(mut self, tag: impl Into<LayerTag>, entries: I) -> Self
    where
        I: IntoIterator<Item = (u32, Button)>,
    {
        let bindings = entries
            .into_iter()
            .map(|(code, button)| (Keycode(code), button))
            .collect();
        self.layers.insert(tag.into(), bindings);
        self
    }
}

/// Errors detected while building a keymap from a layout. All fatal.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("base layer '{0}' is not defined in the layout")]
    UnknownBaseLayer(LayerTag),

    #[error("layer '{referenced}' referenced from layer '{from}' is not defined")]
    DanglingLayerRef { from: LayerTag, referenced: LayerTag },
}

/// Errors from runtime layer operations. Reported and ignored by the
/// engine; the stack is left untouched.
#[derive(Debug, thiserror::Error)]
pub enum KeymapError {
    #[error("unknown layer '{0}'")]
    UnknownLayer(LayerTag),

    #[error("layer '{0}' is not on the stack")]
    LayerNotActive(LayerTag),
}

/// One named layer with its per-entry button environments.
pub struct Layer {
    tag: LayerTag,
    bindings: HashMap<Keycode, Arc<BEnv>>,
}

impl fmt::Debug for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layer")
            .field("tag", &self.tag)
            .field("bindings", &self.bindings)
            .finish()
    }
}

impl Layer {
    pub fn tag(&self) -> &LayerTag {
        &self.tag
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn contains(&self, keycode: Keycode) -> bool {
        self.bindings.contains_key(&keycode)
    }
}

/// The layer table plus the active-layer stack.
///
/// The stack is stored base-first: index 0 is always the base layer and the
/// top of the stack is the last element. Resolution walks top to base,
/// skipping transparent entries.
pub struct Keymap {
    layers: HashMap<LayerTag, Layer>,
    stack: Vec<LayerTag>,
}

impl fmt::Debug for Keymap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keymap")
            .field("layers", &self.layers)
            .field("stack", &self.stack)
            .finish()
    }
}

impl Keymap {
    /// Build the keymap: one `BEnv` per layout entry, created up front and
    /// alive for the process. Rejects layouts whose base or referenced
    /// layers do not exist.
    pub fn from_layout(layout: &Layout) -> Result<Self, ConfigError> {
        if !layout.layers.contains_key(&layout.base) {
            return Err(ConfigError::UnknownBaseLayer(layout.base.clone()));
        }

        for (tag, bindings) in &layout.layers {
            let mut refs = Vec::new();
            for button in bindings.values() {
                button.layer_refs(&mut refs);
            }
            if let Some(missing) = refs.iter().find(|r| !layout.layers.contains_key(r)) {
                return Err(ConfigError::DanglingLayerRef {
                    from: tag.clone(),
                    referenced: missing.clone(),
                });
            }
        }

        let layers = layout
            .layers
            .iter()
            .map(|(tag, bindings)| {
                let bindings = bindings
                    .iter()
                    .map(|(&keycode, button)| {
                        let binding = Arc::new(button.clone());
                        (keycode, Arc::new(BEnv::new(keycode, binding)))
                    })
                    .collect();
                (
                    tag.clone(),
                    Layer {
                        tag: tag.clone(),
                        bindings,
                    },
                )
            })
            .collect();

        Ok(Self {
            layers,
            stack: vec![layout.base.clone()],
        })
    }

    /// Resolve a keycode against the active stack, top to base, skipping
    /// transparent entries. Deterministic in `(stack, layers)`.
    pub fn lookup(&self, keycode: Keycode) -> Option<Arc<BEnv>> {
        for tag in self.stack.iter().rev() {
            let layer = &self.layers[tag];
            if let Some(benv) = layer.bindings.get(&keycode) {
                if benv.binding().is_transparent() {
                    continue;
                }
                return Some(benv.clone());
            }
        }
        None
    }

    pub fn push_layer(&mut self, tag: &LayerTag) -> Result<(), KeymapError> {
        if !self.layers.contains_key(tag) {
            return Err(KeymapError::UnknownLayer(tag.clone()));
        }
        self.stack.push(tag.clone());
        log::debug!("layer pushed: {} (depth {})", tag, self.stack.len());
        Ok(())
    }

    /// Remove the topmost occurrence of `tag`. The base slot never pops, so
    /// a toggle bound on the base layer cannot strand the stack empty.
    pub fn pop_layer(&mut self, tag: &LayerTag) -> Result<(), KeymapError> {
        if !self.layers.contains_key(tag) {
            return Err(KeymapError::UnknownLayer(tag.clone()));
        }
        let idx = (1..self.stack.len())
            .rev()
            .find(|&i| self.stack[i] == *tag)
            .ok_or_else(|| KeymapError::LayerNotActive(tag.clone()))?;
        self.stack.remove(idx);
        log::debug!("layer popped: {} (depth {})", tag, self.stack.len());
        Ok(())
    }

    /// Replace the base layer. Re-applying the current base is not an
    /// error.
    pub fn set_base(&mut self, tag: &LayerTag) -> Result<(), KeymapError> {
        if !self.layers.contains_key(tag) {
            return Err(KeymapError::UnknownLayer(tag.clone()));
        }
        log::debug!("base layer set: {}", tag);
        self.stack[0] = tag.clone();
        Ok(())
    }

    /// Dispatch a layer operation
    pub fn apply(&mut self, op: &LayerOp) -> Result<(), KeymapError> {
        match op {
            LayerOp::PushLayer(tag) => self.push_layer(tag),
            LayerOp::PopLayer(tag) => self.pop_layer(tag),
            LayerOp::SetBase(tag) => self.set_base(tag),
        }
    }

    /// Run `f` against a layer, for diagnostics and introspection
    pub fn about_layer<R>(
        &self,
        tag: &LayerTag,
        f: impl FnOnce(&Layer) -> R,
    ) -> Result<R, KeymapError> {
        self.layers
            .get(tag)
            .map(f)
            .ok_or_else(|| KeymapError::UnknownLayer(tag.clone()))
    }

    /// Active stack, base first
    pub fn stack(&self) -> &[LayerTag] {
        &self.stack
    }

    pub fn base(&self) -> &LayerTag {
        &self.stack[0]
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }
}
