use std::fmt;

use crate::error::Result;
use crate::graph::{Heap, NodeId};
use crate::pipeline::Pipeline;
use crate::plugin::{DeserializeFn, Handling, Plugin, PostDeserializeFn, SerializeFn};
use crate::rehydrate::Rehydrator;
use crate::value::{Key, Value};

/// Per-call configuration for `dump` and `restore`.
///
/// Plug-ins run in the order they were added, ahead of the built-in
/// table and set conversion.
///
/// ```
/// use crosslink_core::Options;
///
/// let options = Options::new()
///     .serializer(|_key, value, _heap| Ok(value))
///     .debug(true);
/// assert!(options.is_debug());
/// ```
#[derive(Default)]
pub struct Options {
    plugins: Vec<Box<dyn Plugin>>,
    debug: bool,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a plug-in to the chain.
    pub fn plugin(mut self, plugin: impl Plugin + 'static) -> Self {
        self.plugins.push(Box::new(plugin));
        self
    }

    /// Appends a serializer closure to the chain.
    pub fn serializer<F>(self, f: F) -> Self
    where
        F: Fn(Key<'_>, Value, &mut dyn Heap) -> Result<Value> + 'static,
    {
        self.plugin(SerializeFn(f))
    }

    /// Appends a deserializer closure to the chain.
    pub fn deserializer<F>(self, f: F) -> Self
    where
        F: Fn(Key<'_>, Value, &mut dyn Heap) -> Result<Value> + 'static,
    {
        self.plugin(DeserializeFn(f))
    }

    /// Appends a post-deserializer closure to the chain.
    pub fn post_deserializer<F>(self, f: F) -> Self
    where
        F: Fn(NodeId, &mut Rehydrator<'_>) -> Result<Handling> + 'static,
    {
        self.plugin(PostDeserializeFn(f))
    }

    /// When set, the flattener logs the dotted path of every primitive it
    /// writes at `debug` level. The dump text is unaffected.
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    pub(crate) fn pipeline(&self) -> Pipeline<'_> {
        Pipeline::new(&self.plugins)
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("plugins", &self.plugins.len())
            .field("debug", &self.debug)
            .finish()
    }
}
