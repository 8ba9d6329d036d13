use crate::error::Result;
use crate::graph::{Heap, NodeId};
use crate::rehydrate::Rehydrator;
use crate::value::{Key, Value};

/// Answer of a post-deserializer offered a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handling {
    /// The hook rebuilt the node itself; no further processing happens.
    Claimed,
    /// The node is passed on to the next stage, and finally to the generic walk.
    Declined,
}

/// A stage of the transform pipeline.
///
/// All three hooks default to doing nothing, so a plug-in only implements the
/// ones it needs:
///
/// - `serialize` sees every `(key, value)` pair before the flattener decides
///   whether the value is primitive or composite. It may allocate new nodes
///   (for example a tagged record standing in for a domain object).
/// - `deserialize` sees every `(key, value)` pair of the restored graph and may
///   turn plain shapes back into domain objects.
/// - `post_deserialize` is offered each node before the generic per-field walk
///   and may rebuild the node's entries itself.
///
/// Hooks take `&self`; plug-ins that keep state use interior mutability.
pub trait Plugin {
    fn serialize(&self, key: Key<'_>, value: Value, heap: &mut dyn Heap) -> Result<Value> {
        let _ = (key, heap);
        Ok(value)
    }

    fn deserialize(&self, key: Key<'_>, value: Value, heap: &mut dyn Heap) -> Result<Value> {
        let _ = (key, heap);
        Ok(value)
    }

    fn post_deserialize(&self, node: NodeId, rehydrator: &mut Rehydrator<'_>) -> Result<Handling> {
        let _ = (node, rehydrator);
        Ok(Handling::Declined)
    }
}

/// Plug-in built from a serializer closure.
pub(crate) struct SerializeFn<F>(pub F);

impl<F> Plugin for SerializeFn<F>
where
    F: Fn(Key<'_>, Value, &mut dyn Heap) -> Result<Value>,
{
    fn serialize(&self, key: Key<'_>, value: Value, heap: &mut dyn Heap) -> Result<Value> {
        (self.0)(key, value, heap)
    }
}

/// Plug-in built from a deserializer closure.
pub(crate) struct DeserializeFn<F>(pub F);

impl<F> Plugin for DeserializeFn<F>
where
    F: Fn(Key<'_>, Value, &mut dyn Heap) -> Result<Value>,
{
    fn deserialize(&self, key: Key<'_>, value: Value, heap: &mut dyn Heap) -> Result<Value> {
        (self.0)(key, value, heap)
    }
}

/// Plug-in built from a post-deserializer closure.
pub(crate) struct PostDeserializeFn<F>(pub F);

impl<F> Plugin for PostDeserializeFn<F>
where
    F: Fn(NodeId, &mut Rehydrator<'_>) -> Result<Handling>,
{
    fn post_deserialize(&self, node: NodeId, rehydrator: &mut Rehydrator<'_>) -> Result<Handling> {
        (self.0)(node, rehydrator)
    }
}
