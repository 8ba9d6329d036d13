use std::collections::HashMap;
use std::iter;

use crate::containers::Containers;
use crate::error::Result;
use crate::graph::{Heap, NodeId};
use crate::plugin::Plugin;
use crate::value::{Key, Value};

static CONTAINERS: Containers = Containers;

/// The ordered chain of transform stages for one call.
///
/// Caller plug-ins come first, in the order they were added; the built-in
/// table/set stage is always last. A value passes through every stage exactly
/// once, so a caller serializer that returns a table still gets it converted,
/// but no stage ever re-runs on its own output.
pub struct Pipeline<'o> {
    stages: Vec<&'o dyn Plugin>,
}

impl<'o> Pipeline<'o> {
    pub fn new(plugins: &'o [Box<dyn Plugin>]) -> Self {
        let stages = plugins
            .iter()
            .map(|plugin| &**plugin as &dyn Plugin)
            .chain(iter::once(&CONTAINERS as &dyn Plugin))
            .collect();
        Pipeline { stages }
    }

    pub fn stages(&self) -> &[&'o dyn Plugin] {
        &self.stages
    }

    pub fn serialize(&self, key: Key<'_>, mut value: Value, heap: &mut dyn Heap) -> Result<Value> {
        for stage in &self.stages {
            value = stage.serialize(key, value, heap)?;
        }
        Ok(value)
    }

    pub fn deserialize(&self, key: Key<'_>, mut value: Value, heap: &mut dyn Heap) -> Result<Value> {
        for stage in &self.stages {
            value = stage.deserialize(key, value, heap)?;
        }
        Ok(value)
    }
}

/// Per-call memo of transform results, keyed by node identity.
///
/// A composite reached through several paths is transformed once and every
/// path sees the same result. Primitives have no identity and are not cached.
#[derive(Debug, Default)]
pub(crate) struct Memo {
    results: HashMap<NodeId, Value>,
}

impl Memo {
    pub(crate) fn apply(
        &mut self,
        value: Value,
        transform: impl FnOnce(Value) -> Result<Value>,
    ) -> Result<Value> {
        let Value::Ref(id) = value else {
            return transform(value);
        };
        if let Some(result) = self.results.get(&id) {
            return Ok(result.clone());
        }
        let result = transform(value)?;
        self.results.insert(id, result.clone());
        Ok(result)
    }
}
