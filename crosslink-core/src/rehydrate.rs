use std::collections::{HashSet, VecDeque};

use crate::error::{Error, Result};
use crate::graph::{Graph, NodeId};
use crate::node::Node;
use crate::pipeline::{Memo, Pipeline};
use crate::plugin::Handling;
use crate::resolve::Resolved;
use crate::value::{Key, Value};

/// A reconstructed graph and its root.
#[derive(Debug, Clone)]
pub struct Restored {
    pub graph: Graph,
    pub root: Value,
}

/// Walks a resolved graph breadth-first, running the deserialize side of the
/// pipeline on every property exactly once per node.
///
/// Post-deserializers receive the rehydrator itself: through it they read and
/// rewrite the graph, run values through the (memoized) deserializer chain and
/// schedule the nodes they produce for a visit.
pub struct Rehydrator<'p> {
    graph: Graph,
    pipeline: &'p Pipeline<'p>,
    memo: Memo,
    visited: HashSet<NodeId>,
    queue: VecDeque<NodeId>,
}

impl<'p> Rehydrator<'p> {
    fn new(graph: Graph, pipeline: &'p Pipeline<'p>) -> Self {
        Rehydrator {
            graph,
            pipeline,
            memo: Memo::default(),
            visited: HashSet::new(),
            queue: VecDeque::new(),
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    /// Runs a value through the deserializer chain. Composites are
    /// transformed once; later calls with the same node return the first
    /// result.
    pub fn deserialize(&mut self, key: Key<'_>, value: Value) -> Result<Value> {
        let pipeline = self.pipeline;
        let graph = &mut self.graph;
        self.memo
            .apply(value, |value| pipeline.deserialize(key, value, graph))
    }

    /// Schedules the node `value` refers to, unless it was already visited.
    /// Returns true if the node was newly scheduled.
    pub fn visit(&mut self, value: &Value) -> bool {
        let Value::Ref(id) = value else {
            return false;
        };
        if !self.visited.insert(*id) {
            return false;
        }
        self.queue.push_back(*id);
        true
    }

    pub fn is_visited(&self, id: NodeId) -> bool {
        self.visited.contains(&id)
    }

    fn drain(&mut self) -> Result<()> {
        while let Some(id) = self.queue.pop_front() {
            let node = self.graph.get(id).ok_or(Error::UnknownNode(id))?;
            if node.is_frozen() {
                log::trace!("skipping frozen {} {}", node.kind_name(), id);
                continue;
            }
            log::trace!("rehydrating {} {}", node.kind_name(), id);

            let pipeline = self.pipeline;
            let mut claimed = false;
            for stage in pipeline.stages() {
                if stage.post_deserialize(id, self)? == Handling::Claimed {
                    claimed = true;
                    break;
                }
            }
            if !claimed {
                self.walk(id)?;
            }
        }
        Ok(())
    }

    /// Generic per-property pass for sequences, records and objects.
    fn walk(&mut self, id: NodeId) -> Result<()> {
        let node = self.graph.get(id).cloned().ok_or(Error::UnknownNode(id))?;
        match node {
            Node::Sequence(items) => {
                for (i, item) in items.into_iter().enumerate() {
                    let value = self.deserialize(Key::Index(i), item.clone())?;
                    self.visit(&value);
                    if value == item {
                        continue;
                    }
                    if let Some(Node::Sequence(items)) = self.graph.get_mut(id) {
                        if let Some(slot) = items.get_mut(i) {
                            *slot = value;
                        }
                    }
                }
            }
            Node::Record(_) | Node::Object(_) => {
                let Some(record) = node.record() else {
                    return Ok(());
                };
                for (name, item) in record.iter() {
                    if !record.is_writable(name) {
                        continue;
                    }
                    let value = self.deserialize(Key::Field(name), item.clone())?;
                    self.visit(&value);
                    if value == *item {
                        continue;
                    }
                    if let Some(target) = self.graph.get_mut(id).and_then(Node::record_mut) {
                        target.insert(name, value);
                    }
                }
            }
            // Claimed by the built-in container stage.
            Node::Table(_) | Node::Set(_) => {}
        }
        Ok(())
    }
}

/// Reconstructs live values from a resolved graph.
///
/// The root itself goes through the deserializer with `Key::Root`, then every
/// node reachable from it is processed once.
pub fn rehydrate(resolved: Resolved, pipeline: &Pipeline<'_>) -> Result<Restored> {
    let Resolved { graph, root } = resolved;
    let mut rehydrator = Rehydrator::new(graph, pipeline);

    let root = rehydrator.deserialize(Key::Root, root)?;
    rehydrator.visit(&root);
    rehydrator.drain()?;

    Ok(Restored {
        graph: rehydrator.graph,
        root,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Heap;
    use crate::plugin::Plugin;

    fn resolved(graph: Graph, root: Value) -> Resolved {
        Resolved { graph, root }
    }

    struct Upper;

    impl Plugin for Upper {
        fn deserialize(&self, _key: Key<'_>, value: Value, _heap: &mut dyn Heap) -> Result<Value> {
            match value {
                Value::String(s) => Ok(Value::String(s.to_uppercase())),
                other => Ok(other),
            }
        }
    }

    #[test]
    fn visits_every_node_once() {
        let mut graph = Graph::new();
        let shared = graph.record([("s", "a")]);
        let root = graph.record([("x", shared.clone()), ("y", shared.clone())]);
        graph.set_field(&shared, "back", root.clone());

        let plugins: Vec<Box<dyn Plugin>> = vec![Box::new(Upper)];
        let pipeline = Pipeline::new(&plugins);
        let restored = rehydrate(resolved(graph, root.clone()), &pipeline).unwrap();

        assert_eq!(restored.root, root);
        assert_eq!(restored.graph.field(&shared, "s"), Some(&Value::from("A")));
        assert_eq!(restored.graph.field(&shared, "back"), Some(&root));
    }

    #[test]
    fn readonly_fields_untouched() {
        let mut graph = Graph::new();
        let root = graph.record([("a", "x"), ("b", "y")]);
        graph.set_readonly(&root, "a");

        let plugins: Vec<Box<dyn Plugin>> = vec![Box::new(Upper)];
        let pipeline = Pipeline::new(&plugins);
        let restored = rehydrate(resolved(graph, root.clone()), &pipeline).unwrap();

        assert_eq!(restored.graph.field(&root, "a"), Some(&Value::from("x")));
        assert_eq!(restored.graph.field(&root, "b"), Some(&Value::from("Y")));
    }

    #[test]
    fn frozen_nodes_skipped() {
        let mut graph = Graph::new();
        let inner = graph.record([("a", "x")]);
        graph.freeze(&inner);
        let root = graph.sequence([Value::from("y"), inner.clone()]);

        let plugins: Vec<Box<dyn Plugin>> = vec![Box::new(Upper)];
        let pipeline = Pipeline::new(&plugins);
        let restored = rehydrate(resolved(graph, root.clone()), &pipeline).unwrap();

        assert_eq!(restored.graph.element(&root, 0), Some(&Value::from("Y")));
        assert_eq!(restored.graph.field(&inner, "a"), Some(&Value::from("x")));
    }
}
