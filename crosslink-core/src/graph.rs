use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;

use crate::node::{Node, Object, Record, Set, Table};
use crate::value::Value;

/// Opaque handle to a node in a graph arena.
///
/// Node identity is handle identity: two structurally equal nodes with
/// different ids are different objects.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub(crate) fn from_index(index: usize) -> Self {
        NodeId(index as u32)
    }

    /// Position of the node in its arena.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Node storage that transforms read, rewrite and allocate into.
///
/// `Graph` is the owning implementation. `Overlay` layers copy-on-write
/// storage over a borrowed graph so a dump never touches the caller's nodes.
pub trait Heap {
    fn node(&self, id: NodeId) -> Option<&Node>;

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node>;

    /// Allocates a node and returns its handle.
    fn insert(&mut self, node: Node) -> NodeId;
}

/// An arena-allocated object graph.
///
/// Composites are nodes in the arena and reference each other through
/// `Value::Ref`, so sharing and cycles need no special representation.
///
/// ```
/// use crosslink_core::Graph;
///
/// let mut graph = Graph::new();
/// let a = graph.record([("x", 1)]);
/// graph.set_field(&a, "self", a.clone());
/// assert_eq!(graph.field(&a, "self"), Some(&a));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<Node>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a node and returns its handle.
    pub fn insert(&mut self, node: Node) -> NodeId {
        let id = NodeId::from_index(self.nodes.len());
        self.nodes.push(node);
        id
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index())
    }

    /// Replaces a node in place, keeping its identity. Returns the old node.
    pub fn replace(&mut self, id: NodeId, node: Node) -> Option<Node> {
        self.get_mut(id).map(|slot| std::mem::replace(slot, node))
    }

    /// Number of allocated nodes, reachable or not.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the node a value refers to.
    pub fn resolve(&self, value: &Value) -> Option<&Node> {
        value.node().and_then(|id| self.get(id))
    }

    fn resolve_mut(&mut self, value: &Value) -> Option<&mut Node> {
        value.node().and_then(|id| self.get_mut(id))
    }

    /// Allocates a record with the given fields.
    pub fn record<K, V>(&mut self, fields: impl IntoIterator<Item = (K, V)>) -> Value
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Value::Ref(self.insert(Node::Record(fields.into_iter().collect())))
    }

    /// Allocates a sequence with the given elements.
    pub fn sequence<V: Into<Value>>(&mut self, items: impl IntoIterator<Item = V>) -> Value {
        Value::Ref(self.insert(Node::Sequence(items.into_iter().map(Into::into).collect())))
    }

    /// Allocates a key/value table.
    pub fn table<K, V>(&mut self, entries: impl IntoIterator<Item = (K, V)>) -> Value
    where
        K: Into<Value>,
        V: Into<Value>,
    {
        Value::Ref(self.insert(Node::Table(entries.into_iter().collect::<Table>())))
    }

    /// Allocates a set of unique values.
    pub fn set<V: Into<Value>>(&mut self, values: impl IntoIterator<Item = V>) -> Value {
        Value::Ref(self.insert(Node::Set(values.into_iter().collect::<Set>())))
    }

    /// Allocates an instance of `class` with the given fields.
    pub fn object<K, V>(
        &mut self,
        class: impl Into<String>,
        fields: impl IntoIterator<Item = (K, V)>,
    ) -> Value
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let record: Record = fields.into_iter().collect();
        Value::Ref(self.insert(Node::Object(Object::with_record(class, record))))
    }

    /// Returns a field of the record or object `target` refers to.
    pub fn field(&self, target: &Value, name: &str) -> Option<&Value> {
        self.resolve(target)?.record()?.get(name)
    }

    /// Returns an element of the sequence `target` refers to.
    pub fn element(&self, target: &Value, index: usize) -> Option<&Value> {
        match self.resolve(target)? {
            Node::Sequence(items) => items.get(index),
            _ => None,
        }
    }

    /// Sets a field on the record or object `target` refers to.
    /// Returns false if `target` is not keyed.
    pub fn set_field(
        &mut self,
        target: &Value,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> bool {
        match self.resolve_mut(target).and_then(Node::record_mut) {
            Some(record) => {
                record.insert(name, value);
                true
            }
            None => false,
        }
    }

    /// Appends to the sequence `target` refers to.
    pub fn push(&mut self, target: &Value, value: impl Into<Value>) -> bool {
        match self.resolve_mut(target) {
            Some(Node::Sequence(items)) => {
                items.push(value.into());
                true
            }
            _ => false,
        }
    }

    /// Attaches field names that the flattener must skip on this instance.
    pub fn exclude<S: Into<String>>(
        &mut self,
        target: &Value,
        names: impl IntoIterator<Item = S>,
    ) -> bool {
        match self.resolve_mut(target).and_then(Node::record_mut) {
            Some(record) => {
                names.into_iter().for_each(|name| record.exclude(name));
                true
            }
            None => false,
        }
    }

    /// Marks a field read-only for the rehydrator.
    pub fn set_readonly(&mut self, target: &Value, name: impl Into<String>) -> bool {
        match self.resolve_mut(target).and_then(Node::record_mut) {
            Some(record) => {
                record.set_readonly(name);
                true
            }
            None => false,
        }
    }

    /// Freezes a record or object: the rehydrator leaves it untouched.
    pub fn freeze(&mut self, target: &Value) -> bool {
        match self.resolve_mut(target).and_then(Node::record_mut) {
            Some(record) => {
                record.freeze();
                true
            }
            None => false,
        }
    }

    /// Checks that the graph reachable from `root` and the graph reachable
    /// from `other_root` have the same shape, including sharing.
    ///
    /// Nodes are matched one-to-one: two references to the same node on one
    /// side must correspond to two references to the same node on the other.
    /// Record fields compare regardless of order; sequences, tables and sets
    /// compare positionally.
    pub fn same_shape(&self, root: &Value, other: &Graph, other_root: &Value) -> bool {
        let mut forward: HashMap<NodeId, NodeId> = HashMap::new();
        let mut backward: HashMap<NodeId, NodeId> = HashMap::new();
        let mut pending = vec![(root.clone(), other_root.clone())];

        while let Some((left, right)) = pending.pop() {
            let (Value::Ref(a), Value::Ref(b)) = (&left, &right) else {
                if left != right {
                    return false;
                }
                continue;
            };

            match (forward.get(a), backward.get(b)) {
                (Some(mapped_a), Some(mapped_b)) => {
                    if mapped_a != b || mapped_b != a {
                        return false;
                    }
                    continue;
                }
                (None, None) => {
                    forward.insert(*a, *b);
                    backward.insert(*b, *a);
                }
                _ => return false,
            }

            let (Some(x), Some(y)) = (self.get(*a), other.get(*b)) else {
                return false;
            };
            if !pair_children(x, y, &mut pending) {
                return false;
            }
        }
        true
    }
}

/// Queues the children of two nodes for comparison. Returns false if the
/// nodes already differ at this level.
fn pair_children(x: &Node, y: &Node, pending: &mut Vec<(Value, Value)>) -> bool {
    match (x, y) {
        (Node::Sequence(a), Node::Sequence(b)) => {
            if a.len() != b.len() {
                return false;
            }
            pending.extend(a.iter().cloned().zip(b.iter().cloned()));
            true
        }
        (Node::Record(a), Node::Record(b)) => pair_fields(a, b, pending),
        (Node::Object(a), Node::Object(b)) => {
            a.class() == b.class() && pair_fields(a.record(), b.record(), pending)
        }
        (Node::Table(a), Node::Table(b)) => {
            if a.len() != b.len() {
                return false;
            }
            for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
                pending.push((ka.clone(), kb.clone()));
                pending.push((va.clone(), vb.clone()));
            }
            true
        }
        (Node::Set(a), Node::Set(b)) => {
            if a.len() != b.len() {
                return false;
            }
            pending.extend(a.iter().cloned().zip(b.iter().cloned()));
            true
        }
        _ => false,
    }
}

fn pair_fields(a: &Record, b: &Record, pending: &mut Vec<(Value, Value)>) -> bool {
    if a.len() != b.len() {
        return false;
    }
    for (name, value) in a.iter() {
        match b.get(name) {
            Some(other) => pending.push((value.clone(), other.clone())),
            None => return false,
        }
    }
    true
}

impl Heap for Graph {
    fn node(&self, id: NodeId) -> Option<&Node> {
        self.get(id)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.get_mut(id)
    }

    fn insert(&mut self, node: Node) -> NodeId {
        Graph::insert(self, node)
    }
}

/// Copy-on-write view over a borrowed graph.
///
/// Reads fall through to the base graph. The first mutable access to a base
/// node clones it into a shadow copy that keeps the same `NodeId`. New nodes
/// get ids past the end of the base arena.
pub struct Overlay<'g> {
    base: &'g Graph,
    shadow: HashMap<NodeId, Node>,
    extra: Vec<Node>,
}

impl<'g> Overlay<'g> {
    pub fn new(base: &'g Graph) -> Self {
        Overlay {
            base,
            shadow: HashMap::new(),
            extra: Vec::new(),
        }
    }

    /// Number of nodes allocated on top of the base graph.
    pub fn allocated(&self) -> usize {
        self.extra.len()
    }
}

impl Heap for Overlay<'_> {
    fn node(&self, id: NodeId) -> Option<&Node> {
        let index = id.index();
        if index >= self.base.len() {
            return self.extra.get(index - self.base.len());
        }
        self.shadow.get(&id).or_else(|| self.base.get(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let index = id.index();
        if index >= self.base.len() {
            return self.extra.get_mut(index - self.base.len());
        }
        match self.shadow.entry(id) {
            Entry::Occupied(entry) => Some(entry.into_mut()),
            Entry::Vacant(entry) => Some(entry.insert(self.base.get(id)?.clone())),
        }
    }

    fn insert(&mut self, node: Node) -> NodeId {
        self.extra.push(node);
        NodeId::from_index(self.base.len() + self.extra.len() - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_allocate_nodes() {
        let mut graph = Graph::new();
        let inner = graph.sequence([1, 2]);
        let outer = graph.record([("inner", inner.clone())]);

        assert_eq!(graph.len(), 2);
        assert_eq!(graph.field(&outer, "inner"), Some(&inner));
        assert_eq!(graph.element(&inner, 1), Some(&Value::from(2)));
    }

    #[test]
    fn set_field_on_sequence_fails() {
        let mut graph = Graph::new();
        let seq = graph.sequence(Vec::<Value>::new());
        assert!(!graph.set_field(&seq, "x", 1));
        assert!(graph.push(&seq, 1));
    }

    #[test]
    fn same_shape_detects_lost_sharing() {
        let mut left = Graph::new();
        let shared = left.record([("v", 1)]);
        let left_root = left.record([("a", shared.clone()), ("b", shared)]);

        let mut right = Graph::new();
        let one = right.record([("v", 1)]);
        let two = right.record([("v", 1)]);
        let right_root = right.record([("a", one), ("b", two)]);

        assert!(!left.same_shape(&left_root, &right, &right_root));
        assert!(left.same_shape(&left_root, &left, &left_root));
    }

    #[test]
    fn same_shape_handles_cycles() {
        let mut left = Graph::new();
        let a = left.record([("x", 1)]);
        left.set_field(&a, "self", a.clone());

        let mut right = Graph::new();
        let b = right.record([("x", 1)]);
        right.set_field(&b, "self", b.clone());

        assert!(left.same_shape(&a, &right, &b));
    }

    #[test]
    fn same_shape_ignores_field_order() {
        let mut graph = Graph::new();
        let a = graph.record([("x", 1), ("y", 2)]);
        let b = graph.record([("y", 2), ("x", 1)]);
        assert!(graph.same_shape(&a, &graph, &b));
    }

    #[test]
    fn overlay_copies_on_write() {
        let mut graph = Graph::new();
        let root = graph.record([("x", 1)]);
        let id = root.node().unwrap();

        let mut overlay = Overlay::new(&graph);
        if let Some(Node::Record(record)) = overlay.node_mut(id) {
            record.insert("x", 2);
        }
        let extra = overlay.insert(Node::Sequence(vec![]));

        assert_eq!(extra.index(), 1);
        assert_eq!(overlay.allocated(), 1);
        assert_eq!(
            overlay.node(id).and_then(Node::record).and_then(|r| r.get("x")),
            Some(&Value::from(2))
        );
        assert_eq!(graph.field(&root, "x"), Some(&Value::from(1)));
    }
}
