//! Class-instance support for crosslink.
//!
//! Instances of registered classes dump as their fields plus the class name
//! under [`TAG_FIELD`] and restore as `Node::Object` again. Instances of
//! classes that were never registered fall through to the core and dump as
//! plain records. The tag field is shared with the built-in table and set
//! conversion, so the names `"table"` and `"set"` cannot be registered.
//!
//! ```
//! use crosslink_classes::Classes;
//! use crosslink_core::{dump, restore, Graph, Node, Options};
//!
//! let options = Options::new().plugin(Classes::new().register("Point"));
//!
//! let mut graph = Graph::new();
//! let root = graph.object("Point", [("x", 1), ("y", 2)]);
//! let text = dump(&graph, &root, &options).unwrap().unwrap();
//! assert_eq!(text, r#"{"@0":{"x":1,"y":2,"__dump__":"Point"}}"#);
//!
//! let restored = restore(&text, &options).unwrap();
//! assert!(matches!(
//!     restored.graph.resolve(&restored.root),
//!     Some(Node::Object(point)) if point.class() == "Point"
//! ));
//! ```

use crosslink_core::{
    Handling, Heap, Key, Kind, Node, NodeId, Object, Plugin, Rehydrator, Result, Value,
};
use indexmap::IndexMap;

pub use crosslink_core::TAG_FIELD;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Plain,
    /// Restored instances are frozen once their fields are rehydrated.
    Frozen,
}

/// Registry of classes whose instances survive a dump.
#[derive(Debug, Default)]
pub struct Classes {
    classes: IndexMap<String, Mode>,
}

impl Classes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(self, class: impl Into<String>) -> Self {
        self.add(class.into(), Mode::Plain)
    }

    /// Registers a class whose restored instances are frozen.
    pub fn register_frozen(self, class: impl Into<String>) -> Self {
        self.add(class.into(), Mode::Frozen)
    }

    fn add(mut self, class: String, mode: Mode) -> Self {
        if Kind::from_tag(&class).is_some() {
            log::warn!("class name {:?} is a built-in container tag, not registered", class);
            return self;
        }
        self.classes.insert(class, mode);
        self
    }

    pub fn contains(&self, class: &str) -> bool {
        self.classes.contains_key(class)
    }

    pub fn is_frozen(&self, class: &str) -> bool {
        self.classes.get(class) == Some(&Mode::Frozen)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl Plugin for Classes {
    fn serialize(&self, _key: Key<'_>, value: Value, heap: &mut dyn Heap) -> Result<Value> {
        let Value::Ref(id) = value else {
            return Ok(value);
        };
        let Some(Node::Object(object)) = heap.node(id) else {
            return Ok(value);
        };
        if !self.contains(object.class()) {
            return Ok(value);
        }

        let class = object.class().to_owned();
        let mut record = object.record().clone();
        record.insert(TAG_FIELD, class.as_str());
        log::trace!("tagged {} instance {}", class, id);
        Ok(Value::Ref(heap.insert(Node::Record(record))))
    }

    /// Turns a tagged record back into an instance, in place.
    fn deserialize(&self, _key: Key<'_>, value: Value, heap: &mut dyn Heap) -> Result<Value> {
        let Value::Ref(id) = value else {
            return Ok(value);
        };
        let Some(node) = heap.node_mut(id) else {
            return Ok(value);
        };
        let Node::Record(record) = &mut *node else {
            return Ok(value);
        };
        let Some(class) = record.get(TAG_FIELD).and_then(Value::as_str) else {
            return Ok(value);
        };
        if !self.contains(class) {
            return Ok(value);
        }

        let class = class.to_owned();
        let mut record = std::mem::take(record);
        record.remove(TAG_FIELD);
        *node = Node::Object(Object::with_record(class, record));
        Ok(value)
    }

    fn post_deserialize(&self, node: NodeId, rehydrator: &mut Rehydrator<'_>) -> Result<Handling> {
        let Some(Node::Object(object)) = rehydrator.graph().get(node) else {
            return Ok(Handling::Declined);
        };
        if !self.is_frozen(object.class()) {
            return Ok(Handling::Declined);
        }

        let fields: Vec<(String, Value)> = object
            .record()
            .iter()
            .filter(|(name, _)| object.record().is_writable(name))
            .map(|(name, value)| (name.to_owned(), value.clone()))
            .collect();
        for (name, value) in fields {
            let value = rehydrator.deserialize(Key::Field(&name), value)?;
            rehydrator.visit(&value);
            if let Some(record) = rehydrator.graph_mut().get_mut(node).and_then(Node::record_mut) {
                record.insert(name, value);
            }
        }
        if let Some(record) = rehydrator.graph_mut().get_mut(node).and_then(Node::record_mut) {
            record.freeze();
        }
        Ok(Handling::Claimed)
    }
}
