//! Built-in conversion for tables and sets.
//!
//! A table dumps as `{"entries": [[key, value], ...], "__dump__": "table"}`
//! and a set as `{"values": [...], "__dump__": "set"}`. The entry list and
//! every pair are ordinary sequences, so they get their own slots and their
//! members are flattened like any other value.

use crate::error::{Error, Result};
use crate::graph::{Heap, NodeId};
use crate::node::{Node, Record, Set, Table};
use crate::plugin::{Handling, Plugin};
use crate::rehydrate::Rehydrator;
use crate::value::{Key, Value};

/// Field carrying the tag of a converted node: a container kind, or the
/// class name written by a class plug-in.
pub const TAG_FIELD: &str = "__dump__";

/// The container kinds the core converts without help from a plug-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Table,
    Set,
}

impl Kind {
    pub fn tag(self) -> &'static str {
        match self {
            Kind::Table => "table",
            Kind::Set => "set",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "table" => Some(Kind::Table),
            "set" => Some(Kind::Set),
            _ => None,
        }
    }

    /// Field holding the entry list.
    pub fn payload_field(self) -> &'static str {
        match self {
            Kind::Table => "entries",
            Kind::Set => "values",
        }
    }
}

/// The last stage of every pipeline.
pub(crate) struct Containers;

impl Plugin for Containers {
    fn serialize(&self, _key: Key<'_>, value: Value, heap: &mut dyn Heap) -> Result<Value> {
        let Value::Ref(id) = value else {
            return Ok(value);
        };
        let (kind, items) = match heap.node(id).ok_or(Error::UnknownNode(id))? {
            Node::Table(table) => {
                let pairs: Vec<_> = table.iter().map(|(k, v)| vec![k.clone(), v.clone()]).collect();
                let items = pairs
                    .into_iter()
                    .map(|pair| Value::Ref(heap.insert(Node::Sequence(pair))))
                    .collect();
                (Kind::Table, items)
            }
            Node::Set(set) => (Kind::Set, set.iter().cloned().collect()),
            _ => return Ok(value),
        };

        let list = heap.insert(Node::Sequence(items));
        let mut record = Record::new();
        record.insert(kind.payload_field(), Value::Ref(list));
        record.insert(TAG_FIELD, kind.tag());
        log::trace!("converted {} {} to a tagged record", kind.tag(), id);
        Ok(Value::Ref(heap.insert(Node::Record(record))))
    }

    /// Turns a tagged record back into its container. The conversion happens
    /// in place, so every reference to the record now sees the container.
    fn deserialize(&self, _key: Key<'_>, value: Value, heap: &mut dyn Heap) -> Result<Value> {
        let Value::Ref(id) = value else {
            return Ok(value);
        };
        let Some(Node::Record(record)) = heap.node(id) else {
            return Ok(value);
        };
        let Some(kind) = record.get(TAG_FIELD).and_then(Value::as_str).and_then(Kind::from_tag)
        else {
            return Ok(value);
        };
        let list = record.get(kind.payload_field()).cloned().unwrap_or_default();
        let items = sequence_items(heap, &list, kind.payload_field())?;

        let node = match kind {
            Kind::Table => {
                let mut table = Table::new();
                for pair in &items {
                    match sequence_items(heap, pair, "table entry")?.as_slice() {
                        [k, v] => {
                            table.set(k.clone(), v.clone());
                        }
                        other => {
                            return Err(Error::Malformed(format!(
                                "table entry must be a [key, value] pair, found {} elements",
                                other.len()
                            )));
                        }
                    }
                }
                Node::Table(table)
            }
            Kind::Set => Node::Set(items.into_iter().collect::<Set>()),
        };

        *heap.node_mut(id).ok_or(Error::UnknownNode(id))? = node;
        Ok(value)
    }

    /// Rebuilds tables and sets with their members passed through the
    /// pipeline. Table keys are transformed with key `Index(0)`, values with
    /// `Index(1)`; set members with their position.
    fn post_deserialize(&self, node: NodeId, rehydrator: &mut Rehydrator<'_>) -> Result<Handling> {
        match rehydrator.graph().get(node) {
            Some(Node::Table(table)) => {
                let entries: Vec<_> = table.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                let mut rebuilt = Table::new();
                for (k, v) in entries {
                    let k = rehydrator.deserialize(Key::Index(0), k)?;
                    let v = rehydrator.deserialize(Key::Index(1), v)?;
                    rehydrator.visit(&k);
                    rehydrator.visit(&v);
                    rebuilt.set(k, v);
                }
                rehydrator.graph_mut().replace(node, Node::Table(rebuilt));
                Ok(Handling::Claimed)
            }
            Some(Node::Set(set)) => {
                let values: Vec<_> = set.iter().cloned().collect();
                let mut rebuilt = Set::new();
                for (i, v) in values.into_iter().enumerate() {
                    let v = rehydrator.deserialize(Key::Index(i), v)?;
                    rehydrator.visit(&v);
                    rebuilt.insert(v);
                }
                rehydrator.graph_mut().replace(node, Node::Set(rebuilt));
                Ok(Handling::Claimed)
            }
            _ => Ok(Handling::Declined),
        }
    }
}

/// Elements of the sequence `list` refers to.
fn sequence_items(heap: &dyn Heap, list: &Value, what: &str) -> Result<Vec<Value>> {
    let Value::Ref(id) = list else {
        return Err(Error::Malformed(format!("{} must be a sequence", what)));
    };
    match heap.node(*id) {
        Some(Node::Sequence(items)) => Ok(items.clone()),
        Some(other) => Err(Error::Malformed(format!(
            "{} must be a sequence, found a {}",
            what,
            other.kind_name()
        ))),
        None => Err(Error::UnknownNode(*id)),
    }
}
