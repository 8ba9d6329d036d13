use std::collections::{HashMap, VecDeque};

use serde_json::Value as Json;

use crate::error::{Error, Result};
use crate::graph::{Heap, NodeId};
use crate::node::Node;
use crate::pipeline::{Memo, Pipeline};
use crate::slot::{DumpTable, SlotId};
use crate::value::{Key, Value};

/// Flattens the graph reachable from `root` into a dump table.
///
/// Every distinct composite gets exactly one slot, in the order it is first
/// discovered (breadth-first, fields in insertion order). References to a
/// composite that already has a slot reuse it, which is what keeps shared
/// references and cycles intact.
///
/// Returns `None` when the root itself has no dumpable form (null, undefined
/// or a function, before or after the pipeline ran).
pub fn flatten(
    heap: &mut dyn Heap,
    root: &Value,
    pipeline: &Pipeline<'_>,
    debug: bool,
) -> Result<Option<DumpTable>> {
    let mut flattener = Flattener {
        heap,
        pipeline,
        debug,
        memo: Memo::default(),
        identities: HashMap::new(),
        queue: VecDeque::new(),
        last: SlotId::ROOT,
        table: DumpTable::new(),
    };

    let root = flattener.serialize(Key::Root, root.clone())?;
    match root {
        Value::Ref(id) => {
            flattener.identities.insert(id, SlotId::ROOT);
            flattener.queue.push_back((id, SlotId::ROOT, String::new()));
        }
        Value::Null | Value::Undefined | Value::Function(_) => return Ok(None),
        primitive => {
            let json = primitive.to_json().unwrap_or_default();
            flattener.table.insert(SlotId::ROOT, json);
            return Ok(Some(flattener.table));
        }
    }

    while let Some((id, slot, path)) = flattener.queue.pop_front() {
        let flat = flattener.node(id, &path)?;
        flattener.table.insert(slot, flat);
    }
    log::trace!("flattened {} slots", flattener.table.len());
    Ok(Some(flattener.table))
}

struct Flattener<'h, 'p> {
    heap: &'h mut dyn Heap,
    pipeline: &'p Pipeline<'p>,
    debug: bool,
    memo: Memo,
    identities: HashMap<NodeId, SlotId>,
    queue: VecDeque<(NodeId, SlotId, String)>,
    last: SlotId,
    table: DumpTable,
}

impl Flattener<'_, '_> {
    fn serialize(&mut self, key: Key<'_>, value: Value) -> Result<Value> {
        let pipeline = self.pipeline;
        let heap = &mut *self.heap;
        self.memo
            .apply(value, |value| pipeline.serialize(key, value, heap))
    }

    /// Builds the flat form of one node. The node is cloned first, so
    /// transforms that rewrite the heap never affect the iteration.
    fn node(&mut self, id: NodeId, path: &str) -> Result<Json> {
        let node = self.heap.node(id).cloned().ok_or(Error::UnknownNode(id))?;
        match node {
            Node::Sequence(items) => {
                let mut flat = Vec::with_capacity(items.len());
                for (i, item) in items.into_iter().enumerate() {
                    let key = Key::Index(i);
                    let value = self.serialize(key, item)?;
                    let path = self.child_path(path, key);
                    flat.push(self.place(value, path).unwrap_or(Json::Null));
                }
                Ok(Json::Array(flat))
            }
            Node::Record(_) | Node::Object(_) => {
                let Some(record) = node.record() else {
                    return Ok(Json::Object(Default::default()));
                };
                let mut flat = serde_json::Map::with_capacity(record.len());
                for (name, item) in record.iter() {
                    if record.is_excluded(name) {
                        continue;
                    }
                    let key = Key::Field(name);
                    let value = self.serialize(key, item.clone())?;
                    let path = self.child_path(path, key);
                    if let Some(json) = self.place(value, path) {
                        flat.insert(name.to_owned(), json);
                    }
                }
                Ok(Json::Object(flat))
            }
            Node::Table(_) | Node::Set(_) => Err(Error::Malformed(format!(
                "{} {} reached the flattener unconverted",
                node.kind_name(),
                id
            ))),
        }
    }

    /// Flat form of one property: the primitive itself, a slot reference for
    /// composites, or nothing for values that do not survive a dump.
    fn place(&mut self, value: Value, path: String) -> Option<Json> {
        match value {
            Value::Undefined | Value::Function(_) => None,
            Value::Ref(id) => Some(Json::String(self.slot_for(id, path).to_string())),
            primitive => {
                if self.debug {
                    log::debug!(target: "crosslink::flatten", "{}", path);
                }
                primitive.to_json()
            }
        }
    }

    fn slot_for(&mut self, id: NodeId, path: String) -> SlotId {
        if let Some(slot) = self.identities.get(&id) {
            return *slot;
        }
        self.last = self.last.next();
        let slot = self.last;
        log::trace!("minted {} for {}", slot, id);
        self.identities.insert(id, slot);
        self.queue.push_back((id, slot, path));
        slot
    }

    fn child_path(&self, parent: &str, key: Key<'_>) -> String {
        if !self.debug {
            return String::new();
        }
        if parent.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", parent, key)
        }
    }
}
