use std::collections::HashMap;

use serde_json::Value as Json;

use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::node::{Node, Record};
use crate::slot::{is_reference_shaped, DumpTable, SlotId};
use crate::value::Value;

/// A dump table turned back into linked nodes, before any transform ran.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub graph: Graph,
    pub root: Value,
}

/// Links the records of a dump table to each other.
///
/// Every composite slot gets its node allocated up front, so a reference can
/// be linked regardless of where its target sits in the table. Every
/// reference-shaped string in every record is then replaced by a reference to
/// that node: a slot named from several places becomes one shared node, and a
/// slot naming itself becomes a cycle.
///
/// Records may also contain inline arrays or objects; these are allocated as
/// fresh nodes and linked the same way.
pub fn resolve(table: DumpTable) -> Result<Resolved> {
    let mut graph = Graph::new();
    let mut slots: HashMap<SlotId, Value> = HashMap::with_capacity(table.len());

    for (slot, flat) in &table {
        let value = match flat {
            Json::Array(_) => Value::Ref(graph.insert(Node::Sequence(Vec::new()))),
            Json::Object(_) => Value::Ref(graph.insert(Node::Record(Record::new()))),
            scalar => Value::from_json_scalar(scalar.clone()).unwrap_or_default(),
        };
        slots.insert(*slot, value);
    }

    let root = slots
        .get(&SlotId::ROOT)
        .cloned()
        .ok_or_else(|| Error::Malformed("missing root slot @0".into()))?;

    let mut linker = Linker {
        graph: &mut graph,
        slots: &slots,
    };
    for (slot, flat) in table {
        let Some(Value::Ref(id)) = slots.get(&slot) else {
            continue;
        };
        let node = linker.node(flat)?;
        linker.graph.replace(*id, node);
    }
    log::trace!("resolved {} slots into {} nodes", slots.len(), graph.len());

    Ok(Resolved { graph, root })
}

struct Linker<'a> {
    graph: &'a mut Graph,
    slots: &'a HashMap<SlotId, Value>,
}

impl Linker<'_> {
    fn node(&mut self, flat: Json) -> Result<Node> {
        match flat {
            Json::Array(items) => {
                let items = items
                    .into_iter()
                    .map(|item| self.value(item))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Node::Sequence(items))
            }
            Json::Object(fields) => {
                let mut record = Record::new();
                for (name, item) in fields {
                    let value = self.value(item)?;
                    record.insert(name, value);
                }
                Ok(Node::Record(record))
            }
            scalar => Err(Error::Malformed(format!(
                "expected an array or object, found {}",
                scalar
            ))),
        }
    }

    fn value(&mut self, json: Json) -> Result<Value> {
        match json {
            Json::String(s) if is_reference_shaped(&s) => match SlotId::parse(&s) {
                Some(slot) => self
                    .slots
                    .get(&slot)
                    .cloned()
                    .ok_or(Error::DanglingReference(slot)),
                None => Err(Error::Malformed(format!(
                    "reference {:?} does not name a slot",
                    s
                ))),
            },
            Json::String(s) => Ok(Value::String(s)),
            Json::Array(_) | Json::Object(_) => {
                let node = self.node(json)?;
                Ok(Value::Ref(self.graph.insert(node)))
            }
            scalar => Ok(Value::from_json_scalar(scalar).unwrap_or_default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode;

    #[test]
    fn shared_slot_becomes_shared_node() {
        let table = decode(r#"{"@0":{"a":"@1","b":"@1"},"@1":{"v":1}}"#).unwrap();
        let Resolved { graph, root } = resolve(table).unwrap();

        let a = graph.field(&root, "a").unwrap();
        let b = graph.field(&root, "b").unwrap();
        assert_eq!(a, b);
        assert_eq!(graph.field(a, "v"), Some(&Value::from(1)));
    }

    #[test]
    fn self_reference_becomes_cycle() {
        let table = decode(r#"{"@0":{"x":1,"self":"@0"}}"#).unwrap();
        let Resolved { graph, root } = resolve(table).unwrap();
        assert_eq!(graph.field(&root, "self"), Some(&root));
    }

    #[test]
    fn order_of_slots_does_not_matter() {
        let table = decode(r#"{"@1":[1,"@0"],"@0":["@1"]}"#).unwrap();
        let Resolved { graph, root } = resolve(table).unwrap();
        let inner = graph.element(&root, 0).unwrap();
        assert_eq!(graph.element(inner, 1), Some(&root));
    }

    #[test]
    fn dangling_reference_fails() {
        let table = decode(r#"{"@0":{"a":"@7"}}"#).unwrap();
        let err = resolve(table).unwrap_err();
        assert!(matches!(err, Error::DanglingReference(slot) if slot == SlotId::new(7)));
        assert!(err.is_malformed_input());
    }

    #[test]
    fn non_canonical_references_fail() {
        for text in [
            r#"{"@0":{"a":"@01"},"@1":{"z":1}}"#,
            r#"{"@0":["@00"]}"#,
            r#"{"@0":{"a":"@4294967296"}}"#,
        ] {
            let table = decode(text).unwrap();
            let err = resolve(table).unwrap_err();
            assert!(matches!(err, Error::Malformed(_)), "{}: {:?}", text, err);
            assert!(err.is_malformed_input());
        }
    }

    #[test]
    fn missing_root_fails() {
        let table = decode(r#"{"@1":{}}"#).unwrap();
        assert!(matches!(resolve(table), Err(Error::Malformed(_))));
    }

    #[test]
    fn plain_strings_kept() {
        let table = decode(r#"{"@0":["@", "a@1", "@x", "text"]}"#).unwrap();
        let Resolved { graph, root } = resolve(table).unwrap();
        assert_eq!(graph.element(&root, 1), Some(&Value::from("a@1")));
        assert_eq!(graph.element(&root, 3), Some(&Value::from("text")));
    }

    #[test]
    fn inline_containers_linked() {
        let table = decode(r#"{"@0":{"nested":{"back":"@0"}}}"#).unwrap();
        let Resolved { graph, root } = resolve(table).unwrap();
        let nested = graph.field(&root, "nested").unwrap();
        assert_eq!(graph.field(nested, "back"), Some(&root));
    }

    #[test]
    fn primitive_root() {
        let table = decode(r#"{"@0":"hello"}"#).unwrap();
        let Resolved { graph, root } = resolve(table).unwrap();
        assert_eq!(root, Value::from("hello"));
        assert!(graph.is_empty());
    }
}
