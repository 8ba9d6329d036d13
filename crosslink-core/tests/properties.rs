//! Property tests over random graphs with sharing and cycles.

use crosslink_core::{decode, dump, restore, Graph, Options, SlotId, Value};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Member {
    Int(i64),
    Text(String),
    Flag(bool),
    Null,
    /// Reference to another node of the blueprint, by position.
    Link(usize),
}

/// One node per entry: whether it is a record (else a sequence), and its members.
type Blueprint = Vec<(bool, Vec<Member>)>;

fn arb_member(nodes: usize) -> impl Strategy<Value = Member> {
    prop_oneof![
        any::<i64>().prop_map(Member::Int),
        "[a-z]{0,6}".prop_map(Member::Text),
        any::<bool>().prop_map(Member::Flag),
        Just(Member::Null),
        (0..nodes).prop_map(Member::Link),
    ]
}

fn arb_blueprint() -> impl Strategy<Value = Blueprint> {
    (1usize..8).prop_flat_map(|nodes| {
        prop::collection::vec(
            (any::<bool>(), prop::collection::vec(arb_member(nodes), 0..5)),
            nodes,
        )
    })
}

fn build(blueprint: &Blueprint) -> (Graph, Value) {
    let mut graph = Graph::new();
    let nodes: Vec<Value> = blueprint
        .iter()
        .map(|(keyed, _)| {
            if *keyed {
                graph.record(std::iter::empty::<(String, Value)>())
            } else {
                graph.sequence(Vec::<Value>::new())
            }
        })
        .collect();

    for ((keyed, members), node) in blueprint.iter().zip(&nodes) {
        for (i, member) in members.iter().enumerate() {
            let value = match member {
                Member::Int(n) => Value::from(*n),
                Member::Text(s) => Value::from(s.as_str()),
                Member::Flag(b) => Value::from(*b),
                Member::Null => Value::Null,
                Member::Link(target) => nodes[*target].clone(),
            };
            if *keyed {
                graph.set_field(node, format!("f{}", i), value);
            } else {
                graph.push(node, value);
            }
        }
    }
    let root = nodes[0].clone();
    (graph, root)
}

proptest! {
    #[test]
    fn prop_round_trip_preserves_shape(blueprint in arb_blueprint()) {
        let (graph, root) = build(&blueprint);
        let text = dump(&graph, &root, &Options::default()).unwrap().unwrap();
        let restored = restore(&text, &Options::default()).unwrap();
        prop_assert!(graph.same_shape(&root, &restored.graph, &restored.root));
    }

    #[test]
    fn prop_redump_is_identical(blueprint in arb_blueprint()) {
        let (graph, root) = build(&blueprint);
        let text = dump(&graph, &root, &Options::default()).unwrap().unwrap();
        let restored = restore(&text, &Options::default()).unwrap();
        let again = dump(&restored.graph, &restored.root, &Options::default()).unwrap().unwrap();
        prop_assert_eq!(text, again);
    }

    #[test]
    fn prop_references_name_existing_slots(blueprint in arb_blueprint()) {
        let (graph, root) = build(&blueprint);
        let text = dump(&graph, &root, &Options::default()).unwrap().unwrap();
        let table = decode(&text).unwrap();

        prop_assert_eq!(table.keys().next(), Some(&SlotId::ROOT));
        for flat in table.values() {
            let members: Vec<&serde_json::Value> = match flat {
                serde_json::Value::Array(items) => items.iter().collect(),
                serde_json::Value::Object(fields) => fields.values().collect(),
                _ => Vec::new(),
            };
            for slot in members.iter().filter_map(|m| m.as_str()).filter_map(SlotId::parse) {
                prop_assert!(table.contains_key(&slot));
            }
        }
    }
}
