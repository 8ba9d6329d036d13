//! Crosslink dumps object graphs with shared references and cycles to flat
//! JSON and restores them.
//!
//! Core concepts:
//! - **Graph**: an arena of composite nodes addressed by `NodeId`; identity is
//!   handle identity
//! - **Value**: a property value, either an inline primitive or a `Ref` to a node
//! - **Slot**: a `@n` identifier naming one composite in a dump; `@0` is the root
//! - **Plugin**: a transform stage with serialize, deserialize and
//!   post-deserialize hooks
//!
//! A dump is a single JSON object mapping slot ids to flat records or
//! sequences. Wherever a composite appears as a property, the dump holds its
//! slot id instead, so each composite is written once no matter how many
//! paths reach it.
//!
//! # Example
//!
//! ```
//! use crosslink_core::{dump, restore, Graph, Options};
//!
//! let mut graph = Graph::new();
//! let child = graph.record([("z", 1)]);
//! let root = graph.record([("a", child.clone()), ("b", child)]);
//! graph.set_field(&root, "self", root.clone());
//!
//! let text = dump(&graph, &root, &Options::default()).unwrap().unwrap();
//! assert_eq!(text, r#"{"@0":{"a":"@1","b":"@1","self":"@0"},"@1":{"z":1}}"#);
//!
//! let restored = restore(&text, &Options::default()).unwrap();
//! let a = restored.graph.field(&restored.root, "a");
//! assert_eq!(a, restored.graph.field(&restored.root, "b"));
//! ```
//!
//! Tables and sets are converted by a built-in stage that always runs after
//! the caller's plug-ins. Other kinds (class instances, dates, domain types)
//! are handled by plug-ins registered on `Options`.

mod codec;
mod containers;
mod error;
mod flatten;
mod graph;
mod node;
mod options;
mod pipeline;
mod plugin;
mod rehydrate;
mod resolve;
mod slot;
mod value;

pub use codec::{decode, encode};
pub use containers::{Kind, TAG_FIELD};
pub use error::{Error, Result, TransformError};
pub use graph::{Graph, Heap, NodeId, Overlay};
pub use node::{Node, Object, Record, Set, Table};
pub use options::Options;
pub use plugin::{Handling, Plugin};
pub use rehydrate::{Rehydrator, Restored};
pub use slot::{DumpTable, SlotId};
pub use value::{Function, Key, Value};

/// Dumps the graph reachable from `root` to JSON text.
///
/// The caller's graph is never modified: transforms run against a
/// copy-on-write overlay. Returns `None` when the root has no dumpable form.
pub fn dump(graph: &Graph, root: &Value, options: &Options) -> Result<Option<String>> {
    let mut overlay = Overlay::new(graph);
    let pipeline = options.pipeline();
    let Some(table) = flatten::flatten(&mut overlay, root, &pipeline, options.is_debug())? else {
        return Ok(None);
    };
    log::trace!(
        "dumped {} slots, {} nodes allocated by transforms",
        table.len(),
        overlay.allocated()
    );
    encode(&table).map(Some)
}

/// Restores a graph from text produced by `dump`.
///
/// Shared slots become shared nodes and self-references become cycles. An
/// empty table restores to a fresh empty record.
pub fn restore(text: &str, options: &Options) -> Result<Restored> {
    let table = decode(text)?;
    if table.is_empty() {
        let mut graph = Graph::new();
        let root = graph.record(std::iter::empty::<(String, Value)>());
        return Ok(Restored { graph, root });
    }

    let resolved = resolve::resolve(table)?;
    let pipeline = options.pipeline();
    rehydrate::rehydrate(resolved, &pipeline)
}
