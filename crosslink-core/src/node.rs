use indexmap::{IndexMap, IndexSet};

use crate::value::Value;

/// A composite value stored in the graph arena.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Ordered sequence.
    Sequence(Vec<Value>),
    /// String-keyed structural record.
    Record(Record),
    /// Key/value table with arbitrary keys.
    Table(Table),
    /// Collection of unique values.
    Set(Set),
    /// Instance of a named class.
    Object(Object),
}

impl Node {
    /// Human-readable name of the node's kind, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Node::Sequence(_) => "sequence",
            Node::Record(_) => "record",
            Node::Table(_) => "table",
            Node::Set(_) => "set",
            Node::Object(_) => "object",
        }
    }

    /// Returns the keyed fields of a record or object.
    pub fn record(&self) -> Option<&Record> {
        match self {
            Node::Record(record) => Some(record),
            Node::Object(object) => Some(&object.record),
            _ => None,
        }
    }

    pub fn record_mut(&mut self) -> Option<&mut Record> {
        match self {
            Node::Record(record) => Some(record),
            Node::Object(object) => Some(&mut object.record),
            _ => None,
        }
    }

    /// Frozen nodes are left alone by the rehydrator.
    pub fn is_frozen(&self) -> bool {
        self.record().is_some_and(Record::is_frozen)
    }
}

/// A string-keyed record with insertion-ordered fields.
///
/// Besides its fields a record carries per-instance attributes:
/// - an exclusion list of field names the flattener never dumps,
/// - a set of read-only fields the rehydrator never rewrites,
/// - a frozen flag that makes every field read-only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: IndexMap<String, Value>,
    excluded: IndexSet<String>,
    readonly: IndexSet<String>,
    frozen: bool,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a field. A replaced field keeps its position.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.fields.get_mut(name)
    }

    /// Removes a field, preserving the order of the others.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.shift_remove(name)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Marks a field as never dumped. Names are not checked against the
    /// record's fields.
    pub fn exclude(&mut self, name: impl Into<String>) {
        self.excluded.insert(name.into());
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        self.excluded.contains(name)
    }

    pub fn set_readonly(&mut self, name: impl Into<String>) {
        self.readonly.insert(name.into());
    }

    /// Returns false for read-only fields and for every field of a frozen record.
    pub fn is_writable(&self, name: &str) -> bool {
        !self.frozen && !self.readonly.contains(name)
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

/// Insertion-ordered key/value table.
///
/// Keys compare with `Value` equality: primitives by value, composites by
/// node identity. Lookups hash the key, so building a table is linear in its
/// size.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    entries: IndexMap<Value, Value>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the value for a key, replacing an existing entry in place.
    pub fn set(&mut self, key: impl Into<Value>, value: impl Into<Value>) -> Option<Value> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<K: Into<Value>, V: Into<Value>> FromIterator<(K, V)> for Table {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut table = Table::new();
        for (k, v) in iter {
            table.set(k, v);
        }
        table
    }
}

impl IntoIterator for Table {
    type Item = (Value, Value);
    type IntoIter = indexmap::map::IntoIter<Value, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Insertion-ordered collection of unique values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Set {
    values: IndexSet<Value>,
}

impl Set {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a value. Returns false if it was already present.
    pub fn insert(&mut self, value: impl Into<Value>) -> bool {
        self.values.insert(value.into())
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.values.contains(value)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.values.iter()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

impl<V: Into<Value>> FromIterator<V> for Set {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        let mut set = Set::new();
        for v in iter {
            set.insert(v);
        }
        set
    }
}

impl IntoIterator for Set {
    type Item = Value;
    type IntoIter = indexmap::set::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

/// An instance of a named class: a record plus the name of its class.
///
/// Without a plug-in that knows the class, an object dumps like a plain
/// record and the class name is lost.
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    class: String,
    record: Record,
}

impl Object {
    pub fn new(class: impl Into<String>) -> Self {
        Object {
            class: class.into(),
            record: Record::new(),
        }
    }

    pub fn with_record(class: impl Into<String>, record: Record) -> Self {
        Object {
            class: class.into(),
            record,
        }
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn record_mut(&mut self) -> &mut Record {
        &mut self.record
    }

    pub fn into_parts(self) -> (String, Record) {
        (self.class, self.record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_replace_keeps_position() {
        let mut record: Record = [("a", 1), ("b", 2), ("c", 3)].into_iter().collect();
        record.insert("a", 10);
        let keys: Vec<_> = record.keys().collect();
        assert_eq!(keys, ["a", "b", "c"]);
        assert_eq!(record.get("a"), Some(&Value::from(10)));
    }

    #[test]
    fn record_remove_keeps_order() {
        let mut record: Record = [("a", 1), ("b", 2), ("c", 3)].into_iter().collect();
        record.remove("b");
        let keys: Vec<_> = record.keys().collect();
        assert_eq!(keys, ["a", "c"]);
    }

    #[test]
    fn record_writability() {
        let mut record: Record = [("a", 1), ("b", 2)].into_iter().collect();
        record.set_readonly("a");
        assert!(!record.is_writable("a"));
        assert!(record.is_writable("b"));

        record.freeze();
        assert!(!record.is_writable("b"));
        assert!(Node::Record(record).is_frozen());
    }

    #[test]
    fn table_keys_unique() {
        let mut table = Table::new();
        assert_eq!(table.set("k", 1), None);
        assert_eq!(table.set("k", 2), Some(Value::from(1)));
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(&Value::from("k")), Some(&Value::from(2)));
    }

    #[test]
    fn set_values_unique() {
        let set: Set = [1, 2, 2, 3, 1].into_iter().collect();
        let values: Vec<_> = set.iter().cloned().collect();
        assert_eq!(values, [Value::from(1), Value::from(2), Value::from(3)]);
    }

    #[test]
    fn large_table_and_set() {
        let table: Table = (0..10_000).map(|i| (format!("k{}", i), i)).collect();
        assert_eq!(table.len(), 10_000);
        assert_eq!(table.get(&Value::from("k9999")), Some(&Value::from(9999)));
        assert_eq!(table.iter().next().map(|(k, _)| k), Some(&Value::from("k0")));

        let mut set: Set = (0..10_000).collect();
        assert!(!set.insert(5000));
        assert!(set.contains(&Value::from(9999)));
        assert_eq!(set.len(), 10_000);
    }

    #[test]
    fn table_replace_keeps_position() {
        let mut table: Table = [("a", 1), ("b", 2), ("c", 3)].into_iter().collect();
        table.set("a", 10);
        let keys: Vec<_> = table.iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(keys, [Value::from("a"), Value::from("b"), Value::from("c")]);
    }

    #[test]
    fn null_and_undefined_are_distinct_members() {
        let set: Set = [Value::Null, Value::Undefined, Value::Null].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn object_exposes_record() {
        let mut object = Object::new("Point");
        object.record_mut().insert("x", 0);
        let node = Node::Object(object);
        assert_eq!(node.kind_name(), "object");
        assert_eq!(node.record().and_then(|r| r.get("x")), Some(&Value::from(0)));
    }
}
