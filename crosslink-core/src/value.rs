use serde_json::Number;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::graph::NodeId;

/// A property or element value inside a graph.
///
/// Primitives (`Null`, `Bool`, `Number`, `String`) are stored inline.
/// Composites live in the graph arena and are referenced through `Ref`, so
/// two properties holding the same `NodeId` hold the *same* object.
///
/// `Undefined` and `Function` exist in live graphs but never survive a dump.
///
/// Values hash consistently with their equality, so they can key tables and
/// sets directly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum Value {
    /// Absent value. Dropped when dumping.
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    /// Reference to a composite node.
    Ref(NodeId),
    /// Opaque callable. Dropped when dumping.
    Function(Function),
}

impl Value {
    /// Returns true for `Null`, `Bool`, `Number` and `String`.
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_)
        )
    }

    /// Returns true for values the flattener drops silently.
    pub fn is_droppable(&self) -> bool {
        matches!(self, Value::Undefined | Value::Function(_))
    }

    /// Returns the referenced node, if this value is composite.
    pub fn node(&self) -> Option<NodeId> {
        match self {
            Value::Ref(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    /// Converts a primitive into its JSON form. Composites and droppable
    /// values have no JSON form.
    pub(crate) fn to_json(&self) -> Option<serde_json::Value> {
        match self {
            Value::Null => Some(serde_json::Value::Null),
            Value::Bool(b) => Some(serde_json::Value::Bool(*b)),
            Value::Number(n) => Some(serde_json::Value::Number(n.clone())),
            Value::String(s) => Some(serde_json::Value::String(s.clone())),
            _ => None,
        }
    }

    /// Converts a JSON scalar into a primitive. Arrays and objects have to be
    /// allocated as nodes by the caller.
    pub(crate) fn from_json_scalar(json: serde_json::Value) -> Option<Value> {
        match json {
            serde_json::Value::Null => Some(Value::Null),
            serde_json::Value::Bool(b) => Some(Value::Bool(b)),
            serde_json::Value::Number(n) => Some(Value::Number(n)),
            serde_json::Value::String(s) => Some(Value::String(s)),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(n: $t) -> Self {
                    Value::Number(Number::from(n))
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32, u64, usize);

impl From<f64> for Value {
    /// Non-finite numbers have no JSON form and become `Null`.
    fn from(n: f64) -> Self {
        Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<NodeId> for Value {
    fn from(id: NodeId) -> Self {
        Value::Ref(id)
    }
}

impl From<Function> for Value {
    fn from(f: Function) -> Self {
        Value::Function(f)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// A callable stored in a graph.
///
/// Functions compare by identity, like composites.
#[derive(Clone)]
pub struct Function {
    name: Rc<str>,
    body: Rc<dyn Fn(&[Value]) -> Value>,
}

impl Function {
    pub fn new(name: &str, body: impl Fn(&[Value]) -> Value + 'static) -> Self {
        Function {
            name: Rc::from(name),
            body: Rc::new(body),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, args: &[Value]) -> Value {
        (self.body)(args)
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.body), Rc::as_ptr(&other.body))
    }
}

impl Eq for Function {}

impl Hash for Function {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Rc::as_ptr(&self.body).cast::<()>().hash(state);
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function({})", self.name)
    }
}

/// Where a value sits in its container, as seen by a transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key<'a> {
    /// The root of a dump or restore.
    Root,
    /// A named field of a record or object.
    Field(&'a str),
    /// A position in a sequence, or the slot of a table entry (0 = key, 1 = value).
    Index(usize),
}

impl fmt::Display for Key<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Root => Ok(()),
            Key::Field(name) => f.write_str(name),
            Key::Index(i) => write!(f, "{}", i),
        }
    }
}
