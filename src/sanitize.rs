use serde_json::{Map, Number, Value};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Placeholder emitted where a value graph refers back into itself.
pub const CIRCULAR: &str = "[Circular]";

/// Shared, possibly cyclic array node.
pub type SharedArray = Rc<RefCell<Vec<RawValue>>>;
/// Shared, possibly cyclic object node. Pairs keep insertion order.
pub type SharedObject = Rc<RefCell<Vec<(String, RawValue)>>>;

/// Hook for domain objects that know how to render themselves as JSON.
///
/// Invoked before traversal with the key the value sits under, so an
/// object can opt out of circular traversal entirely by returning a
/// scalar summary.
pub trait JsonConvertible {
    fn to_json(&self, key: &str) -> RawValue;
}

/// An arbitrary value attached to a log event before sanitization.
///
/// Composite nodes are reference-counted so the same node can appear in
/// several places, including cyclically; the sanitizer resolves all of
/// that into plain [`serde_json::Value`] without ever failing.
#[derive(Clone)]
pub enum RawValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    /// Integer too wide for standard JSON numbers; rendered as its
    /// decimal digits followed by an `n` suffix.
    BigInt(i128),
    Str(String),
    Array(SharedArray),
    Object(SharedObject),
    Convertible(Rc<dyn JsonConvertible>),
    Error(Rc<crate::errors::AppError>),
}

impl RawValue {
    pub fn str(s: impl Into<String>) -> RawValue {
        RawValue::Str(s.into())
    }

    pub fn array(items: Vec<RawValue>) -> RawValue {
        RawValue::Array(Rc::new(RefCell::new(items)))
    }

    pub fn object(pairs: Vec<(impl Into<String>, RawValue)>) -> RawValue {
        RawValue::Object(Rc::new(RefCell::new(
            pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        )))
    }

    /// Member lookup for object nodes; `None` for everything else.
    pub fn get(&self, key: &str) -> Option<RawValue> {
        match self {
            RawValue::Object(obj) => obj
                .borrow()
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone()),
            _ => None,
        }
    }
}

impl fmt::Debug for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Composite nodes may be cyclic; never recurse into them here.
        match self {
            RawValue::Null => f.write_str("Null"),
            RawValue::Bool(b) => write!(f, "Bool({b})"),
            RawValue::Int(i) => write!(f, "Int({i})"),
            RawValue::UInt(u) => write!(f, "UInt({u})"),
            RawValue::Float(x) => write!(f, "Float({x})"),
            RawValue::BigInt(i) => write!(f, "BigInt({i})"),
            RawValue::Str(s) => write!(f, "Str({s:?})"),
            RawValue::Array(a) => write!(f, "Array(len={})", a.borrow().len()),
            RawValue::Object(o) => write!(f, "Object(len={})", o.borrow().len()),
            RawValue::Convertible(_) => f.write_str("Convertible(..)"),
            RawValue::Error(e) => write!(f, "Error({})", e.name),
        }
    }
}

impl From<Value> for RawValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => RawValue::Null,
            Value::Bool(b) => RawValue::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    RawValue::Int(i)
                } else if let Some(u) = n.as_u64() {
                    RawValue::UInt(u)
                } else {
                    RawValue::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => RawValue::Str(s),
            Value::Array(items) => {
                RawValue::array(items.into_iter().map(RawValue::from).collect())
            }
            Value::Object(map) => RawValue::Object(Rc::new(RefCell::new(
                map.into_iter().map(|(k, v)| (k, RawValue::from(v))).collect(),
            ))),
        }
    }
}

/// Convert an arbitrary value graph into a JSON-safe [`Value`].
///
/// Never fails: cycles become the [`CIRCULAR`] marker, non-finite floats
/// become `null`, and big integers become `"<digits>n"` strings. Running
/// the result back through the sanitizer is a no-op.
pub fn sanitize(value: &RawValue) -> Value {
    let mut seen = Vec::new();
    sanitize_with("", value, &mut seen)
}

/// Recursive worker. `seen` is the stack of composite nodes on the
/// current path, identified by pointer; it is pushed before descending
/// into a node and popped after, so repeated (non-cyclic) sharing in
/// unrelated branches is not flagged.
pub fn sanitize_with(key: &str, value: &RawValue, seen: &mut Vec<usize>) -> Value {
    match value {
        RawValue::Null => Value::Null,
        RawValue::Bool(b) => Value::Bool(*b),
        RawValue::Int(i) => Value::Number((*i).into()),
        RawValue::UInt(u) => Value::Number((*u).into()),
        RawValue::Float(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
        RawValue::BigInt(i) => Value::String(format!("{i}n")),
        RawValue::Str(s) => Value::String(s.clone()),
        RawValue::Array(items) => {
            let ptr = Rc::as_ptr(items) as usize;
            if seen.contains(&ptr) {
                return Value::String(CIRCULAR.to_string());
            }
            seen.push(ptr);
            let out = items
                .borrow()
                .iter()
                .enumerate()
                .map(|(idx, item)| sanitize_with(&idx.to_string(), item, seen))
                .collect();
            seen.pop();
            Value::Array(out)
        }
        RawValue::Object(pairs) => {
            let ptr = Rc::as_ptr(pairs) as usize;
            if seen.contains(&ptr) {
                return Value::String(CIRCULAR.to_string());
            }
            seen.push(ptr);
            let mut out = Map::new();
            for (k, v) in pairs.borrow().iter() {
                out.insert(k.clone(), sanitize_with(k, v, seen));
            }
            seen.pop();
            Value::Object(out)
        }
        RawValue::Convertible(conv) => {
            let converted = conv.to_json(key);
            sanitize_with(key, &converted, seen)
        }
        RawValue::Error(err) => crate::errors::serialize_app_error(err, true),
    }
}
