use crate::sanitize::{sanitize, RawValue};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::rc::Rc;

/// How an error participates in serialization. Decided once at entry,
/// never re-inferred mid-walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    Generic,
    /// HTTP-aware error carrying a status code and optionally a display
    /// name distinct from its class.
    RichHttp {
        status_code: u16,
        custom_name: Option<String>,
    },
}

/// An error-like object attached to a log event.
///
/// `cause` is a cell holding either another error or an arbitrary value
/// (malformed causes are string-coerced during serialization); the cell
/// lets callers link errors after construction, including cyclically.
#[derive(Debug)]
pub struct AppError {
    pub name: String,
    pub message: String,
    pub stack: Option<String>,
    pub code: Option<RawValue>,
    pub data: Option<RawValue>,
    pub cause: RefCell<Option<RawValue>>,
    pub kind: ErrorKind,
}

impl AppError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> AppError {
        AppError {
            name: name.into(),
            message: message.into(),
            stack: None,
            code: None,
            data: None,
            cause: RefCell::new(None),
            kind: ErrorKind::Generic,
        }
    }

    pub fn rich(message: impl Into<String>, status_code: u16) -> AppError {
        AppError {
            name: "RichError".to_string(),
            message: message.into(),
            stack: None,
            code: None,
            data: None,
            cause: RefCell::new(None),
            kind: ErrorKind::RichHttp {
                status_code,
                custom_name: None,
            },
        }
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> AppError {
        self.stack = Some(stack.into());
        self
    }

    pub fn with_code(mut self, code: RawValue) -> AppError {
        self.code = Some(code);
        self
    }

    pub fn with_data(mut self, data: RawValue) -> AppError {
        self.data = Some(data);
        self
    }

    pub fn with_custom_name(mut self, name: impl Into<String>) -> AppError {
        if let ErrorKind::RichHttp { custom_name, .. } = &mut self.kind {
            *custom_name = Some(name.into());
        }
        self
    }

    pub fn with_cause(self, cause: RawValue) -> AppError {
        *self.cause.borrow_mut() = Some(cause);
        self
    }

    pub fn shared(self) -> Rc<AppError> {
        Rc::new(self)
    }
}

/// Serialize any event value: errors become a structured record, every
/// other value passes through the sanitizer unchanged in meaning.
pub fn serialize(value: &RawValue, include_stack: bool) -> Value {
    match value {
        RawValue::Error(err) => serialize_app_error(err, include_stack),
        other => sanitize(other),
    }
}

/// Build the `{type, message, code, data, stack}` record for an error,
/// folding its cause chain into `message` and `stack`.
pub fn serialize_app_error(err: &Rc<AppError>, include_stack: bool) -> Value {
    // If the root has no string stack, stack tracing is off for the
    // whole walk, even when a later cause carries one.
    let stacks_on = include_stack && err.stack.is_some();

    let (root_cause, data_is_cause) = resolve_cause(err);
    let label = type_label(err, root_cause.as_ref());

    let mut message = err.message.clone();
    let mut stack = if stacks_on { err.stack.clone() } else { None };

    let mut visited: Vec<*const AppError> = vec![Rc::as_ptr(err)];
    let mut current = root_cause.clone();
    loop {
        match current {
            None => break,
            Some(RawValue::Error(cause)) => {
                if visited.contains(&Rc::as_ptr(&cause)) {
                    message.push_str(": ...");
                    if let Some(s) = stack.as_mut() {
                        s.push_str("\ncauses have become circular...");
                    }
                    break;
                }
                message.push_str(": ");
                message.push_str(&cause.message);
                if let (Some(s), Some(cause_stack)) = (stack.as_mut(), cause.stack.as_ref()) {
                    s.push_str("\ncaused by: ");
                    s.push_str(cause_stack);
                }
                visited.push(Rc::as_ptr(&cause));
                current = resolve_cause(&cause).0;
            }
            Some(other) => {
                // Malformed cause: render via string coercion, chain ends.
                message.push_str(": ");
                message.push_str(&coerce_string(&other));
                break;
            }
        }
    }

    let mut out = Map::new();
    out.insert("type".to_string(), Value::String(label));
    out.insert("message".to_string(), Value::String(message));
    match (&err.code, &err.kind) {
        (Some(code), _) => {
            out.insert("code".to_string(), sanitize(code));
        }
        (None, ErrorKind::RichHttp { status_code, .. }) => {
            out.insert("code".to_string(), Value::Number((*status_code).into()));
        }
        (None, ErrorKind::Generic) => {}
    }
    if let Some(data) = &err.data {
        if !data_is_cause {
            out.insert("data".to_string(), sanitize(data));
        }
    }
    if let Some(stack) = stack {
        out.insert("stack".to_string(), Value::String(stack));
    }
    Value::Object(out)
}

/// Explicit cause wins; rich errors additionally fall back to an
/// error-shaped data payload. The flag reports whether `data` equals
/// the resolved cause, in which case the `data` field is omitted
/// rather than duplicating the chain.
fn resolve_cause(err: &Rc<AppError>) -> (Option<RawValue>, bool) {
    let rich = matches!(err.kind, ErrorKind::RichHttp { .. });
    let explicit = err.cause.borrow().clone();
    if let Some(cause) = explicit {
        let data_is_cause = rich
            && matches!(
                (&cause, &err.data),
                (RawValue::Error(c), Some(RawValue::Error(d))) if Rc::ptr_eq(c, d)
            );
        return (Some(cause), data_is_cause);
    }
    if rich {
        if let Some(data @ RawValue::Error(_)) = err.data.clone() {
            return (Some(data), true);
        }
    }
    (None, false)
}

fn type_label(err: &Rc<AppError>, cause: Option<&RawValue>) -> String {
    match &err.kind {
        ErrorKind::Generic => err.name.clone(),
        ErrorKind::RichHttp { custom_name, .. } => {
            let inner = match cause {
                Some(RawValue::Error(inner)) if inner.name != "Error" => {
                    Some(inner.name.clone())
                }
                _ => None,
            };
            let distinct = inner.or_else(|| {
                custom_name
                    .as_ref()
                    .filter(|name| name.as_str() != err.name)
                    .cloned()
            });
            match distinct {
                Some(name) => format!("RichError({name})"),
                None => "RichError".to_string(),
            }
        }
    }
}

fn coerce_string(value: &RawValue) -> String {
    match sanitize(value) {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn non_error_values_pass_through() {
        assert_eq!(serialize(&RawValue::Int(5), true), json!(5));
        assert_eq!(serialize(&RawValue::str("ok"), true), json!("ok"));
    }

    #[test]
    fn generic_error_record_shape() {
        let err = AppError::new("TypeError", "fail")
            .with_stack("TypeError: fail\n  at handler")
            .shared();
        let out = serialize_app_error(&err, true);
        assert_eq!(
            out,
            json!({
                "type": "TypeError",
                "message": "fail",
                "stack": "TypeError: fail\n  at handler",
            })
        );
    }

    #[test]
    fn code_falls_back_to_rich_status() {
        let err = AppError::rich("boom", 503).with_stack("s").shared();
        let out = serialize_app_error(&err, true);
        assert_eq!(out["type"], json!("RichError"));
        assert_eq!(out["code"], json!(503));
    }

    #[test]
    fn rich_label_names_distinguishable_inner_cause() {
        let inner = AppError::new("RangeError", "too far").shared();
        let err = AppError::rich("wrapped", 500)
            .with_cause(RawValue::Error(inner))
            .shared();
        let out = serialize_app_error(&err, false);
        assert_eq!(out["type"], json!("RichError(RangeError)"));
        assert_eq!(out["message"], json!("wrapped: too far"));
    }

    #[test]
    fn rich_data_payload_acts_as_cause_and_is_omitted() {
        let inner = AppError::new("Error", "db down").shared();
        let err = AppError::rich("query failed", 500)
            .with_data(RawValue::Error(inner))
            .shared();
        let out = serialize_app_error(&err, false);
        assert_eq!(out["type"], json!("RichError"));
        assert_eq!(out["message"], json!("query failed: db down"));
        assert!(out.get("data").is_none());
    }

    #[test]
    fn rich_explicit_cause_equal_to_data_omits_data() {
        let inner = AppError::new("RangeError", "deep").shared();
        let err = AppError::rich("wrapped", 500)
            .with_data(RawValue::Error(Rc::clone(&inner)))
            .with_cause(RawValue::Error(inner))
            .shared();
        let out = serialize_app_error(&err, false);
        assert_eq!(out["type"], json!("RichError(RangeError)"));
        assert_eq!(out["message"], json!("wrapped: deep"));
        assert!(out.get("data").is_none());
    }

    #[test]
    fn rich_data_distinct_from_cause_is_kept() {
        let cause = AppError::new("RangeError", "deep").shared();
        let err = AppError::rich("wrapped", 500)
            .with_data(RawValue::str("detail"))
            .with_cause(RawValue::Error(cause))
            .shared();
        let out = serialize_app_error(&err, false);
        assert_eq!(out["data"], json!("detail"));
    }

    #[test]
    fn rich_label_uses_custom_name_when_distinct() {
        let err = AppError::rich("denied", 403)
            .with_custom_name("PaymentRequired")
            .shared();
        let out = serialize_app_error(&err, false);
        assert_eq!(out["type"], json!("RichError(PaymentRequired)"));

        let plain = AppError::rich("denied", 403)
            .with_custom_name("RichError")
            .shared();
        let out = serialize_app_error(&plain, false);
        assert_eq!(out["type"], json!("RichError"));
    }

    #[test]
    fn cause_chain_joins_messages_and_stacks() {
        let c2 = AppError::new("Error", "m3").with_stack("s3").shared();
        let c1 = AppError::new("Error", "m2")
            .with_stack("s2")
            .with_cause(RawValue::Error(c2))
            .shared();
        let err = AppError::new("Error", "m1")
            .with_stack("s1")
            .with_cause(RawValue::Error(c1))
            .shared();
        let out = serialize_app_error(&err, true);
        assert_eq!(out["message"], json!("m1: m2: m3"));
        assert_eq!(out["stack"], json!("s1\ncaused by: s2\ncaused by: s3"));
    }

    #[test]
    fn cyclic_cause_chain_terminates() {
        let a = AppError::new("Error", "a").with_stack("sa").shared();
        let b = AppError::new("Error", "b")
            .with_stack("sb")
            .with_cause(RawValue::Error(Rc::clone(&a)))
            .shared();
        *a.cause.borrow_mut() = Some(RawValue::Error(Rc::clone(&b)));
        let out = serialize_app_error(&a, true);
        assert_eq!(out["message"], json!("a: b: ..."));
        assert_eq!(
            out["stack"],
            json!("sa\ncaused by: sb\ncauses have become circular...")
        );
    }

    #[test]
    fn missing_root_stack_suppresses_cause_stacks() {
        let inner = AppError::new("Error", "deep").with_stack("deep-stack").shared();
        let err = AppError::new("Error", "top")
            .with_cause(RawValue::Error(inner))
            .shared();
        let out = serialize_app_error(&err, true);
        assert_eq!(out["message"], json!("top: deep"));
        assert!(out.get("stack").is_none());
    }

    #[test]
    fn malformed_cause_is_string_coerced() {
        let err = AppError::new("Error", "top")
            .with_cause(RawValue::object(vec![("weird", RawValue::Int(1))]))
            .shared();
        let out = serialize_app_error(&err, false);
        assert_eq!(out["message"], json!("top: {\"weird\":1}"));
    }
}
