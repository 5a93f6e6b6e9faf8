use crate::errors::{serialize_app_error, AppError};
use crate::events::{AuthState, RequestSnapshot, ServerInfo};
use crate::paths::{PathSpec, RoutePropertyMap};
use crate::record::LogRecord;
use crate::sanitize::{sanitize, RawValue};
use crate::severity::{resolve_level, Severity, TagLevelMap};
use serde_json::{Map, Value};
use std::error::Error;
use std::rc::Rc;

/// What the user-supplied gate wants done with a response line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Suppress the response line entirely (the trace-level associated
    /// error check still runs).
    Skip,
    /// Log at the status-derived level.
    Log,
    /// Log at exactly this level, ignoring the status-derived default.
    ForceLevel(Severity),
}

/// User-supplied predicate consulted before logging a response.
///
/// An `Err` from user code is treated as a translation fault and ends
/// up as a meta-record, never as a propagated failure.
pub trait ResponseGate: Send + Sync {
    fn evaluate(
        &self,
        request: &RequestSnapshot,
    ) -> Result<GateDecision, Box<dyn Error + Send + Sync>>;
}

impl<F> ResponseGate for F
where
    F: Fn(&RequestSnapshot) -> Result<GateDecision, Box<dyn Error + Send + Sync>> + Send + Sync,
{
    fn evaluate(
        &self,
        request: &RequestSnapshot,
    ) -> Result<GateDecision, Box<dyn Error + Send + Sync>> {
        self(request)
    }
}

/// Failure while building or writing a log line. Recovered locally by
/// the dispatch driver; never propagated to the host.
#[derive(thiserror::Error, Debug)]
pub enum TranslateFault {
    #[error("response gate failed: {0}")]
    Gate(#[source] Box<dyn Error + Send + Sync>),

    #[error("log write failed: {0}")]
    Write(#[from] std::io::Error),
}

impl TranslateFault {
    pub fn kind(&self) -> &'static str {
        match self {
            TranslateFault::Gate(_) => "GateFault",
            TranslateFault::Write(_) => "WriteFault",
        }
    }
}

/// Status-tier level rule for response lines.
pub fn status_level(status: u16) -> Severity {
    if status >= 500 {
        Severity::Error
    } else if status >= 400 {
        Severity::Warn
    } else {
        Severity::Info
    }
}

/// Default level of a response line: status-derived, or debug for an
/// aborted request with no response at all.
pub fn response_level(snapshot: &RequestSnapshot) -> Severity {
    match &snapshot.response {
        Some(response) => status_level(response.status_code),
        None => Severity::Debug,
    }
}

fn tags_value(tags: &[String]) -> Value {
    Value::Array(tags.iter().map(|t| Value::String(t.clone())).collect())
}

fn request_ref(request_id: &str) -> Value {
    let mut req = Map::new();
    req.insert("id".to_string(), Value::String(request_id.to_string()));
    Value::Object(req)
}

fn server_value(server: &ServerInfo) -> Value {
    let mut out = Map::new();
    out.insert("id".to_string(), Value::String(server.id.clone()));
    out.insert("uri".to_string(), Value::String(server.uri.clone()));
    out.insert("address".to_string(), Value::String(server.address.clone()));
    out.insert("port".to_string(), Value::Number(server.port.into()));
    Value::Object(out)
}

fn auth_value(auth: &AuthState) -> Value {
    let mut out = Map::new();
    if let Some(mode) = &auth.mode {
        out.insert("mode".to_string(), Value::String(mode.clone()));
    }
    out.insert("authenticated".to_string(), Value::Bool(auth.is_authenticated));
    out.insert("authorized".to_string(), Value::Bool(auth.is_authorized));
    if let Some(credentials) = &auth.credentials {
        out.insert("credentials".to_string(), sanitize(credentials));
    }
    if let Some(strategy) = &auth.strategy {
        out.insert("strategy".to_string(), Value::String(strategy.clone()));
    }
    Value::Object(out)
}

fn error_value(error: &Rc<AppError>, include_stack: bool) -> Value {
    serialize_app_error(error, include_stack)
}

/// Cause-chain message of an error, without the rest of its record.
fn chain_message(error: &Rc<AppError>) -> String {
    match serialize_app_error(error, false) {
        Value::Object(map) => match map.get("message") {
            Some(Value::String(message)) => message.clone(),
            _ => String::new(),
        },
        _ => String::new(),
    }
}

fn apply_props(
    entries: &[(String, PathSpec)],
    snapshot: &RequestSnapshot,
    target: &mut Map<String, Value>,
) {
    for (field, path) in entries {
        if let Some(found) = snapshot.lookup(&path.segments()) {
            target.insert(field.clone(), sanitize(&found));
        }
    }
}

/// Build the server-response line.
///
/// `req` and `res` carry the default shape, then the matched route's
/// property map (or the server-wide default) is resolved on top,
/// overriding same-named fields.
pub fn response_record(
    snapshot: &RequestSnapshot,
    level: Severity,
    default_props: Option<&RoutePropertyMap>,
) -> LogRecord {
    let mut req = Map::new();
    req.insert("id".to_string(), Value::String(snapshot.id.clone()));
    req.insert("method".to_string(), Value::String(snapshot.method.clone()));
    req.insert("url".to_string(), Value::String(snapshot.url()));
    req.insert(
        "clientIp".to_string(),
        Value::String(snapshot.remote_address.clone()),
    );
    if let Some(auth) = &snapshot.auth {
        req.insert("auth".to_string(), auth_value(auth));
    }

    let mut route = Map::new();
    if let Some(info) = &snapshot.route {
        if let Some(id) = &info.id {
            route.insert("id".to_string(), Value::String(id.clone()));
        }
        if let Some(vhost) = &info.vhost {
            route.insert("vhost".to_string(), Value::String(vhost.clone()));
        }
        route.insert("path".to_string(), Value::String(info.path.clone()));
        if let Some(realm) = &info.realm {
            route.insert("realm".to_string(), Value::String(realm.clone()));
        }
    }

    let mut res = Map::new();
    match &snapshot.response {
        Some(response) => {
            res.insert(
                "statusCode".to_string(),
                Value::Number(response.status_code.into()),
            );
            res.insert("delay".to_string(), Value::Number(snapshot.delay_ms().into()));
            // Internal errors on non-5xx responses go to the trace line
            // instead of the response line.
            if response.status_code >= 500 {
                if let Some(error) = &response.error {
                    res.insert("reason".to_string(), Value::String(chain_message(error)));
                    if let Some(data) = &error.data {
                        res.insert("data".to_string(), sanitize(data));
                    }
                }
            }
        }
        None => {
            res.insert("delay".to_string(), Value::Number(snapshot.delay_ms().into()));
        }
    }

    let props = snapshot
        .route
        .as_ref()
        .and_then(|info| info.props.as_ref())
        .or(default_props);
    if let Some(props) = props {
        apply_props(&props.req, snapshot, &mut req);
        apply_props(&props.res, snapshot, &mut res);
    }

    let msg = if snapshot.response.is_some() {
        "request-completed"
    } else {
        "request-aborted"
    };
    LogRecord::new(level, msg)
        .field("req", Value::Object(req))
        .field("route", Value::Object(route))
        .field("res", Value::Object(res))
}

/// Trace line for an internal error attached to a non-5xx response.
pub fn response_trace_record(
    snapshot: &RequestSnapshot,
    error: &Rc<AppError>,
    include_stack: bool,
) -> LogRecord {
    LogRecord::new(Severity::Trace, "response-error")
        .field("req", request_ref(&snapshot.id))
        .field(
            "tags",
            tags_value(&["response".to_string(), "error".to_string()]),
        )
        .field("err", error_value(error, include_stack))
}

pub fn request_error_record(
    request_id: &str,
    tags: &[String],
    error: &Rc<AppError>,
    implementation_fault: bool,
    include_stack: bool,
) -> LogRecord {
    let level = if implementation_fault {
        Severity::Fatal
    } else {
        Severity::Error
    };
    LogRecord::new(level, "request-error")
        .field("req", request_ref(request_id))
        .field("tags", tags_value(tags))
        .field("err", error_value(error, include_stack))
}

pub fn request_debug_record(
    request_id: &str,
    tags: &[String],
    data: Option<&RawValue>,
    error: Option<&Rc<AppError>>,
    include_stack: bool,
) -> LogRecord {
    LogRecord::new(Severity::Debug, "request-debug")
        .field("req", request_ref(request_id))
        .field("tags", tags_value(tags))
        .maybe_field("data", data.map(sanitize))
        .maybe_field("err", error.map(|e| error_value(e, include_stack)))
}

pub fn request_log_record(
    request_id: &str,
    tags: &[String],
    data: Option<&RawValue>,
    error: Option<&Rc<AppError>>,
    tag_levels: &TagLevelMap,
    include_stack: bool,
) -> LogRecord {
    let level = resolve_level(tags, Severity::Info, tag_levels);
    LogRecord::new(level, "request-log")
        .field("req", request_ref(request_id))
        .field("tags", tags_value(tags))
        .maybe_field("data", data.map(sanitize))
        .maybe_field("err", error.map(|e| error_value(e, include_stack)))
}

pub fn server_debug_record(
    server: &ServerInfo,
    tags: &[String],
    data: Option<&RawValue>,
    error: Option<&Rc<AppError>>,
    include_stack: bool,
) -> LogRecord {
    LogRecord::new(Severity::Debug, "server-debug")
        .field("server", server_value(server))
        .field("tags", tags_value(tags))
        .maybe_field("data", data.map(sanitize))
        .maybe_field("err", error.map(|e| error_value(e, include_stack)))
}

pub fn server_log_record(
    server: &ServerInfo,
    tags: &[String],
    data: Option<&RawValue>,
    error: Option<&Rc<AppError>>,
    tag_levels: &TagLevelMap,
    include_stack: bool,
) -> LogRecord {
    let level = resolve_level(tags, Severity::Info, tag_levels);
    LogRecord::new(level, "server-log")
        .field("server", server_value(server))
        .field("tags", tags_value(tags))
        .maybe_field("data", data.map(sanitize))
        .maybe_field("err", error.map(|e| error_value(e, include_stack)))
}

pub fn lifecycle_record(server: &ServerInfo, started: bool) -> LogRecord {
    let msg = if started { "server-started" } else { "server-stopped" };
    LogRecord::new(Severity::Info, msg).field("server", server_value(server))
}

/// Fatal meta-record emitted when a translator itself fails.
pub fn fault_record(server: &ServerInfo, translator: &str, fault: &TranslateFault) -> LogRecord {
    LogRecord::new(Severity::Fatal, "log-emit-failed")
        .field("server", server_value(server))
        .field("translator", Value::String(translator.to_string()))
        .field("type", Value::String(fault.kind().to_string()))
        .field("message", Value::String(fault.to_string()))
}
