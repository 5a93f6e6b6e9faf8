use crate::errors::AppError;
use crate::paths::{self, RoutePropertyMap};
use crate::sanitize::RawValue;
use crate::subscribe::EventCategory;
use std::rc::Rc;

/// Identity of the server instance, stamped into server-scoped lines.
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub id: String,
    pub uri: String,
    pub address: String,
    pub port: u16,
}

/// Authentication state of a completed request.
#[derive(Debug, Clone, Default)]
pub struct AuthState {
    pub mode: Option<String>,
    pub is_authenticated: bool,
    pub is_authorized: bool,
    pub credentials: Option<RawValue>,
    pub strategy: Option<String>,
}

/// The route a request matched, if any.
#[derive(Debug, Clone)]
pub struct RouteInfo {
    pub id: Option<String>,
    pub vhost: Option<String>,
    pub path: String,
    pub realm: Option<String>,
    pub props: Option<RoutePropertyMap>,
}

impl RouteInfo {
    pub fn path_only(path: impl Into<String>) -> RouteInfo {
        RouteInfo {
            id: None,
            vhost: None,
            path: path.into(),
            realm: None,
            props: None,
        }
    }
}

/// Response side of a completed request. Absent entirely for aborted
/// requests.
#[derive(Debug, Clone)]
pub struct ResponseState {
    pub status_code: u16,
    pub error: Option<Rc<AppError>>,
}

/// Read-only snapshot of a request at completion time.
///
/// The typed fields feed the default record shape; `context` is an
/// object tree (headers and whatever else the host exposes) that
/// property-map paths resolve against.
#[derive(Debug, Clone)]
pub struct RequestSnapshot {
    pub id: String,
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub remote_address: String,
    pub auth: Option<AuthState>,
    pub route: Option<RouteInfo>,
    pub response: Option<ResponseState>,
    pub received_ms: i64,
    pub completed_ms: i64,
    pub context: RawValue,
}

impl Default for RequestSnapshot {
    fn default() -> Self {
        RequestSnapshot {
            id: String::new(),
            method: "get".to_string(),
            path: "/".to_string(),
            query: None,
            remote_address: String::new(),
            auth: None,
            route: None,
            response: None,
            received_ms: 0,
            completed_ms: 0,
            context: RawValue::Null,
        }
    }
}

impl RequestSnapshot {
    /// Path plus query string, as emitted in `req.url`.
    pub fn url(&self) -> String {
        match &self.query {
            Some(query) if !query.is_empty() => format!("{}?{}", self.path, query),
            _ => self.path.clone(),
        }
    }

    pub fn delay_ms(&self) -> i64 {
        self.completed_ms - self.received_ms
    }

    /// Resolve a property-map path against this snapshot.
    pub fn lookup(&self, segments: &[&str]) -> Option<RawValue> {
        paths::resolve(&self.context, segments)
    }
}

/// A framework lifecycle event delivered to the adapter.
#[derive(Debug)]
pub enum Event {
    /// Request completed or aborted.
    Response(Box<RequestSnapshot>),
    /// Request processing fault signalled by the framework.
    RequestError {
        request_id: String,
        tags: Vec<String>,
        error: Rc<AppError>,
        /// Unrecoverable implementation defect rather than an
        /// operational failure; logged fatal instead of error.
        implementation_fault: bool,
    },
    /// Low-level per-request diagnostics.
    RequestDebug {
        request_id: String,
        tags: Vec<String>,
        data: Option<RawValue>,
        error: Option<Rc<AppError>>,
    },
    /// Explicit per-request log from user code.
    RequestLog {
        request_id: String,
        tags: Vec<String>,
        data: Option<RawValue>,
        error: Option<Rc<AppError>>,
    },
    /// Low-level server-wide diagnostics.
    ServerDebug {
        tags: Vec<String>,
        data: Option<RawValue>,
        error: Option<Rc<AppError>>,
    },
    /// Explicit server-wide log from user code.
    ServerLog {
        tags: Vec<String>,
        data: Option<RawValue>,
        error: Option<Rc<AppError>>,
    },
    Started,
    Stopped,
}

impl Event {
    pub fn category(&self) -> EventCategory {
        match self {
            Event::Response(_) => EventCategory::Response,
            Event::RequestError { .. } => EventCategory::RequestError,
            Event::RequestDebug { .. } => EventCategory::RequestDebug,
            Event::RequestLog { .. } => EventCategory::RequestApp,
            Event::ServerDebug { .. } => EventCategory::ServerDebug,
            Event::ServerLog { .. } => EventCategory::ServerApp,
            Event::Started | Event::Stopped => EventCategory::Lifecycle,
        }
    }

    /// Short translator name used in fault meta-records.
    pub fn translator_name(&self) -> &'static str {
        match self {
            Event::Response(_) => "response",
            Event::RequestError { .. } => "request-error",
            Event::RequestDebug { .. } => "request-debug",
            Event::RequestLog { .. } => "request-log",
            Event::ServerDebug { .. } => "server-debug",
            Event::ServerLog { .. } => "server-log",
            Event::Started | Event::Stopped => "lifecycle",
        }
    }
}
