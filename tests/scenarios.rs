use serde_json::json;
use server_log_adapter::adapter::LogAdapter;
use server_log_adapter::config::{AdapterConfig, Destination};
use server_log_adapter::errors::AppError;
use server_log_adapter::events::{
    Event, RequestSnapshot, ResponseState, RouteInfo, ServerInfo,
};
use server_log_adapter::paths::{PathSpec, RoutePropertyMap};
use server_log_adapter::sanitize::RawValue;
use server_log_adapter::severity::Severity;
use server_log_adapter::stream::BufferStream;
use server_log_adapter::translate::GateDecision;
use std::rc::Rc;
use std::sync::Arc;

fn server() -> ServerInfo {
    ServerInfo {
        id: "srv-1".to_string(),
        uri: "http://localhost:3000".to_string(),
        address: "127.0.0.1".to_string(),
        port: 3000,
    }
}

fn build(config: AdapterConfig) -> (LogAdapter, BufferStream, BufferStream) {
    let response = BufferStream::new();
    let events = BufferStream::new();
    let mut config = config;
    config.response_destination = Destination::Stream(Arc::new(response.clone()));
    config.event_destination = Destination::Stream(Arc::new(events.clone()));
    let adapter = LogAdapter::new(config, server()).expect("valid config");
    (adapter, response, events)
}

fn completed_request(status: u16) -> RequestSnapshot {
    RequestSnapshot {
        id: "req-1".to_string(),
        method: "get".to_string(),
        path: "/".to_string(),
        remote_address: "203.0.113.7".to_string(),
        route: Some(RouteInfo::path_only("/")),
        response: Some(ResponseState {
            status_code: status,
            error: None,
        }),
        received_ms: 1_000,
        completed_ms: 1_025,
        ..Default::default()
    }
}

#[test]
fn scenario_a_plain_200_line_shape() {
    let (adapter, response, _events) = build(AdapterConfig::default());
    adapter.handle(Event::Response(Box::new(completed_request(200))));

    let records = response.records();
    assert_eq!(records.len(), 1);
    let line = records[0].as_object().unwrap();
    let keys: Vec<&String> = line.keys().collect();
    assert_eq!(keys, ["level", "time", "req", "route", "res", "msg"]);
    assert_eq!(line["level"], json!(30));
    assert_eq!(line["route"], json!({"path": "/"}));
    assert_eq!(line["res"]["statusCode"], json!(200));
}

#[test]
fn scenario_b_404_at_trace_threshold() {
    let mut config = AdapterConfig::default();
    config.response_level = Severity::Trace;
    let (adapter, response, _events) = build(config);
    adapter.handle(Event::Response(Box::new(completed_request(404))));

    let records = response.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["level"], json!(40));
    assert!(records[0]["res"].get("reason").is_none());
}

#[test]
fn scenario_c_handler_fault_produces_error_then_response_line() {
    let (adapter, response, events) = build(AdapterConfig::default());
    let error = AppError::new("TypeError", "fail")
        .with_stack("TypeError: fail\n  at handler")
        .shared();

    // The fault is raised synchronously during request processing,
    // strictly before the completion event fires.
    adapter.handle(Event::RequestError {
        request_id: "req-1".to_string(),
        tags: vec!["handler".to_string(), "error".to_string()],
        error: Rc::clone(&error),
        implementation_fault: true,
    });
    let mut snapshot = completed_request(500);
    snapshot.response = Some(ResponseState {
        status_code: 500,
        error: Some(error),
    });
    adapter.handle(Event::Response(Box::new(snapshot)));

    let error_lines = events.records();
    assert_eq!(error_lines.len(), 1);
    assert_eq!(error_lines[0]["level"], json!(60));
    assert_eq!(error_lines[0]["err"]["type"], json!("TypeError"));

    let response_lines = response.records();
    assert_eq!(response_lines.len(), 1);
    assert_eq!(response_lines[0]["level"], json!(50));
    assert!(response_lines[0]["res"]["reason"]
        .as_str()
        .unwrap()
        .contains("fail"));
}

#[test]
fn scenario_d_gate_skip_and_force() {
    let (adapter, response, events) = build(AdapterConfig::default());
    let skip = |_req: &RequestSnapshot| -> Result<GateDecision, Box<dyn std::error::Error + Send + Sync>> {
        Ok(GateDecision::Skip)
    };
    let adapter = adapter.with_gate(Arc::new(skip));
    adapter.handle(Event::Response(Box::new(completed_request(200))));
    assert!(response.lines().is_empty());
    assert!(events.lines().is_empty());

    let (adapter, response, _events) = build(AdapterConfig::default());
    let force = |_req: &RequestSnapshot| -> Result<GateDecision, Box<dyn std::error::Error + Send + Sync>> {
        Ok(GateDecision::ForceLevel(Severity::Fatal))
    };
    let adapter = adapter.with_gate(Arc::new(force));
    adapter.handle(Event::Response(Box::new(completed_request(200))));
    let records = response.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["level"], json!(60));
}

#[test]
fn scenario_e_server_log_with_tag_override() {
    let config = AdapterConfig::default().with_tag_level("my", Severity::Warn);
    let (adapter, _response, events) = build(config);
    adapter.handle(Event::ServerLog {
        tags: vec!["my".to_string(), "app".to_string()],
        data: Some(RawValue::str("note")),
        error: None,
    });
    let records = events.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["level"], json!(40));
    assert_eq!(records[0]["tags"], json!(["my", "app"]));
}

#[test]
fn scenario_f_property_map_override_present_and_absent() {
    let props = RoutePropertyMap {
        req: vec![(
            "clientIp".to_string(),
            PathSpec::dotted("headers.x-real-ip"),
        )],
        res: Vec::new(),
    };

    // Header present: the mapped value wins over the default clientIp.
    let (adapter, response, _events) = build(AdapterConfig::default());
    let mut snapshot = completed_request(200);
    snapshot.route = Some(RouteInfo {
        props: Some(props.clone()),
        ..RouteInfo::path_only("/")
    });
    snapshot.context = RawValue::object(vec![(
        "headers",
        RawValue::object(vec![("x-real-ip", RawValue::str("10.9.8.7"))]),
    )]);
    adapter.handle(Event::Response(Box::new(snapshot)));
    assert_eq!(response.records()[0]["req"]["clientIp"], json!("10.9.8.7"));

    // Header absent: the default stays.
    let (adapter, response, _events) = build(AdapterConfig::default());
    let mut snapshot = completed_request(200);
    snapshot.route = Some(RouteInfo {
        props: Some(props),
        ..RouteInfo::path_only("/")
    });
    snapshot.context = RawValue::object(vec![("headers", RawValue::object(
        Vec::<(String, RawValue)>::new(),
    ))]);
    adapter.handle(Event::Response(Box::new(snapshot)));
    assert_eq!(
        response.records()[0]["req"]["clientIp"],
        json!("203.0.113.7")
    );
}

#[test]
fn non_5xx_internal_error_goes_to_trace_line() {
    let mut config = AdapterConfig::default();
    config.response_level = Severity::Trace;
    let (adapter, response, _events) = build(config);

    let error = AppError::new("Error", "upstream miss").with_stack("st").shared();
    let mut snapshot = completed_request(404);
    snapshot.response = Some(ResponseState {
        status_code: 404,
        error: Some(error),
    });
    adapter.handle(Event::Response(Box::new(snapshot)));

    let records = response.records();
    assert_eq!(records.len(), 2);
    // Trace detail first, completion line after.
    assert_eq!(records[0]["level"], json!(10));
    assert_eq!(records[0]["msg"], json!("response-error"));
    assert_eq!(records[0]["err"]["message"], json!("upstream miss"));
    assert_eq!(records[1]["level"], json!(40));
    assert!(records[1]["res"].get("reason").is_none());
}

#[test]
fn gate_skip_still_runs_the_trace_check() {
    let mut config = AdapterConfig::default();
    config.response_level = Severity::Trace;
    let (adapter, response, _events) = build(config);
    let skip = |_req: &RequestSnapshot| -> Result<GateDecision, Box<dyn std::error::Error + Send + Sync>> {
        Ok(GateDecision::Skip)
    };
    let adapter = adapter.with_gate(Arc::new(skip));

    let error = AppError::new("Error", "shadowed").with_stack("st").shared();
    let mut snapshot = completed_request(403);
    snapshot.response = Some(ResponseState {
        status_code: 403,
        error: Some(error),
    });
    adapter.handle(Event::Response(Box::new(snapshot)));

    let records = response.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["msg"], json!("response-error"));
}

#[test]
fn runtime_threshold_change_round_trip() {
    let (adapter, response, _events) = build(AdapterConfig::default());
    adapter.set_response_level(Severity::Silent);
    adapter.handle(Event::Response(Box::new(completed_request(200))));
    assert!(response.lines().is_empty());

    adapter.set_response_level(Severity::Info);
    adapter.handle(Event::Response(Box::new(completed_request(200))));
    assert_eq!(response.records().len(), 1);
}

#[test]
fn introspection_handles_expose_levels_and_tags() {
    let config = AdapterConfig::default().with_tag_level("audit", Severity::Warn);
    let (adapter, _response, _events) = build(config);
    assert_eq!(adapter.response_logger().level(), Severity::Info);
    assert_eq!(adapter.tag_levels().get("audit"), Some(Severity::Warn));
    assert_eq!(adapter.tag_levels().get("error"), Some(Severity::Error));
}
