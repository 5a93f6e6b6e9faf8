use crate::config::{AdapterConfig, ConfigError};
use crate::events::{Event, RequestSnapshot, ServerInfo};
use crate::logger::Logger;
use crate::paths::RoutePropertyMap;
use crate::severity::{Severity, TagLevelMap};
use crate::subscribe::{event_groups, response_groups, EventCategory, SubscriptionManager};
use crate::translate::{self, GateDecision, ResponseGate, TranslateFault};
use std::sync::Arc;

/// The logging adapter: consumes framework events, emits NDJSON lines.
///
/// Response and response-trace lines go to the response logger (stdout
/// by default); error, diagnostic, app-log, lifecycle and fault
/// meta-records go to the event logger (stderr by default). Both
/// thresholds stay runtime mutable through the exposed handles; the
/// subscription managers track those thresholds so translation work is
/// skipped entirely for categories nobody would see.
pub struct LogAdapter {
    response_logger: Arc<Logger>,
    event_logger: Arc<Logger>,
    response_subs: Arc<SubscriptionManager>,
    event_subs: Arc<SubscriptionManager>,
    tag_levels: TagLevelMap,
    gate: Option<Arc<dyn ResponseGate>>,
    default_props: Option<RoutePropertyMap>,
    server: ServerInfo,
    include_stack: bool,
}

impl LogAdapter {
    pub fn new(config: AdapterConfig, server: ServerInfo) -> Result<LogAdapter, ConfigError> {
        config.validate()?;
        let tag_levels = TagLevelMap::build(&config.tag_levels);

        let response_logger = Arc::new(Logger::new(
            config.response_destination.into_stream(),
            config.response_level,
            config.line_ending,
        ));
        let event_logger = Arc::new(Logger::new(
            config.event_destination.into_stream(),
            config.event_level,
            config.line_ending,
        ));

        let response_subs = Arc::new(SubscriptionManager::new(response_groups()));
        let event_subs = Arc::new(SubscriptionManager::new(event_groups()));

        // Eager first application, then re-apply on every change.
        response_subs.apply(None, config.response_level);
        event_subs.apply(None, config.event_level);
        let subs = Arc::clone(&response_subs);
        response_logger.on_level_change(move |old, new| subs.apply(old, new));
        let subs = Arc::clone(&event_subs);
        event_logger.on_level_change(move |old, new| subs.apply(old, new));

        Ok(LogAdapter {
            response_logger,
            event_logger,
            response_subs,
            event_subs,
            tag_levels,
            gate: None,
            default_props: config.default_route_props,
            server,
            include_stack: config.include_stack,
        })
    }

    pub fn with_gate(mut self, gate: Arc<dyn ResponseGate>) -> LogAdapter {
        self.gate = Some(gate);
        self
    }

    /// Validate a route's property map at route-activation time.
    /// Invalid shapes are a configuration error, surfaced to the
    /// caller instead of being discovered mid-request.
    pub fn activate_route(&self, props: &RoutePropertyMap) -> Result<(), ConfigError> {
        props.validate()
    }

    /// Deliver one framework event.
    ///
    /// Never panics, never returns an error: a failing translator is
    /// downgraded to a single fatal meta-record on the event logger.
    pub fn handle(&self, event: Event) {
        if !self.subscribed(&event) {
            return;
        }
        let translator = event.translator_name();
        if let Err(fault) = self.translate(event) {
            let record = translate::fault_record(&self.server, translator, &fault);
            // Best effort; a failing meta write has nowhere to go.
            let _ = self.event_logger.write(&record);
        }
    }

    pub fn server_started(&self) {
        self.handle(Event::Started);
    }

    pub fn server_stopped(&self) {
        self.handle(Event::Stopped);
    }

    pub fn response_logger(&self) -> &Arc<Logger> {
        &self.response_logger
    }

    pub fn event_logger(&self) -> &Arc<Logger> {
        &self.event_logger
    }

    /// The resolved tag map, read-only.
    pub fn tag_levels(&self) -> &TagLevelMap {
        &self.tag_levels
    }

    pub fn set_response_level(&self, level: Severity) {
        self.response_logger.set_level(level);
    }

    pub fn set_event_level(&self, level: Severity) {
        self.event_logger.set_level(level);
    }

    fn subscribed(&self, event: &Event) -> bool {
        match event.category() {
            EventCategory::Response | EventCategory::ResponseTrace => {
                self.response_subs.is_enabled(EventCategory::Response)
                    || self.response_subs.is_enabled(EventCategory::ResponseTrace)
            }
            category => self.event_subs.is_enabled(category),
        }
    }

    fn translate(&self, event: Event) -> Result<(), TranslateFault> {
        match event {
            Event::Response(snapshot) => self.translate_response(&snapshot),
            Event::RequestError {
                request_id,
                tags,
                error,
                implementation_fault,
            } => {
                let record = translate::request_error_record(
                    &request_id,
                    &tags,
                    &error,
                    implementation_fault,
                    self.include_stack,
                );
                self.event_logger.write(&record)?;
                Ok(())
            }
            Event::RequestDebug {
                request_id,
                tags,
                data,
                error,
            } => {
                let record = translate::request_debug_record(
                    &request_id,
                    &tags,
                    data.as_ref(),
                    error.as_ref(),
                    self.include_stack,
                );
                self.event_logger.write(&record)?;
                Ok(())
            }
            Event::RequestLog {
                request_id,
                tags,
                data,
                error,
            } => {
                let record = translate::request_log_record(
                    &request_id,
                    &tags,
                    data.as_ref(),
                    error.as_ref(),
                    &self.tag_levels,
                    self.include_stack,
                );
                self.event_logger.write(&record)?;
                Ok(())
            }
            Event::ServerDebug { tags, data, error } => {
                let record = translate::server_debug_record(
                    &self.server,
                    &tags,
                    data.as_ref(),
                    error.as_ref(),
                    self.include_stack,
                );
                self.event_logger.write(&record)?;
                Ok(())
            }
            Event::ServerLog { tags, data, error } => {
                let record = translate::server_log_record(
                    &self.server,
                    &tags,
                    data.as_ref(),
                    error.as_ref(),
                    &self.tag_levels,
                    self.include_stack,
                );
                self.event_logger.write(&record)?;
                Ok(())
            }
            Event::Started => {
                self.event_logger
                    .write(&translate::lifecycle_record(&self.server, true))?;
                Ok(())
            }
            Event::Stopped => {
                self.event_logger
                    .write(&translate::lifecycle_record(&self.server, false))?;
                Ok(())
            }
        }
    }

    fn translate_response(&self, snapshot: &RequestSnapshot) -> Result<(), TranslateFault> {
        let decision = match &self.gate {
            Some(gate) => gate.evaluate(snapshot).map_err(TranslateFault::Gate)?,
            None => GateDecision::Log,
        };

        // Trace line first: per-request ordering puts error detail
        // ahead of the completion line.
        if self.response_subs.is_enabled(EventCategory::ResponseTrace) {
            if let Some(response) = &snapshot.response {
                if response.status_code < 500 {
                    if let Some(error) = &response.error {
                        let record = translate::response_trace_record(
                            snapshot,
                            error,
                            self.include_stack,
                        );
                        self.response_logger.write(&record)?;
                    }
                }
            }
        }

        if decision == GateDecision::Skip {
            return Ok(());
        }
        if !self.response_subs.is_enabled(EventCategory::Response) {
            return Ok(());
        }
        let level = match decision {
            GateDecision::ForceLevel(level) => level,
            _ => translate::response_level(snapshot),
        };
        let record = translate::response_record(snapshot, level, self.default_props.as_ref());
        self.response_logger.write(&record)?;
        Ok(())
    }
}
