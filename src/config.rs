use crate::logger::LineEnding;
use crate::paths::RoutePropertyMap;
use crate::severity::{Severity, UnknownLevel};
use crate::stream::{LogStream, StderrStream, StdoutStream};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Error type returned when adapter configuration is invalid.
///
/// Configuration problems are fatal at setup time and surface
/// synchronously to the caller; nothing here is ever silently ignored.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("invalid level for tag {tag:?}: {source}")]
    InvalidTagLevel {
        tag: String,
        source: UnknownLevel,
    },

    #[error("invalid threshold: {0}")]
    InvalidThreshold(#[from] UnknownLevel),

    #[error("property map {section} entry has an empty field name")]
    EmptyPropertyField { section: String },

    #[error("property map {section}.{field} has an empty path segment")]
    InvalidPropertyPath { section: String, field: String },
}

/// Where a logger writes.
///
/// The standard handles use the locked fast-path writers; a custom
/// stream takes the generic path and owns its own buffering.
#[derive(Clone)]
pub enum Destination {
    Stdout,
    Stderr,
    Stream(Arc<dyn LogStream>),
}

impl Destination {
    pub(crate) fn into_stream(self) -> Arc<dyn LogStream> {
        match self {
            Destination::Stdout => Arc::new(StdoutStream),
            Destination::Stderr => Arc::new(StderrStream),
            Destination::Stream(stream) => stream,
        }
    }
}

/// Adapter configuration.
///
/// **Fields**
/// - `response_level` / `event_level`: initial thresholds of the two
///   loggers; both stay runtime mutable through the logger handles.
/// - `response_destination` / `event_destination`: output streams;
///   defaults are process stdout for response lines and stderr for
///   everything else.
/// - `line_ending`: terminator appended to every line.
/// - `tag_levels`: user tag-to-severity overrides laid over the
///   built-in level names.
/// - `default_route_props`: server-wide property map used when a
///   matched route carries none.
/// - `include_stack`: whether error records carry stack fields.
#[derive(Clone)]
pub struct AdapterConfig {
    pub response_level: Severity,
    pub event_level: Severity,
    pub response_destination: Destination,
    pub event_destination: Destination,
    pub line_ending: LineEnding,
    pub tag_levels: BTreeMap<String, Severity>,
    pub default_route_props: Option<RoutePropertyMap>,
    pub include_stack: bool,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        AdapterConfig {
            response_level: Severity::Info,
            event_level: Severity::Info,
            response_destination: Destination::Stdout,
            event_destination: Destination::Stderr,
            line_ending: LineEnding::Lf,
            tag_levels: BTreeMap::new(),
            default_route_props: None,
            include_stack: true,
        }
    }
}

impl AdapterConfig {
    pub fn with_tag_level(mut self, tag: impl Into<String>, level: Severity) -> Self {
        self.tag_levels.insert(tag.into(), level);
        self
    }

    pub fn with_levels(mut self, response: Severity, event: Severity) -> Self {
        self.response_level = response;
        self.event_level = event;
        self
    }

    /// Parse and install a tag override from level-name strings, as
    /// they arrive from external configuration.
    pub fn with_tag_level_name(
        mut self,
        tag: impl Into<String>,
        level: &str,
    ) -> Result<Self, ConfigError> {
        let tag = tag.into();
        let level = level.parse().map_err(|source| ConfigError::InvalidTagLevel {
            tag: tag.clone(),
            source,
        })?;
        self.tag_levels.insert(tag, level);
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(props) = &self.default_route_props {
            props.validate()?;
        }
        Ok(())
    }
}
