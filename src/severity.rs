use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Severity of a log record, totally ordered by numeric value.
///
/// The numeric values are part of the wire contract: every emitted line
/// carries `"level": <value>`. `Silent` is a threshold-only level that
/// disables a logger entirely; no record is ever emitted at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Trace = 10,
    Debug = 20,
    Info = 30,
    Warn = 40,
    Error = 50,
    Fatal = 60,
    Silent = 255,
}

impl Severity {
    /// Numeric value used in the `level` field of emitted lines.
    pub fn value(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Trace => "trace",
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
            Severity::Silent => "silent",
        }
    }

    pub fn from_value(value: u8) -> Option<Severity> {
        match value {
            10 => Some(Severity::Trace),
            20 => Some(Severity::Debug),
            30 => Some(Severity::Info),
            40 => Some(Severity::Warn),
            50 => Some(Severity::Error),
            60 => Some(Severity::Fatal),
            255 => Some(Severity::Silent),
            _ => None,
        }
    }

    /// The levels a record can actually be emitted at, ascending.
    pub const EMITTING: [Severity; 6] = [
        Severity::Trace,
        Severity::Debug,
        Severity::Info,
        Severity::Warn,
        Severity::Error,
        Severity::Fatal,
    ];
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a level name cannot be parsed.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown severity level: {0:?}")]
pub struct UnknownLevel(pub String);

impl FromStr for Severity {
    type Err = UnknownLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trace" => Ok(Severity::Trace),
            "debug" => Ok(Severity::Debug),
            "info" => Ok(Severity::Info),
            "warn" => Ok(Severity::Warn),
            "error" => Ok(Severity::Error),
            "fatal" => Ok(Severity::Fatal),
            "silent" => Ok(Severity::Silent),
            other => Err(UnknownLevel(other.to_string())),
        }
    }
}

/// Mapping from free-form tag strings to severities.
///
/// Built once at adapter construction and read-only afterwards: the six
/// emitting level names map to themselves, then user overrides are laid
/// on top. Lookups are exact, case-sensitive string matches.
#[derive(Debug, Clone)]
pub struct TagLevelMap {
    map: BTreeMap<String, Severity>,
}

impl TagLevelMap {
    pub fn build(overrides: &BTreeMap<String, Severity>) -> Self {
        let mut map = BTreeMap::new();
        for level in Severity::EMITTING {
            map.insert(level.as_str().to_string(), level);
        }
        for (tag, level) in overrides {
            map.insert(tag.clone(), *level);
        }
        TagLevelMap { map }
    }

    pub fn get(&self, tag: &str) -> Option<Severity> {
        self.map.get(tag).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Severity)> {
        self.map.iter().map(|(tag, level)| (tag.as_str(), *level))
    }
}

impl Default for TagLevelMap {
    fn default() -> Self {
        TagLevelMap::build(&BTreeMap::new())
    }
}

/// Compute the effective severity for a tagged event: the most severe
/// matched tag wins, unmatched tags are ignored, and `default` applies
/// when nothing matched at all.
pub fn resolve_level(tags: &[String], default: Severity, map: &TagLevelMap) -> Severity {
    let mut best: Option<Severity> = None;
    for tag in tags {
        if let Some(level) = map.get(tag) {
            if best.map_or(true, |b| level > b) {
                best = Some(level);
            }
        }
    }
    best.unwrap_or(default)
}
