use crate::config::ConfigError;
use crate::sanitize::RawValue;

/// A path into the request snapshot.
///
/// The dotted form covers the common case; the explicit-segment form is
/// for keys that themselves contain a literal dot (header names and the
/// like).
#[derive(Debug, Clone)]
pub enum PathSpec {
    Dotted(String),
    Segments(Vec<String>),
}

impl PathSpec {
    pub fn dotted(path: impl Into<String>) -> PathSpec {
        PathSpec::Dotted(path.into())
    }

    pub fn segments(&self) -> Vec<&str> {
        match self {
            PathSpec::Dotted(path) => path.split('.').collect(),
            PathSpec::Segments(parts) => parts.iter().map(String::as_str).collect(),
        }
    }
}

/// Per-route (or server-default) copies from the request snapshot into
/// the emitted `req`/`res` objects. Declaration order is assignment
/// order; a copied field overwrites a same-named default.
#[derive(Debug, Clone, Default)]
pub struct RoutePropertyMap {
    pub req: Vec<(String, PathSpec)>,
    pub res: Vec<(String, PathSpec)>,
}

impl RoutePropertyMap {
    /// Shape validation, run at setup/route-activation time. Invalid
    /// maps are a configuration error and fail construction outright.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (section, entries) in [("req", &self.req), ("res", &self.res)] {
            for (field, path) in entries.iter() {
                if field.is_empty() {
                    return Err(ConfigError::EmptyPropertyField {
                        section: section.to_string(),
                    });
                }
                let segments = path.segments();
                if segments.is_empty() || segments.iter().any(|s| s.is_empty()) {
                    return Err(ConfigError::InvalidPropertyPath {
                        section: section.to_string(),
                        field: field.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Walk a segment path through an object tree. Missing keys, non-object
/// intermediate values and an explicit null all resolve to `None`,
/// which the caller turns into "no field emitted".
pub fn resolve(root: &RawValue, segments: &[&str]) -> Option<RawValue> {
    let mut current = root.clone();
    for segment in segments {
        current = current.get(segment)?;
    }
    match current {
        RawValue::Null => None,
        found => Some(found),
    }
}
