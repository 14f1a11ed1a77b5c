//! The three-layer run context: `static`, `profile`, `runtime`.
//!
//! Values are a tagged variant over JSON's shape (string, number, bool,
//! array, map, null) rather than a bare `serde_json::Value` at every call
//! site. `ContextValue` still (de)serializes losslessly to and from
//! `serde_json::Value` for storage in the `runs.context` JSON column.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// A single value living in one of the three context layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Array(Vec<ContextValue>),
    Map(BTreeMap<String, ContextValue>),
}

impl ContextValue {
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<Json> for ContextValue {
    fn from(value: Json) -> Self {
        match value {
            Json::Null => Self::Null,
            Json::Bool(b) => Self::Bool(b),
            Json::Number(n) => Self::Number(n),
            Json::String(s) => Self::String(s),
            Json::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            Json::Object(map) => {
                Self::Map(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<ContextValue> for Json {
    fn from(value: ContextValue) -> Self {
        match value {
            ContextValue::Null => Json::Null,
            ContextValue::Bool(b) => Json::Bool(b),
            ContextValue::Number(n) => Json::Number(n),
            ContextValue::String(s) => Json::String(s),
            ContextValue::Array(items) => Json::Array(items.into_iter().map(Json::from).collect()),
            ContextValue::Map(map) => {
                Json::Object(map.into_iter().map(|(k, v)| (k, Json::from(v))).collect())
            }
        }
    }
}

/// A single layer of context: a flat string-keyed map of JSON-shaped values.
pub type ContextLayer = BTreeMap<String, ContextValue>;

/// The three-layer run context. Precedence on merge: `runtime > profile >
/// static` (see GLOSSARY, "Context layers").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunContext {
    #[serde(default)]
    pub r#static: ContextLayer,
    #[serde(default)]
    pub profile: ContextLayer,
    #[serde(default)]
    pub runtime: ContextLayer,
}

impl RunContext {
    /// Build the initial context for a new run: empty `static`/`profile`,
    /// `runtime` seeded with the caller's inputs.
    #[must_use]
    pub fn from_inputs(inputs: ContextLayer) -> Self {
        Self {
            r#static: ContextLayer::new(),
            profile: ContextLayer::new(),
            runtime: inputs,
        }
    }

    /// Flatten all three layers into a single namespace, later layers
    /// overriding earlier ones on key conflict: `runtime` wins over
    /// `profile`, which wins over `static`.
    #[must_use]
    pub fn merge_namespace(&self) -> ContextLayer {
        let mut namespace = ContextLayer::new();
        namespace.extend(self.r#static.clone());
        namespace.extend(self.profile.clone());
        namespace.extend(self.runtime.clone());
        namespace
    }

    /// Resolve a variable by name, searching `static`, then `profile`, then
    /// `runtime`; the first layer containing the key wins. Note this is the
    /// *opposite* search order from `merge_namespace`'s override precedence:
    /// resolution stops at the first hit scanning static-first, while
    /// merging lets later layers win.
    #[must_use]
    pub fn resolve_variable(&self, name: &str) -> Option<&ContextValue> {
        self.r#static
            .get(name)
            .or_else(|| self.profile.get(name))
            .or_else(|| self.runtime.get(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(pairs: &[(&str, ContextValue)]) -> ContextLayer {
        pairs.iter().cloned().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn runtime_overrides_profile_overrides_static() {
        let ctx = RunContext {
            r#static: layer(&[("x", ContextValue::Number(1.into()))]),
            profile: layer(&[("x", ContextValue::Number(2.into()))]),
            runtime: layer(&[("x", ContextValue::Number(3.into()))]),
        };
        let ns = ctx.merge_namespace();
        assert_eq!(ns.get("x"), Some(&ContextValue::Number(3.into())));
    }

    #[test]
    fn resolve_variable_checks_static_first() {
        let ctx = RunContext {
            r#static: layer(&[("name", ContextValue::String("static-name".into()))]),
            profile: ContextLayer::new(),
            runtime: layer(&[("name", ContextValue::String("runtime-name".into()))]),
        };
        assert_eq!(
            ctx.resolve_variable("name").and_then(ContextValue::as_str),
            Some("static-name")
        );
    }

    #[test]
    fn resolve_variable_missing_returns_none() {
        let ctx = RunContext::default();
        assert!(ctx.resolve_variable("missing").is_none());
    }

    #[test]
    fn json_round_trip_preserves_shape() {
        let value = serde_json::json!({"a": 1, "b": [true, null, "s"]});
        let cv: ContextValue = value.clone().into();
        let back: Json = cv.into();
        assert_eq!(value, back);
    }
}
