//! Named configuration sources and their precedence.
//!
//! A [`PropertySources`] collection is searched in insertion order; the first
//! source holding a name wins. Lookups may be restricted to a subset of the
//! sources by name, which avoids walking large configuration trees.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use serde_yaml::Value;

use crate::error::SourceError;

/// Resolves a configuration name to its raw value.
pub trait PropertyResolver: Debug + Send + Sync {
    /// Look `name` up, searching only the sources named in `sources` unless it
    /// is empty.
    fn lookup(&self, name: &str, sources: &[String]) -> Option<String>;
}

/// A single named source of raw configuration values.
pub trait PropertySource: Debug + Send + Sync {
    fn name(&self) -> &str;

    fn get(&self, key: &str) -> Option<String>;
}

/// An ordered set of property sources, highest precedence first.
#[derive(Debug, Default, Clone)]
pub struct PropertySources {
    sources: Vec<Arc<dyn PropertySource>>,
}

impl PropertySources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a source with lower precedence than those already present.
    pub fn with_source(mut self, source: impl PropertySource + 'static) -> Self {
        self.push(Arc::new(source));
        self
    }

    pub fn push(&mut self, source: Arc<dyn PropertySource>) {
        self.sources.push(source);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(|source| source.name())
    }
}

impl PropertyResolver for PropertySources {
    fn lookup(&self, name: &str, sources: &[String]) -> Option<String> {
        self.sources
            .iter()
            .filter(|source| sources.is_empty() || sources.iter().any(|s| s == source.name()))
            .find_map(|source| source.get(name))
    }
}

/// An in-memory source whose values may change at runtime.
#[derive(Debug)]
pub struct MapSource {
    name: String,
    values: DashMap<String, String>,
}

impl MapSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: DashMap::new(),
        }
    }

    pub fn with(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        self.values.remove(key).map(|(_, value)| value)
    }
}

impl PropertySource for MapSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).map(|value| value.clone())
    }
}

// Shared sources can be registered while the caller keeps a handle to update
// them.
impl<T: PropertySource> PropertySource for Arc<T> {
    fn name(&self) -> &str {
        self.as_ref().name()
    }

    fn get(&self, key: &str) -> Option<String> {
        self.as_ref().get(key)
    }
}

/// The process environment.
///
/// Names are mapped the relaxed way: `features.search-rollout` is read from
/// `FEATURES_SEARCH_ROLLOUT`, behind an optional prefix such as `APP_`.
#[derive(Debug, Clone)]
pub struct EnvSource {
    prefix: String,
}

impl EnvSource {
    pub const NAME: &'static str = "environment";

    pub fn new() -> Self {
        Self {
            prefix: String::new(),
        }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    fn variable(&self, key: &str) -> String {
        let mapped: String = key
            .chars()
            .map(|c| match c {
                '.' | '-' => '_',
                c => c.to_ascii_uppercase(),
            })
            .collect();
        format!("{}{}", self.prefix, mapped)
    }
}

impl Default for EnvSource {
    fn default() -> Self {
        Self::new()
    }
}

impl PropertySource for EnvSource {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key)
            .or_else(|_| std::env::var(self.variable(key)))
            .ok()
    }
}

/// A YAML document flattened into dotted keys.
///
/// ```yaml
/// features:
///   search:
///     rollout: 25%
/// ```
///
/// exposes `features.search.rollout = "25%"`. Sequences are indexed as
/// `name[0]`, `name[1]`, ...
#[derive(Debug, Clone)]
pub struct YamlSource {
    name: String,
    values: BTreeMap<String, String>,
}

impl YamlSource {
    pub fn from_str(name: impl Into<String>, document: &str) -> Result<Self, SourceError> {
        let root: Value = serde_yaml::from_str(document)?;
        let mut values = BTreeMap::new();
        match root {
            Value::Mapping(_) => flatten(None, &root, &mut values),
            Value::Null => {}
            _ => return Err(SourceError::NotAMapping),
        }
        Ok(Self {
            name: name.into(),
            values,
        })
    }

    /// Load a YAML file, naming the source after its path.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let document = std::fs::read_to_string(path).map_err(|source| SourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let source = Self::from_str(path.display().to_string(), &document)?;
        tracing::debug!(
            source = %source.name,
            properties = source.values.len(),
            "loaded yaml property source"
        );
        Ok(source)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl PropertySource for YamlSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

fn flatten(prefix: Option<&str>, value: &Value, out: &mut BTreeMap<String, String>) {
    let join = |segment: &str| match prefix {
        Some(prefix) => format!("{prefix}.{segment}"),
        None => segment.to_string(),
    };

    match value {
        Value::Mapping(mapping) => {
            for (key, value) in mapping {
                if let Some(segment) = scalar(key) {
                    flatten(Some(&join(&segment)), value, out);
                }
            }
        }
        Value::Sequence(items) => {
            let prefix = prefix.unwrap_or_default();
            for (index, item) in items.iter().enumerate() {
                flatten(Some(&format!("{prefix}[{index}]")), item, out);
            }
        }
        Value::Tagged(tagged) => flatten(prefix, &tagged.value, out),
        scalar_value => {
            if let (Some(prefix), Some(text)) = (prefix, scalar(scalar_value)) {
                out.insert(prefix.to_string(), text);
            }
        }
    }
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
