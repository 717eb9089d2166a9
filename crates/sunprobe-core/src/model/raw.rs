// ── Raw extraction record ──
//
// Flat key -> number mapping produced by the extractor, before any
// semantic interpretation. Keys encode where a value was found.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// How a raw value was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionMethod {
    Json,
    HtmlScript,
    HtmlTable,
    HtmlText,
}

impl std::fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Json => "json",
            Self::HtmlScript => "html-script",
            Self::HtmlTable => "html-table",
            Self::HtmlText => "html-text",
        })
    }
}

/// One extracted number plus the method that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawValue {
    pub value: f64,
    pub method: ExtractionMethod,
}

/// Extracted values for one endpoint, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawExtractionRecord {
    pub endpoint: String,
    values: IndexMap<String, RawValue>,
}

impl RawExtractionRecord {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            values: IndexMap::new(),
        }
    }

    /// Build a record from key/value pairs sharing one method.
    pub fn from_pairs<K, I>(endpoint: impl Into<String>, method: ExtractionMethod, pairs: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, f64)>,
    {
        let mut record = Self::new(endpoint);
        for (key, value) in pairs {
            record.insert(key, value, method);
        }
        record
    }

    /// Insert a value. Non-finite numbers and duplicate keys are ignored.
    pub fn insert(&mut self, key: impl Into<String>, value: f64, method: ExtractionMethod) -> bool {
        if !value.is_finite() {
            return false;
        }
        let key = key.into();
        if self.values.contains_key(&key) {
            return false;
        }
        self.values.insert(key, RawValue { value, method });
        true
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).map(|raw| raw.value)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &RawValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Distinct extraction methods that contributed, in first-seen order.
    pub fn methods(&self) -> Vec<ExtractionMethod> {
        let mut seen = Vec::new();
        for raw in self.values.values() {
            if !seen.contains(&raw.method) {
                seen.push(raw.method);
            }
        }
        seen
    }
}
