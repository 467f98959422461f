//! Facet configuration and attribute classification.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::schema::{AttributeMeta, AttributeType, EntityMeta};

/// Kind of summary a facet produces.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FacetKind {
    /// Distinct values with occurrence counts.
    List,
    /// Min/max/count over a numeric attribute.
    Range,
    /// A kind this crate does not know how to compute.
    Other(String),
}

impl FacetKind {
    pub fn as_str(&self) -> &str {
        match self {
            FacetKind::List => "list",
            FacetKind::Range => "range",
            FacetKind::Other(name) => name,
        }
    }
}

impl fmt::Display for FacetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for FacetKind {
    fn from(name: String) -> Self {
        match name.as_str() {
            "list" => FacetKind::List,
            "range" => FacetKind::Range,
            _ => FacetKind::Other(name),
        }
    }
}

impl From<FacetKind> for String {
    fn from(kind: FacetKind) -> Self {
        kind.as_str().to_string()
    }
}

/// One configured list value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueOption {
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Carried through to the output item.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ValueOption {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            label: None,
            extra: Map::new(),
        }
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }
}

/// Shape hints for range bounds. A present hint turns the bound into
/// `{...hint, "value": bound}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RangeHints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValuesConfig {
    /// Ordered allow-list of list values.
    List(Vec<ValueOption>),
    Range(RangeHints),
}

/// Configuration of one facet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetConfig {
    /// Logical attribute name.
    #[serde(default)]
    pub key: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<FacetKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "values_config", default, skip_serializing_if = "Option::is_none")]
    pub values: Option<ValuesConfig>,
    /// Unrecognized keys, copied onto the facet result.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FacetConfig {
    /// Config with the kind left for the classifier to derive.
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            kind: None,
            title: None,
            values: None,
            extra: Map::new(),
        }
    }

    pub fn list(key: &str) -> Self {
        Self::new(key).with_kind(FacetKind::List)
    }

    pub fn range(key: &str) -> Self {
        Self::new(key).with_kind(FacetKind::Range)
    }

    pub fn with_kind(mut self, kind: FacetKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    pub fn with_values(mut self, values: Vec<ValueOption>) -> Self {
        self.values = Some(ValuesConfig::List(values));
        self
    }

    pub fn with_range_hints(mut self, hints: RangeHints) -> Self {
        self.values = Some(ValuesConfig::Range(hints));
        self
    }

    pub fn value_options(&self) -> Option<&[ValueOption]> {
        match &self.values {
            Some(ValuesConfig::List(options)) => Some(options),
            _ => None,
        }
    }

    pub fn range_hints(&self) -> Option<&RangeHints> {
        match &self.values {
            Some(ValuesConfig::Range(hints)) => Some(hints),
            _ => None,
        }
    }
}

/// Facet kind for a declared type; `None` excludes the attribute.
pub fn classify(kind: &AttributeType) -> Option<FacetKind> {
    match kind {
        AttributeType::String | AttributeType::Boolean | AttributeType::Enumeration => {
            Some(FacetKind::List)
        }
        AttributeType::Integer
        | AttributeType::BigInteger
        | AttributeType::Decimal
        | AttributeType::Float => Some(FacetKind::Range),
        _ => None,
    }
}

/// Like [`classify`], but the entity's identity attribute is always excluded.
pub fn classify_attribute(meta: &EntityMeta, attribute: &AttributeMeta) -> Option<FacetKind> {
    if attribute.name == meta.id_attribute {
        return None;
    }
    classify(&attribute.kind)
}

/// Effective facet list for a request.
///
/// With an explicit config, entries without a key or with an unknown key are
/// dropped and missing kinds are derived. Without one, every eligible
/// attribute (optionally restricted to `fields`) becomes a facet, in
/// declaration order.
pub fn build_config(
    meta: &EntityMeta,
    explicit: Option<&[FacetConfig]>,
    fields: Option<&[String]>,
) -> Vec<FacetConfig> {
    match explicit {
        Some(configs) => configs
            .iter()
            .filter_map(|config| {
                if config.key.is_empty() {
                    return None;
                }
                let attribute = meta.attribute(&config.key)?;
                let mut config = config.clone();
                if config.kind.is_none() {
                    config.kind = Some(classify_attribute(meta, attribute)?);
                }
                Some(config)
            })
            .collect(),
        None => meta
            .attributes
            .iter()
            .filter(|a| fields.map_or(true, |f| f.iter().any(|name| *name == a.name)))
            .filter_map(|a| {
                classify_attribute(meta, a).map(|kind| FacetConfig::new(&a.name).with_kind(kind))
            })
            .collect(),
    }
}
