//! Entity metadata: logical attribute names, physical columns and declared
//! scalar types.
//!
//! The catalog itself belongs to the host. [`StaticCatalog`] is a plain
//! in-memory implementation for hosts that register their schemes up front.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Attribute holding the publication timestamp of draftable entities.
pub const PUBLISHED_AT: &str = "publishedAt";

/// Declared scalar type of an attribute, as named by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AttributeType {
    String,
    Text,
    RichText,
    Email,
    Password,
    Uid,
    Boolean,
    Enumeration,
    Integer,
    BigInteger,
    Decimal,
    Float,
    Date,
    Time,
    DateTime,
    Timestamp,
    Json,
    Media,
    Relation,
    Other(String),
}

impl AttributeType {
    pub fn as_str(&self) -> &str {
        match self {
            AttributeType::String => "string",
            AttributeType::Text => "text",
            AttributeType::RichText => "richtext",
            AttributeType::Email => "email",
            AttributeType::Password => "password",
            AttributeType::Uid => "uid",
            AttributeType::Boolean => "boolean",
            AttributeType::Enumeration => "enumeration",
            AttributeType::Integer => "integer",
            AttributeType::BigInteger => "biginteger",
            AttributeType::Decimal => "decimal",
            AttributeType::Float => "float",
            AttributeType::Date => "date",
            AttributeType::Time => "time",
            AttributeType::DateTime => "datetime",
            AttributeType::Timestamp => "timestamp",
            AttributeType::Json => "json",
            AttributeType::Media => "media",
            AttributeType::Relation => "relation",
            AttributeType::Other(name) => name,
        }
    }

    /// Whether values of this type live in a column of the entity's own table.
    pub fn is_scalar(&self) -> bool {
        !matches!(self, AttributeType::Media | AttributeType::Relation)
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for AttributeType {
    fn from(name: String) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "string" => AttributeType::String,
            "text" => AttributeType::Text,
            "richtext" => AttributeType::RichText,
            "email" => AttributeType::Email,
            "password" => AttributeType::Password,
            "uid" => AttributeType::Uid,
            "boolean" => AttributeType::Boolean,
            "enumeration" => AttributeType::Enumeration,
            "integer" => AttributeType::Integer,
            "biginteger" => AttributeType::BigInteger,
            "decimal" => AttributeType::Decimal,
            "float" => AttributeType::Float,
            "date" => AttributeType::Date,
            "time" => AttributeType::Time,
            "datetime" => AttributeType::DateTime,
            "timestamp" => AttributeType::Timestamp,
            "json" => AttributeType::Json,
            "media" => AttributeType::Media,
            "relation" => AttributeType::Relation,
            _ => AttributeType::Other(name),
        }
    }
}

impl From<AttributeType> for String {
    fn from(kind: AttributeType) -> Self {
        kind.as_str().to_string()
    }
}

impl FromStr for AttributeType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(AttributeType::from(s.to_string()))
    }
}

/// One attribute of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeMeta {
    /// Logical attribute name used by callers.
    pub name: String,
    /// Physical column name.
    pub column: String,
    #[serde(rename = "type")]
    pub kind: AttributeType,
}

impl AttributeMeta {
    pub fn new(name: &str, column: &str, kind: AttributeType) -> Self {
        Self {
            name: name.to_string(),
            column: column.to_string(),
            kind,
        }
    }
}

/// Metadata for one entity type.
///
/// Attributes keep their declaration order, which drives the order of
/// auto-derived facets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMeta {
    pub uid: String,
    pub table_name: String,
    #[serde(default = "default_id_attribute")]
    pub id_attribute: String,
    pub attributes: Vec<AttributeMeta>,
}

fn default_id_attribute() -> String {
    "id".to_string()
}

impl EntityMeta {
    pub fn new(uid: &str, table_name: &str) -> Self {
        Self {
            uid: uid.to_string(),
            table_name: table_name.to_string(),
            id_attribute: default_id_attribute(),
            attributes: Vec::new(),
        }
    }

    /// Appends an attribute. Chainable, for building fixtures and static schemes.
    pub fn attribute_with(mut self, name: &str, column: &str, kind: AttributeType) -> Self {
        self.attributes.push(AttributeMeta::new(name, column, kind));
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeMeta> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    pub fn column_for(&self, name: &str) -> Option<&str> {
        self.attribute(name).map(|a| a.column.as_str())
    }

    /// Like [`EntityMeta::column_for`] but fails for unknown attributes.
    /// The identity attribute resolves even when the catalog does not list it.
    pub fn require_column(&self, name: &str) -> Result<&str> {
        if let Some(column) = self.column_for(name) {
            return Ok(column);
        }
        if name == self.id_attribute {
            return Ok(&self.id_attribute);
        }
        Err(Error::UnknownAttribute {
            uid: self.uid.clone(),
            attribute: name.to_string(),
        })
    }

    /// Reverse lookup: physical column to logical attribute name.
    pub fn attribute_for_column(&self, column: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.column == column)
            .map(|a| a.name.as_str())
    }

    pub fn id_column(&self) -> &str {
        self.column_for(&self.id_attribute)
            .unwrap_or(self.id_attribute.as_str())
    }

    /// Column to attribute map for remapping result rows.
    pub fn column_to_attribute(&self) -> HashMap<&str, &str> {
        self.attributes
            .iter()
            .map(|a| (a.column.as_str(), a.name.as_str()))
            .collect()
    }
}

/// Source of entity metadata.
pub trait MetadataCatalog: Send + Sync {
    fn metadata(&self, uid: &str) -> Option<Arc<EntityMeta>>;

    fn require(&self, uid: &str) -> Result<Arc<EntityMeta>> {
        self.metadata(uid)
            .ok_or_else(|| Error::UnknownEntity(uid.to_string()))
    }
}

/// HashMap-backed catalog.
#[derive(Debug, Default, Clone)]
pub struct StaticCatalog {
    entities: HashMap<String, Arc<EntityMeta>>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, meta: EntityMeta) -> &mut Self {
        self.entities.insert(meta.uid.clone(), Arc::new(meta));
        self
    }

    pub fn with(mut self, meta: EntityMeta) -> Self {
        self.register(meta);
        self
    }
}

impl MetadataCatalog for StaticCatalog {
    fn metadata(&self, uid: &str) -> Option<Arc<EntityMeta>> {
        self.entities.get(uid).cloned()
    }
}
