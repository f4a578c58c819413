//! Declarative expectations: entity schemas and business rules.

use serde::{Deserialize, Serialize};

/// JSON type a field must carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
    /// RFC 3339 timestamp or `YYYY-MM-DD` date string.
    Timestamp,
    /// String restricted to `FieldSpec::values`.
    Enum,
}

impl FieldKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Number => "number",
            FieldKind::Integer => "integer",
            FieldKind::Boolean => "boolean",
            FieldKind::Object => "object",
            FieldKind::Array => "array",
            FieldKind::Timestamp => "timestamp",
            FieldKind::Enum => "enum",
        }
    }
}

/// One field of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,

    #[serde(rename = "type")]
    pub kind: FieldKind,

    #[serde(default)]
    pub required: bool,

    /// Allowed values for `enum` fields.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,

    /// Fields that may be explicitly null.
    #[serde(default)]
    pub nullable: bool,
}

impl FieldSpec {
    pub fn required(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
            values: Vec::new(),
            nullable: false,
        }
    }

    pub fn optional(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind)
        }
    }

    pub fn with_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.kind = FieldKind::Enum;
        self.values = values.into_iter().map(Into::into).collect();
        self
    }
}

/// Shape of a domain entity returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySchema {
    pub name: String,
    pub fields: Vec<FieldSpec>,
}

impl EntitySchema {
    pub fn new(name: impl Into<String>, fields: Vec<FieldSpec>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }
}

fn default_items() -> String {
    "items".to_string()
}

fn default_subtotal() -> String {
    "subtotal".to_string()
}

fn default_total() -> String {
    "total".to_string()
}

/// Domain consistency rule evaluated over a response body.
///
/// Field references are dotted paths (`order.total`, `items.0.price`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum BusinessRule {
    /// Sum of `items[].subtotal` equals `total` within 0.01.
    TotalMatchesItems {
        #[serde(default = "default_items")]
        items: String,
        #[serde(default = "default_subtotal")]
        subtotal: String,
        #[serde(default = "default_total")]
        total: String,
    },

    /// Numeric field must not be negative (stock levels, quantities).
    NonNegative { field: String },

    /// `price - cost` must not be negative.
    NonNegativeMargin { price: String, cost: String },

    /// Date at `earlier` must not come after the date at `later`.
    DateOrder { earlier: String, later: String },
}

impl BusinessRule {
    pub fn name(&self) -> &'static str {
        match self {
            BusinessRule::TotalMatchesItems { .. } => "total_matches_items",
            BusinessRule::NonNegative { .. } => "non_negative",
            BusinessRule::NonNegativeMargin { .. } => "non_negative_margin",
            BusinessRule::DateOrder { .. } => "date_order",
        }
    }
}
