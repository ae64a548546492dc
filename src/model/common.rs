use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Product identifier (UUID string for variants, opaque for models)
pub type Id = String;

pub type AttributeId = i64;
pub type OptionId = i64;
pub type AxisId = i64;
pub type FamilyId = i64;
pub type FamilyVariantId = i64;

/// Storage kind of an attribute, drives how the codec reads and writes its values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeKind {
    Text,
    Number,
    Boolean,
    /// Option reference (single select)
    #[serde(alias = "option", alias = "dropdown")]
    Select,
    /// `{value, unit}` metric value
    #[serde(alias = "metric")]
    Measurement,
}

impl AttributeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeKind::Text => "text",
            AttributeKind::Number => "number",
            AttributeKind::Boolean => "boolean",
            AttributeKind::Select => "select",
            AttributeKind::Measurement => "measurement",
        }
    }

    /// Parse the kind column as stored. Unknown kinds read as text.
    pub fn from_stored(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "number" | "integer" | "decimal" | "price" => AttributeKind::Number,
            "boolean" | "bool" => AttributeKind::Boolean,
            "select" | "option" | "dropdown" | "simpleselect" => AttributeKind::Select,
            "measurement" | "metric" => AttributeKind::Measurement,
            _ => AttributeKind::Text,
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            AttributeKind::Text | AttributeKind::Number | AttributeKind::Boolean
        )
    }
}

pub fn generate_id() -> Id {
    Uuid::new_v4().to_string()
}
