use crate::model::{
    AttributeId, AttributeKind, AttributeValue, AxisId, FamilyId, FamilyVariantId, OptionId,
    OptionRef, ScalarValue,
};
use serde::{Deserialize, Serialize};

/// Attribute definition (a column in the EAV sense)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub id: AttributeId,
    pub code: String,
    #[serde(default)]
    pub label: Option<String>,
    pub kind: AttributeKind,
}

impl Attribute {
    /// Label for display, falling back to the code
    pub fn display_label(&self) -> &str {
        self.label
            .as_deref()
            .filter(|l| !l.trim().is_empty())
            .unwrap_or(&self.code)
    }
}

/// A selectable value of an attribute (e.g. "red" for color)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeOption {
    pub id: OptionId,
    pub attribute_id: AttributeId,
    pub code: String,
    pub label: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

impl AttributeOption {
    /// The value a variant stores for this option, shaped for the attribute kind.
    pub fn to_value(&self, kind: AttributeKind) -> AttributeValue {
        match kind {
            AttributeKind::Select => AttributeValue::OptionRef(OptionRef {
                id: Some(self.id),
                code: Some(self.code.clone()),
                label: Some(self.label.clone()),
                value: None,
            }),
            AttributeKind::Measurement => match AttributeValue::from_json(&self.value) {
                Some(m @ AttributeValue::Measurement(_)) => m,
                _ => AttributeValue::text(self.code.clone()),
            },
            _ => ScalarValue::from_json(&self.value)
                .map(AttributeValue::Scalar)
                .unwrap_or_else(|| AttributeValue::text(self.code.clone())),
        }
    }
}

/// One variant-defining attribute of a family variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantAxis {
    /// Axis row id; selection configurations are keyed by it
    pub id: AxisId,
    pub attribute_id: AttributeId,
    pub attribute_code: String,
    pub sort_order: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyVariant {
    pub id: FamilyVariantId,
    #[serde(default)]
    pub family_id: Option<FamilyId>,
    pub code: String,
    /// Axes as stored; not necessarily sorted
    pub axes: Vec<VariantAxis>,
}
