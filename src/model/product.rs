use crate::error::ReconcileError;
use crate::model::{AttributeId, AxisId, FamilyId, FamilyVariantId, Id, OptionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductType {
    #[serde(rename = "product_model")]
    Model,
    #[serde(rename = "simple")]
    Simple,
}

impl ProductType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductType::Model => "product_model",
            ProductType::Simple => "simple",
        }
    }

    pub fn from_stored(value: &str) -> Option<Self> {
        match value {
            "product_model" => Some(ProductType::Model),
            "simple" => Some(ProductType::Simple),
            _ => None,
        }
    }
}

/// A row of the products collection as the engine reads it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Id,
    pub product_type: ProductType,
    #[serde(default)]
    pub family_id: Option<FamilyId>,
    #[serde(default)]
    pub family_variant_id: Option<FamilyVariantId>,
    #[serde(default)]
    pub parent_product_id: Option<Id>,
    #[serde(default)]
    pub enabled: bool,
    /// Axis id -> selected option ids, as an object or a JSON-encoded string
    #[serde(default)]
    pub variant_configuration: Option<Value>,
}

impl Product {
    pub fn model(id: impl Into<Id>, family_id: FamilyId, family_variant_id: FamilyVariantId) -> Self {
        Self {
            id: id.into(),
            product_type: ProductType::Model,
            family_id: Some(family_id),
            family_variant_id: Some(family_variant_id),
            parent_product_id: None,
            enabled: true,
            variant_configuration: None,
        }
    }
}

/// Where a model product's option selections come from
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionConfig {
    /// Structured `variant_configuration` value
    Configured(BTreeMap<AxisId, Vec<OptionId>>),
    /// Rows of the legacy product_variant_selections table
    Legacy,
}

impl SelectionConfig {
    /// Parse a stored `variant_configuration`. Anything unusable reads as `Legacy`.
    pub fn from_stored(product_id: &str, stored: Option<&Value>) -> Self {
        let Some(stored) = stored else {
            return SelectionConfig::Legacy;
        };

        let parsed = match stored {
            Value::Null => return SelectionConfig::Legacy,
            Value::String(text) if text.trim().is_empty() => return SelectionConfig::Legacy,
            Value::String(text) => match serde_json::from_str::<Value>(text) {
                Ok(value) => value,
                Err(e) => {
                    log::warn!(
                        "Error reading variant_configuration of product {}, falling back to selections: {}",
                        product_id,
                        e
                    );
                    return SelectionConfig::Legacy;
                }
            },
            other => other.clone(),
        };

        let Value::Object(map) = parsed else {
            log::warn!(
                "variant_configuration of product {} is not an object, falling back to selections",
                product_id
            );
            return SelectionConfig::Legacy;
        };

        let mut config = BTreeMap::new();
        for (axis_key, option_ids) in map {
            let Ok(axis_id) = axis_key.trim().parse::<AxisId>() else {
                log::debug!(
                    "Ignoring non-numeric axis key '{}' in variant_configuration of product {}",
                    axis_key,
                    product_id
                );
                continue;
            };
            let ids: Vec<OptionId> = match option_ids {
                Value::Array(items) => items
                    .iter()
                    .filter_map(|item| match item {
                        Value::Number(n) => n.as_i64(),
                        Value::String(s) => s.trim().parse().ok(),
                        _ => None,
                    })
                    .collect(),
                _ => Vec::new(),
            };
            config.insert(axis_id, ids);
        }
        SelectionConfig::Configured(config)
    }
}

/// A product validated to be a model, with its selection source parsed
#[derive(Debug, Clone, PartialEq)]
pub struct ModelProduct {
    pub id: Id,
    pub family_id: Option<FamilyId>,
    pub family_variant_id: Option<FamilyVariantId>,
    pub selection: SelectionConfig,
}

impl TryFrom<Product> for ModelProduct {
    type Error = ReconcileError;

    fn try_from(product: Product) -> Result<Self, Self::Error> {
        if product.product_type != ProductType::Model {
            return Err(ReconcileError::InvalidProductType {
                id: product.id,
                product_type: product.product_type.as_str().to_string(),
            });
        }
        let selection =
            SelectionConfig::from_stored(&product.id, product.variant_configuration.as_ref());
        Ok(Self {
            id: product.id,
            family_id: product.family_id,
            family_variant_id: product.family_variant_id,
            selection,
        })
    }
}

/// Storage-level EAV fact: one row per attribute per product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeValueRow {
    pub product_id: Id,
    pub attribute_id: AttributeId,
    pub encoded_value: String,
}

/// A variant product together with its stored attribute rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantProduct {
    pub id: Id,
    pub parent_product_id: Id,
    pub family_id: Option<FamilyId>,
    pub family_variant_id: Option<FamilyVariantId>,
    pub enabled: bool,
    pub attribute_values: Vec<AttributeValueRow>,
}

impl VariantProduct {
    pub fn value_of(&self, attribute_id: AttributeId) -> Option<&str> {
        self.attribute_values
            .iter()
            .find(|row| row.attribute_id == attribute_id)
            .map(|row| row.encoded_value.as_str())
    }
}

/// An attribute value already passed through the codec
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedAttribute {
    pub attribute_id: AttributeId,
    pub value: String,
}

/// Payload of an item-storage `createOne` on the products collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewVariantProduct {
    pub id: Id,
    pub parent_product_id: Id,
    pub family_id: Option<FamilyId>,
    pub family_variant_id: Option<FamilyVariantId>,
    pub enabled: bool,
    pub user_created: Option<String>,
    pub date_created: DateTime<Utc>,
    pub attributes: Vec<EncodedAttribute>,
}

/// Payload of an item-storage `updateOne`; only present fields are applied
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VariantUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<EncodedAttribute>,
}

impl VariantUpdate {
    pub fn is_empty(&self) -> bool {
        self.enabled.is_none() && self.attributes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_selection_config_from_object_and_string() {
        let object = json!({"1": [10, 11], "2": ["20"]});
        let expected = SelectionConfig::Configured(BTreeMap::from([
            (1, vec![10, 11]),
            (2, vec![20]),
        ]));
        assert_eq!(SelectionConfig::from_stored("p", Some(&object)), expected);

        let text = Value::String(object.to_string());
        assert_eq!(SelectionConfig::from_stored("p", Some(&text)), expected);
    }

    #[test]
    fn test_selection_config_malformed_falls_back_to_legacy() {
        let broken = Value::String("{not json".to_string());
        assert_eq!(
            SelectionConfig::from_stored("p", Some(&broken)),
            SelectionConfig::Legacy
        );
        assert_eq!(
            SelectionConfig::from_stored("p", Some(&json!([1, 2]))),
            SelectionConfig::Legacy
        );
        assert_eq!(SelectionConfig::from_stored("p", None), SelectionConfig::Legacy);
    }

    #[test]
    fn test_model_product_rejects_simple_products() {
        let mut product = Product::model("p-1", 1, 1);
        product.product_type = ProductType::Simple;
        let err = ModelProduct::try_from(product).unwrap_err();
        assert!(matches!(err, ReconcileError::InvalidProductType { .. }));
    }

    #[test]
    fn test_product_type_serde_names() {
        assert_eq!(
            serde_json::to_value(ProductType::Model).unwrap(),
            json!("product_model")
        );
        assert_eq!(ProductType::from_stored("simple"), Some(ProductType::Simple));
        assert_eq!(ProductType::from_stored("bundle"), None);
    }
}
