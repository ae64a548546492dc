use crate::model::{AttributeId, ScalarValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Attribute entry of a prepared variant payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreparedAttribute {
    #[serde(alias = "attributeId")]
    pub attribute_id: AttributeId,
    #[serde(default)]
    pub value: Value,
}

impl PreparedAttribute {
    pub fn new(attribute_id: AttributeId, value: Value) -> Self {
        Self {
            attribute_id,
            value,
        }
    }
}

/// Externally prepared description of one desired variant and its overrides
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PreparedVariant {
    #[serde(default)]
    pub attributes: Vec<PreparedAttribute>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<ScalarValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Media file id to attach as the variant's base image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl PreparedVariant {
    pub fn with_attributes(attributes: Vec<PreparedAttribute>) -> Self {
        Self {
            attributes,
            ..Self::default()
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn price(mut self, price: ScalarValue) -> Self {
        self.price = Some(price);
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn image(mut self, media_id: impl Into<String>) -> Self {
        self.image = Some(media_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_prepared_variant_deserializes_request_payload() {
        let payload = json!({
            "attributes": [
                {"attribute_id": 1, "value": {"id": 10, "code": "red", "label": "Red"}},
                {"attributeId": 2, "value": "s"}
            ],
            "name": "Tee red S",
            "price": 19.9,
            "enabled": true,
            "image": "file-1"
        });
        let prepared: PreparedVariant = serde_json::from_value(payload).unwrap();
        assert_eq!(prepared.attributes.len(), 2);
        assert_eq!(prepared.attributes[1].attribute_id, 2);
        assert!(matches!(prepared.price, Some(ScalarValue::Number(_))));
        assert_eq!(prepared.enabled, Some(true));
        assert_eq!(prepared.image.as_deref(), Some("file-1"));
    }

    #[test]
    fn test_minimal_payload() {
        let prepared: PreparedVariant = serde_json::from_value(json!({})).unwrap();
        assert!(prepared.attributes.is_empty());
        assert_eq!(prepared.name, None);
        assert_eq!(prepared.price, None);
    }
}
