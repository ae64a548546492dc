use crate::model::OptionId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// Plain scalar attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Boolean(bool),
    Number(Number),
    Text(String),
}

impl ScalarValue {
    pub fn to_json(&self) -> Value {
        match self {
            ScalarValue::Boolean(b) => Value::Bool(*b),
            ScalarValue::Number(n) => Value::Number(n.clone()),
            ScalarValue::Text(s) => Value::String(s.clone()),
        }
    }

    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(ScalarValue::Boolean(*b)),
            Value::Number(n) => Some(ScalarValue::Number(n.clone())),
            Value::String(s) => Some(ScalarValue::Text(s.clone())),
            _ => None,
        }
    }
}

/// Reference to an attribute option. Any subset of the fields may be known.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OptionRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<OptionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl OptionRef {
    pub fn by_code(code: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            ..Self::default()
        }
    }

    pub fn by_id(id: OptionId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    fn from_object(map: &Map<String, Value>) -> Option<Self> {
        let id = map.get("id").and_then(|v| match v {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        });
        let code = map.get("code").and_then(Value::as_str).map(str::to_string);
        let label = map.get("label").and_then(Value::as_str).map(str::to_string);
        let value = map.get("value").filter(|v| !v.is_null()).cloned();

        if id.is_none() && code.is_none() && label.is_none() && value.is_none() {
            return None;
        }
        Some(Self {
            id,
            code,
            label,
            value,
        })
    }

    fn to_json(&self) -> Value {
        let mut map = Map::new();
        if let Some(id) = self.id {
            map.insert("id".to_string(), Value::from(id));
        }
        if let Some(code) = &self.code {
            map.insert("code".to_string(), Value::String(code.clone()));
        }
        if let Some(label) = &self.label {
            map.insert("label".to_string(), Value::String(label.clone()));
        }
        if let Some(value) = &self.value {
            map.insert("value".to_string(), value.clone());
        }
        Value::Object(map)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementUnit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub symbol: String,
}

/// Metric value with its unit, stored as `{value, unit: {id, symbol}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub value: Number,
    pub unit: MeasurementUnit,
}

impl Measurement {
    fn from_object(map: &Map<String, Value>) -> Option<Self> {
        let value = match map.get("value")? {
            Value::Number(n) => n.clone(),
            Value::String(s) => serde_json::from_str::<Number>(s.trim()).ok()?,
            _ => return None,
        };
        let unit = match map.get("unit")? {
            Value::String(symbol) => MeasurementUnit {
                id: None,
                symbol: symbol.clone(),
            },
            Value::Object(unit) => MeasurementUnit {
                id: unit.get("id").and_then(Value::as_i64),
                symbol: unit
                    .get("symbol")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            },
            _ => return None,
        };
        Some(Self { value, unit })
    }

    fn to_json(&self) -> Value {
        let mut unit = Map::new();
        if let Some(id) = self.unit.id {
            unit.insert("id".to_string(), Value::from(id));
        }
        unit.insert("symbol".to_string(), Value::String(self.unit.symbol.clone()));

        let mut map = Map::new();
        map.insert("value".to_string(), Value::Number(self.value.clone()));
        map.insert("unit".to_string(), Value::Object(unit));
        Value::Object(map)
    }
}

/// An attribute value in one of the shapes the catalog stores
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Scalar(ScalarValue),
    OptionRef(OptionRef),
    Measurement(Measurement),
}

impl AttributeValue {
    pub fn text(value: impl Into<String>) -> Self {
        AttributeValue::Scalar(ScalarValue::Text(value.into()))
    }

    pub fn number(value: impl Into<Number>) -> Self {
        AttributeValue::Scalar(ScalarValue::Number(value.into()))
    }

    pub fn boolean(value: bool) -> Self {
        AttributeValue::Scalar(ScalarValue::Boolean(value))
    }

    pub fn option(id: OptionId, code: impl Into<String>, label: impl Into<String>) -> Self {
        AttributeValue::OptionRef(OptionRef {
            id: Some(id),
            code: Some(code.into()),
            label: Some(label.into()),
            value: None,
        })
    }

    pub fn option_code(code: impl Into<String>) -> Self {
        AttributeValue::OptionRef(OptionRef::by_code(code))
    }

    pub fn measurement(value: impl Into<Number>, unit_id: Option<i64>, symbol: impl Into<String>) -> Self {
        AttributeValue::Measurement(Measurement {
            value: value.into(),
            unit: MeasurementUnit {
                id: unit_id,
                symbol: symbol.into(),
            },
        })
    }

    /// Classify an externally supplied JSON value by its shape.
    ///
    /// Strings holding a JSON string literal or object are unwrapped one level,
    /// so `"\"red\""` reads as `"red"`. Returns `None` for null and arrays.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null | Value::Array(_) => None,
            Value::String(s) => match unwrap_json_string(s) {
                Some(inner) => Self::classify(&inner),
                None => Some(AttributeValue::text(s.clone())),
            },
            other => Self::classify(other),
        }
    }

    fn classify(value: &Value) -> Option<Self> {
        match value {
            Value::Object(map) => {
                if map.contains_key("unit") {
                    if let Some(measurement) = Measurement::from_object(map) {
                        return Some(AttributeValue::Measurement(measurement));
                    }
                }
                OptionRef::from_object(map).map(AttributeValue::OptionRef)
            }
            other => ScalarValue::from_json(other).map(AttributeValue::Scalar),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            AttributeValue::Scalar(s) => s.to_json(),
            AttributeValue::OptionRef(r) => r.to_json(),
            AttributeValue::Measurement(m) => m.to_json(),
        }
    }

    /// Reduce to a comparable form: option references collapse to their id
    /// (or code when no id is known); every other shape passes through.
    pub fn normalize(&self) -> Value {
        match self {
            AttributeValue::OptionRef(OptionRef { id: Some(id), .. }) => Value::from(*id),
            AttributeValue::OptionRef(OptionRef {
                code: Some(code), ..
            }) => Value::String(code.clone()),
            AttributeValue::OptionRef(OptionRef {
                value: Some(value),
                ..
            }) => value.clone(),
            other => other.to_json(),
        }
    }
}

/// Parse a string that itself carries a JSON string literal or object.
pub(crate) fn unwrap_json_string(s: &str) -> Option<Value> {
    let trimmed = s.trim_start();
    if !(trimmed.starts_with('"') || trimmed.starts_with('{')) {
        return None;
    }
    serde_json::from_str::<Value>(s).ok()
}
