//! Value codec shared with the attribute filtering subsystem.
//!
//! Every attribute value row is written through [`encode`] and read back
//! through [`decode`]. Stored text written by other parties may not follow
//! the encoding, so decoding never fails: unreadable text comes back as the
//! raw string.

use crate::model::value::unwrap_json_string;
use crate::model::{AttributeKind, AttributeValue, OptionRef, ScalarValue};
use serde_json::{Number, Value};

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("malformed stored value: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("stored value is empty")]
    Empty,
    #[error("stored {found} does not fit a {kind} attribute")]
    ShapeMismatch {
        kind: &'static str,
        found: &'static str,
    },
}

/// Encode a value for storage under an attribute of `kind`.
pub fn encode(value: &AttributeValue, kind: AttributeKind) -> String {
    let stored = match value {
        AttributeValue::Scalar(scalar) => scalar.to_json(),
        AttributeValue::Measurement(_) => value.to_json(),
        AttributeValue::OptionRef(reference) if kind.is_scalar() => scalar_of_reference(reference),
        AttributeValue::OptionRef(reference) => identity_of_reference(reference),
    };
    stored.to_string()
}

/// Option references are stored by code, or by id when no code is known
fn identity_of_reference(reference: &OptionRef) -> Value {
    if let Some(code) = &reference.code {
        Value::String(code.clone())
    } else if let Some(id) = reference.id {
        Value::from(id)
    } else if let Some(value) = &reference.value {
        value.clone()
    } else {
        reference
            .label
            .clone()
            .map(Value::String)
            .unwrap_or(Value::Null)
    }
}

/// Under a scalar attribute an option stores its literal value
fn scalar_of_reference(reference: &OptionRef) -> Value {
    match &reference.value {
        Some(value) if ScalarValue::from_json(value).is_some() => value.clone(),
        _ => identity_of_reference(reference),
    }
}

/// Decode stored text, falling back to the raw string when it cannot be read.
pub fn decode(stored: &str, kind: AttributeKind) -> AttributeValue {
    match try_decode(stored, kind) {
        Ok(value) => value,
        Err(CodecError::ShapeMismatch { kind, found }) => {
            log::debug!("Stored {} read loosely for {} attribute", found, kind);
            serde_json::from_str::<Value>(stored)
                .ok()
                .and_then(|parsed| AttributeValue::from_json(&parsed))
                .unwrap_or_else(|| AttributeValue::text(stored))
        }
        Err(e) => {
            log::debug!("Keeping raw attribute value {:?}: {}", stored, e);
            AttributeValue::text(stored)
        }
    }
}

pub fn try_decode(stored: &str, kind: AttributeKind) -> Result<AttributeValue, CodecError> {
    let trimmed = stored.trim();
    if trimmed.is_empty() {
        return Err(CodecError::Empty);
    }
    let parsed: Value = serde_json::from_str(trimmed)?;
    interpret(parsed, kind, true)
}

/// Canonical re-encoding of stored text; `None` when it is already canonical.
pub fn canonicalize(stored: &str, kind: AttributeKind) -> Option<String> {
    let canonical = encode(&decode(stored, kind), kind);
    (canonical != stored).then_some(canonical)
}

/// Comparable form of a value, see [`AttributeValue::normalize`].
pub fn normalize(value: &AttributeValue) -> Value {
    value.normalize()
}

fn interpret(parsed: Value, kind: AttributeKind, unwrap: bool) -> Result<AttributeValue, CodecError> {
    let mismatch = |found: &Value| CodecError::ShapeMismatch {
        kind: kind.as_str(),
        found: json_type(found),
    };

    match (kind, parsed) {
        (_, Value::Null) => Err(CodecError::Empty),

        (AttributeKind::Text, Value::String(s)) => Ok(AttributeValue::text(s)),
        (AttributeKind::Text, Value::Number(n)) => Ok(AttributeValue::number(n)),
        (AttributeKind::Text, Value::Bool(b)) => Ok(AttributeValue::boolean(b)),

        (AttributeKind::Number, Value::Number(n)) => Ok(AttributeValue::number(n)),
        (AttributeKind::Number, Value::String(s)) => serde_json::from_str::<Number>(s.trim())
            .map(AttributeValue::number)
            .map_err(|_| mismatch(&Value::String(s))),

        (AttributeKind::Boolean, Value::Bool(b)) => Ok(AttributeValue::boolean(b)),
        (AttributeKind::Boolean, Value::String(s)) => match s.trim() {
            "true" => Ok(AttributeValue::boolean(true)),
            "false" => Ok(AttributeValue::boolean(false)),
            _ => Err(mismatch(&Value::String(s))),
        },

        (AttributeKind::Select, Value::String(s)) => match unwrap_json_string(&s) {
            Some(inner) if unwrap => interpret(inner, kind, false),
            _ => Ok(AttributeValue::option_code(s)),
        },
        (AttributeKind::Select, Value::Number(n)) => match n.as_i64() {
            Some(id) => Ok(AttributeValue::OptionRef(OptionRef::by_id(id))),
            None => Err(mismatch(&Value::Number(n))),
        },
        (AttributeKind::Select, object @ Value::Object(_)) => match AttributeValue::from_json(&object) {
            Some(reference @ AttributeValue::OptionRef(_)) => Ok(reference),
            _ => Err(mismatch(&object)),
        },

        (AttributeKind::Measurement, object @ Value::Object(_)) => {
            match AttributeValue::from_json(&object) {
                Some(measurement @ AttributeValue::Measurement(_)) => Ok(measurement),
                _ => Err(mismatch(&object)),
            }
        }
        (AttributeKind::Measurement, Value::String(s)) if unwrap => match unwrap_json_string(&s) {
            Some(inner) => interpret(inner, kind, false),
            None => Err(mismatch(&Value::String(s))),
        },

        (_, other) => Err(mismatch(&other)),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
