//! Canonical identity of a variant's axis assignment.
//!
//! Two variants are the same combination when their keys are equal. Values
//! are normalized and then resolved against the axis options, so a stored
//! `"red"` and an incoming `{"id": 5, "code": "red"}` produce the same key.

use crate::model::{AttributeId, AttributeKind, AttributeOption, AttributeValue, OptionId};
use itertools::Itertools;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CombinationKey(String);

impl CombinationKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CombinationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
struct OptionIdentity {
    id: OptionId,
    code: String,
    value: Option<String>,
}

#[derive(Debug, Clone)]
struct AxisOptions {
    /// Scalar-kind axes store literals, so a number is read as a value before an id
    literal_first: bool,
    options: Vec<OptionIdentity>,
}

/// Options of the axis attributes, searchable by id, code or literal value
#[derive(Debug, Clone, Default)]
pub struct OptionIndex {
    by_attribute: HashMap<AttributeId, AxisOptions>,
}

impl OptionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, attribute_id: AttributeId, kind: AttributeKind, options: &[AttributeOption]) {
        let options = options
            .iter()
            .map(|option| OptionIdentity {
                id: option.id,
                code: option.code.clone(),
                value: literal(&option.value),
            })
            .collect();
        self.by_attribute.insert(
            attribute_id,
            AxisOptions {
                literal_first: kind.is_scalar(),
                options,
            },
        );
    }

    /// Option id a normalized value refers to.
    ///
    /// Numbers are tried as an option id and then as a literal value; on
    /// scalar-kind axes the literal wins. Strings are tried as code, then
    /// literal value, then an id written as text. Booleans match literals only.
    fn resolve(&self, attribute_id: AttributeId, normalized: &Value) -> Option<OptionId> {
        let axis = self.by_attribute.get(&attribute_id)?;
        let options = &axis.options;
        let by_literal = |text: &str| {
            options
                .iter()
                .find(|o| o.value.as_deref() == Some(text))
                .map(|o| o.id)
        };
        match normalized {
            Value::Number(n) => {
                let text = n.to_string();
                let by_id = || n.as_i64().filter(|id| options.iter().any(|o| o.id == *id));
                if axis.literal_first {
                    by_literal(&text).or_else(by_id)
                } else {
                    by_id().or_else(|| by_literal(&text))
                }
            }
            Value::String(s) => options
                .iter()
                .find(|o| o.code == *s)
                .map(|o| o.id)
                .or_else(|| by_literal(s))
                .or_else(|| {
                    let id = s.trim().parse::<OptionId>().ok()?;
                    options.iter().find(|o| o.id == id).map(|o| o.id)
                }),
            Value::Bool(b) => by_literal(&b.to_string()),
            _ => None,
        }
    }
}

fn literal(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Builds keys restricted to a family variant's axis attributes
#[derive(Debug, Clone)]
pub struct CombinationKeyEncoder {
    axes: BTreeSet<AttributeId>,
    index: OptionIndex,
}

impl CombinationKeyEncoder {
    pub fn new(axis_attribute_ids: impl IntoIterator<Item = AttributeId>, index: OptionIndex) -> Self {
        Self {
            axes: axis_attribute_ids.into_iter().collect(),
            index,
        }
    }

    /// Key of an (attribute, value) assignment.
    ///
    /// Non-axis attributes are ignored, entries are ordered by attribute id
    /// and a repeated attribute keeps its last value. The result is
    /// `attrId:canonicalJson` segments joined by `|`.
    pub fn key<'a, I>(&self, entries: I) -> CombinationKey
    where
        I: IntoIterator<Item = (AttributeId, &'a AttributeValue)>,
    {
        let mut segments: BTreeMap<AttributeId, String> = BTreeMap::new();
        for (attribute_id, value) in entries {
            if !self.axes.contains(&attribute_id) {
                continue;
            }
            let normalized = value.normalize();
            let canonical = self
                .index
                .resolve(attribute_id, &normalized)
                .map(Value::from)
                .unwrap_or(normalized);
            segments.insert(attribute_id, format!("{}:{}", attribute_id, canonical));
        }
        CombinationKey(segments.values().join("|"))
    }

    /// Whether the attribute ids assign a value to every axis
    pub fn covers_all_axes(&self, attribute_ids: impl IntoIterator<Item = AttributeId>) -> bool {
        let present: BTreeSet<AttributeId> = attribute_ids.into_iter().collect();
        self.axes.is_subset(&present)
    }
}
