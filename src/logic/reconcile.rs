//! Planning: decide which variants to delete, update and create.
//!
//! Planning is pure; nothing here touches storage. The plan is applied by
//! [`crate::logic::materialize::Materializer`].

use crate::logic::axes::ResolvedAxis;
use crate::logic::codec;
use crate::logic::combination_key::CombinationKey;
use crate::logic::combinations::Combination;
use crate::model::{EncodedAttribute, Id, VariantProduct};
use std::collections::{HashMap, HashSet};

/// Attribute rows and product fields one variant should end up with
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VariantDraft {
    /// Used in log lines and error messages
    pub label: String,
    pub attributes: Vec<EncodedAttribute>,
    pub enabled: Option<bool>,
    /// Media id to assign as the single base image
    pub image: Option<String>,
}

impl VariantDraft {
    pub fn from_combination(axes: &[ResolvedAxis], combination: &Combination) -> Self {
        let attributes = axes
            .iter()
            .filter_map(|axis| {
                let option = combination.option_for(axis.attribute_id())?;
                Some(EncodedAttribute {
                    attribute_id: axis.attribute_id(),
                    value: codec::encode(&option.to_value(axis.kind()), axis.kind()),
                })
            })
            .collect();
        Self {
            label: combination.label(),
            attributes,
            enabled: None,
            image: None,
        }
    }

    /// Set an attribute row, replacing an earlier one for the same attribute
    pub fn set_attribute(&mut self, attribute: EncodedAttribute) {
        match self
            .attributes
            .iter_mut()
            .find(|a| a.attribute_id == attribute.attribute_id)
        {
            Some(existing) => existing.value = attribute.value,
            None => self.attributes.push(attribute),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedUpdate {
    pub variant_id: Id,
    pub draft: VariantDraft,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReconcilePlan {
    pub deletes: Vec<Id>,
    pub updates: Vec<PlannedUpdate>,
    pub creates: Vec<VariantDraft>,
}

impl ReconcilePlan {
    pub fn is_empty(&self) -> bool {
        self.deletes.is_empty() && self.updates.is_empty() && self.creates.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} to delete, {} to update, {} to create",
            self.deletes.len(),
            self.updates.len(),
            self.creates.len()
        )
    }
}

/// Full mode: every existing child goes, every desired draft is created
pub fn plan_full(existing: &[VariantProduct], desired: Vec<VariantDraft>) -> ReconcilePlan {
    ReconcilePlan {
        deletes: existing.iter().map(|v| v.id.clone()).collect(),
        updates: Vec::new(),
        creates: desired,
    }
}

/// Differential mode.
///
/// Requested deletions are applied first and drop out of matching. Every
/// remaining existing variant whose key is desired is updated; desired keys
/// that matched nothing are created. Existing variants that are neither
/// desired nor requested for deletion are left alone. When a key is desired
/// twice the later draft wins.
///
/// Returns the plan and the non-fatal problems found while planning.
pub fn plan_differential(
    existing: &[(Id, CombinationKey)],
    desired: Vec<(CombinationKey, VariantDraft)>,
    delete_ids: &[Id],
) -> (ReconcilePlan, Vec<String>) {
    let mut errors = Vec::new();
    let children: HashSet<&Id> = existing.iter().map(|(id, _)| id).collect();

    let mut deletes: Vec<Id> = Vec::new();
    for id in delete_ids {
        if !children.contains(id) {
            errors.push(format!("Variant {} is not a child of this product", id));
        } else if !deletes.contains(id) {
            deletes.push(id.clone());
        }
    }

    let mut ordered: Vec<(CombinationKey, VariantDraft)> = Vec::with_capacity(desired.len());
    let mut positions: HashMap<CombinationKey, usize> = HashMap::new();
    for (key, draft) in desired {
        match positions.get(&key) {
            Some(&at) => {
                log::warn!(
                    "Combination {} requested more than once, keeping '{}'",
                    key,
                    draft.label
                );
                ordered[at].1 = draft;
            }
            None => {
                positions.insert(key.clone(), ordered.len());
                ordered.push((key, draft));
            }
        }
    }

    let mut matched: HashSet<&CombinationKey> = HashSet::new();
    let mut updates = Vec::new();
    for (id, key) in existing {
        if deletes.contains(id) {
            continue;
        }
        if let Some(&at) = positions.get(key) {
            updates.push(PlannedUpdate {
                variant_id: id.clone(),
                draft: ordered[at].1.clone(),
            });
            matched.insert(key);
        }
    }

    let creates = ordered
        .iter()
        .filter(|(key, _)| !matched.contains(key))
        .map(|(_, draft)| draft.clone())
        .collect();

    (
        ReconcilePlan {
            deletes,
            updates,
            creates,
        },
        errors,
    )
}
