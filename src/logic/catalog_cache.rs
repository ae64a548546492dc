use crate::logic::combination_key::OptionIndex;
use crate::model::{Attribute, AttributeId, AttributeKind, AttributeOption};
use crate::store::AttributeStore;
use anyhow::Result;
use std::collections::HashMap;

/// Request-scoped cache of attribute metadata.
///
/// One cache lives for the duration of a single reconciliation or preview and
/// is dropped with it, so it never serves metadata across requests.
#[derive(Debug, Default)]
pub struct CatalogCache {
    /// Attributes keyed by id; `None` records a confirmed miss
    attributes: HashMap<AttributeId, Option<Attribute>>,
    /// Attributes keyed by code (name, price, ...)
    by_code: HashMap<String, Option<Attribute>>,
    /// All options of an attribute in id order
    options: HashMap<AttributeId, Vec<AttributeOption>>,
}

impl CatalogCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn attribute<S>(&mut self, store: &S, id: AttributeId) -> Result<Option<Attribute>>
    where
        S: AttributeStore + ?Sized,
    {
        if let Some(cached) = self.attributes.get(&id) {
            return Ok(cached.clone());
        }
        let attribute = store.get_attribute(id).await?;
        self.attributes.insert(id, attribute.clone());
        Ok(attribute)
    }

    pub async fn attribute_by_code<S>(&mut self, store: &S, code: &str) -> Result<Option<Attribute>>
    where
        S: AttributeStore + ?Sized,
    {
        if let Some(cached) = self.by_code.get(code) {
            return Ok(cached.clone());
        }
        let attribute = store.find_attribute_by_code(code).await?;
        if let Some(attribute) = &attribute {
            self.attributes.insert(attribute.id, Some(attribute.clone()));
        }
        self.by_code.insert(code.to_string(), attribute.clone());
        Ok(attribute)
    }

    pub async fn options<S>(&mut self, store: &S, attribute_id: AttributeId) -> Result<&[AttributeOption]>
    where
        S: AttributeStore + ?Sized,
    {
        if !self.options.contains_key(&attribute_id) {
            let options = store.list_options(attribute_id).await?;
            log::debug!("Cached {} options of attribute {}", options.len(), attribute_id);
            self.options.insert(attribute_id, options);
        }
        Ok(self
            .options
            .get(&attribute_id)
            .map(Vec::as_slice)
            .unwrap_or_default())
    }

    /// Identity index over the options of the given attributes
    pub async fn option_index<S>(&mut self, store: &S, axes: &[(AttributeId, AttributeKind)]) -> Result<OptionIndex>
    where
        S: AttributeStore + ?Sized,
    {
        let mut index = OptionIndex::new();
        for &(attribute_id, kind) in axes {
            let options = self.options(store, attribute_id).await?;
            index.insert(attribute_id, kind, options);
        }
        Ok(index)
    }
}
