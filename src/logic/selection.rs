use crate::logic::axes::ResolvedAxis;
use crate::logic::catalog_cache::CatalogCache;
use crate::model::{AttributeId, AttributeOption, ModelProduct, SelectionConfig};
use crate::store::{AttributeStore, SelectionStore};
use anyhow::Result;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionSource {
    /// The model product's `variant_configuration`
    Configuration,
    /// Rows of the product_variant_selections table
    LegacyTable,
}

/// Selected options per axis attribute
#[derive(Debug, Clone, PartialEq)]
pub struct Selections {
    pub source: SelectionSource,
    options: HashMap<AttributeId, Vec<AttributeOption>>,
}

impl Selections {
    pub fn new(source: SelectionSource) -> Self {
        Self {
            source,
            options: HashMap::new(),
        }
    }

    pub fn insert(&mut self, attribute_id: AttributeId, options: Vec<AttributeOption>) {
        self.options.insert(attribute_id, options);
    }

    /// Selected options of an axis; empty when nothing is selected
    pub fn for_axis(&self, attribute_id: AttributeId) -> &[AttributeOption] {
        self.options
            .get(&attribute_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn selected_count(&self, attribute_id: AttributeId) -> usize {
        self.for_axis(attribute_id).len()
    }
}

pub struct SelectionResolver;

impl SelectionResolver {
    /// Resolve which options the user selected for each axis.
    ///
    /// The structured configuration wins when it names at least one option;
    /// otherwise the legacy selection table is read. Configuration ids that
    /// do not belong to the axis attribute are ignored.
    pub async fn get_selected_options<S>(
        store: &S,
        cache: &mut CatalogCache,
        model: &ModelProduct,
        axes: &[ResolvedAxis],
    ) -> Result<Selections>
    where
        S: AttributeStore + SelectionStore + ?Sized,
    {
        if let SelectionConfig::Configured(config) = &model.selection {
            let mut selections = Selections::new(SelectionSource::Configuration);
            let mut any_selected = false;

            for axis in axes {
                let Some(option_ids) = config.get(&axis.axis_id()).filter(|ids| !ids.is_empty()) else {
                    selections.insert(axis.attribute_id(), Vec::new());
                    continue;
                };
                let available = cache.options(store, axis.attribute_id()).await?;
                let selected: Vec<AttributeOption> = option_ids
                    .iter()
                    .filter_map(|id| available.iter().find(|option| option.id == *id))
                    .cloned()
                    .collect();
                if selected.len() < option_ids.len() {
                    log::warn!(
                        "Product {} selects {} unknown option(s) for axis {}",
                        model.id,
                        option_ids.len() - selected.len(),
                        axis.code()
                    );
                }
                any_selected |= !selected.is_empty();
                selections.insert(axis.attribute_id(), selected);
            }

            if any_selected {
                return Ok(selections);
            }
            log::debug!(
                "variant_configuration of product {} selects nothing, reading selection table",
                model.id
            );
        }

        let mut selections = Selections::new(SelectionSource::LegacyTable);
        for axis in axes {
            let selected = store
                .list_selected_options(&model.id, axis.attribute_id())
                .await?;
            selections.insert(axis.attribute_id(), selected);
        }
        Ok(selections)
    }
}
