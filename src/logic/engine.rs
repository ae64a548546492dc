use crate::config::ReconcileConfig;
use crate::error::{EngineResult, ReconcileError};
use crate::logic::axes::{AxisResolver, ResolvedAxis};
use crate::logic::catalog_cache::CatalogCache;
use crate::logic::codec;
use crate::logic::combination_key::{CombinationKey, CombinationKeyEncoder};
use crate::logic::combinations::CombinationGenerator;
use crate::logic::materialize::{Materializer, OverrideAttributes};
use crate::logic::reconcile::{plan_differential, plan_full, VariantDraft};
use crate::logic::selection::SelectionResolver;
use crate::model::{
    AttributeId, AttributeKind, AttributeValue, AxisBreakdown, CombinationBreakdown,
    EncodedAttribute, FamilyVariantId, GenerationLogEntry, GenerationResult, Id, ModelProduct,
    PreparedVariant, UserContext, VariantProduct,
};
use crate::store::Store;
use std::collections::HashMap;
use std::sync::Arc;

/// Entry point of variant reconciliation.
///
/// Holds no state between calls apart from the store handle and settings;
/// every operation builds its own [`CatalogCache`].
pub struct VariantEngine<S: Store> {
    store: Arc<S>,
    settings: ReconcileConfig,
}

/// Model product with its axes, ready to reconcile
struct Target {
    model: ModelProduct,
    family_variant_id: FamilyVariantId,
    axes: Vec<ResolvedAxis>,
}

impl<S: Store> VariantEngine<S> {
    pub fn new(store: Arc<S>, settings: ReconcileConfig) -> Self {
        Self { store, settings }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn settings(&self) -> &ReconcileConfig {
        &self.settings
    }

    async fn load_model(&self, product_id: &Id) -> EngineResult<ModelProduct> {
        let product = self
            .store
            .get_product(product_id)
            .await?
            .ok_or_else(|| ReconcileError::not_found("Product", product_id))?;
        ModelProduct::try_from(product)
    }

    /// Family variant and ordered axes of a model; `None` when there is nothing to generate
    async fn variant_axes(
        &self,
        cache: &mut CatalogCache,
        model: &ModelProduct,
    ) -> EngineResult<Option<(FamilyVariantId, Vec<ResolvedAxis>)>> {
        let Some(family_variant_id) = model.family_variant_id else {
            log::info!("Product {} has no family variant, skipping", model.id);
            return Ok(None);
        };
        let axes = AxisResolver::get_axes(&*self.store, cache, family_variant_id).await?;
        if axes.is_empty() {
            log::info!("Family variant {} has no axes, skipping product {}", family_variant_id, model.id);
            return Ok(None);
        }
        Ok(Some((family_variant_id, axes)))
    }

    /// Load the model and its axes; `None` when there is nothing to generate
    async fn load_target(&self, cache: &mut CatalogCache, product_id: &Id) -> EngineResult<Option<Target>> {
        let model = self.load_model(product_id).await?;
        Ok(self
            .variant_axes(cache, &model)
            .await?
            .map(|(family_variant_id, axes)| Target {
                model,
                family_variant_id,
                axes,
            }))
    }

    /// Regenerate every variant of a model product from its current selections.
    ///
    /// Existing children are deleted and the full cartesian product of the
    /// selected options is created, all in one transaction.
    pub async fn reconcile_product(&self, ctx: &UserContext, product_id: &Id) -> EngineResult<GenerationResult> {
        let mut cache = CatalogCache::new();
        let Some(target) = self.load_target(&mut cache, product_id).await? else {
            return Ok(GenerationResult::new());
        };

        let selections =
            SelectionResolver::get_selected_options(&*self.store, &mut cache, &target.model, &target.axes).await?;
        let planned = CombinationGenerator::count(&target.axes, &selections);
        if planned > self.settings.max_combinations {
            return Err(ReconcileError::per_item(
                "combinations",
                format!(
                    "selections of product {} produce {} combinations, more than the limit of {}",
                    target.model.id, planned, self.settings.max_combinations
                ),
            ));
        }
        let combinations = CombinationGenerator::generate(&target.axes, &selections);
        log::info!(
            "Generated {} variant combinations for product {}",
            combinations.len(),
            target.model.id
        );

        let existing = self.store.list_variants(&target.model.id).await?;
        let drafts = combinations
            .iter()
            .map(|combination| VariantDraft::from_combination(&target.axes, combination))
            .collect();
        let plan = plan_full(&existing, drafts);

        let result = Materializer::new(&target.model, ctx, self.settings.enabled_by_default)
            .apply(&*self.store, plan)
            .await?;
        self.log_generation(target.family_variant_id, Some(target.model.id.clone()), &result, ctx)
            .await;
        Ok(result)
    }

    /// Reconcile every model product of a family variant.
    ///
    /// A failing product is recorded in `errors` and the batch continues.
    pub async fn reconcile_family_variant(
        &self,
        ctx: &UserContext,
        family_variant_id: FamilyVariantId,
    ) -> EngineResult<GenerationResult> {
        if self.store.get_family_variant(family_variant_id).await?.is_none() {
            return Err(ReconcileError::not_found("Family variant", family_variant_id));
        }

        let models = self.store.list_model_products(family_variant_id).await?;
        log::info!(
            "Found {} model products for family variant {}",
            models.len(),
            family_variant_id
        );

        let mut total = GenerationResult::new();
        for model in models {
            match self.reconcile_product(ctx, &model.id).await {
                Ok(result) => total.absorb(result),
                Err(e) => {
                    log::error!("Error generating variants for product {}: {}", model.id, e);
                    total.push_error(format!("Product {}: {}", model.id, e));
                }
            }
        }

        self.log_generation(family_variant_id, None, &total, ctx).await;
        Ok(total)
    }

    /// Reconcile every family variant in the catalog
    pub async fn reconcile_all(&self, ctx: &UserContext) -> EngineResult<GenerationResult> {
        let family_variant_ids = self.store.list_family_variant_ids().await?;
        log::info!("Reconciling {} family variants", family_variant_ids.len());

        let mut total = GenerationResult::new();
        for family_variant_id in family_variant_ids {
            match self.reconcile_family_variant(ctx, family_variant_id).await {
                Ok(result) => total.absorb(result),
                Err(e) => {
                    log::error!("Error reconciling family variant {}: {}", family_variant_id, e);
                    total.push_error(format!("Family variant {}: {}", family_variant_id, e));
                }
            }
        }
        Ok(total)
    }

    /// Differential update from externally prepared variants.
    ///
    /// Variants whose combination is prepared are updated in place, new
    /// combinations are created, ids in `delete_ids` are deleted and every
    /// other existing variant is left untouched.
    pub async fn reconcile_from_prepared(
        &self,
        ctx: &UserContext,
        product_id: &Id,
        prepared: &[PreparedVariant],
        delete_ids: &[Id],
    ) -> EngineResult<GenerationResult> {
        let mut cache = CatalogCache::new();
        let model = self.load_model(product_id).await?;
        let Some((family_variant_id, axes)) = self.variant_axes(&mut cache, &model).await? else {
            return self.delete_without_axes(ctx, &model, prepared, delete_ids).await;
        };
        let target = Target {
            model,
            family_variant_id,
            axes,
        };

        let axis_kinds: Vec<(AttributeId, AttributeKind)> =
            target.axes.iter().map(|a| (a.attribute_id(), a.kind())).collect();
        let index = cache.option_index(&*self.store, &axis_kinds).await?;
        let encoder = CombinationKeyEncoder::new(axis_kinds.iter().map(|(id, _)| *id), index);
        let overrides = OverrideAttributes::resolve(
            &*self.store,
            &mut cache,
            &self.settings.name_attribute_code,
            &self.settings.price_attribute_code,
        )
        .await?;

        let mut result = GenerationResult::new();

        let existing = self.store.list_variants(&target.model.id).await?;
        let existing_keys: Vec<(Id, CombinationKey)> = existing
            .iter()
            .map(|variant| (variant.id.clone(), existing_key(&encoder, &target.axes, variant)))
            .collect();

        let mut desired = Vec::with_capacity(prepared.len());
        for (position, payload) in prepared.iter().enumerate() {
            match self.prepare_draft(&mut cache, &encoder, &overrides, payload).await {
                Ok(entry) => desired.push(entry),
                Err(e) => {
                    log::warn!("Skipping prepared variant #{} of product {}: {}", position + 1, target.model.id, e);
                    result.push_error(format!("Prepared variant #{}: {}", position + 1, e));
                }
            }
        }

        let (plan, planning_errors) = plan_differential(&existing_keys, desired, delete_ids);
        result.errors.extend(planning_errors);
        log::info!("Differential update of product {}: {}", target.model.id, plan.summary());

        let applied = Materializer::new(&target.model, ctx, self.settings.enabled_by_default)
            .apply(&*self.store, plan)
            .await?;
        result.absorb(applied);

        self.log_generation(target.family_variant_id, Some(target.model.id.clone()), &result, ctx)
            .await;
        Ok(result)
    }

    /// Differential call on a product that has no variant axes.
    ///
    /// Requested deletions of its children still happen; every prepared
    /// payload is reported as an error since there is no combination to match.
    async fn delete_without_axes(
        &self,
        ctx: &UserContext,
        model: &ModelProduct,
        prepared: &[PreparedVariant],
        delete_ids: &[Id],
    ) -> EngineResult<GenerationResult> {
        let mut result = GenerationResult::new();
        for position in 1..=prepared.len() {
            result.push_error(format!(
                "Prepared variant #{}: product {} has no variant axes",
                position, model.id
            ));
        }

        let existing: Vec<(Id, CombinationKey)> = self
            .store
            .list_variants(&model.id)
            .await?
            .into_iter()
            .map(|variant| (variant.id, CombinationKey::default()))
            .collect();
        let (plan, planning_errors) = plan_differential(&existing, Vec::new(), delete_ids);
        result.errors.extend(planning_errors);

        if !plan.is_empty() {
            let applied = Materializer::new(model, ctx, self.settings.enabled_by_default)
                .apply(&*self.store, plan)
                .await?;
            result.absorb(applied);
        }

        if let Some(family_variant_id) = model.family_variant_id {
            self.log_generation(family_variant_id, Some(model.id.clone()), &result, ctx)
                .await;
        }
        Ok(result)
    }

    /// Encode a prepared payload and compute its combination key
    async fn prepare_draft(
        &self,
        cache: &mut CatalogCache,
        encoder: &CombinationKeyEncoder,
        overrides: &OverrideAttributes,
        payload: &PreparedVariant,
    ) -> EngineResult<(CombinationKey, VariantDraft)> {
        if payload.attributes.is_empty() {
            return Err(ReconcileError::per_item("payload", "no attributes given"));
        }

        let mut values: Vec<(AttributeId, AttributeValue, AttributeKind)> = Vec::new();
        for entry in &payload.attributes {
            let Some(value) = AttributeValue::from_json(&entry.value) else {
                continue;
            };
            let attribute = cache
                .attribute(&*self.store, entry.attribute_id)
                .await?
                .ok_or_else(|| {
                    ReconcileError::per_item(
                        format!("attribute {}", entry.attribute_id),
                        "does not exist",
                    )
                })?;
            values.push((entry.attribute_id, value, attribute.kind));
        }

        if !encoder.covers_all_axes(values.iter().map(|(id, _, _)| *id)) {
            return Err(ReconcileError::per_item(
                "payload",
                "does not assign a value to every variant axis",
            ));
        }

        let key = encoder.key(values.iter().map(|(id, value, _)| (*id, value)));
        let mut draft = VariantDraft {
            label: key.to_string(),
            ..VariantDraft::default()
        };
        for (attribute_id, value, kind) in &values {
            draft.set_attribute(EncodedAttribute {
                attribute_id: *attribute_id,
                value: codec::encode(value, *kind),
            });
        }
        overrides.apply(payload, &mut draft);
        Ok((key, draft))
    }

    /// Number of combinations the current selections would produce
    pub async fn preview_combination_count(&self, product_id: &Id) -> EngineResult<u64> {
        let mut cache = CatalogCache::new();
        let Some(target) = self.load_target(&mut cache, product_id).await? else {
            return Ok(0);
        };
        let selections =
            SelectionResolver::get_selected_options(&*self.store, &mut cache, &target.model, &target.axes).await?;
        Ok(CombinationGenerator::count(&target.axes, &selections))
    }

    /// Per-axis selected/available counts and the resulting combination total
    pub async fn preview_combination_breakdown(&self, product_id: &Id) -> EngineResult<CombinationBreakdown> {
        let mut cache = CatalogCache::new();
        let Some(target) = self.load_target(&mut cache, product_id).await? else {
            return Ok(CombinationBreakdown::default());
        };
        let selections =
            SelectionResolver::get_selected_options(&*self.store, &mut cache, &target.model, &target.axes).await?;

        let mut axes = Vec::with_capacity(target.axes.len());
        for axis in &target.axes {
            let total_available = cache.options(&*self.store, axis.attribute_id()).await?.len() as u64;
            axes.push(AxisBreakdown {
                code: axis.code().to_string(),
                label: axis.attribute.display_label().to_string(),
                selected_count: selections.selected_count(axis.attribute_id()),
                total_available,
            });
        }

        Ok(CombinationBreakdown {
            axes,
            total_combinations: CombinationGenerator::count(&target.axes, &selections),
        })
    }

    /// Clean up before products are deleted.
    ///
    /// Child variants of any model among `product_ids` join the deletion set;
    /// attribute rows and image assignments of the whole set are removed.
    /// Returns the expanded id list the caller should delete.
    pub async fn prepare_product_deletion(&self, ctx: &UserContext, product_ids: &[Id]) -> EngineResult<Vec<Id>> {
        let mut all_ids: Vec<Id> = product_ids.to_vec();
        for product_id in product_ids {
            for child in self.store.list_variants(product_id).await? {
                if !all_ids.contains(&child.id) {
                    all_ids.push(child.id);
                }
            }
        }
        if all_ids.is_empty() {
            return Ok(all_ids);
        }

        let mut tx = self.store.begin(ctx).await?;
        let rows = tx.delete_attribute_values(&all_ids).await?;
        let images = tx.remove_images(&all_ids).await?;
        tx.commit().await?;

        log::info!(
            "Prepared {} products for deletion ({} attribute rows, {} images removed)",
            all_ids.len(),
            rows,
            images
        );
        Ok(all_ids)
    }

    /// Best-effort audit record; failures are logged and swallowed
    async fn log_generation(
        &self,
        family_variant_id: FamilyVariantId,
        model_product_id: Option<Id>,
        result: &GenerationResult,
        ctx: &UserContext,
    ) {
        let entry = GenerationLogEntry::generate(family_variant_id, model_product_id, result, ctx.audit_user());
        if let Err(e) = self.store.record_generation(entry).await {
            log::warn!("Could not record variant generation log: {}", e);
            log::info!(
                "Variant generation for family variant {}: {} created, {} updated, {} deleted",
                family_variant_id,
                result.created,
                result.updated,
                result.deleted
            );
        }
    }
}

/// Key of a stored variant from its decoded axis rows
fn existing_key(encoder: &CombinationKeyEncoder, axes: &[ResolvedAxis], variant: &VariantProduct) -> CombinationKey {
    let kinds: HashMap<AttributeId, AttributeKind> = axes.iter().map(|a| (a.attribute_id(), a.kind())).collect();
    let decoded: Vec<(AttributeId, AttributeValue)> = variant
        .attribute_values
        .iter()
        .filter_map(|row| {
            let kind = kinds.get(&row.attribute_id)?;
            Some((row.attribute_id, codec::decode(&row.encoded_value, *kind)))
        })
        .collect();
    encoder.key(decoded.iter().map(|(id, value)| (*id, value)))
}
