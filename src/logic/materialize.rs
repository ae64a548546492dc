use crate::logic::catalog_cache::CatalogCache;
use crate::logic::codec;
use crate::logic::reconcile::{ReconcilePlan, VariantDraft};
use crate::model::{
    Attribute, AttributeValue, EncodedAttribute, GenerationResult, Id, ModelProduct,
    NewVariantProduct, PreparedVariant, UserContext, VariantUpdate, generate_id,
};
use crate::store::{AttributeStore, ItemTransaction, TransactionalStore};
use anyhow::Result;

/// Attributes that the name and price overrides of a prepared variant write to
#[derive(Debug, Clone, Default)]
pub struct OverrideAttributes {
    pub name: Option<Attribute>,
    pub price: Option<Attribute>,
}

impl OverrideAttributes {
    /// Look the well-known attributes up by code. Missing ones disable the override.
    pub async fn resolve<S>(
        store: &S,
        cache: &mut CatalogCache,
        name_code: &str,
        price_code: &str,
    ) -> Result<Self>
    where
        S: AttributeStore + ?Sized,
    {
        let name = cache.attribute_by_code(store, name_code).await?;
        if name.is_none() {
            log::warn!("No '{}' attribute; variant name overrides are skipped", name_code);
        }
        let price = cache.attribute_by_code(store, price_code).await?;
        if price.is_none() {
            log::warn!("No '{}' attribute; variant price overrides are skipped", price_code);
        }
        Ok(Self { name, price })
    }

    /// Fold the prepared variant's name, price, enabled flag and image into a draft
    pub fn apply(&self, prepared: &PreparedVariant, draft: &mut VariantDraft) {
        if let (Some(attribute), Some(name)) = (&self.name, prepared.name.as_deref()) {
            if !name.trim().is_empty() {
                draft.set_attribute(EncodedAttribute {
                    attribute_id: attribute.id,
                    value: codec::encode(&AttributeValue::text(name), attribute.kind),
                });
            }
        }
        if let (Some(attribute), Some(price)) = (&self.price, &prepared.price) {
            draft.set_attribute(EncodedAttribute {
                attribute_id: attribute.id,
                value: codec::encode(&AttributeValue::Scalar(price.clone()), attribute.kind),
            });
        }
        if prepared.enabled.is_some() {
            draft.enabled = prepared.enabled;
        }
        if let Some(image) = prepared.image.as_ref().filter(|m| !m.trim().is_empty()) {
            draft.image = Some(image.clone());
        }
    }
}

/// Applies a [`ReconcilePlan`] inside one item-storage transaction.
///
/// Deletes run first, then updates, then creates. Any failure rolls back the
/// whole plan.
pub struct Materializer<'a> {
    model: &'a ModelProduct,
    ctx: &'a UserContext,
    enabled_by_default: bool,
}

impl<'a> Materializer<'a> {
    pub fn new(model: &'a ModelProduct, ctx: &'a UserContext, enabled_by_default: bool) -> Self {
        Self {
            model,
            ctx,
            enabled_by_default,
        }
    }

    pub async fn apply<S>(&self, store: &S, plan: ReconcilePlan) -> Result<GenerationResult>
    where
        S: TransactionalStore + ?Sized,
    {
        let mut result = GenerationResult::new();
        if plan.is_empty() {
            return Ok(result);
        }

        let mut tx = store.begin(self.ctx).await?;

        if !plan.deletes.is_empty() {
            self.delete_variants(tx.as_mut(), &plan.deletes).await?;
            result.deleted = plan.deletes.len();
        }

        for update in plan.updates {
            let changes = VariantUpdate {
                enabled: update.draft.enabled,
                attributes: update.draft.attributes,
            };
            if !changes.is_empty() {
                tx.update_one(&update.variant_id, changes).await?;
            }
            if let Some(media) = &update.draft.image {
                replace_image(tx.as_mut(), &update.variant_id, media).await?;
            }
            result.updated += 1;
        }

        for draft in plan.creates {
            let variant_id = self.create_variant(tx.as_mut(), draft).await?;
            log::debug!("Created variant {} of product {}", variant_id, self.model.id);
            result.created += 1;
        }

        tx.commit().await?;
        log::info!(
            "Product {}: {} created, {} updated, {} deleted",
            self.model.id,
            result.created,
            result.updated,
            result.deleted
        );
        Ok(result)
    }

    async fn delete_variants(&self, tx: &mut dyn ItemTransaction, ids: &[Id]) -> Result<()> {
        let rows = tx.delete_attribute_values(ids).await?;
        let images = tx.remove_images(ids).await?;
        tx.delete_many(ids).await?;
        log::debug!(
            "Deleted {} variants of product {} ({} attribute rows, {} images)",
            ids.len(),
            self.model.id,
            rows,
            images
        );
        Ok(())
    }

    async fn create_variant(&self, tx: &mut dyn ItemTransaction, draft: VariantDraft) -> Result<Id> {
        let item = NewVariantProduct {
            id: generate_id(),
            parent_product_id: self.model.id.clone(),
            family_id: self.model.family_id,
            family_variant_id: self.model.family_variant_id,
            enabled: draft.enabled.unwrap_or(self.enabled_by_default),
            user_created: self.ctx.audit_user(),
            date_created: chrono::Utc::now(),
            attributes: draft.attributes,
        };
        let variant_id = tx.create_one(item).await?;
        if let Some(media) = &draft.image {
            tx.attach_image(&variant_id, media).await?;
        }
        Ok(variant_id)
    }
}

/// Swap whatever images a variant has for a single base image
async fn replace_image(tx: &mut dyn ItemTransaction, variant_id: &Id, media_id: &str) -> Result<()> {
    let removed = tx.remove_images(std::slice::from_ref(variant_id)).await?;
    if removed > 0 {
        log::debug!("Replacing {} images of variant {}", removed, variant_id);
    }
    tx.attach_image(variant_id, media_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::reconcile::PlannedUpdate;
    use crate::model::{AttributeKind, Product, ScalarValue};
    use crate::store::MemoryStore;

    fn model() -> ModelProduct {
        ModelProduct::try_from(Product::model("tee", 1, 7)).unwrap()
    }

    fn draft(code: &str) -> VariantDraft {
        VariantDraft {
            label: code.to_string(),
            attributes: vec![EncodedAttribute {
                attribute_id: 1,
                value: format!("\"{}\"", code),
            }],
            enabled: None,
            image: None,
        }
    }

    #[tokio::test]
    async fn test_creates_use_default_enabled_and_stamp_user() {
        let store = MemoryStore::new();
        store.add_product(Product::model("tee", 1, 7));
        let model = model();
        let ctx = UserContext::new("editor-1");

        let plan = ReconcilePlan {
            creates: vec![draft("red"), VariantDraft { enabled: Some(true), ..draft("blue") }],
            ..ReconcilePlan::default()
        };
        let result = Materializer::new(&model, &ctx, false).apply(&store, plan).await.unwrap();
        assert_eq!(result.created, 2);

        let variants = store.variants_of("tee");
        assert_eq!(variants.len(), 2);
        assert!(!variants[0].enabled);
        assert!(variants[1].enabled);
        assert_eq!(store.created_by(&variants[0].id), Some("editor-1".to_string()));
    }

    #[tokio::test]
    async fn test_failure_rolls_back_the_whole_plan() {
        let store = MemoryStore::new();
        store.add_product(Product::model("tee", 1, 7));
        let existing = store.add_variant("tee", &[(1, "\"green\"")]);
        store.fail_creates_after(1);

        let model = model();
        let ctx = UserContext::system();
        let plan = ReconcilePlan {
            deletes: vec![existing.clone()],
            updates: Vec::new(),
            creates: vec![draft("red"), draft("blue")],
        };
        let err = Materializer::new(&model, &ctx, false).apply(&store, plan).await;
        assert!(err.is_err());

        let variants = store.variants_of("tee");
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0].id, existing);
        assert_eq!(variants[0].value_of(1), Some("\"green\""));
    }

    #[tokio::test]
    async fn test_update_replaces_image_and_keeps_enabled_when_absent() {
        let store = MemoryStore::new();
        store.add_product(Product::model("tee", 1, 7));
        let existing = store.add_variant("tee", &[(1, "\"red\"")]);
        store.attach_image(&existing, "old-media");

        let model = model();
        let ctx = UserContext::system();
        let plan = ReconcilePlan {
            updates: vec![PlannedUpdate {
                variant_id: existing.clone(),
                draft: VariantDraft {
                    image: Some("new-media".to_string()),
                    ..draft("red")
                },
            }],
            ..ReconcilePlan::default()
        };
        let result = Materializer::new(&model, &ctx, false).apply(&store, plan).await.unwrap();
        assert_eq!(result.updated, 1);
        assert_eq!(store.images_of(&existing), vec!["new-media".to_string()]);
        assert!(store.variants_of("tee")[0].enabled);
    }

    #[tokio::test]
    async fn test_overrides_write_name_and_price() {
        let store = MemoryStore::new();
        store.add_attribute(3, "name", AttributeKind::Text);
        store.add_attribute(4, "price", AttributeKind::Number);
        let mut cache = CatalogCache::new();
        let overrides = OverrideAttributes::resolve(&store, &mut cache, "name", "price")
            .await
            .unwrap();

        let prepared = PreparedVariant::default()
            .name("Red tee")
            .price(ScalarValue::Number(25.into()))
            .enabled(true);
        let mut d = draft("red");
        overrides.apply(&prepared, &mut d);

        assert_eq!(d.enabled, Some(true));
        assert!(d.attributes.contains(&EncodedAttribute { attribute_id: 3, value: "\"Red tee\"".to_string() }));
        assert!(d.attributes.contains(&EncodedAttribute { attribute_id: 4, value: "25".to_string() }));
    }
}
