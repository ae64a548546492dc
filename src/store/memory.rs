use anyhow::{bail, Result};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::model::{
    generate_id, Attribute, AttributeId, AttributeKind, AttributeOption, AttributeValueRow,
    AxisId, FamilyVariant, FamilyVariantId, GenerationLogEntry, Id, NewVariantProduct, OptionId,
    Product, ProductType, UserContext, VariantAxis, VariantProduct, VariantUpdate,
};
use crate::store::traits::{
    AttributeStore, GenerationLogStore, ItemTransaction, ProductStore, SelectionStore, Store,
    TransactionalStore,
};

#[derive(Debug, Clone)]
struct StoredProduct {
    product: Product,
    user_created: Option<String>,
    /// Creation order, stands in for date_created
    seq: u64,
}

#[derive(Debug, Clone)]
struct SelectionRow {
    product_id: Id,
    attribute_id: AttributeId,
    option_id: OptionId,
    is_selected: bool,
    sort: i32,
}

#[derive(Debug, Clone)]
struct ImageLink {
    product_id: Id,
    image_id: Id,
    media: String,
}

/// Everything the in-memory catalog holds
#[derive(Debug, Clone, Default)]
struct CatalogState {
    attributes: BTreeMap<AttributeId, Attribute>,
    options: BTreeMap<OptionId, AttributeOption>,
    family_variants: BTreeMap<FamilyVariantId, FamilyVariant>,
    products: BTreeMap<Id, StoredProduct>,
    attribute_values: Vec<AttributeValueRow>,
    selections: Vec<SelectionRow>,
    images: Vec<ImageLink>,
    generation_logs: Vec<GenerationLogEntry>,
    next_seq: u64,
}

impl CatalogState {
    fn insert_product(&mut self, product: Product, user_created: Option<String>) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.products.insert(
            product.id.clone(),
            StoredProduct {
                product,
                user_created,
                seq,
            },
        );
    }

    fn variants_of(&self, parent_id: &str) -> Vec<VariantProduct> {
        let mut children: Vec<&StoredProduct> = self
            .products
            .values()
            .filter(|p| {
                p.product.product_type == ProductType::Simple
                    && p.product.parent_product_id.as_deref() == Some(parent_id)
            })
            .collect();
        children.sort_by_key(|p| p.seq);

        children
            .into_iter()
            .map(|p| VariantProduct {
                id: p.product.id.clone(),
                parent_product_id: parent_id.to_string(),
                family_id: p.product.family_id,
                family_variant_id: p.product.family_variant_id,
                enabled: p.product.enabled,
                attribute_values: self
                    .attribute_values
                    .iter()
                    .filter(|row| row.product_id == p.product.id)
                    .cloned()
                    .collect(),
            })
            .collect()
    }

    fn upsert_attribute_value(&mut self, row: AttributeValueRow) {
        match self
            .attribute_values
            .iter_mut()
            .find(|r| r.product_id == row.product_id && r.attribute_id == row.attribute_id)
        {
            Some(existing) => existing.encoded_value = row.encoded_value,
            None => self.attribute_values.push(row),
        }
    }

    fn attach_image(&mut self, product_id: &str, media: &str) {
        self.images.push(ImageLink {
            product_id: product_id.to_string(),
            image_id: generate_id(),
            media: media.to_string(),
        });
    }
}

/// In-memory catalog for tests and the demo server.
///
/// Transactions work on a snapshot taken at `begin` and replace the shared
/// state on commit, so concurrent transactions resolve last-write-wins.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<CatalogState>>,
    /// Creates allowed per transaction before an injected failure
    fail_creates_after: Arc<RwLock<Option<usize>>>,
    fail_generation_log: Arc<RwLock<bool>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_attribute(&self, id: AttributeId, code: &str, kind: AttributeKind) {
        self.insert_attribute(Attribute {
            id,
            code: code.to_string(),
            label: None,
            kind,
        });
    }

    pub fn insert_attribute(&self, attribute: Attribute) {
        self.state.write().attributes.insert(attribute.id, attribute);
    }

    pub fn add_option(&self, id: OptionId, attribute_id: AttributeId, code: &str, label: &str) {
        self.insert_option(AttributeOption {
            id,
            attribute_id,
            code: code.to_string(),
            label: label.to_string(),
            value: serde_json::Value::Null,
        });
    }

    pub fn insert_option(&self, option: AttributeOption) {
        self.state.write().options.insert(option.id, option);
    }

    /// Axes are `(axis id, attribute id, sort order)`
    pub fn add_family_variant(&self, id: FamilyVariantId, code: &str, axes: &[(AxisId, AttributeId, i32)]) {
        let mut state = self.state.write();
        let axes = axes
            .iter()
            .map(|&(axis_id, attribute_id, sort_order)| VariantAxis {
                id: axis_id,
                attribute_id,
                attribute_code: state
                    .attributes
                    .get(&attribute_id)
                    .map(|a| a.code.clone())
                    .unwrap_or_default(),
                sort_order,
            })
            .collect();
        state.family_variants.insert(
            id,
            FamilyVariant {
                id,
                family_id: None,
                code: code.to_string(),
                axes,
            },
        );
    }

    pub fn add_product(&self, product: Product) {
        self.state.write().insert_product(product, None);
    }

    pub fn add_selection(
        &self,
        product_id: &str,
        attribute_id: AttributeId,
        option_id: OptionId,
        is_selected: bool,
        sort: i32,
    ) {
        self.state.write().selections.push(SelectionRow {
            product_id: product_id.to_string(),
            attribute_id,
            option_id,
            is_selected,
            sort,
        });
    }

    /// Seed an existing variant with raw stored attribute text; returns its id
    pub fn add_variant(&self, parent_id: &str, values: &[(AttributeId, &str)]) -> Id {
        let mut state = self.state.write();
        let parent = state.products.get(parent_id).map(|p| p.product.clone());
        let id = generate_id();
        state.insert_product(
            Product {
                id: id.clone(),
                product_type: ProductType::Simple,
                family_id: parent.as_ref().and_then(|p| p.family_id),
                family_variant_id: parent.as_ref().and_then(|p| p.family_variant_id),
                parent_product_id: Some(parent_id.to_string()),
                enabled: true,
                variant_configuration: None,
            },
            None,
        );
        for (attribute_id, encoded) in values {
            state.upsert_attribute_value(AttributeValueRow {
                product_id: id.clone(),
                attribute_id: *attribute_id,
                encoded_value: encoded.to_string(),
            });
        }
        id
    }

    pub fn attach_image(&self, product_id: &str, media: &str) {
        self.state.write().attach_image(product_id, media);
    }

    /// Make each following transaction fail on create number `n + 1`
    pub fn fail_creates_after(&self, n: usize) {
        *self.fail_creates_after.write() = Some(n);
    }

    pub fn fail_generation_log(&self, fail: bool) {
        *self.fail_generation_log.write() = fail;
    }

    pub fn product(&self, id: &str) -> Option<Product> {
        self.state.read().products.get(id).map(|p| p.product.clone())
    }

    pub fn variants_of(&self, parent_id: &str) -> Vec<VariantProduct> {
        self.state.read().variants_of(parent_id)
    }

    pub fn created_by(&self, id: &str) -> Option<String> {
        self.state
            .read()
            .products
            .get(id)
            .and_then(|p| p.user_created.clone())
    }

    pub fn attribute_rows(&self, product_id: &str) -> Vec<AttributeValueRow> {
        self.state
            .read()
            .attribute_values
            .iter()
            .filter(|row| row.product_id == product_id)
            .cloned()
            .collect()
    }

    pub fn images_of(&self, product_id: &str) -> Vec<String> {
        self.state
            .read()
            .images
            .iter()
            .filter(|link| link.product_id == product_id)
            .map(|link| link.media.clone())
            .collect()
    }

    pub fn generation_logs(&self) -> Vec<GenerationLogEntry> {
        self.state.read().generation_logs.clone()
    }
}

#[async_trait::async_trait]
impl ProductStore for MemoryStore {
    async fn get_product(&self, id: &Id) -> Result<Option<Product>> {
        Ok(self.product(id))
    }

    async fn list_model_products(&self, family_variant_id: FamilyVariantId) -> Result<Vec<Product>> {
        let state = self.state.read();
        let mut models: Vec<&StoredProduct> = state
            .products
            .values()
            .filter(|p| {
                p.product.product_type == ProductType::Model
                    && p.product.family_variant_id == Some(family_variant_id)
            })
            .collect();
        models.sort_by_key(|p| p.seq);
        Ok(models.into_iter().map(|p| p.product.clone()).collect())
    }

    async fn list_variants(&self, parent_id: &Id) -> Result<Vec<VariantProduct>> {
        Ok(self.variants_of(parent_id))
    }
}

#[async_trait::async_trait]
impl AttributeStore for MemoryStore {
    async fn get_family_variant(&self, id: FamilyVariantId) -> Result<Option<FamilyVariant>> {
        Ok(self.state.read().family_variants.get(&id).cloned())
    }

    async fn list_family_variant_ids(&self) -> Result<Vec<FamilyVariantId>> {
        Ok(self.state.read().family_variants.keys().copied().collect())
    }

    async fn get_attribute(&self, id: AttributeId) -> Result<Option<Attribute>> {
        Ok(self.state.read().attributes.get(&id).cloned())
    }

    async fn find_attribute_by_code(&self, code: &str) -> Result<Option<Attribute>> {
        Ok(self
            .state
            .read()
            .attributes
            .values()
            .find(|a| a.code == code)
            .cloned())
    }

    async fn list_options(&self, attribute_id: AttributeId) -> Result<Vec<AttributeOption>> {
        Ok(self
            .state
            .read()
            .options
            .values()
            .filter(|o| o.attribute_id == attribute_id)
            .cloned()
            .collect())
    }
}

#[async_trait::async_trait]
impl SelectionStore for MemoryStore {
    async fn list_selected_options(&self, product_id: &Id, attribute_id: AttributeId) -> Result<Vec<AttributeOption>> {
        let state = self.state.read();
        let mut rows: Vec<&SelectionRow> = state
            .selections
            .iter()
            .filter(|s| s.product_id == *product_id && s.attribute_id == attribute_id && s.is_selected)
            .collect();
        rows.sort_by_key(|s| s.sort);
        Ok(rows
            .into_iter()
            .filter_map(|s| state.options.get(&s.option_id).cloned())
            .collect())
    }
}

pub struct MemoryTransaction {
    shared: Arc<RwLock<CatalogState>>,
    staged: Option<CatalogState>,
    user: Option<String>,
    creates_left: Option<usize>,
}

impl MemoryTransaction {
    fn staged(&mut self) -> Result<&mut CatalogState> {
        match self.staged.as_mut() {
            Some(state) => Ok(state),
            None => bail!("Transaction already committed"),
        }
    }
}

#[async_trait::async_trait]
impl ItemTransaction for MemoryTransaction {
    async fn create_one(&mut self, item: NewVariantProduct) -> Result<Id> {
        if let Some(left) = self.creates_left.as_mut() {
            if *left == 0 {
                bail!("Injected failure creating variant of {}", item.parent_product_id);
            }
            *left -= 1;
        }

        let user = item.user_created.clone().or_else(|| self.user.clone());
        let state = self.staged()?;
        state.insert_product(
            Product {
                id: item.id.clone(),
                product_type: ProductType::Simple,
                family_id: item.family_id,
                family_variant_id: item.family_variant_id,
                parent_product_id: Some(item.parent_product_id),
                enabled: item.enabled,
                variant_configuration: None,
            },
            user,
        );
        for attribute in item.attributes {
            state.upsert_attribute_value(AttributeValueRow {
                product_id: item.id.clone(),
                attribute_id: attribute.attribute_id,
                encoded_value: attribute.value,
            });
        }
        Ok(item.id)
    }

    async fn update_one(&mut self, id: &Id, update: VariantUpdate) -> Result<()> {
        let state = self.staged()?;
        let Some(stored) = state.products.get_mut(id) else {
            bail!("Product {} does not exist", id);
        };
        if let Some(enabled) = update.enabled {
            stored.product.enabled = enabled;
        }
        for attribute in update.attributes {
            state.upsert_attribute_value(AttributeValueRow {
                product_id: id.clone(),
                attribute_id: attribute.attribute_id,
                encoded_value: attribute.value,
            });
        }
        Ok(())
    }

    async fn delete_many(&mut self, ids: &[Id]) -> Result<()> {
        let state = self.staged()?;
        for id in ids {
            state.products.remove(id);
        }
        Ok(())
    }

    async fn delete_attribute_values(&mut self, product_ids: &[Id]) -> Result<u64> {
        let state = self.staged()?;
        let before = state.attribute_values.len();
        state
            .attribute_values
            .retain(|row| !product_ids.contains(&row.product_id));
        Ok((before - state.attribute_values.len()) as u64)
    }

    async fn remove_images(&mut self, product_ids: &[Id]) -> Result<u64> {
        let state = self.staged()?;
        let before = state.images.len();
        state.images.retain(|link| !product_ids.contains(&link.product_id));
        Ok((before - state.images.len()) as u64)
    }

    async fn attach_image(&mut self, product_id: &Id, media_id: &str) -> Result<()> {
        self.staged()?.attach_image(product_id, media_id);
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        let Some(staged) = self.staged.take() else {
            bail!("Transaction already committed");
        };
        *self.shared.write() = staged;
        Ok(())
    }
}

#[async_trait::async_trait]
impl TransactionalStore for MemoryStore {
    async fn begin(&self, ctx: &UserContext) -> Result<Box<dyn ItemTransaction>> {
        Ok(Box::new(MemoryTransaction {
            shared: self.state.clone(),
            staged: Some(self.state.read().clone()),
            user: ctx.audit_user(),
            creates_left: *self.fail_creates_after.read(),
        }))
    }
}

#[async_trait::async_trait]
impl GenerationLogStore for MemoryStore {
    async fn record_generation(&self, entry: GenerationLogEntry) -> Result<()> {
        if *self.fail_generation_log.read() {
            bail!("variant_generation_logs is not writable");
        }
        self.state.write().generation_logs.push(entry);
        Ok(())
    }
}

impl Store for MemoryStore {}
