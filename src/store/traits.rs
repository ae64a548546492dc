use crate::model::{
    Attribute, AttributeId, AttributeOption, FamilyVariant, FamilyVariantId,
    GenerationLogEntry, Id, NewVariantProduct, Product, UserContext, VariantProduct,
    VariantUpdate,
};
use anyhow::Result;

/// Read access to the products collection
#[async_trait::async_trait]
pub trait ProductStore: Send + Sync {
    async fn get_product(&self, id: &Id) -> Result<Option<Product>>;
    /// Model products whose family variant is `family_variant_id`
    async fn list_model_products(&self, family_variant_id: FamilyVariantId) -> Result<Vec<Product>>;
    /// Child variants of a model product with all of their attribute rows
    async fn list_variants(&self, parent_id: &Id) -> Result<Vec<VariantProduct>>;
}

/// Read-only access to attributes, options and family variants
#[async_trait::async_trait]
pub trait AttributeStore: Send + Sync {
    async fn get_family_variant(&self, id: FamilyVariantId) -> Result<Option<FamilyVariant>>;
    async fn list_family_variant_ids(&self) -> Result<Vec<FamilyVariantId>>;
    async fn get_attribute(&self, id: AttributeId) -> Result<Option<Attribute>>;
    async fn find_attribute_by_code(&self, code: &str) -> Result<Option<Attribute>>;
    /// All options of an attribute, in option id order
    async fn list_options(&self, attribute_id: AttributeId) -> Result<Vec<AttributeOption>>;
}

/// Legacy per-axis selection table (product_variant_selections)
#[async_trait::async_trait]
pub trait SelectionStore: Send + Sync {
    /// Options marked selected for the product and attribute, ordered by the row's sort value
    async fn list_selected_options(
        &self,
        product_id: &Id,
        attribute_id: AttributeId,
    ) -> Result<Vec<AttributeOption>>;
}

/// Item-storage writes scoped to one transaction.
///
/// Dropping a transaction without calling `commit` rolls it back.
#[async_trait::async_trait]
pub trait ItemTransaction: Send {
    /// `createOne("products", data)`; writes the product and its attribute rows
    async fn create_one(&mut self, item: NewVariantProduct) -> Result<Id>;
    /// `updateOne("products", id, data)`; upserts only the given attribute rows
    async fn update_one(&mut self, id: &Id, update: VariantUpdate) -> Result<()>;
    /// `deleteMany("products", ids)`
    async fn delete_many(&mut self, ids: &[Id]) -> Result<()>;
    async fn delete_attribute_values(&mut self, product_ids: &[Id]) -> Result<u64>;
    /// Remove every image assignment of the products (junction and image rows)
    async fn remove_images(&mut self, product_ids: &[Id]) -> Result<u64>;
    /// Assign `media_id` as the product's single base image
    async fn attach_image(&mut self, product_id: &Id, media_id: &str) -> Result<()>;
    async fn commit(&mut self) -> Result<()>;
}

#[async_trait::async_trait]
pub trait TransactionalStore: Send + Sync {
    async fn begin(&self, ctx: &UserContext) -> Result<Box<dyn ItemTransaction>>;
}

#[async_trait::async_trait]
pub trait GenerationLogStore: Send + Sync {
    async fn record_generation(&self, entry: GenerationLogEntry) -> Result<()>;
}

pub trait Store:
    ProductStore + AttributeStore + SelectionStore + TransactionalStore + GenerationLogStore + Send + Sync
{
}
