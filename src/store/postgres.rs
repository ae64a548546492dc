use anyhow::{Context, Result};
use sqlx::postgres::{PgConnection, PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::collections::HashMap;

use crate::model::{
    Attribute, AttributeId, AttributeKind, AttributeOption, AttributeValueRow, FamilyVariant,
    FamilyVariantId, GenerationLogEntry, Id, NewVariantProduct, Product, ProductType,
    UserContext, VariantAxis, VariantProduct, VariantUpdate, generate_id,
};
use crate::store::traits::{
    AttributeStore, GenerationLogStore, ItemTransaction, ProductStore, SelectionStore, Store,
    TransactionalStore,
};

const PRODUCT_COLUMNS: &str =
    "id, product_type, family, family_variant, parent_product_id, enabled, variant_configuration";

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store with the given database URL
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to create PostgreSQL connection pool")?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn product_from_row(row: &PgRow) -> Result<Product> {
    let id: String = row.try_get("id")?;
    let stored_type: String = row.try_get("product_type")?;
    let product_type = ProductType::from_stored(&stored_type)
        .ok_or_else(|| anyhow::anyhow!("Product {} has unknown product_type '{}'", id, stored_type))?;

    Ok(Product {
        id,
        product_type,
        family_id: row.try_get("family")?,
        family_variant_id: row.try_get("family_variant")?,
        parent_product_id: row.try_get("parent_product_id")?,
        enabled: row.try_get::<Option<bool>, _>("enabled")?.unwrap_or(false),
        variant_configuration: row.try_get("variant_configuration")?,
    })
}

fn attribute_from_row(row: &PgRow) -> Result<Attribute> {
    let kind: String = row.try_get("kind")?;
    Ok(Attribute {
        id: row.try_get("id")?,
        code: row.try_get("code")?,
        label: row.try_get("label")?,
        kind: AttributeKind::from_stored(&kind),
    })
}

fn option_from_row(row: &PgRow) -> Result<AttributeOption> {
    let code: String = row.try_get("code")?;
    let label: Option<String> = row.try_get("label")?;
    Ok(AttributeOption {
        id: row.try_get("id")?,
        attribute_id: row.try_get("attribute_id")?,
        label: label.unwrap_or_else(|| code.clone()),
        code,
        value: row
            .try_get::<Option<serde_json::Value>, _>("value")?
            .unwrap_or(serde_json::Value::Null),
    })
}

#[async_trait::async_trait]
impl ProductStore for PostgresStore {
    async fn get_product(&self, id: &Id) -> Result<Option<Product>> {
        let row = sqlx::query(&format!("SELECT {} FROM products WHERE id = $1", PRODUCT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch product")?;

        let Some(row) = row else {
            return Ok(None);
        };
        product_from_row(&row).map(Some)
    }

    async fn list_model_products(&self, family_variant_id: FamilyVariantId) -> Result<Vec<Product>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM products WHERE family_variant = $1 AND product_type = 'product_model' ORDER BY id",
            PRODUCT_COLUMNS
        ))
        .bind(family_variant_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list model products")?;

        rows.iter().map(product_from_row).collect()
    }

    async fn list_variants(&self, parent_id: &Id) -> Result<Vec<VariantProduct>> {
        let rows = sqlx::query(
            r#"
            SELECT id, family, family_variant, enabled
            FROM products
            WHERE parent_product_id = $1 AND product_type = 'simple'
            ORDER BY date_created, id
            "#,
        )
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list variants")?;

        let mut variants = Vec::with_capacity(rows.len());
        for row in &rows {
            variants.push(VariantProduct {
                id: row.try_get("id")?,
                parent_product_id: parent_id.clone(),
                family_id: row.try_get("family")?,
                family_variant_id: row.try_get("family_variant")?,
                enabled: row.try_get::<Option<bool>, _>("enabled")?.unwrap_or(false),
                attribute_values: Vec::new(),
            });
        }
        if variants.is_empty() {
            return Ok(variants);
        }

        let ids: Vec<String> = variants.iter().map(|v| v.id.clone()).collect();
        let value_rows = sqlx::query(
            "SELECT product_id, attribute_id, value FROM product_attributes WHERE product_id = ANY($1) ORDER BY id",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load variant attribute values")?;

        let mut by_product: HashMap<String, Vec<AttributeValueRow>> = HashMap::new();
        for row in &value_rows {
            let Some(encoded_value) = row.try_get::<Option<String>, _>("value")? else {
                continue;
            };
            let product_id: String = row.try_get("product_id")?;
            by_product.entry(product_id.clone()).or_default().push(AttributeValueRow {
                product_id,
                attribute_id: row.try_get("attribute_id")?,
                encoded_value,
            });
        }
        for variant in &mut variants {
            variant.attribute_values = by_product.remove(&variant.id).unwrap_or_default();
        }
        Ok(variants)
    }
}

#[async_trait::async_trait]
impl AttributeStore for PostgresStore {
    async fn get_family_variant(&self, id: FamilyVariantId) -> Result<Option<FamilyVariant>> {
        let row = sqlx::query("SELECT id, family, code FROM family_variants WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch family variant")?;

        let Some(row) = row else {
            return Ok(None);
        };

        let axis_rows = sqlx::query(
            r#"
            SELECT fva.id, fva.attributes_id, COALESCE(a.code, '') AS attribute_code, COALESCE(fva.sort, 0) AS sort
            FROM family_variants_axes fva
            LEFT JOIN attributes a ON a.id = fva.attributes_id
            WHERE fva.family_variants_id = $1
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch family variant axes")?;

        let mut axes = Vec::with_capacity(axis_rows.len());
        for axis in &axis_rows {
            axes.push(VariantAxis {
                id: axis.try_get("id")?,
                attribute_id: axis.try_get("attributes_id")?,
                attribute_code: axis.try_get("attribute_code")?,
                sort_order: axis.try_get("sort")?,
            });
        }

        Ok(Some(FamilyVariant {
            id: row.try_get("id")?,
            family_id: row.try_get("family")?,
            code: row.try_get("code")?,
            axes,
        }))
    }

    async fn list_family_variant_ids(&self) -> Result<Vec<FamilyVariantId>> {
        let rows = sqlx::query("SELECT id FROM family_variants ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list family variants")?;

        rows.iter()
            .map(|row| row.try_get("id").map_err(anyhow::Error::from))
            .collect()
    }

    async fn get_attribute(&self, id: AttributeId) -> Result<Option<Attribute>> {
        let row = sqlx::query("SELECT id, code, label, kind FROM attributes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch attribute")?;

        let Some(row) = row else {
            return Ok(None);
        };
        attribute_from_row(&row).map(Some)
    }

    async fn find_attribute_by_code(&self, code: &str) -> Result<Option<Attribute>> {
        let row = sqlx::query("SELECT id, code, label, kind FROM attributes WHERE code = $1 LIMIT 1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch attribute by code")?;

        let Some(row) = row else {
            return Ok(None);
        };
        attribute_from_row(&row).map(Some)
    }

    async fn list_options(&self, attribute_id: AttributeId) -> Result<Vec<AttributeOption>> {
        let rows = sqlx::query(
            "SELECT id, attribute_id, code, label, value FROM attribute_options WHERE attribute_id = $1 ORDER BY id",
        )
        .bind(attribute_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list attribute options")?;

        rows.iter().map(option_from_row).collect()
    }
}

#[async_trait::async_trait]
impl SelectionStore for PostgresStore {
    async fn list_selected_options(&self, product_id: &Id, attribute_id: AttributeId) -> Result<Vec<AttributeOption>> {
        let rows = sqlx::query(
            r#"
            SELECT o.id, o.attribute_id, o.code, o.label, o.value
            FROM product_variant_selections s
            JOIN attribute_options o ON o.id = s.attribute_option_id
            WHERE s.product_id = $1 AND s.attribute_id = $2 AND s.is_selected = TRUE
            ORDER BY s.sort, s.id
            "#,
        )
        .bind(product_id)
        .bind(attribute_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list selected options")?;

        rows.iter().map(option_from_row).collect()
    }
}

/// Item-storage writes inside one PostgreSQL transaction
pub struct PgItemTransaction {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgItemTransaction {
    fn conn(&mut self) -> Result<&mut PgConnection> {
        self.tx
            .as_deref_mut()
            .ok_or_else(|| anyhow::anyhow!("Transaction already committed"))
    }

    async fn insert_attribute_values(&mut self, rows: &[AttributeValueRow]) -> Result<()> {
        for row in rows {
            sqlx::query("INSERT INTO product_attributes (product_id, attribute_id, value) VALUES ($1, $2, $3)")
                .bind(&row.product_id)
                .bind(row.attribute_id)
                .bind(&row.encoded_value)
                .execute(self.conn()?)
                .await
                .context("Failed to insert attribute value")?;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ItemTransaction for PgItemTransaction {
    async fn create_one(&mut self, item: NewVariantProduct) -> Result<Id> {
        let row = sqlx::query(
            r#"
            INSERT INTO products (id, product_type, family, family_variant, parent_product_id, enabled, user_created, date_created)
            VALUES ($1, 'simple', $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(&item.id)
        .bind(item.family_id)
        .bind(item.family_variant_id)
        .bind(&item.parent_product_id)
        .bind(item.enabled)
        .bind(&item.user_created)
        .bind(item.date_created)
        .fetch_one(self.conn()?)
        .await
        .context("Failed to create variant product")?;
        let id: String = row.try_get("id")?;

        let rows: Vec<AttributeValueRow> = item
            .attributes
            .into_iter()
            .map(|a| AttributeValueRow {
                product_id: id.clone(),
                attribute_id: a.attribute_id,
                encoded_value: a.value,
            })
            .collect();
        self.insert_attribute_values(&rows).await?;
        Ok(id)
    }

    async fn update_one(&mut self, id: &Id, update: VariantUpdate) -> Result<()> {
        if let Some(enabled) = update.enabled {
            sqlx::query("UPDATE products SET enabled = $2, date_updated = NOW() WHERE id = $1")
                .bind(id)
                .bind(enabled)
                .execute(self.conn()?)
                .await
                .context("Failed to update variant product")?;
        }

        for attribute in update.attributes {
            sqlx::query("DELETE FROM product_attributes WHERE product_id = $1 AND attribute_id = $2")
                .bind(id)
                .bind(attribute.attribute_id)
                .execute(self.conn()?)
                .await
                .context("Failed to replace variant attribute value")?;
            sqlx::query("INSERT INTO product_attributes (product_id, attribute_id, value) VALUES ($1, $2, $3)")
                .bind(id)
                .bind(attribute.attribute_id)
                .bind(&attribute.value)
                .execute(self.conn()?)
                .await
                .context("Failed to write variant attribute value")?;
        }
        Ok(())
    }

    async fn delete_many(&mut self, ids: &[Id]) -> Result<()> {
        sqlx::query("DELETE FROM products WHERE id = ANY($1)")
            .bind(ids)
            .execute(self.conn()?)
            .await
            .context("Failed to delete products")?;
        Ok(())
    }

    async fn delete_attribute_values(&mut self, product_ids: &[Id]) -> Result<u64> {
        let result = sqlx::query("DELETE FROM product_attributes WHERE product_id = ANY($1)")
            .bind(product_ids)
            .execute(self.conn()?)
            .await
            .context("Failed to delete attribute values")?;
        Ok(result.rows_affected())
    }

    async fn remove_images(&mut self, product_ids: &[Id]) -> Result<u64> {
        let rows = sqlx::query("DELETE FROM products_product_images WHERE products_id = ANY($1) RETURNING product_images_id")
            .bind(product_ids)
            .fetch_all(self.conn()?)
            .await
            .context("Failed to remove product image assignments")?;

        let image_ids = rows
            .iter()
            .map(|row| row.try_get::<String, _>("product_images_id"))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        if image_ids.is_empty() {
            return Ok(0);
        }

        sqlx::query("DELETE FROM product_images WHERE id = ANY($1)")
            .bind(&image_ids)
            .execute(self.conn()?)
            .await
            .context("Failed to remove product images")?;
        Ok(image_ids.len() as u64)
    }

    async fn attach_image(&mut self, product_id: &Id, media_id: &str) -> Result<()> {
        let image_id = generate_id();
        sqlx::query("INSERT INTO product_images (id, media, role, sort) VALUES ($1, $2, $3, 1)")
            .bind(&image_id)
            .bind(media_id)
            .bind(serde_json::json!(["base"]))
            .execute(self.conn()?)
            .await
            .context("Failed to create product image")?;
        sqlx::query("INSERT INTO products_product_images (products_id, product_images_id) VALUES ($1, $2)")
            .bind(product_id)
            .bind(&image_id)
            .execute(self.conn()?)
            .await
            .context("Failed to assign product image")?;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| anyhow::anyhow!("Transaction already committed"))?;
        tx.commit().await.context("Failed to commit transaction")
    }
}

#[async_trait::async_trait]
impl TransactionalStore for PostgresStore {
    async fn begin(&self, ctx: &UserContext) -> Result<Box<dyn ItemTransaction>> {
        let tx = self.pool.begin().await.context("Failed to begin transaction")?;
        log::debug!("Began item transaction for {}", ctx.user_id);
        Ok(Box::new(PgItemTransaction { tx: Some(tx) }))
    }
}

#[async_trait::async_trait]
impl GenerationLogStore for PostgresStore {
    async fn record_generation(&self, entry: GenerationLogEntry) -> Result<()> {
        let details = serde_json::json!({
            "errors": entry.errors,
            "timestamp": entry.timestamp,
        });
        sqlx::query(
            r#"
            INSERT INTO variant_generation_logs
                (family_variant_id, model_product_id, action, variants_created, variants_updated, variants_deleted, details, user_created, date_created)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(entry.family_variant_id)
        .bind(&entry.model_product_id)
        .bind(&entry.action)
        .bind(entry.created as i64)
        .bind(entry.updated as i64)
        .bind(entry.deleted as i64)
        .bind(details)
        .bind(&entry.user)
        .bind(entry.timestamp)
        .execute(&self.pool)
        .await
        .context("Failed to record variant generation")?;
        Ok(())
    }
}

impl Store for PostgresStore {}
