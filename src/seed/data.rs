use crate::model::{Attribute, AttributeKind, AttributeOption, Product};
use crate::store::MemoryStore;
use serde_json::json;

pub const TEE_MODEL_ID: &str = "tee-model";
pub const HOODIE_MODEL_ID: &str = "hoodie-model";
pub const APPAREL_FAMILY_VARIANT_ID: i64 = 1;

fn option(id: i64, attribute_id: i64, code: &str, label: &str, value: serde_json::Value) -> AttributeOption {
    AttributeOption {
        id,
        attribute_id,
        code: code.to_string(),
        label: label.to_string(),
        value,
    }
}

/// Demo apparel catalog: color x size family variant with two model products.
///
/// The tee selects its options through `variant_configuration`, the hoodie
/// through the legacy selection table.
pub fn apparel_catalog() -> MemoryStore {
    let store = MemoryStore::new();

    let attributes = [
        (1, "color", "Color", AttributeKind::Select),
        (2, "size", "Size", AttributeKind::Select),
        (3, "name", "Name", AttributeKind::Text),
        (4, "price", "Price", AttributeKind::Number),
        (5, "chest_width", "Chest width", AttributeKind::Measurement),
    ];
    for (id, code, label, kind) in attributes {
        store.insert_attribute(Attribute {
            id,
            code: code.to_string(),
            label: Some(label.to_string()),
            kind,
        });
    }

    store.insert_option(option(10, 1, "red", "Red", json!("Red")));
    store.insert_option(option(11, 1, "blue", "Blue", json!("Blue")));
    store.insert_option(option(12, 1, "green", "Green", json!("Green")));
    store.insert_option(option(20, 2, "s", "S", json!("S")));
    store.insert_option(option(21, 2, "m", "M", json!("M")));
    store.insert_option(option(22, 2, "l", "L", json!("L")));

    // Axis row ids 100/101 are what variant_configuration keys refer to
    store.add_family_variant(APPAREL_FAMILY_VARIANT_ID, "apparel_color_size", &[(100, 1, 1), (101, 2, 2)]);

    let mut tee = Product::model(TEE_MODEL_ID, 1, APPAREL_FAMILY_VARIANT_ID);
    tee.variant_configuration = Some(json!({"100": [10, 11], "101": [20, 21]}));
    store.add_product(tee);

    store.add_product(Product::model(HOODIE_MODEL_ID, 1, APPAREL_FAMILY_VARIANT_ID));
    store.add_selection(HOODIE_MODEL_ID, 1, 12, true, 1);
    store.add_selection(HOODIE_MODEL_ID, 2, 21, true, 1);
    store.add_selection(HOODIE_MODEL_ID, 2, 22, true, 2);
    store.add_selection(HOODIE_MODEL_ID, 2, 20, false, 3);

    log::info!("Loaded demo apparel catalog");
    store
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ProductStore;

    #[tokio::test]
    async fn test_apparel_catalog_has_both_models() {
        let store = apparel_catalog();
        let models = store.list_model_products(APPAREL_FAMILY_VARIANT_ID).await.unwrap();
        let ids: Vec<&str> = models.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec![TEE_MODEL_ID, HOODIE_MODEL_ID]);
        println!("✓ Demo catalog seeded with {} model products", models.len());
    }
}
