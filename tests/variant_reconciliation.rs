use serde_json::json;
use std::sync::Arc;
use variant_reconciler::config::ReconcileConfig;
use variant_reconciler::logic::codec;
use variant_reconciler::seed::{self, HOODIE_MODEL_ID, TEE_MODEL_ID};
use variant_reconciler::{
    AttributeKind, MemoryStore, PreparedAttribute, PreparedVariant, Product, ReconcileCommand,
    ReconcileError, ReconcileQueue, UserContext, VariantEngine,
};

fn engine_over(store: &Arc<MemoryStore>) -> VariantEngine<MemoryStore> {
    VariantEngine::new(store.clone(), ReconcileConfig::default())
}

fn tee() -> String {
    TEE_MODEL_ID.to_string()
}

/// (color, size) codes of a product's variants in creation order
fn combinations_of(store: &MemoryStore, parent: &str) -> Vec<(String, String)> {
    store
        .variants_of(parent)
        .iter()
        .map(|v| {
            let read = |attr| {
                v.value_of(attr)
                    .map(|raw| codec::decode(raw, AttributeKind::Select).to_json())
                    .and_then(|value| value.get("code").and_then(|c| c.as_str()).map(str::to_string))
                    .unwrap_or_default()
            };
            (read(1), read(2))
        })
        .collect()
}

fn pair(color: &str, size: &str) -> (String, String) {
    (color.to_string(), size.to_string())
}

#[tokio::test]
async fn test_full_reconcile_creates_combinations_in_axis_order() {
    let store = Arc::new(seed::apparel_catalog());
    let engine = engine_over(&store);

    let result = engine
        .reconcile_product(&UserContext::new("merchandiser"), &tee())
        .await
        .unwrap();

    assert_eq!(result.created, 4);
    assert_eq!(result.updated, 0);
    assert_eq!(result.deleted, 0);
    assert!(result.is_clean(), "{:?}", result.errors);
    assert_eq!(
        combinations_of(&store, TEE_MODEL_ID),
        vec![pair("red", "s"), pair("red", "m"), pair("blue", "s"), pair("blue", "m")]
    );

    for variant in store.variants_of(TEE_MODEL_ID) {
        assert_eq!(variant.parent_product_id, TEE_MODEL_ID);
        assert_eq!(variant.family_variant_id, Some(seed::APPAREL_FAMILY_VARIANT_ID));
        assert_eq!(store.created_by(&variant.id), Some("merchandiser".to_string()));
    }
    println!("✓ Full reconcile created {} variants", result.created);
}

#[tokio::test]
async fn test_full_reconcile_with_empty_axis_selection_creates_nothing() {
    let store = Arc::new(seed::apparel_catalog());
    let mut tee = Product::model("sparse-tee", 1, seed::APPAREL_FAMILY_VARIANT_ID);
    tee.variant_configuration = Some(json!({"100": [10, 11], "101": []}));
    store.add_product(tee);

    let result = engine_over(&store)
        .reconcile_product(&UserContext::system(), &"sparse-tee".to_string())
        .await
        .unwrap();

    assert_eq!(result.created, 0);
    assert!(store.variants_of("sparse-tee").is_empty());
}

#[tokio::test]
async fn test_full_reconcile_is_repeatable() {
    let store = Arc::new(seed::apparel_catalog());
    let engine = engine_over(&store);
    let ctx = UserContext::system();

    engine.reconcile_product(&ctx, &tee()).await.unwrap();
    let first = combinations_of(&store, TEE_MODEL_ID);
    let second = engine.reconcile_product(&ctx, &tee()).await.unwrap();

    assert_eq!(second.deleted, 4);
    assert_eq!(second.created, 4);
    assert_eq!(combinations_of(&store, TEE_MODEL_ID), first);
    assert_eq!(store.generation_logs().len(), 2);
}

#[tokio::test]
async fn test_legacy_selection_table_drives_hoodie() {
    let store = Arc::new(seed::apparel_catalog());

    let result = engine_over(&store)
        .reconcile_product(&UserContext::system(), &HOODIE_MODEL_ID.to_string())
        .await
        .unwrap();

    // The disabled "s" selection row is ignored
    assert_eq!(result.created, 2);
    assert_eq!(
        combinations_of(&store, HOODIE_MODEL_ID),
        vec![pair("green", "m"), pair("green", "l")]
    );
}

#[tokio::test]
async fn test_failed_create_rolls_back_whole_product() {
    let store = Arc::new(seed::apparel_catalog());
    let engine = engine_over(&store);
    let ctx = UserContext::system();
    engine.reconcile_product(&ctx, &tee()).await.unwrap();
    let before: Vec<String> = store.variants_of(TEE_MODEL_ID).into_iter().map(|v| v.id).collect();

    store.fail_creates_after(2);
    let err = engine.reconcile_product(&ctx, &tee()).await.unwrap_err();
    assert!(!err.is_not_found());

    let after: Vec<String> = store.variants_of(TEE_MODEL_ID).into_iter().map(|v| v.id).collect();
    assert_eq!(before, after);
    for id in &after {
        assert!(!store.attribute_rows(id).is_empty());
    }
}

#[tokio::test]
async fn test_differential_updates_match_and_creates_new() {
    let store = Arc::new(seed::apparel_catalog());
    let existing = store.add_variant(TEE_MODEL_ID, &[(1, "\"red\""), (2, "\"s\"")]);

    let result = engine_over(&store)
        .reconcile_from_prepared(
            &UserContext::new("editor"),
            &tee(),
            &[
                PreparedVariant::with_attributes(vec![
                    PreparedAttribute::new(1, json!("red")),
                    PreparedAttribute::new(2, json!("s")),
                ])
                .name("Red tee S")
                .image("media-red"),
                PreparedVariant::with_attributes(vec![
                    PreparedAttribute::new(1, json!(11)),
                    PreparedAttribute::new(2, json!({"code": "m"})),
                ])
                .enabled(true),
            ],
            &[],
        )
        .await
        .unwrap();

    assert_eq!((result.created, result.updated, result.deleted), (1, 1, 0));
    assert!(result.is_clean(), "{:?}", result.errors);

    let variants = store.variants_of(TEE_MODEL_ID);
    assert_eq!(variants.len(), 2);
    let updated = variants.iter().find(|v| v.id == existing).unwrap();
    assert_eq!(updated.value_of(3), Some("\"Red tee S\""));
    assert_eq!(store.images_of(&existing), vec!["media-red".to_string()]);

    let created = variants.iter().find(|v| v.id != existing).unwrap();
    assert!(created.enabled);
    assert_eq!(store.created_by(&created.id), Some("editor".to_string()));
}

#[tokio::test]
async fn test_differential_deletes_requested_children_only() {
    let store = Arc::new(seed::apparel_catalog());
    let keep = store.add_variant(TEE_MODEL_ID, &[(1, "\"red\""), (2, "\"s\"")]);
    let drop = store.add_variant(TEE_MODEL_ID, &[(1, "\"blue\""), (2, "\"s\"")]);
    store.attach_image(&drop, "media-blue");
    let foreign = store.add_variant(HOODIE_MODEL_ID, &[(1, "\"green\""), (2, "\"m\"")]);

    let result = engine_over(&store)
        .reconcile_from_prepared(&UserContext::system(), &tee(), &[], &[drop.clone(), foreign.clone()])
        .await
        .unwrap();

    assert_eq!(result.deleted, 1);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains(&foreign));

    let ids: Vec<String> = store.variants_of(TEE_MODEL_ID).into_iter().map(|v| v.id).collect();
    assert_eq!(ids, vec![keep]);
    assert!(store.attribute_rows(&drop).is_empty());
    assert!(store.images_of(&drop).is_empty());
    assert_eq!(store.variants_of(HOODIE_MODEL_ID).len(), 1);
}

#[tokio::test]
async fn test_malformed_stored_values_still_match() {
    let store = Arc::new(seed::apparel_catalog());
    // Raw text written by an older importer
    let legacy = store.add_variant(TEE_MODEL_ID, &[(1, "red"), (2, "s")]);

    let result = engine_over(&store)
        .reconcile_from_prepared(
            &UserContext::system(),
            &tee(),
            &[PreparedVariant::with_attributes(vec![
                PreparedAttribute::new(1, json!("red")),
                PreparedAttribute::new(2, json!("s")),
            ])
            .name("Red S")],
            &[],
        )
        .await
        .unwrap();

    assert_eq!((result.created, result.updated), (0, 1));
    assert_eq!(store.variants_of(TEE_MODEL_ID)[0].id, legacy);
}

#[tokio::test]
async fn test_generation_log_failure_does_not_fail_reconcile() {
    let store = Arc::new(seed::apparel_catalog());
    store.fail_generation_log(true);

    let result = engine_over(&store)
        .reconcile_product(&UserContext::system(), &tee())
        .await
        .unwrap();

    assert_eq!(result.created, 4);
    assert!(store.generation_logs().is_empty());
}

#[tokio::test]
async fn test_reconcile_all_covers_every_model() {
    let store = Arc::new(seed::apparel_catalog());

    let result = engine_over(&store).reconcile_all(&UserContext::system()).await.unwrap();

    assert_eq!(result.created, 6);
    assert_eq!(store.variants_of(TEE_MODEL_ID).len(), 4);
    assert_eq!(store.variants_of(HOODIE_MODEL_ID).len(), 2);
}

#[tokio::test]
async fn test_queue_drains_commands_in_order() {
    let store = Arc::new(seed::apparel_catalog());
    let engine = engine_over(&store);

    let mut queue = ReconcileQueue::new();
    queue.enqueue(ReconcileCommand::Product(tee()));
    queue.enqueue(ReconcileCommand::Product("missing".to_string()));
    queue.enqueue(ReconcileCommand::FamilyVariant(seed::APPAREL_FAMILY_VARIANT_ID));
    queue.enqueue(ReconcileCommand::Product(tee()));
    assert_eq!(queue.len(), 3);

    let report = queue.drain(&engine, &UserContext::system()).await;
    assert!(queue.is_empty());
    assert_eq!(report.outcomes.len(), 3);
    assert!(report.outcomes[0].result.is_ok());
    assert!(report.outcomes[1].result.is_err());
    assert_eq!(report.total.created, 4 + 6);
    assert_eq!(report.total.deleted, 4);
    assert_eq!(report.total.errors.len(), 1);
}

#[tokio::test]
async fn test_family_variant_batch_continues_past_failing_product() {
    let store = Arc::new(seed::apparel_catalog());
    // The tee needs four creates, the hoodie two
    store.fail_creates_after(3);

    let result = engine_over(&store)
        .reconcile_family_variant(&UserContext::system(), seed::APPAREL_FAMILY_VARIANT_ID)
        .await
        .unwrap();

    assert_eq!(result.created, 2);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].starts_with(&format!("Product {}", TEE_MODEL_ID)), "{:?}", result.errors);
    assert!(store.variants_of(TEE_MODEL_ID).is_empty());
    assert_eq!(
        combinations_of(&store, HOODIE_MODEL_ID),
        vec![pair("green", "m"), pair("green", "l")]
    );
}

#[tokio::test]
async fn test_differential_update_keeps_unrelated_attributes() {
    let store = Arc::new(seed::apparel_catalog());
    let chest = r#"{"unit":{"id":3,"symbol":"cm"},"value":52}"#;
    let existing = store.add_variant(TEE_MODEL_ID, &[(1, "\"red\""), (2, "\"s\""), (5, chest)]);

    let result = engine_over(&store)
        .reconcile_from_prepared(
            &UserContext::system(),
            &tee(),
            &[PreparedVariant::with_attributes(vec![
                PreparedAttribute::new(1, json!("red")),
                PreparedAttribute::new(2, json!("s")),
            ])
            .name("Red S")],
            &[],
        )
        .await
        .unwrap();

    assert_eq!(result.updated, 1);
    let rows = store.attribute_rows(&existing);
    let value_of = |attribute_id| {
        rows.iter()
            .find(|row| row.attribute_id == attribute_id)
            .map(|row| row.encoded_value.clone())
    };
    assert_eq!(value_of(5).as_deref(), Some(chest));
    assert_eq!(value_of(3).as_deref(), Some("\"Red S\""));
    assert_eq!(rows.len(), 4);
}

#[tokio::test]
async fn test_differential_without_axes_still_deletes_requested_children() {
    let store = Arc::new(seed::apparel_catalog());
    store.add_family_variant(8, "plain", &[]);
    store.add_product(Product::model("plain-model", 1, 8));
    let child = store.add_variant("plain-model", &[]);

    let result = engine_over(&store)
        .reconcile_from_prepared(
            &UserContext::system(),
            &"plain-model".to_string(),
            &[PreparedVariant::with_attributes(vec![PreparedAttribute::new(1, json!("red"))])],
            &[child.clone(), "stranger".to_string()],
        )
        .await
        .unwrap();

    assert_eq!((result.created, result.updated, result.deleted), (0, 0, 1));
    assert_eq!(result.errors.len(), 2);
    assert!(result.errors[0].starts_with("Prepared variant #1"));
    assert!(result.errors[1].contains("stranger"));
    assert!(store.variants_of("plain-model").is_empty());
}

#[tokio::test]
async fn test_combination_limit_refuses_before_writing() {
    let store = Arc::new(seed::apparel_catalog());
    store.add_variant(TEE_MODEL_ID, &[(1, "\"red\""), (2, "\"s\"")]);
    let settings = ReconcileConfig {
        max_combinations: 3,
        ..ReconcileConfig::default()
    };
    let engine = VariantEngine::new(store.clone(), settings);

    let err = engine
        .reconcile_product(&UserContext::system(), &tee())
        .await
        .unwrap_err();

    assert!(matches!(err, ReconcileError::PerItemFailure { .. }), "{:?}", err);
    assert!(err.to_string().contains("more than the limit of 3"));
    assert_eq!(store.variants_of(TEE_MODEL_ID).len(), 1);
}
