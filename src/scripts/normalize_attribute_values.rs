use anyhow::{Context, Result};
use sqlx::{PgPool, Row};
use variant_reconciler::logic::codec;
use variant_reconciler::model::AttributeKind;

/// Rewrites product_attributes rows written by tools that bypass the codec
#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .filter_module("sqlx", log::LevelFilter::Warn)
        .init();

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = PgPool::connect(&database_url).await?;

    log::info!("Connected to database. Normalizing stored attribute values...");

    let rows: Vec<(i64, String, AttributeKind)> = sqlx::query(
        r#"
        SELECT pa.id, pa.value, a.kind
        FROM product_attributes pa
        JOIN attributes a ON a.id = pa.attribute_id
        WHERE pa.value IS NOT NULL
        ORDER BY pa.id
        "#,
    )
    .fetch_all(&pool)
    .await
    .context("Failed to load product_attributes")?
    .into_iter()
    .map(|row| {
        (
            row.get::<i64, _>("id"),
            row.get::<String, _>("value"),
            AttributeKind::from_stored(&row.get::<String, _>("kind")),
        )
    })
    .collect();

    let total = rows.len();
    log::info!("Found {} attribute values to check", total);

    let mut rewritten = 0usize;
    for (i, (id, stored, kind)) in rows.iter().enumerate() {
        if (i + 1) % 100 == 0 || i + 1 == total {
            log::info!("Processed {}/{} values ({} rewritten)", i + 1, total, rewritten);
        }

        let Some(canonical) = codec::canonicalize(stored, *kind) else {
            continue;
        };

        sqlx::query("UPDATE product_attributes SET value = $1 WHERE id = $2")
            .bind(&canonical)
            .bind(id)
            .execute(&pool)
            .await
            .with_context(|| format!("Failed to rewrite attribute value {}", id))?;
        rewritten += 1;
    }

    log::info!("Normalization completed: {} of {} values rewritten", rewritten, total);
    Ok(())
}
