use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    Json as RequestJson,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;

use crate::error::ReconcileError;
use crate::logic::{ReconcileCommand, ReconcileQueue, VariantEngine};
use crate::model::{CombinationBreakdown, FamilyVariantId, GenerationResult, Id, PreparedVariant, UserContext};
use crate::store::traits::Store;

pub type AppState<S> = Arc<VariantEngine<S>>;

/// Simple health check endpoint
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: &str) -> Self {
        Self {
            error: message.to_string(),
        }
    }
}

/// HTTP status for an engine failure
pub fn error_response(err: &ReconcileError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match err {
        ReconcileError::NotFound { .. } => StatusCode::NOT_FOUND,
        ReconcileError::InvalidProductType { .. } | ReconcileError::PerItemFailure { .. } => {
            StatusCode::BAD_REQUEST
        }
        ReconcileError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ErrorResponse::new(&err.to_string())))
}

fn bad_request(message: &str) -> (StatusCode, Json<ErrorResponse>) {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(message)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerMode {
    Product,
    FamilyVariant,
    All,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerRequest {
    #[serde(default)]
    pub mode: Option<TriggerMode>,
    #[serde(default, deserialize_with = "optional_id")]
    pub product_id: Option<Id>,
    #[serde(default)]
    pub family_variant_id: Option<FamilyVariantId>,
    #[serde(default)]
    pub prepared_variants: Vec<PreparedVariant>,
    #[serde(default)]
    pub delete_variant_ids: Vec<Id>,
}

/// Product ids arrive as strings or numbers
fn optional_id<'de, D>(deserializer: D) -> Result<Option<Id>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!("invalid product id {}", other))),
    }
}

impl TriggerRequest {
    /// Turn the request into a queue command; the mode defaults from the fields present
    pub fn into_command(self) -> Result<ReconcileCommand, String> {
        let mode = match self.mode {
            Some(mode) => mode,
            None if self.product_id.is_some() => TriggerMode::Product,
            None if self.family_variant_id.is_some() => TriggerMode::FamilyVariant,
            None => return Err("mode is required".to_string()),
        };

        match mode {
            TriggerMode::Product => {
                let product_id = self
                    .product_id
                    .ok_or_else(|| "productId is required for mode 'product'".to_string())?;
                if self.prepared_variants.is_empty() && self.delete_variant_ids.is_empty() {
                    Ok(ReconcileCommand::Product(product_id))
                } else {
                    Ok(ReconcileCommand::Prepared {
                        product_id,
                        variants: self.prepared_variants,
                        delete_ids: self.delete_variant_ids,
                    })
                }
            }
            TriggerMode::FamilyVariant => self
                .family_variant_id
                .map(ReconcileCommand::FamilyVariant)
                .ok_or_else(|| "familyVariantId is required for mode 'family_variant'".to_string()),
            TriggerMode::All => Ok(ReconcileCommand::All),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub result: GenerationResult,
}

pub async fn trigger_variant_generator<S: Store + 'static>(
    State(engine): State<AppState<S>>,
    user: UserContext,
    RequestJson(request): RequestJson<TriggerRequest>,
) -> Result<Json<TriggerResponse>, (StatusCode, Json<ErrorResponse>)> {
    let command = request.into_command().map_err(|e| bad_request(&e))?;
    log::info!("Variant generation for {} triggered by {}", command, user.user_id);

    let mut queue = ReconcileQueue::new();
    queue.enqueue(command);
    let mut report = queue.drain(&engine, &user).await;

    let Some(outcome) = report.outcomes.pop() else {
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new("Reconciliation produced no outcome")),
        ));
    };

    match outcome.result {
        Ok(result) => Ok(Json(TriggerResponse {
            success: true,
            message: format!("Variant generation completed for {}", outcome.command),
            result,
        })),
        Err(e) => Err(error_response(&e)),
    }
}

pub async fn preview_variant_breakdown<S: Store + 'static>(
    State(engine): State<AppState<S>>,
    Path(product_id): Path<Id>,
) -> Result<Json<CombinationBreakdown>, (StatusCode, Json<ErrorResponse>)> {
    engine
        .preview_combination_breakdown(&product_id)
        .await
        .map(Json)
        .map_err(|e| error_response(&e))
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: u64,
}

pub async fn preview_variant_count<S: Store + 'static>(
    State(engine): State<AppState<S>>,
    Path(product_id): Path<Id>,
) -> Result<Json<CountResponse>, (StatusCode, Json<ErrorResponse>)> {
    engine
        .preview_combination_count(&product_id)
        .await
        .map(|count| Json(CountResponse { count }))
        .map_err(|e| error_response(&e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(body: serde_json::Value) -> TriggerRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_product_mode_picks_full_or_differential() {
        let full = request(json!({"mode": "product", "productId": 42})).into_command().unwrap();
        assert_eq!(full, ReconcileCommand::Product("42".to_string()));

        let differential = request(json!({
            "mode": "product",
            "productId": "tee",
            "preparedVariants": [{"attributes": [{"attributeId": 1, "value": "red"}]}],
            "deleteVariantIds": ["v-1"]
        }))
        .into_command()
        .unwrap();
        assert!(matches!(
            differential,
            ReconcileCommand::Prepared { ref delete_ids, .. } if delete_ids == &vec!["v-1".to_string()]
        ));
    }

    #[test]
    fn test_mode_inferred_and_validated() {
        assert_eq!(
            request(json!({"familyVariantId": 7})).into_command().unwrap(),
            ReconcileCommand::FamilyVariant(7)
        );
        assert_eq!(request(json!({"mode": "all"})).into_command().unwrap(), ReconcileCommand::All);
        assert!(request(json!({})).into_command().is_err());
        assert!(request(json!({"mode": "product"})).into_command().is_err());
        assert!(request(json!({"mode": "family_variant"})).into_command().is_err());
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(error_response(&ReconcileError::not_found("Product", "x")).0, StatusCode::NOT_FOUND);
        assert_eq!(
            error_response(&ReconcileError::InvalidProductType {
                id: "x".to_string(),
                product_type: "simple".to_string(),
            })
            .0,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            error_response(&anyhow::anyhow!("db down").into()).0,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
