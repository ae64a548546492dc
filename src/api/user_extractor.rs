use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, StatusCode},
    Json,
};

use crate::api::handlers::ErrorResponse;
use crate::model::UserContext;

/// Axum extractor for UserContext from request headers
///
/// - X-User-Id: Required user identifier; requests without it get 401
/// - X-User-Email: Optional user email
/// - X-User-Name: Optional user display name
#[async_trait]
impl<S> FromRequestParts<S> for UserContext
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let headers = &parts.headers;

        let Some(user_id) = extract_header_value(headers, "x-user-id") else {
            return Err((
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new("Authentication required: missing X-User-Id header")),
            ));
        };
        let user_email = extract_header_value(headers, "x-user-email");
        let user_name = extract_header_value(headers, "x-user-name");

        Ok(UserContext::with_details(user_id, user_email, user_name))
    }
}

/// Extract a non-empty header value as string
fn extract_header_value(headers: &HeaderMap, header_name: &str) -> Option<String> {
    headers
        .get(header_name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}
