//! Request authorization and error mapping for the REST surface.

use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::services::auth::{AuthService, TokenData, Unauthorized};

/// Errors surfaced to API clients.
#[derive(Debug)]
pub enum ApiError {
    /// 401 with a `WWW-Authenticate` challenge.
    Unauthorized(Unauthorized),
    /// 404 with a detail message.
    NotFound(&'static str),
    /// 422 for malformed path parameters.
    Validation(String),
    /// 500 for everything else.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized(unauthorized) => {
                let mut response = (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({ "detail": unauthorized.detail })),
                )
                    .into_response();
                if let Ok(value) = unauthorized.challenge.parse() {
                    response
                        .headers_mut()
                        .insert(header::WWW_AUTHENTICATE, value);
                }
                response
            }
            ApiError::NotFound(detail) => {
                (StatusCode::NOT_FOUND, Json(json!({ "detail": detail }))).into_response()
            }
            ApiError::Validation(detail) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "detail": detail })),
            )
                .into_response(),
            ApiError::Internal(detail) => {
                tracing::error!(detail = %detail, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "detail": "Internal server error" })),
                )
                    .into_response()
            }
        }
    }
}

/// Extract the bearer token and validate it against `required_scopes`.
pub fn authorize(
    auth: &AuthService,
    headers: &HeaderMap,
    required_scopes: &[&str],
) -> Result<TokenData, ApiError> {
    let challenge = if required_scopes.is_empty() {
        "Bearer".to_string()
    } else {
        format!("Bearer scope=\"{}\"", required_scopes.join(" "))
    };

    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized(Unauthorized {
            detail: "Not authenticated",
            challenge,
        }))?;

    auth.check_authorization(required_scopes, token)
        .map_err(ApiError::Unauthorized)
}
