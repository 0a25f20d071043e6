use crate::gateways::GatewayError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application-specific error types.
///
/// Every variant renders as the `{ "success": false, "message": ... }`
/// envelope the checkout front-end expects.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required secret or backing service is not configured.
    #[error("Configuration missing: {0}")]
    ConfigurationMissing(String),
    /// Client input rejected before any network or database call.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
    /// Admin token mismatch.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    /// Resource not found error.
    #[error("Not found: {0}")]
    NotFound(String),
    /// Payment gateway failure (not configured, rejected, unusable response).
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    /// Database-related errors.
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
    /// Any other unexpected failure.
    #[error("Internal error: {0}")]
    InternalFailure(String),
    /// Error with context chain for better debugging.
    #[error("{context}: {source}")]
    WithContext {
        /// The underlying source of the error.
        source: Box<AppError>,
        /// Additional context message.
        context: String,
    },
}

impl IntoResponse for AppError {
    /// Maps each error variant to an HTTP status and JSON body.
    ///
    /// Server-side failures are logged here and replaced by a generic message
    /// so no internal detail reaches the client.
    fn into_response(self) -> Response {
        let (status, message, detail) = match self {
            AppError::ConfigurationMissing(msg) => {
                tracing::error!("Configuration missing: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg, None)
            }
            AppError::ValidationFailed(msg) => (StatusCode::BAD_REQUEST, msg, None),
            AppError::Unauthorized(msg) => {
                tracing::warn!("Unauthorized access: {}", msg);
                (StatusCode::FORBIDDEN, "Unauthorized".to_string(), None)
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            AppError::Gateway(err) => gateway_response_parts(err),
            AppError::DatabaseError(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal error".to_string(),
                    None,
                )
            }
            AppError::InternalFailure(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal error".to_string(),
                    None,
                )
            }
            AppError::WithContext { source, context } => {
                // Log full context chain, then answer as the underlying error
                tracing::error!("Error with context: {} -> {}", context, source);
                return source.into_response();
            }
        };

        let mut body = json!({
            "success": false,
            "message": message,
        });
        if let Some(detail) = detail {
            body["detail"] = detail;
        }

        (status, Json(body)).into_response()
    }
}

fn gateway_response_parts(err: GatewayError) -> (StatusCode, String, Option<serde_json::Value>) {
    match err {
        GatewayError::NotConfigured(msg) => {
            tracing::error!("Gateway not configured: {}", msg);
            (StatusCode::INTERNAL_SERVER_ERROR, msg, None)
        }
        GatewayError::Transport(msg) => {
            tracing::error!("Gateway transport error: {}", msg);
            (
                StatusCode::BAD_GATEWAY,
                "Payment gateway unavailable".to_string(),
                None,
            )
        }
        GatewayError::UpstreamRejected {
            status,
            message,
            body,
        } => {
            tracing::error!("Gateway rejected request with {}: {}", status, body);
            let detail = ["details", "detalhes", "errors"]
                .iter()
                .find_map(|key| body.get(*key).filter(|v| !v.is_null()).cloned());
            (StatusCode::BAD_GATEWAY, message, detail)
        }
        GatewayError::IncompleteResponse => {
            tracing::error!("Gateway response missing transaction id or PIX code");
            (
                StatusCode::BAD_GATEWAY,
                "Gateway did not return expected data".to_string(),
                None,
            )
        }
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `AppError` type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T, AppError>;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Into<AppError>,
{
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e.into()),
            context: context.into(),
        })
    }
}
