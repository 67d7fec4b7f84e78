use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_helpers::{ErrorCode, ErrorResponse};
use chrono::NaiveDate;
use serde_json::json;
use thiserror::Error;

use crate::models::{
    CloudProvider, ComparisonResponse, ComparisonResult, IngestReport, PricingKey, ServiceType,
    Violation,
};

/// Result type for pricing operations
pub type PricingResult<T> = Result<T, PricingError>;

/// Errors that can occur in the pricing domain
#[derive(Debug, Error)]
pub enum PricingError {
    /// No catalog entry effective on the requested date
    #[error("Price not found: {0}")]
    NotFound(String),

    /// A snapshot batch collided with existing history
    #[error("{} snapshot entries rejected as duplicates", .0.rejected.len())]
    DuplicateSnapshot(IngestReport),

    /// No instance type of the provider satisfies the requested capacity
    #[error("No {service_type} instance at {provider} satisfies {requested}")]
    NoMatchingInstance {
        provider: CloudProvider,
        service_type: ServiceType,
        requested: String,
    },

    /// Overrides broke one or more template bounds
    #[error("Configuration violates template bounds ({} violations)", .0.len())]
    ValidationFailed(Vec<Violation>),

    /// Fewer than two providers could be estimated
    #[error("Comparison incomplete: only {} providers available", .0.available().count())]
    ComparisonIncomplete(Box<ComparisonResult>),

    #[error("Template not found: {0}")]
    TemplateNotFound(i64),

    /// Invalid input data
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A stored template config is malformed
    #[error("Invalid template: {0}")]
    InvalidTemplate(String),

    #[error("{provider} did not answer within {timeout_ms}ms")]
    ProviderTimeout {
        provider: CloudProvider,
        timeout_ms: u64,
    },

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PricingError {
    pub fn price_not_found(key: &PricingKey, as_of: NaiveDate) -> Self {
        Self::NotFound(format!("{} as of {}", key, as_of))
    }

    /// Short machine-readable cause, used for metrics labels and
    /// unavailable-provider entries
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::DuplicateSnapshot(_) => "duplicate_snapshot",
            Self::NoMatchingInstance { .. } => "no_matching_instance",
            Self::ValidationFailed(_) => "validation_failed",
            Self::ComparisonIncomplete(_) => "comparison_incomplete",
            Self::TemplateNotFound(_) => "template_not_found",
            Self::InvalidInput(_) => "invalid_input",
            Self::InvalidTemplate(_) => "invalid_template",
            Self::ProviderTimeout { .. } => "timeout",
            Self::Database(_) => "database",
            Self::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for PricingError {
    fn into_response(self) -> Response {
        match self {
            PricingError::NotFound(_) | PricingError::TemplateNotFound(_) => {
                ErrorResponse::new(ErrorCode::NotFound, self.to_string())
                    .into_response_with(StatusCode::NOT_FOUND)
            }
            PricingError::NoMatchingInstance {
                provider,
                service_type,
                ref requested,
            } => {
                let details = json!({
                    "provider": provider,
                    "serviceType": service_type,
                    "requested": requested,
                });
                ErrorResponse::new(ErrorCode::NotFound, self.to_string())
                    .with_details(details)
                    .into_response_with(StatusCode::NOT_FOUND)
            }
            PricingError::DuplicateSnapshot(ref report) => {
                let details = serde_json::to_value(report).unwrap_or_default();
                ErrorResponse::new(ErrorCode::Conflict, self.to_string())
                    .with_details(details)
                    .into_response_with(StatusCode::CONFLICT)
            }
            PricingError::ValidationFailed(ref violations) => {
                let details = json!({ "violations": violations });
                ErrorResponse::new(ErrorCode::UnprocessableEntity, self.to_string())
                    .with_details(details)
                    .into_response_with(StatusCode::UNPROCESSABLE_ENTITY)
            }
            PricingError::ComparisonIncomplete(result) => {
                // Partial results are still useful to the caller
                let response = ComparisonResponse::incomplete(None, *result);
                (StatusCode::OK, Json(response)).into_response()
            }
            PricingError::InvalidInput(_) => {
                ErrorResponse::new(ErrorCode::BadRequest, self.to_string())
                    .into_response_with(StatusCode::BAD_REQUEST)
            }
            PricingError::ProviderTimeout { .. } => {
                ErrorResponse::new(ErrorCode::GatewayTimeout, self.to_string())
                    .into_response_with(StatusCode::GATEWAY_TIMEOUT)
            }
            PricingError::Database(ref e) => {
                tracing::error!(error = %e, "Database error");
                ErrorResponse::new(ErrorCode::DatabaseError, "Database error")
                    .into_response_with(StatusCode::INTERNAL_SERVER_ERROR)
            }
            PricingError::InvalidTemplate(_) | PricingError::Internal(_) => {
                tracing::error!(error = %self, "Internal error");
                ErrorResponse::new(ErrorCode::InternalError, "Internal error")
                    .into_response_with(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}
