use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use sqlx::migrate::MigrateError;
use thiserror::Error;
use uuid::Uuid;

/// Top-level error type for the entire application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Billing error: {0}")]
    Billing(#[from] BillingError),

    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Quotation / invoice errors
#[derive(Error, Debug)]
pub enum BillingError {
    #[error("Quotation not found: {0}")]
    QuotationNotFound(Uuid),

    #[error("Invoice not found: {0}")]
    InvoiceNotFound(Uuid),

    #[error("Quotation in invalid state: {current}, expected: {expected}")]
    InvalidState { current: String, expected: String },

    #[error("An invoice already exists for project {project_id}")]
    SiblingInvoiceExists { project_id: Uuid },

    #[error("Quotation has no line items")]
    EmptyQuotation,
}

/// Payment lifecycle errors
#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("Payout not found: {0}")]
    PayoutNotFound(Uuid),

    #[error("Payment session not found: {0}")]
    SessionNotFound(String),

    #[error("Invalid {entity} transition: {current} -> {requested}")]
    InvalidTransition {
        entity: &'static str,
        current: String,
        requested: String,
    },

    #[error("A payment link already exists for this invoice: {session_id}")]
    LinkAlreadyExists { session_id: String },

    #[error("Unknown provider status: {0}")]
    UnknownStatus(String),

    #[error("Invalid provider amount: {0}")]
    InvalidAmount(String),
}

/// External payment provider (Wave) errors
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Provider API error ({status}): {payload}")]
    Api {
        status: u16,
        payload: serde_json::Value,
    },
}

/// API error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            AppError::Billing(BillingError::QuotationNotFound(id)) => (
                StatusCode::NOT_FOUND,
                "QUOTATION_NOT_FOUND",
                format!("Quotation not found: {}", id),
                None,
            ),
            AppError::Billing(BillingError::InvoiceNotFound(id)) => (
                StatusCode::NOT_FOUND,
                "INVOICE_NOT_FOUND",
                format!("Invoice not found: {}", id),
                None,
            ),
            AppError::Billing(BillingError::InvalidState { current, expected }) => (
                StatusCode::CONFLICT,
                "QUOTATION_INVALID_STATE",
                format!("Quotation is {}, expected {}", current, expected),
                Some(serde_json::json!({"current": current, "expected": expected})),
            ),
            AppError::Billing(BillingError::SiblingInvoiceExists { project_id }) => (
                StatusCode::CONFLICT,
                "INVOICE_ALREADY_EXISTS",
                format!("An invoice already exists for project {}", project_id),
                Some(serde_json::json!({"project_id": project_id})),
            ),
            AppError::Billing(BillingError::EmptyQuotation) => (
                StatusCode::BAD_REQUEST,
                "EMPTY_QUOTATION",
                "Quotation has no line items".to_string(),
                None,
            ),
            AppError::Payment(PaymentError::PayoutNotFound(id)) => (
                StatusCode::NOT_FOUND,
                "PAYOUT_NOT_FOUND",
                format!("Payout not found: {}", id),
                None,
            ),
            AppError::Payment(PaymentError::SessionNotFound(reference)) => (
                StatusCode::NOT_FOUND,
                "SESSION_NOT_FOUND",
                format!("Payment session not found: {}", reference),
                None,
            ),
            AppError::Payment(PaymentError::InvalidTransition {
                entity,
                current,
                requested,
            }) => (
                StatusCode::CONFLICT,
                "INVALID_TRANSITION",
                format!("Cannot move {} from {} to {}", entity, current, requested),
                Some(serde_json::json!({
                    "entity": entity,
                    "current": current,
                    "requested": requested,
                })),
            ),
            AppError::Payment(PaymentError::LinkAlreadyExists { session_id }) => (
                StatusCode::CONFLICT,
                "PAYMENT_LINK_EXISTS",
                "A payment link already exists for this invoice".to_string(),
                Some(serde_json::json!({"session_id": session_id})),
            ),
            AppError::Payment(PaymentError::UnknownStatus(s)) => (
                StatusCode::BAD_GATEWAY,
                "PROVIDER_UNKNOWN_STATUS",
                format!("Provider returned an unknown status: {}", s),
                None,
            ),
            AppError::Payment(PaymentError::InvalidAmount(s)) => (
                StatusCode::BAD_GATEWAY,
                "PROVIDER_INVALID_AMOUNT",
                format!("Provider returned an invalid amount: {}", s),
                None,
            ),
            AppError::Provider(ProviderError::Unavailable(reason)) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "PROVIDER_UNAVAILABLE",
                format!("Payment provider unavailable: {}", reason),
                None,
            ),
            AppError::Provider(ProviderError::Api { status, payload }) => (
                StatusCode::BAD_GATEWAY,
                "PROVIDER_ERROR",
                format!("Payment provider rejected the request ({})", status),
                Some(payload),
            ),
            AppError::Provider(ProviderError::Http(e)) => (
                StatusCode::BAD_GATEWAY,
                "PROVIDER_ERROR",
                format!("Payment provider request failed: {}", e),
                None,
            ),
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                msg,
                None,
            ),
            AppError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("{} not found", what),
                None,
            ),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Missing or invalid account identity".to_string(),
                None,
            ),
            AppError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                "A database error occurred".to_string(),
                None,
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
                None,
            ),
        };

        let body = Json(ErrorResponse {
            error: message,
            error_code: error_code.to_string(),
            details,
        });

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::Internal(format!("Error converting: {:?}", error))
    }
}

impl From<rust_decimal::Error> for AppError {
    fn from(error: rust_decimal::Error) -> Self {
        AppError::Validation(format!("Decimal conversion error: {:?}", error))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        AppError::Provider(ProviderError::Http(error))
    }
}

impl From<MigrateError> for AppError {
    fn from(error: MigrateError) -> Self {
        AppError::Internal(format!("Migration error: {:?}", error))
    }
}

/// Result type alias for the application
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_transition_maps_to_conflict() {
        let err = AppError::Payment(PaymentError::InvalidTransition {
            entity: "payout",
            current: "reversed".to_string(),
            requested: "reversed".to_string(),
        });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn not_found_hides_existence() {
        let err = AppError::NotFound("Quotation".to_string());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn provider_timeout_maps_to_service_unavailable() {
        let err = AppError::Provider(ProviderError::Unavailable("timeout".to_string()));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
