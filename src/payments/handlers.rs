use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::models::{Expense, PaymentSession, Payout};
use super::webhook::{WaveWebhookPayload, WebhookAcceptedResponse};
use crate::billing::models::Invoice;
use crate::bootstrap::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AccountId;

// ========== REQUEST MODELS ==========

#[derive(Debug, Default, Deserialize)]
pub struct CreatePaymentLinkRequest {
    /// Replace an existing link instead of refusing
    #[serde(default)]
    pub regenerate: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct MarkPaidRequest {
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_method: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePayoutRequest {
    pub provider_id: Uuid,
    pub amount: Decimal,
    #[validate(length(min = 3, max = 3, message = "must be a 3-letter currency code"))]
    pub currency: String,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmPaymentRequest {
    pub session_ref: String,
}

// ========== RESPONSE MODELS ==========

#[derive(Debug, Serialize)]
pub struct MarkPaidResponse {
    pub invoice: Invoice,
    pub already_paid: bool,
}

// ========== CHECKOUT SESSION ENDPOINTS ==========

/// Create (or regenerate) a hosted payment link for an invoice
/// POST /invoices/:id/payment-link
pub async fn create_payment_link(
    State(state): State<AppState>,
    AccountId(account_id): AccountId,
    Path(id): Path<Uuid>,
    Json(request): Json<CreatePaymentLinkRequest>,
) -> AppResult<Json<PaymentSession>> {
    let session = state
        .lifecycle
        .create_payment_link(account_id, id, request.regenerate)
        .await?;
    Ok(Json(session))
}

/// Mark an invoice paid; idempotent
/// POST /invoices/:id/mark-paid
pub async fn mark_invoice_paid(
    State(state): State<AppState>,
    AccountId(account_id): AccountId,
    Path(id): Path<Uuid>,
    Json(request): Json<MarkPaidRequest>,
) -> AppResult<Json<MarkPaidResponse>> {
    let note = request
        .note
        .unwrap_or_else(|| "Marked paid manually".to_string());
    let outcome = state
        .lifecycle
        .mark_invoice_paid(
            account_id,
            id,
            request.paid_at,
            request.payment_method.as_deref(),
            &note,
        )
        .await?;

    Ok(Json(MarkPaidResponse {
        invoice: outcome.invoice,
        already_paid: outcome.already_paid,
    }))
}

/// POST /invoices/:id/payment-link/expire
pub async fn expire_payment_link(
    State(state): State<AppState>,
    AccountId(account_id): AccountId,
    Path(id): Path<Uuid>,
) -> AppResult<Json<PaymentSession>> {
    Ok(Json(state.lifecycle.expire_session(account_id, id).await?))
}

/// POST /invoices/:id/payment-link/refund
pub async fn refund_payment(
    State(state): State<AppState>,
    AccountId(account_id): AccountId,
    Path(id): Path<Uuid>,
) -> AppResult<Json<PaymentSession>> {
    Ok(Json(state.lifecycle.refund_session(account_id, id).await?))
}

// ========== PAYOUT ENDPOINTS ==========

/// Send an outbound payment to a provider (subcontractor)
/// POST /payouts
pub async fn create_payout(
    State(state): State<AppState>,
    AccountId(account_id): AccountId,
    Json(request): Json<CreatePayoutRequest>,
) -> AppResult<Json<Payout>> {
    request
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    if request.amount <= Decimal::ZERO {
        return Err(AppError::Validation(format!(
            "amount must be positive: {}",
            request.amount
        )));
    }

    let payout = state
        .lifecycle
        .create_payout(account_id, request.provider_id, request.amount, &request.currency)
        .await?;
    Ok(Json(payout))
}

/// GET /payouts/:id
pub async fn get_payout(
    State(state): State<AppState>,
    AccountId(account_id): AccountId,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Payout>> {
    Ok(Json(state.payments.get_payout(account_id, id).await?))
}

/// Reverse a payout; creates the compensating expense entry
/// POST /payouts/:id/reverse
pub async fn reverse_payout(
    State(state): State<AppState>,
    AccountId(account_id): AccountId,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Payout>> {
    Ok(Json(state.lifecycle.reverse_payout(account_id, id).await?))
}

/// Re-query the provider for a payout and apply its authoritative state.
/// Covers missed webhooks for in-flight payouts.
/// POST /payouts/:id/refresh
pub async fn refresh_payout(
    State(state): State<AppState>,
    AccountId(account_id): AccountId,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Payout>> {
    let payout = state.payments.get_payout(account_id, id).await?;
    let provider_payout = state.gateway.get_payout(&payout.external_ref).await?;
    state
        .lifecycle
        .apply_payout_update(&payout, provider_payout.status)
        .await?;
    Ok(Json(state.payments.get_payout(account_id, id).await?))
}

/// Expense ledger entries tied to one payout, reversal entries included
/// GET /payouts/:id/expenses
pub async fn payout_expenses(
    State(state): State<AppState>,
    AccountId(account_id): AccountId,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<Expense>>> {
    let payout = state.payments.get_payout(account_id, id).await?;
    Ok(Json(state.payments.expenses_for_payout(payout.id).await?))
}

/// GET /expenses
pub async fn list_expenses(
    State(state): State<AppState>,
    AccountId(account_id): AccountId,
) -> AppResult<Json<Vec<Expense>>> {
    Ok(Json(state.payments.list_expenses(account_id).await?))
}

// ========== PUBLIC ENDPOINTS ==========

/// Wave webhook intake; answers 202 and reconciles in the background
/// POST /webhooks/wave
pub async fn wave_webhook(
    State(state): State<AppState>,
    Json(payload): Json<WaveWebhookPayload>,
) -> (StatusCode, Json<WebhookAcceptedResponse>) {
    let response = state.webhooks.process_webhook_async(payload);
    (StatusCode::ACCEPTED, Json(response))
}

/// Public payment confirmation: re-query the provider for a session and
/// apply its authoritative state. Used by the checkout return page.
/// POST /payments/confirm
pub async fn confirm_payment(
    State(state): State<AppState>,
    Json(request): Json<ConfirmPaymentRequest>,
) -> AppResult<StatusCode> {
    let session = state
        .payments
        .get_session_by_external_ref(&request.session_ref)
        .await?
        .ok_or_else(|| AppError::NotFound("Payment session".to_string()))?;

    let update = state.gateway.get_session(&request.session_ref).await?;
    state.lifecycle.apply_session_update(&session, &update).await?;
    Ok(StatusCode::NO_CONTENT)
}
