use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{Datelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;
use validator::Validate;

use super::conversion::{self, ConversionReport};
use super::models::*;
use super::numbering;
use super::repository::NewQuotationLine;
use crate::bootstrap::AppState;
use crate::error::{AppError, AppResult, BillingError};
use crate::middleware::auth::AccountId;

// ========== REQUEST MODELS ==========

#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuotationRequest {
    pub project_id: Uuid,
    #[validate(length(min = 3, max = 3, message = "must be a 3-letter currency code"))]
    pub currency: String,
    #[validate(length(min = 1, message = "at least one line item is required"))]
    pub line_items: Vec<QuotationLineRequest>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct QuotationLineRequest {
    #[validate(length(min = 1, message = "description is required"))]
    pub description: String,
    pub unit_price: Decimal,
    pub quantity: Decimal,
    #[validate(length(min = 1, message = "unit is required"))]
    pub unit: String,
}

/// Options for converting a quotation into an invoice
#[derive(Debug, Default, Deserialize)]
pub struct ConvertRequest {
    #[serde(default)]
    pub generate_payment_link: bool,
    #[serde(default)]
    pub mark_as_paid: bool,
    pub payment_method: Option<String>,
}

// ========== RESPONSE MODELS ==========

#[derive(Debug, Serialize)]
pub struct QuotationDetail {
    #[serde(flatten)]
    pub quotation: Quotation,
    pub line_items: Vec<QuotationLineItem>,
}

#[derive(Debug, Serialize)]
pub struct InvoiceDetail {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub line_items: Vec<InvoiceLineItem>,
}

#[derive(Debug, Serialize)]
pub struct ConvertResponse {
    pub invoice: Invoice,
    pub payment_link: Option<String>,
    /// Set when the invoice was created but the payment link could not be;
    /// the invoice stands either way
    pub payment_link_error: Option<String>,
}

fn validate_lines(lines: &[QuotationLineRequest]) -> AppResult<()> {
    for line in lines {
        if line.unit_price < Decimal::ZERO {
            return Err(AppError::Validation(format!(
                "unit_price must not be negative: {}",
                line.unit_price
            )));
        }
        if line.quantity <= Decimal::ZERO {
            return Err(AppError::Validation(format!(
                "quantity must be positive: {}",
                line.quantity
            )));
        }
    }
    Ok(())
}

// ========== QUOTATION ENDPOINTS ==========

/// Create a quotation
/// POST /quotations
pub async fn create_quotation(
    State(state): State<AppState>,
    AccountId(account_id): AccountId,
    Json(request): Json<CreateQuotationRequest>,
) -> AppResult<Json<Quotation>> {
    request
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    validate_lines(&request.line_items)?;

    let year = Utc::now().year();
    let prefix = &state.config.quotation_prefix;
    let existing = state
        .billing
        .issued_quotation_numbers(account_id, prefix, year)
        .await?;
    let number =
        numbering::format_number(prefix, year, numbering::next_sequence(&existing, prefix, year));

    let lines = request
        .line_items
        .into_iter()
        .map(|l| NewQuotationLine {
            description: l.description,
            unit_price: l.unit_price,
            quantity: l.quantity,
            unit: l.unit,
        })
        .collect();

    let quotation = state
        .billing
        .create_quotation(account_id, request.project_id, number, request.currency, lines)
        .await?;

    Ok(Json(quotation))
}

/// GET /quotations
pub async fn list_quotations(
    State(state): State<AppState>,
    AccountId(account_id): AccountId,
) -> AppResult<Json<Vec<Quotation>>> {
    Ok(Json(state.billing.list_quotations(account_id).await?))
}

/// GET /quotations/:id
pub async fn get_quotation(
    State(state): State<AppState>,
    AccountId(account_id): AccountId,
    Path(id): Path<Uuid>,
) -> AppResult<Json<QuotationDetail>> {
    let quotation = state.billing.get_quotation(account_id, id).await?;
    let line_items = state.billing.quotation_lines(quotation.id).await?;
    Ok(Json(QuotationDetail {
        quotation,
        line_items,
    }))
}

/// Conversion report: how much of the quotation has been invoiced
/// GET /quotations/:id/conversion
pub async fn conversion_report(
    State(state): State<AppState>,
    AccountId(account_id): AccountId,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ConversionReport>> {
    let quotation = state.billing.get_quotation(account_id, id).await?;
    let lines = state.billing.quotation_lines(quotation.id).await?;
    let children = state.billing.child_invoices(account_id, quotation.id).await?;
    let child_ids: Vec<Uuid> = children.iter().map(|i| i.id).collect();
    let invoice_lines = state.billing.invoice_lines_for(&child_ids).await?;

    Ok(Json(conversion::build_report(
        &quotation,
        &lines,
        &children,
        &invoice_lines,
    )))
}

/// Convert a quotation into an invoice
/// POST /quotations/:id/convert
///
/// Full conversion only: refused when the project already has an invoice.
/// Invoice, line copies and the quotation status move commit in one
/// transaction.
pub async fn convert_quotation(
    State(state): State<AppState>,
    AccountId(account_id): AccountId,
    Path(id): Path<Uuid>,
    Json(request): Json<ConvertRequest>,
) -> AppResult<Json<ConvertResponse>> {
    let quotation = state.billing.get_quotation(account_id, id).await?;
    if !quotation.can_convert() {
        return Err(BillingError::InvalidState {
            current: quotation.status.to_string(),
            expected: QuotationStatus::Pending.to_string(),
        }
        .into());
    }

    let lines = state.billing.quotation_lines(quotation.id).await?;
    if lines.is_empty() {
        return Err(BillingError::EmptyQuotation.into());
    }

    if state
        .billing
        .project_has_invoice(account_id, quotation.project_id)
        .await?
    {
        return Err(BillingError::SiblingInvoiceExists {
            project_id: quotation.project_id,
        }
        .into());
    }

    let year = Utc::now().year();
    let prefix = &state.config.invoice_prefix;
    let existing = state
        .billing
        .issued_invoice_numbers(account_id, prefix, year)
        .await?;
    let number =
        numbering::format_number(prefix, year, numbering::next_sequence(&existing, prefix, year));

    let (status, paid_at) = if request.mark_as_paid {
        (InvoiceStatus::Paid, Some(Utc::now()))
    } else {
        (InvoiceStatus::Pending, None)
    };

    let mut tx = state.billing.begin_tx().await?;
    let invoice = state
        .billing
        .insert_invoice_tx(
            &mut tx,
            account_id,
            quotation.project_id,
            &number,
            quotation.amount,
            &quotation.currency,
            status,
            Some(quotation.id),
            request.payment_method.as_deref(),
            paid_at,
        )
        .await?;
    for line in &lines {
        state
            .billing
            .insert_invoice_line_tx(
                &mut tx,
                invoice.id,
                Some(line.id),
                &line.description,
                line.quantity,
                line.unit_price,
            )
            .await?;
    }
    state
        .billing
        .set_quotation_status_tx(
            &mut tx,
            quotation.id,
            QuotationStatus::Pending,
            QuotationStatus::Converted,
        )
        .await?;
    tx.commit().await.map_err(AppError::from)?;

    info!(
        "Quotation {} converted into invoice {}",
        quotation.number, invoice.number
    );

    if request.mark_as_paid {
        state.notifier.dispatch(
            account_id,
            "invoice_paid",
            "Invoice paid",
            &format!("Invoice {} was created as paid", invoice.number),
        );
    }

    // Link generation happens after the commit: a provider failure surfaces
    // in the response but the invoice stands
    let (payment_link, payment_link_error) = if request.generate_payment_link {
        match state
            .lifecycle
            .create_payment_link(account_id, invoice.id, false)
            .await
        {
            Ok(session) => (session.launch_url, None),
            Err(e) => {
                error!(
                    "Payment link generation failed for invoice {}: {:?}",
                    invoice.number, e
                );
                (None, Some(e.to_string()))
            }
        }
    } else {
        (None, None)
    };

    Ok(Json(ConvertResponse {
        invoice,
        payment_link,
        payment_link_error,
    }))
}

// ========== INVOICE ENDPOINTS ==========

/// GET /invoices
pub async fn list_invoices(
    State(state): State<AppState>,
    AccountId(account_id): AccountId,
) -> AppResult<Json<Vec<Invoice>>> {
    Ok(Json(state.billing.list_invoices(account_id).await?))
}

/// GET /invoices/:id
pub async fn get_invoice(
    State(state): State<AppState>,
    AccountId(account_id): AccountId,
    Path(id): Path<Uuid>,
) -> AppResult<Json<InvoiceDetail>> {
    let invoice = state.billing.get_invoice(account_id, id).await?;
    let line_items = state.billing.invoice_lines_for(&[invoice.id]).await?;
    Ok(Json(InvoiceDetail {
        invoice,
        line_items,
    }))
}
