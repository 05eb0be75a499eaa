use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, Type};
use std::fmt;
use uuid::Uuid;

/// Quotation (proforma) status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "quotation_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum QuotationStatus {
    Pending,
    Converted,
    Cancelled,
}

impl QuotationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuotationStatus::Pending => "pending",
            QuotationStatus::Converted => "converted",
            QuotationStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for QuotationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Invoice status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "invoice_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Pending,
    Paid,
    Overdue,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Quotation entity (proforma)
///
/// INVARIANT: amount always equals the sum of unit_price * quantity over the
/// quotation's own line items, never mixed with other project figures.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Quotation {
    pub id: Uuid,
    pub account_id: Uuid,
    pub project_id: Uuid,
    pub number: String,

    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub currency: String,
    pub status: QuotationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quotation {
    pub fn can_convert(&self) -> bool {
        self.status == QuotationStatus::Pending
    }

    /// Recompute the quotation amount from its line items.
    pub fn amount_from_lines(lines: &[QuotationLineItem]) -> Decimal {
        lines.iter().map(|l| l.line_total()).sum()
    }
}

/// Priced line on a quotation
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QuotationLineItem {
    pub id: Uuid,
    pub quotation_id: Uuid,
    pub description: String,

    #[serde(with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: Decimal,
    pub unit: String,
}

impl QuotationLineItem {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * self.quantity
    }
}

/// Invoice entity, optionally derived from a quotation
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub id: Uuid,
    pub account_id: Uuid,
    pub project_id: Uuid,
    pub number: String,

    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub currency: String,
    pub status: InvoiceStatus,

    /// Set when this invoice was converted from a quotation
    pub parent_quotation_id: Option<Uuid>,

    /// External payment session currently attached to this invoice
    pub checkout_session_id: Option<String>,
    pub payment_method: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub audit_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    pub fn is_paid(&self) -> bool {
        self.status == InvoiceStatus::Paid
    }
}

/// Invoice line, optionally snapshotting a quotation line
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InvoiceLineItem {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub quotation_line_item_id: Option<Uuid>,
    pub description: String,

    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_price: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn line(unit_price: Decimal, quantity: Decimal) -> QuotationLineItem {
        QuotationLineItem {
            id: Uuid::new_v4(),
            quotation_id: Uuid::new_v4(),
            description: "work".to_string(),
            unit_price,
            quantity,
            unit: "day".to_string(),
        }
    }

    #[test]
    fn amount_is_sum_of_line_totals_only() {
        let lines = vec![
            line(dec!(50000), dec!(2)),
            line(dec!(25000), dec!(1)),
            line(dec!(15000), dec!(5)),
        ];
        assert_eq!(Quotation::amount_from_lines(&lines), dec!(200000));
    }

    #[test]
    fn amount_of_empty_quotation_is_zero() {
        assert_eq!(Quotation::amount_from_lines(&[]), Decimal::ZERO);
    }
}
