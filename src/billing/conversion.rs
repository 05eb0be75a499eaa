use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use super::models::{Invoice, InvoiceLineItem, Quotation, QuotationLineItem};

/// Per-line conversion state of a quotation
#[derive(Debug, Clone, Serialize)]
pub struct LineItemConversion {
    pub line_item_id: Uuid,
    pub description: String,
    pub unit: String,

    #[serde(with = "rust_decimal::serde::float")]
    pub original_quantity: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub invoiced_quantity: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub remaining_quantity: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub invoiced_value: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub remaining_value: Decimal,
    pub is_fully_invoiced: bool,
}

/// Conversion report for one quotation across all of its child invoices
#[derive(Debug, Clone, Serialize)]
pub struct ConversionReport {
    pub quotation_id: Uuid,

    #[serde(with = "rust_decimal::serde::float")]
    pub quotation_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub invoiced_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub remaining_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub conversion_percentage: Decimal,
    pub is_fully_converted: bool,
    pub line_items: Vec<LineItemConversion>,
}

/// Build the conversion report for a quotation.
///
/// `child_invoices` must already be restricted to invoices whose
/// parent_quotation_id equals the quotation; `invoice_lines` are the lines of
/// those invoices. Pure computation, no store access.
pub fn build_report(
    quotation: &Quotation,
    quotation_lines: &[QuotationLineItem],
    child_invoices: &[Invoice],
    invoice_lines: &[InvoiceLineItem],
) -> ConversionReport {
    let line_items = quotation_lines
        .iter()
        .map(|line| convert_line(line, invoice_lines))
        .collect();

    let invoiced_amount: Decimal = child_invoices.iter().map(|i| i.amount).sum();
    let remaining_amount = (quotation.amount - invoiced_amount).max(Decimal::ZERO);

    // A zero-amount quotation reports 0%, never a division by zero.
    let conversion_percentage = if quotation.amount.is_zero() {
        Decimal::ZERO
    } else {
        (invoiced_amount / quotation.amount * Decimal::ONE_HUNDRED)
            .clamp(Decimal::ZERO, Decimal::ONE_HUNDRED)
    };

    ConversionReport {
        quotation_id: quotation.id,
        quotation_amount: quotation.amount,
        invoiced_amount,
        remaining_amount,
        conversion_percentage,
        is_fully_converted: invoiced_amount >= quotation.amount,
        line_items,
    }
}

fn convert_line(line: &QuotationLineItem, invoice_lines: &[InvoiceLineItem]) -> LineItemConversion {
    let mut invoiced_quantity = Decimal::ZERO;
    let mut invoiced_value = Decimal::ZERO;

    for invoice_line in invoice_lines
        .iter()
        .filter(|il| il.quotation_line_item_id == Some(line.id))
    {
        invoiced_quantity += invoice_line.quantity;
        invoiced_value += invoice_line.total_price;
    }

    let remaining_quantity = (line.quantity - invoiced_quantity).max(Decimal::ZERO);
    let remaining_value = (line.line_total() - invoiced_value).max(Decimal::ZERO);

    LineItemConversion {
        line_item_id: line.id,
        description: line.description.clone(),
        unit: line.unit.clone(),
        original_quantity: line.quantity,
        invoiced_quantity,
        remaining_quantity,
        invoiced_value,
        remaining_value,
        is_fully_invoiced: remaining_quantity.is_zero(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::models::{InvoiceStatus, QuotationStatus};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn quotation(amount: Decimal) -> Quotation {
        Quotation {
            id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            number: "PRO-2025-001".to_string(),
            amount,
            currency: "XOF".to_string(),
            status: QuotationStatus::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn quotation_line(
        quotation_id: Uuid,
        unit_price: Decimal,
        quantity: Decimal,
    ) -> QuotationLineItem {
        QuotationLineItem {
            id: Uuid::new_v4(),
            quotation_id,
            description: "service".to_string(),
            unit_price,
            quantity,
            unit: "day".to_string(),
        }
    }

    fn child_invoice(parent: &Quotation, amount: Decimal) -> Invoice {
        Invoice {
            id: Uuid::new_v4(),
            account_id: parent.account_id,
            project_id: parent.project_id,
            number: "INV-2025-001".to_string(),
            amount,
            currency: parent.currency.clone(),
            status: InvoiceStatus::Pending,
            parent_quotation_id: Some(parent.id),
            checkout_session_id: None,
            payment_method: None,
            paid_at: None,
            audit_note: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn invoice_line(
        invoice_id: Uuid,
        source: &QuotationLineItem,
        quantity: Decimal,
    ) -> InvoiceLineItem {
        InvoiceLineItem {
            id: Uuid::new_v4(),
            invoice_id,
            quotation_line_item_id: Some(source.id),
            description: source.description.clone(),
            quantity,
            unit_price: source.unit_price,
            total_price: source.unit_price * quantity,
        }
    }

    #[test]
    fn partial_conversion_scenario() {
        // 200,000 XOF from 50,000x2 + 25,000x1 + 15,000x5
        let q = quotation(dec!(200000));
        let lines = vec![
            quotation_line(q.id, dec!(50000), dec!(2)),
            quotation_line(q.id, dec!(25000), dec!(1)),
            quotation_line(q.id, dec!(15000), dec!(5)),
        ];

        // One child invoice covering line 1 at quantity 1
        let invoice = child_invoice(&q, dec!(50000));
        let invoice_lines = vec![invoice_line(invoice.id, &lines[0], dec!(1))];

        let report = build_report(&q, &lines, &[invoice], &invoice_lines);

        assert_eq!(report.line_items[0].invoiced_quantity, dec!(1));
        assert_eq!(report.line_items[0].remaining_quantity, dec!(1));
        assert_eq!(report.line_items[0].invoiced_value, dec!(50000));
        assert!(!report.line_items[0].is_fully_invoiced);
        assert_eq!(report.line_items[1].invoiced_quantity, Decimal::ZERO);
        assert_eq!(report.conversion_percentage, dec!(25));
        assert_eq!(report.invoiced_amount, dec!(50000));
        assert_eq!(report.remaining_amount, dec!(150000));
        assert!(!report.is_fully_converted);
    }

    #[test]
    fn remaining_quantity_never_negative() {
        let q = quotation(dec!(100000));
        let lines = vec![quotation_line(q.id, dec!(50000), dec!(2))];

        // Over-invoiced line: 3 invoiced against an original 2
        let invoice = child_invoice(&q, dec!(150000));
        let invoice_lines = vec![invoice_line(invoice.id, &lines[0], dec!(3))];

        let report = build_report(&q, &lines, &[invoice], &invoice_lines);

        assert_eq!(report.line_items[0].remaining_quantity, Decimal::ZERO);
        assert_eq!(report.line_items[0].remaining_value, Decimal::ZERO);
        assert!(report.line_items[0].is_fully_invoiced);
        assert_eq!(report.conversion_percentage, dec!(100));
        assert!(report.is_fully_converted);
    }

    #[test]
    fn zero_amount_quotation_reports_zero_percent() {
        let q = quotation(Decimal::ZERO);
        let report = build_report(&q, &[], &[], &[]);

        assert_eq!(report.conversion_percentage, Decimal::ZERO);
        assert!(report.is_fully_converted);
    }

    #[test]
    fn full_conversion_across_multiple_invoices() {
        let q = quotation(dec!(100000));
        let lines = vec![quotation_line(q.id, dec!(50000), dec!(2))];

        let first = child_invoice(&q, dec!(50000));
        let second = child_invoice(&q, dec!(50000));
        let invoice_lines = vec![
            invoice_line(first.id, &lines[0], dec!(1)),
            invoice_line(second.id, &lines[0], dec!(1)),
        ];

        let report = build_report(&q, &lines, &[first, second], &invoice_lines);

        assert_eq!(report.line_items[0].invoiced_quantity, dec!(2));
        assert!(report.line_items[0].is_fully_invoiced);
        assert_eq!(report.conversion_percentage, dec!(100));
        assert!(report.is_fully_converted);
    }

    #[test]
    fn unreferenced_invoice_lines_do_not_count_toward_lines() {
        let q = quotation(dec!(100000));
        let lines = vec![quotation_line(q.id, dec!(50000), dec!(2))];

        let invoice = child_invoice(&q, dec!(10000));
        let mut extra = invoice_line(invoice.id, &lines[0], dec!(1));
        extra.quotation_line_item_id = None;

        let report = build_report(&q, &lines, &[invoice], &[extra]);

        assert_eq!(report.line_items[0].invoiced_quantity, Decimal::ZERO);
        // Invoice amount still counts toward the quotation-level total
        assert_eq!(report.invoiced_amount, dec!(10000));
    }
}
