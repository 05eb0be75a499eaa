use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::info;
use uuid::Uuid;

use super::models::*;
use crate::error::{AppResult, BillingError};

/// Fields for a new quotation line, before persistence
#[derive(Debug, Clone)]
pub struct NewQuotationLine {
    pub description: String,
    pub unit_price: Decimal,
    pub quantity: Decimal,
    pub unit: String,
}

/// Billing repository - quotations, invoices and their line items
pub struct BillingRepository {
    pub pool: PgPool,
}

impl BillingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn begin_tx(&self) -> AppResult<Transaction<'_, Postgres>> {
        Ok(self.pool.begin().await?)
    }

    // ========== QUOTATION OPERATIONS ==========

    /// Create a quotation with its lines in one transaction.
    ///
    /// The persisted amount is always recomputed from the lines.
    pub async fn create_quotation(
        &self,
        account_id: Uuid,
        project_id: Uuid,
        number: String,
        currency: String,
        lines: Vec<NewQuotationLine>,
    ) -> AppResult<Quotation> {
        let mut tx = self.begin_tx().await?;

        let amount: Decimal = lines.iter().map(|l| l.unit_price * l.quantity).sum();

        let quotation = sqlx::query_as::<_, Quotation>(
            r#"
            INSERT INTO quotations (account_id, project_id, number, amount, currency, status)
            VALUES ($1, $2, $3, $4, $5, 'pending')
            RETURNING id, account_id, project_id, number, amount, currency, status,
                      created_at, updated_at
            "#,
        )
        .bind(account_id)
        .bind(project_id)
        .bind(&number)
        .bind(amount)
        .bind(&currency)
        .fetch_one(&mut *tx)
        .await?;

        for line in &lines {
            sqlx::query(
                r#"
                INSERT INTO quotation_line_items
                    (quotation_id, description, unit_price, quantity, unit)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(quotation.id)
            .bind(&line.description)
            .bind(line.unit_price)
            .bind(line.quantity)
            .bind(&line.unit)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!("Quotation created: {} ({})", quotation.number, quotation.id);
        Ok(quotation)
    }

    pub async fn get_quotation(&self, account_id: Uuid, id: Uuid) -> AppResult<Quotation> {
        sqlx::query_as::<_, Quotation>(
            r#"
            SELECT id, account_id, project_id, number, amount, currency, status,
                   created_at, updated_at
            FROM quotations
            WHERE id = $1 AND account_id = $2
            "#,
        )
        .bind(id)
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| BillingError::QuotationNotFound(id).into())
    }

    pub async fn list_quotations(&self, account_id: Uuid) -> AppResult<Vec<Quotation>> {
        let quotations = sqlx::query_as::<_, Quotation>(
            r#"
            SELECT id, account_id, project_id, number, amount, currency, status,
                   created_at, updated_at
            FROM quotations
            WHERE account_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(quotations)
    }

    pub async fn quotation_lines(&self, quotation_id: Uuid) -> AppResult<Vec<QuotationLineItem>> {
        let lines = sqlx::query_as::<_, QuotationLineItem>(
            r#"
            SELECT id, quotation_id, description, unit_price, quantity, unit
            FROM quotation_line_items
            WHERE quotation_id = $1
            ORDER BY id
            "#,
        )
        .bind(quotation_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(lines)
    }

    /// Guarded status move; fails with InvalidState if the row is no longer
    /// in the expected status (concurrent convert, cancelled quotation).
    pub async fn set_quotation_status_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        from: QuotationStatus,
        to: QuotationStatus,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE quotations
            SET status = $3, updated_at = NOW()
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(BillingError::InvalidState {
                current: "unknown".to_string(),
                expected: from.to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// Numbers already issued to this account for one prefix/year sequence.
    pub async fn issued_quotation_numbers(
        &self,
        account_id: Uuid,
        prefix: &str,
        year: i32,
    ) -> AppResult<Vec<String>> {
        let numbers = sqlx::query_scalar::<_, String>(
            r#"
            SELECT number FROM quotations
            WHERE account_id = $1 AND number LIKE $2
            "#,
        )
        .bind(account_id)
        .bind(format!("{}-{}-%", prefix, year))
        .fetch_all(&self.pool)
        .await?;

        Ok(numbers)
    }

    pub async fn issued_invoice_numbers(
        &self,
        account_id: Uuid,
        prefix: &str,
        year: i32,
    ) -> AppResult<Vec<String>> {
        let numbers = sqlx::query_scalar::<_, String>(
            r#"
            SELECT number FROM invoices
            WHERE account_id = $1 AND number LIKE $2
            "#,
        )
        .bind(account_id)
        .bind(format!("{}-{}-%", prefix, year))
        .fetch_all(&self.pool)
        .await?;

        Ok(numbers)
    }

    // ========== INVOICE OPERATIONS ==========

    pub async fn get_invoice(&self, account_id: Uuid, id: Uuid) -> AppResult<Invoice> {
        sqlx::query_as::<_, Invoice>(
            r#"
            SELECT id, account_id, project_id, number, amount, currency, status,
                   parent_quotation_id, checkout_session_id, payment_method,
                   paid_at, audit_note, created_at, updated_at
            FROM invoices
            WHERE id = $1 AND account_id = $2
            "#,
        )
        .bind(id)
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| BillingError::InvoiceNotFound(id).into())
    }

    pub async fn list_invoices(&self, account_id: Uuid) -> AppResult<Vec<Invoice>> {
        let invoices = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT id, account_id, project_id, number, amount, currency, status,
                   parent_quotation_id, checkout_session_id, payment_method,
                   paid_at, audit_note, created_at, updated_at
            FROM invoices
            WHERE account_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(invoices)
    }

    /// All invoices converted from the given quotation.
    pub async fn child_invoices(
        &self,
        account_id: Uuid,
        quotation_id: Uuid,
    ) -> AppResult<Vec<Invoice>> {
        let invoices = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT id, account_id, project_id, number, amount, currency, status,
                   parent_quotation_id, checkout_session_id, payment_method,
                   paid_at, audit_note, created_at, updated_at
            FROM invoices
            WHERE account_id = $1 AND parent_quotation_id = $2
            ORDER BY created_at
            "#,
        )
        .bind(account_id)
        .bind(quotation_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(invoices)
    }

    pub async fn invoice_lines_for(&self, invoice_ids: &[Uuid]) -> AppResult<Vec<InvoiceLineItem>> {
        if invoice_ids.is_empty() {
            return Ok(Vec::new());
        }

        let lines = sqlx::query_as::<_, InvoiceLineItem>(
            r#"
            SELECT id, invoice_id, quotation_line_item_id, description,
                   quantity, unit_price, total_price
            FROM invoice_line_items
            WHERE invoice_id = ANY($1)
            ORDER BY id
            "#,
        )
        .bind(invoice_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(lines)
    }

    pub async fn project_has_invoice(&self, account_id: Uuid, project_id: Uuid) -> AppResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM invoices WHERE account_id = $1 AND project_id = $2
            )
            "#,
        )
        .bind(account_id)
        .bind(project_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn insert_invoice_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        account_id: Uuid,
        project_id: Uuid,
        number: &str,
        amount: Decimal,
        currency: &str,
        status: InvoiceStatus,
        parent_quotation_id: Option<Uuid>,
        payment_method: Option<&str>,
        paid_at: Option<DateTime<Utc>>,
    ) -> AppResult<Invoice> {
        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            INSERT INTO invoices
                (account_id, project_id, number, amount, currency, status,
                 parent_quotation_id, payment_method, paid_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, account_id, project_id, number, amount, currency, status,
                      parent_quotation_id, checkout_session_id, payment_method,
                      paid_at, audit_note, created_at, updated_at
            "#,
        )
        .bind(account_id)
        .bind(project_id)
        .bind(number)
        .bind(amount)
        .bind(currency)
        .bind(status)
        .bind(parent_quotation_id)
        .bind(payment_method)
        .bind(paid_at)
        .fetch_one(&mut **tx)
        .await?;

        Ok(invoice)
    }

    pub async fn insert_invoice_line_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        invoice_id: Uuid,
        quotation_line_item_id: Option<Uuid>,
        description: &str,
        quantity: Decimal,
        unit_price: Decimal,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO invoice_line_items
                (invoice_id, quotation_line_item_id, description, quantity,
                 unit_price, total_price)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(invoice_id)
        .bind(quotation_line_item_id)
        .bind(description)
        .bind(quantity)
        .bind(unit_price)
        .bind(unit_price * quantity)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Record a successful payment on an invoice. Runs inside the caller's
    /// transaction so the session write and the paid flag commit together.
    pub async fn set_invoice_paid_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        account_id: Uuid,
        id: Uuid,
        paid_at: DateTime<Utc>,
        payment_method: Option<&str>,
        audit_note: &str,
    ) -> AppResult<Invoice> {
        sqlx::query_as::<_, Invoice>(
            r#"
            UPDATE invoices
            SET status = 'paid', paid_at = $3, payment_method = COALESCE($4, payment_method),
                audit_note = $5, updated_at = NOW()
            WHERE id = $1 AND account_id = $2
            RETURNING id, account_id, project_id, number, amount, currency, status,
                      parent_quotation_id, checkout_session_id, payment_method,
                      paid_at, audit_note, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(account_id)
        .bind(paid_at)
        .bind(payment_method)
        .bind(audit_note)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| BillingError::InvoiceNotFound(id).into())
    }

    /// Attach (or replace) the external checkout session on an invoice.
    pub async fn set_invoice_checkout_session_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        account_id: Uuid,
        id: Uuid,
        session_id: &str,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE invoices
            SET checkout_session_id = $3, updated_at = NOW()
            WHERE id = $1 AND account_id = $2
            "#,
        )
        .bind(id)
        .bind(account_id)
        .bind(session_id)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Undo a provider-driven payment: back to pending, paid_at cleared.
    /// Used by payout reversal bookkeeping; runs inside the reversal tx.
    pub async fn restore_invoice_unpaid_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        audit_note: &str,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE invoices
            SET status = 'pending', paid_at = NULL, audit_note = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'paid'
            "#,
        )
        .bind(id)
        .bind(audit_note)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}
