// Payment lifecycle tracker.
//
// Reconciles the external provider's authoritative state with the local
// ledger. Ordering rule everywhere: the gateway call happens first, local
// persistence of its result second, and every multi-entity local write runs
// in one transaction. A gateway failure therefore never leaves a
// half-committed local record.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::billing::models::Invoice;
use crate::billing::BillingRepository;
use crate::directory::DirectoryRepository;
use crate::error::{AppResult, PaymentError};
use crate::notifications::Notifier;
use crate::payments::models::*;
use crate::payments::provider::{
    CreatePayoutRequest, CreateSessionRequest, PaymentGateway, ProviderSession,
};
use crate::payments::repository::PaymentRepository;

/// What marking an invoice paid should do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkPaidAction {
    /// Invoice is already paid: report success, change nothing, notify nobody
    AlreadyPaid,
    Apply { paid_at: DateTime<Utc> },
}

/// Decide how to handle a mark-paid request. Pure; the idempotency contract
/// lives here.
pub fn plan_mark_paid(
    invoice: &Invoice,
    supplied_paid_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> MarkPaidAction {
    if invoice.is_paid() {
        MarkPaidAction::AlreadyPaid
    } else {
        MarkPaidAction::Apply {
            paid_at: supplied_paid_at.unwrap_or(now),
        }
    }
}

/// How to apply a provider-reported session status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdateAction {
    /// Record the session outcome and mark the invoice paid, atomically
    SettlePayment { paid_at: DateTime<Utc> },
    /// Move the session status only
    SetStatus,
    /// Nothing left to apply
    Noop,
}

/// Decide how to apply a provider-reported session status. Pure. A succeeded
/// report re-checks the invoice even when the session already reads
/// succeeded, so a crash between the session write and the invoice write
/// heals on the next delivery.
pub fn plan_session_update(
    session: &PaymentSession,
    reported: SessionStatus,
    invoice: &Invoice,
    now: DateTime<Utc>,
) -> SessionUpdateAction {
    if reported == SessionStatus::Succeeded {
        return match plan_mark_paid(invoice, None, now) {
            MarkPaidAction::Apply { paid_at } => SessionUpdateAction::SettlePayment { paid_at },
            MarkPaidAction::AlreadyPaid if session.status != reported => {
                SessionUpdateAction::SetStatus
            }
            MarkPaidAction::AlreadyPaid => SessionUpdateAction::Noop,
        };
    }

    if session.status != reported {
        SessionUpdateAction::SetStatus
    } else {
        SessionUpdateAction::Noop
    }
}

/// Ledger bookkeeping for a payout reversal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReversalBookkeeping {
    /// The payout succeeded and was mirrored as an expense; book the negative
    /// offset (the original entry stays)
    Compensate { amount: Decimal, description: String },
    /// The payout never succeeded, so no expense exists to offset; the
    /// status flip alone restores the ledger
    StatusOnly,
}

/// Decide the bookkeeping for a reversal. Pure; rejects payouts that are not
/// in a reversible state, carrying the current status.
pub fn plan_reversal(payout: &Payout) -> AppResult<ReversalBookkeeping> {
    if !payout.status.can_reverse() {
        return Err(PaymentError::InvalidTransition {
            entity: "payout",
            current: payout.status.to_string(),
            requested: PayoutStatus::Reversed.to_string(),
        }
        .into());
    }

    if payout.status == PayoutStatus::Succeeded || payout.expense_id.is_some() {
        Ok(ReversalBookkeeping::Compensate {
            amount: -payout.amount,
            description: format!("Reversal of payout {}", payout.external_ref),
        })
    } else {
        Ok(ReversalBookkeeping::StatusOnly)
    }
}

pub struct MarkPaidOutcome {
    pub invoice: Invoice,
    pub already_paid: bool,
}

pub struct PaymentLifecycle {
    billing: Arc<BillingRepository>,
    payments: Arc<PaymentRepository>,
    directory: Arc<DirectoryRepository>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Notifier,
}

impl PaymentLifecycle {
    pub fn new(
        billing: Arc<BillingRepository>,
        payments: Arc<PaymentRepository>,
        directory: Arc<DirectoryRepository>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Notifier,
    ) -> Self {
        Self {
            billing,
            payments,
            directory,
            gateway,
            notifier,
        }
    }

    // ========== CHECKOUT SESSIONS ==========

    /// Create a hosted payment link for an invoice.
    ///
    /// Refused when a link already exists, unless the caller explicitly asks
    /// for regeneration.
    pub async fn create_payment_link(
        &self,
        account_id: Uuid,
        invoice_id: Uuid,
        regenerate: bool,
    ) -> AppResult<PaymentSession> {
        let invoice = self.billing.get_invoice(account_id, invoice_id).await?;

        if let Some(existing) = &invoice.checkout_session_id {
            if !regenerate {
                return Err(PaymentError::LinkAlreadyExists {
                    session_id: existing.clone(),
                }
                .into());
            }
        }

        let provider_session = self
            .gateway
            .create_session(CreateSessionRequest {
                amount: invoice.amount.to_string(),
                currency: invoice.currency.clone(),
                client_reference: invoice.number.clone(),
            })
            .await?;

        // Gateway succeeded; mirror the session locally in one transaction,
        // retiring any link this one replaces
        let mut tx = self.payments.begin_tx().await?;
        let session = self
            .payments
            .insert_session_tx(
                &mut tx,
                account_id,
                invoice.id,
                &provider_session.id,
                provider_session.launch_url.as_deref(),
                provider_session.amount,
                &provider_session.currency,
            )
            .await?;
        self.payments
            .expire_superseded_sessions_tx(&mut tx, invoice.id, &provider_session.id)
            .await?;
        self.billing
            .set_invoice_checkout_session_tx(&mut tx, account_id, invoice.id, &provider_session.id)
            .await?;
        tx.commit().await.map_err(crate::error::AppError::from)?;

        info!(
            "Payment link created for invoice {}: {}",
            invoice.number, provider_session.id
        );
        Ok(session)
    }

    /// Mark an invoice paid. Idempotent: an already-paid invoice returns
    /// success with nothing mutated and no duplicate notification.
    pub async fn mark_invoice_paid(
        &self,
        account_id: Uuid,
        invoice_id: Uuid,
        paid_at: Option<DateTime<Utc>>,
        payment_method: Option<&str>,
        audit_note: &str,
    ) -> AppResult<MarkPaidOutcome> {
        let invoice = self.billing.get_invoice(account_id, invoice_id).await?;

        let paid_at = match plan_mark_paid(&invoice, paid_at, Utc::now()) {
            MarkPaidAction::AlreadyPaid => {
                info!("Invoice {} already paid, no-op", invoice.number);
                return Ok(MarkPaidOutcome {
                    invoice,
                    already_paid: true,
                });
            }
            MarkPaidAction::Apply { paid_at } => paid_at,
        };

        let mut tx = self.billing.begin_tx().await?;
        let invoice = self
            .billing
            .set_invoice_paid_tx(&mut tx, account_id, invoice_id, paid_at, payment_method, audit_note)
            .await?;
        tx.commit().await.map_err(crate::error::AppError::from)?;

        self.notifier.dispatch(
            account_id,
            "invoice_paid",
            "Invoice paid",
            &format!("Invoice {} was marked paid", invoice.number),
        );

        Ok(MarkPaidOutcome {
            invoice,
            already_paid: false,
        })
    }

    /// Expire the live payment link of an invoice.
    pub async fn expire_session(
        &self,
        account_id: Uuid,
        invoice_id: Uuid,
    ) -> AppResult<PaymentSession> {
        let (invoice, session) = self.invoice_session(account_id, invoice_id).await?;

        if !session.status.can_expire() {
            return Err(PaymentError::InvalidTransition {
                entity: "payment session",
                current: session.status.to_string(),
                requested: SessionStatus::Expired.to_string(),
            }
            .into());
        }

        let updated = self.gateway.expire_session(&session.external_ref).await?;
        self.payments
            .set_session_status(session.id, updated.status)
            .await?;

        info!("Payment link expired for invoice {}", invoice.number);
        self.payments
            .get_session_for_invoice(account_id, invoice_id, &session.external_ref)
            .await
    }

    /// Refund a collected payment session and restore the invoice to unpaid.
    pub async fn refund_session(
        &self,
        account_id: Uuid,
        invoice_id: Uuid,
    ) -> AppResult<PaymentSession> {
        let (invoice, session) = self.invoice_session(account_id, invoice_id).await?;

        if !session.status.can_refund() {
            return Err(PaymentError::InvalidTransition {
                entity: "payment session",
                current: session.status.to_string(),
                requested: SessionStatus::Refunded.to_string(),
            }
            .into());
        }

        let updated = self.gateway.refund_session(&session.external_ref).await?;

        let mut tx = self.payments.begin_tx().await?;
        self.payments
            .set_session_status_tx(&mut tx, session.id, updated.status)
            .await?;
        self.billing
            .restore_invoice_unpaid_tx(
                &mut tx,
                invoice.id,
                &format!("Payment refunded via session {}", session.external_ref),
            )
            .await?;
        tx.commit().await.map_err(crate::error::AppError::from)?;

        info!("Session {} refunded", session.external_ref);
        self.payments
            .get_session_for_invoice(account_id, invoice_id, &session.external_ref)
            .await
    }

    async fn invoice_session(
        &self,
        account_id: Uuid,
        invoice_id: Uuid,
    ) -> AppResult<(Invoice, PaymentSession)> {
        let invoice = self.billing.get_invoice(account_id, invoice_id).await?;
        let external_ref = invoice
            .checkout_session_id
            .clone()
            .ok_or_else(|| PaymentError::SessionNotFound(invoice_id.to_string()))?;
        let session = self
            .payments
            .get_session_for_invoice(account_id, invoice_id, &external_ref)
            .await?;
        Ok((invoice, session))
    }

    /// Apply a provider-reported session state, typically from a webhook.
    /// The session write and the invoice paid flag commit in one
    /// transaction; a replayed delivery settles whatever is still missing
    /// and notifies at most once.
    pub async fn apply_session_update(
        &self,
        session: &PaymentSession,
        update: &ProviderSession,
    ) -> AppResult<()> {
        let invoice = self
            .billing
            .get_invoice(session.account_id, session.invoice_id)
            .await?;

        match plan_session_update(session, update.status, &invoice, Utc::now()) {
            SessionUpdateAction::Noop => Ok(()),
            SessionUpdateAction::SetStatus => {
                self.payments
                    .set_session_status(session.id, update.status)
                    .await
            }
            SessionUpdateAction::SettlePayment { paid_at } => {
                let mut tx = self.payments.begin_tx().await?;
                self.payments
                    .set_session_status_tx(&mut tx, session.id, update.status)
                    .await?;
                let invoice = self
                    .billing
                    .set_invoice_paid_tx(
                        &mut tx,
                        session.account_id,
                        session.invoice_id,
                        paid_at,
                        Some("wave"),
                        &format!("Paid via Wave session {}", session.external_ref),
                    )
                    .await?;
                tx.commit().await.map_err(crate::error::AppError::from)?;

                self.notifier.dispatch(
                    session.account_id,
                    "invoice_paid",
                    "Invoice paid",
                    &format!("Invoice {} was marked paid", invoice.number),
                );
                info!(
                    "Session {} settled invoice {}",
                    session.external_ref, invoice.number
                );
                Ok(())
            }
        }
    }

    // ========== PAYOUTS ==========

    /// Send an outbound payment to a provider (subcontractor).
    pub async fn create_payout(
        &self,
        account_id: Uuid,
        provider_id: Uuid,
        amount: Decimal,
        currency: &str,
    ) -> AppResult<Payout> {
        let provider = self.directory.get_provider(account_id, provider_id).await?;
        let mobile = provider.mobile.clone().ok_or_else(|| {
            crate::error::AppError::Validation(format!(
                "Provider {} has no mobile number on record",
                provider.name
            ))
        })?;

        let reference = Uuid::new_v4().to_string();
        let provider_payout = self
            .gateway
            .create_payout(CreatePayoutRequest {
                amount: amount.to_string(),
                currency: currency.to_string(),
                mobile,
                client_reference: reference,
            })
            .await?;

        let payout = self
            .payments
            .insert_payout(
                account_id,
                provider_id,
                &provider_payout.id,
                provider_payout.amount,
                &provider_payout.currency,
                provider_payout.status,
            )
            .await?;

        info!(
            "Payout {} created for provider {} ({} {})",
            payout.external_ref, provider.name, payout.amount, payout.currency
        );

        if provider_payout.status == PayoutStatus::Succeeded {
            return self.record_payout_success(&payout).await;
        }

        Ok(payout)
    }

    /// Record the expense mirror for a payout that reached succeeded.
    /// Idempotent on the expense link.
    pub async fn record_payout_success(&self, payout: &Payout) -> AppResult<Payout> {
        if payout.expense_id.is_some() {
            return Ok(payout.clone());
        }

        let provider = self
            .directory
            .get_provider(payout.account_id, payout.provider_id)
            .await?;

        let mut tx = self.payments.begin_tx().await?;
        if payout.status != PayoutStatus::Succeeded {
            self.payments
                .set_payout_status_tx(&mut tx, payout.id, payout.status, PayoutStatus::Succeeded)
                .await?;
        }
        let expense = self
            .payments
            .insert_expense_tx(
                &mut tx,
                payout.account_id,
                Some(payout.provider_id),
                None,
                &format!("Payout to {} ({})", provider.name, payout.external_ref),
                payout.amount,
                ExpenseSource::Payout,
                Some(payout.id),
                Utc::now(),
            )
            .await?;
        self.payments
            .link_payout_expense_tx(&mut tx, payout.id, expense.id)
            .await?;
        tx.commit().await.map_err(crate::error::AppError::from)?;

        self.notifier.dispatch(
            payout.account_id,
            "payout_succeeded",
            "Payout completed",
            &format!("Payout to {} completed", provider.name),
        );

        self.payments.get_payout(payout.account_id, payout.id).await
    }

    /// Reverse a payout.
    ///
    /// Gateway first, then one transaction: status to reversed plus, when
    /// the payout had been mirrored as an expense, a compensating negative
    /// entry (the original stays). A payout reversed while still in flight
    /// has no mirror to offset and gets the status flip only.
    pub async fn reverse_payout(&self, account_id: Uuid, payout_id: Uuid) -> AppResult<Payout> {
        let payout = self.payments.get_payout(account_id, payout_id).await?;
        let plan = plan_reversal(&payout)?;

        let reversed = self.gateway.reverse_payout(&payout.external_ref).await?;
        if reversed.status != PayoutStatus::Reversed {
            return Err(PaymentError::InvalidTransition {
                entity: "payout",
                current: reversed.status.to_string(),
                requested: PayoutStatus::Reversed.to_string(),
            }
            .into());
        }

        let mut tx = self.payments.begin_tx().await?;
        self.payments
            .set_payout_status_tx(&mut tx, payout.id, payout.status, PayoutStatus::Reversed)
            .await?;
        if let ReversalBookkeeping::Compensate { amount, description } = &plan {
            self.payments
                .insert_expense_tx(
                    &mut tx,
                    account_id,
                    Some(payout.provider_id),
                    None,
                    description,
                    *amount,
                    ExpenseSource::Reversal,
                    Some(payout.id),
                    Utc::now(),
                )
                .await?;
        }
        if let Err(e) = tx.commit().await {
            // The provider reversal went through but the local mirror did
            // not; keep the external ref in the log for manual reconciliation.
            error!(
                "Local reversal bookkeeping failed after provider reversal {}: {:?}",
                payout.external_ref, e
            );
            return Err(crate::error::AppError::from(e));
        }

        self.notifier.dispatch(
            account_id,
            "payout_reversed",
            "Payout reversed",
            &format!("Payout {} was reversed", payout.external_ref),
        );

        info!("Payout {} reversed", payout.external_ref);
        self.payments.get_payout(account_id, payout.id).await
    }

    /// Apply a provider-reported payout state, typically from a webhook.
    pub async fn apply_payout_update(
        &self,
        payout: &Payout,
        new_status: PayoutStatus,
    ) -> AppResult<()> {
        if payout.status == new_status {
            return Ok(());
        }

        match new_status {
            PayoutStatus::Succeeded => {
                self.record_payout_success(payout).await?;
            }
            PayoutStatus::Failed => {
                let mut tx = self.payments.begin_tx().await?;
                self.payments
                    .set_payout_status_tx(&mut tx, payout.id, payout.status, PayoutStatus::Failed)
                    .await?;
                tx.commit().await.map_err(crate::error::AppError::from)?;
                self.notifier.dispatch(
                    payout.account_id,
                    "payout_failed",
                    "Payout failed",
                    &format!("Payout {} failed", payout.external_ref),
                );
            }
            PayoutStatus::Reversed => {
                // Provider-initiated reversal: mirror the bookkeeping locally
                let plan = plan_reversal(payout)?;
                let mut tx = self.payments.begin_tx().await?;
                self.payments
                    .set_payout_status_tx(&mut tx, payout.id, payout.status, PayoutStatus::Reversed)
                    .await?;
                if let ReversalBookkeeping::Compensate { amount, description } = &plan {
                    self.payments
                        .insert_expense_tx(
                            &mut tx,
                            payout.account_id,
                            Some(payout.provider_id),
                            None,
                            description,
                            *amount,
                            ExpenseSource::Reversal,
                            Some(payout.id),
                            Utc::now(),
                        )
                        .await?;
                }
                tx.commit().await.map_err(crate::error::AppError::from)?;
            }
            PayoutStatus::Processing => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::models::{Invoice, InvoiceStatus};
    use rust_decimal_macros::dec;

    fn invoice(status: InvoiceStatus, paid_at: Option<DateTime<Utc>>) -> Invoice {
        Invoice {
            id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            number: "INV-2025-001".to_string(),
            amount: dec!(50000),
            currency: "XOF".to_string(),
            status,
            parent_quotation_id: None,
            checkout_session_id: None,
            payment_method: None,
            paid_at,
            audit_note: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn payout(status: PayoutStatus) -> Payout {
        Payout {
            id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            provider_id: Uuid::new_v4(),
            external_ref: "po-7f2c".to_string(),
            amount: dec!(75000),
            currency: "XOF".to_string(),
            status,
            expense_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn session(status: SessionStatus) -> PaymentSession {
        PaymentSession {
            id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            invoice_id: Uuid::new_v4(),
            external_ref: "cs-19ab".to_string(),
            launch_url: None,
            amount: dec!(50000),
            currency: "XOF".to_string(),
            status,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn marking_a_paid_invoice_again_is_a_no_op() {
        let paid_at = Utc::now();
        let inv = invoice(InvoiceStatus::Paid, Some(paid_at));
        let action = plan_mark_paid(&inv, Some(Utc::now()), Utc::now());
        assert_eq!(action, MarkPaidAction::AlreadyPaid);
    }

    #[test]
    fn mark_paid_uses_supplied_timestamp() {
        let inv = invoice(InvoiceStatus::Pending, None);
        let supplied = Utc::now() - chrono::Duration::days(3);
        let action = plan_mark_paid(&inv, Some(supplied), Utc::now());
        assert_eq!(action, MarkPaidAction::Apply { paid_at: supplied });
    }

    #[test]
    fn mark_paid_defaults_to_now() {
        let inv = invoice(InvoiceStatus::Pending, None);
        let now = Utc::now();
        let action = plan_mark_paid(&inv, None, now);
        assert_eq!(action, MarkPaidAction::Apply { paid_at: now });
    }

    #[test]
    fn succeeded_report_settles_even_when_session_already_succeeded() {
        // The session write committed but the invoice write was lost; the
        // next delivery must still settle the invoice
        let s = session(SessionStatus::Succeeded);
        let inv = invoice(InvoiceStatus::Pending, None);
        let now = Utc::now();
        assert_eq!(
            plan_session_update(&s, SessionStatus::Succeeded, &inv, now),
            SessionUpdateAction::SettlePayment { paid_at: now }
        );
    }

    #[test]
    fn replayed_succeeded_report_is_a_no_op_once_settled() {
        let s = session(SessionStatus::Succeeded);
        let inv = invoice(InvoiceStatus::Paid, Some(Utc::now()));
        assert_eq!(
            plan_session_update(&s, SessionStatus::Succeeded, &inv, Utc::now()),
            SessionUpdateAction::Noop
        );
    }

    #[test]
    fn succeeded_report_on_manually_paid_invoice_moves_session_only() {
        let s = session(SessionStatus::Created);
        let inv = invoice(InvoiceStatus::Paid, Some(Utc::now()));
        assert_eq!(
            plan_session_update(&s, SessionStatus::Succeeded, &inv, Utc::now()),
            SessionUpdateAction::SetStatus
        );
    }

    #[test]
    fn non_success_report_moves_status_only_when_changed() {
        let inv = invoice(InvoiceStatus::Pending, None);
        assert_eq!(
            plan_session_update(&session(SessionStatus::Created), SessionStatus::Expired, &inv, Utc::now()),
            SessionUpdateAction::SetStatus
        );
        assert_eq!(
            plan_session_update(&session(SessionStatus::Expired), SessionStatus::Expired, &inv, Utc::now()),
            SessionUpdateAction::Noop
        );
    }

    #[test]
    fn reversal_of_succeeded_payout_books_negative_offset() {
        match plan_reversal(&payout(PayoutStatus::Succeeded)).unwrap() {
            ReversalBookkeeping::Compensate { amount, description } => {
                assert_eq!(amount, dec!(-75000));
                assert!(description.contains("po-7f2c"));
            }
            other => panic!("unexpected bookkeeping: {:?}", other),
        }
    }

    #[test]
    fn reversal_of_in_flight_payout_books_no_expense() {
        // No expense was ever mirrored, so an offset would fabricate income
        assert_eq!(
            plan_reversal(&payout(PayoutStatus::Processing)).unwrap(),
            ReversalBookkeeping::StatusOnly
        );
    }

    #[test]
    fn reversing_a_reversed_payout_is_a_conflict() {
        let err = plan_reversal(&payout(PayoutStatus::Reversed)).unwrap_err();
        match err {
            crate::error::AppError::Payment(PaymentError::InvalidTransition {
                current, ..
            }) => assert_eq!(current, "reversed"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn reversing_a_failed_payout_is_a_conflict() {
        assert!(plan_reversal(&payout(PayoutStatus::Failed)).is_err());
    }

    #[test]
    fn in_flight_payout_is_reversible() {
        assert!(plan_reversal(&payout(PayoutStatus::Processing)).is_ok());
    }
}
