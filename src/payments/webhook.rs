// Wave webhook intake.
//
// The endpoint answers 202 immediately and reconciles in a background task;
// the provider retries on failure, so background errors are logged and the
// next delivery gets another chance.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::spawn;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::directory::DirectoryRepository;
use crate::error::AppResult;
use crate::notifications::Notifier;
use crate::payments::lifecycle::PaymentLifecycle;
use crate::payments::provider::{parse_provider_amount, PaymentGateway};
use crate::payments::repository::PaymentRepository;
use crate::transactions::resolver::{classify, Attribution};
use crate::transactions::TransactionRepository;

/// Webhook payload for payment notifications
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaveWebhookPayload {
    /// Provider-side id of the session, payout or transaction
    pub reference: String,
    pub status: String,
    pub amount: String,
    pub currency: String,
    /// Merchant account the event belongs to; required only for payments
    /// that match no local session or payout
    pub merchant_id: Option<Uuid>,
    pub counterparty_mobile: Option<String>,
}

/// Webhook response - return 202 Accepted immediately
#[derive(Debug, Serialize)]
pub struct WebhookAcceptedResponse {
    pub status: String,
    pub message: String,
    pub webhook_id: String,
}

/// Async webhook processor - reconciles provider events without blocking
#[derive(Clone)]
pub struct WaveWebhookProcessor {
    payments: Arc<PaymentRepository>,
    transactions: Arc<TransactionRepository>,
    directory: Arc<DirectoryRepository>,
    lifecycle: Arc<PaymentLifecycle>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Notifier,
}

impl WaveWebhookProcessor {
    pub fn new(
        payments: Arc<PaymentRepository>,
        transactions: Arc<TransactionRepository>,
        directory: Arc<DirectoryRepository>,
        lifecycle: Arc<PaymentLifecycle>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Notifier,
    ) -> Self {
        Self {
            payments,
            transactions,
            directory,
            lifecycle,
            gateway,
            notifier,
        }
    }

    /// Accept the webhook and return 202 immediately; process in background.
    pub fn process_webhook_async(&self, payload: WaveWebhookPayload) -> WebhookAcceptedResponse {
        let webhook_id = Uuid::new_v4().to_string();
        let processor = self.clone();
        let id = webhook_id.clone();

        spawn(async move {
            if let Err(e) = processor.process_webhook_background(payload).await {
                error!("Webhook processing error for {}: {:?}", id, e);
            }
        });

        WebhookAcceptedResponse {
            status: "accepted".to_string(),
            message: "Webhook received and queued for processing".to_string(),
            webhook_id,
        }
    }

    async fn process_webhook_background(&self, payload: WaveWebhookPayload) -> AppResult<()> {
        info!(
            "⚙️ Processing webhook: {} ({})",
            payload.reference, payload.status
        );

        // The delivery is unauthenticated, so only the reference is taken
        // from it; the provider is re-queried for the authoritative state.
        if let Some(session) = self
            .payments
            .get_session_by_external_ref(&payload.reference)
            .await?
        {
            let update = self.gateway.get_session(&payload.reference).await?;
            return self.lifecycle.apply_session_update(&session, &update).await;
        }

        if let Some(payout) = self
            .payments
            .get_payout_by_external_ref(&payload.reference)
            .await?
        {
            let update = self.gateway.get_payout(&payload.reference).await?;
            return self.lifecycle.apply_payout_update(&payout, update.status).await;
        }

        // Otherwise an unsolicited inbound payment: run counterparty matching
        self.ingest_inbound_payment(payload).await
    }

    /// Record an inbound payment that matches no session or payout, binding
    /// it to a counterparty when the mobile number is unambiguous.
    async fn ingest_inbound_payment(&self, payload: WaveWebhookPayload) -> AppResult<()> {
        let Some(account_id) = payload.merchant_id else {
            warn!(
                "Inbound payment {} carries no merchant id, skipping",
                payload.reference
            );
            return Ok(());
        };

        // Replayed delivery
        if self
            .transactions
            .get_by_external_ref(&payload.reference)
            .await?
            .is_some()
        {
            info!("Transaction {} already recorded, no-op", payload.reference);
            return Ok(());
        }

        // Record only what the provider confirms exists; the delivered
        // amount and counterparty are hints at best
        let Some(transaction) = self
            .gateway
            .search_by_reference(&payload.reference)
            .await?
            .into_iter()
            .next()
        else {
            warn!(
                "Inbound payment {} unknown to the provider, ignoring",
                payload.reference
            );
            return Ok(());
        };

        let amount = transaction.amount;
        if parse_provider_amount(&payload.amount).ok() != Some(amount) {
            warn!(
                "Webhook amount {} {} for {} disagrees with the provider record, using the provider value",
                payload.amount, payload.currency, payload.reference
            );
        }
        let currency = transaction.currency;
        let mobile = transaction
            .counterparty_mobile
            .or_else(|| payload.counterparty_mobile.clone())
            .unwrap_or_default();

        let (clients, providers) = if mobile.is_empty() {
            (Vec::new(), Vec::new())
        } else {
            (
                self.directory
                    .find_clients_by_mobile(account_id, &mobile)
                    .await?,
                self.directory
                    .find_providers_by_mobile(account_id, &mobile)
                    .await?,
            )
        };

        match classify(&clients, &providers) {
            Attribution::Unassigned => {
                self.transactions
                    .insert_assignment(
                        account_id,
                        &payload.reference,
                        amount,
                        &currency,
                        &mobile,
                        None,
                        None,
                        None,
                        None,
                        false,
                        None,
                    )
                    .await?;
                info!("Inbound payment {} recorded unassigned", payload.reference);
            }
            Attribution::Auto {
                candidate,
                direction,
            } => {
                use crate::transactions::models::CounterpartyKind;
                let (client_id, provider_id) = match candidate.kind {
                    CounterpartyKind::Client => (Some(candidate.id), None),
                    CounterpartyKind::Provider => (None, Some(candidate.id)),
                };
                self.transactions
                    .insert_assignment(
                        account_id,
                        &payload.reference,
                        amount,
                        &currency,
                        &mobile,
                        Some(direction),
                        client_id,
                        provider_id,
                        Some(&candidate.name),
                        false,
                        None,
                    )
                    .await?;
                info!(
                    "Inbound payment {} auto-assigned to {}",
                    payload.reference, candidate.name
                );
            }
            Attribution::Ambiguous(candidates) => {
                let count = candidates.len();
                self.transactions
                    .insert_assignment(
                        account_id,
                        &payload.reference,
                        amount,
                        &currency,
                        &mobile,
                        None,
                        None,
                        None,
                        None,
                        true,
                        Some(candidates),
                    )
                    .await?;
                self.notifier.dispatch(
                    account_id,
                    "transaction_conflict",
                    "Payment needs review",
                    &format!(
                        "An inbound payment of {} {} matches {} contacts and needs manual assignment",
                        amount, currency, count
                    ),
                );
                info!(
                    "Inbound payment {} held for resolution ({} candidates)",
                    payload.reference, count
                );
            }
        }

        Ok(())
    }
}
