// Wave mobile-money gateway client.
//
// Every field coming back from the provider is untrusted input: amounts
// arrive as strings and are parsed into Decimal, statuses decode through a
// fixed mapping, anything unknown is an error before persistence.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::error::{AppError, AppResult, PaymentError, ProviderError};
use crate::payments::models::{PayoutStatus, SessionStatus};

/// Validated view of a provider checkout session
#[derive(Debug, Clone)]
pub struct ProviderSession {
    pub id: String,
    pub launch_url: Option<String>,
    pub status: SessionStatus,
    pub amount: Decimal,
    pub currency: String,
}

/// Validated view of a provider payout
#[derive(Debug, Clone)]
pub struct ProviderPayout {
    pub id: String,
    pub status: PayoutStatus,
    pub amount: Decimal,
    pub currency: String,
}

/// Validated view of a provider-side transaction found by reference
#[derive(Debug, Clone)]
pub struct ProviderTransaction {
    pub id: String,
    pub amount: Decimal,
    pub currency: String,
    pub counterparty_mobile: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateSessionRequest {
    pub amount: String,
    pub currency: String,
    pub client_reference: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatePayoutRequest {
    pub amount: String,
    pub currency: String,
    pub mobile: String,
    pub client_reference: String,
}

/// Seam to the external payment collaborator. The HTTP implementation is
/// `WaveClient`; tests substitute their own.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_session(&self, request: CreateSessionRequest) -> AppResult<ProviderSession>;
    async fn get_session(&self, session_id: &str) -> AppResult<ProviderSession>;
    async fn expire_session(&self, session_id: &str) -> AppResult<ProviderSession>;
    async fn refund_session(&self, session_id: &str) -> AppResult<ProviderSession>;
    async fn create_payout(&self, request: CreatePayoutRequest) -> AppResult<ProviderPayout>;
    async fn get_payout(&self, payout_id: &str) -> AppResult<ProviderPayout>;
    async fn reverse_payout(&self, payout_id: &str) -> AppResult<ProviderPayout>;
    async fn search_by_reference(&self, reference: &str)
        -> AppResult<Vec<ProviderTransaction>>;
}

// ========== WIRE PAYLOADS ==========

#[derive(Debug, Deserialize)]
struct WaveSessionPayload {
    id: String,
    #[serde(default)]
    wave_launch_url: Option<String>,
    checkout_status: String,
    amount: String,
    currency: String,
}

#[derive(Debug, Deserialize)]
struct WavePayoutPayload {
    id: String,
    status: String,
    #[serde(alias = "receive_amount")]
    amount: String,
    currency: String,
}

#[derive(Debug, Deserialize)]
struct WaveSearchPayload {
    result: Vec<WaveTransactionPayload>,
}

#[derive(Debug, Deserialize)]
struct WaveTransactionPayload {
    id: String,
    amount: String,
    currency: String,
    #[serde(default)]
    mobile: Option<String>,
}

/// Parse a provider amount string; rejects garbage and negative values.
pub fn parse_provider_amount(raw: &str) -> AppResult<Decimal> {
    let amount = Decimal::from_str(raw.trim())
        .map_err(|_| AppError::Payment(PaymentError::InvalidAmount(raw.to_string())))?;
    if amount < Decimal::ZERO {
        return Err(PaymentError::InvalidAmount(raw.to_string()).into());
    }
    Ok(amount)
}

/// Map a provider session status onto the local enum.
pub fn parse_session_status(raw: &str) -> AppResult<SessionStatus> {
    match raw {
        "open" | "created" => Ok(SessionStatus::Created),
        "complete" | "succeeded" => Ok(SessionStatus::Succeeded),
        "failed" | "error" => Ok(SessionStatus::Failed),
        "expired" => Ok(SessionStatus::Expired),
        "refunded" => Ok(SessionStatus::Refunded),
        other => Err(PaymentError::UnknownStatus(other.to_string()).into()),
    }
}

/// Map a provider payout status onto the local enum.
pub fn parse_payout_status(raw: &str) -> AppResult<PayoutStatus> {
    match raw {
        "processing" | "pending" => Ok(PayoutStatus::Processing),
        "succeeded" | "complete" => Ok(PayoutStatus::Succeeded),
        "failed" | "error" => Ok(PayoutStatus::Failed),
        "reversed" | "refunded" => Ok(PayoutStatus::Reversed),
        other => Err(PaymentError::UnknownStatus(other.to_string()).into()),
    }
}

impl WaveSessionPayload {
    fn validate(self) -> AppResult<ProviderSession> {
        Ok(ProviderSession {
            status: parse_session_status(&self.checkout_status)?,
            amount: parse_provider_amount(&self.amount)?,
            id: self.id,
            launch_url: self.wave_launch_url,
            currency: self.currency,
        })
    }
}

impl WavePayoutPayload {
    fn validate(self) -> AppResult<ProviderPayout> {
        Ok(ProviderPayout {
            status: parse_payout_status(&self.status)?,
            amount: parse_provider_amount(&self.amount)?,
            id: self.id,
            currency: self.currency,
        })
    }
}

// ========== HTTP CLIENT ==========

/// Wave HTTP client with bearer auth and a bounded per-call timeout
pub struct WaveClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl WaveClient {
    pub fn new(base_url: String, api_key: String, timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            api_key,
            client,
        })
    }

    fn map_transport_error(error: reqwest::Error) -> AppError {
        if error.is_timeout() || error.is_connect() {
            // Retryable: the provider's state is unknown, local state untouched
            AppError::Provider(ProviderError::Unavailable(error.to_string()))
        } else {
            AppError::Provider(ProviderError::Http(error))
        }
    }

    async fn send<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> AppResult<T> {
        let response = request
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let payload = response
                .json::<serde_json::Value>()
                .await
                .unwrap_or_else(|_| serde_json::json!({"error": "unreadable provider response"}));
            warn!("Wave API error ({}): {}", status, payload);
            return Err(ProviderError::Api {
                status: status.as_u16(),
                payload,
            }
            .into());
        }

        Ok(response.json::<T>().await.map_err(Self::map_transport_error)?)
    }
}

#[async_trait]
impl PaymentGateway for WaveClient {
    async fn create_session(&self, request: CreateSessionRequest) -> AppResult<ProviderSession> {
        let payload: WaveSessionPayload = self
            .send(
                self.client
                    .post(format!("{}/v1/checkout/sessions", self.base_url))
                    .json(&request),
            )
            .await?;
        payload.validate()
    }

    async fn get_session(&self, session_id: &str) -> AppResult<ProviderSession> {
        let payload: WaveSessionPayload = self
            .send(
                self.client
                    .get(format!("{}/v1/checkout/sessions/{}", self.base_url, session_id)),
            )
            .await?;
        payload.validate()
    }

    async fn expire_session(&self, session_id: &str) -> AppResult<ProviderSession> {
        let payload: WaveSessionPayload = self
            .send(self.client.post(format!(
                "{}/v1/checkout/sessions/{}/expire",
                self.base_url, session_id
            )))
            .await?;
        payload.validate()
    }

    async fn refund_session(&self, session_id: &str) -> AppResult<ProviderSession> {
        let payload: WaveSessionPayload = self
            .send(self.client.post(format!(
                "{}/v1/checkout/sessions/{}/refund",
                self.base_url, session_id
            )))
            .await?;
        payload.validate()
    }

    async fn create_payout(&self, request: CreatePayoutRequest) -> AppResult<ProviderPayout> {
        let payload: WavePayoutPayload = self
            .send(
                self.client
                    .post(format!("{}/v1/payout", self.base_url))
                    .json(&request),
            )
            .await?;
        payload.validate()
    }

    async fn get_payout(&self, payout_id: &str) -> AppResult<ProviderPayout> {
        let payload: WavePayoutPayload = self
            .send(
                self.client
                    .get(format!("{}/v1/payout/{}", self.base_url, payout_id)),
            )
            .await?;
        payload.validate()
    }

    async fn reverse_payout(&self, payout_id: &str) -> AppResult<ProviderPayout> {
        let payload: WavePayoutPayload = self
            .send(
                self.client
                    .post(format!("{}/v1/payout/{}/reverse", self.base_url, payout_id)),
            )
            .await?;
        payload.validate()
    }

    async fn search_by_reference(
        &self,
        reference: &str,
    ) -> AppResult<Vec<ProviderTransaction>> {
        let payload: WaveSearchPayload = self
            .send(self.client.get(format!(
                "{}/v1/transactions?client_reference={}",
                self.base_url, reference
            )))
            .await?;

        payload
            .result
            .into_iter()
            .map(|t| {
                Ok(ProviderTransaction {
                    amount: parse_provider_amount(&t.amount)?,
                    id: t.id,
                    currency: t.currency,
                    counterparty_mobile: t.mobile,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn amounts_are_validated() {
        assert_eq!(parse_provider_amount("1500.50").unwrap(), dec!(1500.50));
        assert_eq!(parse_provider_amount(" 200000 ").unwrap(), dec!(200000));
        assert!(parse_provider_amount("-5").is_err());
        assert!(parse_provider_amount("12,5").is_err());
        assert!(parse_provider_amount("").is_err());
    }

    #[test]
    fn session_statuses_map_and_reject_unknown() {
        assert_eq!(parse_session_status("open").unwrap(), SessionStatus::Created);
        assert_eq!(
            parse_session_status("complete").unwrap(),
            SessionStatus::Succeeded
        );
        assert_eq!(
            parse_session_status("expired").unwrap(),
            SessionStatus::Expired
        );
        assert_eq!(
            parse_session_status("refunded").unwrap(),
            SessionStatus::Refunded
        );
        assert!(parse_session_status("on-hold").is_err());
    }

    #[test]
    fn payout_statuses_map_and_reject_unknown() {
        assert_eq!(
            parse_payout_status("processing").unwrap(),
            PayoutStatus::Processing
        );
        assert_eq!(
            parse_payout_status("reversed").unwrap(),
            PayoutStatus::Reversed
        );
        assert!(parse_payout_status("maybe").is_err());
    }
}
