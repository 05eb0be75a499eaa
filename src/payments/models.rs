use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, Type};
use std::fmt;
use uuid::Uuid;

/// Checkout session status, mirroring the provider's lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "session_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Created,
    Succeeded,
    Failed,
    Expired,
    Refunded,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Created => "created",
            SessionStatus::Succeeded => "succeeded",
            SessionStatus::Failed => "failed",
            SessionStatus::Expired => "expired",
            SessionStatus::Refunded => "refunded",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::Created)
    }

    /// Only a live session can be expired.
    pub fn can_expire(&self) -> bool {
        matches!(self, SessionStatus::Created)
    }

    /// A refund compensates a collected payment.
    pub fn can_refund(&self) -> bool {
        matches!(self, SessionStatus::Succeeded)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payout status, mirroring the provider's lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "payout_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PayoutStatus {
    Processing,
    Succeeded,
    Failed,
    Reversed,
}

impl PayoutStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutStatus::Processing => "processing",
            PayoutStatus::Succeeded => "succeeded",
            PayoutStatus::Failed => "failed",
            PayoutStatus::Reversed => "reversed",
        }
    }

    /// A payout can be reversed while in flight or after it succeeded,
    /// never after it failed or was already reversed.
    pub fn can_reverse(&self) -> bool {
        matches!(self, PayoutStatus::Processing | PayoutStatus::Succeeded)
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PayoutStatus::Processing)
    }
}

impl fmt::Display for PayoutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Local mirror of an inbound payment collection flow
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PaymentSession {
    pub id: Uuid,
    pub account_id: Uuid,
    pub invoice_id: Uuid,

    /// Provider-side session id
    pub external_ref: String,
    pub launch_url: Option<String>,

    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub currency: String,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Local mirror of an outbound payment to a provider (subcontractor)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payout {
    pub id: Uuid,
    pub account_id: Uuid,
    pub provider_id: Uuid,

    /// Provider-side payout id
    pub external_ref: String,

    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub currency: String,
    pub status: PayoutStatus,

    /// Expense created when the payout succeeded
    pub expense_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Where an expense row came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "expense_source", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ExpenseSource {
    Manual,
    Payout,
    Reversal,
}

/// Expense ledger entry. Reversal entries carry a negative amount; the
/// original entry is never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Expense {
    pub id: Uuid,
    pub account_id: Uuid,
    pub provider_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub description: String,

    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub source: ExpenseSource,
    pub payout_id: Option<Uuid>,
    pub incurred_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payout_reversal_rules() {
        assert!(PayoutStatus::Processing.can_reverse());
        assert!(PayoutStatus::Succeeded.can_reverse());
        assert!(!PayoutStatus::Failed.can_reverse());
        assert!(!PayoutStatus::Reversed.can_reverse());
    }

    #[test]
    fn session_transition_rules() {
        assert!(SessionStatus::Created.can_expire());
        assert!(!SessionStatus::Succeeded.can_expire());
        assert!(SessionStatus::Succeeded.can_refund());
        assert!(!SessionStatus::Expired.can_refund());
        assert!(!SessionStatus::Refunded.can_refund());
        assert!(!SessionStatus::Created.is_terminal());
        assert!(SessionStatus::Failed.is_terminal());
        assert!(SessionStatus::Refunded.is_terminal());
    }
}
