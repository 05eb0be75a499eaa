use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json, Type};
use std::fmt;
use uuid::Uuid;

/// Which side of the ledger an inbound transaction lands on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "entry_direction", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EntryDirection {
    Revenue,
    Expense,
}

impl fmt::Display for EntryDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryDirection::Revenue => write!(f, "revenue"),
            EntryDirection::Expense => write!(f, "expense"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CounterpartyKind {
    Client,
    Provider,
}

/// One possible owner of an ambiguous inbound payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictCandidate {
    pub kind: CounterpartyKind,
    pub id: Uuid,
    pub name: String,
}

/// Inbound payment notification bound (or waiting to be bound) to a local
/// counterparty.
///
/// INVARIANT: while needs_resolution is true the record must never be
/// attributed to any specific party in aggregates; raw totals may include it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TransactionAssignment {
    pub id: Uuid,
    pub account_id: Uuid,
    pub external_ref: String,

    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub currency: String,
    pub counterparty_mobile: String,
    pub direction: Option<EntryDirection>,
    pub client_id: Option<Uuid>,
    pub provider_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub counterparty_name: Option<String>,
    pub description: Option<String>,
    pub needs_resolution: bool,
    pub conflict_candidates: Option<Json<Vec<ConflictCandidate>>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TransactionAssignment {
    pub fn is_resolved(&self) -> bool {
        self.resolved_at.is_some()
    }
}
