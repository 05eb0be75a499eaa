use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

/// Client: a counterparty that pays the account holder
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Client {
    pub id: Uuid,
    pub account_id: Uuid,
    pub name: String,
    pub mobile: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Provider: a subcontractor the account holder pays
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Provider {
    pub id: Uuid,
    pub account_id: Uuid,
    pub name: String,
    pub mobile: Option<String>,
    pub created_at: DateTime<Utc>,
}
