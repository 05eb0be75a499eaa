// User-facing notification records.
//
// Contract: notification creation is fire-and-forget. A failure here is
// logged and never propagated to the operation that triggered it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, PgPool};
use tracing::warn;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::auth::AccountId;
use axum::{extract::State, Json};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub account_id: Uuid,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct Notifier {
    pool: PgPool,
}

impl Notifier {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Persist a notification; callers wanting fire-and-forget semantics use
    /// `dispatch` instead.
    pub async fn create(
        &self,
        account_id: Uuid,
        kind: &str,
        title: &str,
        body: &str,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO notifications (account_id, kind, title, body)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(account_id)
        .bind(kind)
        .bind(title)
        .bind(body)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Fire-and-forget: spawn the insert, swallow and log any failure.
    pub fn dispatch(&self, account_id: Uuid, kind: &str, title: &str, body: &str) {
        let notifier = self.clone();
        let kind = kind.to_string();
        let title = title.to_string();
        let body = body.to_string();

        tokio::spawn(async move {
            if let Err(e) = notifier.create(account_id, &kind, &title, &body).await {
                warn!("Notification delivery failed ({}): {:?}", kind, e);
            }
        });
    }

    pub async fn list(&self, account_id: Uuid) -> AppResult<Vec<Notification>> {
        let notifications = sqlx::query_as::<_, Notification>(
            r#"
            SELECT id, account_id, kind, title, body, read, created_at
            FROM notifications
            WHERE account_id = $1
            ORDER BY created_at DESC
            LIMIT 100
            "#,
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(notifications)
    }
}

/// GET /notifications
pub async fn list_notifications(
    State(state): State<crate::bootstrap::AppState>,
    AccountId(account_id): AccountId,
) -> AppResult<Json<Vec<Notification>>> {
    Ok(Json(state.notifier.list(account_id).await?))
}
