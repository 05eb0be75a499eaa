use sqlx::PgPool;
use uuid::Uuid;

use super::models::{Client, Provider};
use crate::error::{AppError, AppResult};

/// Directory repository - clients and providers (subcontractors)
pub struct DirectoryRepository {
    pub pool: PgPool,
}

impl DirectoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ========== CLIENT OPERATIONS ==========

    pub async fn create_client(
        &self,
        account_id: Uuid,
        name: &str,
        mobile: Option<&str>,
    ) -> AppResult<Client> {
        let client = sqlx::query_as::<_, Client>(
            r#"
            INSERT INTO clients (account_id, name, mobile)
            VALUES ($1, $2, $3)
            RETURNING id, account_id, name, mobile, created_at
            "#,
        )
        .bind(account_id)
        .bind(name)
        .bind(mobile)
        .fetch_one(&self.pool)
        .await?;

        Ok(client)
    }

    pub async fn get_client(&self, account_id: Uuid, id: Uuid) -> AppResult<Client> {
        sqlx::query_as::<_, Client>(
            r#"
            SELECT id, account_id, name, mobile, created_at
            FROM clients
            WHERE id = $1 AND account_id = $2
            "#,
        )
        .bind(id)
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Client".to_string()))
    }

    pub async fn list_clients(&self, account_id: Uuid) -> AppResult<Vec<Client>> {
        let clients = sqlx::query_as::<_, Client>(
            r#"
            SELECT id, account_id, name, mobile, created_at
            FROM clients
            WHERE account_id = $1
            ORDER BY name
            "#,
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(clients)
    }

    pub async fn find_clients_by_mobile(
        &self,
        account_id: Uuid,
        mobile: &str,
    ) -> AppResult<Vec<Client>> {
        let clients = sqlx::query_as::<_, Client>(
            r#"
            SELECT id, account_id, name, mobile, created_at
            FROM clients
            WHERE account_id = $1 AND mobile = $2
            "#,
        )
        .bind(account_id)
        .bind(mobile)
        .fetch_all(&self.pool)
        .await?;

        Ok(clients)
    }

    // ========== PROVIDER OPERATIONS ==========

    pub async fn create_provider(
        &self,
        account_id: Uuid,
        name: &str,
        mobile: Option<&str>,
    ) -> AppResult<Provider> {
        let provider = sqlx::query_as::<_, Provider>(
            r#"
            INSERT INTO providers (account_id, name, mobile)
            VALUES ($1, $2, $3)
            RETURNING id, account_id, name, mobile, created_at
            "#,
        )
        .bind(account_id)
        .bind(name)
        .bind(mobile)
        .fetch_one(&self.pool)
        .await?;

        Ok(provider)
    }

    pub async fn get_provider(&self, account_id: Uuid, id: Uuid) -> AppResult<Provider> {
        sqlx::query_as::<_, Provider>(
            r#"
            SELECT id, account_id, name, mobile, created_at
            FROM providers
            WHERE id = $1 AND account_id = $2
            "#,
        )
        .bind(id)
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Provider".to_string()))
    }

    pub async fn list_providers(&self, account_id: Uuid) -> AppResult<Vec<Provider>> {
        let providers = sqlx::query_as::<_, Provider>(
            r#"
            SELECT id, account_id, name, mobile, created_at
            FROM providers
            WHERE account_id = $1
            ORDER BY name
            "#,
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(providers)
    }

    pub async fn find_providers_by_mobile(
        &self,
        account_id: Uuid,
        mobile: &str,
    ) -> AppResult<Vec<Provider>> {
        let providers = sqlx::query_as::<_, Provider>(
            r#"
            SELECT id, account_id, name, mobile, created_at
            FROM providers
            WHERE account_id = $1 AND mobile = $2
            "#,
        )
        .bind(account_id)
        .bind(mobile)
        .fetch_all(&self.pool)
        .await?;

        Ok(providers)
    }
}
