use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::models::{Client, Provider};
use crate::bootstrap::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AccountId;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateContactRequest {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    pub mobile: Option<String>,
}

/// POST /clients
pub async fn create_client(
    State(state): State<AppState>,
    AccountId(account_id): AccountId,
    Json(request): Json<CreateContactRequest>,
) -> AppResult<Json<Client>> {
    request
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    let client = state
        .directory
        .create_client(account_id, &request.name, request.mobile.as_deref())
        .await?;
    Ok(Json(client))
}

/// GET /clients
pub async fn list_clients(
    State(state): State<AppState>,
    AccountId(account_id): AccountId,
) -> AppResult<Json<Vec<Client>>> {
    Ok(Json(state.directory.list_clients(account_id).await?))
}

/// GET /clients/:id
pub async fn get_client(
    State(state): State<AppState>,
    AccountId(account_id): AccountId,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Client>> {
    Ok(Json(state.directory.get_client(account_id, id).await?))
}

/// POST /providers
pub async fn create_provider(
    State(state): State<AppState>,
    AccountId(account_id): AccountId,
    Json(request): Json<CreateContactRequest>,
) -> AppResult<Json<Provider>> {
    request
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    let provider = state
        .directory
        .create_provider(account_id, &request.name, request.mobile.as_deref())
        .await?;
    Ok(Json(provider))
}

/// GET /providers
pub async fn list_providers(
    State(state): State<AppState>,
    AccountId(account_id): AccountId,
) -> AppResult<Json<Vec<Provider>>> {
    Ok(Json(state.directory.list_providers(account_id).await?))
}

/// GET /providers/:id
pub async fn get_provider(
    State(state): State<AppState>,
    AccountId(account_id): AccountId,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Provider>> {
    Ok(Json(state.directory.get_provider(account_id, id).await?))
}
