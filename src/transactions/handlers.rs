use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use super::models::{EntryDirection, TransactionAssignment};
use super::repository::TransactionSummary;
use super::resolver::Resolution;
use crate::bootstrap::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AccountId;

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub client_id: Option<Uuid>,
    pub provider_id: Option<Uuid>,
    pub direction: EntryDirection,
    pub description: String,
    pub project_id: Option<Uuid>,
}

/// GET /transactions
pub async fn list_transactions(
    State(state): State<AppState>,
    AccountId(account_id): AccountId,
) -> AppResult<Json<Vec<TransactionAssignment>>> {
    Ok(Json(state.transactions.list_assignments(account_id).await?))
}

/// Unresolved ambiguous assignments awaiting a human decision
/// GET /transactions/conflicts
pub async fn list_conflicts(
    State(state): State<AppState>,
    AccountId(account_id): AccountId,
) -> AppResult<Json<Vec<TransactionAssignment>>> {
    Ok(Json(state.transactions.list_conflicts(account_id).await?))
}

/// Disambiguate a conflicted transaction. Terminal: a resolved record
/// cannot be resolved again.
/// POST /transactions/:id/resolve
pub async fn resolve_transaction(
    State(state): State<AppState>,
    AccountId(account_id): AccountId,
    Path(id): Path<Uuid>,
    Json(request): Json<ResolveRequest>,
) -> AppResult<Json<TransactionAssignment>> {
    if request.description.trim().is_empty() {
        return Err(AppError::Validation("description is required".to_string()));
    }

    let resolution = Resolution::validate(
        request.client_id,
        request.provider_id,
        request.direction,
        request.description,
        request.project_id,
    )?;

    // Denormalize the chosen counterparty's display name onto the record
    let counterparty_name = match (resolution.client_id, resolution.provider_id) {
        (Some(client_id), None) => state.directory.get_client(account_id, client_id).await?.name,
        (None, Some(provider_id)) => {
            state
                .directory
                .get_provider(account_id, provider_id)
                .await?
                .name
        }
        _ => unreachable!("Resolution::validate enforces exactly one counterparty"),
    };

    let assignment = state
        .transactions
        .resolve_assignment(account_id, id, &resolution, &counterparty_name)
        .await?;
    Ok(Json(assignment))
}

/// GET /transactions/summary
pub async fn transaction_summary(
    State(state): State<AppState>,
    AccountId(account_id): AccountId,
) -> AppResult<Json<TransactionSummary>> {
    Ok(Json(state.transactions.summary(account_id).await?))
}
