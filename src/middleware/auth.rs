// Account identity extraction.
//
// Authentication itself lives in the identity collaborator sitting in front
// of this service; it forwards the authenticated account id in a header.
// Anything without a valid id is rejected before any handler logic runs, and
// every repository call is scoped to the extracted account.

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::AppError;

const ACCOUNT_HEADER: &str = "x-account-id";

/// Authenticated owning account for the current request
#[derive(Debug, Clone, Copy)]
pub struct AccountId(pub Uuid);

#[async_trait::async_trait]
impl<S> FromRequestParts<S> for AccountId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(ACCOUNT_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::Unauthorized)?;

        let id = Uuid::parse_str(value).map_err(|_| AppError::Unauthorized)?;
        Ok(AccountId(id))
    }
}
