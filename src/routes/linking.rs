use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use crate::auth::extractor::AuthUser;
use crate::db;
use crate::error::AppError;
use crate::linking::{self, LinkView};
use crate::models::CloudAccount;
use crate::state::SharedState;

#[derive(Deserialize)]
pub struct CallbackRequest {
    pub code: String,
    pub state: String,
}

async fn owned_account(
    state: &SharedState,
    auth: &AuthUser,
    account_id: i64,
) -> Result<CloudAccount, AppError> {
    db::cloud_accounts::find_for_user(
        &state.pool,
        auth.user_id,
        account_id,
        &state.config.encryption_key,
    )
    .await?
    .ok_or_else(|| AppError::NotFound("Cloud account not found".to_string()))
}

pub async fn status(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(account_id): Path<i64>,
) -> Result<Json<LinkView>, AppError> {
    let account = owned_account(&state, &auth, account_id).await?;
    Ok(Json(linking::current(&state, &account).await?))
}

pub async fn start(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(account_id): Path<i64>,
) -> Result<Json<LinkView>, AppError> {
    let account = owned_account(&state, &auth, account_id).await?;
    Ok(Json(linking::request_link(&state, &account).await?))
}

pub async fn callback(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(account_id): Path<i64>,
    Json(req): Json<CallbackRequest>,
) -> Result<Json<LinkView>, AppError> {
    if req.code.trim().is_empty() {
        return Err(AppError::validation("code", "is required"));
    }
    let account = owned_account(&state, &auth, account_id).await?;
    Ok(Json(
        linking::complete(&state, &account, &req.code, &req.state).await?,
    ))
}
