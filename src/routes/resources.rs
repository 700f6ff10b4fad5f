use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use futures_util::future::join_all;
use serde_json::{Map, Value};

use crate::aggregator::{self, AccountTarget};
use crate::auth::extractor::AuthUser;
use crate::error::AppError;
use crate::linking;
use crate::models::{
    AccountFailure, Ack, AggregateResponse, AggregatedResourceItem, FailureKind, Provider,
    ResourceKind,
};
use crate::mutation::MutationRouter;
use crate::registry;
use crate::state::SharedState;

fn parse_kind(raw: &str) -> Result<ResourceKind, AppError> {
    raw.parse::<ResourceKind>().map_err(AppError::BadRequest)
}

/// Remove and parse the `provider` tag from a mutation body.
fn take_provider(body: &mut Map<String, Value>) -> Result<Provider, AppError> {
    match body.remove("provider") {
        Some(Value::String(s)) if !s.trim().is_empty() => s
            .parse::<Provider>()
            .map_err(|e| AppError::validation("provider", e)),
        _ => Err(AppError::validation("provider", "is required")),
    }
}

fn take_identifier(body: &mut Map<String, Value>) -> Result<String, AppError> {
    match body.remove("identifier") {
        Some(Value::String(s)) => Ok(s),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(AppError::validation("identifier", "is required")),
    }
}

pub async fn list(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(kind): Path<String>,
) -> Result<Json<AggregateResponse>, AppError> {
    let kind = parse_kind(&kind)?;

    let listing =
        registry::get_accounts_for_user(&state.pool, auth.user_id, &state.config.encryption_key)
            .await?;

    let mut rejected: Vec<AccountFailure> = listing
        .unreadable
        .into_iter()
        .map(|u| {
            AccountFailure::new(
                u.account_id,
                u.provider,
                FailureKind::Internal,
                "Stored credentials could not be read".to_string(),
            )
        })
        .collect();

    let accounts: Vec<_> = listing
        .accounts
        .into_iter()
        .filter(|a| {
            state
                .adapters
                .get(a.provider)
                .is_some_and(|adapter| adapter.supports(kind))
        })
        .collect();

    let links = join_all(accounts.iter().map(|a| linking::resolve(&state, a))).await;

    let mut targets = Vec::with_capacity(accounts.len());
    for (account, link) in accounts.into_iter().zip(links) {
        match link {
            Ok(link) => targets.push(AccountTarget { account, link }),
            Err(e) => {
                tracing::warn!("Account {} link state unusable: {e}", account.account_id);
                rejected.push(AccountFailure::new(
                    account.account_id,
                    account.provider,
                    FailureKind::Internal,
                    "Link session could not be read".to_string(),
                ));
            }
        }
    }

    let response = aggregator::aggregate(
        &state.adapters,
        targets,
        rejected,
        kind,
        state.config.adapter_timeout,
    )
    .await;
    Ok(Json(response))
}

pub async fn create(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(kind): Path<String>,
    Json(mut body): Json<Map<String, Value>>,
) -> Result<(StatusCode, Json<AggregatedResourceItem>), AppError> {
    let kind = parse_kind(&kind)?;
    let provider = take_provider(&mut body)?;

    let router = MutationRouter::new(&state.adapters, state.as_ref());
    let item = router
        .create_resource(auth.user_id, kind, provider, &body)
        .await?;

    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn delete(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(kind): Path<String>,
    Json(mut body): Json<Map<String, Value>>,
) -> Result<Json<Ack>, AppError> {
    let kind = parse_kind(&kind)?;
    let provider = take_provider(&mut body)?;
    let identifier = take_identifier(&mut body)?;

    let router = MutationRouter::new(&state.adapters, state.as_ref());
    let ack = router
        .delete_resource(auth.user_id, kind, provider, &identifier, &body)
        .await?;

    Ok(Json(ack))
}
