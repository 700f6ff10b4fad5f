//! Per-account OAuth linking for providers that need a live session (GCP, Azure).

pub mod oauth;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::crypto;
use crate::db;
use crate::error::AppError;
use crate::models::{CloudAccount, LinkSessionRow, Provider};
use crate::state::AppState;

use oauth::LinkError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkState {
    Unlinked,
    PendingRedirect { redirect_url: String },
    Authenticated { token: String, expires_at: DateTime<Utc> },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    RedirectIssued { redirect_url: String },
    LoginRejected { reason: String },
    CallbackSucceeded { token: String, expires_at: DateTime<Utc> },
    CallbackRejected { reason: String },
    SessionExpired,
    LinkRequested,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: &'static str,
    pub event: &'static str,
}

impl std::fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cannot apply {} while {}", self.event, self.from)
    }
}

impl From<InvalidTransition> for AppError {
    fn from(e: InvalidTransition) -> Self {
        AppError::Conflict(e.to_string())
    }
}

impl LinkState {
    pub fn status(&self) -> &'static str {
        match self {
            LinkState::Unlinked => "unlinked",
            LinkState::PendingRedirect { .. } => "pending_redirect",
            LinkState::Authenticated { .. } => "authenticated",
            LinkState::Failed { .. } => "failed",
        }
    }

    /// Rebuild the state from its stored row. An authenticated session past its
    /// expiry comes back as `Unlinked`.
    pub fn from_row(row: &LinkSessionRow, key: &str, now: DateTime<Utc>) -> Result<Self, String> {
        let state = match row.status.as_str() {
            "unlinked" => LinkState::Unlinked,
            "pending_redirect" => LinkState::PendingRedirect {
                redirect_url: row.redirect_url.clone().unwrap_or_default(),
            },
            "authenticated" => {
                let sealed = row
                    .access_token
                    .as_deref()
                    .ok_or("authenticated session without token")?;
                let expires_at = row
                    .expires_at
                    .ok_or("authenticated session without expiry")?;
                LinkState::Authenticated {
                    token: crypto::decrypt(sealed, key)?,
                    expires_at,
                }
            }
            "failed" => LinkState::Failed {
                reason: row
                    .failure_reason
                    .clone()
                    .unwrap_or_else(|| "linking failed".to_string()),
            },
            other => return Err(format!("unknown link status '{other}'")),
        };

        match state {
            LinkState::Authenticated { expires_at, .. } if now >= expires_at => {
                transition(state, LinkEvent::SessionExpired).map_err(|e| e.to_string())
            }
            state => Ok(state),
        }
    }
}

impl LinkEvent {
    fn name(&self) -> &'static str {
        match self {
            LinkEvent::RedirectIssued { .. } => "RedirectIssued",
            LinkEvent::LoginRejected { .. } => "LoginRejected",
            LinkEvent::CallbackSucceeded { .. } => "CallbackSucceeded",
            LinkEvent::CallbackRejected { .. } => "CallbackRejected",
            LinkEvent::SessionExpired => "SessionExpired",
            LinkEvent::LinkRequested => "LinkRequested",
        }
    }
}

pub fn transition(state: LinkState, event: LinkEvent) -> Result<LinkState, InvalidTransition> {
    match (state, event) {
        (_, LinkEvent::LinkRequested) => Ok(LinkState::Unlinked),
        (LinkState::Unlinked, LinkEvent::RedirectIssued { redirect_url }) => {
            Ok(LinkState::PendingRedirect { redirect_url })
        }
        (LinkState::Unlinked, LinkEvent::LoginRejected { reason }) => {
            Ok(LinkState::Failed { reason })
        }
        (LinkState::PendingRedirect { .. }, LinkEvent::CallbackSucceeded { token, expires_at }) => {
            Ok(LinkState::Authenticated { token, expires_at })
        }
        (LinkState::PendingRedirect { .. }, LinkEvent::CallbackRejected { reason }) => {
            Ok(LinkState::Failed { reason })
        }
        (LinkState::Authenticated { .. }, LinkEvent::SessionExpired) => Ok(LinkState::Unlinked),
        (state, event) => Err(InvalidTransition {
            from: state.status(),
            event: event.name(),
        }),
    }
}

/// Whether an account can be used right now, as seen by the aggregator and router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkStatus {
    Ready { access_token: Option<String> },
    RedirectRequired { redirect_url: String },
    Failed { reason: String },
}

impl LinkState {
    /// `None` for `Unlinked`, which needs a login start before it means anything.
    pub fn usability(&self) -> Option<LinkStatus> {
        match self {
            LinkState::Unlinked => None,
            LinkState::PendingRedirect { redirect_url } => Some(LinkStatus::RedirectRequired {
                redirect_url: redirect_url.clone(),
            }),
            LinkState::Authenticated { token, .. } => Some(LinkStatus::Ready {
                access_token: Some(token.clone()),
            }),
            LinkState::Failed { reason } => Some(LinkStatus::Failed {
                reason: reason.clone(),
            }),
        }
    }
}

/// Public view of an account's link state.
#[derive(Debug, Clone, Serialize)]
pub struct LinkView {
    #[serde(rename = "accountID")]
    pub account_id: i64,
    pub provider: Provider,
    pub status: &'static str,
    #[serde(rename = "redirectURL", skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    #[serde(rename = "expiresAt", skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(rename = "failureReason", skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl LinkView {
    pub fn new(account: &CloudAccount, state: &LinkState) -> Self {
        let mut view = LinkView {
            account_id: account.account_id,
            provider: account.provider,
            status: state.status(),
            redirect_url: None,
            expires_at: None,
            failure_reason: None,
        };
        match state {
            LinkState::PendingRedirect { redirect_url } => {
                view.redirect_url = Some(redirect_url.clone())
            }
            LinkState::Authenticated { expires_at, .. } => view.expires_at = Some(*expires_at),
            LinkState::Failed { reason } => view.failure_reason = Some(reason.clone()),
            LinkState::Unlinked => {}
        }
        view
    }
}

async fn load(state: &AppState, account: &CloudAccount) -> Result<LinkState, AppError> {
    match db::link_sessions::find(&state.pool, account.account_id).await? {
        Some(row) => LinkState::from_row(&row, &state.config.encryption_key, Utc::now())
            .map_err(AppError::Internal),
        None => Ok(LinkState::Unlinked),
    }
}

/// Ask the link service for a consent URL and store the outcome.
async fn begin(state: &AppState, account: &CloudAccount) -> Result<LinkState, AppError> {
    let oauth_state = crypto::random_token();
    let outcome = state
        .linker
        .start_login(account.provider, account.account_id, &oauth_state)
        .await;

    match outcome {
        Ok(redirect_url) => {
            let next = transition(
                LinkState::Unlinked,
                LinkEvent::RedirectIssued {
                    redirect_url: redirect_url.clone(),
                },
            )?;
            db::link_sessions::upsert_pending(
                &state.pool,
                account.account_id,
                &oauth_state,
                &redirect_url,
            )
            .await?;
            tracing::info!(
                "Account {} ({}) awaiting OAuth redirect",
                account.account_id,
                account.provider
            );
            Ok(next)
        }
        Err(LinkError::Rejected(reason)) => {
            let next = transition(
                LinkState::Unlinked,
                LinkEvent::LoginRejected {
                    reason: reason.clone(),
                },
            )?;
            db::link_sessions::mark_failed(&state.pool, account.account_id, &reason).await?;
            tracing::warn!("Account {} login start rejected: {reason}", account.account_id);
            Ok(next)
        }
        Err(e @ LinkError::Transport(_)) => {
            tracing::warn!("Account {} login start failed: {e}", account.account_id);
            Ok(LinkState::Failed {
                reason: e.to_string(),
            })
        }
    }
}

/// Decide whether `account` is usable, starting a login when it has no session.
pub async fn resolve(state: &AppState, account: &CloudAccount) -> Result<LinkStatus, AppError> {
    if !account.provider.requires_redirect() {
        return Ok(LinkStatus::Ready { access_token: None });
    }

    let current = load(state, account).await?;
    let current = match current {
        LinkState::Unlinked => begin(state, account).await?,
        other => other,
    };

    current
        .usability()
        .ok_or_else(|| AppError::Internal("link state unresolved after login start".to_string()))
}

/// Stored state without side effects.
pub async fn current(state: &AppState, account: &CloudAccount) -> Result<LinkView, AppError> {
    if !account.provider.requires_redirect() {
        return Ok(LinkView {
            account_id: account.account_id,
            provider: account.provider,
            status: "not_required",
            redirect_url: None,
            expires_at: None,
            failure_reason: None,
        });
    }
    let current = load(state, account).await?;
    Ok(LinkView::new(account, &current))
}

/// Explicit linking attempt: discard any session and start over.
pub async fn request_link(state: &AppState, account: &CloudAccount) -> Result<LinkView, AppError> {
    if !account.provider.requires_redirect() {
        return Err(AppError::BadRequest(format!(
            "{} accounts use static credentials",
            account.provider
        )));
    }

    let current = load(state, account).await?;
    transition(current, LinkEvent::LinkRequested)?;
    db::link_sessions::reset(&state.pool, account.account_id).await?;

    let next = begin(state, account).await?;
    Ok(LinkView::new(account, &next))
}

/// Expiry of a freshly granted session. `None` when the lifetime is zero or
/// does not fit a timestamp.
fn session_expiry(
    now: DateTime<Utc>,
    expires_in: Option<u64>,
    fallback: std::time::Duration,
) -> Option<DateTime<Utc>> {
    let ttl = match expires_in {
        Some(secs) => Duration::try_seconds(i64::try_from(secs).ok()?)?,
        None => Duration::from_std(fallback).ok()?,
    };
    if ttl <= Duration::zero() {
        return None;
    }
    now.checked_add_signed(ttl)
}

/// Finish a pending login with the code returned to the callback.
pub async fn complete(
    state: &AppState,
    account: &CloudAccount,
    code: &str,
    oauth_state: &str,
) -> Result<LinkView, AppError> {
    let row = db::link_sessions::find(&state.pool, account.account_id)
        .await?
        .ok_or_else(|| AppError::Conflict("No linking attempt in progress".to_string()))?;

    let current = LinkState::from_row(&row, &state.config.encryption_key, Utc::now())
        .map_err(AppError::Internal)?;
    if !matches!(current, LinkState::PendingRedirect { .. }) {
        return Err(AppError::Conflict(format!(
            "Account is {}, not awaiting a callback",
            current.status()
        )));
    }

    let expected = row.oauth_state.as_deref().unwrap_or_default();
    if expected.is_empty() || !crypto::secure_eq(expected, oauth_state) {
        return Err(AppError::BadRequest("Invalid OAuth state".to_string()));
    }

    let outcome = state
        .linker
        .exchange(account.provider, account.account_id, code, oauth_state)
        .await;

    let granted = outcome.and_then(|grant| {
        match session_expiry(Utc::now(), grant.expires_in, state.config.link_session_ttl) {
            Some(expires_at) => Ok((grant.access_token, expires_at)),
            None => Err(LinkError::Rejected(format!(
                "granted session lifetime out of range: {:?}",
                grant.expires_in
            ))),
        }
    });

    let next = match granted {
        Ok((token, expires_at)) => {
            let sealed = crypto::encrypt(&token, &state.config.encryption_key)
                .map_err(AppError::Internal)?;

            let next = transition(current, LinkEvent::CallbackSucceeded { token, expires_at })?;
            db::link_sessions::mark_authenticated(
                &state.pool,
                account.account_id,
                &sealed,
                expires_at,
            )
            .await?;
            tracing::info!("Account {} linked until {expires_at}", account.account_id);
            next
        }
        Err(LinkError::Rejected(reason)) => {
            let next = transition(
                current,
                LinkEvent::CallbackRejected {
                    reason: reason.clone(),
                },
            )?;
            db::link_sessions::mark_failed(&state.pool, account.account_id, &reason).await?;
            tracing::warn!("Account {} callback rejected: {reason}", account.account_id);
            next
        }
        Err(e @ LinkError::Transport(_)) => {
            return Err(AppError::Provider {
                provider: account.provider,
                operation: "link".to_string(),
                cause: e.to_string(),
            });
        }
    };

    Ok(LinkView::new(account, &next))
}
