//! `POST /graphql`: operation-name dispatch for the account and session operations.

use std::sync::LazyLock;

use axum::extract::State;
use axum::Json;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::extractor::MaybeToken;
use crate::auth::gate::{self, Access, EXEMPT_OPERATIONS};
use crate::auth::jwt::{encode_token, Claims};
use crate::auth::password;
use crate::db;
use crate::error::AppError;
use crate::models::{CloudAccountInput, ResourceKind};
use crate::mutation::coerce::to_int;
use crate::registry;
use crate::state::SharedState;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

const OPERATIONS: [&str; 7] = [
    "IntrospectionQuery",
    "Login",
    "Signup",
    "ChangePwd",
    "AddCloudAccount",
    "CloudAccount",
    "User",
];

#[derive(Deserialize)]
pub struct OperationRequest {
    #[serde(rename = "operationName")]
    pub operation_name: Option<String>,
    #[serde(default)]
    pub variables: Value,
}

#[derive(Deserialize)]
struct LoginInput {
    #[serde(rename = "Email")]
    email: String,
    #[serde(rename = "Password")]
    password: String,
}

#[derive(Deserialize)]
struct SignupInput {
    #[serde(rename = "Username")]
    username: String,
    #[serde(rename = "Email")]
    email: String,
    #[serde(rename = "Password")]
    password: String,
    #[serde(rename = "RolePermissionLevel", default)]
    role: Option<String>,
}

#[derive(Deserialize)]
struct ChangePwdInput {
    #[serde(rename = "Email")]
    email: String,
    #[serde(rename = "Password")]
    password: String,
    #[serde(rename = "NewPassword")]
    new_password: String,
}

fn variable<T: DeserializeOwned>(variables: &Value, name: &str) -> Result<T, AppError> {
    let raw = variables
        .get(name)
        .cloned()
        .ok_or_else(|| AppError::BadRequest(format!("Missing variable '{name}'")))?;
    serde_json::from_value(raw)
        .map_err(|e| AppError::BadRequest(format!("Invalid variable '{name}': {e}")))
}

/// Optional `UserID` variable (number or numeric string) that must match the caller.
fn scoped_user(variables: &Value, caller: i64) -> Result<i64, AppError> {
    match variables.get("UserID").filter(|v| !v.is_null()) {
        None => Ok(caller),
        Some(raw) => {
            let requested = to_int(raw)
                .ok_or_else(|| AppError::validation("UserID", "must be an integer"))?;
            if requested != caller {
                return Err(AppError::Forbidden(
                    "Cannot read another user's data".to_string(),
                ));
            }
            Ok(requested)
        }
    }
}

pub async fn execute(
    State(state): State<SharedState>,
    MaybeToken(token): MaybeToken,
    Json(req): Json<OperationRequest>,
) -> Result<Json<Value>, AppError> {
    let operation = req
        .operation_name
        .as_deref()
        .filter(|op| !op.is_empty())
        .ok_or_else(|| AppError::BadRequest("operationName is required".to_string()))?;

    let access = gate::authorize(token.as_deref(), operation, &state.config.jwt_secret)?;
    tracing::debug!("Operation {operation}");

    let data = match operation {
        "IntrospectionQuery" => introspection(),
        "Login" => login(&state, &req.variables).await?,
        "Signup" => signup(&state, &req.variables).await?,
        "ChangePwd" => change_pwd(&state, &req.variables).await?,
        "AddCloudAccount" => add_cloud_account(&state, &access, &req.variables).await?,
        "CloudAccount" => cloud_accounts(&state, &access, &req.variables).await?,
        "User" => user(&state, &access, &req.variables).await?,
        other => return Err(AppError::BadRequest(format!("Unknown operation '{other}'"))),
    };

    Ok(Json(json!({ "data": data })))
}

fn introspection() -> Value {
    let operations: Vec<Value> = OPERATIONS
        .iter()
        .map(|name| json!({ "name": name, "authenticated": !gate::is_exempt(name) }))
        .collect();
    json!({
        "__schema": {
            "operations": operations,
            "exempt": EXEMPT_OPERATIONS,
            "resourceKinds": ResourceKind::ALL,
        }
    })
}

async fn login(state: &SharedState, variables: &Value) -> Result<Value, AppError> {
    let input: LoginInput = variable(variables, "loginInput")?;

    if state.login_limiter.check(&input.email).is_err() {
        return Err(AppError::RateLimited(
            "Too many login attempts. Please try again later.".to_string(),
        ));
    }

    let Some(user) = db::users::find_by_email(&state.pool, &input.email).await? else {
        state.login_limiter.record_failure(&input.email);
        return Err(AppError::Unauthorized("Invalid credentials".to_string()));
    };

    let valid = password::verify(&input.password, &user.password_hash).map_err(AppError::Internal)?;
    if !valid {
        state.login_limiter.record_failure(&input.email);
        return Err(AppError::Unauthorized("Invalid credentials".to_string()));
    }
    state.login_limiter.clear(&input.email);

    let claims = Claims::new(user.user_id, user.username.clone());
    let token = encode_token(&claims, &state.config.jwt_secret).map_err(AppError::Internal)?;

    tracing::info!("User {} logged in", user.user_id);
    Ok(json!({ "login": { "token": token } }))
}

async fn signup(state: &SharedState, variables: &Value) -> Result<Value, AppError> {
    let input: SignupInput = variable(variables, "signupInput")?;

    let username = input.username.trim();
    let email = input.email.trim();
    if username.is_empty() {
        return Err(AppError::validation("Username", "is required"));
    }
    if !EMAIL_RE.is_match(email) {
        return Err(AppError::validation("Email", "is not a valid email address"));
    }
    if input.password.len() < password::MIN_PASSWORD_LEN {
        return Err(AppError::validation(
            "Password",
            format!("must be at least {} characters", password::MIN_PASSWORD_LEN),
        ));
    }

    if db::users::find_by_email(&state.pool, email).await?.is_some() {
        return Err(AppError::Conflict("Email is already registered".to_string()));
    }

    let role = input
        .role
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or("user");
    let pw_hash = password::hash(&input.password).map_err(AppError::Internal)?;

    let user = db::users::create(&state.pool, username, email, &pw_hash, role)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                AppError::Conflict("Email is already registered".to_string())
            }
            other => AppError::Database(other),
        })?;

    tracing::info!("User {} signed up", user.user_id);
    Ok(json!({ "signup": user }))
}

async fn change_pwd(state: &SharedState, variables: &Value) -> Result<Value, AppError> {
    let input: ChangePwdInput = variable(variables, "changePwdInput")?;

    if input.new_password.len() < password::MIN_PASSWORD_LEN {
        return Err(AppError::validation(
            "NewPassword",
            format!("must be at least {} characters", password::MIN_PASSWORD_LEN),
        ));
    }

    if state.login_limiter.check(&input.email).is_err() {
        return Err(AppError::RateLimited(
            "Too many attempts. Please try again later.".to_string(),
        ));
    }

    let Some(user) = db::users::find_by_email(&state.pool, &input.email).await? else {
        state.login_limiter.record_failure(&input.email);
        return Err(AppError::Unauthorized("Invalid credentials".to_string()));
    };

    let valid = password::verify(&input.password, &user.password_hash).map_err(AppError::Internal)?;
    if !valid {
        state.login_limiter.record_failure(&input.email);
        return Err(AppError::Unauthorized("Invalid credentials".to_string()));
    }

    let pw_hash = password::hash(&input.new_password).map_err(AppError::Internal)?;
    db::users::update_password(&state.pool, user.user_id, &pw_hash).await?;

    tracing::info!("User {} changed password", user.user_id);
    Ok(json!({ "changePwd": { "message": "Password changed successfully" } }))
}

async fn add_cloud_account(
    state: &SharedState,
    access: &Access,
    variables: &Value,
) -> Result<Value, AppError> {
    let identity = access.require_identity()?;
    let input: CloudAccountInput = variable(variables, "cloudAccountInput")?;

    let account = registry::add_cloud_account(
        &state.pool,
        identity.user_id,
        input,
        &state.config.encryption_key,
    )
    .await?;

    Ok(json!({ "addCloudAccount": account }))
}

async fn cloud_accounts(
    state: &SharedState,
    access: &Access,
    variables: &Value,
) -> Result<Value, AppError> {
    let identity = access.require_identity()?;
    let user_id = scoped_user(variables, identity.user_id)?;

    let listing =
        registry::get_accounts_for_user(&state.pool, user_id, &state.config.encryption_key)
            .await?;

    Ok(json!({ "cloudAccount": listing.accounts }))
}

async fn user(state: &SharedState, access: &Access, variables: &Value) -> Result<Value, AppError> {
    let identity = access.require_identity()?;
    let user_id = scoped_user(variables, identity.user_id)?;

    let user = db::users::find_by_id(&state.pool, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(json!({ "user": user }))
}
