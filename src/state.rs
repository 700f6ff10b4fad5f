use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::linking::oauth::LinkService;
use crate::providers::AdapterRegistry;
use crate::rate_limit::LoginRateLimiter;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub adapters: AdapterRegistry,
    pub linker: LinkService,
    pub login_limiter: LoginRateLimiter,
}
