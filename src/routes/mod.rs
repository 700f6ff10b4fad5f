pub mod graphql;
pub mod linking;
pub mod resources;

use axum::routing::{get, post};
use axum::Router;

use crate::state::SharedState;

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        .route("/graphql", post(graphql::execute))
        // Resources
        .route(
            "/api/v1/resources/{kind}",
            get(resources::list).post(resources::create),
        )
        .route("/api/v1/resources/{kind}/delete", post(resources::delete))
        // Account linking
        .route("/api/v1/accounts/{id}/link", get(linking::status).post(linking::start))
        .route("/api/v1/accounts/{id}/link/callback", post(linking::callback))
}
