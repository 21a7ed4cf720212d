pub mod auth;
pub mod error;
pub mod legal;
pub mod listings;
pub mod messages;
pub mod middleware;
pub mod workflow;

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post, put},
};

use auth::AppState;
use middleware::require_auth;

pub use error::AppError;
pub use workflow::{Workflow, WorkflowConfig};

/// All HTTP routes. Layers that only matter to a running server (CORS,
/// request tracing) are added by the binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login))
        .route("/legal/terms", get(legal::terms))
        .route("/legal/privacy", get(legal::privacy))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/listings", get(listings::search_listings).post(listings::create_listing))
        .route("/listings/mine", get(listings::my_listings))
        .route("/listings/{listing_id}/active", put(listings::set_listing_active))
        .route("/listings/{listing_id}/inquiries", post(messages::send_inquiry))
        .route("/messages/inbox", get(messages::inbox))
        .route("/messages/{message_id}/replies", post(messages::send_reply))
        .route("/messages/{message_id}/approve", post(messages::approve_invite))
        .route("/messages/{message_id}/reject", post(messages::reject_invite))
        .route("/messages/{message_id}", delete(messages::hide_message))
        .layer(axum_middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new().merge(public_routes).merge(protected_routes)
}

async fn health() -> &'static str {
    "ok"
}
