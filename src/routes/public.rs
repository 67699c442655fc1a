use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Defines endpoints that are **unauthenticated** and accessible to any client
/// (anonymous or logged-in): the health probe and the two gateway functions of
/// the identity flow.
///
/// Security Mandate:
/// Nothing here may expose registry data. Login reveals only success/failure,
/// and registration can only ever create a WARGA account.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /api/health
        // A simple, unauthenticated endpoint used for monitoring and load balancer
        // checks. Returns "ok" immediately to verify the service is responsive.
        .route("/health", get(|| async { "ok" }))
        // POST /api/auth/login
        // Exchanges email/password for an opaque session token and sets the
        // token/role cookie pair read by the route gate.
        .route("/auth/login", post(handlers::login))
        // POST /api/auth/register
        // Creates a new WARGA account. Administrator accounts are seeded at
        // startup and never created through this endpoint.
        .route("/auth/register", post(handlers::register))
}
