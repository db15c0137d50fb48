//! Admin API.
//!
//! Served on its own listener. Every route requires the configured bearer key.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::CatalogRouter;

/// State shared by admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub edge: Arc<CatalogRouter>,
    pub api_key: Arc<str>,
}

impl AdminState {
    pub fn new(edge: Arc<CatalogRouter>, api_key: &str) -> Self {
        Self {
            edge,
            api_key: Arc::from(api_key),
        }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/cache", get(get_cache))
        .route("/admin/playground", post(post_playground))
        .route("/admin/invalidate", post(invalidate_all))
        .route("/admin/invalidate/{env_id}", post(invalidate_environment))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}
