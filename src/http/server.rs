//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Create the Axum router for edge traffic
//! - Wire up middleware (timeout, request ID, tracing)
//! - Turn each request into an `EdgeRequest` and act on the decision
//! - Issue the sticky rollout cookie to new visitors
//! - Apply configuration reloads (catalog, settings, snapshot invalidation)
//! - Observability (metrics, correlation IDs)

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin::{setup_admin_router, AdminState};
use crate::config::{EdgeConfig, EdgeSettings, SharedSettings};
use crate::http::request::{cookie_value, effective_host, effective_scheme, request_url, X_REQUEST_ID};
use crate::http::upstream::{self, HttpClient};
use crate::lifecycle::shutdown::wait as wait_for_shutdown;
use crate::observability::metrics;
use crate::rollout::ActiveDeployment;
use crate::routing::{EdgeDecision, EdgeRequest, EdgeRouter};
use crate::store::{Catalog, CatalogStore};

/// Response header naming the deployment that served the request.
pub const X_EDGE_DEPLOYMENT: &str = "x-edge-deployment";

/// Router over the in-process catalog.
pub type CatalogRouter = EdgeRouter<Arc<CatalogStore>, Arc<CatalogStore>>;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<CatalogRouter>,
    pub client: HttpClient,
    pub upstream_timeout: Duration,
}

/// HTTP server for the edge.
pub struct HttpServer {
    router: Router,
    config: EdgeConfig,
    store: Arc<CatalogStore>,
    edge: Arc<CatalogRouter>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: EdgeConfig) -> Self {
        let store = Arc::new(CatalogStore::new(Catalog::from_config(&config)));
        let settings = SharedSettings::new(EdgeSettings::from(&config));
        let edge = Arc::new(EdgeRouter::new(store.clone(), store.clone(), settings));

        let state = AppState {
            router: edge.clone(),
            client: upstream::build_client(),
            upstream_timeout: Duration::from_secs(config.timeouts.upstream_secs),
        };

        let router = Self::build_router(&config, state);
        Self {
            router,
            config,
            store,
            edge,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &EdgeConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(edge_handler))
            .route("/", any(edge_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Edge router shared with the admin surface.
    pub fn edge_router(&self) -> Arc<CatalogRouter> {
        self.edge.clone()
    }

    /// Admin API over the same routing core.
    pub fn admin_app(&self) -> Router {
        setup_admin_router(AdminState::new(self.edge.clone(), &self.config.admin.api_key))
    }

    /// Get a reference to the config the server started with.
    pub fn config(&self) -> &EdgeConfig {
        &self.config
    }

    /// Run the server until `shutdown` fires.
    ///
    /// Configurations received on `config_updates` replace the catalog and
    /// settings, then drop every cached snapshot.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<EdgeConfig>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let store = self.store.clone();
        let edge = self.edge.clone();
        let reloader = tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                apply_config(&store, &edge, &config);
            }
        });

        axum::serve(listener, self.router)
            .with_graceful_shutdown(wait_for_shutdown(shutdown))
            .await?;

        reloader.abort();
        tracing::info!(address = %addr, "HTTP server stopped");
        Ok(())
    }
}

/// Swap in a new configuration.
pub fn apply_config(store: &CatalogStore, edge: &CatalogRouter, config: &EdgeConfig) {
    let catalog = Catalog::from_config(config);
    let environments = catalog.environment_count();
    store.replace(catalog);
    edge.settings().update(EdgeSettings::from(config));
    edge.cache().invalidate_all();
    tracing::info!(environments, "Configuration applied");
}

/// Main edge handler.
/// Routes the request, then redirects, proxies or serves it.
async fn edge_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let method = request.method().to_string();
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let settings = state.router.settings().load();

    let Some(host) = effective_host(request.headers(), request.uri()) else {
        tracing::debug!(request_id = %request_id, "Request has no host");
        metrics::record_request(&method, 400, "invalid", start_time);
        return (StatusCode::BAD_REQUEST, "Missing host").into_response();
    };
    let scheme = effective_scheme(request.headers(), request.uri());
    let url = match request_url(scheme, &host, request.uri()) {
        Ok(url) => url,
        Err(e) => {
            tracing::debug!(request_id = %request_id, host = %host, error = %e, "Unparseable request URL");
            metrics::record_request(&method, 400, "invalid", start_time);
            return (StatusCode::BAD_REQUEST, "Invalid request URL").into_response();
        }
    };

    let cookie_name = settings.rollout.sticky_cookie.as_str();
    let (sticky_key, issued) = match cookie_value(request.headers(), cookie_name) {
        Some(key) => (Some(key), None),
        None if settings.rollout.issue_cookie => {
            let key = uuid::Uuid::new_v4().to_string();
            (Some(key.clone()), Some(key))
        }
        None => (None, None),
    };

    let edge_request = EdgeRequest {
        url,
        hostname: host,
        sticky_key,
    };

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        url = %edge_request.url,
        "Routing request"
    );

    let decision = state.router.route(&edge_request).await;
    let (mut response, kind) = match decision {
        Ok(EdgeDecision::Redirect { location, status }) => {
            (upstream::redirect(&location, status), "redirect")
        }
        Ok(EdgeDecision::Proxy { target }) => (
            upstream::forward(&state.client, state.upstream_timeout, request, &target).await,
            "proxy",
        ),
        Ok(EdgeDecision::Serve {
            deployment,
            path,
            status,
            ..
        }) => (serve(&state, request, &deployment, &path, status).await, "serve"),
        Ok(EdgeDecision::NotFound(reason)) => {
            tracing::debug!(request_id = %request_id, reason = ?reason, "Nothing to serve");
            ((StatusCode::NOT_FOUND, "Not Found").into_response(), "not_found")
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Routing failed");
            let status = StatusCode::from_u16(e.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            ((status, "Internal Server Error").into_response(), "error")
        }
    };

    if let Some(key) = issued {
        let cookie = format!(
            "{cookie_name}={key}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
            settings.rollout.cookie_max_age_secs
        );
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }

    metrics::record_request(&method, response.status().as_u16(), kind, start_time);
    response
}

/// Fetch `path` from the selected deployment's origin.
async fn serve(
    state: &AppState,
    mut request: Request<Body>,
    deployment: &ActiveDeployment,
    path: &str,
    status: Option<u16>,
) -> Response {
    let Some(origin) = deployment.origin.as_deref() else {
        tracing::error!(deployment = %deployment.id, "Selected deployment has no origin");
        return (StatusCode::BAD_GATEWAY, "Deployment has no origin").into_response();
    };

    let deployment_header = HeaderValue::from_str(&deployment.id).ok();
    if let Some(value) = &deployment_header {
        request.headers_mut().insert(X_EDGE_DEPLOYMENT, value.clone());
    }

    let target = upstream::origin_target(origin, path);
    let mut response = upstream::forward(&state.client, state.upstream_timeout, request, &target).await;

    if response.status().is_success() {
        if let Some(status) = status.and_then(|s| StatusCode::from_u16(s).ok()) {
            *response.status_mut() = status;
        }
    }
    if let Some(value) = deployment_header {
        response.headers_mut().insert(X_EDGE_DEPLOYMENT, value);
    }
    response
}
