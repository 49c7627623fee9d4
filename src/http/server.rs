//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the shared gateway state from validated configuration
//! - Create the Axum router: operator endpoints plus the proxy fallback
//! - Wire up middleware (request ID, tracing, access log, limits, security)
//! - Serve until the shutdown coordinator fires
//!
//! # Design Decisions
//! - Admission runs as a router-wide middleware before any route: operator
//!   endpoints, unmatched paths and proxied requests share one window per
//!   client, so `/health` cannot be used to fan unbounded probes out
//! - Operator endpoints (`/health`, `/metrics`, `/breakers`) are matched first
//! - Every other path goes through the route table and the dispatcher
//! - Client identity is the peer IP address

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, Path, State},
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::{
    catch_panic::CatchPanicLayer, limit::RequestBodyLimitLayer, timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::clock::{Clock, SystemClock};
use crate::config::{validate_config, ConfigError, GatewayConfig, ValidationError};
use crate::health::HealthAggregator;
use crate::http::dispatcher::GatewayDispatcher;
use crate::http::request;
use crate::http::response::{GatewayError, RouteLabel};
use crate::http::upstream::{HttpUpstream, Upstream};
use crate::lifecycle::shutdown::Shutdown;
use crate::observability::logging;
use crate::resilience::BreakerRegistry;
use crate::routing::Router as RouteTable;
use crate::security::{self, RateLimiter};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<RouteTable>,
    pub dispatcher: GatewayDispatcher,
    pub registry: Arc<BreakerRegistry>,
    pub health: Arc<HealthAggregator>,
    pub metrics: Option<PrometheusHandle>,
    pub started_at: Instant,
}

/// The edge gateway HTTP server.
pub struct GatewayServer {
    router: Router,
    config: GatewayConfig,
    state: AppState,
}

impl GatewayServer {
    /// Validate `config` and build a server that forwards over HTTP.
    pub fn new(config: GatewayConfig, metrics: Option<PrometheusHandle>) -> Result<Self, ConfigError> {
        Self::with_parts(config, metrics, Arc::new(HttpUpstream::new()), Arc::new(SystemClock))
    }

    /// Build a server with an explicit upstream transport and clock.
    pub fn with_parts(
        config: GatewayConfig,
        metrics: Option<PrometheusHandle>,
        upstream: Arc<dyn Upstream>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        let descriptors = validate_config(&config).map_err(ConfigError::Validation)?;
        let registry = Arc::new(
            BreakerRegistry::new(descriptors, clock.clone())
                .map_err(|e: ValidationError| ConfigError::Validation(vec![e]))?,
        );
        let limiter = Arc::new(RateLimiter::new(&config.rate_limit, clock));
        let dispatcher = GatewayDispatcher::new(limiter, registry.clone(), upstream.clone());
        let health = Arc::new(HealthAggregator::new(registry.clone(), upstream));

        let state = AppState {
            routes: Arc::new(RouteTable::from_config(&config.routes)),
            dispatcher,
            registry,
            health,
            metrics,
            started_at: Instant::now(),
        };

        let router = Self::build_router(&config, state.clone());
        Ok(Self {
            router,
            config,
            state,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        let dispatcher = state.dispatcher.clone();
        let router = Router::new()
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/breakers", get(breakers_handler))
            .route("/breakers/{backend}/reset", post(reset_breaker_handler))
            .fallback(proxy_handler)
            .with_state(state)
            .layer(middleware::from_fn_with_state(dispatcher, admission))
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.listener.request_timeout_secs,
            )))
            .layer(middleware::from_fn(logging::access_log))
            .layer(TraceLayer::new_for_http().make_span_with(request::make_span))
            .layer(request::propagate_request_id_layer())
            .layer(request::set_request_id_layer())
            .layer(CatchPanicLayer::custom(handle_panic));

        security::headers::apply(router, &config.security)
    }

    /// The fully layered router, without connection info.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener, shutdown: &Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            backends = self.state.registry.len(),
            routes = self.state.routes.routes().len(),
            "Gateway listening"
        );

        if self.config.health_check.enabled {
            let interval = Duration::from_secs(self.config.health_check.interval_secs);
            tokio::spawn(self.state.health.clone().run(interval, shutdown.subscribe()));
        }

        if self.config.rate_limit.enabled {
            tokio::spawn(
                self.state
                    .dispatcher
                    .limiter()
                    .clone()
                    .run_sweeper(shutdown.subscribe()),
            );
        }

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        let mut stop = shutdown.subscribe();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = stop.recv().await;
            })
            .await?;

        tracing::info!("Gateway stopped");
        Ok(())
    }
}

/// Rate limit every request by peer IP before it reaches a handler.
async fn admission(
    State(dispatcher): State<GatewayDispatcher>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
    next: Next,
) -> Response {
    match dispatcher.admit(&peer.ip().to_string()) {
        Ok(()) => next.run(request).await,
        Err(err) => err.into_response(),
    }
}

/// Match a route and hand the admitted request to the dispatcher.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let Some(route) = state.routes.match_path(request.uri().path()) else {
        tracing::debug!(path = %request.uri().path(), "No route matched");
        return GatewayError::RouteNotFound.into_response();
    };
    let label = RouteLabel::new(route.name.clone());
    let backend = route.backend.clone();

    tracing::debug!(
        request_id = %request::request_id(&request),
        route = %label.as_str(),
        backend = %backend,
        "Proxying request"
    );

    let mut response = match state.dispatcher.forward(&backend, request).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    };
    response.extensions_mut().insert(label);
    response
}

async fn health_handler(State(state): State<AppState>) -> Response {
    let snapshot = state.health.check_all().await;
    let status = if snapshot.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let body = json!({
        "status": snapshot.status,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime": state.started_at.elapsed().as_secs_f64(),
        "services": snapshot.services,
    });

    (status, Extension(RouteLabel::new("health")), Json(body)).into_response()
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    let label = Extension(RouteLabel::new("metrics"));
    match state.metrics {
        Some(handle) => (label, handle.render()).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            label,
            Json(json!({ "error": "Metrics disabled" })),
        )
            .into_response(),
    }
}

async fn breakers_handler(State(state): State<AppState>) -> Response {
    (
        Extension(RouteLabel::new("breakers")),
        Json(state.registry.snapshots()),
    )
        .into_response()
}

async fn reset_breaker_handler(
    State(state): State<AppState>,
    Path(backend): Path<String>,
) -> Response {
    let label = Extension(RouteLabel::new("breakers"));
    match state.registry.reset(&backend) {
        Some(snapshot) => (label, Json(snapshot)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            label,
            Json(json!({ "error": "Unknown backend", "service": backend })),
        )
            .into_response(),
    }
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    };

    tracing::error!(panic = %detail, "Handler panicked");
    GatewayError::Internal(detail).into_response()
}
