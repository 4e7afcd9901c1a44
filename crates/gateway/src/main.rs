//! FleetCore HTTP Gateway
//!
//! The entry point for the fleet back office API.
//! Handles:
//! - OAuth login and JWT issuance
//! - Tenant extraction at the request boundary
//! - Rate limiting of the login routes
//! - Observability (logging, metrics)

mod handlers;
mod middleware;

use axum::{
    extract::{MatchedPath, Request},
    middleware::{from_fn, from_fn_with_state, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use fleetcore_common::{
    auth::{GoogleOAuthClient, IdentityProvider, JwtManager, LineOAuthClient},
    config::{AppConfig, ObservabilityConfig},
    db::{dialer, Db, DbPool, RlsPool},
    errors::Result,
    metrics::{self, RequestMetrics, LATENCY_BUCKETS},
};
use metrics_exporter_prometheus::PrometheusBuilder;
use middleware::{create_rate_limiter, rate_limit, GlobalRateLimiter};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    /// Pool owner, used for health pings and shutdown
    pub pool: DbPool,
    /// Raw pool for pre-tenant work (login, membership lookup)
    pub db: Arc<dyn Db>,
    /// Tenant-binding pool for everything behind the organization header
    pub rls: Arc<dyn Db>,
    pub jwt: Arc<JwtManager>,
    pub google: Option<Arc<dyn IdentityProvider>>,
    pub line: Option<Arc<dyn IdentityProvider>>,
    pub login_limiter: Option<Arc<GlobalRateLimiter>>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, pool: DbPool) -> Result<Self> {
        let jwt = JwtManager::from_config(&config.auth)?;
        let google = GoogleOAuthClient::from_config(&config.auth.google)?
            .map(|client| Arc::new(client) as Arc<dyn IdentityProvider>);
        let line = LineOAuthClient::from_config(&config.auth.line)?
            .map(|client| Arc::new(client) as Arc<dyn IdentityProvider>);
        if google.is_none() && line.is_none() {
            warn!("No OAuth provider configured, login routes will fail");
        }

        let rls = RlsPool::new(pool.clone(), config.database.tenant_setting.clone());
        Ok(Self {
            login_limiter: create_rate_limiter(&config.rate_limit),
            db: Arc::new(pool.clone()),
            rls: Arc::new(rls),
            jwt: Arc::new(jwt),
            google,
            line,
            pool,
            config,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_tracing(&config.observability);
    info!("Starting FleetCore gateway v{}", fleetcore_common::VERSION);

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        std::process::exit(1);
    }
    let config = Arc::new(config);

    init_metrics(config.observability.metrics_port)?;

    let dialer = dialer::from_config(&config)?;
    let pool = DbPool::connect(&config.database, dialer).await?;

    let state = AppState::new(config.clone(), pool.clone())?;
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let served = serve(listener, app, config.shutdown_timeout()).await;

    // drain the pool and close the dialer even when serving failed
    pool.close().await?;
    served?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &ObservabilityConfig) {
    // RUST_LOG wins over the configured level
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn init_metrics(port: u16) -> anyhow::Result<()> {
    if port == 0 {
        info!("Metrics exporter disabled");
        return Ok(());
    }
    PrometheusBuilder::new()
        .set_buckets(LATENCY_BUCKETS)?
        .with_http_listener(SocketAddr::from(([0, 0, 0, 0], port)))
        .install()?;
    metrics::register_metrics();
    info!(port, "Metrics exporter listening");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // Login routes (no auth, rate limited)
    let mut auth_routes = Router::new()
        .route("/auth/google", get(handlers::auth::google_login))
        .route("/auth/google/callback", get(handlers::auth::google_callback))
        .route("/auth/line", get(handlers::auth::line_login))
        .route("/auth/line/callback", get(handlers::auth::line_callback))
        .route("/auth/refresh", post(handlers::auth::refresh));
    if let Some(limiter) = state.login_limiter.clone() {
        auth_routes = auth_routes.route_layer(from_fn_with_state(limiter, rate_limit));
    }

    // API routes (bearer token; tenant header where scoped)
    let api_routes = Router::new()
        .route(
            "/organizations",
            get(handlers::organizations::list_memberships)
                .post(handlers::organizations::create_organization),
        )
        .route(
            "/invitations",
            get(handlers::invitations::list_invitations)
                .post(handlers::invitations::create_invitation),
        )
        .route("/invitations/accept", post(handlers::invitations::accept_invitation))
        .route("/cam-files", get(handlers::cam_files::list_cam_files))
        .route("/etc-meisai", get(handlers::etc_meisai::list_etc_meisai))
        .route("/etc-meisai/bulk", post(handlers::etc_meisai::bulk_create));

    let request_timeout = state.config.request_timeout();

    // Compose the app
    Router::new()
        .route("/health", get(handlers::health::health))
        .merge(auth_routes)
        .nest("/api", api_routes)
        .layer(from_fn(track_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Count and time every request by its route template
async fn track_metrics(request: Request, next: Next) -> Response {
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let timer = RequestMetrics::start(request.method().as_str(), &endpoint);

    let response = next.run(request).await;
    timer.finish(response.status().as_u16());
    response
}

/// Serve until a shutdown signal, then give in-flight requests `grace` to
/// finish before dropping them
async fn serve(
    listener: tokio::net::TcpListener,
    app: Router,
    grace: Duration,
) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    let server =
        axum::serve(listener, app).with_graceful_shutdown(shutdown.clone().cancelled_owned());
    let mut server = tokio::spawn(async move { server.await });

    let grace_elapsed = async {
        shutdown.cancelled().await;
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        result = &mut server => result??,
        _ = grace_elapsed => {
            warn!(
                grace_secs = grace.as_secs(),
                "Shutdown grace elapsed, dropping in-flight requests"
            );
            server.abort();
        }
    }
    Ok(())
}

/// Cancel `shutdown` on Ctrl+C or SIGTERM
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
    shutdown.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header, StatusCode},
    };
    use fleetcore_common::{config::OAuthProviderConfig, context::Principal};
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.auth.jwt_secret = Some("router_test_secret".to_string());
        config.auth.google = OAuthProviderConfig {
            client_id: Some("google-client".to_string()),
            client_secret: Some("google-secret".to_string()),
            redirect_uri: Some("https://api.example.com/auth/google/callback".to_string()),
        };
        config.server.health_timeout_secs = 2;
        config
    }

    /// Router over a pool that never reaches a server
    fn app(config: AppConfig) -> (Router, Arc<JwtManager>) {
        let pg = PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(200))
            .connect_lazy("postgres://fleet@127.0.0.1:1/postgres")
            .unwrap();
        let state = AppState::new(Arc::new(config), DbPool::from_pool(pg)).unwrap();
        let jwt = state.jwt.clone();
        (create_router(state), jwt)
    }

    fn bearer(jwt: &JwtManager) -> String {
        let principal = Principal {
            user_id: "u-1".to_string(),
            email: Some("a@example.com".to_string()),
            display_name: "Alice".to_string(),
            is_superadmin: false,
        };
        format!("Bearer {}", jwt.generate_access_token(&principal).unwrap())
    }

    fn get(uri: &str) -> axum::http::Request<Body> {
        axum::http::Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health_unreachable_database() {
        let (app, _) = app(config());
        let response = app.oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, serde_json::json!({"status": "unhealthy", "database": "unreachable"}));
    }

    #[tokio::test]
    async fn test_google_login_redirects() {
        let (app, _) = app(config());
        let response = app.oneshot(get("/auth/google")).await.unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        let location = response.headers()[header::LOCATION].to_str().unwrap();
        assert!(location.starts_with("https://accounts.google.com/"));
        assert!(location.contains("state=default"));
    }

    #[tokio::test]
    async fn test_unconfigured_line_login() {
        let (app, _) = app(config());
        let response = app.oneshot(get("/auth/line")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_tenant_routes_require_token_and_header() {
        let (app, jwt) = app(config());

        let response = app.clone().oneshot(get("/api/cam-files")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let request = axum::http::Request::builder()
            .uri("/api/cam-files")
            .header(header::AUTHORIZATION, bearer(&jwt))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_login_rate_limited() {
        let mut config = config();
        config.rate_limit.requests_per_second = 1;
        config.rate_limit.burst = 1;
        let (app, _) = app(config);

        let first = app.clone().oneshot(get("/auth/google")).await.unwrap();
        assert_eq!(first.status(), StatusCode::FOUND);
        let second = app.oneshot(get("/auth/google")).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_request_id_propagated() {
        let (app, _) = app(config());
        let response = app.oneshot(get("/auth/google")).await.unwrap();
        assert!(response.headers().contains_key("x-request-id"));
    }
}
