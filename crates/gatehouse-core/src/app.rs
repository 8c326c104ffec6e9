use std::sync::Arc;

use axum::response::IntoResponse;
use axum::routing::get;
use axum::{middleware, Extension, Json, Router};
use sea_orm::DatabaseConnection;
use sea_orm_migration::MigratorTrait;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::migrations::Migrator;
use crate::session::db_store::SeaOrmSessionStore;
use crate::session::middleware::{csrf_protect, resolve_session};
#[cfg(feature = "redis")]
use crate::session::redis_store::RedisSessionStore;
use crate::session::store::{InMemoryStore, SessionService, SessionStore};

/// Shared per-request state: configuration and the session service.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: SessionService,
}

/// The main Gatehouse application.
///
/// Owns the session store, wires the gating pipeline onto an axum router,
/// and serves it. Host applications register their routes with
/// [`routes`](Self::routes); every registered route runs behind session
/// resolution and the CSRF gate.
pub struct App {
    pub config: Config,
    pub db: Option<DatabaseConnection>,
    pub sessions: SessionService,
    custom_routes: Vec<Router<AppState>>,
}

impl App {
    /// Create an application from environment configuration.
    pub async fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let config = Config::from_env()?;
        Self::with_config(config).await
    }

    /// Create an application with a given config.
    ///
    /// Store selection: Redis when `REDIS_URL` is set (and the `redis`
    /// feature is on), otherwise the database when `DATABASE_URL` is set
    /// (running pending migrations), otherwise in-memory.
    pub async fn with_config(config: Config) -> Result<Self, Box<dyn std::error::Error>> {
        let (db, store) = Self::init_store(&config).await?;
        let sessions = SessionService::new(store, &config);

        Ok(App {
            config,
            db,
            sessions,
            custom_routes: Vec::new(),
        })
    }

    async fn init_store(
        config: &Config,
    ) -> Result<(Option<DatabaseConnection>, Arc<dyn SessionStore>), Box<dyn std::error::Error>>
    {
        #[cfg(feature = "redis")]
        if let Some(ref redis_url) = config.redis_url {
            let store = RedisSessionStore::new(redis_url).await?;
            tracing::info!("Redis session store connected");
            return Ok((None, Arc::new(store)));
        }

        #[cfg(not(feature = "redis"))]
        if config.redis_url.is_some() {
            tracing::warn!("REDIS_URL is set but the `redis` feature is disabled; ignoring");
        }

        if let Some(ref url) = config.database_url {
            let db = crate::db::connect(url, config).await?;
            tracing::info!("Running pending database migrations...");
            Migrator::up(&db, None).await?;
            tracing::info!("Migrations complete.");
            let store = SeaOrmSessionStore::new(db.clone());
            return Ok((Some(db), Arc::new(store)));
        }

        tracing::info!("Using in-memory session store");
        Ok((None, Arc::new(InMemoryStore::new())))
    }

    /// Merge a custom axum [`Router`] into the application.
    ///
    /// Can be called multiple times; all merged routes run behind the
    /// session and CSRF layers.
    pub fn routes(mut self, router: Router<AppState>) -> Self {
        self.custom_routes.push(router);
        self
    }

    /// Build the axum router with the full gating pipeline.
    ///
    /// Per request the layers run in a strict order: session resolution,
    /// then CSRF validation, then the handler. The session layer is
    /// therefore added last (outermost).
    pub fn router(&self) -> Router {
        let config = Arc::new(self.config.clone());
        let is_dev = self.config.is_dev();

        let state = AppState {
            config: config.clone(),
            sessions: self.sessions.clone(),
        };

        let mut router = Router::new().route("/", get(welcome));

        for custom in &self.custom_routes {
            router = router.merge(custom.clone().with_state(state.clone()));
        }

        router = router
            .layer(middleware::from_fn_with_state(state.clone(), csrf_protect))
            .layer(middleware::from_fn_with_state(state, resolve_session))
            .layer(Extension(config))
            .layer(CorsLayer::permissive());

        // Only add expensive tracing/request-id middleware in development mode.
        if is_dev {
            use tower_http::trace::DefaultMakeSpan;
            use tower_http::trace::DefaultOnRequest;
            use tower_http::trace::DefaultOnResponse;
            use tower_http::LatencyUnit;

            let x_request_id = axum::http::HeaderName::from_static("x-request-id");
            router = router
                .layer(SetRequestIdLayer::new(
                    x_request_id.clone(),
                    MakeRequestUuid,
                ))
                .layer(PropagateRequestIdLayer::new(x_request_id))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(tracing::Level::INFO))
                        .on_request(DefaultOnRequest::new().level(tracing::Level::INFO))
                        .on_response(
                            DefaultOnResponse::new()
                                .level(tracing::Level::INFO)
                                .latency_unit(LatencyUnit::Millis),
                        ),
                );
        }

        router
    }

    /// Run the application server with graceful shutdown on ctrl-c.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        let addr = self.config.server_addr();
        let router = self.router();

        tracing::info!("Gatehouse server running on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        Ok(())
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C signal handler");
    tracing::info!("Shutting down Gatehouse server...");
}

/// Welcome page at `/`. Fetching it primes a session: the response carries
/// the session cookie and the CSRF token header.
async fn welcome() -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "Gatehouse is running",
        "status": "running",
    }))
}
