use serde::Deserialize;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Public root URL of the deployment (e.g. https://app.example.com).
    ///
    /// Used to validate `Origin`/`Referer` headers for the playground CSRF
    /// bypass and to reason about same-origin redirects.
    pub root_url: String,

    /// Environment: development, production, test
    pub environment: String,

    /// Server host (default: 127.0.0.1)
    pub server_host: String,

    /// Server port (default: 3000)
    pub server_port: u16,

    /// Database connection URL for the PostgreSQL/SQLite session store.
    /// When unset, sessions live in an in-memory store (dev/test only).
    pub database_url: Option<String>,

    /// Redis URL for the Redis session store (requires the `redis` feature).
    pub redis_url: Option<String>,

    /// Signing key for the session cookie. Tampered cookies are treated as
    /// absent, never as an error the client can observe.
    pub session_secret: String,

    /// Name of the session cookie (default: session)
    pub session_cookie: String,

    /// Server-side session lifetime in hours (default: 72)
    pub session_ttl_hours: u64,

    /// Bounded timeout for every session-store call, in seconds (default: 5).
    /// A timeout fails the request 5xx — it is never treated as "no session".
    pub store_timeout_secs: u64,

    /// Allow the GraphQL playground same-origin CSRF bypass.
    ///
    /// Development convenience only: the bypass is inert in production no
    /// matter what this is set to.
    pub enable_playground_bypass: bool,
}

impl Config {
    /// Load configuration from environment variables (with .env support).
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        // Load .env file if present (ignore errors if missing)
        let _ = dotenvy::dotenv();

        Ok(Config {
            root_url: std::env::var("ROOT_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            server_host: std::env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            server_port: std::env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .unwrap_or(3000),
            database_url: std::env::var("DATABASE_URL").ok(),
            redis_url: std::env::var("REDIS_URL").ok(),
            session_secret: std::env::var("SESSION_SECRET")
                .unwrap_or_else(|_| "gatehouse-dev-secret-change-me".to_string()),
            session_cookie: std::env::var("SESSION_COOKIE_NAME")
                .unwrap_or_else(|_| "session".to_string()),
            session_ttl_hours: std::env::var("SESSION_TTL_HOURS")
                .unwrap_or_else(|_| "72".to_string())
                .parse()
                .unwrap_or(72),
            store_timeout_secs: std::env::var("STORE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),
            enable_playground_bypass: matches!(
                std::env::var("ENABLE_PLAYGROUND_BYPASS")
                    .unwrap_or_default()
                    .to_lowercase()
                    .as_str(),
                "true" | "1" | "yes"
            ),
        })
    }

    /// Check if running in development mode.
    pub fn is_dev(&self) -> bool {
        self.environment == "development"
    }

    /// Check if running in production mode. Toggles the `Secure` cookie flag
    /// and disables the playground bypass.
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Get the full server address.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}
