pub mod app;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod extractors;
pub mod graphql;
pub mod logging;
pub mod migrations;
pub mod models;
pub mod prelude;
pub mod response;
pub mod session;
pub mod testing;

pub use app::{App, AppState};
pub use config::Config;
pub use context::{RequestContext, UserId};
pub use error::GateError;
pub use logging::{init_logging, init_logging_json};
pub use response::ApiResponse;
pub use session::{Session, SessionService, SessionStore};
pub use testing::{TestApp, TestClient, TestResponse};
