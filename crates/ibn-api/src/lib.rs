//! Intent controller REST API library.
//!
//! Exposes the router and state so the binary (`main.rs`) and the
//! end-to-end tests can build the same server.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::build_router;
pub use state::{AppState, IntentRecord};
