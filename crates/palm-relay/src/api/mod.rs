//! HTTP API module.
//!
//! Provides the chat relay endpoint and a health check.

mod error;
mod handlers;
mod proxy;
mod routes;
mod state;

pub use error::{ApiError, ApiResult};
pub use handlers::HealthResponse;
pub use proxy::extract_user_text;
pub use routes::create_router;
pub use state::AppState;
