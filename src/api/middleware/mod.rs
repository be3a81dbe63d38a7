//! API middleware and request extractors

pub mod api_key;
pub mod logging;
pub mod metrics;
pub mod security;
pub mod user_auth;

pub use api_key::{PresentedApiKey, API_KEY_HEADER};
pub use logging::logging_middleware;
pub use metrics::metrics_middleware;
pub use security::security_headers_middleware;
pub use user_auth::{OptionalUser, RequireUser};
