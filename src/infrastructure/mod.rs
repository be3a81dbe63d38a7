//! Infrastructure layer - storage backends, auth and service implementations

pub mod api_key;
pub mod auth;
pub mod logging;
pub mod model;
pub mod observability;
pub mod storage;
pub mod usage;
pub mod user;
