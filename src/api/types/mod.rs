//! Shared HTTP types

pub mod error;
pub mod json;
pub mod pagination;
pub mod query;

pub use error::{ApiError, ApiErrorResponse};
pub use json::{Json, ValidJson};
pub use pagination::{PageQuery, PaginationResponse};
pub use query::Query;
