//! `X-API-Key` header extractor for the metering endpoint

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};

use crate::api::types::ApiError;

pub const API_KEY_HEADER: &str = "x-api-key";

/// The raw secret presented by a caller; verification happens in the ledger
#[derive(Clone)]
pub struct PresentedApiKey(pub String);

impl std::fmt::Debug for PresentedApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PresentedApiKey([redacted])")
    }
}

impl<S> FromRequestParts<S> for PresentedApiKey
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        extract_api_key(&parts.headers).map(PresentedApiKey)
    }
}

pub fn extract_api_key(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
        .ok_or_else(|| ApiError::unauthorized("API key required"))
}
