//! User authentication extractors using JWT bearer tokens

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use tracing::debug;

use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::domain::user::User;

/// Extractor that requires a valid JWT token
#[derive(Debug, Clone)]
pub struct RequireUser(pub User);

impl FromRequestParts<AppState> for RequireUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_jwt_token(&parts.headers)?
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

        authenticate(&token, state).await.map(RequireUser)
    }
}

/// Extractor for routes that behave differently for signed-in users.
/// A missing token yields `None`; a present but invalid one is rejected.
#[derive(Debug, Clone)]
pub struct OptionalUser(pub Option<User>);

impl FromRequestParts<AppState> for OptionalUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match extract_jwt_token(&parts.headers)? {
            Some(token) => authenticate(&token, state).await.map(|u| OptionalUser(Some(u))),
            None => Ok(OptionalUser(None)),
        }
    }
}

async fn authenticate(token: &str, state: &AppState) -> Result<User, ApiError> {
    debug!("Validating JWT token");

    let claims = state
        .jwt_service
        .validate(token)
        .map_err(|_| ApiError::unauthorized("Invalid token"))?;
    let user_id = claims.user_id()?;

    state
        .user_service
        .find_by_id(&user_id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("User not found"))
}

/// Bearer token from the Authorization header, if one was sent
pub fn extract_jwt_token(headers: &HeaderMap) -> Result<Option<String>, ApiError> {
    let Some(auth_header) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let auth_str = auth_header
        .to_str()
        .map_err(|_| ApiError::bad_request("Invalid Authorization header encoding"))?;

    match auth_str.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(Some(token.trim().to_string())),
        _ => Err(ApiError::unauthorized(
            "Provide a JWT token via 'Authorization: Bearer <token>'",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_extract_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            "Bearer eyJhbGciOiJIUzI1NiJ9.test".parse().unwrap(),
        );

        let token = extract_jwt_token(&headers).unwrap();
        assert_eq!(token.as_deref(), Some("eyJhbGciOiJIUzI1NiJ9.test"));
    }

    #[test]
    fn test_missing_token_is_none() {
        assert!(extract_jwt_token(&HeaderMap::new()).unwrap().is_none());
    }

    #[test]
    fn test_invalid_auth_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Basic dXNlcjpwYXNz".parse().unwrap());

        let err = extract_jwt_token(&headers).unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_trimmed_token() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            "Bearer   token-with-spaces   ".parse().unwrap(),
        );

        let token = extract_jwt_token(&headers).unwrap();
        assert_eq!(token.as_deref(), Some("token-with-spaces"));
    }
}
