use axum::{middleware, routing::get, Router};
use tower_http::trace::TraceLayer;

use super::health;
use super::marketplace;
use super::middleware::{logging_middleware, metrics_middleware, security_headers_middleware};
use super::state::AppState;
use crate::infrastructure::observability::{create_metrics_router, PrometheusMetrics};

/// Full application router; `/metrics` is mounted only when a recorder is installed
pub fn create_router(state: AppState, metrics: Option<PrometheusMetrics>) -> Router {
    let mut router = Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))
        .route("/live", get(health::live_check))
        .nest("/api", marketplace::create_marketplace_router())
        .with_state(state)
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(middleware::from_fn(logging_middleware))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http());

    if let Some(m) = metrics {
        router = router.merge(create_metrics_router(m));
    }

    router
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::config::AppConfig;

    async fn app() -> Router {
        let state = crate::create_app_state(&AppConfig::default()).await.unwrap();
        create_router(state, None)
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        send_with_headers(app, method, uri, token, None, body).await
    }

    async fn send_with_headers(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        api_key: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        if let Some(key) = api_key {
            builder = builder.header("x-api-key", key);
        }

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        (status, value)
    }

    async fn register(app: &Router, email: &str, user_type: &str) -> String {
        let (status, body) = send(
            app,
            Method::POST,
            "/api/users/register",
            None,
            Some(json!({
                "name": "Test User",
                "email": email,
                "password": "correct-horse",
                "user_type": user_type,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);

        body["token"].as_str().unwrap().to_string()
    }

    /// Developer with one active model
    async fn published_model(app: &Router) -> (String, String) {
        let dev = register(app, "dev@example.com", "developer").await;

        let (status, body) = send(
            app,
            Method::POST,
            "/api/models",
            Some(&dev),
            Some(json!({"name": "Sentiment", "category": "nlp", "description": "Scores text"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        let model_id = body["model"]["id"].as_str().unwrap().to_string();

        let (status, _) = send(
            app,
            Method::PATCH,
            &format!("/api/models/{}/status", model_id),
            Some(&dev),
            Some(json!({"status": "active"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        (dev, model_id)
    }

    async fn issue(app: &Router, token: &str, model_id: &str) -> (StatusCode, Value) {
        send(
            app,
            Method::POST,
            "/api/keys",
            Some(token),
            Some(json!({"model_id": model_id})),
        )
        .await
    }

    async fn call(app: &Router, secret: &str, model_id: &str, status_code: u16) -> (StatusCode, Value) {
        send_with_headers(
            app,
            Method::POST,
            "/api/usage/calls",
            None,
            Some(secret),
            Some(json!({
                "model_id": model_id,
                "input_summary": "hello",
                "response_time_ms": 120,
                "status_code": status_code,
            })),
        )
        .await
    }

    #[tokio::test]
    async fn test_health_endpoints() {
        let app = app().await;

        let (status, body) = send(&app, Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");

        let (status, body) = send(&app, Method::GET, "/ready", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["checks"].as_array().unwrap().len(), 3);

        let (status, _) = send(&app, Method::GET, "/live", None, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_metering_end_to_end() {
        let app = app().await;
        let (dev, model_id) = published_model(&app).await;
        let consumer = register(&app, "consumer@example.com", "consumer").await;

        let (status, body) = issue(&app, &consumer, &model_id).await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        let secret = body["secret"].as_str().unwrap().to_string();
        assert_eq!(body["api_key"]["usage_count"], 0);

        for code in [200, 200, 500] {
            let (status, body) = call(&app, &secret, &model_id, code).await;
            assert_eq!(status, StatusCode::CREATED, "{}", body);
            assert_eq!(body["log"]["status_code"], code);
        }

        let (status, body) = send(
            &app,
            Method::GET,
            &format!("/api/usage/model/{}", model_id),
            Some(&dev),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["stats"]["total"], 3);
        assert_eq!(body["stats"]["success_rate"], 66.67);
        assert_eq!(body["pagination"]["total"], 3);
        assert_eq!(body["pagination"]["pages"], 1);

        let (status, body) =
            send(&app, Method::GET, "/api/usage/developer/stats", Some(&dev), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stats"]["total_calls"], 3);
        assert_eq!(body["stats"]["models_data"][0]["model_id"], model_id.as_str());
        assert_eq!(body["stats"]["models_data"][0]["model_name"], "Sentiment");
        assert_eq!(body["stats"]["models_data"][0]["total_calls"], 3);
        assert_eq!(body["stats"]["daily_stats"][0]["count"], 3);

        let (_, body) = send(&app, Method::GET, "/api/keys/my-keys", Some(&consumer), None).await;
        assert_eq!(body["api_keys"][0]["usage_count"], 3);

        let (_, body) = send(&app, Method::GET, "/api/usage/my-usage", Some(&consumer), None).await;
        assert_eq!(body["logs"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_duplicate_issue_conflicts_until_revoked() {
        let app = app().await;
        let (_, model_id) = published_model(&app).await;
        let consumer = register(&app, "consumer@example.com", "consumer").await;

        let (_, first) = issue(&app, &consumer, &model_id).await;
        let key_id = first["api_key"]["id"].as_str().unwrap().to_string();
        let secret = first["secret"].as_str().unwrap().to_string();

        let (status, body) = issue(&app, &consumer, &model_id).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "You already have an active API key for this model");

        for _ in 0..2 {
            let (status, body) = send(
                &app,
                Method::PATCH,
                &format!("/api/keys/{}/revoke", key_id),
                Some(&consumer),
                None,
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["api_key"]["status"], "revoked");
        }

        let (status, body) = call(&app, &secret, &model_id, 200).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Invalid or revoked API key");

        let (status, _) = issue(&app, &consumer, &model_id).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_issue_for_draft_model_is_rejected() {
        let app = app().await;
        let dev = register(&app, "dev@example.com", "developer").await;

        let (_, body) = send(
            &app,
            Method::POST,
            "/api/models",
            Some(&dev),
            Some(json!({"name": "Unreleased"})),
        )
        .await;
        let model_id = body["model"]["id"].as_str().unwrap().to_string();

        let (status, body) = issue(&app, &dev, &model_id).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Cannot generate API key for inactive model");
    }

    #[tokio::test]
    async fn test_call_rejections() {
        let app = app().await;
        let (dev, model_id) = published_model(&app).await;
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/models",
            Some(&dev),
            Some(json!({"name": "Other"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let other_model = body["model"]["id"].as_str().unwrap().to_string();

        let (_, body) = issue(&app, &dev, &model_id).await;
        let secret = body["secret"].as_str().unwrap().to_string();

        // No header
        let (status, _) = send(
            &app,
            Method::POST,
            "/api/usage/calls",
            None,
            Some(json!({"model_id": model_id, "response_time_ms": 1, "status_code": 200})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = call(&app, &secret, &other_model, 200).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "API key not valid for this model");

        let (status, _) = call(&app, "mk_live_not-a-real-key", &model_id, 200).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_authorization_rules() {
        let app = app().await;
        let (_, model_id) = published_model(&app).await;
        let consumer = register(&app, "consumer@example.com", "consumer").await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/models",
            Some(&consumer),
            Some(json!({"name": "Nope"})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Only developers can create models");

        let (status, _) = send(
            &app,
            Method::GET,
            &format!("/api/usage/model/{}", model_id),
            Some(&consumer),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(
            &app,
            Method::GET,
            &format!("/api/keys/model/{}", model_id),
            Some(&consumer),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(&app, Method::GET, "/api/keys/my-keys", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) =
            send(&app, Method::GET, "/api/keys/my-keys", Some("not-a-jwt"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_invalid_ids_are_bad_requests() {
        let app = app().await;
        let consumer = register(&app, "consumer@example.com", "consumer").await;

        let (status, _) = send(&app, Method::GET, "/api/keys/not-a-uuid", Some(&consumer), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = issue(&app, &consumer, "also-bad").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_developer_without_models() {
        let app = app().await;
        let dev = register(&app, "lonely@example.com", "developer").await;

        let (status, body) =
            send(&app, Method::GET, "/api/usage/developer/stats", Some(&dev), None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "No models found");
        assert_eq!(body["stats"]["total_calls"], 0);
        assert!(body["stats"]["models_data"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_login_and_profile() {
        let app = app().await;
        register(&app, "ada@example.com", "both").await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/users/login",
            None,
            Some(json!({"email": "ada@example.com", "password": "wrong-password"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Invalid credentials");

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/users/login",
            None,
            Some(json!({"email": "ada@example.com", "password": "correct-horse"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let token = body["token"].as_str().unwrap().to_string();
        assert!(body["user"].get("password_hash").is_none());

        let (status, body) = send(
            &app,
            Method::PUT,
            "/api/users/profile",
            Some(&token),
            Some(json!({"bio": "Builds models"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["bio"], "Builds models");

        let (_, body) = send(&app, Method::GET, "/api/users/profile", Some(&token), None).await;
        assert_eq!(body["user"]["user_type"], "both");
    }

    #[tokio::test]
    async fn test_register_validation_envelope() {
        let app = app().await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/users/register",
            None,
            Some(json!({"name": "Ada", "email": "ada@example.com", "password": "short"})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Password must be at least 8 characters");
    }

    #[tokio::test]
    async fn test_malformed_paging_falls_back_to_defaults() {
        let app = app().await;
        let (dev, model_id) = published_model(&app).await;
        let consumer = register(&app, "consumer@example.com", "consumer").await;

        let (status, body) = send(
            &app,
            Method::GET,
            "/api/usage/my-usage?page=abc",
            Some(&consumer),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["pagination"]["page"], 1);
        assert_eq!(body["pagination"]["limit"], 20);

        let (status, body) = send(
            &app,
            Method::GET,
            &format!("/api/usage/model/{}?page=&limit=lots", model_id),
            Some(&dev),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["pagination"]["page"], 1);
        assert_eq!(body["pagination"]["limit"], 20);
    }

    #[tokio::test]
    async fn test_catalog_listing_rules() {
        let app = app().await;
        let (dev, model_id) = published_model(&app).await;
        let consumer = register(&app, "consumer@example.com", "consumer").await;

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/models",
            Some(&dev),
            Some(json!({"name": "Unreleased"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send(&app, Method::GET, "/api/models", None, None).await;
        assert_eq!(status, StatusCode::OK);
        let models = body["models"].as_array().unwrap();
        assert_eq!(models.len(), 1);
        assert_eq!(models[0]["id"], model_id.as_str());
        assert_eq!(models[0]["developer"]["name"], "Test User");
        assert_eq!(models[0]["developer"]["email"], "dev@example.com");
        let developer_id = models[0]["developer_id"].as_str().unwrap().to_string();

        let (_, body) = send(&app, Method::GET, "/api/models", Some(&consumer), None).await;
        assert_eq!(body["models"].as_array().unwrap().len(), 1);

        let (_, body) = send(&app, Method::GET, "/api/models", Some(&dev), None).await;
        assert_eq!(body["models"].as_array().unwrap().len(), 2);

        let (_, body) = send(&app, Method::GET, "/api/models?status=draft", None, None).await;
        assert_eq!(body["models"][0]["name"], "Unreleased");

        let (_, body) = send(
            &app,
            Method::GET,
            &format!("/api/models?developer_id={}", developer_id),
            None,
            None,
        )
        .await;
        assert_eq!(body["models"].as_array().unwrap().len(), 1);

        let (_, body) = send(
            &app,
            Method::GET,
            "/api/models?developer_id=7d4e1c52-0b5a-4f5e-9a51-3a1f0e6b2c9d",
            None,
            None,
        )
        .await;
        assert!(body["models"].as_array().unwrap().is_empty());

        let (status, body) =
            send(&app, Method::GET, "/api/models?developer_id=nobody", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].is_string());

        let (status, body) = send(
            &app,
            Method::GET,
            &format!("/api/models/{}", model_id),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["model"]["developer"]["email"], "dev@example.com");
    }

    #[tokio::test]
    async fn test_key_and_usage_views_join_related_records() {
        let app = app().await;
        let (dev, model_id) = published_model(&app).await;
        let consumer = register(&app, "consumer@example.com", "consumer").await;

        let (_, body) = issue(&app, &consumer, &model_id).await;
        let key_id = body["api_key"]["id"].as_str().unwrap().to_string();
        let secret = body["secret"].as_str().unwrap().to_string();
        call(&app, &secret, &model_id, 200).await;

        let (status, body) =
            send(&app, Method::GET, "/api/keys/my-keys", Some(&consumer), None).await;
        assert_eq!(status, StatusCode::OK);
        let key = &body["api_keys"][0];
        assert_eq!(key["id"], key_id.as_str());
        assert_eq!(key["model"]["name"], "Sentiment");
        assert_eq!(key["model"]["description"], "Scores text");
        assert_eq!(key["model"]["category"], "nlp");

        let (status, body) = send(
            &app,
            Method::GET,
            &format!("/api/keys/{}", key_id),
            Some(&dev),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["api_key"]["model"]["name"], "Sentiment");
        assert_eq!(body["api_key"]["owner"]["name"], "Test User");
        assert_eq!(body["api_key"]["owner"]["email"], "consumer@example.com");

        let (status, body) =
            send(&app, Method::GET, "/api/usage/my-usage", Some(&consumer), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["logs"][0]["model"]["name"], "Sentiment");
        assert_eq!(body["logs"][0]["model"]["category"], "nlp");
        assert_eq!(body["logs"][0]["model_id"], model_id.as_str());
    }

    #[tokio::test]
    async fn test_security_headers_present() {
        let app = app().await;
        let response = app
            .oneshot(Request::builder().uri("/live").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.headers().get(header::X_CONTENT_TYPE_OPTIONS).unwrap(), "nosniff");
        assert_eq!(response.headers().get(header::CACHE_CONTROL).unwrap(), "no-store");
    }
}
