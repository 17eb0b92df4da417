use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{instrument, warn};

use crate::{
    auth::{
        dto::{AuthResult, LoginRequest, MeResponse, RegisterRequest},
        errors::AuthError,
        extractors::AuthUser,
    },
    state::AppState,
};

const MIN_PASSWORD_LEN: usize = 8;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/me", get(get_me))
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn normalize_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim().to_lowercase();
    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(AuthError::Validation("Invalid email".into()));
    }
    Ok(email)
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthResult>), AuthError> {
    let Json(mut payload) = payload?;
    payload.email = normalize_email(&payload.email)?;
    payload.username = payload.username.trim().to_owned();
    payload.full_name = payload.full_name.trim().to_owned();

    if payload.username.is_empty() {
        warn!("empty username");
        return Err(AuthError::Validation("Username is required".into()));
    }
    if payload.password.chars().count() < MIN_PASSWORD_LEN {
        warn!("password too short");
        return Err(AuthError::Validation("Password too short".into()));
    }

    let result = state.auth.register(payload).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResult>, AuthError> {
    let Json(mut payload) = payload?;
    payload.email = normalize_email(&payload.email)?;
    Ok(Json(state.auth.login(payload).await?))
}

#[instrument(skip_all)]
pub async fn get_me(AuthUser(claims): AuthUser) -> Json<MeResponse> {
    Json(MeResponse {
        id: claims.sub,
        username: claims.username,
        email: claims.email,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        app::build_app,
        auth::{repo::memory::MemoryUserStore, services::tests::make_service},
    };
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request},
    };
    use std::sync::Arc;
    use time::{Duration as TimeDuration, OffsetDateTime};
    use tower::ServiceExt;
    use uuid::Uuid;

    fn make_state() -> AppState {
        let service = make_service(Arc::new(MemoryUserStore::default()));
        AppState::from_parts(Arc::new(service))
    }

    async fn send(state: &AppState, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let res = build_app(state.clone()).oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn register_body(username: &str, email: &str) -> serde_json::Value {
        serde_json::json!({
            "username": username,
            "email": email,
            "password": "testpassword",
            "fullname": "Test User",
        })
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("a@x.com"));
        assert!(!is_valid_email("a@x"));
        assert!(!is_valid_email("a x@y.com"));
        assert!(!is_valid_email(""));
    }

    #[tokio::test]
    async fn register_returns_created_with_user_and_token() {
        let state = make_state();
        let (status, json) = send(
            &state,
            post_json("/api/auth/register", register_body("testuser", " Zakhar@Example.com ")),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["user"]["username"], "testuser");
        assert_eq!(json["user"]["email"], "zakhar@example.com");
        assert_eq!(json["user"]["fullname"], "Test User");
        assert!(json["user"].get("password_hash").is_none());
        assert!(json["access_token"].as_str().is_some_and(|t| !t.is_empty()));
    }

    #[tokio::test]
    async fn duplicate_registration_is_conflict_and_single_response() {
        let state = make_state();
        let (first, _) = send(
            &state,
            post_json("/api/auth/register", register_body("u1", "dup@x.com")),
        )
        .await;
        assert_eq!(first, StatusCode::CREATED);

        let (status, json) = send(
            &state,
            post_json("/api/auth/register", register_body("u2", "dup@x.com")),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["error"], "email already exists");
        assert!(json.get("user").is_none());
    }

    #[tokio::test]
    async fn register_rejects_bad_input() {
        let state = make_state();
        let (status, _) = send(
            &state,
            post_json("/api/auth/register", register_body("u", "not-an-email")),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let mut short = register_body("u", "u@x.com");
        short["password"] = "short".into();
        let (status, json) = send(&state, post_json("/api/auth/register", short)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Password too short");

        let (status, _) = send(
            &state,
            post_json("/api/auth/register", register_body("   ", "v@x.com")),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn malformed_bodies_get_json_400() {
        let state = make_state();
        let (status, json) = send(
            &state,
            post_json(
                "/api/auth/register",
                serde_json::json!({"username": "x", "email": "x@y.com"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "invalid request body");

        let req = Request::post("/api/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, json) = send(&state, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "invalid request body");

        let req = Request::post("/api/auth/login")
            .body(Body::from(r#"{"email":"a@x.com","password":"pw"}"#))
            .unwrap();
        let (status, json) = send(&state, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "invalid request body");
    }

    #[tokio::test]
    async fn login_then_me() {
        let state = make_state();
        send(
            &state,
            post_json("/api/auth/register", register_body("carol", "carol@x.com")),
        )
        .await;

        let (status, json) = send(
            &state,
            post_json(
                "/api/auth/login",
                serde_json::json!({"email": "carol@x.com", "password": "testpassword"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let token = json["access_token"].as_str().unwrap().to_owned();

        let req = Request::get("/api/auth/me")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let (status, me) = send(&state, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["username"], "carol");
        assert_eq!(me["id"], json["user"]["id"]);
    }

    #[tokio::test]
    async fn login_failures_look_the_same() {
        let state = make_state();
        send(
            &state,
            post_json("/api/auth/register", register_body("dave", "dave@x.com")),
        )
        .await;

        let (s1, j1) = send(
            &state,
            post_json(
                "/api/auth/login",
                serde_json::json!({"email": "dave@x.com", "password": "nope-nope"}),
            ),
        )
        .await;
        let (s2, j2) = send(
            &state,
            post_json(
                "/api/auth/login",
                serde_json::json!({"email": "ghost@x.com", "password": "testpassword"}),
            ),
        )
        .await;
        assert_eq!(s1, StatusCode::UNAUTHORIZED);
        assert_eq!(s1, s2);
        assert_eq!(j1, j2);
    }

    #[tokio::test]
    async fn me_rejects_missing_and_expired_tokens() {
        let state = make_state();
        let req = Request::get("/api/auth/me").body(Body::empty()).unwrap();
        let (status, _) = send(&state, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let stale = OffsetDateTime::now_utc() - TimeDuration::days(2);
        let token = state
            .auth
            .tokens()
            .issue_at(Uuid::new_v4(), "old", "old@x.com", stale)
            .unwrap();
        let req = Request::get("/api/auth/me")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let (status, json) = send(&state, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["error"], "token expired");
    }
}
