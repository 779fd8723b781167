use std::net::SocketAddr;

use axum::{routing::get, Router};
use tower_cookies::CookieManagerLayer;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{auth, config::AppConfig, state::AppState};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(auth::router())
        .route("/health", get(|| async { "ok" }))
        .with_state(state)
        .layer(CookieManagerLayer::new())
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    // the query string of the verify page carries a live token
                    let path = req.uri().path().to_owned();
                    tracing::info_span!("http_request", %method, path = %path, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router, config: &AppConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::Environment, state::testing::RecordingMailer};
    use axum::{
        body::Body,
        http::{header, Request, Response, StatusCode},
    };
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn setup(env: Environment) -> (TempDir, AppState, Arc<RecordingMailer>) {
        let dir = tempfile::tempdir().expect("tempdir");
        let (state, mailer) = AppState::fake(dir.path(), env);
        (dir, state, mailer)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ORIGIN, "http://localhost:3000")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut req = Request::get(uri);
        if let Some(c) = cookie {
            req = req.header(header::COOKIE, c);
        }
        req.body(Body::empty()).unwrap()
    }

    async fn call(state: &AppState, req: Request<Body>) -> Response<Body> {
        build_app(state.clone()).oneshot(req).await.expect("response")
    }

    async fn json_body(res: Response<Body>) -> Value {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).expect("json body")
    }

    async fn text_body(res: Response<Body>) -> String {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    /// `name=value` part of the response's Set-Cookie header.
    fn session_cookie(res: &Response<Body>) -> Option<String> {
        res.headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(str::to_string)
    }

    #[tokio::test]
    async fn health_is_ok() {
        let (_dir, state, _) = setup(Environment::Test);
        let res = call(&state, get("/health", None)).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(text_body(res).await, "ok");
    }

    #[tokio::test]
    async fn magic_link_login_flow_sets_session() {
        let (_dir, state, mailer) = setup(Environment::Development);

        let res = call(
            &state,
            post_json(
                "/api/auth/magic-link",
                json!({ "email": " Seeker@Example.com ", "redirectTo": "/user/jobs", "purpose": "register" }),
            ),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        assert_eq!(body["ok"], true);
        assert_eq!(body["email"], "seeker@example.com");
        assert_eq!(body["delivery"], "sent");
        let url = body["verificationUrl"].as_str().unwrap();
        assert!(url.starts_with("http://localhost:3000/auth/magic-link/verify?token="));
        let token = body["debugToken"].as_str().unwrap();
        assert!(url.ends_with(token));
        assert_eq!(mailer.sent().len(), 1);

        let res = call(&state, get(&format!("/auth/magic-link/verify?token={token}"), None)).await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(res.headers()[header::LOCATION], "/user/jobs");
        let cookie = session_cookie(&res).expect("session cookie");
        assert!(cookie.starts_with("rakamin_session="));

        let res = call(&state, get("/api/auth/session", Some(&cookie))).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        assert_eq!(body["authenticated"], true);
        assert_eq!(body["session"]["email"], "seeker@example.com");
    }

    #[tokio::test]
    async fn redirect_with_control_characters_falls_back_to_default_page() {
        let (_dir, state, _) = setup(Environment::Development);

        let res = call(
            &state,
            post_json("/api/auth/magic-link", json!({ "email": "a@b.io", "redirectTo": "/user\n" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        let token = json_body(res).await["debugToken"].as_str().unwrap().to_string();
        let doc = state.store.load().await.unwrap();
        assert_eq!(doc.magic_links[0].redirect_to, "/user");

        let res = call(&state, get(&format!("/auth/magic-link/verify?token={token}"), None)).await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(res.headers()[header::LOCATION], "/user");
        assert!(session_cookie(&res).unwrap().starts_with("rakamin_session="));
    }

    #[tokio::test]
    async fn magic_link_rejects_bad_email_and_malformed_body() {
        let (_dir, state, mailer) = setup(Environment::Test);

        let res = call(&state, post_json("/api/auth/magic-link", json!({ "email": "nope" }))).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body = json_body(res).await;
        assert_eq!(body["ok"], false);
        assert_eq!(body["error"], "INVALID_EMAIL");

        let req = Request::post("/api/auth/magic-link")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let res = call(&state, req).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn production_hides_url_and_token() {
        let (_dir, state, _) = setup(Environment::Production);
        let res = call(&state, post_json("/api/auth/magic-link", json!({ "email": "a@b.io" }))).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        assert!(body.get("verificationUrl").is_none());
        assert!(body.get("debugToken").is_none());
        assert!(body["expiresAt"].is_string());
    }

    #[tokio::test]
    async fn verify_page_reports_failures_as_html() {
        let (_dir, state, _) = setup(Environment::Test);

        let res = call(&state, get("/auth/magic-link/verify", None)).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(res.headers().get(header::SET_COOKIE).is_none());
        assert!(text_body(res).await.contains("Token tidak ditemukan."));

        let res = call(&state, get("/auth/magic-link/verify?token=unknown", None)).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(text_body(res).await.contains("Kami tidak bisa memproses link ini."));
    }

    #[tokio::test]
    async fn credentials_trust_first_password_then_enforce_it() {
        let (_dir, state, _) = setup(Environment::Test);

        let res = call(
            &state,
            post_json(
                "/api/auth/credentials",
                json!({ "email": "User@Example.com", "password": "hunter22", "redirectTo": "https://evil.example" }),
            ),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert!(session_cookie(&res).unwrap().starts_with("rakamin_session="));
        let body = json_body(res).await;
        assert_eq!(body["email"], "user@example.com");
        assert_eq!(body["redirectTo"], "/user");

        let user = state.store.get_user_by_email("user@example.com").await.unwrap().unwrap();
        assert!(user.password_hash.is_some());
        assert!(user.last_login_at.is_some());

        let res = call(
            &state,
            post_json("/api/auth/credentials", json!({ "email": "user@example.com", "password": "wrong" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert!(session_cookie(&res).is_none());
        assert_eq!(json_body(res).await["error"], "INVALID_CREDENTIALS");

        let res = call(
            &state,
            post_json("/api/auth/credentials", json!({ "email": "user@example.com", "password": "hunter22" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn credentials_require_password() {
        let (_dir, state, _) = setup(Environment::Test);
        let res = call(&state, post_json("/api/auth/credentials", json!({ "email": "a@b.io" }))).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body = json_body(res).await;
        assert_eq!(body["message"], "Password wajib diisi.");
    }

    #[tokio::test]
    async fn session_requires_valid_cookie() {
        let (_dir, state, _) = setup(Environment::Test);

        let res = call(&state, get("/api/auth/session", None)).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(res).await, json!({ "authenticated": false }));

        let res = call(&state, get("/api/auth/session", Some("rakamin_session=forged.token.value"))).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn logout_clears_cookie() {
        let (_dir, state, _) = setup(Environment::Test);
        let res = call(&state, post_json("/api/auth/logout", json!({}))).await;
        assert_eq!(res.status(), StatusCode::OK);
        let set_cookie = res.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
        assert!(set_cookie.starts_with("rakamin_session=;"));
        assert!(set_cookie.contains("Max-Age=0"));
        assert_eq!(json_body(res).await, json!({ "ok": true }));
    }

    #[tokio::test]
    async fn register_email_upserts_user() {
        let (_dir, state, _) = setup(Environment::Test);
        let res = call(&state, post_json("/api/auth/register-email", json!({ "email": "New@Example.com" }))).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        assert_eq!(body["ok"], true);
        assert_eq!(body["user"]["email"], "new@example.com");
        assert!(body["user"]["id"].is_string());

        let res = call(&state, post_json("/api/auth/register-email", json!({}))).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
