//! Credentials-based dashboard authentication.
//!
//! Organizers log in with a configured username/password pair and receive a
//! bearer token. Handlers that mutate events take an [`Actor`] argument, which
//! only extracts when the request carries a live session:
//!
//! ```ignore
//! async fn delete_event(_actor: Actor, Path(slug): Path<String>) -> Result<..., AppError> {
//!     ...
//! }
//! ```

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts, State},
    http::{request::Parts, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use devevent_http::error::AppError;
use devevent_kernel::{InitCtx, Module};
use serde::{Deserialize, Serialize};
use tokio::{sync::Mutex, task::JoinHandle};

pub mod session;

pub use session::{AuthError, Session, SessionStore};

const PURGE_INTERVAL: Duration = Duration::from_secs(60);

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::unauthorized(err.to_string())
    }
}

/// Token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::MissingToken)
}

/// The authenticated organizer behind a request.
#[derive(Debug, Clone, Serialize)]
pub struct Actor {
    pub username: String,
    pub name: Option<String>,
    #[serde(skip)]
    pub token: String,
}

impl<S> FromRequestParts<S> for Actor
where
    Arc<SessionStore>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?.to_string();
        let sessions = Arc::<SessionStore>::from_ref(state);

        let session = sessions
            .resolve(&token)
            .await
            .ok_or(AuthError::InvalidSession)?;

        Ok(Actor {
            username: session.username,
            name: session.name,
            token,
        })
    }
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

/// Core module exposing the login/logout endpoints
pub struct AuthModule {
    sessions: Arc<SessionStore>,
    purge_task: Mutex<Option<JoinHandle<()>>>,
}

impl AuthModule {
    pub fn new(sessions: Arc<SessionStore>) -> Self {
        Self {
            sessions,
            purge_task: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Module for AuthModule {
    fn name(&self) -> &'static str {
        "auth"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            users = ctx.settings.auth.users.len(),
            session_ttl_secs = ctx.settings.auth.session_ttl_secs,
            "auth module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/login", post(login))
            .route("/logout", post(logout))
            .route("/session", get(current_session))
            .with_state(self.sessions.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(serde_json::json!({
            "paths": {
                "/login": {
                    "post": {
                        "summary": "Log in with dashboard credentials",
                        "tags": ["Auth"],
                        "responses": {
                            "200": { "description": "Session opened" },
                            "401": { "description": "Invalid credentials" }
                        }
                    }
                },
                "/logout": {
                    "post": {
                        "summary": "Close the current session",
                        "tags": ["Auth"],
                        "responses": {
                            "204": { "description": "Session closed" },
                            "401": { "description": "No live session" }
                        }
                    }
                },
                "/session": {
                    "get": {
                        "summary": "Describe the current session",
                        "tags": ["Auth"],
                        "responses": {
                            "200": { "description": "Authenticated actor" },
                            "401": { "description": "No live session" }
                        }
                    }
                }
            }
        }))
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        let sessions = self.sessions.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(PURGE_INTERVAL);
            loop {
                ticker.tick().await;
                let purged = sessions.purge_expired().await;
                if purged > 0 {
                    tracing::debug!(purged, "expired sessions purged");
                }
            }
        });

        *self.purge_task.lock().await = Some(handle);
        tracing::info!(module = self.name(), "auth module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        if let Some(handle) = self.purge_task.lock().await.take() {
            handle.abort();
        }
        tracing::info!(module = self.name(), "auth module stopped");
        Ok(())
    }
}

async fn login(
    State(sessions): State<Arc<SessionStore>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<Session>, AppError> {
    let session = sessions
        .login(&request.username, &request.password)
        .await
        .inspect_err(|_| tracing::warn!(username = %request.username, "login rejected"))?;

    Ok(Json(session))
}

async fn logout(
    State(sessions): State<Arc<SessionStore>>,
    actor: Actor,
) -> StatusCode {
    sessions.logout(&actor.token).await;
    tracing::info!(username = %actor.username, "session closed");
    StatusCode::NO_CONTENT
}

async fn current_session(actor: Actor) -> Json<Actor> {
    Json(actor)
}

/// Create the auth module around a shared session store
pub fn create_module(sessions: Arc<SessionStore>) -> Arc<dyn Module> {
    Arc::new(AuthModule::new(sessions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::Request,
    };
    use devevent_kernel::settings::{AuthSettings, UserCredentials};
    use tower::ServiceExt;

    fn module() -> AuthModule {
        let settings = AuthSettings {
            session_ttl_secs: 3600,
            users: vec![UserCredentials {
                username: "bob".to_string(),
                password: "hunter2".to_string(),
                name: None,
            }],
        };
        AuthModule::new(Arc::new(SessionStore::new(&settings)))
    }

    fn login_request(password: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/login")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::json!({"username": "bob", "password": password}).to_string(),
            ))
            .unwrap()
    }

    #[test]
    fn bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), Err(AuthError::MissingToken));

        headers.insert("authorization", "Basic abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), Err(AuthError::MissingToken));

        headers.insert("authorization", "Bearer abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), Ok("abc"));
    }

    #[tokio::test]
    async fn login_then_session_roundtrip() {
        let router = module().routes();

        let response = router.clone().oneshot(login_request("hunter2")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let session: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let token = session["token"].as_str().unwrap().to_string();

        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/session")
                    .header("authorization", format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/logout")
                    .header("authorization", format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/session")
                    .header("authorization", format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn bad_credentials_are_unauthorized() {
        let response = module()
            .routes()
            .oneshot(login_request("wrong"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn start_and_stop_manage_purge_task() {
        let module = module();
        let settings = devevent_kernel::settings::Settings::default();
        let db = devevent_db::Database::in_memory().await.unwrap();
        let ctx = InitCtx {
            settings: &settings,
            db: &db,
        };

        module.start(&ctx).await.unwrap();
        assert!(module.purge_task.lock().await.is_some());
        module.stop().await.unwrap();
        assert!(module.purge_task.lock().await.is_none());
    }
}
