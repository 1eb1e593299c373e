use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use axum::http::Method;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use sqlx::SqlitePool;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::audit::{start_audit_listener, AuditRecorder};
use crate::authz::identity::authenticate;
use crate::authz::{Authorizer, RequirePermission};
use crate::config::{port_from_env, request_timeout_from_env, AppConfig};
use crate::docs;
use crate::errors::AppError;
use crate::jwt::JwtConfig;
use crate::routes::{
    academic_years, attendances, audit_logs, auth, curricula, disciplines, grade_journals, health, permissions,
    role_permissions, roles, semesters, student_groups, students, teachers, user_roles, users,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub authorizer: Arc<Authorizer>,
    pub audit: AuditRecorder,
}

impl AppState {
    pub fn new(pool: SqlitePool, jwt: JwtConfig, authorizer: Authorizer, audit: AuditRecorder) -> Self {
        Self {
            pool,
            jwt: Arc::new(jwt),
            authorizer: Arc::new(authorizer),
            audit,
        }
    }

    /// Gate for a single route: `get(handler.layer(state.require(..)))`.
    pub fn require(&self, permission: &'static str) -> RequirePermission {
        RequirePermission::new(self.authorizer.clone(), permission)
    }
}

/// Production wiring: SQLite-backed authorizer, audit listener, settings
/// from the environment.
pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let jwt = JwtConfig::from_env()?;
    wire(pool, jwt, request_timeout_from_env()?, port_from_env()?)
}

pub async fn create_app_with_config(pool: SqlitePool, config: &AppConfig) -> Result<Router, AppError> {
    wire(pool, config.jwt.clone(), config.request_timeout, config.port)
}

fn wire(pool: SqlitePool, jwt: JwtConfig, timeout: Duration, port: u16) -> Result<Router, AppError> {
    let (audit, audit_rx) = AuditRecorder::new();
    tokio::spawn(start_audit_listener(audit_rx, pool.clone()));

    let authorizer = Authorizer::sqlite(pool.clone());
    let state = AppState::new(pool, jwt, authorizer, audit);

    build_router(state, timeout, port)
}

/// Assembles the router around an already-built state. Tests use this to
/// inject fake role lookups.
pub fn build_router(state: AppState, timeout: Duration, port: u16) -> Result<Router, AppError> {
    let public = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let protected = Router::new()
        .route("/me", get(auth::me))
        .merge(users::routes(&state))
        .merge(teachers::routes(&state))
        .merge(students::routes(&state))
        .merge(student_groups::routes(&state))
        .merge(permissions::routes(&state))
        .merge(roles::routes(&state))
        .merge(user_roles::routes(&state))
        .merge(role_permissions::routes(&state))
        .merge(curricula::routes(&state))
        .merge(grade_journals::routes(&state))
        .merge(attendances::routes(&state))
        .merge(semesters::routes(&state))
        .merge(disciplines::routes(&state))
        .merge(academic_years::routes(&state))
        .merge(audit_logs::routes(&state))
        .route_layer(middleware::from_fn_with_state(state.jwt.clone(), authenticate));

    let openapi = docs::build_openapi(port)?;

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(AnyOrigin)
        .allow_headers(AnyOrigin);

    let router = Router::new()
        .route("/api/health", get(health::health))
        .nest("/api/v1", public.merge(protected))
        .merge(docs::openapi_routes(openapi)?)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(CatchPanicLayer::custom(panic_response))
                .layer(TimeoutLayer::new(timeout))
                .layer(cors),
        );

    Ok(router)
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    AppError::internal(format!("handler panicked: {detail}")).into_response()
}
