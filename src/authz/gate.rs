use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use tower::{Layer, Service};

use super::evaluator::{Authorizer, Decision};
use crate::errors::AppError;
use crate::jwt::Claims;

/// Route layer that lets a request through only when the caller holds
/// `permission`.
///
/// Must sit behind [`authenticate`](super::identity::authenticate); without
/// claims in the request extensions the request is answered with 401.
///
/// ```ignore
/// get(users::list_users.layer(RequirePermission::new(authz, permissions::USER_LIST)))
/// ```
#[derive(Clone)]
pub struct RequirePermission {
    authorizer: Arc<Authorizer>,
    permission: &'static str,
}

impl RequirePermission {
    pub fn new(authorizer: Arc<Authorizer>, permission: &'static str) -> Self {
        Self { authorizer, permission }
    }
}

impl<S> Layer<S> for RequirePermission {
    type Service = PermissionGate<S>;

    fn layer(&self, inner: S) -> Self::Service {
        PermissionGate {
            inner,
            authorizer: self.authorizer.clone(),
            permission: self.permission,
        }
    }
}

#[derive(Clone)]
pub struct PermissionGate<S> {
    inner: S,
    authorizer: Arc<Authorizer>,
    permission: &'static str,
}

impl<S> Service<Request<Body>> for PermissionGate<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        // The clone is not ready; keep the one poll_ready was called on.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let authorizer = self.authorizer.clone();
        let permission = self.permission;

        Box::pin(async move {
            let Some(subject_id) = req.extensions().get::<Claims>().map(|claims| claims.sub) else {
                tracing::debug!(permission, "no identity on request");
                return Ok(AppError::unauthorized("unauthorized").into_response());
            };

            match authorizer.decide(subject_id, permission).await {
                Ok(Decision::Allowed) => inner.call(req).await,
                Ok(Decision::Denied) => {
                    tracing::info!(user_id = subject_id, permission, "access denied");
                    Ok(AppError::forbidden("permission denied").into_response())
                }
                Err(err) => {
                    tracing::error!(user_id = subject_id, permission, error = %err, "permission lookup failed");
                    Ok(AppError::internal("internal error").into_response())
                }
            }
        })
    }
}
