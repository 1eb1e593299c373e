use axum::async_trait;
use axum::body::Bytes;
use axum::extract::{FromRequest, FromRequestParts, Path, Query, Request};
use axum::http::header::CONTENT_TYPE;
use axum::http::request::Parts;
use serde::de::DeserializeOwned;

use crate::errors::AppError;

/// JSON body extractor whose rejections use the API error format and name
/// the offending field, e.g. `invalid request body at grade: invalid type`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.starts_with("application/json"))
            .unwrap_or(false);
        if !is_json {
            return Err(AppError::bad_request("expected content-type application/json"));
        }

        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|err| AppError::bad_request(format!("could not read request body: {err}")))?;

        parse(&bytes).map(ApiJson)
    }
}

fn parse<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, AppError> {
    let deserializer = &mut serde_json::Deserializer::from_slice(bytes);
    serde_path_to_error::deserialize(deserializer).map_err(|err| {
        let path = err.path().to_string();
        if path == "." {
            AppError::bad_request(format!("invalid request body: {}", err.inner()))
        } else {
            AppError::bad_request(format!("invalid request body at {}: {}", path, err.inner()))
        }
    })
}

/// Query string extractor with JSON error bodies.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Query::<T>::from_request_parts(parts, state)
            .await
            .map(|Query(value)| ApiQuery(value))
            .map_err(|rejection| AppError::bad_request(format!("invalid query string: {}", rejection.body_text())))
    }
}

/// Path parameter extractor with JSON error bodies.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiPath<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Path::<T>::from_request_parts(parts, state)
            .await
            .map(|Path(value)| ApiPath(value))
            .map_err(|rejection| AppError::bad_request(format!("invalid path parameter: {}", rejection.body_text())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Grade {
        #[allow(dead_code)]
        student_id: i64,
        #[allow(dead_code)]
        grade: i16,
    }

    #[test]
    fn error_names_the_field() {
        let err = parse::<Grade>(br#"{"student_id": 1, "grade": "five"}"#).unwrap_err();
        match err {
            AppError::BadRequest(msg) => assert!(msg.contains("grade"), "{msg}"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn valid_body_parses() {
        assert!(parse::<Grade>(br#"{"student_id": 1, "grade": 5}"#).is_ok());
    }

    #[derive(Debug, Deserialize)]
    struct Page {
        limit: Option<i64>,
    }

    async fn query_of(uri: &str) -> Result<ApiQuery<Page>, AppError> {
        let (mut parts, _) = axum::http::Request::builder().uri(uri).body(()).unwrap().into_parts();
        ApiQuery::<Page>::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn bad_query_value_is_a_bad_request() {
        match query_of("/users?limit=abc").await {
            Err(AppError::BadRequest(msg)) => assert!(msg.starts_with("invalid query string"), "{msg}"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn good_query_parses() {
        let ApiQuery(page) = query_of("/users?limit=5").await.unwrap();
        assert_eq!(page.limit, Some(5));
    }
}
