//! Drop-in replacements for axum's `Json`, `Query` and `Path`.
//!
//! axum rejects malformed input with a `text/plain` body (and 422 for JSON that parses but
//! does not fit the type). These wrappers turn every rejection into [`Error::BadRequest`], so
//! clients always get a 400 with the usual `{"error": ...}` body.

use axum::{
    extract::{FromRequest, FromRequestParts, Request},
    http::request::Parts,
    response::{IntoResponse, Response},
};
use serde::{Serialize, de::DeserializeOwned};

use crate::errors::Error;

/// JSON request body or response.
#[derive(Debug, Clone)]
pub struct Json<T>(pub T);

impl<T, S> FromRequest<S> for Json<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let axum::Json(value) = axum::Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

/// Query string parameters.
#[derive(Debug, Clone)]
pub struct Query<T>(pub T);

impl<T, S> FromRequestParts<S> for Query<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let axum::extract::Query(value) = axum::extract::Query::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

/// Path parameters.
#[derive(Debug, Clone)]
pub struct Path<T>(pub T);

impl<T, S> FromRequestParts<S> for Path<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let axum::extract::Path(value) = axum::extract::Path::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Router,
        http::StatusCode,
        routing::{get, post},
    };
    use axum_test::TestServer;
    use serde::Deserialize;
    use serde_json::{Value, json};

    #[derive(Debug, Deserialize, Serialize)]
    struct Point {
        x: i32,
        y: i32,
    }

    #[derive(Debug, Deserialize)]
    struct Paging {
        page: Option<u32>,
    }

    async fn echo(Query(paging): Query<Paging>, Json(point): Json<Point>) -> Json<Value> {
        Json(json!({ "page": paging.page, "sum": point.x + point.y }))
    }

    async fn by_id(Path(id): Path<i64>) -> Json<i64> {
        Json(id)
    }

    fn server() -> TestServer {
        let router = Router::new()
            .route("/echo", post(echo))
            .route("/items/{id}", get(by_id));
        TestServer::new(router).expect("Failed to create test server")
    }

    #[tokio::test]
    async fn test_valid_input_passes_through() {
        let server = server();
        let response = server.post("/echo?page=2").json(&json!({ "x": 1, "y": 2 })).await;
        response.assert_status_ok();
        response.assert_json(&json!({ "page": 2, "sum": 3 }));

        server.get("/items/7").await.assert_json(&json!(7));
    }

    #[tokio::test]
    async fn test_rejections_become_json_bad_requests() {
        let server = server();

        let response = server.post("/echo").json(&json!({ "x": 1 })).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(response.json::<Value>()["error"].as_str().unwrap().contains("missing field `y`"));

        let response = server.post("/echo?page=abc").json(&json!({ "x": 1, "y": 2 })).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(response.json::<Value>()["error"].is_string());

        let response = server.post("/echo").text("x=1").await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let response = server.get("/items/abc").await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(response.json::<Value>()["error"].is_string());
    }
}
