//! JSON body encoding shared by every resource.
//!
//! Output omits `null` object fields; input ignores fields the target type does
//! not declare. The provider attaches itself to the dispatch router as an axum
//! `Extension<Arc<JsonProvider>>`.
use std::sync::Arc;

use axum::{
    Extension, Router,
    body::Body,
    http::{StatusCode, header},
    response::Response,
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::ports::Provider;

#[derive(Debug, Clone)]
pub struct JsonProvider {
    omit_nulls: bool,
}

impl JsonProvider {
    pub fn new() -> Self {
        Self { omit_nulls: true }
    }

    pub fn to_vec<T: Serialize + ?Sized>(&self, value: &T) -> serde_json::Result<Vec<u8>> {
        let mut tree = serde_json::to_value(value)?;
        if self.omit_nulls {
            strip_null_fields(&mut tree);
        }
        serde_json::to_vec(&tree)
    }

    pub fn from_slice<T: DeserializeOwned>(&self, bytes: &[u8]) -> serde_json::Result<T> {
        serde_json::from_slice(bytes)
    }

    /// Build a JSON response; a value that cannot be encoded becomes a 500.
    pub fn respond<T: Serialize + ?Sized>(&self, status: StatusCode, value: &T) -> Response {
        match self.to_vec(value) {
            Ok(bytes) => Response::builder()
                .status(status)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(bytes))
                .unwrap_or_else(|_| Response::new(Body::empty())),
            Err(e) => {
                tracing::error!("Failed to encode JSON response: {}", e);
                let mut response = Response::new(Body::from("Internal Server Error"));
                *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                response
            }
        }
    }
}

impl Default for JsonProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider for JsonProvider {
    fn name(&self) -> &str {
        "json"
    }

    fn attach(self: Arc<Self>, router: Router) -> Router {
        router.layer(Extension(self))
    }
}

// Only object members are dropped; nulls inside arrays are data.
fn strip_null_fields(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|_, v| !v.is_null());
            map.values_mut().for_each(strip_null_fields);
        }
        Value::Array(items) => items.iter_mut().for_each(strip_null_fields),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use axum::routing::get;
    use serde::Deserialize;
    use tower::ServiceExt;

    use super::*;

    #[derive(Serialize)]
    struct Status {
        name: &'static str,
        detail: Option<String>,
        nested: Nested,
        samples: Vec<Option<u8>>,
    }

    #[derive(Serialize)]
    struct Nested {
        note: Option<String>,
        level: u8,
    }

    #[test]
    fn test_null_fields_omitted() {
        let json = JsonProvider::new();
        let bytes = json
            .to_vec(&Status {
                name: "up",
                detail: None,
                nested: Nested {
                    note: None,
                    level: 3,
                },
                samples: vec![Some(1), None],
            })
            .unwrap();

        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text, r#"{"name":"up","nested":{"level":3},"samples":[1,null]}"#);
    }

    #[derive(Serialize)]
    struct Release {
        version: &'static str,
        channel: Option<&'static str>,
        build: u32,
        author: &'static str,
    }

    #[test]
    fn test_fields_keep_declaration_order() {
        let bytes = JsonProvider::new()
            .to_vec(&Release {
                version: "1.2.0",
                channel: None,
                build: 42,
                author: "ci",
            })
            .unwrap();

        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"version":"1.2.0","build":42,"author":"ci"}"#
        );
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Request {
        id: u32,
    }

    #[test]
    fn test_unknown_fields_tolerated() {
        let json = JsonProvider::new();
        let parsed: Request = json.from_slice(br#"{"id":7,"extra":"ignored"}"#).unwrap();
        assert_eq!(parsed, Request { id: 7 });
    }

    #[tokio::test]
    async fn test_attached_as_extension() {
        let router = Router::new().route(
            "/",
            get(|Extension(json): Extension<Arc<JsonProvider>>| async move {
                json.respond(StatusCode::CREATED, &serde_json::json!({"ok": true, "none": null}))
            }),
        );
        let router = Arc::new(JsonProvider::new()).attach(router);

        let response = router
            .oneshot(
                axum::http::Request::builder()
                    .uri("/")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], br#"{"ok":true}"#);
    }
}
