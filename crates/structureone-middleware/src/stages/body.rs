//! JSON body stage.

use crate::context::MiddlewareContext;
use crate::middleware::{Middleware, Next};
use crate::pipeline::Stage;
use crate::types::{Request, BODY_METHODS};
use serde_json::{Map, Value};
use structureone_core::{ApiError, ApiResult, BoxFuture};

/// Parses the JSON object body, checks required fields and fills defaults.
///
/// Only `POST`, `PUT` and `PATCH` carry a body; other methods are rejected
/// with 405. An empty body is read as `{}`.
#[derive(Debug, Clone)]
pub struct BodyMiddleware {
    required: Vec<String>,
    optional: Map<String, Value>,
}

impl BodyMiddleware {
    /// Creates the stage.
    #[must_use]
    pub fn new(required: Vec<String>, optional: Map<String, Value>) -> Self {
        Self { required, optional }
    }

    fn parse(body: &[u8]) -> ApiResult<Map<String, Value>> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Map::new());
        }
        match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(ApiError::bad_request("Request body must be a JSON object")),
            Err(err) => Err(ApiError::bad_request(format!("Invalid JSON: {err}"))),
        }
    }

    fn missing(&self, data: &Map<String, Value>) -> Vec<String> {
        self.required
            .iter()
            .filter(|field| data.get(field.as_str()).map_or(true, is_empty))
            .cloned()
            .collect()
    }
}

/// Null, blank strings and empty containers count as absent.
fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

impl Middleware for BodyMiddleware {
    fn stage(&self) -> Stage {
        Stage::Body
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: &'a Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, ApiResult<()>> {
        Box::pin(async move {
            if !BODY_METHODS.contains(request.method()) {
                return Err(ApiError::method_not_allowed(
                    request.method().as_str(),
                    &["POST", "PUT", "PATCH"],
                ));
            }

            let mut data = Self::parse(request.body())?;
            let missing = self.missing(&data);
            if !missing.is_empty() {
                return Err(ApiError::missing_fields(missing));
            }

            for (field, default) in &self.optional {
                let slot = data.entry(field.clone()).or_insert(Value::Null);
                if slot.is_null() {
                    *slot = default.clone();
                }
            }

            ctx.set_data(data);
            next.run(ctx, request).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Pipeline;
    use bytes::Bytes;
    use serde_json::json;
    use structureone_core::ErrorKind;

    fn stage() -> BodyMiddleware {
        let mut optional = Map::new();
        optional.insert("tags".into(), json!([]));
        BodyMiddleware::new(vec!["title".into()], optional)
    }

    async fn run(method: &str, body: &'static str) -> ApiResult<Map<String, Value>> {
        let pipeline = Pipeline::builder().stage(stage()).build();
        let request = http::Request::builder()
            .method(method)
            .uri("/api/posts")
            .body(Bytes::from_static(body.as_bytes()))
            .unwrap();
        let mut ctx = MiddlewareContext::new();
        pipeline.run(&mut ctx, &request).await.map(|out| out.data)
    }

    #[test]
    fn test_is_empty() {
        assert!(is_empty(&json!(null)));
        assert!(is_empty(&json!("  ")));
        assert!(is_empty(&json!([])));
        assert!(is_empty(&json!({})));
        assert!(!is_empty(&json!(0)));
        assert!(!is_empty(&json!(false)));
        assert!(!is_empty(&json!("x")));
    }

    #[tokio::test]
    async fn test_rejects_get() {
        let err = run("GET", "").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MethodNotAllowed);
    }

    #[tokio::test]
    async fn test_invalid_json() {
        let err = run("POST", "{not json").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
        assert!(err.to_string().contains("Invalid JSON"));

        let err = run("POST", "[1, 2]").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
    }

    #[tokio::test]
    async fn test_empty_body_reports_missing_fields() {
        let err = run("PUT", "").await.unwrap_err();
        match err {
            ApiError::BadRequest { missing_fields, .. } => assert_eq!(missing_fields, ["title"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_blank_required_field_is_missing() {
        let err = run("POST", r#"{"title": "   "}"#).await.unwrap_err();
        assert_eq!(err.to_string(), "Bad request: Missing required fields: title");
    }

    #[tokio::test]
    async fn test_fills_defaults() {
        let data = run("PATCH", r#"{"title": "a", "extra": 1}"#).await.unwrap();
        assert_eq!(data["tags"], json!([]));
        assert_eq!(data["extra"], 1);

        let data = run("POST", r#"{"title": "a", "tags": ["x"]}"#).await.unwrap();
        assert_eq!(data["tags"], json!(["x"]));
    }
}
