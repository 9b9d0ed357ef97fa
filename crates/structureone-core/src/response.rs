//! Response formatting.
//!
//! [`ResponseFormatter::format`] maps a status code, an optional message and
//! optional data to an [`ApiResponse`]. Data is merged into the top level of
//! the envelope rather than nested:
//!
//! ```json
//! { "status": "success", "message": "Resource created successfully.", "id": 5 }
//! ```

use crate::error::{ApiError, ApiResult};
use crate::status::{self, Category, StatusInfo};
use bytes::Bytes;
use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use http::StatusCode;
use serde_json::{Map, Value};

/// Envelope keys that merged data may not override.
const RESERVED_KEYS: [&str; 2] = ["status", "message"];

/// A formatted API response, ready to be written to the wire.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    category: Category,
    message: String,
    data: Map<String, Value>,
    headers: HeaderMap,
}

impl ApiResponse {
    /// Creates a response for a recognized status with its default message.
    pub fn new(status: u16) -> ApiResult<Self> {
        ResponseFormatter::format(status, None, None)
    }

    /// Creates a `200` response with a custom message.
    #[must_use]
    pub fn ok(message: impl Into<String>) -> Self {
        Self::from_info(ResponseFormatter::info(StatusCode::OK), Some(message.into()))
    }

    /// Creates a `201` response with the default message.
    #[must_use]
    pub fn created() -> Self {
        Self::from_info(ResponseFormatter::info(StatusCode::CREATED), None)
    }

    fn from_info(info: StatusInfo, message: Option<String>) -> Self {
        Self {
            status: StatusCode::from_u16(info.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            category: info.category,
            message: message.unwrap_or_else(|| info.default_message.to_string()),
            data: Map::new(),
            headers: HeaderMap::new(),
        }
    }

    /// Replaces the message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Adds a single top-level field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Merges every entry of `data` into the top level.
    #[must_use]
    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data.extend(data);
        self
    }

    /// Adds a response header, replacing any previous value.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Returns the HTTP status.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the envelope category.
    pub fn category(&self) -> Category {
        self.category
    }

    /// Returns the envelope message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the merged data.
    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    /// Returns the response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the response headers for modification.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Builds the JSON body.
    ///
    /// `status` and `message` come first. Data keys colliding with them are
    /// dropped.
    pub fn to_body(&self) -> Value {
        let mut body = Map::with_capacity(self.data.len() + 2);
        body.insert("status".into(), Value::from(self.category.as_str()));
        body.insert("message".into(), Value::from(self.message.as_str()));
        for (key, value) in &self.data {
            if RESERVED_KEYS.contains(&key.as_str()) {
                tracing::warn!(field = %key, "response data collides with envelope key, dropped");
                continue;
            }
            body.insert(key.clone(), value.clone());
        }
        Value::Object(body)
    }

    /// Converts into an HTTP response with a pretty-printed JSON body.
    ///
    /// `204` and `304` are sent without a body.
    pub fn into_http(self) -> http::Response<Bytes> {
        let body = if matches!(
            self.status,
            StatusCode::NO_CONTENT | StatusCode::NOT_MODIFIED
        ) {
            Bytes::new()
        } else {
            serde_json::to_vec_pretty(&self.to_body())
                .map(Bytes::from)
                .unwrap_or_default()
        };

        let mut response = http::Response::new(body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        response
    }
}

/// Maps status codes and errors to [`ApiResponse`] values.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseFormatter;

impl ResponseFormatter {
    /// Formats a response.
    ///
    /// `data`, when given, must be a JSON object; its entries are merged into
    /// the top level of the envelope. A status outside the table is an
    /// [`ApiError::UnknownStatus`].
    ///
    /// ```
    /// use serde_json::json;
    /// use structureone_core::ResponseFormatter;
    ///
    /// let response = ResponseFormatter::format(201, None, Some(json!({"id": 5}))).unwrap();
    /// assert_eq!(
    ///     response.to_body(),
    ///     json!({"status": "success", "message": "Resource created successfully.", "id": 5})
    /// );
    /// ```
    pub fn format(status: u16, message: Option<String>, data: Option<Value>) -> ApiResult<ApiResponse> {
        let info = status::lookup(status).ok_or(ApiError::UnknownStatus { status })?;
        let response = ApiResponse::from_info(info, message);
        match data {
            None | Some(Value::Null) => Ok(response),
            Some(Value::Object(map)) => Ok(response.with_data(map)),
            Some(other) => Err(ApiError::internal(format!(
                "response data must be a JSON object, got {}",
                json_type(&other)
            ))),
        }
    }

    /// Renders an error as a response.
    ///
    /// Diagnostic detail for server-side failures (message, origin module,
    /// location, loaded modules) is only included when `debug` is set.
    pub fn render_error(err: &ApiError, debug: bool) -> ApiResponse {
        let info = match status::lookup(err.status_code().as_u16()) {
            Some(info) => info,
            None => return Self::unknown_status(err.status_code().as_u16(), debug),
        };
        let generic = || ApiResponse::from_info(info, None);

        match err {
            ApiError::RouteNotFound { route, .. } | ApiError::HandlerMissing { route } => {
                ApiResponse::from_info(info, Some(err.to_string()))
                    .with_field("requested_route", route.as_str())
            }
            ApiError::HandlerLoad {
                route,
                module,
                loaded,
                message,
            } => {
                let response = generic().with_field("requested_route", route.as_str());
                if debug {
                    response
                        .with_message(err.to_string())
                        .with_field("error", message.as_str())
                        .with_field("origin", module.as_str())
                        .with_field("loaded_modules", loaded.clone())
                } else {
                    response
                }
            }
            ApiError::AuthMissing => ApiResponse::from_info(info, Some(err.to_string())),
            ApiError::AuthInvalid { reason } => {
                let response = ApiResponse::from_info(info, Some("Invalid token".into()));
                if debug {
                    response.with_field("reason", reason.to_string())
                } else {
                    response
                }
            }
            ApiError::Forbidden { message } => ApiResponse::from_info(info, Some(message.clone())),
            ApiError::BadRequest {
                message,
                missing_fields,
            } => {
                let response = ApiResponse::from_info(info, Some(message.clone()));
                if missing_fields.is_empty() {
                    response
                } else {
                    response.with_field("missing_fields", missing_fields.clone())
                }
            }
            ApiError::MethodNotAllowed { allowed, .. } => {
                let response = ApiResponse::from_info(info, Some(err.to_string()))
                    .with_field("allowed_methods", allowed.clone());
                match HeaderValue::from_str(&allowed.join(", ")) {
                    Ok(value) => response.with_header(header::ALLOW, value),
                    Err(_) => response,
                }
            }
            ApiError::RateLimited { retry_after } => generic()
                .with_field("retry_after", *retry_after)
                .with_header(header::RETRY_AFTER, HeaderValue::from(*retry_after)),
            ApiError::Status { message, .. } => ApiResponse::from_info(info, message.clone()),
            ApiError::UnknownStatus { status } => Self::unknown_status(*status, debug),
            ApiError::Internal {
                message,
                origin,
                location,
            } => {
                if debug {
                    let mut response = generic()
                        .with_message(err.to_string())
                        .with_field("error", message.as_str());
                    if let Some(origin) = origin {
                        response = response.with_field("origin", origin.as_str());
                    }
                    if let Some(location) = location {
                        response = response.with_field("location", location.as_str());
                    }
                    response
                } else {
                    generic()
                }
            }
        }
    }

    fn unknown_status(status: u16, debug: bool) -> ApiResponse {
        let response = ApiResponse::from_info(
            Self::info(StatusCode::INTERNAL_SERVER_ERROR),
            Some(format!("Unrecognized response status {status}")),
        );
        if debug {
            response.with_field("requested_status", status)
        } else {
            response
        }
    }

    fn info(status: StatusCode) -> StatusInfo {
        status::lookup(status.as_u16()).unwrap_or(StatusInfo {
            code: status.as_u16(),
            category: Category::Error,
            default_message: "",
        })
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
