//! Test request building.

use crate::error::TestError;
use bytes::Bytes;
use http::{header, HeaderMap, HeaderName, HeaderValue, Method, Uri};
use serde::Serialize;
use std::net::SocketAddr;
use structureone_middleware::{RemoteAddr, Request};

/// Builder for requests handed to a [`TestClient`](crate::TestClient).
///
/// Invalid headers and bodies are recorded and reported by [`build`](Self::build)
/// so the builder chain itself never fails.
#[must_use]
#[derive(Debug)]
pub struct TestRequestBuilder {
    method: Method,
    uri: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    body: Option<Bytes>,
    remote_addr: Option<SocketAddr>,
    error: Option<TestError>,
}

impl TestRequestBuilder {
    /// Creates a request builder.
    pub fn new(method: Method, uri: impl AsRef<str>) -> Self {
        Self {
            method,
            uri: uri.as_ref().to_string(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
            remote_addr: None,
            error: None,
        }
    }

    /// Sets a header.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        let name = name.as_ref();
        match (
            HeaderName::try_from(name),
            HeaderValue::try_from(value.as_ref()),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => self.fail(TestError::InvalidHeader(name.to_string())),
        }
        self
    }

    /// Sets the `Content-Type` header.
    pub fn content_type(self, content_type: impl AsRef<str>) -> Self {
        self.header(header::CONTENT_TYPE.as_str(), content_type)
    }

    /// Sets the `Authorization` header with a bearer token.
    pub fn bearer_token(self, token: impl AsRef<str>) -> Self {
        self.header(header::AUTHORIZATION.as_str(), format!("Bearer {}", token.as_ref()))
    }

    /// Appends a percent-encoded query parameter.
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Sets the peer address the request appears to come from.
    pub fn remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    /// Sets the raw body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets a JSON body and `Content-Type: application/json`.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(bytes) => self.body = Some(Bytes::from(bytes)),
            Err(e) => self.fail(TestError::Json(e)),
        }
        self.content_type("application/json")
    }

    /// Builds the request.
    pub fn build(self) -> Result<Request, TestError> {
        if let Some(err) = self.error {
            return Err(err);
        }

        let uri: Uri = with_query(&self.uri, &self.query)
            .parse()
            .map_err(|e| TestError::RequestBuild(format!("Invalid URI: {e}")))?;

        let mut request = http::Request::builder()
            .method(self.method)
            .uri(uri)
            .body(self.body.unwrap_or_default())
            .map_err(|e| TestError::RequestBuild(e.to_string()))?;
        *request.headers_mut() = self.headers;
        if let Some(addr) = self.remote_addr {
            request.extensions_mut().insert(RemoteAddr(addr));
        }
        Ok(request)
    }

    fn fail(&mut self, err: TestError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }
}

fn with_query(uri: &str, query: &[(String, String)]) -> String {
    if query.is_empty() {
        return uri.to_string();
    }
    let encoded = query
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    let separator = if uri.contains('?') { '&' } else { '?' };
    format!("{uri}{separator}{encoded}")
}
