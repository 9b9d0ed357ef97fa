//! In-memory test client.

use crate::error::TestError;
use crate::request::TestRequestBuilder;
use crate::response::TestResponse;
use bytes::Bytes;
use http::Method;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use structureone_server::Dispatcher;

/// Sends requests straight to a [`Dispatcher`] without binding a port.
///
/// ```ignore
/// let client = TestClient::new(dispatcher);
/// let response = client.get("/api/test").send().await;
/// response.assert_status_code(200);
/// ```
#[must_use]
#[derive(Debug, Clone)]
pub struct TestClient {
    dispatcher: Arc<Dispatcher>,
    default_headers: Vec<(String, String)>,
}

impl TestClient {
    /// Creates a client over a dispatcher.
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            default_headers: Vec::new(),
        }
    }

    /// Adds a header sent with every request.
    pub fn with_default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// The dispatcher requests go to.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Creates a GET request.
    pub fn get(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::GET, uri)
    }

    /// Creates a POST request.
    pub fn post(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::POST, uri)
    }

    /// Creates a PUT request.
    pub fn put(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::PUT, uri)
    }

    /// Creates a PATCH request.
    pub fn patch(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::PATCH, uri)
    }

    /// Creates a DELETE request.
    pub fn delete(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::DELETE, uri)
    }

    /// Creates an OPTIONS request.
    pub fn options(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::OPTIONS, uri)
    }

    /// Creates a request with any method.
    pub fn request(&self, method: Method, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        let mut builder = TestRequestBuilder::new(method, uri);
        for (name, value) in &self.default_headers {
            builder = builder.header(name, value);
        }
        TestClientRequest {
            client: self,
            builder,
        }
    }
}

/// A request builder bound to a [`TestClient`].
#[must_use]
#[derive(Debug)]
pub struct TestClientRequest<'a> {
    client: &'a TestClient,
    builder: TestRequestBuilder,
}

impl TestClientRequest<'_> {
    /// Sets a header.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.builder = self.builder.header(name, value);
        self
    }

    /// Sets the `Authorization` header with a bearer token.
    pub fn bearer_token(mut self, token: impl AsRef<str>) -> Self {
        self.builder = self.builder.bearer_token(token);
        self
    }

    /// Appends a query parameter.
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.builder = self.builder.query(name, value);
        self
    }

    /// Sets the peer address.
    pub fn remote_addr(mut self, addr: SocketAddr) -> Self {
        self.builder = self.builder.remote_addr(addr);
        self
    }

    /// Sets the raw body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.builder = self.builder.body(body);
        self
    }

    /// Sets a JSON body.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        self.builder = self.builder.json(value);
        self
    }

    /// Dispatches the request.
    ///
    /// # Panics
    ///
    /// Panics if the request could not be built.
    pub async fn send(self) -> TestResponse {
        match self.try_send().await {
            Ok(response) => response,
            Err(e) => panic!("test request failed: {e}"),
        }
    }

    /// Dispatches the request, reporting build errors.
    pub async fn try_send(self) -> Result<TestResponse, TestError> {
        let request = self.builder.build()?;
        let response = self.client.dispatcher.dispatch(request).await;
        Ok(TestResponse::from_http(response))
    }
}
