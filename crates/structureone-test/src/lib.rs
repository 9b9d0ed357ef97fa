//! # StructureOne Test
//!
//! In-memory testing for StructureOne applications. Requests go straight to a
//! [`Dispatcher`](structureone_server::Dispatcher), through route resolution,
//! the route's middleware and the response formatter, without binding a port.
//!
//! ## Example
//!
//! ```ignore
//! use structureone_test::TestClient;
//! use serde_json::json;
//!
//! #[tokio::test]
//! async fn test_create_post() {
//!     let client = TestClient::new(dispatcher);
//!
//!     let response = client
//!         .post("/api/posts")
//!         .bearer_token(&token)
//!         .json(&json!({"title": "Hello", "content": "World"}))
//!         .send()
//!         .await;
//!
//!     response.assert_status_code(201);
//!     assert_eq!(response.json_value().unwrap()["post"]["title"], "Hello");
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/structureone-test/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod error;
mod request;
mod response;

pub use client::{TestClient, TestClientRequest};
pub use error::TestError;
pub use request::TestRequestBuilder;
pub use response::TestResponse;
