//! Request type and request inspection helpers.

use bytes::Bytes;
use http::header::{self, HeaderMap};
use std::collections::HashMap;
use std::net::SocketAddr;

/// The HTTP request type seen by route code and middleware.
///
/// The body is collected before dispatch, so stages can inspect it without
/// consuming a stream.
pub type Request = http::Request<Bytes>;

/// Methods the body validation stage accepts.
pub const BODY_METHODS: [http::Method; 3] = [http::Method::POST, http::Method::PUT, http::Method::PATCH];

/// Fallback rate-limit identity when no address is known.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Peer address of the connection, stored as a request extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteAddr(pub SocketAddr);

/// Best-effort client IP.
///
/// Order: first `X-Forwarded-For` entry, `X-Real-IP`, the connection peer,
/// then [`UNKNOWN_CLIENT`].
pub fn client_ip(request: &Request) -> String {
    let headers = request.headers();
    if let Some(first) = header_str(headers, "x-forwarded-for")
        .and_then(|xff| xff.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        return first.to_string();
    }
    if let Some(real_ip) = header_str(headers, "x-real-ip").map(str::trim).filter(|ip| !ip.is_empty()) {
        return real_ip.to_string();
    }
    request
        .extensions()
        .get::<RemoteAddr>()
        .map_or_else(|| UNKNOWN_CLIENT.to_string(), |addr| addr.0.ip().to_string())
}

/// Token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(request: &Request) -> Option<&str> {
    let value = header_str(request.headers(), header::AUTHORIZATION.as_str())?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Decoded query string parameters. Later duplicates win.
pub fn query_params(request: &Request) -> HashMap<String, String> {
    let Some(query) = request.uri().query() else {
        return HashMap::new();
    };
    match serde_urlencoded::from_str::<Vec<(String, String)>>(query) {
        Ok(pairs) => pairs.into_iter().collect(),
        Err(e) => {
            tracing::debug!(query, error = %e, "undecodable query string");
            HashMap::new()
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(headers: &[(&str, &str)]) -> Request {
        let mut builder = http::Request::builder().uri("/api/test?id=5&name=a%20b&q=x+y&flag");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Bytes::new()).unwrap()
    }

    #[test]
    fn test_client_ip_forwarded_first() {
        let req = request(&[
            ("x-forwarded-for", "192.168.1.1, 10.0.0.1"),
            ("x-real-ip", "10.9.9.9"),
        ]);
        assert_eq!(client_ip(&req), "192.168.1.1");
    }

    #[test]
    fn test_client_ip_real_ip() {
        assert_eq!(client_ip(&request(&[("x-real-ip", "10.9.9.9")])), "10.9.9.9");
    }

    #[test]
    fn test_client_ip_peer_then_unknown() {
        let mut req = request(&[]);
        assert_eq!(client_ip(&req), UNKNOWN_CLIENT);

        req.extensions_mut()
            .insert(RemoteAddr("127.0.0.1:4000".parse().unwrap()));
        assert_eq!(client_ip(&req), "127.0.0.1");
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(
            bearer_token(&request(&[("authorization", "Bearer abc.def")])),
            Some("abc.def")
        );
        assert_eq!(
            bearer_token(&request(&[("authorization", "bearer abc")])),
            Some("abc")
        );
        assert_eq!(bearer_token(&request(&[("authorization", "Basic abc")])), None);
        assert_eq!(bearer_token(&request(&[("authorization", "Bearer ")])), None);
        assert_eq!(bearer_token(&request(&[])), None);
    }

    #[test]
    fn test_query_params() {
        let params = query_params(&request(&[]));
        assert_eq!(params["id"], "5");
        assert_eq!(params["name"], "a b");
        assert_eq!(params["q"], "x y");
        assert_eq!(params["flag"], "");
    }

    #[test]
    fn test_query_params_later_duplicate_wins() {
        let req = http::Request::builder()
            .uri("/api/posts?page=1&page=3&title=caf%C3%A9")
            .body(Bytes::new())
            .unwrap();
        let params = query_params(&req);
        assert_eq!(params["page"], "3");
        assert_eq!(params["title"], "café");
        assert!(query_params(&request_without_query()).is_empty());
    }

    fn request_without_query() -> Request {
        http::Request::builder().uri("/api/posts").body(Bytes::new()).unwrap()
    }
}
