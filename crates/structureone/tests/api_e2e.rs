//! End-to-end tests: bundled routes driven through the in-memory client.

use std::sync::Arc;

use serde_json::{json, Value};
use structureone::config::AppConfig;
use structureone::core::{Claims, TokenService};
use structureone_test::{TestClient, TestResponse};

const SECRET: &str = "e2e-secret";

fn config(debug: bool) -> AppConfig {
    let mut config = AppConfig::default();
    config.token.secret = SECRET.into();
    config.app.debug = debug;
    config
}

fn client_with(config: &AppConfig) -> TestClient {
    let dispatcher = structureone::build_dispatcher(config).unwrap();
    TestClient::new(Arc::new(dispatcher))
}

fn client() -> TestClient {
    client_with(&config(false))
}

fn token(claims: Value) -> String {
    let claims: Claims = claims.as_object().cloned().unwrap();
    TokenService::new(SECRET, 3600).generate(&claims).unwrap()
}

fn body(response: &TestResponse) -> Value {
    response.json_value().unwrap()
}

#[tokio::test]
async fn test_welcome_on_unrouted_path() {
    let response = client().get("/").send().await;
    response
        .assert_status_code(200)
        .assert_message("API System is running")
        .assert_header("content-type", "application/json")
        .assert_header("access-control-allow-origin", "*");
    assert_eq!(body(&response)["usage"], "Access routes via /api/{route_name}");
}

#[tokio::test]
async fn test_options_preflight_has_no_body() {
    let response = client().options("/api/posts").send().await;
    response
        .assert_status_code(204)
        .assert_header("access-control-allow-methods", "GET, POST, OPTIONS");
    assert!(response.body().is_empty());
}

#[tokio::test]
async fn test_unknown_route() {
    let response = client().get("/api/nothing_here").send().await;
    response.assert_status_code(404);
    let body = body(&response);
    assert_eq!(body["status"], "error");
    assert_eq!(body["requested_route"], "nothing_here");
}

#[tokio::test]
async fn test_token_issue_then_validate() {
    let client = client();

    let issued = client.get("/api/test").query("id", "42").send().await;
    issued.assert_status_code(200);
    let jwt = body(&issued)["jwt_token"].as_str().unwrap().to_string();

    let checked = client.get("/api/test").query("token", &jwt).send().await;
    checked.assert_status_code(200).assert_message("Token is valid");
    let decoded = &body(&checked)["jwt_decoded"];
    assert_eq!(decoded["id"], "42");
    assert!(decoded["exp"].as_i64().is_some());
}

#[tokio::test]
async fn test_tampered_token_is_rejected() {
    let jwt = token(json!({"id": "1"}));
    let mut tampered = jwt.into_bytes();
    tampered[0] = if tampered[0] == b'e' { b'f' } else { b'e' };
    let tampered = String::from_utf8(tampered).unwrap();

    let response = client().get("/api/test").query("token", tampered).send().await;
    response.assert_status_code(401).assert_message("Invalid token");
}

#[tokio::test]
async fn test_route_without_params_is_bad_request() {
    client().get("/api/test").send().await.assert_status_code(400);
}

#[tokio::test]
async fn test_wrong_method_lists_allowed() {
    let response = client().post("/api/test").send().await;
    response.assert_status_code(405).assert_header("allow", "GET");
    assert_eq!(body(&response)["allowed_methods"], json!(["GET"]));
}

#[tokio::test]
async fn test_versioned_route_uses_helper_vars() {
    let response = client().get("/api/v1/test").send().await;
    response
        .assert_status_code(200)
        .assert_message("Hello from v1 and test");
}

#[tokio::test]
async fn test_unknown_version_is_not_found() {
    let response = client().get("/api/v9/test").send().await;
    response.assert_status_code(404);
    assert_eq!(body(&response)["requested_route"], "test");
}

#[tokio::test]
async fn test_create_post_requires_auth() {
    let response = client()
        .post("/api/posts")
        .json(&json!({"title": "Hello", "content": "A long enough body"}))
        .send()
        .await;
    response
        .assert_status_code(401)
        .assert_header("x-ratelimit-limit", "10");
}

#[tokio::test]
async fn test_post_lifecycle() {
    let client = client();
    let alice = token(json!({"id": "alice"}));
    let bob = token(json!({"id": "bob"}));

    let created = client
        .post("/api/posts")
        .bearer_token(&alice)
        .json(&json!({"title": "  <b>Hello</b> ", "content": "A long enough body"}))
        .send()
        .await;
    created
        .assert_status_code(201)
        .assert_message("Post created successfully")
        .assert_header("x-ratelimit-remaining", "9");
    let post = body(&created)["post"].clone();
    assert_eq!(post["title"], "Hello");
    assert_eq!(post["user_id"], "alice");
    let id = post["id"].as_u64().unwrap();

    let fetched = client.get("/api/posts").query("id", id.to_string()).send().await;
    fetched.assert_status_code(200);
    assert_eq!(body(&fetched)["post"]["id"], id);

    let forbidden = client
        .put("/api/posts")
        .bearer_token(&bob)
        .json(&json!({"id": id, "title": "Taken over", "content": "Not my post at all"}))
        .send()
        .await;
    forbidden.assert_status_code(403);

    let updated = client
        .put("/api/posts")
        .bearer_token(&alice)
        .json(&json!({"id": id.to_string(), "title": "Edited", "content": "Edited body text"}))
        .send()
        .await;
    updated.assert_status_code(200);
    assert_eq!(body(&updated)["post"]["title"], "Edited");

    let not_owner = client
        .delete("/api/posts")
        .query("id", id.to_string())
        .bearer_token(&bob)
        .send()
        .await;
    not_owner
        .assert_status_code(403)
        .assert_message("You can only delete your own posts")
        .assert_header("x-ratelimit-limit", "20");

    let deleted = client
        .delete("/api/posts")
        .query("id", id.to_string())
        .bearer_token(&alice)
        .send()
        .await;
    deleted.assert_status_code(200).assert_message("Post deleted successfully");

    let gone = client.get("/api/posts").query("id", id.to_string()).send().await;
    gone.assert_status_code(404).assert_message("Post not found");
}

#[tokio::test]
async fn test_moderator_deletes_any_post() {
    let client = client();
    let alice = token(json!({"id": "alice"}));
    let moderator = token(json!({"id": "mod", "role": ["user", "moderator"]}));

    let created = client
        .post("/api/posts")
        .bearer_token(&alice)
        .json(&json!({"title": "Moderated", "content": "Soon to be removed"}))
        .send()
        .await;
    let id = body(&created)["post"]["id"].as_u64().unwrap();

    let deleted = client
        .delete("/api/posts")
        .query("id", id.to_string())
        .bearer_token(&moderator)
        .send()
        .await;
    deleted
        .assert_status_code(200)
        .assert_message("Post deleted by moderator")
        .assert_header("x-ratelimit-limit", "50");

    let again = client
        .delete("/api/posts")
        .query("id", id.to_string())
        .bearer_token(&moderator)
        .send()
        .await;
    again.assert_status_code(404);

    let missing_id = client.delete("/api/posts").bearer_token(&alice).send().await;
    missing_id.assert_status_code(400);
}

#[tokio::test]
async fn test_scalar_subject_tokens_are_distinct_authors() {
    let client = client();
    let tokens = TokenService::new(SECRET, 3600);
    let alice = tokens.generate(&json!("alice")).unwrap();
    let mallory = tokens.generate(&json!("mallory")).unwrap();

    let created = client
        .post("/api/posts")
        .bearer_token(&alice)
        .json(&json!({"title": "Mine", "content": "Written by alice herself"}))
        .send()
        .await;
    created.assert_status_code(201);
    let post = body(&created)["post"].clone();
    assert_eq!(post["user_id"], "alice");
    let id = post["id"].as_u64().unwrap();

    let hijack = client
        .put("/api/posts")
        .bearer_token(&mallory)
        .json(&json!({"id": id, "title": "Hijacked", "content": "Rewritten by someone else"}))
        .send()
        .await;
    hijack.assert_status_code(403);

    let delete = client
        .delete("/api/posts")
        .query("id", id.to_string())
        .bearer_token(&mallory)
        .send()
        .await;
    delete.assert_status_code(403);
}

#[tokio::test]
async fn test_token_without_identity_cannot_write() {
    let anonymous = token(json!({"role": "user"}));
    let response = client()
        .post("/api/posts")
        .bearer_token(&anonymous)
        .json(&json!({"title": "Nameless", "content": "Nobody wrote this post"}))
        .send()
        .await;
    response
        .assert_status_code(403)
        .assert_message("Token does not identify a user");
}

#[tokio::test]
async fn test_create_post_validation() {
    let client = client();
    let jwt = token(json!({"id": "alice"}));

    let missing = client
        .post("/api/posts")
        .bearer_token(&jwt)
        .json(&json!({"title": "Only a title"}))
        .send()
        .await;
    missing.assert_status_code(400);
    assert_eq!(body(&missing)["missing_fields"], json!(["content"]));

    let short = client
        .post("/api/posts")
        .bearer_token(&jwt)
        .json(&json!({"title": "Hi", "content": "A long enough body"}))
        .send()
        .await;
    short
        .assert_status_code(400)
        .assert_message("Title must be at least 3 characters");

    let invalid = client
        .post("/api/posts")
        .bearer_token(&jwt)
        .body("{not json")
        .send()
        .await;
    invalid.assert_status_code(400);
}

#[tokio::test]
async fn test_list_pagination() {
    let client = client();
    let jwt = token(json!({"id": "alice"}));
    for i in 0..3 {
        client
            .post("/api/posts")
            .bearer_token(&jwt)
            .json(&json!({"title": format!("Post {i}"), "content": "A long enough body"}))
            .send()
            .await
            .assert_status_code(201);
    }

    let response = client.get("/api/posts").send().await;
    response.assert_status_code(200);
    let body = body(&response);
    assert_eq!(body["posts"].as_array().unwrap().len(), 3);
    assert_eq!(body["posts"][0]["title"], "Post 2");
    assert_eq!(body["pagination"], json!({"page": 1, "per_page": 20, "total": 3, "pages": 1}));
}

#[tokio::test]
async fn test_rate_limit_is_per_client() {
    let client = client();
    let jwt = token(json!({"id": "alice"}));
    let post = |ip: &'static str| {
        client
            .post("/api/posts")
            .header("x-forwarded-for", ip)
            .bearer_token(&jwt)
            .json(&json!({"title": "Spam spam", "content": "A long enough body"}))
    };

    for _ in 0..10 {
        post("198.51.100.1").send().await.assert_status_code(201);
    }
    let limited = post("198.51.100.1").send().await;
    limited
        .assert_status_code(429)
        .assert_header("x-ratelimit-remaining", "0");
    assert!(limited.header("retry-after").is_some());
    assert!(body(&limited)["retry_after"].as_u64().unwrap() >= 1);

    post("198.51.100.2").send().await.assert_status_code(201);
}

#[tokio::test]
async fn test_middlewares_reference() {
    let response = client().get("/api/middlewares").send().await;
    response
        .assert_status_code(200)
        .assert_header("x-ratelimit-limit", "60");
    let body = body(&response);
    assert_eq!(body["sanitize_kinds"][1], "email");
    assert!(body["options"]["role"].is_object());
    assert!(body.get("debug").is_none());
}

#[tokio::test]
async fn test_middlewares_debug_reports_conflicts() {
    let response = client_with(&config(true)).get("/api/middlewares").send().await;
    response.assert_status_code(200);
    let body = body(&response);
    assert_eq!(body["debug"]["conflicts"], json!(["userName"]));
    assert_eq!(body["debug"]["shared_variables"], json!(["userName", "exampleLimit"]));
}

#[tokio::test]
async fn test_base_app_dir_prefix() {
    let mut config = config(false);
    config.app.base_app_dir = "/backend".into();
    let client = client_with(&config);
    client.get("/backend/api/v1/test").send().await.assert_status_code(200);
}
