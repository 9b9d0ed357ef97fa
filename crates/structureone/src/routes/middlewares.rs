//! `GET /api/middlewares`: reference for the middleware options.
//!
//! Also exercises the per-path rate table and, in debug mode, reports the
//! shared variables and overwrite conflicts the helper produced.

use http::Method;
use serde_json::{json, Value};
use structureone_core::{ApiResponse, ApiResult, BoxFuture};
use structureone_middleware::{RateLimitTable, RateRule, SanitizeKind, DEFAULT_ROLE_CLAIM};
use structureone_server::{RouteContext, Routes};

const SANITIZE_KINDS: [SanitizeKind; 6] = [
    SanitizeKind::String,
    SanitizeKind::Email,
    SanitizeKind::Url,
    SanitizeKind::Int,
    SanitizeKind::Float,
    SanitizeKind::Html,
];

pub(super) fn register(routes: &mut Routes) {
    routes.legacy("middlewares").functions(functions).entry(index);
}

fn functions(ctx: &mut RouteContext) -> ApiResult<()> {
    let vars = ctx.vars_mut();
    vars.set_safe("userName", "John", false);
    // Refused and recorded as a conflict.
    vars.set_safe("userName", "Jane", false);
    vars.set_safe("exampleLimit", 10, false);
    Ok(())
}

/// Rules this route checks itself against. Unlisted paths use the configured
/// default.
fn rate_table(default: RateRule) -> RateLimitTable {
    RateLimitTable::new(default)
        .with_rule("/api/login", RateRule::new(5, 300))
        .with_rule("/api/register", RateRule::new(3, 3600))
        .with_rule("/api/search", RateRule::new(100, 60))
}

fn index(ctx: &mut RouteContext) -> BoxFuture<'_, ApiResult<ApiResponse>> {
    Box::pin(async move {
        ctx.require_method(Method::GET)?;

        let default = ctx
            .state::<RateRule>()
            .copied()
            .unwrap_or(RateRule::new(60, 60));
        let decision = ctx.rate_limit_table(&rate_table(default)).await?;

        let mut response = ApiResponse::ok("Middleware reference")
            .with_field("options", options())
            .with_field(
                "sanitize_kinds",
                SANITIZE_KINDS.iter().map(SanitizeKind::as_str).collect::<Vec<_>>(),
            )
            .with_field(
                "rate_limit",
                json!({
                    "limit": decision.limit,
                    "remaining": decision.remaining,
                    "reset": decision.reset_at,
                }),
            );

        if ctx.is_debug() {
            let vars = ctx.vars();
            response = response.with_field(
                "debug",
                json!({
                    "shared_variables": vars.names().collect::<Vec<_>>(),
                    "conflicts": vars.conflicts(),
                }),
            );
        }
        Ok(response)
    })
}

fn options() -> Value {
    json!({
        "rate": {
            "example": "MiddlewareConfig::new().rate(10, 60)",
            "effect": "sliding window per client IP and path; 429 with Retry-After when exceeded",
        },
        "auth": {
            "example": "MiddlewareConfig::new().auth()",
            "effect": "requires Authorization: Bearer <token>; claims become ctx.user()",
        },
        "role": {
            "example": "MiddlewareConfig::new().auth().role([\"admin\", \"moderator\"])",
            "effect": format!("403 unless the '{DEFAULT_ROLE_CLAIM}' claim matches one of the roles"),
        },
        "json": {
            "example": "MiddlewareConfig::new().json([\"email\", \"password\"]).optional(\"remember\", false)",
            "effect": "POST, PUT or PATCH only; 400 listing missing_fields when a required field is empty",
        },
        "sanitize": {
            "example": "MiddlewareConfig::new().sanitize(\"email\", SanitizeKind::Email)",
            "effect": "cleans present fields in place",
        },
        "validate": {
            "example": "MiddlewareConfig::new().validate(|data| Ok(()))",
            "effect": "400 with the returned message on Err",
        },
    })
}
