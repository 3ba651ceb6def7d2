#![cfg(feature = "web")]

use axum::{
    Json,
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use log::warn;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

use crate::app::AppState;

/// User id attached to requests when no tokens are configured.
pub const ANONYMOUS_USER: &str = "anonymous";

/// Authenticated caller, inserted into request extensions by [`require_bearer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser(pub String);

/// Known bearer tokens
///
/// Tokens are issued elsewhere; this registry only maps a presented token to
/// the user it belongs to.
#[derive(Debug, Clone, Default)]
pub struct TokenRegistry {
    tokens: HashMap<String, String>,
}

impl TokenRegistry {
    pub fn new(tokens: HashMap<String, String>) -> Self {
        Self { tokens }
    }

    /// An empty registry turns the bearer check off.
    pub fn is_enabled(&self) -> bool {
        !self.tokens.is_empty()
    }

    /// Resolve a token to its user id.
    ///
    /// # Arguments
    /// * `token` - The raw token, without the `Bearer ` prefix
    ///
    /// # Returns
    /// * `Option<&str>` - The owning user id if the token is known
    pub fn validate(&self, token: &str) -> Option<&str> {
        self.tokens.get(token).map(String::as_str)
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header_value: &str) -> Option<&str> {
    let (scheme, token) = header_value.trim().split_once(' ')?;
    let token = token.trim();
    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "status": "error",
            "code": "UNAUTHORIZED",
            "message": message,
        })),
    )
        .into_response()
}

/// Authentication middleware
///
/// Checks the bearer credential and records the caller as [`CurrentUser`].
///
/// # Returns
/// * `Response` - Either the downstream response or `401 Unauthorized`
pub async fn require_bearer(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    if !state.tokens.is_enabled() {
        request
            .extensions_mut()
            .insert(CurrentUser(ANONYMOUS_USER.to_string()));
        return next.run(request).await;
    }

    let Some(value) = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    else {
        return unauthorized("Missing bearer token");
    };

    let Some(token) = bearer_token(value) else {
        return unauthorized("Malformed authorization header");
    };

    match state.tokens.validate(token) {
        Some(user) => {
            let user = CurrentUser(user.to_string());
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        None => {
            warn!("rejected request to {} with unknown token", request.uri().path());
            unauthorized("Invalid bearer token")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Bearer abc", Some("abc"))]
    #[case("bearer   abc ", Some("abc"))]
    #[case("Basic abc", None)]
    #[case("Bearer", None)]
    #[case("Bearer  ", None)]
    fn parses_bearer_header(#[case] value: &str, #[case] expected: Option<&str>) {
        assert_eq!(bearer_token(value), expected);
    }

    #[test]
    fn registry_lookup() {
        let registry = TokenRegistry::new(HashMap::from([(
            "t1".to_string(),
            "alice".to_string(),
        )]));
        assert!(registry.is_enabled());
        assert_eq!(registry.validate("t1"), Some("alice"));
        assert_eq!(registry.validate("t2"), None);
        assert!(!TokenRegistry::default().is_enabled());
    }
}
