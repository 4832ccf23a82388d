//! # Bearer Token Authentication
//!
//! A single shared bearer token guards every route except the health
//! probes. When no token is configured, authentication is disabled
//! (development mode) and every request passes.
//!
//! ```text
//! Authorization: Bearer {secret}
//! ```

use axum::extract::Request;
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::error::{ErrorBody, ErrorDetail};

/// A secret string that is wiped on drop and never printed.
#[derive(Clone)]
pub struct SecretString(Zeroizing<String>);

impl SecretString {
    pub fn new(s: impl Into<String>) -> Self {
        Self(Zeroizing::new(s.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Auth configuration injected into request extensions.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub token: Option<SecretString>,
}

/// Why a request was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    Missing,
    WrongScheme,
    BadToken,
}

impl Rejection {
    fn message(self) -> &'static str {
        match self {
            Self::Missing => "missing authorization header",
            Self::WrongScheme => "authorization header must use Bearer scheme",
            Self::BadToken => "invalid bearer token",
        }
    }
}

/// Compare in constant time. A length mismatch still runs one full
/// comparison against `expected`.
fn tokens_match(provided: &[u8], expected: &[u8]) -> bool {
    let same_len = provided.len() == expected.len();
    let probe = if same_len { provided } else { expected };
    bool::from(probe.ct_eq(expected)) && same_len
}

fn check(header_value: Option<&str>, expected: &SecretString) -> Result<(), Rejection> {
    let value = header_value.ok_or(Rejection::Missing)?;
    let provided = value
        .strip_prefix("Bearer ")
        .ok_or(Rejection::WrongScheme)?;
    if tokens_match(provided.as_bytes(), expected.expose().as_bytes()) {
        Ok(())
    } else {
        Err(Rejection::BadToken)
    }
}

/// Reject requests whose `Authorization` header does not carry the
/// configured bearer token. Without a configured token every request passes.
pub async fn auth_middleware(request: Request, next: Next) -> Response {
    let Some(expected) = request
        .extensions()
        .get::<AuthConfig>()
        .and_then(|c| c.token.clone())
    else {
        return next.run(request).await;
    };

    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match check(header_value, &expected) {
        Ok(()) => next.run(request).await,
        Err(rejection) => {
            tracing::warn!(
                path = %request.uri().path(),
                reason = ?rejection,
                "request rejected by bearer auth"
            );
            let body = ErrorBody {
                error: ErrorDetail {
                    code: "UNAUTHORIZED".to_string(),
                    message: rejection.message().to_string(),
                    details: None,
                },
            };
            (StatusCode::UNAUTHORIZED, Json(body)).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::middleware::from_fn;
    use axum::routing::post;
    use axum::Router;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    const TOKEN: &str = "ct-operator-token";

    fn guarded(token: Option<&str>) -> Router {
        Router::new()
            .route("/v1/train", post(|| async { "trained" }))
            .layer(from_fn(auth_middleware))
            .layer(axum::Extension(AuthConfig {
                token: token.map(SecretString::new),
            }))
    }

    async fn call(router: Router, authorization: Option<&str>) -> (StatusCode, serde_json::Value) {
        let mut builder = axum::http::Request::post("/v1/train");
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        let response = router
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(&bytes).into()));
        (status, json)
    }

    #[tokio::test]
    async fn operator_token_reaches_handler() {
        let (status, body) = call(guarded(Some(TOKEN)), Some(&format!("Bearer {TOKEN}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "trained");
    }

    #[tokio::test]
    async fn each_rejection_has_its_own_message() {
        let cases = [
            (None, "missing authorization header"),
            (Some("Bearer ct-operator-tokem"), "invalid bearer token"),
            (Some("Bearer ct-operator"), "invalid bearer token"),
            (Some("Token ct-operator-token"), "authorization header must use Bearer scheme"),
        ];
        for (authorization, expected) in cases {
            let (status, body) = call(guarded(Some(TOKEN)), authorization).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{authorization:?}");
            assert_eq!(body["error"]["code"], "UNAUTHORIZED");
            assert_eq!(body["error"]["message"], expected);
        }
    }

    #[tokio::test]
    async fn no_configured_token_means_open_access() {
        let (status, _) = call(guarded(None), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[test]
    fn length_mismatch_never_matches() {
        assert!(tokens_match(b"k1", b"k1"));
        assert!(!tokens_match(b"k1", b"k2"));
        assert!(!tokens_match(b"k", b"k1"));
        assert!(!tokens_match(b"", b"k1"));
        assert!(!tokens_match(b"k1k1", b"k1"));
    }

    #[test]
    fn configured_token_stays_out_of_debug_output() {
        let config = AuthConfig {
            token: Some(SecretString::new(TOKEN)),
        };
        let shown = format!("{config:?}");
        assert!(!shown.contains(TOKEN));
        assert!(shown.contains("[REDACTED]"));
    }
}
