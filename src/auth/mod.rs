//! Bearer credential verification.
//!
//! Requests to protected routes must carry `Authorization: Bearer <token>`;
//! the token is checked by an [`IdentityVerifier`] before any handler runs.
//! Token comparison is constant-time to mitigate timing attacks.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::Request,
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;

use crate::errors::AppError;

/// The authenticated caller, attached to request extensions on success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub subject: String,
}

/// Validates an opaque bearer credential against a trusted issuer.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Principal, AppError>;
}

/// A credential issued to a known subject.
#[derive(Clone)]
pub struct TrustedToken {
    pub subject: String,
    token: String,
}

impl TrustedToken {
    pub fn new(subject: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for TrustedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustedToken")
            .field("subject", &self.subject)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Verifier backed by a fixed set of issued credentials.
pub struct TrustedTokenVerifier {
    tokens: Vec<TrustedToken>,
}

impl TrustedTokenVerifier {
    pub fn new(tokens: Vec<TrustedToken>) -> Self {
        Self { tokens }
    }
}

#[async_trait]
impl IdentityVerifier for TrustedTokenVerifier {
    async fn verify(&self, token: &str) -> Result<Principal, AppError> {
        if token.is_empty() {
            return Err(AppError::Unauthorized("Empty bearer credential".to_string()));
        }

        // Every entry is compared so the match position does not leak through timing.
        let mut matched = None;
        for trusted in &self.tokens {
            if constant_time_compare(token, &trusted.token) && matched.is_none() {
                matched = Some(trusted.subject.clone());
            }
        }

        matched
            .map(|subject| Principal { subject })
            .ok_or_else(|| AppError::Unauthorized("Invalid bearer credential".to_string()))
    }
}

/// Extract the bearer token from an `Authorization` header value.
pub fn bearer_token(value: &str) -> Option<&str> {
    value
        .trim()
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Bearer authentication layer function that takes the verifier as a parameter.
pub async fn bearer_auth_layer(
    verifier: Arc<dyn IdentityVerifier>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .map(str::to_string);

    let Some(token) = token else {
        return AppError::Unauthorized("Missing bearer credential".to_string()).into_response();
    };

    match verifier.verify(&token).await {
        Ok(principal) => {
            tracing::debug!(subject = %principal.subject, "Credential accepted");
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        Err(e) => {
            tracing::debug!("Credential rejected: {}", e);
            e.into_response()
        }
    }
}

/// Perform constant-time string comparison.
fn constant_time_compare(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
