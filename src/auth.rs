//! Access tokens and the auth guard.
//!
//! The guard runs as an axum extractor: any handler that takes a
//! [`Principal`] argument is a protected route. Resolution happens at most
//! once per request; the resolved principal is stored in the request
//! extensions and later extractions reuse it.
//!
//! Every rejection is a 401. Verification failures surface their reason
//! ("jwt expired", "invalid signature", ...); lookup failures do not.

use std::time::Duration;

use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header, request::Parts},
};
use axum_extra::extract::CookieJar;
use chrono::Utc;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use tokio::task;

use crate::{api::AppState, error::ApiError, id::ObjectId, models::Principal};

pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
const BEARER_PREFIX: &str = "bearer";

/// Claims carried by an access token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessClaims {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub email: String,
    pub username: String,
    pub full_name: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Unauthorized request")]
    MissingCredential,
    #[error("{0}")]
    InvalidCredential(String),
    #[error("Invalid access token")]
    UnknownPrincipal,
    #[error("Invalid access token")]
    LookupFailed(#[source] anyhow::Error),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::unauthorized(err.to_string())
    }
}

fn describe_jwt_error(err: &jsonwebtoken::errors::Error) -> &'static str {
    match err.kind() {
        ErrorKind::ExpiredSignature => "jwt expired",
        ErrorKind::ImmatureSignature => "jwt not active",
        ErrorKind::InvalidSignature => "invalid signature",
        ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => "invalid algorithm",
        ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
            "jwt malformed"
        }
        _ => "Invalid access token",
    }
}

/// Signs and verifies HS256 access tokens with the server-held secret.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp"]);
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }

    pub fn issue(&self, principal: &Principal) -> jsonwebtoken::errors::Result<String> {
        let now = Utc::now().timestamp();
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        self.sign(&AccessClaims {
            id: principal.id(),
            email: principal.email().to_string(),
            username: principal.username().to_string(),
            full_name: principal.full_name().to_string(),
            iat: now,
            exp: now.saturating_add(ttl),
        })
    }

    pub fn sign(&self, claims: &AccessClaims) -> jsonwebtoken::errors::Result<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
    }

    pub fn verify(&self, token: &str) -> Result<AccessClaims, AuthError> {
        decode::<AccessClaims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| AuthError::InvalidCredential(describe_jwt_error(&err).to_string()))
    }
}

/// Pulls the raw token from the `accessToken` cookie, falling back to the
/// `Authorization` header with its bearer prefix removed.
pub fn extract_credential(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(ACCESS_TOKEN_COOKIE) {
        let value = cookie.value().trim();
        if !value.is_empty() {
            return Some(value.to_string());
        }
    }

    let raw = headers.get(header::AUTHORIZATION)?.to_str().ok()?.trim();
    let token = match raw.get(..BEARER_PREFIX.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(BEARER_PREFIX) => &raw[BEARER_PREFIX.len()..],
        _ => raw,
    }
    .trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// Runs the guard: credential, verification, then one principal lookup.
pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Principal, AuthError> {
    let token = extract_credential(headers).ok_or(AuthError::MissingCredential)?;
    let claims = state.tokens.verify(&token)?;

    let db = state.db.clone();
    let principal = task::spawn_blocking(move || db.find_principal(claims.id))
        .await
        .map_err(|err| AuthError::LookupFailed(anyhow::anyhow!("task join error: {err}")))?
        .map_err(AuthError::LookupFailed)?;

    principal.ok_or(AuthError::UnknownPrincipal)
}

impl FromRequestParts<AppState> for Principal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(principal) = parts.extensions.get::<Principal>() {
            return Ok(principal.clone());
        }

        let principal = authenticate(state, &parts.headers).await.map_err(|err| {
            if let AuthError::LookupFailed(cause) = &err {
                tracing::error!(error = %format!("{cause:#}"), "principal lookup failed");
            } else {
                tracing::debug!(reason = %err, "rejected request");
            }
            ApiError::from(err)
        })?;

        parts.extensions.insert(principal.clone());
        Ok(principal)
    }
}

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}
