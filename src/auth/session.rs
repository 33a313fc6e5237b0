// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session tokens issued after a successful ownership proof.
//!
//! Sessions are HS256 JWTs signed with `SESSION_SECRET`. They are returned in
//! the sign-in response body and set as the `wallet_session` cookie.

use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::AuthError;
use crate::storage::User;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "wallet_session";

/// Clock skew tolerance (60 seconds).
const CLOCK_SKEW_LEEWAY: u64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// User ID
    pub sub: String,
    pub wallet_address: String,
    pub iat: i64,
    pub exp: i64,
}

/// The user behind a verified session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    pub user_id: String,
    pub wallet_address: String,
    pub expires_at: i64,
}

/// Signing material for session tokens.
#[derive(Clone)]
pub struct SessionKeys {
    encoding: Arc<EncodingKey>,
    decoding: Arc<DecodingKey>,
    ttl: Duration,
}

impl std::fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeys")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl SessionKeys {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: Arc::new(EncodingKey::from_secret(secret)),
            decoding: Arc::new(DecodingKey::from_secret(secret)),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for `user`. Returns the token and its expiry (unix secs).
    pub fn issue(&self, user: &User) -> Result<(String, i64), AuthError> {
        let iat = chrono::Utc::now().timestamp();
        let exp = iat + i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX / 2);
        let claims = SessionClaims {
            sub: user.id.clone(),
            wallet_address: user.wallet_address.clone(),
            iat,
            exp,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AuthError::InternalError(e.to_string()))?;
        Ok((token, exp))
    }

    pub fn verify(&self, token: &str) -> Result<SessionUser, AuthError> {
        let mut validation = Validation::default();
        validation.leeway = CLOCK_SKEW_LEEWAY;

        let data = decode::<SessionClaims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                _ => AuthError::MalformedToken,
            }
        })?;

        Ok(SessionUser {
            user_id: data.claims.sub,
            wallet_address: data.claims.wallet_address,
            expires_at: data.claims.exp,
        })
    }

    /// `Set-Cookie` value carrying `token`.
    pub fn cookie(&self, token: &str) -> String {
        format!(
            "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            self.ttl.as_secs()
        )
    }

    /// `Set-Cookie` value that removes the session cookie.
    pub fn clear_cookie() -> String {
        format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
    }
}
