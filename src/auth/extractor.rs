// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor for signed-in users.
//!
//! Use the `Auth` extractor in handlers to require a session:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(user): Auth) -> impl IntoResponse {
//!     // user is SessionUser
//! }
//! ```
//!
//! The session token is taken from `Authorization: Bearer <token>` or, if
//! that header is absent, from the `wallet_session` cookie.

use axum::{
    extract::FromRequestParts,
    http::{
        header::{AUTHORIZATION, COOKIE},
        request::Parts,
    },
};

use super::{AuthError, SessionUser, SESSION_COOKIE};
use crate::state::AppState;

pub struct Auth(pub SessionUser);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<SessionUser>().cloned() {
            return Ok(Auth(user));
        }

        let token = match parts.headers.get(AUTHORIZATION) {
            Some(header) => {
                let header = header.to_str().map_err(|_| AuthError::InvalidAuthHeader)?;
                header
                    .strip_prefix("Bearer ")
                    .ok_or(AuthError::InvalidAuthHeader)?
                    .to_string()
            }
            None => session_cookie(parts).ok_or(AuthError::MissingCredentials)?,
        };

        let user = state.sessions.verify(&token)?;
        parts.extensions.insert(user.clone());
        Ok(Auth(user))
    }
}

fn session_cookie(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}
