// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session endpoints backed by wallet ownership proofs.

use axum::{
    extract::{Query, State},
    http::header::SET_COOKIE,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    auth::{generate_message, AuthError, Credentials, OwnershipChallenge, ProofError, SessionKeys},
    blockchain::parse_address,
    error::ApiError,
    models::ChallengeQuery,
    state::AppState,
    storage::{StorageError, User},
};

/// Issued session.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    /// Bearer token, also set as the `wallet_session` cookie
    pub token: String,
    /// Expiry as unix seconds
    pub expires_at: i64,
    pub user: User,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SignOutResponse {
    pub success: bool,
}

/// Fresh ownership message for a wallet to sign.
#[utoipa::path(
    get,
    path = "/api/auth/challenge",
    tag = "Auth",
    params(ChallengeQuery),
    responses(
        (status = 200, description = "Message to sign", body = OwnershipChallenge),
        (status = 400, description = "Invalid wallet address")
    )
)]
pub async fn challenge(
    Query(query): Query<ChallengeQuery>,
) -> Result<Json<OwnershipChallenge>, ApiError> {
    parse_address(&query.address).map_err(|_| ApiError::bad_request("Invalid wallet address"))?;
    Ok(Json(generate_message(query.address.trim(), None)))
}

/// Exchange a signed challenge for a session.
///
/// The user is created on first sign-in.
#[utoipa::path(
    post,
    path = "/api/auth/session",
    tag = "Auth",
    request_body = Credentials,
    responses(
        (status = 200, description = "Session issued", body = SessionResponse),
        (status = 401, description = "Invalid wallet signature"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn create_session(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> Result<impl IntoResponse, ApiError> {
    // Signature recovery and the sign-in write both block.
    let auth = state.auth.clone();
    let outcome = tokio::task::spawn_blocking(move || auth.authenticate(&credentials))
        .await
        .map_err(|e| StorageError::Task(e.to_string()))?;
    let user = match outcome {
        Ok(Some(user)) => user,
        Ok(None) => return Err(AuthError::InvalidProof.into()),
        Err(ProofError::Storage(e)) => return Err(e.into()),
        Err(e) => {
            tracing::info!(error = %e, "Sign-in rejected");
            return Err(AuthError::InvalidProof.into());
        }
    };

    let (token, expires_at) = state.sessions.issue(&user)?;
    let cookie = state.sessions.cookie(&token);
    tracing::info!(user_id = %user.id, "Session issued");

    Ok((
        [(SET_COOKIE, cookie)],
        Json(SessionResponse {
            token,
            expires_at,
            user,
        }),
    ))
}

/// Clear the session cookie.
#[utoipa::path(
    delete,
    path = "/api/auth/session",
    tag = "Auth",
    responses((status = 200, description = "Signed out", body = SignOutResponse))
)]
pub async fn end_session() -> impl IntoResponse {
    (
        [(SET_COOKIE, SessionKeys::clear_cookie())],
        Json(SignOutResponse { success: true }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::{signed_credentials, test_app};
    use axum::{body::to_bytes, http::StatusCode};

    #[tokio::test]
    async fn challenge_embeds_lowercased_address() {
        let Json(challenge) = challenge(Query(ChallengeQuery {
            address: "0x00000000000000000000000000000000000000AB".into(),
        }))
        .await
        .unwrap();
        assert!(challenge
            .message
            .contains("0x00000000000000000000000000000000000000ab"));
        assert!(!challenge.nonce.is_empty());
    }

    #[tokio::test]
    async fn challenge_rejects_malformed_address() {
        let err = challenge(Query(ChallengeQuery {
            address: "not-an-address".into(),
        }))
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn valid_proof_issues_cookie_and_token() {
        let app = test_app();
        let response = create_session(State(app.state.clone()), Json(signed_credentials()))
            .await
            .unwrap()
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let cookie = response.headers()[SET_COOKIE].to_str().unwrap().to_string();
        assert!(cookie.starts_with("wallet_session="));

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let session = app
            .state
            .sessions
            .verify(body["token"].as_str().unwrap())
            .unwrap();
        assert_eq!(body["user"]["walletAddress"], session.wallet_address);
        assert_eq!(body["user"]["id"], session.user_id);
    }

    #[tokio::test]
    async fn tampered_signature_is_unauthorized() {
        let app = test_app();
        let mut credentials = signed_credentials();
        let flipped = if credentials.signature.as_bytes()[2] == b'0' { "1" } else { "0" };
        credentials.signature.replace_range(2..3, flipped);

        let Err(err) = create_session(State(app.state.clone()), Json(credentials)).await else {
            panic!("tampered proof accepted");
        };
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn parallel_sign_ins_succeed_and_replay_is_rejected() {
        let app = test_app();
        let credentials = signed_credentials();
        let replayed = credentials.clone();

        let first = create_session(State(app.state.clone()), Json(credentials))
            .await
            .unwrap()
            .into_response();
        assert_eq!(first.status(), StatusCode::OK);

        let Err(err) = create_session(State(app.state.clone()), Json(replayed)).await else {
            panic!("replayed proof accepted");
        };
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);

        let fresh = [signed_credentials(), signed_credentials()];
        let handles = fresh.map(|credentials| {
            let state = app.state.clone();
            tokio::spawn(async move {
                create_session(State(state), Json(credentials))
                    .await
                    .map(|response| response.into_response().status())
            })
        });
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), StatusCode::OK);
        }
    }

    #[tokio::test]
    async fn sign_out_clears_cookie() {
        let response = end_session().await.into_response();
        let cookie = response.headers()[SET_COOKIE].to_str().unwrap();
        assert!(cookie.contains("Max-Age=0"));
    }
}
