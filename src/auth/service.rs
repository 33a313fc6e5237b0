// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Sign-in with an ownership proof.
//!
//! [`AuthService::authenticate`] verifies the proof, applies the replay
//! policy and finds or creates the user in a single write transaction, so
//! concurrent sign-ins for one address always converge on one user row.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use utoipa::ToSchema;

use super::proof::{
    ownership_message, parse_message, validate_components, verify_proof, OwnershipProof,
    ProofComponents, ProofError, FUTURE_SKEW_MS,
};
use crate::storage::{
    AuditEvent, AuditEventType, NonceRepository, Store, User, UserRepository,
};

/// Sign-in request body.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    #[serde(alias = "walletAddress")]
    pub address: String,
    pub signature: String,
    /// Signed message; rebuilt from `timestamp` and `nonce` when absent
    #[serde(default)]
    pub message: Option<String>,
    /// Unix milliseconds, as a number or a numeric string
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    #[schema(value_type = Option<i64>)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub nonce: Option<String>,
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(n)) => Ok(Some(n)),
        Some(Raw::Text(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid timestamp: {s}"))),
    }
}

/// Expiry and nonce-reuse checks applied to ownership proofs.
#[derive(Debug, Clone, Copy)]
pub struct ReplayPolicy {
    pub enforce: bool,
    pub max_age: Duration,
}

impl Default for ReplayPolicy {
    fn default() -> Self {
        Self {
            enforce: true,
            max_age: Duration::from_secs(300),
        }
    }
}

#[derive(Clone)]
pub struct AuthService {
    store: Arc<Store>,
    policy: ReplayPolicy,
}

impl AuthService {
    pub fn new(store: Arc<Store>, policy: ReplayPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> ReplayPolicy {
        self.policy
    }

    /// Verify `credentials` and return the (possibly new) user.
    ///
    /// Returns `Ok(None)` when the proof does not verify or is rejected by the
    /// replay policy. Registration additionally requires a timestamp and a
    /// nonce.
    pub fn authenticate(&self, credentials: &Credentials) -> Result<Option<User>, ProofError> {
        let address = credentials.address.trim();

        if self.verified_message(credentials, address).is_none() {
            self.audit_failure(address, "signature mismatch");
            return Ok(None);
        }

        let components = match self.components(credentials, address) {
            Ok(components) => components,
            Err(e) => {
                tracing::info!(error = %e, wallet_address = %address, "Ownership proof rejected");
                self.audit_failure(address, &e.to_string());
                return Ok(None);
            }
        };

        if self.policy.enforce {
            let Some(components) = &components else {
                self.audit_failure(address, "missing timestamp or nonce");
                return Ok(None);
            };
            let now_ms = chrono::Utc::now().timestamp_millis();
            if let Err(e) = validate_components(components, self.policy.max_age, now_ms) {
                tracing::info!(error = %e, wallet_address = %address, "Ownership proof rejected");
                self.audit_failure(address, &e.to_string());
                return Ok(None);
            }
        }

        let result = self.store.write(|txn| {
            if self.policy.enforce {
                if let Some(c) = &components {
                    let now_ms = chrono::Utc::now().timestamp_millis();
                    let max_age_ms =
                        i64::try_from(self.policy.max_age.as_millis()).unwrap_or(i64::MAX);
                    let expires_at = c
                        .timestamp
                        .saturating_add(max_age_ms)
                        .saturating_add(FUTURE_SKEW_MS);
                    if !NonceRepository::new(txn).consume(address, &c.nonce, expires_at, now_ms)? {
                        return Err(ProofError::NonceReused);
                    }
                }
            }

            let users = UserRepository::new(txn);
            if components.is_none() {
                return users
                    .find_by_address(address)?
                    .map(|existing| (existing, false))
                    .ok_or(ProofError::MissingChallengeData);
            }
            Ok(users.find_or_insert_with(address, || User::new(address))?)
        });

        match result {
            Ok((user, created)) => {
                if created {
                    tracing::info!(
                        user_id = %user.id,
                        wallet_address = %user.wallet_address,
                        "Registered new user"
                    );
                }
                AuditEvent::new(AuditEventType::AuthSuccess)
                    .with_user(&user.id)
                    .with_resource("user", &user.id)
                    .with_details(serde_json::json!({ "created": created }))
                    .record(&self.store);
                Ok(Some(user))
            }
            Err(ProofError::NonceReused) => {
                tracing::warn!(wallet_address = %address, "Ownership proof nonce reused");
                self.audit_failure(address, "nonce reused");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Timestamp and nonce covered by the signature.
    ///
    /// With replay enforcement on, a supplied message must be a canonical
    /// ownership statement for `address`, and explicit timestamp and nonce
    /// fields must repeat what it embeds.
    fn components(
        &self,
        credentials: &Credentials,
        address: &str,
    ) -> Result<Option<ProofComponents>, ProofError> {
        let explicit = match (credentials.timestamp, credentials.nonce.as_deref()) {
            (Some(timestamp), Some(nonce)) => Some(ProofComponents {
                wallet_address: address.to_string(),
                timestamp,
                nonce: nonce.to_string(),
            }),
            _ => None,
        };
        let Some(message) = credentials.message.as_deref() else {
            return Ok(explicit);
        };
        let parsed = parse_message(message);

        if !self.policy.enforce {
            return Ok(explicit.or(parsed.map(|parsed| ProofComponents {
                wallet_address: address.to_string(),
                ..parsed
            })));
        }

        let parsed = parsed.ok_or(ProofError::MalformedMessage)?;
        let mismatch = !parsed.wallet_address.eq_ignore_ascii_case(address)
            || credentials.timestamp.is_some_and(|t| t != parsed.timestamp)
            || credentials.nonce.as_deref().is_some_and(|n| n != parsed.nonce);
        if mismatch {
            return Err(ProofError::ComponentMismatch);
        }
        Ok(Some(ProofComponents {
            wallet_address: address.to_string(),
            ..parsed
        }))
    }

    /// The first candidate message whose signature recovers to `address`.
    ///
    /// Without an explicit message, both the lower-cased and the as-given
    /// address renderings are tried.
    fn verified_message(&self, credentials: &Credentials, address: &str) -> Option<String> {
        let candidates = match (&credentials.message, credentials.timestamp, &credentials.nonce) {
            (Some(message), _, _) => vec![message.clone()],
            (None, Some(timestamp), Some(nonce)) => {
                let lower = ownership_message(&address.to_lowercase(), timestamp, nonce);
                let given = ownership_message(address, timestamp, nonce);
                if lower == given {
                    vec![lower]
                } else {
                    vec![lower, given]
                }
            }
            _ => return None,
        };

        candidates.into_iter().find(|message| {
            verify_proof(&OwnershipProof {
                wallet_address: address.to_string(),
                timestamp: credentials.timestamp.unwrap_or_default(),
                nonce: credentials.nonce.clone().unwrap_or_default(),
                message: message.clone(),
                signature: credentials.signature.clone(),
            })
        })
    }

    fn audit_failure(&self, address: &str, reason: &str) {
        AuditEvent::new(AuditEventType::AuthFailure)
            .with_resource("wallet_address", address.to_lowercase())
            .failed(reason)
            .record(&self.store);
    }
}
