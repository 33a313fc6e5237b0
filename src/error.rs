// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::auth::AuthError;
use crate::auto_invest::AutoInvestError;
use crate::custody::CustodyError;
use crate::pools::PoolError;
use crate::storage::StorageError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub details: Option<String>,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// For server errors, report `message` and keep the cause as details.
    /// Client errors are returned unchanged.
    pub fn context(self, message: impl Into<String>) -> Self {
        if !self.status.is_server_error() {
            return self;
        }
        let details = self.details.unwrap_or(self.message);
        Self {
            status: self.status,
            message: message.into(),
            details: Some(details),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
            details: self.details,
        });
        (self.status, body).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        Self::new(e.status_code(), e.to_string())
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        tracing::error!(error = %e, "Storage error");
        match e {
            StorageError::NotFound(what) => Self::not_found(format!("Not found: {what}")),
            _ => Self::internal("Internal server error"),
        }
    }
}

impl From<CustodyError> for ApiError {
    fn from(e: CustodyError) -> Self {
        match e {
            CustodyError::UserNotFound | CustodyError::WalletNotFound => {
                Self::not_found(e.to_string())
            }
            CustodyError::NoManagedWallet
            | CustodyError::InvalidRequest(_)
            | CustodyError::UnsupportedChain(_) => Self::bad_request(e.to_string()),
            CustodyError::Storage(e) => e.into(),
            CustodyError::EncryptionKeyMissing
            | CustodyError::DecryptionFailed
            | CustodyError::EncryptionFailed => {
                tracing::error!(error = %e, "Key custody failure");
                Self::internal(e.to_string())
            }
            CustodyError::InsufficientFunds(_)
            | CustodyError::RpcUnavailable(_)
            | CustodyError::TransactionFailed(_)
            | CustodyError::Unconfirmed { .. }
            | CustodyError::EstimationFailed(_) => Self::internal(e.to_string()),
        }
    }
}

impl From<PoolError> for ApiError {
    fn from(e: PoolError) -> Self {
        match e {
            PoolError::NotFound => Self::not_found(e.to_string()),
            PoolError::InvalidAmount | PoolError::NoManagedWallet | PoolError::Validation(_) => {
                Self::bad_request(e.to_string())
            }
            PoolError::Custody(e) => e.into(),
            PoolError::Storage(e) => e.into(),
        }
    }
}

impl From<AutoInvestError> for ApiError {
    fn from(e: AutoInvestError) -> Self {
        match e {
            AutoInvestError::RuleNotFound => Self::not_found(e.to_string()),
            AutoInvestError::WalletNotOwned | AutoInvestError::Validation(_) => {
                Self::bad_request(e.to_string())
            }
            AutoInvestError::Storage(e) => e.into(),
        }
    }
}
