// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Audit logging for security-sensitive operations.
//!
//! Every use of a custodial key, every sign-in attempt and every investment
//! is appended to the `audit_events` table, keyed by creation time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::database::{
    ordered_millis, ReadTxn, StorageResult, Store, WriteTxn, AUDIT_EVENTS,
};

/// Types of auditable events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    // Wallet events
    WalletCreated,
    WalletDeleted,

    // Key use
    TransactionBroadcast,
    MessageSigned,
    Withdrawal,

    // Investment events
    PoolInvestment,
    AutoInvestmentExecuted,

    // Auth events
    AuthSuccess,
    AuthFailure,
}

/// An audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditEvent {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    /// User who triggered the event (if known).
    pub user_id: Option<String>,
    /// Resource affected (wallet id, pool id, rule id).
    pub resource_id: Option<String>,
    pub resource_type: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
    pub success: bool,
    pub error: Option<String>,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type,
            user_id: None,
            resource_id: None,
            resource_type: None,
            details: None,
            success: true,
            error: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_resource(
        mut self,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        self.resource_type = Some(resource_type.into());
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Mark as failed with error message.
    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }

    fn key(&self) -> String {
        format!(
            "{}|{}",
            ordered_millis(self.timestamp.timestamp_millis()),
            self.event_id
        )
    }

    /// Append this event in its own transaction.
    ///
    /// Audit failures are logged and swallowed; they never fail the
    /// operation being audited.
    pub fn record(self, store: &Store) {
        if let Err(e) = store.write(|txn| AuditRepository::new(txn).log(&self)) {
            tracing::warn!(
                error = %e,
                event_type = ?self.event_type,
                "Failed to write audit event"
            );
        }
    }
}

/// Repository for audit events.
pub struct AuditRepository<'t, T> {
    txn: &'t T,
}

impl<'t, T: ReadTxn> AuditRepository<'t, T> {
    pub fn new(txn: &'t T) -> Self {
        Self { txn }
    }

    /// All events in chronological order.
    pub fn list(&self) -> StorageResult<Vec<AuditEvent>> {
        self.txn.scan_json(AUDIT_EVENTS, "")
    }

    pub fn search_by_user(&self, user_id: &str) -> StorageResult<Vec<AuditEvent>> {
        let mut events = self.list()?;
        events.retain(|e| e.user_id.as_deref() == Some(user_id));
        Ok(events)
    }

    pub fn search_by_resource(
        &self,
        resource_type: &str,
        resource_id: &str,
    ) -> StorageResult<Vec<AuditEvent>> {
        let mut events = self.list()?;
        events.retain(|e| {
            e.resource_type.as_deref() == Some(resource_type)
                && e.resource_id.as_deref() == Some(resource_id)
        });
        Ok(events)
    }
}

impl<'t, T: WriteTxn> AuditRepository<'t, T> {
    pub fn log(&self, event: &AuditEvent) -> StorageResult<()> {
        self.txn.put_json(AUDIT_EVENTS, &event.key(), event)
    }
}
