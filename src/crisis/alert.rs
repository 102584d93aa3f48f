// Crisis alert records and their manager
//
// An alert is created in `pending` exactly once per high-risk message and is
// the durable source of truth for escalation. Status only moves forward.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::metrics::Telemetry;
use crate::store::{self, Collection, DocumentStore, Query, StoreError, Stored};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Pending,
    Contacted,
    Resolved,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Pending => "pending",
            AlertStatus::Contacted => "contacted",
            AlertStatus::Resolved => "resolved",
        }
    }

    /// Forward-only: the target must be strictly later in the lifecycle
    pub fn can_advance_to(&self, next: AlertStatus) -> bool {
        next > *self
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(AlertStatus::Pending),
            "contacted" => Ok(AlertStatus::Contacted),
            "resolved" => Ok(AlertStatus::Resolved),
            other => Err(format!("unknown alert status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrisisAlert {
    pub owner_id: String,
    pub severity: Severity,
    pub status: AlertStatus,
    pub matched_signals: Vec<String>,
    pub trigger_text: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl CrisisAlert {
    /// Human-readable summary of the matched signals
    pub fn signal_summary(&self) -> String {
        format!("High risk detected: {}", self.matched_signals.join(", "))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AlertTransitionError {
    #[error("crisis alert {0} not found")]
    NotFound(String),

    #[error("crisis alert cannot move from {from} to {to}")]
    NotForward { from: AlertStatus, to: AlertStatus },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Creates alerts and applies responder status transitions
#[derive(Clone)]
pub struct CrisisAlertManager {
    store: Arc<dyn DocumentStore>,
    telemetry: Arc<Telemetry>,
}

impl CrisisAlertManager {
    pub fn new(store: Arc<dyn DocumentStore>, telemetry: Arc<Telemetry>) -> Self {
        Self { store, telemetry }
    }

    /// Persist a new `pending` alert. No deduplication across messages.
    pub async fn raise(
        &self,
        owner_id: &str,
        matched_signals: &[String],
        trigger_text: &str,
    ) -> Result<Stored<CrisisAlert>, StoreError> {
        let alert = CrisisAlert {
            owner_id: owner_id.to_string(),
            severity: Severity::High,
            status: AlertStatus::Pending,
            matched_signals: matched_signals.to_vec(),
            trigger_text: trigger_text.to_string(),
            created_at: Utc::now(),
            updated_at: None,
        };

        match store::insert(self.store.as_ref(), Collection::CrisisAlerts, &alert).await {
            Ok(id) => {
                self.telemetry.record_alert_raised();
                tracing::warn!(
                    alert_id = %id,
                    owner_id = %owner_id,
                    signals = %alert.matched_signals.join(", "),
                    "Crisis alert raised"
                );
                Ok(Stored { id, record: alert })
            }
            Err(e) => {
                self.telemetry.record_alert_persist_failure();
                tracing::error!(
                    owner_id = %owner_id,
                    error = %e,
                    "CRISIS ALERT NOT PERSISTED: escalation cannot proceed"
                );
                Err(e)
            }
        }
    }

    /// Move an alert forward through its lifecycle (responder action)
    ///
    /// The write only lands if the status is still the one that was checked.
    /// A concurrent transition makes it re-read and re-check, so two racing
    /// responders can never move an alert backwards.
    pub async fn update_status(
        &self,
        alert_id: &str,
        status: AlertStatus,
    ) -> Result<Stored<CrisisAlert>, AlertTransitionError> {
        loop {
            let current: Stored<CrisisAlert> =
                store::get_as(self.store.as_ref(), Collection::CrisisAlerts, alert_id)
                    .await?
                    .ok_or_else(|| AlertTransitionError::NotFound(alert_id.to_string()))?;

            if !current.record.status.can_advance_to(status) {
                return Err(AlertTransitionError::NotForward {
                    from: current.record.status,
                    to: status,
                });
            }

            let unchanged = Query::new().eq("status", current.record.status.as_str());
            let patch = json!({
                "status": status,
                "updatedAt": Utc::now(),
            });
            let Some(document) = self
                .store
                .update_if(Collection::CrisisAlerts, alert_id, &unchanged, patch)
                .await?
            else {
                tracing::debug!(alert_id = %alert_id, "Alert status changed concurrently, re-checking");
                continue;
            };

            let updated: Stored<CrisisAlert> = document.decode()?;
            tracing::info!(
                alert_id = %alert_id,
                from = %current.record.status,
                to = %status,
                "Crisis alert status updated"
            );
            return Ok(updated);
        }
    }

    /// Most recent alerts first, optionally filtered by status
    pub async fn list(
        &self,
        status: Option<AlertStatus>,
        limit: usize,
    ) -> Result<Vec<Stored<CrisisAlert>>, StoreError> {
        let mut query = Query::new().newest_first("createdAt").limit(limit);
        if let Some(status) = status {
            query = query.eq("status", status.as_str());
        }
        store::find_as(self.store.as_ref(), Collection::CrisisAlerts, &query).await
    }
}
