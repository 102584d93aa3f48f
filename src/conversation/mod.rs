// Conversation log writer
//
// One immutable entry per turn. Writes are best-effort relative to replying:
// a failed append is logged and counted, never returned to the student.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::crisis::RiskTier;
use crate::metrics::Telemetry;
use crate::store::{self, Collection, DocumentId, DocumentStore, Query, StoreError, Stored};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationEntry {
    pub owner_id: String,
    pub text: String,
    pub sender: Sender,
    pub risk_tag: RiskTier,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct ConversationLog {
    store: Arc<dyn DocumentStore>,
    telemetry: Arc<Telemetry>,
}

impl ConversationLog {
    pub fn new(store: Arc<dyn DocumentStore>, telemetry: Arc<Telemetry>) -> Self {
        Self { store, telemetry }
    }

    pub async fn append(
        &self,
        owner_id: &str,
        text: &str,
        sender: Sender,
        risk_tag: RiskTier,
    ) -> Result<DocumentId, StoreError> {
        let entry = ConversationEntry {
            owner_id: owner_id.to_string(),
            text: text.to_string(),
            sender,
            risk_tag,
            created_at: Utc::now(),
        };
        store::insert(self.store.as_ref(), Collection::ConversationEntries, &entry).await
    }

    /// Append, logging and counting a failure instead of returning it
    pub async fn append_best_effort(
        &self,
        owner_id: &str,
        text: &str,
        sender: Sender,
        risk_tag: RiskTier,
    ) -> Option<DocumentId> {
        match self.append(owner_id, text, sender, risk_tag).await {
            Ok(id) => Some(id),
            Err(e) => {
                self.telemetry.record_log_failure();
                tracing::warn!(
                    owner_id = %owner_id,
                    sender = sender.as_str(),
                    error = %e,
                    "Failed to write conversation entry"
                );
                None
            }
        }
    }

    /// Most recent entries for one student, newest first
    pub async fn history(
        &self,
        owner_id: &str,
        limit: usize,
    ) -> Result<Vec<Stored<ConversationEntry>>, StoreError> {
        let query = Query::new()
            .eq("ownerId", owner_id)
            .newest_first("createdAt")
            .limit(limit);
        store::find_as(self.store.as_ref(), Collection::ConversationEntries, &query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn log(store: Arc<MemoryStore>) -> (ConversationLog, Arc<Telemetry>) {
        let telemetry = Arc::new(Telemetry::new().unwrap());
        (ConversationLog::new(store, telemetry.clone()), telemetry)
    }

    #[tokio::test]
    async fn test_history_is_per_owner_newest_first() {
        let store = Arc::new(MemoryStore::new());
        let (log, _) = log(store.clone());

        log.append("s1", "first", Sender::User, RiskTier::Low).await.unwrap();
        log.append("s2", "other", Sender::User, RiskTier::None).await.unwrap();
        log.append("s1", "reply", Sender::Assistant, RiskTier::Low).await.unwrap();

        let history = log.history("s1", 10).await.unwrap();
        let texts: Vec<&str> = history.iter().map(|e| e.record.text.as_str()).collect();
        assert_eq!(texts, vec!["reply", "first"]);

        assert_eq!(log.history("s1", 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_entry_serialization() {
        let store = Arc::new(MemoryStore::new());
        let (log, _) = log(store.clone());
        log.append("s1", "help", Sender::User, RiskTier::High).await.unwrap();

        let docs = store.snapshot(Collection::ConversationEntries);
        assert_eq!(docs[0].body["sender"], "user");
        assert_eq!(docs[0].body["riskTag"], "high");
        assert_eq!(docs[0].body["ownerId"], "s1");
    }
}
