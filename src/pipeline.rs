// Message pipeline
//
// One inbound message is one unit of work:
//
//   classify -> log user entry -> [high: raise alert, start fan-out]
//            -> respond -> log assistant entry
//
// The alert write completes before fan-out starts. Both run on one spawned
// task, so a caller that disconnects mid-write cannot cancel an escalation
// whose alert has already landed.

use anyhow::Result;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::conversation::{ConversationLog, Sender};
use crate::crisis::{
    CrisisAlert, CrisisAlertManager, FanoutReport, NotificationFanout, RiskClassifier, RiskResult,
    RiskTier,
};
use crate::identity::StudentIdentity;
use crate::metrics::Telemetry;
use crate::notify::{MailTransport, RealtimePublisher};
use crate::providers::TextGenerator;
use crate::recommendations::{ContentCategory, RecommendationLookup, Resource};
use crate::responder::ResponseStrategySelector;
use crate::store::{DocumentId, DocumentStore, StoreError, Stored};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Message is required")]
    EmptyMessage,

    #[error("crisis alert could not be persisted: {0}")]
    AlertNotPersisted(#[source] StoreError),
}

/// What the caller (chat UI) receives for one message
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponsePayload {
    pub level: RiskTier,
    /// Classifier category name (`crisis`, `anxiety`, `general`, ...)
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<Vec<Stored<Resource>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<ContentCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emergency_helpline: Option<Vec<String>>,
}

/// Fan-out running on its own task
#[derive(Debug)]
pub struct PendingFanout {
    alert_id: DocumentId,
    /// `None` only if the alert write failed, which the turn reports separately
    handle: JoinHandle<Option<FanoutReport>>,
}

impl PendingFanout {
    pub fn alert_id(&self) -> &str {
        &self.alert_id
    }

    /// Wait for every channel to finish
    ///
    /// Dropping a `PendingFanout` instead leaves the task running.
    pub async fn report(self) -> FanoutReport {
        match self.handle.await {
            Ok(Some(report)) => report,
            Ok(None) => FanoutReport::aborted(self.alert_id, "crisis alert was not persisted"),
            Err(e) => {
                tracing::error!(alert_id = %self.alert_id, error = %e, "Fan-out task aborted");
                FanoutReport::aborted(self.alert_id, &e.to_string())
            }
        }
    }
}

/// Escalation state of a high-risk turn
#[derive(Debug)]
pub enum Escalation {
    Dispatched(PendingFanout),
    /// The alert write failed; nothing was fanned out
    NotPersisted { error: String },
}

#[derive(Debug)]
pub struct TurnOutcome {
    pub payload: ResponsePayload,
    pub escalation: Option<Escalation>,
}

/// External collaborators the pipeline is built from
pub struct PipelineDeps {
    pub store: Arc<dyn DocumentStore>,
    /// `None` runs the offline engine only
    pub generator: Option<Arc<dyn TextGenerator>>,
    pub publisher: Arc<dyn RealtimePublisher>,
    pub mailer: Option<Arc<dyn MailTransport>>,
    pub telemetry: Arc<Telemetry>,
}

pub struct MessagePipeline {
    classifier: RiskClassifier,
    responder: ResponseStrategySelector,
    conversation: ConversationLog,
    alerts: CrisisAlertManager,
    fanout: Arc<NotificationFanout>,
    helplines: Vec<String>,
    telemetry: Arc<Telemetry>,
}

impl MessagePipeline {
    pub fn new(config: &Config, deps: PipelineDeps) -> Result<Self> {
        let classifier = match &config.signal_lists_path {
            Some(path) => RiskClassifier::load_from_file(path)?,
            None => RiskClassifier::default(),
        };

        let recommendations =
            RecommendationLookup::new(deps.store.clone(), config.recommendations.cap);
        let responder = ResponseStrategySelector::new(
            deps.generator,
            recommendations,
            Duration::from_secs(config.generative.timeout_secs),
            deps.telemetry.clone(),
        );
        let conversation = ConversationLog::new(deps.store.clone(), deps.telemetry.clone());
        let alerts = CrisisAlertManager::new(deps.store.clone(), deps.telemetry.clone());
        let fanout = NotificationFanout::new(
            deps.publisher,
            deps.mailer,
            deps.store,
            config.notifications.clone(),
            deps.telemetry.clone(),
        );

        Ok(Self {
            classifier,
            responder,
            conversation,
            alerts,
            fanout: Arc::new(fanout),
            helplines: config.helplines.clone(),
            telemetry: deps.telemetry,
        })
    }

    pub fn classify_message(&self, text: &str) -> RiskResult {
        self.classifier.classify(text)
    }

    pub fn alerts(&self) -> &CrisisAlertManager {
        &self.alerts
    }

    pub fn conversation(&self) -> &ConversationLog {
        &self.conversation
    }

    pub fn is_offline(&self) -> bool {
        self.responder.is_offline()
    }

    /// Persist a crisis alert for a high-risk message
    pub async fn raise_crisis_alert(
        &self,
        student: &StudentIdentity,
        matched_signals: &[String],
        trigger_text: &str,
    ) -> Result<Stored<CrisisAlert>, PipelineError> {
        self.alerts
            .raise(&student.id, matched_signals, trigger_text)
            .await
            .map_err(PipelineError::AlertNotPersisted)
    }

    /// Fan a persisted alert out and wait for the report
    pub async fn dispatch_notifications(
        &self,
        alert: &Stored<CrisisAlert>,
        student: &StudentIdentity,
    ) -> FanoutReport {
        self.fanout.dispatch(alert, student).await
    }

    /// Process one message end to end
    pub async fn handle_incoming_message(
        &self,
        student: &StudentIdentity,
        text: &str,
    ) -> Result<TurnOutcome, PipelineError> {
        if text.trim().is_empty() {
            return Err(PipelineError::EmptyMessage);
        }

        let risk = self.classifier.classify(text);
        self.telemetry.record_message(risk.tier);
        tracing::info!(
            owner_id = %student.id,
            message = %fingerprint(text),
            tier = %risk.tier,
            category = %risk.category,
            "Message classified"
        );

        self.conversation
            .append_best_effort(&student.id, text, Sender::User, risk.tier)
            .await;

        let escalation = if risk.tier == RiskTier::High {
            Some(self.escalate(student, &risk, text).await)
        } else {
            None
        };

        let reply = self.responder.respond(risk.tier, text, student).await;

        // Assistant replies are calming text, tagged low whatever the user tier
        self.conversation
            .append_best_effort(&student.id, &reply.text, Sender::Assistant, RiskTier::Low)
            .await;

        let emergency_helpline = (risk.tier == RiskTier::High).then(|| self.helplines.clone());
        let recommendations = (!reply.recommendations.is_empty()).then_some(reply.recommendations);

        let payload = ResponsePayload {
            level: risk.tier,
            kind: risk.category,
            message: reply.text,
            recommendations,
            category: reply.category,
            emergency_helpline,
        };

        Ok(TurnOutcome {
            payload,
            escalation,
        })
    }

    /// Raise the alert and fan it out on a detached task
    ///
    /// The turn waits only for the alert write outcome. Dropping the turn at
    /// any point leaves the task running.
    async fn escalate(&self, student: &StudentIdentity, risk: &RiskResult, text: &str) -> Escalation {
        let (written, alert_written) = oneshot::channel();
        let alerts = self.alerts.clone();
        let fanout = self.fanout.clone();
        let student = student.clone();
        let signals = risk.matched_signals.clone();
        let text = text.to_string();

        let handle = tokio::spawn(async move {
            match alerts.raise(&student.id, &signals, &text).await {
                Ok(alert) => {
                    let _ = written.send(Ok(alert.id.clone()));
                    Some(fanout.dispatch(&alert, &student).await)
                }
                Err(e) => {
                    let _ = written.send(Err(PipelineError::AlertNotPersisted(e)));
                    None
                }
            }
        });

        match alert_written.await {
            Ok(Ok(alert_id)) => Escalation::Dispatched(PendingFanout { alert_id, handle }),
            Ok(Err(e)) => Escalation::NotPersisted {
                error: e.to_string(),
            },
            Err(_) => {
                tracing::error!("CRISIS ALERT NOT PERSISTED: escalation task ended before the alert write finished");
                Escalation::NotPersisted {
                    error: "escalation task ended unexpectedly".to_string(),
                }
            }
        }
    }
}

/// Short stable identifier for a message, logged instead of its text
pub fn fingerprint(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    digest[..6].iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::AlertBroadcaster;
    use crate::store::MemoryStore;

    fn pipeline() -> MessagePipeline {
        let deps = PipelineDeps {
            store: Arc::new(MemoryStore::new()),
            generator: None,
            publisher: Arc::new(AlertBroadcaster::default()),
            mailer: None,
            telemetry: Arc::new(Telemetry::new().unwrap()),
        };
        MessagePipeline::new(&Config::default(), deps).unwrap()
    }

    #[test]
    fn test_fingerprint_is_short_and_stable() {
        let a = fingerprint("I want to end my life");
        assert_eq!(a.len(), 12);
        assert_eq!(a, fingerprint("I want to end my life"));
        assert_ne!(a, fingerprint("hello"));
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let pipeline = pipeline();
        let student = StudentIdentity::student("s1", "Owl");
        let err = pipeline
            .handle_incoming_message(&student, "   ")
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::EmptyMessage));
        assert_eq!(err.to_string(), "Message is required");
    }

    #[tokio::test]
    async fn test_payload_serialization() {
        let pipeline = pipeline();
        let student = StudentIdentity::student("s1", "Owl");
        let outcome = pipeline
            .handle_incoming_message(&student, "I want to end my life")
            .await
            .unwrap();

        let json = serde_json::to_value(&outcome.payload).unwrap();
        assert_eq!(json["level"], "high");
        assert_eq!(json["type"], "crisis");
        assert_eq!(json["emergencyHelpline"][0], "+1-800-273-8255");
        assert!(json.get("category").is_none());
    }

    #[tokio::test]
    async fn test_non_crisis_payload_has_no_helplines() {
        let pipeline = pipeline();
        let student = StudentIdentity::student("s1", "Owl");
        let outcome = pipeline
            .handle_incoming_message(&student, "thanks, that helped")
            .await
            .unwrap();

        assert!(outcome.escalation.is_none());
        let json = serde_json::to_value(&outcome.payload).unwrap();
        assert_eq!(json["level"], "low");
        assert_eq!(json["type"], "gratitude");
        assert!(json.get("emergencyHelpline").is_none());
    }
}
