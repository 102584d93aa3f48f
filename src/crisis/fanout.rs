// Notification fan-out
//
// Delivers one crisis alert to every configured channel concurrently. Each
// channel resolves to its own outcome; nothing a channel does can abort the
// others. The alert must already be persisted before `dispatch` is called.

use chrono::Utc;
use futures::FutureExt;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use super::alert::CrisisAlert;
use super::enrollment::{auto_enroll, EnrollmentOutcome};
use crate::config::NotificationSettings;
use crate::identity::StudentIdentity;
use crate::metrics::Telemetry;
use crate::notify::{AlertEvent, EmailMessage, MailTransport, RealtimePublisher, CRISIS_ALERT_TOPIC};
use crate::store::{DocumentId, DocumentStore, Stored};

const ALERT_SUBJECT: &str = "Critical Safety Alert: Immediate Action Required";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Realtime,
    ResponderEmail,
    AdminEmail,
    GuardianEmail,
    AutoEnrollment,
}

impl Channel {
    pub const ALL: [Channel; 5] = [
        Channel::Realtime,
        Channel::ResponderEmail,
        Channel::AdminEmail,
        Channel::GuardianEmail,
        Channel::AutoEnrollment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Realtime => "realtime",
            Channel::ResponderEmail => "responder_email",
            Channel::AdminEmail => "admin_email",
            Channel::GuardianEmail => "guardian_email",
            Channel::AutoEnrollment => "auto_enrollment",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ChannelOutcome {
    Delivered { detail: Option<String> },
    /// Not applicable for this alert (no recipient, nobody listening, disabled)
    Skipped { reason: String },
    Failed { error: String },
}

impl ChannelOutcome {
    fn delivered(detail: impl Into<String>) -> Self {
        ChannelOutcome::Delivered {
            detail: Some(detail.into()),
        }
    }

    fn skipped(reason: impl Into<String>) -> Self {
        ChannelOutcome::Skipped {
            reason: reason.into(),
        }
    }

    fn failed(error: impl fmt::Display) -> Self {
        ChannelOutcome::Failed {
            error: error.to_string(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ChannelOutcome::Delivered { .. } => "delivered",
            ChannelOutcome::Skipped { .. } => "skipped",
            ChannelOutcome::Failed { .. } => "failed",
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, ChannelOutcome::Delivered { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ChannelOutcome::Failed { .. })
    }
}

/// Per-channel outcomes for one alert
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FanoutReport {
    pub alert_id: DocumentId,
    pub outcomes: BTreeMap<Channel, ChannelOutcome>,
}

impl FanoutReport {
    /// Report used when the dispatch task itself died
    pub fn aborted(alert_id: impl Into<DocumentId>, reason: &str) -> Self {
        let outcomes = Channel::ALL
            .into_iter()
            .map(|channel| (channel, ChannelOutcome::failed(reason)))
            .collect();
        Self {
            alert_id: alert_id.into(),
            outcomes,
        }
    }

    pub fn outcome(&self, channel: Channel) -> Option<&ChannelOutcome> {
        self.outcomes.get(&channel)
    }

    pub fn failures(&self) -> usize {
        self.outcomes.values().filter(|o| o.is_failed()).count()
    }

    pub fn delivered(&self) -> usize {
        self.outcomes.values().filter(|o| o.is_delivered()).count()
    }
}

/// Fans a persisted alert out to every notification channel
pub struct NotificationFanout {
    publisher: Arc<dyn RealtimePublisher>,
    mailer: Option<Arc<dyn MailTransport>>,
    store: Arc<dyn DocumentStore>,
    settings: NotificationSettings,
    telemetry: Arc<Telemetry>,
}

impl NotificationFanout {
    pub fn new(
        publisher: Arc<dyn RealtimePublisher>,
        mailer: Option<Arc<dyn MailTransport>>,
        store: Arc<dyn DocumentStore>,
        settings: NotificationSettings,
        telemetry: Arc<Telemetry>,
    ) -> Self {
        Self {
            publisher,
            mailer,
            store,
            settings,
            telemetry,
        }
    }

    /// Deliver the alert on every channel concurrently and collect outcomes
    pub async fn dispatch(
        &self,
        alert: &Stored<CrisisAlert>,
        student: &StudentIdentity,
    ) -> FanoutReport {
        let email = compose_email(&alert.record, student);

        let responder = student
            .responder_email
            .as_deref()
            .or(self.settings.default_responder_email.as_deref());
        let admin = self.settings.admin_email.as_deref();
        let guardian = student.guardian_email.as_deref();

        let (realtime, responder, admin, guardian, enrollment) = tokio::join!(
            isolated(Channel::Realtime, self.publish_realtime(alert, student)),
            isolated(
                Channel::ResponderEmail,
                self.send_email(Channel::ResponderEmail, responder, &email)
            ),
            isolated(
                Channel::AdminEmail,
                self.send_email(Channel::AdminEmail, admin, &email)
            ),
            isolated(
                Channel::GuardianEmail,
                self.send_email(Channel::GuardianEmail, guardian, &email)
            ),
            isolated(Channel::AutoEnrollment, self.enroll(alert, student)),
        );

        let outcomes = BTreeMap::from([
            (Channel::Realtime, realtime),
            (Channel::ResponderEmail, responder),
            (Channel::AdminEmail, admin),
            (Channel::GuardianEmail, guardian),
            (Channel::AutoEnrollment, enrollment),
        ]);

        for (channel, outcome) in &outcomes {
            match outcome {
                ChannelOutcome::Failed { error } => tracing::error!(
                    alert_id = %alert.id,
                    channel = %channel,
                    error = %error,
                    "Notification channel failed"
                ),
                ChannelOutcome::Skipped { reason } => tracing::info!(
                    alert_id = %alert.id,
                    channel = %channel,
                    reason = %reason,
                    "Notification channel skipped"
                ),
                ChannelOutcome::Delivered { .. } => tracing::debug!(
                    alert_id = %alert.id,
                    channel = %channel,
                    "Notification channel delivered"
                ),
            }
        }

        let report = FanoutReport {
            alert_id: alert.id.clone(),
            outcomes,
        };
        self.telemetry.record_fanout(&report);
        report
    }

    async fn publish_realtime(
        &self,
        alert: &Stored<CrisisAlert>,
        student: &StudentIdentity,
    ) -> ChannelOutcome {
        let event = AlertEvent {
            alert_id: alert.id.clone(),
            student_alias: student.alias.clone(),
            severity: alert.record.severity.as_str().to_string(),
            message: alert.record.signal_summary(),
            timestamp: Utc::now(),
        };

        match self.publisher.publish(CRISIS_ALERT_TOPIC, &event) {
            Ok(0) => ChannelOutcome::skipped("no monitoring clients connected"),
            Ok(count) => ChannelOutcome::delivered(format!("{} monitors", count)),
            Err(e) => ChannelOutcome::failed(e),
        }
    }

    async fn send_email(
        &self,
        channel: Channel,
        recipient: Option<&str>,
        email: &ComposedEmail,
    ) -> ChannelOutcome {
        let Some(recipient) = recipient else {
            return ChannelOutcome::skipped(match channel {
                Channel::GuardianEmail => "no guardian contact on file",
                Channel::AdminEmail => "no administrator address configured",
                _ => "no responder address configured",
            });
        };
        let Some(mailer) = &self.mailer else {
            return ChannelOutcome::skipped("mail transport not configured");
        };

        let message = email.to(recipient);
        match mailer.send(&message).await {
            Ok(()) => ChannelOutcome::delivered(recipient),
            Err(e) => ChannelOutcome::failed(format!("{:#}", e)),
        }
    }

    async fn enroll(&self, alert: &Stored<CrisisAlert>, student: &StudentIdentity) -> ChannelOutcome {
        if !self.settings.auto_enroll {
            return ChannelOutcome::skipped("auto-enrollment disabled");
        }

        match auto_enroll(self.store.as_ref(), &student.id, &alert.record.matched_signals).await {
            Ok(EnrollmentOutcome::Booked { enrollment_id, .. }) => {
                ChannelOutcome::delivered(enrollment_id)
            }
            Ok(EnrollmentOutcome::NoResponderAvailable) => {
                ChannelOutcome::skipped("no responder available")
            }
            Err(e) => ChannelOutcome::failed(e),
        }
    }
}

/// Run one channel, turning a panic into a `Failed` outcome for that channel only
async fn isolated(channel: Channel, delivery: impl Future<Output = ChannelOutcome>) -> ChannelOutcome {
    match AssertUnwindSafe(delivery).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(_) => ChannelOutcome::failed(format!("{} channel panicked", channel)),
    }
}

/// Subject and bodies shared by every email channel
struct ComposedEmail {
    subject: String,
    text: String,
    html: String,
}

impl ComposedEmail {
    fn to(&self, recipient: &str) -> EmailMessage {
        EmailMessage {
            to: recipient.to_string(),
            subject: self.subject.clone(),
            text: self.text.clone(),
            html: self.html.clone(),
        }
    }
}

fn compose_email(alert: &CrisisAlert, student: &StudentIdentity) -> ComposedEmail {
    let signals = alert.matched_signals.join(", ");
    let who = match &student.display_name {
        Some(name) => format!("{} (Anonymous ID: {})", name, student.alias),
        None => format!("Anonymous ID: {}", student.alias),
    };

    let text = format!(
        "URGENT: A critical safety concern has been detected for student {}.\n\n\
         Detected signals: {}\n\n\
         Please contact them immediately to ensure their safety.",
        who, signals
    );

    let name_row = student
        .display_name
        .as_ref()
        .map(|name| format!("<p><strong>Name:</strong> {}</p>", escape_html(name)))
        .unwrap_or_default();
    let html = format!(
        "<div style=\"font-family: Arial, sans-serif; padding: 20px;\">\
         <h2 style=\"color: #d32f2f;\">Emergency Safety Alert</h2>\
         <p>A critical message indicating potential risk was detected from:</p>\
         {}<p><strong>Anonymous ID:</strong> {}</p>\
         <p style=\"color: #c62828;\"><strong>Detected concern:</strong> {}</p>\
         <p style=\"font-weight: bold;\">Please make contact immediately to verify their safety.</p>\
         </div>",
        name_row,
        escape_html(&student.alias),
        escape_html(&signals)
    );

    ComposedEmail {
        subject: ALERT_SUBJECT.to_string(),
        text,
        html,
    }
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
