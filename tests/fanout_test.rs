// Notification fan-out: channel isolation and per-channel outcomes

mod common;

use common::{add_responder, test_config, HarnessBuilder, RecordingMailer};
use mindcare::crisis::{
    Channel, ChannelOutcome, CrisisAlertManager, FanoutReport, NotificationFanout,
};
use mindcare::identity::StudentIdentity;
use mindcare::metrics::Telemetry;
use mindcare::notify::{AlertBroadcaster, MailTransport, CRISIS_ALERT_TOPIC};
use mindcare::pipeline::Escalation;
use mindcare::store::{Collection, DocumentStore, MemoryStore};
use std::sync::Arc;
use std::time::{Duration, Instant};

async fn crisis_report(h: &common::Harness, student: &StudentIdentity) -> FanoutReport {
    let outcome = h
        .pipeline
        .handle_incoming_message(student, "I want to end my life")
        .await
        .unwrap();
    match outcome.escalation {
        Some(Escalation::Dispatched(pending)) => pending.report().await,
        other => panic!("expected a dispatched escalation, got {:?}", other),
    }
}

fn student() -> StudentIdentity {
    StudentIdentity::student("stu-9", "NightOwl")
}

#[tokio::test]
async fn test_failing_admin_email_does_not_block_other_channels() {
    let h = HarnessBuilder::new()
        .mailer(RecordingMailer::failing_for("admin@campus.edu"))
        .build()
        .await;

    let report = crisis_report(&h, &student()).await;

    let admin = report.outcome(Channel::AdminEmail).unwrap();
    assert!(admin.is_failed());
    match admin {
        ChannelOutcome::Failed { error } => assert!(error.contains("SMTP connection refused")),
        other => panic!("unexpected outcome {:?}", other),
    }
    assert!(report.outcome(Channel::ResponderEmail).unwrap().is_delivered());
    assert!(report.outcome(Channel::Realtime).unwrap().is_delivered());
    assert!(report.outcome(Channel::AutoEnrollment).unwrap().is_delivered());
    assert_eq!(report.failures(), 1);
    assert_eq!(h.mailer.recipients(), vec!["counselor@campus.edu".to_string()]);
}

#[tokio::test]
async fn test_panicking_channel_fails_alone() {
    let h = HarnessBuilder::new()
        .mailer(RecordingMailer::panicking_for("counselor@campus.edu"))
        .build()
        .await;

    let report = crisis_report(&h, &student()).await;

    match report.outcome(Channel::ResponderEmail).unwrap() {
        ChannelOutcome::Failed { error } => assert!(error.contains("panicked")),
        other => panic!("unexpected outcome {:?}", other),
    }
    assert!(report.outcome(Channel::AdminEmail).unwrap().is_delivered());
    assert!(report.outcome(Channel::Realtime).unwrap().is_delivered());
    assert!(report.outcome(Channel::AutoEnrollment).unwrap().is_delivered());
    assert_eq!(h.mailer.recipients(), vec!["admin@campus.edu".to_string()]);
}

#[tokio::test]
async fn test_failing_publisher_still_sends_email() {
    let h = HarnessBuilder::new().failing_publisher().build().await;

    let report = crisis_report(&h, &student()).await;

    assert!(report.outcome(Channel::Realtime).unwrap().is_failed());
    assert_eq!(
        h.mailer.recipients(),
        vec!["admin@campus.edu".to_string(), "counselor@campus.edu".to_string()]
    );
    // The alert stays on record for the monitoring view
    assert_eq!(h.store.len(Collection::CrisisAlerts), 1);
}

#[tokio::test]
async fn test_guardian_and_assigned_responder_are_notified() {
    let h = HarnessBuilder::new().build().await;
    let student = student()
        .with_guardian_email("parent@home.org")
        .with_responder_email("assigned@campus.edu");

    let report = crisis_report(&h, &student).await;

    assert!(report.outcome(Channel::GuardianEmail).unwrap().is_delivered());
    assert_eq!(
        h.mailer.recipients(),
        vec![
            "admin@campus.edu".to_string(),
            "assigned@campus.edu".to_string(),
            "parent@home.org".to_string(),
        ]
    );

    let sent = h.mailer.sent.lock().unwrap();
    assert!(sent
        .iter()
        .all(|m| m.subject == "Critical Safety Alert: Immediate Action Required"));
    assert!(sent.iter().all(|m| m.text.contains("NightOwl")));
}

#[tokio::test]
async fn test_missing_recipients_are_skipped() {
    let mut config = test_config();
    config.notifications.admin_email = None;
    config.notifications.default_responder_email = None;
    config.notifications.auto_enroll = false;
    let h = HarnessBuilder::new().config(config).build().await;

    let report = crisis_report(&h, &student()).await;

    assert_eq!(
        report.outcome(Channel::AdminEmail),
        Some(&ChannelOutcome::Skipped {
            reason: "no administrator address configured".to_string()
        })
    );
    assert_eq!(
        report.outcome(Channel::ResponderEmail),
        Some(&ChannelOutcome::Skipped {
            reason: "no responder address configured".to_string()
        })
    );
    assert_eq!(
        report.outcome(Channel::AutoEnrollment),
        Some(&ChannelOutcome::Skipped {
            reason: "auto-enrollment disabled".to_string()
        })
    );
    assert!(h.mailer.recipients().is_empty());
    assert_eq!(h.store.len(Collection::Enrollments), 0);
}

#[tokio::test]
async fn test_direct_dispatch_reaches_connected_monitor() {
    let store = Arc::new(MemoryStore::new());
    add_responder(&store, true).await;
    let telemetry = Arc::new(Telemetry::new().unwrap());
    let broadcaster = Arc::new(AlertBroadcaster::new(16));
    let mut monitor = broadcaster.subscribe();

    let backing: Arc<dyn DocumentStore> = store.clone();
    let alerts = CrisisAlertManager::new(backing.clone(), telemetry.clone());
    let alert = alerts
        .raise("stu-9", &["overdose".to_string()], "thinking about an overdose")
        .await
        .unwrap();

    let fanout = NotificationFanout::new(
        broadcaster.clone(),
        None::<Arc<dyn MailTransport>>,
        backing,
        test_config().notifications,
        telemetry,
    );
    let report = fanout.dispatch(&alert, &student()).await;

    assert!(report.outcome(Channel::Realtime).unwrap().is_delivered());
    assert_eq!(
        report.outcome(Channel::AdminEmail),
        Some(&ChannelOutcome::Skipped {
            reason: "mail transport not configured".to_string()
        })
    );
    assert!(report.outcome(Channel::AutoEnrollment).unwrap().is_delivered());

    let event = monitor.recv().await.unwrap();
    assert_eq!(event.topic, CRISIS_ALERT_TOPIC);
    assert_eq!(event.payload.alert_id, alert.id);
    assert_eq!(event.payload.student_alias, "NightOwl");
    assert_eq!(event.payload.severity, "high");
    assert_eq!(event.payload.message, "High risk detected: overdose");
}

#[tokio::test]
async fn test_realtime_without_monitors_is_skipped() {
    let store = Arc::new(MemoryStore::new());
    let telemetry = Arc::new(Telemetry::new().unwrap());
    let backing: Arc<dyn DocumentStore> = store.clone();
    let alert = CrisisAlertManager::new(backing.clone(), telemetry.clone())
        .raise("stu-9", &["kill myself".to_string()], "i will kill myself")
        .await
        .unwrap();

    let fanout = NotificationFanout::new(
        Arc::new(AlertBroadcaster::new(16)),
        None,
        backing,
        test_config().notifications,
        telemetry,
    );
    let report = fanout.dispatch(&alert, &student()).await;

    assert_eq!(
        report.outcome(Channel::Realtime),
        Some(&ChannelOutcome::Skipped {
            reason: "no monitoring clients connected".to_string()
        })
    );
    assert_eq!(
        report.outcome(Channel::AutoEnrollment),
        Some(&ChannelOutcome::Skipped {
            reason: "no responder available".to_string()
        })
    );
    assert_eq!(report.failures(), 0);
}

#[tokio::test]
async fn test_channels_are_dispatched_concurrently() {
    let store = Arc::new(MemoryStore::new());
    let telemetry = Arc::new(Telemetry::new().unwrap());
    let backing: Arc<dyn DocumentStore> = store.clone();
    let alert = CrisisAlertManager::new(backing.clone(), telemetry.clone())
        .raise("stu-9", &["overdose".to_string()], "overdose")
        .await
        .unwrap();

    let delay = Duration::from_millis(200);
    let mailer: Arc<dyn MailTransport> = Arc::new(RecordingMailer::slow(delay));
    let fanout = NotificationFanout::new(
        Arc::new(AlertBroadcaster::new(16)),
        Some(mailer),
        backing,
        test_config().notifications,
        telemetry,
    );
    let student = student().with_guardian_email("parent@home.org");

    let started = Instant::now();
    let report = fanout.dispatch(&alert, &student).await;
    let elapsed = started.elapsed();

    assert!(report.outcome(Channel::ResponderEmail).unwrap().is_delivered());
    assert!(report.outcome(Channel::AdminEmail).unwrap().is_delivered());
    assert!(report.outcome(Channel::GuardianEmail).unwrap().is_delivered());
    // Three sends one after another would take at least 600ms
    assert!(elapsed >= delay);
    assert!(elapsed < delay * 2, "dispatch took {:?}", elapsed);
}
