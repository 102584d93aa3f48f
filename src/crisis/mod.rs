// Crisis handling
//
// Risk classification, alert records, emergency enrollment and the
// notification fan-out that runs once an alert is persisted.

pub mod alert;
pub mod detector;
pub mod enrollment;
pub mod fanout;

pub use alert::{AlertStatus, AlertTransitionError, CrisisAlert, CrisisAlertManager, Severity};
pub use detector::{RiskClassifier, RiskResult, RiskTier, SignalCategory, SignalLists};
pub use enrollment::{
    auto_enroll, EmergencyEnrollment, EnrollmentOutcome, ResponderProfile, URGENT_MARKER,
};
pub use fanout::{Channel, ChannelOutcome, FanoutReport, NotificationFanout};
