// Notification transports
//
// Mail delivery and real-time publishing used by the crisis fan-out. Both are
// traits so the fan-out can be exercised without a network.

mod mail;
mod realtime;

pub use mail::{EmailMessage, HttpMailRelay, MailTransport};
pub use realtime::{AlertBroadcaster, AlertEvent, RealtimeEvent, RealtimePublisher, CRISIS_ALERT_TOPIC};
