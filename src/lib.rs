// MindCare - Student wellbeing risk screening and crisis escalation
// Library exports

pub mod config;
pub mod conversation; // Conversation log writer
pub mod crisis; // Classification, alerts, fan-out
pub mod errors;
pub mod identity;
pub mod metrics;
pub mod notify; // Mail and real-time transports
pub mod pipeline;
pub mod providers; // Generative text service
pub mod recommendations;
pub mod responder; // Response strategy selection + offline engine
pub mod server; // HTTP surface
pub mod store;
