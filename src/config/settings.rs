// Configuration structs

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration, built once at startup and handed to constructors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Emergency helpline numbers returned on high-risk replies
    pub helplines: Vec<String>,
    /// Optional JSON file overriding the built-in signal lists
    pub signal_lists_path: Option<PathBuf>,
    pub generative: GenerativeSettings,
    pub notifications: NotificationSettings,
    pub recommendations: RecommendationSettings,
    pub server: ServerSettings,
    pub storage: StorageSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            helplines: vec!["+1-800-273-8255".to_string(), "+91-9152987821".to_string()],
            signal_lists_path: None,
            generative: GenerativeSettings::default(),
            notifications: NotificationSettings::default(),
            recommendations: RecommendationSettings::default(),
            server: ServerSettings::default(),
            storage: StorageSettings::default(),
        }
    }
}

/// Generative text service settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerativeSettings {
    /// API key; absent or placeholder keys route straight to the offline engine
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    /// Upper bound on a single generation call
    pub timeout_secs: u64,
}

impl Default for GenerativeSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-1.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            timeout_secs: 15,
        }
    }
}

/// Escalation recipients and transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    /// Used when the student has no assigned responder
    pub default_responder_email: Option<String>,
    pub admin_email: Option<String>,
    /// Mail relay endpoint; without it email channels are skipped
    pub mail_relay_url: Option<String>,
    pub mail_relay_token: Option<String>,
    pub sender_address: String,
    /// Book an urgent session with an available responder on crisis
    pub auto_enroll: bool,
    /// Real-time channel buffer size
    pub alert_channel_capacity: usize,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            default_responder_email: None,
            admin_email: None,
            mail_relay_url: None,
            mail_relay_token: None,
            sender_address: "MindCare Support <alerts@mindcare.local>".to_string(),
            auto_enroll: true,
            alert_channel_capacity: 256,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationSettings {
    /// Maximum items attached to a reply
    pub cap: usize,
}

impl Default for RecommendationSettings {
    fn default() -> Self {
        Self { cap: 2 }
    }
}

/// HTTP server settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_address: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8000".to_string(),
        }
    }
}

/// Document store settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// JSONL data directory; in-memory store when unset
    pub data_dir: Option<PathBuf>,
}
