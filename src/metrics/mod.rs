// Metrics module
// Prometheus counters for the screening and escalation pipeline

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use crate::crisis::{Channel, ChannelOutcome, FanoutReport, RiskTier};

/// Operational telemetry shared by every pipeline component
pub struct Telemetry {
    registry: Registry,
    messages_total: IntCounterVec,
    generation_fallbacks_total: IntCounterVec,
    alerts_raised_total: IntCounter,
    alert_persist_failures_total: IntCounter,
    fanout_outcomes_total: IntCounterVec,
    conversation_log_failures_total: IntCounter,
}

impl Telemetry {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let messages_total = IntCounterVec::new(
            Opts::new("mindcare_messages_total", "Messages classified, by risk tier"),
            &["tier"],
        )?;
        let generation_fallbacks_total = IntCounterVec::new(
            Opts::new(
                "mindcare_generation_fallbacks_total",
                "Replies served by the offline engine, by reason",
            ),
            &["reason"],
        )?;
        let alerts_raised_total =
            IntCounter::new("mindcare_alerts_raised_total", "Crisis alerts persisted")?;
        let alert_persist_failures_total = IntCounter::new(
            "mindcare_alert_persist_failures_total",
            "Crisis alerts that could not be persisted",
        )?;
        let fanout_outcomes_total = IntCounterVec::new(
            Opts::new(
                "mindcare_fanout_outcomes_total",
                "Notification channel outcomes",
            ),
            &["channel", "outcome"],
        )?;
        let conversation_log_failures_total = IntCounter::new(
            "mindcare_conversation_log_failures_total",
            "Conversation entries that could not be written",
        )?;

        registry.register(Box::new(messages_total.clone()))?;
        registry.register(Box::new(generation_fallbacks_total.clone()))?;
        registry.register(Box::new(alerts_raised_total.clone()))?;
        registry.register(Box::new(alert_persist_failures_total.clone()))?;
        registry.register(Box::new(fanout_outcomes_total.clone()))?;
        registry.register(Box::new(conversation_log_failures_total.clone()))?;

        Ok(Self {
            registry,
            messages_total,
            generation_fallbacks_total,
            alerts_raised_total,
            alert_persist_failures_total,
            fanout_outcomes_total,
            conversation_log_failures_total,
        })
    }

    pub fn record_message(&self, tier: RiskTier) {
        self.messages_total.with_label_values(&[tier.as_str()]).inc();
    }

    pub fn record_fallback(&self, reason: &str) {
        self.generation_fallbacks_total
            .with_label_values(&[reason])
            .inc();
    }

    pub fn record_alert_raised(&self) {
        self.alerts_raised_total.inc();
    }

    pub fn record_alert_persist_failure(&self) {
        self.alert_persist_failures_total.inc();
    }

    pub fn record_log_failure(&self) {
        self.conversation_log_failures_total.inc();
    }

    pub fn record_fanout(&self, report: &FanoutReport) {
        for (channel, outcome) in &report.outcomes {
            self.record_channel(*channel, outcome);
        }
    }

    fn record_channel(&self, channel: Channel, outcome: &ChannelOutcome) {
        self.fanout_outcomes_total
            .with_label_values(&[channel.as_str(), outcome.label()])
            .inc();
    }

    pub fn alerts_raised(&self) -> u64 {
        self.alerts_raised_total.get()
    }

    pub fn alert_persist_failures(&self) -> u64 {
        self.alert_persist_failures_total.get()
    }

    pub fn conversation_log_failures(&self) -> u64 {
        self.conversation_log_failures_total.get()
    }

    pub fn fallbacks(&self, reason: &str) -> u64 {
        self.generation_fallbacks_total
            .with_label_values(&[reason])
            .get()
    }

    /// Render all metrics in the Prometheus text exposition format
    pub fn render(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
