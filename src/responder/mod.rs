// Response strategy selection
//
// Picks a strategy from the risk tier, calls the generative service under a
// timeout, and falls back to fixed or rule-based text on any failure. The
// reply is never empty and generation errors never reach the caller.

pub mod offline;
pub mod prompts;

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::crisis::RiskTier;
use crate::identity::StudentIdentity;
use crate::metrics::Telemetry;
use crate::providers::{Generation, GenerationRequest, TextGenerator};
use crate::recommendations::{ContentCategory, RecommendationLookup, Resource};
use crate::store::Stored;
use prompts::{CRISIS_COMPANION_INSTRUCTION, CRISIS_FALLBACK_MESSAGE, WELLNESS_INSTRUCTION};

/// Conversational strategy chosen for a tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// High risk: de-escalating companion, calming resources
    CrisisSupport,
    /// Low/medium: short reply plus a content category for recommendations
    WellnessWithRecommendation,
    /// No signals: plain supportive chat
    Supportive,
}

impl Strategy {
    pub fn for_tier(tier: RiskTier) -> Self {
        match tier {
            RiskTier::High => Strategy::CrisisSupport,
            RiskTier::Medium | RiskTier::Low => Strategy::WellnessWithRecommendation,
            RiskTier::None => Strategy::Supportive,
        }
    }
}

/// Why the generated text was not used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// No usable credential; the service was never called
    Offline,
    Timeout,
    Error,
    Empty,
    /// Structured output was requested but free text came back
    Unstructured,
}

impl FallbackReason {
    pub fn label(&self) -> &'static str {
        match self {
            FallbackReason::Offline => "offline",
            FallbackReason::Timeout => "timeout",
            FallbackReason::Error => "error",
            FallbackReason::Empty => "empty",
            FallbackReason::Unstructured => "unstructured",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum ReplySource {
    Generated,
    Fallback(FallbackReason),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyReply {
    pub text: String,
    pub category: Option<ContentCategory>,
    pub recommendations: Vec<Stored<Resource>>,
    pub strategy: Strategy,
    pub source: ReplySource,
}

pub struct ResponseStrategySelector {
    generator: Option<Arc<dyn TextGenerator>>,
    recommendations: RecommendationLookup,
    timeout: Duration,
    telemetry: Arc<Telemetry>,
}

impl ResponseStrategySelector {
    /// `generator` is `None` in offline mode
    pub fn new(
        generator: Option<Arc<dyn TextGenerator>>,
        recommendations: RecommendationLookup,
        timeout: Duration,
        telemetry: Arc<Telemetry>,
    ) -> Self {
        Self {
            generator,
            recommendations,
            timeout,
            telemetry,
        }
    }

    pub fn is_offline(&self) -> bool {
        self.generator.is_none()
    }

    pub async fn respond(
        &self,
        tier: RiskTier,
        text: &str,
        student: &StudentIdentity,
    ) -> StrategyReply {
        let strategy = Strategy::for_tier(tier);
        let reply = match strategy {
            Strategy::CrisisSupport => self.crisis_support(text).await,
            Strategy::WellnessWithRecommendation => self.wellness(text).await,
            Strategy::Supportive => self.supportive(text).await,
        };

        if let ReplySource::Fallback(reason) = reply.source {
            self.telemetry.record_fallback(reason.label());
        }
        tracing::debug!(
            student = %student.alias,
            strategy = ?strategy,
            source = ?reply.source,
            recommendations = reply.recommendations.len(),
            "Reply selected"
        );
        reply
    }

    async fn crisis_support(&self, text: &str) -> StrategyReply {
        let request =
            GenerationRequest::new(text).with_system_instruction(CRISIS_COMPANION_INSTRUCTION);

        let (reply_text, source) = match self.generate(&request).await {
            Ok(generation) => (generation.text().to_string(), ReplySource::Generated),
            Err(reason) => (
                CRISIS_FALLBACK_MESSAGE.to_string(),
                ReplySource::Fallback(reason),
            ),
        };

        let recommendations = self
            .recommendations
            .suggest_calming()
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Calming resource lookup failed");
                Vec::new()
            });

        StrategyReply {
            text: reply_text,
            category: None,
            recommendations,
            strategy: Strategy::CrisisSupport,
            source,
        }
    }

    async fn wellness(&self, text: &str) -> StrategyReply {
        let request = GenerationRequest::new(text)
            .with_system_instruction(WELLNESS_INSTRUCTION)
            .with_structured_output();

        let outcome = match self.generate(&request).await {
            Ok(Generation::Structured {
                text: reply,
                category,
            }) => Ok((reply, ContentCategory::parse_lenient(&category))),
            Ok(Generation::Unstructured { .. }) => Err(FallbackReason::Unstructured),
            Err(reason) => Err(reason),
        };

        let (reply_text, category, source) = match outcome {
            Ok((reply, category)) => (reply, category, ReplySource::Generated),
            Err(reason) => (
                offline::reply(text),
                offline::derive_category(text),
                ReplySource::Fallback(reason),
            ),
        };

        let recommendations = self
            .recommendations
            .suggest(Some(category))
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, category = %category, "Resource lookup failed");
                Vec::new()
            });

        StrategyReply {
            text: reply_text,
            category: Some(category),
            recommendations,
            strategy: Strategy::WellnessWithRecommendation,
            source,
        }
    }

    async fn supportive(&self, text: &str) -> StrategyReply {
        let (reply_text, source) = match self.generate(&GenerationRequest::new(text)).await {
            Ok(generation) => (generation.text().to_string(), ReplySource::Generated),
            Err(reason) => (offline::reply(text), ReplySource::Fallback(reason)),
        };

        StrategyReply {
            text: reply_text,
            category: None,
            recommendations: Vec::new(),
            strategy: Strategy::Supportive,
            source,
        }
    }

    /// One bounded generation call, reduced to a fallback reason on failure
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, FallbackReason> {
        let Some(generator) = &self.generator else {
            return Err(FallbackReason::Offline);
        };

        match tokio::time::timeout(self.timeout, generator.generate(request)).await {
            Err(_) => {
                tracing::warn!(
                    provider = generator.name(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Generation timed out, using fallback"
                );
                Err(FallbackReason::Timeout)
            }
            Ok(Err(e)) => {
                tracing::warn!(provider = generator.name(), error = %e, "Generation failed, using fallback");
                Err(FallbackReason::Error)
            }
            Ok(Ok(generation)) if generation.text().trim().is_empty() => {
                tracing::warn!(provider = generator.name(), "Generation returned empty text");
                Err(FallbackReason::Empty)
            }
            Ok(Ok(generation)) => Ok(generation),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recommendations::seed_catalog;
    use crate::store::{DocumentStore, MemoryStore};
    use anyhow::Result;
    use async_trait::async_trait;

    enum Behaviour {
        Reply(Generation),
        Fail,
        Hang,
    }

    struct ScriptedGenerator(Behaviour);

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(&self, _request: &GenerationRequest) -> Result<Generation> {
            match &self.0 {
                Behaviour::Reply(generation) => Ok(generation.clone()),
                Behaviour::Fail => anyhow::bail!("service unavailable"),
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    anyhow::bail!("unreachable")
                }
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }

        fn default_model(&self) -> &str {
            "scripted-1"
        }
    }

    async fn selector(behaviour: Option<Behaviour>) -> (ResponseStrategySelector, Arc<Telemetry>) {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        seed_catalog(store.as_ref()).await.unwrap();
        let telemetry = Arc::new(Telemetry::new().unwrap());
        let generator =
            behaviour.map(|b| Arc::new(ScriptedGenerator(b)) as Arc<dyn TextGenerator>);
        let selector = ResponseStrategySelector::new(
            generator,
            RecommendationLookup::new(store, 2),
            Duration::from_millis(50),
            telemetry.clone(),
        );
        (selector, telemetry)
    }

    fn student() -> StudentIdentity {
        StudentIdentity::student("s1", "BlueFalcon")
    }

    #[test]
    fn test_strategy_for_tier() {
        assert_eq!(Strategy::for_tier(RiskTier::High), Strategy::CrisisSupport);
        assert_eq!(
            Strategy::for_tier(RiskTier::Medium),
            Strategy::WellnessWithRecommendation
        );
        assert_eq!(
            Strategy::for_tier(RiskTier::Low),
            Strategy::WellnessWithRecommendation
        );
        assert_eq!(Strategy::for_tier(RiskTier::None), Strategy::Supportive);
    }

    #[tokio::test]
    async fn test_crisis_fallback_on_failure() {
        let (selector, telemetry) = selector(Some(Behaviour::Fail)).await;
        let reply = selector
            .respond(RiskTier::High, "I want to end my life", &student())
            .await;

        assert_eq!(reply.text, CRISIS_FALLBACK_MESSAGE);
        assert_eq!(reply.source, ReplySource::Fallback(FallbackReason::Error));
        assert!(reply.recommendations.len() <= 2);
        assert!(reply
            .recommendations
            .iter()
            .all(|item| ContentCategory::CALMING.contains(&item.record.category)));
        assert_eq!(telemetry.fallbacks("error"), 1);
    }

    #[tokio::test]
    async fn test_crisis_uses_generated_text() {
        let generated = Generation::Unstructured {
            text: "I'm right here with you.".to_string(),
        };
        let (selector, _) = selector(Some(Behaviour::Reply(generated))).await;
        let reply = selector.respond(RiskTier::High, "kill myself", &student()).await;
        assert_eq!(reply.text, "I'm right here with you.");
        assert_eq!(reply.source, ReplySource::Generated);
    }

    #[tokio::test]
    async fn test_wellness_structured_reply() {
        let generated = Generation::Structured {
            text: "Exams are a lot.".to_string(),
            category: "anxiety".to_string(),
        };
        let (selector, _) = selector(Some(Behaviour::Reply(generated))).await;
        let reply = selector
            .respond(RiskTier::Low, "I feel anxious about my exam", &student())
            .await;

        assert_eq!(reply.text, "Exams are a lot.");
        assert_eq!(reply.category, Some(ContentCategory::Anxiety));
        assert_eq!(reply.recommendations.len(), 2);
        assert!(reply
            .recommendations
            .iter()
            .all(|item| item.record.category == ContentCategory::Anxiety));
    }

    #[tokio::test]
    async fn test_wellness_unstructured_falls_back_to_offline() {
        let generated = Generation::Unstructured {
            text: "free text".to_string(),
        };
        let (selector, telemetry) = selector(Some(Behaviour::Reply(generated))).await;
        let reply = selector
            .respond(RiskTier::Low, "I can't sleep, so tired", &student())
            .await;

        assert_eq!(reply.text, offline::reply("I can't sleep, so tired"));
        assert_eq!(reply.category, Some(ContentCategory::Sleep));
        assert_eq!(
            reply.source,
            ReplySource::Fallback(FallbackReason::Unstructured)
        );
        assert_eq!(telemetry.fallbacks("unstructured"), 1);
    }

    #[tokio::test]
    async fn test_timeout_falls_back() {
        let (selector, telemetry) = selector(Some(Behaviour::Hang)).await;
        let reply = selector
            .respond(RiskTier::Medium, "I have so much stress", &student())
            .await;

        assert!(!reply.text.is_empty());
        assert_eq!(reply.category, Some(ContentCategory::Stress));
        assert_eq!(reply.source, ReplySource::Fallback(FallbackReason::Timeout));
        assert_eq!(telemetry.fallbacks("timeout"), 1);
    }

    #[tokio::test]
    async fn test_empty_generation_falls_back() {
        let generated = Generation::Unstructured {
            text: "   ".to_string(),
        };
        let (selector, _) = selector(Some(Behaviour::Reply(generated))).await;
        let reply = selector.respond(RiskTier::None, "hello", &student()).await;
        assert!(!reply.text.trim().is_empty());
        assert_eq!(reply.source, ReplySource::Fallback(FallbackReason::Empty));
    }

    #[tokio::test]
    async fn test_offline_mode_never_calls_out() {
        let (selector, telemetry) = selector(None).await;
        assert!(selector.is_offline());

        for tier in [RiskTier::None, RiskTier::Low, RiskTier::Medium, RiskTier::High] {
            let reply = selector.respond(tier, "hmm", &student()).await;
            assert!(!reply.text.trim().is_empty());
            assert_eq!(reply.source, ReplySource::Fallback(FallbackReason::Offline));
        }
        assert_eq!(telemetry.fallbacks("offline"), 4);
    }

    #[tokio::test]
    async fn test_supportive_has_no_recommendations() {
        let (selector, _) = selector(None).await;
        let reply = selector.respond(RiskTier::None, "the weather", &student()).await;
        assert!(reply.recommendations.is_empty());
        assert!(reply.category.is_none());
    }
}
