// Shared test doubles for integration tests
#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mindcare::config::Config;
use mindcare::crisis::{ResponderProfile, RiskTier};
use mindcare::metrics::Telemetry;
use mindcare::notify::{AlertEvent, EmailMessage, MailTransport, RealtimePublisher};
use mindcare::pipeline::{MessagePipeline, PipelineDeps};
use mindcare::providers::{Generation, GenerationRequest, TextGenerator};
use mindcare::recommendations::seed_catalog;
use mindcare::store::{
    self, Collection, Document, DocumentId, DocumentStore, MemoryStore, Query, StoreError,
};

/// Mail transport that records messages and fails for chosen recipients
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<EmailMessage>>,
    pub fail_for: Vec<String>,
    pub panic_for: Vec<String>,
    pub delay: Option<Duration>,
}

impl RecordingMailer {
    pub fn failing_for(recipient: &str) -> Self {
        Self {
            fail_for: vec![recipient.to_string()],
            ..Self::default()
        }
    }

    pub fn panicking_for(recipient: &str) -> Self {
        Self {
            panic_for: vec![recipient.to_string()],
            ..Self::default()
        }
    }

    /// Every send takes `delay` before it is recorded
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn recipients(&self) -> Vec<String> {
        let mut recipients: Vec<String> = self
            .sent
            .lock()
            .unwrap()
            .iter()
            .map(|m| m.to.clone())
            .collect();
        recipients.sort();
        recipients
    }
}

#[async_trait]
impl MailTransport for RecordingMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.panic_for.contains(&message.to) {
            panic!("transport bug");
        }
        if self.fail_for.contains(&message.to) {
            anyhow::bail!("SMTP connection refused");
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Publisher that records events and how many alerts were stored at publish time
pub struct RecordingPublisher {
    pub events: Mutex<Vec<AlertEvent>>,
    pub alerts_stored_at_publish: Mutex<Vec<usize>>,
    pub store: Arc<MemoryStore>,
    pub monitors: usize,
    pub fail: bool,
}

impl RecordingPublisher {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            alerts_stored_at_publish: Mutex::new(Vec::new()),
            store,
            monitors: 1,
            fail: false,
        }
    }

    pub fn failing(store: Arc<MemoryStore>) -> Self {
        Self {
            fail: true,
            ..Self::new(store)
        }
    }
}

impl RealtimePublisher for RecordingPublisher {
    fn publish(&self, _topic: &str, payload: &AlertEvent) -> Result<usize> {
        self.alerts_stored_at_publish
            .lock()
            .unwrap()
            .push(self.store.len(Collection::CrisisAlerts));
        if self.fail {
            anyhow::bail!("socket hub down");
        }
        self.events.lock().unwrap().push(payload.clone());
        Ok(self.monitors)
    }
}

/// Generator with a fixed behaviour
pub enum StubGenerator {
    Reply(Generation),
    Fail,
    /// Never answers within any sane timeout
    Hang,
}

#[async_trait]
impl TextGenerator for StubGenerator {
    async fn generate(&self, _request: &GenerationRequest) -> Result<Generation> {
        match self {
            StubGenerator::Reply(generation) => Ok(generation.clone()),
            StubGenerator::Fail => anyhow::bail!("upstream returned 503"),
            StubGenerator::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                anyhow::bail!("too late")
            }
        }
    }

    fn name(&self) -> &str {
        "stub"
    }

    fn default_model(&self) -> &str {
        "stub-1"
    }
}

/// Store that rejects writes to one collection
pub struct FailingStore {
    pub inner: Arc<MemoryStore>,
    pub failing: Collection,
}

#[async_trait]
impl DocumentStore for FailingStore {
    async fn create(&self, collection: Collection, body: Value) -> Result<DocumentId, StoreError> {
        if collection == self.failing {
            return Err(StoreError::Unavailable("disk full".to_string()));
        }
        self.inner.create(collection, body).await
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
        self.inner.get(collection, id).await
    }

    async fn find(
        &self,
        collection: Collection,
        query: &Query,
    ) -> Result<Vec<Document>, StoreError> {
        self.inner.find(collection, query).await
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        patch: Value,
    ) -> Result<Document, StoreError> {
        self.inner.update(collection, id, patch).await
    }

    async fn update_if(
        &self,
        collection: Collection,
        id: &str,
        condition: &Query,
        patch: Value,
    ) -> Result<Option<Document>, StoreError> {
        self.inner.update_if(collection, id, condition, patch).await
    }
}

/// Store whose creates in one collection land at once but take `delay` to return
pub struct SlowCreateStore {
    pub inner: Arc<MemoryStore>,
    pub slow: Collection,
    pub delay: Duration,
}

#[async_trait]
impl DocumentStore for SlowCreateStore {
    async fn create(&self, collection: Collection, body: Value) -> Result<DocumentId, StoreError> {
        let id = self.inner.create(collection, body).await?;
        if collection == self.slow {
            tokio::time::sleep(self.delay).await;
        }
        Ok(id)
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
        self.inner.get(collection, id).await
    }

    async fn find(
        &self,
        collection: Collection,
        query: &Query,
    ) -> Result<Vec<Document>, StoreError> {
        self.inner.find(collection, query).await
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        patch: Value,
    ) -> Result<Document, StoreError> {
        self.inner.update(collection, id, patch).await
    }

    async fn update_if(
        &self,
        collection: Collection,
        id: &str,
        condition: &Query,
        patch: Value,
    ) -> Result<Option<Document>, StoreError> {
        self.inner.update_if(collection, id, condition, patch).await
    }
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.notifications.default_responder_email = Some("counselor@campus.edu".to_string());
    config.notifications.admin_email = Some("admin@campus.edu".to_string());
    config.generative.timeout_secs = 1;
    config
}

pub async fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    seed_catalog(&*store).await.unwrap();
    store
}

pub async fn add_responder(store: &MemoryStore, available: bool) -> DocumentId {
    let profile = ResponderProfile {
        name: "On-call".to_string(),
        email: "oncall@campus.edu".to_string(),
        available,
    };
    store::insert(store, Collection::Responders, &profile)
        .await
        .unwrap()
}

pub struct Harness {
    pub pipeline: MessagePipeline,
    pub store: Arc<MemoryStore>,
    pub mailer: Arc<RecordingMailer>,
    pub publisher: Arc<RecordingPublisher>,
    pub telemetry: Arc<Telemetry>,
}

pub struct HarnessBuilder {
    config: Config,
    store: Option<Arc<MemoryStore>>,
    backing: Option<Arc<dyn DocumentStore>>,
    generator: Option<Arc<dyn TextGenerator>>,
    mailer: Arc<RecordingMailer>,
    failing_publisher: bool,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            config: test_config(),
            store: None,
            backing: None,
            generator: None,
            mailer: Arc::new(RecordingMailer::default()),
            failing_publisher: false,
        }
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn store(mut self, store: Arc<MemoryStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Route writes through a store that rejects one collection
    pub fn failing_writes(mut self, store: Arc<MemoryStore>, failing: Collection) -> Self {
        let backing: Arc<dyn DocumentStore> = Arc::new(FailingStore {
            inner: store.clone(),
            failing,
        });
        self.backing = Some(backing);
        self.store = Some(store);
        self
    }

    /// Route writes through a store whose creates in `slow` return late
    pub fn slow_creates(mut self, store: Arc<MemoryStore>, slow: Collection, delay: Duration) -> Self {
        let backing: Arc<dyn DocumentStore> = Arc::new(SlowCreateStore {
            inner: store.clone(),
            slow,
            delay,
        });
        self.backing = Some(backing);
        self.store = Some(store);
        self
    }

    pub fn generator(mut self, generator: StubGenerator) -> Self {
        let generator: Arc<dyn TextGenerator> = Arc::new(generator);
        self.generator = Some(generator);
        self
    }

    pub fn mailer(mut self, mailer: RecordingMailer) -> Self {
        self.mailer = Arc::new(mailer);
        self
    }

    pub fn failing_publisher(mut self) -> Self {
        self.failing_publisher = true;
        self
    }

    pub async fn build(self) -> Harness {
        let store = match self.store {
            Some(store) => store,
            None => seeded_store().await,
        };
        let backing: Arc<dyn DocumentStore> = match self.backing {
            Some(backing) => backing,
            None => store.clone(),
        };
        let publisher = Arc::new(if self.failing_publisher {
            RecordingPublisher::failing(store.clone())
        } else {
            RecordingPublisher::new(store.clone())
        });
        let telemetry = Arc::new(Telemetry::new().unwrap());

        let mailer: Arc<dyn MailTransport> = self.mailer.clone();
        let deps = PipelineDeps {
            store: backing,
            generator: self.generator,
            publisher: publisher.clone(),
            mailer: Some(mailer),
            telemetry: telemetry.clone(),
        };
        let pipeline = MessagePipeline::new(&self.config, deps).unwrap();

        Harness {
            pipeline,
            store,
            mailer: self.mailer,
            publisher,
            telemetry,
        }
    }
}

/// Risk tags of stored conversation entries, in insertion order
pub fn logged_tags(store: &MemoryStore) -> Vec<(String, RiskTier)> {
    store
        .snapshot(Collection::ConversationEntries)
        .into_iter()
        .map(|doc| {
            let sender = doc.body["sender"].as_str().unwrap().to_string();
            let tag: RiskTier = serde_json::from_value(doc.body["riskTag"].clone()).unwrap();
            (sender, tag)
        })
        .collect()
}
