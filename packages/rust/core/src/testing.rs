//! In-memory collaborators for unit tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::time::Instant;

use sheetwright_llm::{Completion, CompletionRequest, ImageAttachment, ImageFetcher, LanguageModel};
use sheetwright_shared::{
    HistoryRecord, Origin, ProductScope, RelatedProduct, Result, SheetwrightError, TaskType,
};

use crate::sink::{HistorySink, ProductCatalog};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|p| p.into_inner())
}

type Responder = Box<dyn Fn(&CompletionRequest) -> Result<String> + Send + Sync>;
type DelayFn = Box<dyn Fn(&CompletionRequest) -> Duration + Send + Sync>;

/// Scripted language model that records every request.
pub struct FakeModel {
    respond: Responder,
    delay: DelayFn,
    requests: Mutex<Vec<CompletionRequest>>,
    starts: Mutex<Vec<Instant>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeModel {
    pub fn new(respond: impl Fn(&CompletionRequest) -> Result<String> + Send + Sync + 'static) -> Self {
        Self {
            respond: Box::new(respond),
            delay: Box::new(|_| Duration::ZERO),
            requests: Mutex::new(Vec::new()),
            starts: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Always answer `text`.
    pub fn replying(text: &str) -> Self {
        let text = text.to_string();
        Self::new(move |_| Ok(text.clone()))
    }

    /// Delay every call by `delay`.
    pub fn with_delay(self, delay: Duration) -> Self {
        self.with_delay_fn(move |_| delay)
    }

    /// Delay calls by a per-request amount.
    pub fn with_delay_fn(
        mut self,
        delay: impl Fn(&CompletionRequest) -> Duration + Send + Sync + 'static,
    ) -> Self {
        self.delay = Box::new(delay);
        self
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        lock(&self.requests).clone()
    }

    /// Start time of every call, in call order.
    pub fn starts(&self) -> Vec<Instant> {
        lock(&self.starts).clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LanguageModel for FakeModel {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        lock(&self.requests).push(request.clone());
        lock(&self.starts).push(Instant::now());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = (self.delay)(request);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let text = (self.respond)(request)?;
        Ok(Completion {
            text,
            model: request.model.clone(),
            tokens_in: 10,
            tokens_out: 20,
            latency_ms: delay.as_millis() as u64,
        })
    }
}

/// History sink collecting records in memory.
#[derive(Default)]
pub struct FakeHistory {
    records: Mutex<Vec<HistoryRecord>>,
    fail: bool,
}

impl FakeHistory {
    /// A sink whose every write fails.
    pub fn failing() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn records(&self) -> Vec<HistoryRecord> {
        lock(&self.records).clone()
    }
}

#[async_trait]
impl HistorySink for FakeHistory {
    async fn record(&self, record: &HistoryRecord) -> Result<()> {
        if self.fail {
            return Err(SheetwrightError::Storage("history database is locked".into()));
        }
        lock(&self.records).push(record.clone());
        Ok(())
    }
}

/// Catalog with fixed contents.
#[derive(Default)]
pub struct FakeCatalog {
    related: BTreeMap<String, RelatedProduct>,
    links: BTreeMap<String, String>,
}

impl FakeCatalog {
    /// Every product relates to Valve; Valve and Pump have links.
    pub fn with_valve() -> Self {
        let mut related = BTreeMap::new();
        related.insert(
            "Valve".to_string(),
            RelatedProduct {
                link: "https://main.example/valve".into(),
                description: "shuts off the line".into(),
            },
        );
        let links = [
            ("Pump", "https://main.example/pump"),
            ("Valve", "https://main.example/valve"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        Self { related, links }
    }
}

#[async_trait]
impl ProductCatalog for FakeCatalog {
    async fn related_products(
        &self,
        _domain: &str,
        _names: &[String],
    ) -> Result<BTreeMap<String, RelatedProduct>> {
        Ok(self.related.clone())
    }

    async fn product_links(
        &self,
        _domain: &str,
        scope: ProductScope<'_>,
    ) -> Result<BTreeMap<String, String>> {
        Ok(match scope {
            ProductScope::All => self.links.clone(),
            ProductScope::Named(names) => self
                .links
                .iter()
                .filter(|(k, _)| names.contains(k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        })
    }
}

/// Image fetcher returning a fixed JPEG payload.
#[derive(Default)]
pub struct FakeImages {
    fetched: Mutex<Vec<String>>,
    fail: bool,
}

impl FakeImages {
    pub fn failing() -> Self {
        Self {
            fetched: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn fetched(&self) -> Vec<String> {
        lock(&self.fetched).clone()
    }
}

#[async_trait]
impl ImageFetcher for FakeImages {
    async fn fetch(&self, link: &str) -> Result<ImageAttachment> {
        lock(&self.fetched).push(link.to_string());
        if self.fail {
            return Err(SheetwrightError::Rejected {
                status: 404,
                message: format!("photo {link} could not be fetched"),
            });
        }
        Ok(ImageAttachment {
            mime: "image/jpeg".into(),
            bytes: vec![0xff, 0xd8, 0xff],
        })
    }
}

/// A history record with placeholder metadata.
pub fn history_record(task_type: TaskType, output: &str) -> HistoryRecord {
    HistoryRecord {
        id: HistoryRecord::new_id(),
        task_type,
        model: "gpt-test".into(),
        domain: "main".into(),
        parameters: "{}".into(),
        fingerprint: String::new(),
        output: output.into(),
        source: "key/Products!R2".into(),
        origin: Origin::Batch,
        created_at: Utc::now(),
    }
}

/// `{"reviews": [...]}` with `count` entries all rated `rating`.
pub fn reviews_json(count: usize, rating: u8) -> String {
    let reviews: Vec<serde_json::Value> = (0..count)
        .map(|i| {
            serde_json::json!({
                "author": format!("Customer {}", i + 1),
                "rating": rating,
                "experience_of_use": "two months",
                "pros": "quiet",
                "cons": "heavy",
                "review": "Works as described."
            })
        })
        .collect();
    serde_json::json!({ "reviews": reviews }).to_string()
}
