// src/pipeline/run.rs

//! Topic orchestration: collect, classify, notify.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};

use crate::error::{AppError, Result};
use crate::models::{Config, NotifyConfig, Topic};
use crate::pipeline::aggregate::PageAggregator;
use crate::pipeline::batch::batch;
use crate::pipeline::dedup::{BootstrapPolicy, DedupStore};
use crate::services::{PageSource, RateLimitedSender, RetryPolicy, Transport};
use crate::storage::{IdStore, MarkerFile};

/// Outcome of one topic in a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicReport {
    pub topic: String,
    /// Unique entries collected across pages
    pub collected: usize,
    /// Entries reported as new
    pub new_count: usize,
    /// Whether this run only stored the baseline
    pub bootstrap: bool,
    /// Messages delivered for this topic
    pub messages_sent: usize,
    /// Failure message, if the topic failed
    pub error: Option<String>,
}

impl TopicReport {
    fn new(topic: &Topic) -> Self {
        Self {
            topic: topic.topic.clone(),
            ..Self::default()
        }
    }

    fn failed(topic: &Topic, error: &AppError) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::new(topic)
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

/// Summary of one orchestrator run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub reports: Vec<TopicReport>,
}

impl RunSummary {
    /// Names of topics that failed.
    pub fn failed_topics(&self) -> Vec<String> {
        self.reports
            .iter()
            .filter(|r| r.is_failure())
            .map(|r| r.topic.clone())
            .collect()
    }

    pub fn total_new(&self) -> usize {
        self.reports.iter().map(|r| r.new_count).sum()
    }

    /// Log one line per topic plus totals.
    pub fn log(&self) {
        for report in &self.reports {
            match &report.error {
                Some(error) => log::error!("[{}] FAILED: {}", report.topic, error),
                None if report.bootstrap => log::info!(
                    "[{}] bootstrap: {} entries recorded",
                    report.topic,
                    report.collected
                ),
                None => log::info!(
                    "[{}] {} collected, {} new, {} message(s) sent",
                    report.topic,
                    report.collected,
                    report.new_count,
                    report.messages_sent
                ),
            }
        }
        let elapsed = self.end_time - self.start_time;
        log::info!(
            "Run finished: {} topic(s), {} new, {} failed, {:.1}s",
            self.reports.len(),
            self.total_new(),
            self.failed_topics().len(),
            elapsed.num_milliseconds() as f64 / 1000.0
        );
    }

    /// `Err` naming the failed topics if any topic failed.
    pub fn into_result(self) -> Result<Self> {
        let failed = self.failed_topics();
        if failed.is_empty() {
            Ok(self)
        } else {
            Err(AppError::TopicsFailed { failed })
        }
    }
}

/// Runs the collect → classify → notify pipeline for each topic.
pub struct Orchestrator {
    aggregator: PageAggregator,
    dedup: DedupStore,
    sender: RateLimitedSender,
    notify: NotifyConfig,
    default_pages: usize,
    max_concurrent: usize,
}

impl Orchestrator {
    pub fn new(
        aggregator: PageAggregator,
        dedup: DedupStore,
        sender: RateLimitedSender,
        notify: NotifyConfig,
    ) -> Self {
        Self {
            aggregator,
            dedup,
            sender,
            notify,
            default_pages: 1,
            max_concurrent: 1,
        }
    }

    /// Wire the pipeline from configuration and concrete collaborators.
    pub fn from_config(
        config: &Config,
        source: Arc<dyn PageSource>,
        store: Arc<dyn IdStore>,
        transport: Arc<dyn Transport>,
        chat_id: impl Into<String>,
    ) -> Self {
        let aggregator = PageAggregator::new(source)
            .with_request_delay(Duration::from_millis(config.crawler.request_delay_ms));

        let mut dedup = DedupStore::new(store, config.storage.retention_limit).with_policy(
            BootstrapPolicy::from_flags(config.bootstrap_if_empty, config.bootstrap_on_empty_state),
        );
        if let Some(path) = &config.storage.marker_file {
            dedup = dedup.with_marker(MarkerFile::new(path));
        }

        let sender =
            RateLimitedSender::new(transport, chat_id, RetryPolicy::from_config(&config.retry));

        Self::new(aggregator, dedup, sender, config.notify.clone())
            .with_default_pages(config.default_pages)
            .with_max_concurrent(config.crawler.max_concurrent)
    }

    pub fn with_default_pages(mut self, pages: usize) -> Self {
        self.default_pages = pages.max(1);
        self
    }

    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max.max(1);
        self
    }

    /// Run every enabled topic to completion and collect their outcomes.
    ///
    /// Topics run concurrently; one topic failing does not stop the others.
    pub async fn run(&self, topics: &[Topic]) -> RunSummary {
        let start_time = Utc::now();

        let mut keys = HashSet::new();
        let mut jobs = Vec::new();
        for topic in topics {
            if topic.disabled {
                log::debug!("[{}] disabled, skipping", topic.topic);
                continue;
            }
            if !keys.insert(topic.topic.as_str()) {
                log::warn!("[{}] listed twice, running once", topic.topic);
                continue;
            }
            jobs.push(topic);
        }

        log::info!("Polling {} topic(s)", jobs.len());

        let reports = stream::iter(jobs)
            .map(|topic| async move {
                match self.run_topic(topic).await {
                    Ok(report) => report,
                    Err(e) => TopicReport::failed(topic, &e),
                }
            })
            .buffer_unordered(self.max_concurrent)
            .collect::<Vec<_>>()
            .await;

        RunSummary {
            start_time,
            end_time: Utc::now(),
            reports,
        }
    }

    /// Run one topic. On failure a best-effort notice is sent before the
    /// poll error is returned.
    pub async fn run_topic(&self, topic: &Topic) -> Result<TopicReport> {
        match self.poll(topic).await {
            Ok(report) => Ok(report),
            Err(err) => {
                log::error!("[{}] failed: {}", topic.topic, err);
                let notice = NotifyConfig::render(&self.notify.failure_template, &topic.topic, 0)
                    .replace("{error}", &err.to_string());
                if let Err(secondary) = self.sender.send(&notice).await {
                    log::warn!(
                        "[{}] failure notice not delivered: {}",
                        topic.topic,
                        secondary
                    );
                }
                Err(err)
            }
        }
    }

    async fn poll(&self, topic: &Topic) -> Result<TopicReport> {
        let name = topic.topic.as_str();
        let pages = topic.pages_to_scan(self.default_pages);
        let mut report = TopicReport::new(topic);

        log::info!("[{name}] polling up to {pages} page(s)");
        if self.notify.announce_start {
            self.sender
                .send(&NotifyConfig::render(&self.notify.start_template, name, pages))
                .await?;
            report.messages_sent += 1;
        }

        let entries = self.aggregator.collect(topic, pages).await?;
        report.collected = entries.len();

        let classification = self.dedup.classify(name, &entries).await?;
        report.bootstrap = classification.bootstrap;
        report.new_count = classification.new_entries.len();

        let messages = if classification.bootstrap {
            vec![NotifyConfig::render(
                &self.notify.bootstrap_template,
                name,
                classification.known_count,
            )]
        } else if classification.has_new() {
            let header =
                NotifyConfig::render(&self.notify.header_template, name, report.new_count);
            batch(&classification.new_entries, &header, self.notify.max_chars)
        } else {
            vec![NotifyConfig::render(&self.notify.empty_template, name, 0)]
        };

        for message in &messages {
            self.sender.send(message).await?;
            report.messages_sent += 1;
        }

        Ok(report)
    }
}
