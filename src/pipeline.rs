use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::Utc;
use serde::Serialize;

use crate::apns::{AlertNotification, Expiration, Priority, PushSender, abbreviate};
use crate::crypto::TokenCipher;
use crate::dispatch::DispatchQueue;
use crate::error::{DispatcherError, Result};
use crate::localize;
use crate::news::{NewsItem, NewsSource, TimeMark, diff_since};
use crate::registry::{RecipientDirectory, WatermarkStore};
use crate::ui::DispatchProgress;

/// Counts delivery outcomes across all units of an episode.
#[derive(Debug, Default)]
pub struct DeliveryStats {
    delivered: AtomicUsize,
    failed: AtomicUsize,
}

impl DeliveryStats {
    pub fn delivered(&self) -> usize {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::Relaxed)
    }
}

/// Summary of one dispatch episode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpisodeReport {
    pub previous_watermark: f64,
    pub new_watermark: f64,
    pub new_items: usize,
    pub recipients: usize,
    pub submitted: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// Delivery policy shared by every alert of an episode.
#[derive(Debug, Clone)]
pub struct AlertPolicy {
    pub topic: String,
    pub expiration: Expiration,
    pub priority: Priority,
    pub sound: Option<String>,
}

impl AlertPolicy {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            expiration: Expiration::Immediately,
            priority: Priority::ConsideringDevicePower,
            sound: Some("default".to_string()),
        }
    }

    /// Alert for one news item. `badge` is the number of new items in the episode.
    pub fn alert_for(&self, item: &NewsItem, badge: u32) -> AlertNotification {
        let body = localize::body_for(item.time_mark);
        if item.time_mark == TimeMark::Unrecognized {
            tracing::debug!(news = item.id, "unrecognized time mark, sending title only");
        }
        AlertNotification {
            title: item.subject.clone(),
            body,
            expiration: self.expiration,
            priority: self.priority,
            topic: self.topic.clone(),
            badge: Some(badge),
            sound: self.sound.clone(),
            custom: serde_json::Map::new(),
        }
    }
}

/// Drives one episode: diff the feed against the watermark, fan the new
/// items out to every recipient through the dispatch queue, then drain.
pub struct NotificationPipeline<R, N, S> {
    registry: R,
    news: N,
    sender: Arc<S>,
    cipher: TokenCipher,
    queue: DispatchQueue,
    policy: AlertPolicy,
    min_watermark: f64,
    show_progress: bool,
}

impl<R, N, S> NotificationPipeline<R, N, S>
where
    R: WatermarkStore + RecipientDirectory,
    N: NewsSource,
    S: PushSender + 'static,
{
    pub fn new(
        registry: R,
        news: N,
        sender: S,
        cipher: TokenCipher,
        queue: DispatchQueue,
        policy: AlertPolicy,
    ) -> Self {
        Self {
            registry,
            news,
            sender: Arc::new(sender),
            cipher,
            queue,
            policy,
            min_watermark: 100.0,
            show_progress: false,
        }
    }

    /// Watermarks below this value abort the episode.
    pub fn with_min_watermark(mut self, min_watermark: f64) -> Self {
        self.min_watermark = min_watermark;
        self
    }

    /// Draws a progress bar on stderr while units complete.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Runs a single episode to completion.
    pub async fn run(&self) -> Result<EpisodeReport> {
        let previous = self.registry.get().await?;
        if previous < self.min_watermark {
            return Err(DispatcherError::ImplausibleWatermark(previous));
        }

        let latest = self.news.latest().await?;
        let fresh = diff_since(&latest, previous);

        // Advance first: a crash from here on must not re-notify these items.
        let now = Utc::now().timestamp_millis() as f64 / 1000.0;
        self.registry.set(now).await?;
        tracing::info!(previous, new = now, "watermark advanced");

        let mut report = EpisodeReport {
            previous_watermark: previous,
            new_watermark: now,
            new_items: fresh.len(),
            recipients: 0,
            submitted: 0,
            delivered: 0,
            failed: 0,
        };

        if fresh.is_empty() {
            tracing::info!("no new news, nothing to dispatch");
            return Ok(report);
        }

        let encrypted = self.registry.encrypted_tokens().await?;
        let recipients = self
            .cipher
            .decrypt_all(encrypted.iter().map(|(id, value)| (id.as_str(), value.as_str())));
        report.recipients = recipients.len();
        tracing::info!(
            items = fresh.len(),
            recipients = recipients.len(),
            dropped = encrypted.len() - recipients.len(),
            "dispatching news"
        );

        let stats = Arc::new(DeliveryStats::default());
        let progress = DispatchProgress::new(recipients.len() * fresh.len(), self.show_progress);
        let badge = u32::try_from(fresh.len()).unwrap_or(u32::MAX);
        let alerts: Vec<Arc<AlertNotification>> = fresh
            .iter()
            .map(|item| Arc::new(self.policy.alert_for(item, badge)))
            .collect();

        for device in &recipients {
            for alert in &alerts {
                let sender = Arc::clone(&self.sender);
                let alert = Arc::clone(alert);
                let stats = Arc::clone(&stats);
                let progress = progress.clone();
                let device = device.clone();

                self.queue.submit(async move {
                    let outcome = sender.send_alert(&alert, &device).await;
                    progress.tick();
                    match outcome {
                        Ok(()) => {
                            stats.delivered.fetch_add(1, Ordering::Relaxed);
                            Ok(())
                        }
                        Err(e) => {
                            stats.failed.fetch_add(1, Ordering::Relaxed);
                            Err(anyhow::Error::new(e)
                                .context(format!("push to {} failed", abbreviate(&device))))
                        }
                    }
                });
            }
        }
        report.submitted = recipients.len() * alerts.len();

        self.queue.drain().await;
        progress.finish();

        report.delivered = stats.delivered();
        report.failed = stats.failed();
        tracing::info!(
            delivered = report.delivered,
            failed = report.failed,
            "dispatch drained"
        );
        Ok(report)
    }

    pub fn queue(&self) -> &DispatchQueue {
        &self.queue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apns::ApnsError;
    use crate::crypto::seal_for_test;
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use std::time::Duration;

    const SECRET: &str = "0123456789abcdef";

    struct MockRegistry {
        watermark: f64,
        stored: Mutex<Vec<f64>>,
        tokens: BTreeMap<String, String>,
        token_fetches: AtomicUsize,
    }

    impl MockRegistry {
        fn new(watermark: f64, devices: &[&str]) -> Self {
            let tokens = devices
                .iter()
                .enumerate()
                .map(|(i, d)| (format!("r{i}"), seal_for_test(SECRET, [i as u8; 12], d)))
                .collect();
            Self {
                watermark,
                stored: Mutex::new(Vec::new()),
                tokens,
                token_fetches: AtomicUsize::new(0),
            }
        }
    }

    impl WatermarkStore for MockRegistry {
        async fn get(&self) -> Result<f64> {
            Ok(self.watermark)
        }

        async fn set(&self, watermark: f64) -> Result<()> {
            self.stored.lock().unwrap().push(watermark);
            Ok(())
        }
    }

    impl RecipientDirectory for MockRegistry {
        async fn encrypted_tokens(&self) -> Result<BTreeMap<String, String>> {
            self.token_fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.tokens.clone())
        }
    }

    struct MockNews(Vec<NewsItem>);

    impl NewsSource for MockNews {
        async fn latest(&self) -> Result<Vec<NewsItem>> {
            Ok(self.0.clone())
        }
    }

    /// Records every push and how many were in flight at once.
    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<(String, AlertNotification)>>,
        active: AtomicUsize,
        peak: AtomicUsize,
        fail_device: Option<String>,
    }

    impl PushSender for RecordingSender {
        async fn send_alert(&self, notification: &AlertNotification, device_token: &str) -> std::result::Result<(), ApnsError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);

            if self.fail_device.as_deref() == Some(device_token) {
                return Err(ApnsError::Rejected {
                    status: 400,
                    reason: "BadDeviceToken".into(),
                });
            }
            self.sent
                .lock()
                .unwrap()
                .push((device_token.to_string(), notification.clone()));
            Ok(())
        }
    }

    fn item(id: u64, timestamp: f64, time_mark: TimeMark) -> NewsItem {
        NewsItem {
            id,
            subject: format!("news {id}"),
            timestamp,
            time_mark,
        }
    }

    fn pipeline(
        registry: MockRegistry,
        news: Vec<NewsItem>,
        sender: RecordingSender,
        capacity: usize,
    ) -> NotificationPipeline<MockRegistry, MockNews, RecordingSender> {
        NotificationPipeline::new(
            registry,
            MockNews(news),
            sender,
            TokenCipher::new(SECRET).unwrap(),
            DispatchQueue::new(capacity).unwrap(),
            AlertPolicy::new("com.example.app"),
        )
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn fans_out_recipients_times_items() {
        let registry = MockRegistry::new(1000.0, &["dev-a", "dev-b", "dev-c"]);
        let news = vec![
            item(1, 1500.0, TimeMark::HasPublished),
            item(2, 1200.0, TimeMark::WillEndAfter(2)),
            item(3, 900.0, TimeMark::HasEnded),
            item(4, 1100.0, TimeMark::HasEnded),
        ];
        let p = pipeline(registry, news, RecordingSender::default(), 2);

        let report = p.run().await.unwrap();

        assert_eq!(report.new_items, 2);
        assert_eq!(report.recipients, 3);
        assert_eq!(report.submitted, 6);
        assert_eq!(report.delivered, 6);
        assert_eq!(report.failed, 0);
        assert_eq!(p.queue().submitted(), 6);
        assert_eq!(p.queue().in_flight(), 0);
        assert!(p.sender.peak.load(Ordering::SeqCst) <= 2);

        let sent = p.sender.sent.lock().unwrap();
        assert_eq!(sent.len(), 6);
        let mut titles: Vec<&str> = sent.iter().map(|(_, n)| n.title.as_str()).collect();
        titles.sort();
        titles.dedup();
        assert_eq!(titles, vec!["news 1", "news 2"]);
        assert!(sent.iter().all(|(_, n)| n.badge == Some(2)));
        assert!(sent.iter().all(|(_, n)| n.topic == "com.example.app"));
    }

    #[tokio::test]
    async fn empty_diff_still_advances_watermark() {
        let registry = MockRegistry::new(2000.0, &["dev-a"]);
        let news = vec![item(1, 1500.0, TimeMark::HasPublished)];
        let p = pipeline(registry, news, RecordingSender::default(), 4);

        let report = p.run().await.unwrap();

        assert_eq!(report.new_items, 0);
        assert_eq!(report.submitted, 0);
        assert_eq!(p.queue().submitted(), 0);
        assert!(p.sender.sent.lock().unwrap().is_empty());
        assert_eq!(p.registry.token_fetches.load(Ordering::SeqCst), 0);

        let stored = p.registry.stored.lock().unwrap();
        assert_eq!(stored.len(), 1);
        assert!(stored[0] > 2000.0);
    }

    #[tokio::test]
    async fn implausible_watermark_is_fatal() {
        let registry = MockRegistry::new(3.0, &["dev-a"]);
        let p = pipeline(registry, vec![], RecordingSender::default(), 4);

        let err = p.run().await.unwrap_err();
        assert!(matches!(err, DispatcherError::ImplausibleWatermark(w) if w == 3.0));
        assert!(p.registry.stored.lock().unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn failed_pushes_are_counted_not_fatal() {
        let registry = MockRegistry::new(1000.0, &["dev-a", "dev-bad"]);
        let news = vec![item(1, 1500.0, TimeMark::WillStartToday)];
        let sender = RecordingSender {
            fail_device: Some("dev-bad".into()),
            ..Default::default()
        };
        let p = pipeline(registry, news, sender, 1);

        let report = p.run().await.unwrap();
        assert_eq!(report.submitted, 2);
        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed, 1);
    }

    #[tokio::test]
    async fn undecryptable_recipients_are_dropped() {
        let mut registry = MockRegistry::new(1000.0, &["dev-a"]);
        registry.tokens.insert("broken".into(), "AAAAAAAA".into());
        let news = vec![item(1, 1500.0, TimeMark::HasPublished)];
        let p = pipeline(registry, news, RecordingSender::default(), 4);

        let report = p.run().await.unwrap();
        assert_eq!(report.recipients, 1);
        assert_eq!(report.delivered, 1);
    }

    #[tokio::test]
    async fn unrecognized_time_mark_sends_title_only() {
        let registry = MockRegistry::new(1000.0, &["dev-a"]);
        let news = vec![item(7, 1500.0, TimeMark::Unrecognized)];
        let p = pipeline(registry, news, RecordingSender::default(), 4);

        p.run().await.unwrap();
        let sent = p.sender.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1.title, "news 7");
        assert_eq!(sent[0].1.body, None);
    }

    #[test]
    fn alert_policy_defaults() {
        let policy = AlertPolicy::new("com.example.app");
        let alert = policy.alert_for(&item(1, 1.0, TimeMark::WillStartAfter(1)), 3);
        assert_eq!(alert.expiration, Expiration::Immediately);
        assert_eq!(alert.priority, Priority::ConsideringDevicePower);
        assert_eq!(alert.sound.as_deref(), Some("default"));
        assert_eq!(alert.badge, Some(3));
        assert_eq!(alert.body.unwrap().key, "News.time-mark.will-start-after.one");
    }
}
