use crate::domain::price::{PriceAnalyzer, PriceBook, PriceFetcher};
use crate::infrastructure::{ChangeLog, Notifier};
use crate::shared::errors::MonitorError;
use crate::shared::types::{Eur, ItemConfig};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Price monitoring configuration
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Watched items, polled in this order
    pub items: Vec<ItemConfig>,
    /// Minimum absolute change (EUR) that triggers a notification
    pub threshold: Decimal,
    /// Pause after each full pass over `items`
    pub check_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            threshold: Decimal::TEN,
            check_interval: Duration::from_secs(300),
        }
    }
}

/// What happened during one pass over the items
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub checked: usize,
    pub unavailable: usize,
    pub seeded: usize,
    pub changed: usize,
    pub logged: usize,
    pub notified: usize,
}

/// Polls every item, compares against the price book, logs changes and
/// sends alerts for the significant ones.
pub struct PriceMonitor {
    config: MonitorConfig,
    fetcher: PriceFetcher,
    change_log: ChangeLog,
    notifier: Arc<dyn Notifier>,
    analyzer: PriceAnalyzer,
    completed_cycles: AtomicU64,
}

impl PriceMonitor {
    pub fn new(
        config: MonitorConfig,
        fetcher: PriceFetcher,
        change_log: ChangeLog,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let analyzer = PriceAnalyzer::new(config.threshold);
        Self {
            config,
            fetcher,
            change_log,
            notifier,
            analyzer,
            completed_cycles: AtomicU64::new(0),
        }
    }

    /// Cycles that finished without error, over all runs.
    pub fn completed_cycles(&self) -> u64 {
        self.completed_cycles.load(Ordering::Relaxed)
    }

    /// Fetch every item once and seed a fresh price book. Items that cannot
    /// be fetched are left out and seeded by a later cycle.
    pub async fn initialize(&self) -> PriceBook {
        info!("🔍 Fetching initial prices for {} items...", self.config.items.len());

        let mut book = PriceBook::new();
        for item in &self.config.items {
            match self.fetcher.observe(item).await.quote() {
                Some(quote) => {
                    book.update(&item.name, quote);
                    info!("✅ {} starting at {}", item.name, Eur(quote.price));
                }
                None => warn!("⚠️ Could not fetch {}", item.name),
            }
        }
        book
    }

    /// One pass over all items.
    ///
    /// Unavailable prices are skipped. Every change is written to the change
    /// log, changes of at least the threshold are also pushed to the
    /// notifier, and the book always ends up holding the current price.
    pub async fn run_cycle(&self, book: &mut PriceBook) -> Result<CycleReport, MonitorError> {
        let mut report = CycleReport::default();

        for item in &self.config.items {
            report.checked += 1;

            let Some(current) = self.fetcher.observe(item).await.quote() else {
                warn!("⚠️ Failed to fetch price for {}", item.name);
                report.unavailable += 1;
                continue;
            };

            if book.get(&item.name).is_none() {
                book.update(&item.name, current);
                report.seeded += 1;
                info!("✅ {} baseline set at {}", item.name, Eur(current.price));
                continue;
            }

            let Some(change) = book.update(&item.name, current) else {
                continue;
            };
            report.changed += 1;
            info!("💹 {} changed! {} → {}", item.name, Eur(change.old.price), Eur(change.new.price));

            if self.change_log.record(&item.name, &change.old, &change.new)? {
                report.logged += 1;
            }

            let difference = change.difference();
            if self.analyzer.is_significant(&change) {
                self.notifier
                    .notify_price_change(&item.name, change.new.price, change.old.price)
                    .await;
                report.notified += 1;
                info!("🚨 Significant change detected ({:.2} € difference)", difference);
            } else {
                info!("ℹ️ Minor change ({:.2} €), below notification threshold", difference);
            }
        }

        Ok(report)
    }

    /// Initialize, then run cycles `check_interval` apart until one fails.
    pub async fn run(&self) -> MonitorError {
        let mut book = self.initialize().await;
        info!("🚀 Monitoring price changes every {:?}", self.config.check_interval);

        loop {
            sleep(self.config.check_interval).await;

            match self.run_cycle(&mut book).await {
                Ok(report) => {
                    self.completed_cycles.fetch_add(1, Ordering::Relaxed);
                    debug!("Cycle finished: {:?}", report);
                }
                Err(e) => return e,
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::price::test_support::{quote, unsuccessful, ScriptedSource};
    use crate::domain::price::{FetchConfig, MarketQuote, PriceSource};
    use crate::shared::errors::FetchError;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum Sent {
        PriceChange(String, Decimal, Decimal),
        Error(String),
    }

    #[derive(Default)]
    pub(crate) struct RecordingNotifier {
        sent: Mutex<Vec<Sent>>,
    }

    impl RecordingNotifier {
        pub(crate) fn sent(&self) -> Vec<Sent> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify_price_change(&self, item_name: &str, new_price: Decimal, old_price: Decimal) {
            self.sent
                .lock()
                .unwrap()
                .push(Sent::PriceChange(item_name.to_string(), new_price, old_price));
        }

        async fn notify_error(&self, message: &str) {
            self.sent.lock().unwrap().push(Sent::Error(message.to_string()));
        }
    }

    /// Fixed response per url
    struct UrlSource(HashMap<String, Result<MarketQuote, FetchError>>);

    #[async_trait]
    impl PriceSource for UrlSource {
        async fn fetch_quote(&self, url: &str) -> Result<MarketQuote, FetchError> {
            self.0
                .get(url)
                .cloned()
                .unwrap_or(Err(FetchError::Status(404)))
        }
    }

    fn item(name: &str) -> ItemConfig {
        ItemConfig {
            name: name.to_string(),
            url: format!("https://market.example/{}", name),
        }
    }

    pub(crate) fn monitor_with(
        source: Arc<dyn PriceSource>,
        items: Vec<ItemConfig>,
        log_dir: &Path,
        notifier: Arc<RecordingNotifier>,
    ) -> PriceMonitor {
        let config = MonitorConfig {
            items,
            ..MonitorConfig::default()
        };
        PriceMonitor::new(
            config,
            PriceFetcher::new(source, FetchConfig::default()),
            ChangeLog::new(log_dir),
            notifier,
        )
    }

    fn log_lines(log: &ChangeLog, name: &str) -> usize {
        std::fs::read_to_string(log.path_for(name))
            .map(|s| s.lines().count())
            .unwrap_or(0)
    }

    #[tokio::test(start_paused = true)]
    async fn test_significant_change_is_logged_and_notified() {
        let dir = tempfile::tempdir().expect("temp dir");
        let source = Arc::new(ScriptedSource::new(vec![quote("100,00€"), quote("112,00€")]));
        let notifier = Arc::new(RecordingNotifier::default());
        let monitor = monitor_with(source, vec![item("Case")], dir.path(), notifier.clone());

        let mut book = monitor.initialize().await;
        assert_eq!(book.price("Case"), Some(dec!(100.00)));

        let report = monitor.run_cycle(&mut book).await.unwrap();
        assert_eq!(report.changed, 1);
        assert_eq!(report.logged, 1);
        assert_eq!(report.notified, 1);
        assert_eq!(
            notifier.sent(),
            vec![Sent::PriceChange("Case".to_string(), dec!(112.00), dec!(100.00))]
        );
        assert_eq!(log_lines(&ChangeLog::new(dir.path()), "Case"), 1);
        assert_eq!(book.price("Case"), Some(dec!(112.00)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_minor_change_is_logged_only() {
        let dir = tempfile::tempdir().expect("temp dir");
        let source = Arc::new(ScriptedSource::new(vec![quote("100,00€"), quote("105,00€")]));
        let notifier = Arc::new(RecordingNotifier::default());
        let monitor = monitor_with(source, vec![item("Case")], dir.path(), notifier.clone());

        let mut book = monitor.initialize().await;
        let report = monitor.run_cycle(&mut book).await.unwrap();

        assert_eq!(report.changed, 1);
        assert_eq!(report.logged, 1);
        assert_eq!(report.notified, 0);
        assert!(notifier.sent().is_empty());
        assert_eq!(log_lines(&ChangeLog::new(dir.path()), "Case"), 1);
        assert_eq!(book.price("Case"), Some(dec!(105.00)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_price_keeps_last_known() {
        let dir = tempfile::tempdir().expect("temp dir");
        let source = Arc::new(ScriptedSource::new(vec![quote("100,00€"), unsuccessful()]));
        let notifier = Arc::new(RecordingNotifier::default());
        let monitor = monitor_with(source.clone(), vec![item("Case")], dir.path(), notifier.clone());

        let mut book = monitor.initialize().await;
        let report = monitor.run_cycle(&mut book).await.unwrap();

        assert_eq!(report.unavailable, 1);
        assert_eq!(report.changed, 0);
        assert_eq!(source.calls(), 1 + 3);
        assert_eq!(book.price("Case"), Some(dec!(100.00)));
        assert!(notifier.sent().is_empty());
        assert_eq!(log_lines(&ChangeLog::new(dir.path()), "Case"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_baseline_is_seeded_without_change() {
        let dir = tempfile::tempdir().expect("temp dir");
        let source = Arc::new(ScriptedSource::new(vec![
            unsuccessful(),
            unsuccessful(),
            unsuccessful(),
            quote("50,00€"),
        ]));
        let notifier = Arc::new(RecordingNotifier::default());
        let monitor = monitor_with(source, vec![item("Case")], dir.path(), notifier.clone());

        let mut book = monitor.initialize().await;
        assert!(book.is_empty());

        let report = monitor.run_cycle(&mut book).await.unwrap();
        assert_eq!(report.seeded, 1);
        assert_eq!(report.changed, 0);
        assert_eq!(book.price("Case"), Some(dec!(50.00)));
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unchanged_price_does_nothing() {
        let dir = tempfile::tempdir().expect("temp dir");
        let source = Arc::new(ScriptedSource::new(vec![quote("$10.00")]));
        let notifier = Arc::new(RecordingNotifier::default());
        let monitor = monitor_with(source, vec![item("Case")], dir.path(), notifier.clone());

        let mut book = monitor.initialize().await;
        let report = monitor.run_cycle(&mut book).await.unwrap();

        assert_eq!(report, CycleReport { checked: 1, ..CycleReport::default() });
        assert!(!ChangeLog::new(dir.path()).path_for("Case").exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_item_does_not_block_others() {
        let dir = tempfile::tempdir().expect("temp dir");
        let items = vec![item("Broken"), item("Knife")];
        let mut responses = HashMap::new();
        responses.insert(items[1].url.clone(), quote("250,00€"));
        let source: Arc<dyn PriceSource> = Arc::new(UrlSource(responses));
        let notifier = Arc::new(RecordingNotifier::default());
        let monitor = monitor_with(source, items, dir.path(), notifier);

        let mut book = monitor.initialize().await;
        assert_eq!(book.price("Broken"), None);
        assert_eq!(book.price("Knife"), Some(dec!(250.00)));

        let report = monitor.run_cycle(&mut book).await.unwrap();
        assert_eq!(report.checked, 2);
        assert_eq!(report.unavailable, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_returns_change_log_failure() {
        let dir = tempfile::tempdir().expect("temp dir");
        let not_a_dir = dir.path().join("logs");
        std::fs::write(&not_a_dir, "").unwrap();

        let source = Arc::new(ScriptedSource::new(vec![quote("1,00€"), quote("1,00€"), quote("2,00€")]));
        let notifier = Arc::new(RecordingNotifier::default());
        let monitor = monitor_with(source.clone(), vec![item("Case")], &not_a_dir, notifier);

        // run only hands the error back; restarting is up to the caller
        let err = monitor.run().await;
        assert_eq!(err.kind(), "ConfigurationError");
        assert_eq!(source.calls(), 3);
        assert_eq!(monitor.completed_cycles(), 1);
    }
}
