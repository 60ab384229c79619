//! Crash recovery around the price monitor

use std::any::Any;
use std::backtrace::Backtrace;
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, info};

use super::price_monitor::PriceMonitor;
use crate::infrastructure::Notifier;
use crate::shared::errors::MonitorError;

/// Location and stack of the most recent panic, filled in by the panic hook
static LAST_PANIC: Mutex<Option<String>> = Mutex::new(None);
static PANIC_HOOK: Once = Once::new();

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Cooldown before a crashed monitor is started again
    pub restart_delay: Duration,
    /// Crash reports are cut to this many characters
    pub max_report_chars: usize,
    /// Give up after this many consecutive crashes without a successful
    /// cycle in between; `None` restarts forever
    pub max_restarts: Option<u32>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            restart_delay: Duration::from_secs(60),
            max_report_chars: 2000,
            max_restarts: None,
        }
    }
}

/// Restarts the monitor whenever it fails or panics, reporting every crash
/// through the notifier. Each restart begins with an empty price book.
pub struct Supervisor {
    monitor: Arc<PriceMonitor>,
    notifier: Arc<dyn Notifier>,
    config: SupervisorConfig,
}

impl Supervisor {
    pub fn new(monitor: Arc<PriceMonitor>, notifier: Arc<dyn Notifier>, config: SupervisorConfig) -> Self {
        install_panic_hook();
        Self {
            monitor,
            notifier,
            config,
        }
    }

    /// Restart the monitor after every crash, fatal ones included. Only
    /// returns once `max_restarts` consecutive crashes are exceeded.
    pub async fn run(&self) -> anyhow::Error {
        let mut crashes: u32 = 0;

        loop {
            let cycles_before = self.monitor.completed_cycles();
            let failure = self.run_once().await;
            if self.monitor.completed_cycles() > cycles_before {
                crashes = 0;
            }
            crashes += 1;

            let report = crash_report(&failure, self.config.max_report_chars);
            error!("💥 Price monitor crashed!\n{}", report);
            if failure.is_fatal() {
                error!("🛑 Fatal error, the monitor will keep crashing until it is fixed");
            }
            self.notifier.notify_error(&report).await;

            if let Some(max) = self.config.max_restarts {
                if crashes > max {
                    error!("🛑 Giving up after {} consecutive crashes", crashes);
                    return anyhow::Error::new(failure);
                }
            }

            info!("🔁 Restarting in {:?}...", self.config.restart_delay);
            sleep(self.config.restart_delay).await;
        }
    }

    /// Run the monitor in its own task so a panic ends up here as an error.
    async fn run_once(&self) -> MonitorError {
        let monitor = Arc::clone(&self.monitor);
        match tokio::spawn(async move { monitor.run().await }).await {
            Ok(err) => err,
            Err(join_err) if join_err.is_panic() => MonitorError::Panic {
                message: panic_message(join_err.into_panic()),
                trace: take_panic_trace(),
            },
            Err(_) => MonitorError::Aborted,
        }
    }
}

/// Keep the previous hook's output and remember where the panic happened.
fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let location = info
                .location()
                .map(|l| l.to_string())
                .unwrap_or_else(|| "unknown location".to_string());
            let trace = format!("panicked at {}\n{}", location, Backtrace::force_capture());
            if let Ok(mut slot) = LAST_PANIC.lock() {
                *slot = Some(trace);
            }
            previous(info);
        }));
    });
}

fn take_panic_trace() -> Option<String> {
    LAST_PANIC.lock().ok().and_then(|mut slot| slot.take())
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// `"<kind>: <message>"` followed by the stack captured at the failure.
fn crash_report(err: &MonitorError, max_chars: usize) -> String {
    let mut report = format!("{}: {}", err.kind(), err);
    if let Some(trace) = err.trace() {
        report.push_str("\n\nStack trace:\n");
        report.push_str(&trace);
    }
    truncate_chars(&report, max_chars)
}

/// First `max` characters of `s`.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::price_monitor::tests::{monitor_with, RecordingNotifier, Sent};
    use crate::application::MonitorConfig;
    use crate::domain::price::test_support::{quote, ScriptedSource};
    use crate::domain::price::{FetchConfig, MarketQuote, PriceFetcher, PriceSource};
    use crate::infrastructure::ChangeLog;
    use crate::shared::errors::FetchError;
    use crate::shared::types::ItemConfig;
    use async_trait::async_trait;
    use tokio::time::Instant;

    fn item() -> ItemConfig {
        ItemConfig {
            name: "Case".to_string(),
            url: "https://market.example/case".to_string(),
        }
    }

    fn errors(notifier: &RecordingNotifier) -> Vec<String> {
        notifier
            .sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Error(message) => Some(message),
                Sent::PriceChange(..) => None,
            })
            .collect()
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("abcdef", 3), "abc");
        assert_eq!(truncate_chars("ab", 3), "ab");
        assert_eq!(truncate_chars("€€€€", 2), "€€");
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_is_reported_and_restarted() {
        let dir = tempfile::tempdir().expect("temp dir");
        let not_a_dir = dir.path().join("logs");
        std::fs::write(&not_a_dir, "").unwrap();

        let source = Arc::new(ScriptedSource::new(vec![
            quote("1,00€"),
            quote("2,00€"),
            quote("1,00€"),
            quote("2,00€"),
            quote("1,00€"),
            quote("2,00€"),
        ]));
        let notifier = Arc::new(RecordingNotifier::default());
        let monitor = monitor_with(source.clone(), vec![item()], &not_a_dir, notifier.clone());
        let config = SupervisorConfig {
            max_restarts: Some(2),
            ..SupervisorConfig::default()
        };
        let supervisor = Supervisor::new(Arc::new(monitor), notifier.clone(), config);

        let started = Instant::now();
        let err = supervisor.run().await;
        assert!(err.downcast_ref::<MonitorError>().unwrap().is_fatal());

        // still restarted twice, with the cooldown in between
        let reports = errors(&notifier);
        assert_eq!(reports.len(), 3);
        assert_eq!(source.calls(), 6);
        assert!(reports.iter().all(|r| r.starts_with("ConfigurationError: ")));
        assert!(started.elapsed() >= Duration::from_secs(3 * 300 + 2 * 60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recoverable_errors_restart_until_limit() {
        let dir = tempfile::tempdir().expect("temp dir");
        // a directory where the item's log file should be makes every write fail
        std::fs::create_dir_all(ChangeLog::new(dir.path()).path_for("Case")).unwrap();

        let source = Arc::new(ScriptedSource::new(vec![
            quote("1,00€"),
            quote("2,00€"),
            quote("1,00€"),
            quote("2,00€"),
            quote("1,00€"),
            quote("2,00€"),
        ]));
        let notifier = Arc::new(RecordingNotifier::default());
        let monitor = monitor_with(source.clone(), vec![item()], dir.path(), notifier.clone());
        let config = SupervisorConfig {
            max_report_chars: 40,
            max_restarts: Some(2),
            ..SupervisorConfig::default()
        };
        let supervisor = Supervisor::new(Arc::new(monitor), notifier.clone(), config);

        let err = supervisor.run().await;
        assert!(!err.downcast_ref::<MonitorError>().unwrap().is_fatal());

        // initial run plus two restarts, each one crashing on its first cycle
        let reports = errors(&notifier);
        assert_eq!(reports.len(), 3);
        assert_eq!(source.calls(), 6);
        for report in reports {
            assert!(report.starts_with("IoError: "));
            assert!(report.chars().count() <= 40);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_healthy_cycles_reset_the_crash_count() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::create_dir_all(ChangeLog::new(dir.path()).path_for("Case")).unwrap();

        let source = Arc::new(ScriptedSource::new(vec![
            // two healthy cycles, then a crash
            quote("1,00€"),
            quote("1,00€"),
            quote("1,00€"),
            quote("2,00€"),
            // one healthy cycle, then a crash
            quote("1,00€"),
            quote("1,00€"),
            quote("2,00€"),
            // crash without a healthy cycle
            quote("1,00€"),
            quote("2,00€"),
        ]));
        let notifier = Arc::new(RecordingNotifier::default());
        let monitor = Arc::new(monitor_with(source.clone(), vec![item()], dir.path(), notifier.clone()));
        let config = SupervisorConfig {
            max_report_chars: 100_000,
            max_restarts: Some(1),
            ..SupervisorConfig::default()
        };
        let supervisor = Supervisor::new(Arc::clone(&monitor), notifier.clone(), config);

        let _err = supervisor.run().await;

        let reports = errors(&notifier);
        assert_eq!(reports.len(), 3);
        assert_eq!(source.calls(), 9);
        assert_eq!(monitor.completed_cycles(), 3);

        // the stack points at the cycle that failed, not at the supervisor
        assert!(reports[0].starts_with("IoError: "));
        assert!(reports[0].contains("Stack trace:"));
        assert!(reports[0].contains("run_cycle"));
    }

    struct PanickingSource;

    #[async_trait]
    impl PriceSource for PanickingSource {
        async fn fetch_quote(&self, _url: &str) -> Result<MarketQuote, FetchError> {
            panic!("source exploded");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_panics_are_reported() {
        let dir = tempfile::tempdir().expect("temp dir");
        let notifier = Arc::new(RecordingNotifier::default());
        let monitor = PriceMonitor::new(
            MonitorConfig {
                items: vec![item()],
                ..MonitorConfig::default()
            },
            PriceFetcher::new(Arc::new(PanickingSource), FetchConfig::default()),
            ChangeLog::new(dir.path()),
            notifier.clone(),
        );
        let config = SupervisorConfig {
            max_restarts: Some(0),
            ..SupervisorConfig::default()
        };
        let supervisor = Supervisor::new(Arc::new(monitor), notifier.clone(), config);

        let _err = supervisor.run().await;

        let reports = errors(&notifier);
        assert_eq!(reports.len(), 1);
        assert!(reports[0].starts_with("Panic: "));
        assert!(reports[0].contains("source exploded"));
        assert!(reports[0].contains("panicked at"));
        assert!(reports[0].contains("supervisor.rs"));
    }
}
