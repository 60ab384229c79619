use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::application::{MonitorConfig, SupervisorConfig};
use crate::domain::price::FetchConfig;
use crate::shared::errors::ConfigError;
use crate::shared::types::ItemConfig;

pub const DEFAULT_CONFIG_PATH: &str = "Config.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AlertCfg {
    /// Minimum absolute change in EUR that triggers a push notification
    pub threshold: f64,
    /// `value1` of error notifications
    pub error_title: String,
}

impl Default for AlertCfg {
    fn default() -> Self {
        Self {
            threshold: 10.0,
            error_title: "Price Alert Error".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchCfg {
    pub max_attempts: u32,
    pub timeout_secs: u64,
    pub retry_delay_secs: u64,
    pub usd_to_eur_rate: f64,
}

impl Default for FetchCfg {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            timeout_secs: 10,
            retry_delay_secs: 2,
            usd_to_eur_rate: 0.93,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SupervisorCfg {
    pub restart_delay_secs: u64,
    pub max_report_chars: usize,
    /// Stop after this many crashes in a row with no successful cycle
    /// between them; unset means never
    pub max_restarts: Option<u32>,
}

impl Default for SupervisorCfg {
    fn default() -> Self {
        Self {
            restart_delay_secs: 60,
            max_report_chars: 2000,
            max_restarts: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,
    #[serde(default)]
    pub alert: AlertCfg,
    #[serde(default)]
    pub fetch: FetchCfg,
    #[serde(default)]
    pub supervisor: SupervisorCfg,
    #[serde(default)]
    pub items: Vec<ItemConfig>,
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("price_logs")
}

fn default_check_interval_secs() -> u64 {
    300
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let s = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&s)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Check invariants that serde cannot express. Call after CLI overrides.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.items.is_empty() {
            return Err(ConfigError::NoItems);
        }

        let mut seen = HashSet::new();
        for item in &self.items {
            if !seen.insert(item.name.as_str()) {
                return Err(ConfigError::DuplicateItem(item.name.clone()));
            }
            if item.url.trim().is_empty() {
                return Err(ConfigError::EmptyUrl(item.name.clone()));
            }
        }

        match self.webhook_url.as_deref() {
            Some(url) if !url.trim().is_empty() => {}
            _ => {
                return Err(ConfigError::InvalidValue {
                    field: "webhook_url",
                    reason: "must be set in the config file, with --webhook-url or PRICEWATCH_WEBHOOK_URL".to_string(),
                })
            }
        }

        if self.check_interval_secs == 0 {
            return Err(invalid("check_interval_secs", "must be positive"));
        }
        if self.fetch.max_attempts == 0 {
            return Err(invalid("fetch.max_attempts", "must be at least 1"));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(invalid("fetch.timeout_secs", "must be positive"));
        }
        if !(self.fetch.usd_to_eur_rate > 0.0) {
            return Err(invalid("fetch.usd_to_eur_rate", "must be positive"));
        }
        if !(self.alert.threshold >= 0.0) {
            return Err(invalid("alert.threshold", "must not be negative"));
        }

        Ok(())
    }

    pub fn webhook_url(&self) -> &str {
        self.webhook_url.as_deref().unwrap_or_default()
    }

    pub fn fetch_config(&self) -> Result<FetchConfig, ConfigError> {
        Ok(FetchConfig {
            max_attempts: self.fetch.max_attempts,
            timeout: Duration::from_secs(self.fetch.timeout_secs),
            retry_delay: Duration::from_secs(self.fetch.retry_delay_secs),
            usd_to_eur_rate: to_decimal("fetch.usd_to_eur_rate", self.fetch.usd_to_eur_rate)?,
        })
    }

    pub fn monitor_config(&self) -> Result<MonitorConfig, ConfigError> {
        Ok(MonitorConfig {
            items: self.items.clone(),
            threshold: to_decimal("alert.threshold", self.alert.threshold)?,
            check_interval: Duration::from_secs(self.check_interval_secs),
        })
    }

    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            restart_delay: Duration::from_secs(self.supervisor.restart_delay_secs),
            max_report_chars: self.supervisor.max_report_chars,
            max_restarts: self.supervisor.max_restarts,
        }
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.to_string(),
    }
}

/// Goes through the shortest decimal rendering of the float, so `0.93`
/// becomes exactly `0.93` rather than its binary approximation.
fn to_decimal(field: &'static str, value: f64) -> Result<Decimal, ConfigError> {
    Decimal::from_str(&value.to_string()).map_err(|e| invalid(field, &e.to_string()))
}
