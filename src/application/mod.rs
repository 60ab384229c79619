//! Application layer - the monitoring loop and its supervisor

pub mod price_monitor;
pub mod supervisor;

pub use price_monitor::{CycleReport, MonitorConfig, PriceMonitor};
pub use supervisor::{Supervisor, SupervisorConfig};
