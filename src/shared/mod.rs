//! Shared components - common types, errors and configuration

pub mod types;
pub mod errors;
pub mod config;
