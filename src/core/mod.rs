//! Error taxonomy and configuration shared by every tagstats component.

#![warn(missing_docs)]

pub mod config;
pub mod error;

// Re-export commonly used types
pub use config::{
    Config, ConfigBuilder, InfluxSinkConfig, LogLevel, PathMatch, SinkConfig, StatusConfig,
};
pub use error::{Result, StatsError};
