use thiserror::Error;

#[derive(Error, Debug)]
pub enum StatsError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Point construction error: {0}")]
    Point(String),

    #[error("Sink error: {0}")]
    Sink(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Async task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Result type alias for tagstats operations
pub type Result<T> = std::result::Result<T, StatsError>;

impl StatsError {
    /// Creates a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a new point construction error
    pub fn point<S: Into<String>>(msg: S) -> Self {
        Self::Point(msg.into())
    }

    /// Creates a new sink error
    pub fn sink<S: Into<String>>(msg: S) -> Self {
        Self::Sink(msg.into())
    }

    /// Returns true if the next export tick may succeed where this one failed
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Point(_) | Self::Sink(_) | Self::Http(_) | Self::Io(_) => true,
            Self::Config(_) | Self::Serialization(_) | Self::Yaml(_) | Self::Join(_) => false,
        }
    }

    /// Returns the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) | Self::Yaml(_) => "config",
            Self::Point(_) => "point",
            Self::Sink(_) | Self::Http(_) => "sink",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
            Self::Join(_) => "async",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = StatsError::config("interval must be positive");
        assert_eq!(err.to_string(), "Configuration error: interval must be positive");
        assert_eq!(err.category(), "config");
    }

    #[test]
    fn test_error_recoverability() {
        assert!(StatsError::sink("503 Service Unavailable").is_recoverable());
        assert!(StatsError::point("empty field set").is_recoverable());
        assert!(!StatsError::config("bad address").is_recoverable());
    }

    #[test]
    fn test_yaml_error_is_config() {
        let err: StatsError = serde_yaml::from_str::<u32>("[not, a, number]")
            .unwrap_err()
            .into();
        assert_eq!(err.category(), "config");
        assert!(!err.is_recoverable());
    }
}
