//! Unified error handling for the grid bot
//!
//! Every fallible operation in the crate returns [`TradingResult`]. The three
//! error kinds the engine cares about map onto variants as follows:
//! configuration problems are [`TradingError::Config`], out-of-range call
//! arguments are [`TradingError::InvalidParameter`] and degenerate numeric
//! results or malformed account data are [`TradingError::Computation`].

use crate::config::ConfigError;
use thiserror::Error;

/// Main error type for the grid bot
#[derive(Debug, Error)]
pub enum TradingError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An argument fell outside its documented range (parameter_name, reason)
    #[error("Invalid parameter '{0}': {1}")]
    InvalidParameter(String, String),

    #[error("Computation failed: {0}")]
    Computation(String),

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Order rejected: {0}")]
    OrderRejected(String),
}

impl TradingError {
    pub fn invalid_param(param: &str, reason: impl Into<String>) -> Self {
        TradingError::InvalidParameter(param.to_string(), reason.into())
    }

    pub fn computation(msg: impl Into<String>) -> Self {
        TradingError::Computation(msg.into())
    }

    /// Get a user-friendly error message with helpful context
    pub fn user_message(&self) -> String {
        match self {
            TradingError::Config(ConfigError::FileNotFound(path)) => {
                format!(
                    "Configuration file not found: {}\n\n\
                    💡 Quick fix:\n\
                    1. Run: grid-bot init\n\
                    2. Edit config.toml with your grid range\n\
                    3. Try again",
                    path
                )
            }
            TradingError::Config(err) => {
                format!(
                    "{}\n\n\
                    💡 Check config.toml for:\n\
                    - lower_level below upper_level\n\
                    - number_of_grids between 2 and 1000\n\
                    - units_per_trade between 1 and 100000000",
                    err
                )
            }
            TradingError::InvalidParameter(param, reason) => {
                format!(
                    "Invalid parameter '{}': {}\n\n\
                    💡 Prices must lie in [0.0001, 100000] and spreads in [0, 1000] pips",
                    param, reason
                )
            }
            TradingError::Gateway(msg) => {
                format!(
                    "Broker gateway error: {}\n\n\
                    💡 The polling loop can retry on the next cycle",
                    msg
                )
            }
            _ => self.to_string(),
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, TradingError::Gateway(_))
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            TradingError::Config(_) => "config",
            TradingError::InvalidParameter(_, _) => "validation",
            TradingError::Computation(_) => "computation",
            TradingError::Gateway(_) => "gateway",
            TradingError::OrderRejected(_) => "trading",
        }
    }
}

impl From<serde_json::Error> for TradingError {
    fn from(err: serde_json::Error) -> Self {
        TradingError::Computation(format!("JSON error: {}", err))
    }
}

/// Result type alias using TradingError
pub type TradingResult<T> = Result<T, TradingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TradingError::invalid_param("entry_price", "out of range: 0");
        assert_eq!(err.to_string(), "Invalid parameter 'entry_price': out of range: 0");
    }

    #[test]
    fn test_error_category() {
        let err = TradingError::Config(ConfigError::Validation("test".to_string()));
        assert_eq!(err.category(), "config");

        let err = TradingError::computation("test");
        assert_eq!(err.category(), "computation");

        let err = TradingError::Gateway("test".to_string());
        assert_eq!(err.category(), "gateway");
    }

    #[test]
    fn test_retryable() {
        assert!(TradingError::Gateway("timeout".to_string()).is_retryable());
        assert!(!TradingError::computation("overflow").is_retryable());
    }

    #[test]
    fn test_user_message() {
        let err = TradingError::Config(ConfigError::FileNotFound("config.toml".to_string()));
        let msg = err.user_message();
        assert!(msg.contains("config.toml"));
        assert!(msg.contains("💡"));
    }
}
