use thiserror::Error;

use crate::config::ExitSignal;

#[derive(Debug, Error)]
pub enum CloserError {
    #[error("Failed to build closer runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("Failed to subscribe to {signal:?}: {source}")]
    Signal {
        signal: ExitSignal,
        #[source]
        source: std::io::Error,
    },

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Shutdown already in progress")]
    ShutdownInProgress,
}

pub type Result<T> = std::result::Result<T, CloserError>;
