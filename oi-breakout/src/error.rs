//! Error types for the breakout engine.
//!
//! Every failure the core can raise maps onto one of four handling
//! categories (see [`ErrorKind`]): bad data skips the tick, out-of-order
//! data drops the tick, a state violation aborts the day, and an
//! unavailable collaborator propagates to the caller.

use thiserror::Error;

use crate::data::OptionType;

#[derive(Error, Debug)]
pub enum StrategyError {
    #[error("Data error: {0}")]
    Data(String),

    #[error("Option chain has no {0} quotes")]
    EmptyChain(OptionType),

    #[error("Sequence error: {0}")]
    Sequence(String),

    #[error("State error: {0}")]
    State(String),

    #[error("External collaborator unavailable: {0}")]
    ExternalUnavailable(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StrategyResult<T> = Result<T, StrategyError>;

/// Handling category of a [`StrategyError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or empty snapshot: skip the tick, log, continue.
    Data,
    /// Out-of-order or duplicate timestamp: drop the tick.
    Sequence,
    /// Invariant violation: fatal for the current day's run.
    State,
    /// Collaborator failure: propagate to the caller.
    ExternalUnavailable,
    /// Bad configuration, rejected before any run starts.
    Config,
}

impl StrategyError {
    pub fn data(msg: impl Into<String>) -> Self {
        Self::Data(msg.into())
    }

    pub fn sequence(msg: impl Into<String>) -> Self {
        Self::Sequence(msg.into())
    }

    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::ExternalUnavailable(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Data(_) | Self::EmptyChain(_) => ErrorKind::Data,
            Self::Sequence(_) => ErrorKind::Sequence,
            Self::State(_) => ErrorKind::State,
            Self::ExternalUnavailable(_) | Self::Io(_) | Self::Serialization(_) => {
                ErrorKind::ExternalUnavailable
            }
            Self::Config(_) => ErrorKind::Config,
        }
    }

    /// Whether the pipeline may skip the offending tick and carry on.
    pub fn is_recoverable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Data | ErrorKind::Sequence)
    }
}
