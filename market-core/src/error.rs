use thiserror::Error;

use crate::types::TraderId;

/// Validation and lifecycle failures inside the auction house.
///
/// None of these escape as panics: the engine logs them and drops the
/// offending message.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MarketError {
    #[error("unknown commodity '{0}'")]
    UnknownCommodity(String),

    #[error("commodity '{0}' is already registered")]
    DuplicateCommodity(String),

    #[error("trader {0} is already registered")]
    DuplicateTrader(TraderId),

    #[error("offer from trader {sender} for '{commodity}' has zero quantity")]
    InvalidQuantity { sender: TraderId, commodity: String },

    #[error("offer from trader {sender} for '{commodity}' has invalid price {price}")]
    InvalidPrice {
        sender: TraderId,
        commodity: String,
        price: f64,
    },

    #[error("auction house has shut down")]
    EngineStopped,

    #[error("auction house does not accept {kind} messages")]
    UnexpectedMessage { kind: &'static str },
}

/// Failures while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("malformed config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
