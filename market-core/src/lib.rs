//! Commodity market simulation core.
//!
//! An [`AuctionHouse`] runs a continuous double auction over a fixed commodity
//! catalog. [`Trader`]s talk to it only through [`Message`]s: they register,
//! post bids and asks each tick, and learn from the results delivered back to
//! their mailbox. Production and consumption are pluggable [`Role`]s, and a
//! [`Simulation`] ticks the population in a stable order.

pub mod agents;
pub mod config;
pub mod error;
pub mod market;
pub mod messages;
pub mod simulation;
pub mod types;

pub use agents::*;
pub use config::*;
pub use error::*;
pub use market::*;
pub use messages::*;
pub use simulation::*;
pub use types::*;

#[cfg(feature = "instrument")]
pub use instrument;
