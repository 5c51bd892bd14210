//! Status module for StatusTrail.
//!
//! Holds the persisted snapshot model, the per-service merge of fresh probe
//! outcomes, and the downtime ledgers.

mod history;
mod models;
mod reconcile;
mod store;

pub use history::*;
pub use models::*;
pub use reconcile::*;
pub use store::*;
