//! Persistence module split across logical submodules.

pub mod codec;
mod connection;
mod store;

pub use store::{Store, SubscriptionId};
