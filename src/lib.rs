//! Core library surface for the People Registry TUI application.
//!
//! The persistence layer (`db`), the display projection, and the settings
//! store are usable without the terminal front-end; `ui` only talks to them
//! through the public API re-exported here.
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod projection;
pub mod ui;

pub use config::Config;
pub use db::{Store, SubscriptionId};
pub use error::{Result, StoreError};
pub use models::Person;
pub use projection::{PersonList, PersonRow};

/// The interactive application entry point and state container.
pub use ui::{run_app, App};
