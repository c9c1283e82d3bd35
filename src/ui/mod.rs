//! Ratatui front-end: a people list with modal forms, inline search, and the
//! startup chooser for picking a database file.

mod app;
mod forms;
mod helpers;
mod terminal;

pub use app::App;
pub use terminal::run_app;
