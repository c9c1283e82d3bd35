//! Error taxonomy for the persistence layer. The UI layer wraps these in
//! `anyhow` so it can attach context, but everything below `ui` returns the
//! typed variants so callers can tell a closed store from a corrupted row.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// An operation that needs a live connection ran before `open`.
    #[error("no database is open")]
    NotOpen,

    /// SQLite refused to open, read, or write the file.
    #[error("failed to {action}")]
    Storage {
        action: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    /// The database file itself could not be prepared on disk.
    #[error("failed to prepare {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A stored birthdate is not `YYYY-MM-DD`.
    #[error("person {id} has an invalid birthdate {text:?}")]
    Parse {
        id: i64,
        text: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("{0}")]
    Validation(String),
}

impl StoreError {
    pub(crate) fn storage(action: &'static str) -> impl FnOnce(rusqlite::Error) -> Self {
        move |source| StoreError::Storage { action, source }
    }
}
