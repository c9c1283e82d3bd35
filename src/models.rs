//! Domain model that mirrors the `person` table. It stays a plain data holder
//! so the store and the UI can pass it around freely.

use std::fmt;

use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq, Eq)]
/// One entry in the registry.
pub struct Person {
    /// Primary key assigned by the store. `None` until the person has been
    /// added; edit and delete flows hand it back to the persistence layer.
    pub id: Option<i64>,
    pub name: String,
    pub lastname: String,
    pub birthdate: NaiveDate,
}

impl Person {
    /// Build a person that has not been persisted yet.
    pub fn new(name: impl Into<String>, lastname: impl Into<String>, birthdate: NaiveDate) -> Self {
        Self {
            id: None,
            name: name.into(),
            lastname: lastname.into(),
            birthdate,
        }
    }

    /// `Name Lastname`, the string shown in the list view.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.name, self.lastname)
    }
}

impl fmt::Display for Person {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
