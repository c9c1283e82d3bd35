//! Display-ready snapshot of the registry. The list is thrown away and rebuilt
//! from the store on every refresh, so it never drifts from what is on disk.

use crate::db::codec::DATE_FORMAT;
use crate::db::Store;
use crate::error::Result;
use crate::models::Person;

/// One line of the people list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonRow {
    /// `Name Lastname`.
    pub display_name: String,
    /// Birthdate in ISO form.
    pub birthdate: String,
    pub person: Person,
}

impl From<Person> for PersonRow {
    fn from(person: Person) -> Self {
        Self {
            display_name: person.display_name(),
            birthdate: person.birthdate.format(DATE_FORMAT).to_string(),
            person,
        }
    }
}

#[derive(Debug, Default)]
pub struct PersonList {
    rows: Vec<PersonRow>,
}

impl PersonList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the rows from `store`, keeping its order. The list is cleared
    /// first, so a failed fetch leaves it empty.
    pub fn refresh(&mut self, store: &Store, search: Option<&str>) -> Result<()> {
        self.rows.clear();
        let people = store.fetch_all(search)?;
        self.rows.extend(people.into_iter().map(PersonRow::from));
        Ok(())
    }

    /// Person backing the row at `index`.
    pub fn get_record(&self, index: usize) -> Option<&Person> {
        self.rows.get(index).map(|row| &row.person)
    }

    pub fn rows(&self) -> &[PersonRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row index of the person with `id`, if it is currently listed.
    pub fn position_of(&self, id: i64) -> Option<usize> {
        self.rows.iter().position(|row| row.person.id == Some(id))
    }
}
