use chrono::{Datelike, NaiveDate};

use crate::error::{Result, StoreError};
use crate::models::Person;

/// Text format of the `birthdate` column.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Raw `person` row as SQLite hands it back, before the date is parsed.
#[derive(Debug, Clone)]
pub(crate) struct RawPerson {
    pub(crate) id: i64,
    pub(crate) name: Option<String>,
    pub(crate) lastname: Option<String>,
    pub(crate) birthdate: String,
}

/// Serialize a date the way it is stored. Years outside 0..=9999 would not
/// come back through `YYYY-MM-DD`, so they are rejected up front.
pub fn encode_date(date: NaiveDate) -> Result<String> {
    if !(0..=9999).contains(&date.year()) {
        return Err(StoreError::Validation(format!(
            "birthdate {date} cannot be stored as YYYY-MM-DD"
        )));
    }
    Ok(date.format(DATE_FORMAT).to_string())
}

pub fn parse_date(text: &str) -> std::result::Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(text, DATE_FORMAT)
}

/// Column values for INSERT/UPDATE, in `(name, lastname, birthdate)` order.
pub(crate) fn encode(person: &Person) -> Result<(&str, &str, String)> {
    let birthdate = encode_date(person.birthdate)?;
    Ok((&person.name, &person.lastname, birthdate))
}

pub(crate) fn decode(row: RawPerson) -> Result<Person> {
    let birthdate = parse_date(&row.birthdate).map_err(|source| StoreError::Parse {
        id: row.id,
        text: row.birthdate.clone(),
        source,
    })?;

    Ok(Person {
        id: Some(row.id),
        name: row.name.unwrap_or_default(),
        lastname: row.lastname.unwrap_or_default(),
        birthdate,
    })
}
