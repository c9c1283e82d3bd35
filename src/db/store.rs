use std::cell::{Cell, RefCell};
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use rusqlite::types::Value;
use rusqlite::{params, Connection, Params};
use tracing::{debug, info, warn};

use super::codec::{self, RawPerson};
use super::connection::{open_connection, open_memory_connection, truncate_file};
use crate::error::{Result, StoreError};
use crate::models::Person;

/// Handle returned by [`Store::subscribe`], used to detach the observer later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Observer = Rc<dyn Fn(&Store)>;

/// Owns the single connection to the registry file and tells observers about
/// every change. All calls must come from one thread; the type is `!Sync`.
pub struct Store {
    conn: Option<Connection>,
    path: Option<PathBuf>,
    observers: RefCell<Vec<(SubscriptionId, Observer)>>,
    next_subscription: Cell<u64>,
}

impl Store {
    /// A store with no connection yet. Call [`Store::open`] or
    /// [`Store::create`] before using it.
    pub fn new() -> Self {
        Self {
            conn: None,
            path: None,
            observers: RefCell::new(Vec::new()),
            next_subscription: Cell::new(0),
        }
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let mut store = Self::new();
        store.conn = Some(open_memory_connection()?);
        Ok(store)
    }

    /// Close any current connection, then open (or create) `path` and ensure
    /// the schema. When this fails the store is left closed.
    pub fn open(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.close();

        let conn = open_connection(path)?;
        info!(path = %path.display(), "opened database");
        self.conn = Some(conn);
        self.path = Some(path.to_path_buf());
        self.emit();
        Ok(())
    }

    /// Start a fresh database at `path`, discarding whatever file was there.
    pub fn create(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.close();

        truncate_file(path)?;
        info!(path = %path.display(), "created database file");
        self.open(path)
    }

    pub fn is_opened(&self) -> bool {
        self.conn.is_some()
    }

    /// File backing the current connection. `None` when closed or in memory.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Insert a new row and return the person with the id SQLite assigned.
    /// Any id already on `person` is ignored.
    pub fn add(&self, person: &Person) -> Result<Person> {
        let conn = self.conn()?;
        let (name, lastname, birthdate) = codec::encode(person)?;

        conn.execute(
            "INSERT INTO person (name, lastname, birthdate) VALUES (?1, ?2, ?3)",
            params![name, lastname, birthdate],
        )
        .map_err(StoreError::storage("insert person"))?;

        let id = conn.last_insert_rowid();
        debug!(id, "added person");
        self.emit();

        Ok(Person {
            id: Some(id),
            ..person.clone()
        })
    }

    /// Overwrite name, lastname, and birthdate for `person.id`. Returns
    /// `false` when no row carries that id; storage is then unchanged.
    pub fn update(&self, person: &Person) -> Result<bool> {
        let id = persisted_id(person, "update")?;
        let conn = self.conn()?;
        let (name, lastname, birthdate) = codec::encode(person)?;

        let updated = conn
            .execute(
                "UPDATE person SET name = ?1, lastname = ?2, birthdate = ?3 WHERE id = ?4",
                params![name, lastname, birthdate, id],
            )
            .map_err(StoreError::storage("update person"))?;

        debug!(id, rows = updated, "updated person");
        self.emit();
        Ok(updated > 0)
    }

    /// Remove the row for `person.id`. Returns `false` when it was already
    /// gone.
    pub fn delete(&self, person: &Person) -> Result<bool> {
        let id = persisted_id(person, "delete")?;
        let conn = self.conn()?;

        let deleted = conn
            .execute("DELETE FROM person WHERE id = ?1", params![id])
            .map_err(StoreError::storage("delete person"))?;

        debug!(id, rows = deleted, "deleted person");
        self.emit();
        Ok(deleted > 0)
    }

    /// Every person, optionally narrowed to those whose name or lastname
    /// contains `search`. The term is lowercased with Unicode rules while the
    /// columns go through SQLite's ASCII-only `LOWER`. Double quotes in the
    /// term are dropped and the rest is matched literally.
    pub fn fetch_all(&self, search: Option<&str>) -> Result<Vec<Person>> {
        let conn = self.conn()?;

        let rows = match search.and_then(search_pattern) {
            Some(pattern) => load_rows(
                conn,
                r"SELECT id, name, lastname, birthdate FROM person
                  WHERE LOWER(name) LIKE ?1 ESCAPE '\'
                     OR LOWER(lastname) LIKE ?1 ESCAPE '\'
                  ORDER BY id",
                [pattern],
            )?,
            None => load_rows(
                conn,
                "SELECT id, name, lastname, birthdate FROM person ORDER BY id",
                [],
            )?,
        };

        debug!(count = rows.len(), filtered = search.is_some(), "fetched people");
        rows.into_iter().map(codec::decode).collect()
    }

    /// Register `observer` to run after every open, add, update, and delete.
    /// Observers may call back into the store, including mutations.
    pub fn subscribe(&self, observer: impl Fn(&Store) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.get());
        self.next_subscription.set(id.0 + 1);
        self.observers.borrow_mut().push((id, Rc::new(observer)));
        id
    }

    /// Detach an observer. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.observers.borrow_mut();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    fn emit(&self) {
        // Snapshot so callbacks can subscribe or mutate without tripping the
        // RefCell borrow.
        let observers: Vec<Observer> = self
            .observers
            .borrow()
            .iter()
            .map(|(_, observer)| Rc::clone(observer))
            .collect();

        for observer in observers {
            observer(self);
        }
    }

    fn conn(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or(StoreError::NotOpen)
    }

    fn close(&mut self) {
        self.path = None;
        if let Some(conn) = self.conn.take() {
            if let Err((_, err)) = conn.close() {
                warn!(error = %err, "failed to close previous database cleanly");
            }
        }
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.path)
            .field("opened", &self.is_opened())
            .field("observers", &self.observers.borrow().len())
            .finish()
    }
}

fn persisted_id(person: &Person, action: &str) -> Result<i64> {
    person.id.ok_or_else(|| {
        StoreError::Validation(format!("cannot {action} a person that was never saved"))
    })
}

fn load_rows<P: Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<RawPerson>> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(StoreError::storage("prepare person query"))?;

    let rows = stmt
        .query_map(params, |row| {
            Ok(RawPerson {
                id: row.get(0)?,
                name: row.get(1)?,
                lastname: row.get(2)?,
                birthdate: birthdate_text(row.get(3)?),
            })
        })
        .map_err(StoreError::storage("load people"))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(StoreError::storage("collect people"))?;

    Ok(rows)
}

/// Hand-edited files may hold any storage class in `birthdate`. Non-text
/// cells keep their textual form so decoding reports them as `Parse`.
fn birthdate_text(cell: Value) -> String {
    match cell {
        Value::Text(text) => text,
        Value::Null => String::new(),
        Value::Integer(n) => n.to_string(),
        Value::Real(n) => n.to_string(),
        Value::Blob(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
    }
}

/// Turn a search term into a `LIKE` pattern. Double quotes are stripped,
/// wildcard characters escaped, and an empty remainder means "no filter".
fn search_pattern(search: &str) -> Option<String> {
    let cleaned: String = search
        .chars()
        .filter(|ch| *ch != '"')
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let mut pattern = String::with_capacity(cleaned.len() + 2);
    pattern.push('%');
    for ch in cleaned.to_lowercase().chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    Some(pattern)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn person(name: &str, lastname: &str, y: i32, m: u32, d: u32) -> Person {
        Person::new(name, lastname, NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    fn counter(store: &Store) -> Rc<Cell<usize>> {
        let hits = Rc::new(Cell::new(0));
        let seen = Rc::clone(&hits);
        store.subscribe(move |_| seen.set(seen.get() + 1));
        hits
    }

    fn names(people: &[Person]) -> Vec<String> {
        let mut names: Vec<String> = people.iter().map(Person::display_name).collect();
        names.sort();
        names
    }

    #[test]
    fn test_add_then_fetch_assigns_fresh_id() {
        let store = Store::open_in_memory().unwrap();
        let first = store.add(&person("Ana", "Lopez", 1990, 4, 2)).unwrap();
        let draft = person("Juan", "Perez", 1985, 12, 31);
        let second = store.add(&draft).unwrap();

        assert!(first.id.is_some());
        assert_ne!(first.id, second.id);

        let people = store.fetch_all(None).unwrap();
        assert_eq!(people.len(), 2);
        let stored = people.iter().find(|p| p.id == second.id).unwrap();
        assert_eq!(stored.name, draft.name);
        assert_eq!(stored.lastname, draft.lastname);
        assert_eq!(stored.birthdate, draft.birthdate);
    }

    #[test]
    fn test_deleted_id_is_not_reused() {
        let store = Store::open_in_memory().unwrap();
        store.add(&person("Ana", "Lopez", 1990, 4, 2)).unwrap();
        let juan = store.add(&person("Juan", "Perez", 1985, 12, 31)).unwrap();
        assert!(store.delete(&juan).unwrap());

        let pedro = store.add(&person("Pedro", "Gomez", 1970, 3, 3)).unwrap();
        assert_ne!(pedro.id, juan.id);
        assert!(pedro.id > juan.id);
    }

    #[test]
    fn test_update_then_fetch() {
        let store = Store::open_in_memory().unwrap();
        let mut saved = store.add(&person("Ana", "Lopez", 1990, 4, 2)).unwrap();

        saved.name = "Anabel".into();
        saved.birthdate = NaiveDate::from_ymd_opt(1991, 5, 3).unwrap();
        assert!(store.update(&saved).unwrap());

        let people = store.fetch_all(None).unwrap();
        assert_eq!(people, vec![saved]);
    }

    #[test]
    fn test_delete_then_fetch() {
        let store = Store::open_in_memory().unwrap();
        let gone = store.add(&person("Ana", "Lopez", 1990, 4, 2)).unwrap();
        let kept = store.add(&person("Juan", "Perez", 1985, 1, 1)).unwrap();

        assert!(store.delete(&gone).unwrap());

        let people = store.fetch_all(None).unwrap();
        assert_eq!(people, vec![kept]);
    }

    #[test]
    fn test_missing_id_is_silent_noop() {
        let store = Store::open_in_memory().unwrap();
        let saved = store.add(&person("Ana", "Lopez", 1990, 4, 2)).unwrap();

        let mut ghost = person("Ghost", "Row", 2000, 1, 1);
        ghost.id = Some(999);
        assert!(!store.update(&ghost).unwrap());
        assert!(!store.delete(&ghost).unwrap());

        assert_eq!(store.fetch_all(None).unwrap(), vec![saved]);
    }

    #[test]
    fn test_update_without_id_is_validation_error() {
        let store = Store::open_in_memory().unwrap();
        let err = store.update(&person("Ana", "Lopez", 1990, 4, 2)).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn test_search_matches_name_or_lastname() {
        let store = Store::open_in_memory().unwrap();
        store.add(&person("Ana", "Lopez", 1990, 4, 2)).unwrap();
        store.add(&person("Juan", "anarquista", 1980, 7, 9)).unwrap();
        store.add(&person("Pedro", "Gomez", 1970, 3, 3)).unwrap();

        let hits = store.fetch_all(Some("ana")).unwrap();
        assert_eq!(names(&hits), vec!["Ana Lopez", "Juan anarquista"]);

        let upper = store.fetch_all(Some("ANA")).unwrap();
        assert_eq!(names(&upper), names(&hits));

        assert!(store.fetch_all(Some("xyz")).unwrap().is_empty());
    }

    #[test]
    fn test_search_strips_quotes() {
        let store = Store::open_in_memory().unwrap();
        store.add(&person("Ana", "Lopez", 1990, 4, 2)).unwrap();
        store.add(&person("Juan", "anarquista", 1980, 7, 9)).unwrap();

        let plain = names(&store.fetch_all(Some("ana")).unwrap());
        assert_eq!(names(&store.fetch_all(Some("ana\"")).unwrap()), plain);
        assert_eq!(store.fetch_all(Some("\"")).unwrap().len(), 2);
    }

    #[test]
    fn test_search_keeps_apostrophes() {
        let store = Store::open_in_memory().unwrap();
        store.add(&person("Liam", "O'Brien", 1988, 6, 14)).unwrap();
        store.add(&person("Ana", "Lopez", 1990, 4, 2)).unwrap();

        let hits = store.fetch_all(Some("o'b")).unwrap();
        assert_eq!(names(&hits), vec!["Liam O'Brien"]);
        assert!(store.fetch_all(Some("'ana")).unwrap().is_empty());
    }

    #[test]
    fn test_search_lowercases_non_ascii_term() {
        let store = Store::open_in_memory().unwrap();
        store.add(&person("ána", "Lopez", 1990, 4, 2)).unwrap();
        store.add(&person("Juan", "Perez", 1985, 1, 1)).unwrap();

        let hits = store.fetch_all(Some("ÁNA")).unwrap();
        assert_eq!(names(&hits), vec!["ána Lopez"]);
    }

    #[test]
    fn test_search_treats_wildcards_literally() {
        let store = Store::open_in_memory().unwrap();
        store.add(&person("Ana", "Lopez", 1990, 4, 2)).unwrap();
        store.add(&person("100%", "Real", 1990, 4, 2)).unwrap();

        assert_eq!(names(&store.fetch_all(Some("%")).unwrap()), vec!["100% Real"]);
        assert!(store.fetch_all(Some("_")).unwrap().is_empty());
    }

    #[test]
    fn test_each_mutation_notifies_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = Store::new();
        let hits = counter(&store);

        store.open(dir.path().join("people.db")).unwrap();
        assert_eq!(hits.get(), 1);

        let saved = store.add(&person("Ana", "Lopez", 1990, 4, 2)).unwrap();
        assert_eq!(hits.get(), 2);
        store.update(&saved).unwrap();
        assert_eq!(hits.get(), 3);
        store.delete(&saved).unwrap();
        assert_eq!(hits.get(), 4);

        store.fetch_all(Some("ana")).unwrap();
        assert_eq!(hits.get(), 4);
    }

    #[test]
    fn test_observer_sees_committed_rows() {
        let store = Store::open_in_memory().unwrap();
        let seen = Rc::new(Cell::new(0));
        let sink = Rc::clone(&seen);
        store.subscribe(move |store| sink.set(store.fetch_all(None).unwrap().len()));

        store.add(&person("Ana", "Lopez", 1990, 4, 2)).unwrap();
        assert_eq!(seen.get(), 1);
    }

    #[test]
    fn test_observer_may_mutate_reentrantly() {
        let store = Store::open_in_memory().unwrap();
        let hits = counter(&store);
        let armed = Rc::new(Cell::new(true));
        let flag = Rc::clone(&armed);
        store.subscribe(move |store| {
            if flag.replace(false) {
                store.add(&person("Echo", "Row", 2001, 1, 1)).unwrap();
            }
        });

        store.add(&person("Ana", "Lopez", 1990, 4, 2)).unwrap();
        assert_eq!(store.fetch_all(None).unwrap().len(), 2);
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn test_unsubscribe_stops_notifications() {
        let store = Store::open_in_memory().unwrap();
        let hits = Rc::new(Cell::new(0));
        let seen = Rc::clone(&hits);
        let id = store.subscribe(move |_| seen.set(seen.get() + 1));

        store.add(&person("Ana", "Lopez", 1990, 4, 2)).unwrap();
        assert!(store.unsubscribe(id));
        assert!(!store.unsubscribe(id));
        store.add(&person("Juan", "Perez", 1985, 1, 1)).unwrap();
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_reopen_keeps_table_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("people.db");

        let mut store = Store::new();
        store.open(&path).unwrap();
        let saved = store.add(&person("Ana", "Lopez", 1990, 4, 2)).unwrap();
        store.open(&path).unwrap();
        store.open(&path).unwrap();

        assert_eq!(store.fetch_all(None).unwrap(), vec![saved]);
        assert_eq!(store.path(), Some(path.as_path()));
    }

    #[test]
    fn test_create_discards_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("people.db");

        let mut store = Store::new();
        store.create(&path).unwrap();
        store.add(&person("Ana", "Lopez", 1990, 4, 2)).unwrap();

        store.create(&path).unwrap();
        assert!(store.fetch_all(None).unwrap().is_empty());
    }

    #[test]
    fn test_failed_open_leaves_store_closed() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = Store::new();
        store.open(dir.path().join("people.db")).unwrap();

        let err = store.open(dir.path().join("missing").join("people.db")).unwrap_err();
        assert!(matches!(err, StoreError::Storage { .. }));
        assert!(!store.is_opened());
        assert!(store.path().is_none());
        assert!(matches!(store.fetch_all(None), Err(StoreError::NotOpen)));
    }

    #[test]
    fn test_operations_require_open_store() {
        let store = Store::new();
        assert!(!store.is_opened());
        let err = store.add(&person("Ana", "Lopez", 1990, 4, 2)).unwrap_err();
        assert!(matches!(err, StoreError::NotOpen));
    }

    #[test]
    fn test_corrupted_birthdate_fails_fetch() {
        let store = Store::open_in_memory().unwrap();
        store.add(&person("Ana", "Lopez", 1990, 4, 2)).unwrap();
        store
            .conn()
            .unwrap()
            .execute(
                "INSERT INTO person (name, lastname, birthdate) VALUES ('Bad', 'Row', 'someday')",
                [],
            )
            .unwrap();

        let err = store.fetch_all(None).unwrap_err();
        assert!(matches!(err, StoreError::Parse { .. }));
    }

    #[test]
    fn test_integer_birthdate_is_parse_error() {
        let store = Store::open_in_memory().unwrap();
        store
            .conn()
            .unwrap()
            .execute(
                "INSERT INTO person (name, lastname, birthdate) VALUES ('Bad', 'Row', 19900402)",
                [],
            )
            .unwrap();

        match store.fetch_all(None).unwrap_err() {
            StoreError::Parse { text, .. } => assert_eq!(text, "19900402"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_search_pattern_escaping() {
        assert_eq!(search_pattern("Ana").as_deref(), Some("%ana%"));
        assert_eq!(search_pattern("a_b%").as_deref(), Some(r"%a\_b\%%"));
        assert_eq!(search_pattern("\""), None);
        assert_eq!(search_pattern("O'B").as_deref(), Some("%o'b%"));
        assert_eq!(search_pattern("ÁNA").as_deref(), Some("%ána%"));
        assert_eq!(search_pattern(""), None);
    }
}
