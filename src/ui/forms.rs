use std::path::PathBuf;

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};

use crate::models::Person;

/// Date format typed into the birthdate field.
pub(crate) const FORM_DATE_FORMAT: &str = "%d/%m/%Y";

/// Form state for adding or editing a person.
#[derive(Default, Clone)]
pub(crate) struct PersonForm {
    pub(crate) name: String,
    pub(crate) lastname: String,
    pub(crate) birthdate: String,
    pub(crate) active: PersonField,
    pub(crate) error: Option<String>,
}

/// Fields of the person form, in focus order.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub(crate) enum PersonField {
    #[default]
    Name,
    Lastname,
    Birthdate,
}

impl PersonForm {
    /// Populate the form from an existing person when editing.
    pub(crate) fn from_person(person: &Person) -> Self {
        Self {
            name: person.name.clone(),
            lastname: person.lastname.clone(),
            birthdate: person.birthdate.format(FORM_DATE_FORMAT).to_string(),
            active: PersonField::Name,
            error: None,
        }
    }

    pub(crate) fn next_field(&mut self) {
        self.active = match self.active {
            PersonField::Name => PersonField::Lastname,
            PersonField::Lastname => PersonField::Birthdate,
            PersonField::Birthdate => PersonField::Name,
        };
    }

    pub(crate) fn previous_field(&mut self) {
        self.active = match self.active {
            PersonField::Name => PersonField::Birthdate,
            PersonField::Lastname => PersonField::Name,
            PersonField::Birthdate => PersonField::Lastname,
        };
    }

    /// Insert a character into the active field. The birthdate only takes
    /// digits and `/`.
    pub(crate) fn push_char(&mut self, ch: char) -> bool {
        if ch.is_control() {
            return false;
        }
        match self.active {
            PersonField::Name => self.name.push(ch),
            PersonField::Lastname => self.lastname.push(ch),
            PersonField::Birthdate => {
                if !(ch.is_ascii_digit() || ch == '/') {
                    return false;
                }
                self.birthdate.push(ch);
            }
        }
        true
    }

    pub(crate) fn backspace(&mut self) {
        match self.active {
            PersonField::Name => {
                self.name.pop();
            }
            PersonField::Lastname => {
                self.lastname.pop();
            }
            PersonField::Birthdate => {
                self.birthdate.pop();
            }
        }
    }

    /// Validate the inputs and build the person to persist, keeping `id` so
    /// edits target the original row.
    pub(crate) fn parse_inputs(&self, id: Option<i64>) -> Result<Person> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(anyhow!("Name is required."));
        }

        let raw_date = self.birthdate.trim();
        if raw_date.is_empty() {
            return Err(anyhow!("Birthdate is required."));
        }
        let birthdate = NaiveDate::parse_from_str(raw_date, FORM_DATE_FORMAT)
            .map_err(|err| anyhow!("Birthdate must be DD/MM/YYYY ({err})."))?;

        Ok(Person {
            id,
            name: name.to_string(),
            lastname: self.lastname.trim().to_string(),
            birthdate,
        })
    }

    /// Render a single line for the form widget.
    pub(crate) fn build_line(&self, field_name: &str, field: PersonField) -> Line<'static> {
        let value = self.value(field);
        let is_active = self.active == field;

        let placeholder = match field {
            PersonField::Name => "<required>",
            PersonField::Lastname => "<optional>",
            PersonField::Birthdate => "DD/MM/YYYY",
        };

        let display = if value.is_empty() {
            placeholder.to_string()
        } else {
            value.to_string()
        };

        let style = if is_active {
            Style::default().fg(Color::Yellow)
        } else if value.is_empty() {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default()
        };

        Line::from(vec![
            Span::raw(format!("{field_name}: ")),
            Span::styled(display, style),
        ])
    }

    pub(crate) fn value_len(&self, field: PersonField) -> usize {
        self.value(field).chars().count()
    }

    fn value(&self, field: PersonField) -> &str {
        match field {
            PersonField::Name => &self.name,
            PersonField::Lastname => &self.lastname,
            PersonField::Birthdate => &self.birthdate,
        }
    }
}

/// State for confirming permanent deletion of a person.
#[derive(Clone)]
pub(crate) struct ConfirmPersonDelete {
    pub(crate) person: Person,
}

/// Options offered when no database is open yet.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) enum StartupChoice {
    Create,
    Open,
    Quit,
}

/// Chooser shown at startup, with "Create" selected first.
#[derive(Clone)]
pub(crate) struct StartupPrompt {
    pub(crate) selection: StartupChoice,
}

impl Default for StartupPrompt {
    fn default() -> Self {
        Self {
            selection: StartupChoice::Create,
        }
    }
}

impl StartupPrompt {
    /// Move the selection forward (Create → Open → Quit).
    pub(crate) fn next(&mut self) {
        self.selection = match self.selection {
            StartupChoice::Create => StartupChoice::Open,
            StartupChoice::Open => StartupChoice::Quit,
            StartupChoice::Quit => StartupChoice::Create,
        };
    }

    pub(crate) fn previous(&mut self) {
        self.selection = match self.selection {
            StartupChoice::Create => StartupChoice::Quit,
            StartupChoice::Open => StartupChoice::Create,
            StartupChoice::Quit => StartupChoice::Open,
        };
    }

    pub(crate) fn labels(&self) -> [&'static str; 3] {
        ["Create new database", "Open existing database", "Quit"]
    }

    pub(crate) fn selected_index(&self) -> usize {
        match self.selection {
            StartupChoice::Create => 0,
            StartupChoice::Open => 1,
            StartupChoice::Quit => 2,
        }
    }
}

/// Whether a path prompt starts a fresh file or reopens an existing one.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) enum PathIntent {
    Create,
    Open,
}

/// Free-text replacement for a file chooser.
#[derive(Clone)]
pub(crate) struct PathPrompt {
    pub(crate) intent: PathIntent,
    pub(crate) input: String,
    pub(crate) error: Option<String>,
}

impl PathPrompt {
    pub(crate) fn new(intent: PathIntent) -> Self {
        Self {
            intent,
            input: String::new(),
            error: None,
        }
    }

    pub(crate) fn title(&self) -> &'static str {
        match self.intent {
            PathIntent::Create => "Choose where to save the database",
            PathIntent::Open => "Choose the database file",
        }
    }

    /// Expand a leading `~` and reject blank input.
    pub(crate) fn parse_path(&self, home: Option<&std::path::Path>) -> Result<PathBuf> {
        let raw = self.input.trim();
        if raw.is_empty() {
            return Err(anyhow!("A file path is required."));
        }
        if let (Some(rest), Some(home)) = (raw.strip_prefix('~'), home) {
            if rest.is_empty() {
                return Ok(home.to_path_buf());
            }
            if let Some(rest) = rest.strip_prefix('/') {
                return Ok(home.join(rest));
            }
        }
        Ok(PathBuf::from(raw))
    }
}

/// Asked before "new database" replaces an existing file.
#[derive(Clone)]
pub(crate) struct ConfirmOverwrite {
    pub(crate) path: PathBuf,
    pub(crate) prompt: PathPrompt,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn filled(name: &str, lastname: &str, birthdate: &str) -> PersonForm {
        PersonForm {
            name: name.into(),
            lastname: lastname.into(),
            birthdate: birthdate.into(),
            ..PersonForm::default()
        }
    }

    #[test]
    fn test_parse_inputs_builds_person() {
        let person = filled(" Ana ", "Lopez", "02/04/1990").parse_inputs(Some(4)).unwrap();
        assert_eq!(person.id, Some(4));
        assert_eq!(person.name, "Ana");
        assert_eq!(person.birthdate, NaiveDate::from_ymd_opt(1990, 4, 2).unwrap());
    }

    #[test]
    fn test_parse_inputs_requires_name() {
        let err = filled("  ", "Lopez", "02/04/1990").parse_inputs(None).unwrap_err();
        assert_eq!(err.to_string(), "Name is required.");
    }

    #[test]
    fn test_parse_inputs_rejects_bad_dates() {
        for bad in ["1990-04-02", "31/02/1990", "2/4"] {
            let err = filled("Ana", "", bad).parse_inputs(None).unwrap_err();
            assert!(err.to_string().starts_with("Birthdate must be DD/MM/YYYY"), "{bad}");
        }
    }

    #[test]
    fn test_from_person_formats_date_for_editing() {
        let date = NaiveDate::from_ymd_opt(1985, 12, 1).unwrap();
        let form = PersonForm::from_person(&Person::new("Juan", "Perez", date));
        assert_eq!(form.birthdate, "01/12/1985");
        assert_eq!(form.parse_inputs(None).unwrap().birthdate, date);
    }

    #[test]
    fn test_birthdate_field_filters_characters() {
        let mut form = PersonForm::default();
        form.previous_field();
        assert_eq!(form.active, PersonField::Birthdate);
        assert!(form.push_char('1'));
        assert!(form.push_char('/'));
        assert!(!form.push_char('x'));
        form.backspace();
        assert_eq!(form.birthdate, "1");
    }

    #[test]
    fn test_field_cycle() {
        let mut form = PersonForm::default();
        form.next_field();
        form.next_field();
        assert_eq!(form.active, PersonField::Birthdate);
        form.next_field();
        assert_eq!(form.active, PersonField::Name);
    }

    #[test]
    fn test_startup_prompt_wraps() {
        let mut prompt = StartupPrompt::default();
        prompt.previous();
        assert_eq!(prompt.selection, StartupChoice::Quit);
        prompt.next();
        assert_eq!(prompt.selected_index(), 0);
    }

    #[test]
    fn test_path_prompt_expands_home() {
        let home = Path::new("/home/ana");
        let mut prompt = PathPrompt::new(PathIntent::Open);
        prompt.input = "~/people.db".into();
        assert_eq!(prompt.parse_path(Some(home)).unwrap(), home.join("people.db"));

        prompt.input = "/tmp/x.db".into();
        assert_eq!(prompt.parse_path(Some(home)).unwrap(), PathBuf::from("/tmp/x.db"));

        prompt.input = "   ".into();
        assert!(prompt.parse_path(Some(home)).is_err());
    }
}
