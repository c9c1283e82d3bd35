use std::cell::Cell;
use std::fs;
use std::mem;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{anyhow, Context, Result};
use crossterm::event::KeyCode;
use directories::BaseDirs;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::prelude::*;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;
use tracing::debug;

use crate::config::Config;
use crate::db::Store;
use crate::models::Person;
use crate::projection::PersonList;

use super::forms::{
    ConfirmOverwrite, ConfirmPersonDelete, PathIntent, PathPrompt, PersonField, PersonForm,
    StartupChoice, StartupPrompt,
};
use super::helpers::{centered_rect, display_path, surface_error};

/// Footer space reserved for status messages and instructions.
const FOOTER_HEIGHT: u16 = 3;
/// Rows skipped by PageUp/PageDown.
const PAGE_STEP: isize = 10;

/// Top-level views. The welcome chooser is shown until a database is open.
enum Screen {
    Welcome(StartupPrompt),
    People,
}

/// Modal states layered over the current screen.
enum Mode {
    Normal,
    AddingPerson(PersonForm),
    EditingPerson { person: Person, form: PersonForm },
    ConfirmDelete(ConfirmPersonDelete),
    Searching(SearchState),
    ChoosingPath(PathPrompt),
    ConfirmOverwrite(ConfirmOverwrite),
}

/// State for an active inline search.
#[derive(Default)]
struct SearchState {
    query: String,
}

/// Holds the footer message text plus its severity.
struct StatusMessage {
    text: String,
    kind: StatusKind,
}

/// Severity levels shown in the footer.
enum StatusKind {
    Info,
    Error,
}

impl StatusKind {
    fn style(&self) -> Style {
        match self {
            StatusKind::Info => Style::default().fg(Color::Green),
            StatusKind::Error => Style::default().fg(Color::Red),
        }
    }
}

/// Central application state shared across the TUI.
pub struct App {
    store: Store,
    config: Config,
    people: PersonList,
    selected: usize,
    screen: Screen,
    mode: Mode,
    status: Option<StatusMessage>,
    saved_search: Option<SearchState>,
    /// Set by the store observer; the list is rebuilt after the current key.
    stale: Rc<Cell<bool>>,
    focus_id: Option<i64>,
    home: Option<PathBuf>,
}

impl App {
    pub fn new(store: Store, config: Config) -> Self {
        let stale = Rc::new(Cell::new(false));
        let flag = Rc::clone(&stale);
        store.subscribe(move |_| flag.set(true));

        Self {
            store,
            config,
            people: PersonList::new(),
            selected: 0,
            screen: Screen::Welcome(StartupPrompt::default()),
            mode: Mode::Normal,
            status: None,
            saved_search: None,
            stale,
            focus_id: None,
            home: BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf()),
        }
    }

    /// Reopen the remembered database, or fall back to the welcome chooser.
    pub fn start(&mut self) {
        if self.store.is_opened() {
            self.screen = Screen::People;
            self.stale.set(false);
            self.reload_people();
            return;
        }

        match self.config.latest_database_filename() {
            Some(path) if path.exists() => {
                debug!(path = %path.display(), "reopening latest database");
                if let Err(err) = self.open_database(&path, PathIntent::Open, false) {
                    self.show_welcome();
                    self.set_status(
                        format!("Could not open the database: {}", surface_error(&err)),
                        StatusKind::Error,
                    );
                }
            }
            _ => self.show_welcome(),
        }
        self.sync_with_store();
    }

    pub fn handle_key(&mut self, code: KeyCode) -> Result<bool> {
        let mut exit = false;
        let mode = mem::replace(&mut self.mode, Mode::Normal);

        let mode = match mode {
            Mode::Normal => self.handle_normal_key(code, &mut exit),
            Mode::AddingPerson(form) => self.handle_add_person(code, form),
            Mode::EditingPerson { person, form } => self.handle_edit_person(code, person, form),
            Mode::ConfirmDelete(confirm) => self.handle_confirm_delete(code, confirm),
            Mode::Searching(state) => self.handle_search(code, state),
            Mode::ChoosingPath(prompt) => self.handle_path_prompt(code, prompt),
            Mode::ConfirmOverwrite(confirm) => self.handle_confirm_overwrite(code, confirm),
        };

        self.mode = mode;
        self.sync_with_store();
        Ok(exit)
    }

    /// Ctrl+D inside the edit form jumps to the delete confirmation.
    pub(crate) fn handle_ctrl_d(&mut self) {
        let mode = mem::replace(&mut self.mode, Mode::Normal);
        self.mode = match mode {
            Mode::EditingPerson { person, .. } => {
                Mode::ConfirmDelete(ConfirmPersonDelete { person })
            }
            other => other,
        };
    }

    fn handle_normal_key(&mut self, code: KeyCode, exit: &mut bool) -> Mode {
        if let Screen::Welcome(prompt) = &mut self.screen {
            match code {
                KeyCode::Char('q') | KeyCode::Esc => *exit = true,
                KeyCode::Left | KeyCode::Up | KeyCode::BackTab => prompt.previous(),
                KeyCode::Right | KeyCode::Down | KeyCode::Tab => prompt.next(),
                KeyCode::Enter => match prompt.selection {
                    StartupChoice::Create => {
                        return Mode::ChoosingPath(PathPrompt::new(PathIntent::Create))
                    }
                    StartupChoice::Open => {
                        return Mode::ChoosingPath(PathPrompt::new(PathIntent::Open))
                    }
                    StartupChoice::Quit => *exit = true,
                },
                _ => {}
            }
            return Mode::Normal;
        }

        match code {
            KeyCode::Char('q') | KeyCode::Esc => *exit = true,
            KeyCode::Up => self.move_selection(-1),
            KeyCode::Down => self.move_selection(1),
            KeyCode::PageUp => self.move_selection(-PAGE_STEP),
            KeyCode::PageDown => self.move_selection(PAGE_STEP),
            KeyCode::Home => self.selected = 0,
            KeyCode::End => self.selected = self.people.len().saturating_sub(1),
            KeyCode::Char('a') | KeyCode::Char('+') => {
                self.clear_status();
                return Mode::AddingPerson(PersonForm::default());
            }
            KeyCode::Enter | KeyCode::Char('e') => {
                if let Some(person) = self.current_person().cloned() {
                    self.clear_status();
                    return Mode::EditingPerson {
                        form: PersonForm::from_person(&person),
                        person,
                    };
                }
                self.set_status("No person selected.", StatusKind::Error);
            }
            KeyCode::Char('d') | KeyCode::Char('-') | KeyCode::Delete => {
                if let Some(person) = self.current_person().cloned() {
                    return Mode::ConfirmDelete(ConfirmPersonDelete { person });
                }
                self.set_status("No person selected.", StatusKind::Error);
            }
            KeyCode::Char('/') | KeyCode::Char('f') => {
                self.clear_status();
                return Mode::Searching(SearchState::default());
            }
            KeyCode::Char('n') => return Mode::ChoosingPath(PathPrompt::new(PathIntent::Create)),
            KeyCode::Char('o') => return Mode::ChoosingPath(PathPrompt::new(PathIntent::Open)),
            _ => {}
        }
        Mode::Normal
    }

    fn handle_add_person(&mut self, code: KeyCode, mut form: PersonForm) -> Mode {
        let mut keep_open = true;
        match code {
            KeyCode::Esc => {
                self.set_status("Add cancelled.", StatusKind::Info);
                keep_open = false;
            }
            KeyCode::Tab | KeyCode::Down => form.next_field(),
            KeyCode::BackTab | KeyCode::Up => form.previous_field(),
            KeyCode::Backspace => form.backspace(),
            KeyCode::Enter => match self.save_new_person(&form) {
                Ok(()) => keep_open = false,
                Err(err) => {
                    let message = surface_error(&err);
                    form.error = Some(message.clone());
                    self.set_status(message, StatusKind::Error);
                }
            },
            KeyCode::Char(ch) => {
                if form.push_char(ch) {
                    form.error = None;
                }
            }
            _ => {}
        }

        if keep_open {
            Mode::AddingPerson(form)
        } else {
            Mode::Normal
        }
    }

    fn handle_edit_person(&mut self, code: KeyCode, person: Person, mut form: PersonForm) -> Mode {
        match code {
            KeyCode::Esc => {
                self.set_status("Edit cancelled.", StatusKind::Info);
                return self.resume_search();
            }
            KeyCode::Tab | KeyCode::Down => form.next_field(),
            KeyCode::BackTab | KeyCode::Up => form.previous_field(),
            KeyCode::Backspace => form.backspace(),
            KeyCode::Enter => match self.save_existing_person(&person, &form) {
                Ok(()) => return Mode::Normal,
                Err(err) => {
                    let message = surface_error(&err);
                    form.error = Some(message.clone());
                    self.set_status(message, StatusKind::Error);
                }
            },
            KeyCode::Char(ch) => {
                if form.push_char(ch) {
                    form.error = None;
                }
            }
            _ => {}
        }
        Mode::EditingPerson { person, form }
    }

    fn handle_confirm_delete(&mut self, code: KeyCode, confirm: ConfirmPersonDelete) -> Mode {
        match code {
            KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => {
                self.set_status("Deletion cancelled.", StatusKind::Info);
                self.resume_search()
            }
            KeyCode::Enter | KeyCode::Char('y') | KeyCode::Char('Y') => {
                match self.perform_delete(&confirm) {
                    Ok(()) => Mode::Normal,
                    Err(err) => {
                        self.set_status(surface_error(&err), StatusKind::Error);
                        Mode::ConfirmDelete(confirm)
                    }
                }
            }
            _ => Mode::ConfirmDelete(confirm),
        }
    }

    fn handle_search(&mut self, code: KeyCode, mut state: SearchState) -> Mode {
        match code {
            KeyCode::Esc => {
                self.reload_people();
                return Mode::Normal;
            }
            KeyCode::Up => {
                self.move_selection(-1);
                return Mode::Searching(state);
            }
            KeyCode::Down => {
                self.move_selection(1);
                return Mode::Searching(state);
            }
            KeyCode::Enter => {
                if let Some(person) = self.current_person().cloned() {
                    self.saved_search = Some(state);
                    return Mode::EditingPerson {
                        form: PersonForm::from_person(&person),
                        person,
                    };
                }
                self.set_status("No matching person to edit.", StatusKind::Error);
                return Mode::Searching(state);
            }
            KeyCode::Backspace => {
                state.query.pop();
            }
            KeyCode::Char(ch) if !ch.is_control() => state.query.push(ch),
            _ => return Mode::Searching(state),
        }

        self.selected = 0;
        let result = self.people.refresh(&self.store, Some(state.query.as_str()));
        self.after_refresh(result.context("failed to search people"));
        Mode::Searching(state)
    }

    fn handle_path_prompt(&mut self, code: KeyCode, mut prompt: PathPrompt) -> Mode {
        match code {
            KeyCode::Esc => return Mode::Normal,
            KeyCode::Enter => return self.submit_path(prompt, false),
            KeyCode::Backspace => {
                prompt.input.pop();
                prompt.error = None;
            }
            KeyCode::Char(ch) if !ch.is_control() => {
                prompt.input.push(ch);
                prompt.error = None;
            }
            _ => {}
        }
        Mode::ChoosingPath(prompt)
    }

    fn handle_confirm_overwrite(&mut self, code: KeyCode, confirm: ConfirmOverwrite) -> Mode {
        match code {
            KeyCode::Enter | KeyCode::Char('y') | KeyCode::Char('Y') => {
                self.submit_path(confirm.prompt, true)
            }
            KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => {
                Mode::ChoosingPath(confirm.prompt)
            }
            _ => Mode::ConfirmOverwrite(confirm),
        }
    }

    fn submit_path(&mut self, mut prompt: PathPrompt, overwrite_confirmed: bool) -> Mode {
        let path = match prompt.parse_path(self.home.as_deref()) {
            Ok(path) => path,
            Err(err) => {
                prompt.error = Some(surface_error(&err));
                return Mode::ChoosingPath(prompt);
            }
        };

        if prompt.intent == PathIntent::Create && !overwrite_confirmed && path.exists() {
            return Mode::ConfirmOverwrite(ConfirmOverwrite { path, prompt });
        }

        match self.open_database(&path, prompt.intent, true) {
            Ok(()) => Mode::Normal,
            Err(err) => {
                let message = surface_error(&err);
                if !self.store.is_opened() {
                    self.show_welcome();
                }
                self.set_status(
                    format!("Could not open the database: {message}"),
                    StatusKind::Error,
                );
                prompt.error = Some(message);
                Mode::ChoosingPath(prompt)
            }
        }
    }

    fn open_database(&mut self, path: &Path, intent: PathIntent, remember: bool) -> Result<()> {
        match intent {
            PathIntent::Create => self
                .store
                .create(path)
                .with_context(|| format!("failed to create {}", path.display()))?,
            PathIntent::Open => {
                if !path.is_file() {
                    return Err(anyhow!("No database file at {}.", path.display()));
                }
                self.store
                    .open(path)
                    .with_context(|| format!("failed to open {}", path.display()))?
            }
        }

        if remember {
            let absolute = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
            self.config.save_latest_database_filename(&absolute);
        }

        self.screen = Screen::People;
        self.selected = 0;
        self.set_status(
            format!("Opened {}.", display_path(path, self.home.as_deref())),
            StatusKind::Info,
        );
        Ok(())
    }

    pub(crate) fn draw(&self, frame: &mut Frame) {
        let area = frame.area();
        let footer_height = FOOTER_HEIGHT.min(area.height);

        let (content_area, footer_area) = if area.height > footer_height {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(0), Constraint::Length(footer_height)])
                .split(area);
            (chunks[0], chunks[1])
        } else {
            (area, area)
        };

        match &self.screen {
            Screen::Welcome(prompt) => self.draw_welcome(frame, content_area, prompt),
            Screen::People => self.draw_people(frame, content_area),
        }

        if area.height >= footer_height {
            self.draw_footer(frame, footer_area);
        }

        match &self.mode {
            Mode::AddingPerson(form) => self.draw_person_form(frame, area, "Add Person", form),
            Mode::EditingPerson { form, .. } => {
                self.draw_person_form(frame, area, "Edit Person", form)
            }
            Mode::ConfirmDelete(confirm) => self.draw_confirm_delete(frame, area, confirm),
            Mode::Searching(state) => self.draw_search_bar(frame, area, state),
            Mode::ChoosingPath(prompt) => self.draw_path_prompt(frame, area, prompt),
            Mode::ConfirmOverwrite(confirm) => self.draw_confirm_overwrite(frame, area, confirm),
            Mode::Normal => {}
        }
    }

    fn draw_welcome(&self, frame: &mut Frame, area: Rect, prompt: &StartupPrompt) {
        let popup_area = centered_rect(70, 40, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default().title("People Registry").borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let mut option_spans = Vec::new();
        for (idx, label) in prompt.labels().iter().enumerate() {
            if idx > 0 {
                option_spans.push(Span::raw("   "));
            }
            let style = if prompt.selected_index() == idx {
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            option_spans.push(Span::styled(*label, style));
        }

        let lines = vec![
            Line::from(Span::styled(
                "Let's get started",
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from("Please choose one of the following options."),
            Line::from(""),
            Line::from(option_spans),
        ];

        let paragraph = Paragraph::new(lines)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn draw_people(&self, frame: &mut Frame, area: Rect) {
        let title = match self.store.path() {
            Some(path) => format!(
                "People Registry  •  {}",
                display_path(path, self.home.as_deref())
            ),
            None => "People Registry".to_string(),
        };
        let block = Block::default().borders(Borders::ALL).title(title);

        if self.people.is_empty() {
            let message = if matches!(self.mode, Mode::Searching(_)) {
                "Nobody matches the search."
            } else {
                "No people yet. Press 'a' to add one."
            };
            let paragraph = Paragraph::new(message)
                .alignment(Alignment::Center)
                .block(block);
            frame.render_widget(paragraph, area);
            return;
        }

        let name_width = self
            .people
            .rows()
            .iter()
            .map(|row| row.display_name.chars().count())
            .max()
            .unwrap_or(0);

        let items: Vec<ListItem> = self
            .people
            .rows()
            .iter()
            .map(|row| {
                ListItem::new(Line::from(vec![
                    Span::raw(format!("{:<name_width$}", row.display_name)),
                    Span::raw("   "),
                    Span::styled(row.birthdate.clone(), Style::default().fg(Color::Gray)),
                ]))
            })
            .collect();

        let list = List::new(items)
            .block(block)
            .highlight_style(
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("> ");

        let mut state = ListState::default();
        state.select(Some(self.selected));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_footer(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::TOP);
        frame.render_widget(block.clone(), area);
        let inner = block.inner(area);

        let status_line = if let Some(status) = &self.status {
            Line::from(vec![Span::styled(status.text.clone(), status.kind.style())])
        } else {
            Line::from("")
        };

        let instructions = self.footer_instructions();

        let paragraph = Paragraph::new(vec![status_line, instructions]).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn footer_instructions(&self) -> Line<'static> {
        let key_style = Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD);
        let keys: &[(&'static str, &'static str)] = match (&self.screen, &self.mode) {
            (_, Mode::AddingPerson(_)) => &[
                ("[Tab]", "Next Field"),
                ("[Enter]", "Save"),
                ("[Esc]", "Cancel"),
            ],
            (_, Mode::EditingPerson { .. }) => &[
                ("[Tab]", "Next Field"),
                ("[Enter]", "Save"),
                ("[Ctrl+D]", "Delete"),
                ("[Esc]", "Cancel"),
            ],
            (_, Mode::Searching(_)) => &[
                ("[↑↓]", "Select"),
                ("[Enter]", "Edit"),
                ("[Esc]", "Close Search"),
            ],
            (_, Mode::ConfirmDelete(_)) | (_, Mode::ConfirmOverwrite(_)) => {
                &[("[Y]", "Confirm"), ("[N/Esc]", "Cancel")]
            }
            (_, Mode::ChoosingPath(_)) => &[("[Enter]", "Confirm"), ("[Esc]", "Cancel")],
            (Screen::Welcome(_), Mode::Normal) => &[
                ("[←→]", "Choose"),
                ("[Enter]", "Confirm"),
                ("[q]", "Quit"),
            ],
            (Screen::People, Mode::Normal) => &[
                ("[↑↓]", "Select"),
                ("[a]", "Add"),
                ("[Enter]", "Edit"),
                ("[d]", "Delete"),
                ("[/]", "Search"),
                ("[n]", "New Database"),
                ("[o]", "Open Database"),
                ("[q]", "Quit"),
            ],
        };

        let mut spans = Vec::with_capacity(keys.len() * 2);
        for (idx, (key, label)) in keys.iter().enumerate() {
            spans.push(Span::styled(*key, key_style));
            if idx + 1 == keys.len() {
                spans.push(Span::raw(format!(" {label}")));
            } else {
                spans.push(Span::raw(format!(" {label}   ")));
            }
        }
        Line::from(spans)
    }

    fn draw_person_form(&self, frame: &mut Frame, area: Rect, title: &str, form: &PersonForm) {
        let popup_area = centered_rect(60, 40, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default().title(title).borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let fields = [
            ("Name", PersonField::Name),
            ("Lastname", PersonField::Lastname),
            ("Birthdate", PersonField::Birthdate),
        ];

        let mut lines: Vec<Line> = fields
            .iter()
            .map(|(label, field)| form.build_line(label, *field))
            .collect();
        lines.push(Line::from(""));

        if let Some(error) = &form.error {
            lines.push(Line::from(Span::styled(
                error.clone(),
                Style::default().fg(Color::Red),
            )));
        } else {
            lines.push(Line::from(Span::styled(
                "Enter to save • Tab to switch • Esc to cancel",
                Style::default().fg(Color::Gray),
            )));
        }

        let paragraph = Paragraph::new(lines).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);

        if let Some((row, (label, field))) = fields
            .iter()
            .enumerate()
            .find(|(_, (_, field))| *field == form.active)
        {
            let prefix = format!("{label}: ").len() as u16;
            frame.set_cursor_position((
                inner.x + prefix + form.value_len(*field) as u16,
                inner.y + row as u16,
            ));
        }
    }

    fn draw_confirm_delete(&self, frame: &mut Frame, area: Rect, confirm: &ConfirmPersonDelete) {
        let popup_area = centered_rect(60, 30, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default().title("Confirm Removal").borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let lines = vec![
            Line::from(format!("Remove {}?", confirm.person.display_name())),
            Line::from("This cannot be undone."),
            Line::from(""),
            Line::from(Span::styled(
                "Press Y to confirm or N / Esc to cancel.",
                Style::default().fg(Color::Gray),
            )),
        ];

        let paragraph = Paragraph::new(lines)
            .alignment(Alignment::Left)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn draw_confirm_overwrite(&self, frame: &mut Frame, area: Rect, confirm: &ConfirmOverwrite) {
        let popup_area = centered_rect(60, 30, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default().title("Replace File").borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let lines = vec![
            Line::from(format!(
                "{} already exists.",
                display_path(&confirm.path, self.home.as_deref())
            )),
            Line::from("Starting a new database there erases its contents."),
            Line::from(""),
            Line::from(Span::styled(
                "Press Y to replace it or N / Esc to pick another path.",
                Style::default().fg(Color::Gray),
            )),
        ];

        let paragraph = Paragraph::new(lines).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn draw_search_bar(&self, frame: &mut Frame, area: Rect, state: &SearchState) {
        let height = 3u16.min(area.height);
        let popup_area = Rect {
            x: area.x,
            y: area.y,
            width: area.width,
            height,
        };
        frame.render_widget(Clear, popup_area);

        let block = Block::default().borders(Borders::ALL).title("Search");
        let paragraph = Paragraph::new(Span::raw(format!("Search: {}", state.query)))
            .block(block.clone())
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, popup_area);

        let inner = block.inner(popup_area);
        let cursor_x = inner.x + "Search: ".len() as u16 + state.query.chars().count() as u16;
        frame.set_cursor_position((cursor_x, inner.y));
    }

    fn draw_path_prompt(&self, frame: &mut Frame, area: Rect, prompt: &PathPrompt) {
        let popup_area = centered_rect(70, 30, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default().title(prompt.title()).borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let mut lines = vec![
            Line::from(vec![
                Span::raw("Path: "),
                Span::styled(prompt.input.clone(), Style::default().fg(Color::Yellow)),
            ]),
            Line::from(""),
        ];
        if let Some(error) = &prompt.error {
            lines.push(Line::from(Span::styled(
                error.clone(),
                Style::default().fg(Color::Red),
            )));
        } else {
            lines.push(Line::from(Span::styled(
                "Enter to confirm • Esc to cancel",
                Style::default().fg(Color::Gray),
            )));
        }

        let paragraph = Paragraph::new(lines).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);

        let cursor_x = inner.x + "Path: ".len() as u16 + prompt.input.chars().count() as u16;
        frame.set_cursor_position((cursor_x, inner.y));
    }

    fn set_status<S: Into<String>>(&mut self, text: S, kind: StatusKind) {
        self.status = Some(StatusMessage {
            text: text.into(),
            kind,
        });
    }

    fn clear_status(&mut self) {
        self.status = None;
    }

    fn save_new_person(&mut self, form: &PersonForm) -> Result<()> {
        let person = form.parse_inputs(None)?;
        let saved = self.store.add(&person).context("failed to add person")?;
        self.focus_id = saved.id;
        self.set_status(format!("Added {}.", saved.display_name()), StatusKind::Info);
        Ok(())
    }

    fn save_existing_person(&mut self, original: &Person, form: &PersonForm) -> Result<()> {
        let person = form.parse_inputs(original.id)?;
        let found = self.store.update(&person).context("failed to update person")?;
        self.focus_id = person.id;
        if found {
            self.set_status(format!("Updated {}.", person.display_name()), StatusKind::Info);
        } else {
            self.set_status(
                format!("{} no longer exists.", original.display_name()),
                StatusKind::Error,
            );
        }
        Ok(())
    }

    fn perform_delete(&mut self, confirm: &ConfirmPersonDelete) -> Result<()> {
        let found = self
            .store
            .delete(&confirm.person)
            .context("failed to delete person")?;
        let name = confirm.person.display_name();
        if found {
            self.set_status(format!("Deleted {name}."), StatusKind::Info);
        } else {
            self.set_status(format!("{name} was already gone."), StatusKind::Error);
        }
        Ok(())
    }

    /// Rebuild the list if the store changed since the last key. A change
    /// always closes the search bar and shows everyone again.
    fn sync_with_store(&mut self) {
        if !self.stale.replace(false) {
            return;
        }
        if matches!(self.mode, Mode::Searching(_)) {
            self.mode = Mode::Normal;
        }
        self.saved_search = None;
        self.reload_people();
    }

    fn reload_people(&mut self) {
        let result = self.people.refresh(&self.store, None);
        self.after_refresh(result.context("failed to load people"));
    }

    fn after_refresh(&mut self, result: Result<()>) {
        if let Err(err) = result {
            self.set_status(surface_error(&err), StatusKind::Error);
        }

        if let Some(idx) = self.focus_id.take().and_then(|id| self.people.position_of(id)) {
            self.selected = idx;
        } else if self.selected >= self.people.len() {
            self.selected = self.people.len().saturating_sub(1);
        }
    }

    /// Return to the search that was active before a form opened, if any.
    fn resume_search(&mut self) -> Mode {
        match self.saved_search.take() {
            Some(state) => Mode::Searching(state),
            None => Mode::Normal,
        }
    }

    fn show_welcome(&mut self) {
        self.screen = Screen::Welcome(StartupPrompt::default());
        self.people = PersonList::new();
        self.selected = 0;
    }

    fn current_person(&self) -> Option<&Person> {
        self.people.get_record(self.selected)
    }

    fn move_selection(&mut self, offset: isize) {
        if self.people.is_empty() {
            return;
        }
        let last = self.people.len() as isize - 1;
        self.selected = (self.selected as isize + offset).clamp(0, last) as usize;
    }
}
