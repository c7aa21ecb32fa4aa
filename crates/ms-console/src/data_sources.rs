//! Data source administration screen

use std::collections::{HashMap, HashSet};

use crossterm::event::{KeyCode, KeyEvent};
use ms_artifacts::{Artifact, ResultTable};
use ms_rest_api_contract::validation::validate_data_source_draft;
use ms_rest_api_contract::{ConnectionStatus, DataSource, DataSourceDraft, SOURCE_TYPES};
use tracing::debug;

use crate::browser::{BrowserKey, TableBrowser};
use crate::input::Input;
use crate::msg::{Command, Nav};

const CUSTOM_TYPE: &str = "other";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FormField {
    #[default]
    Name,
    Type,
    ConnectionString,
    Active,
}

impl FormField {
    const ORDER: [FormField; 4] = [
        FormField::Name,
        FormField::Type,
        FormField::ConnectionString,
        FormField::Active,
    ];

    fn step(self, forward: bool) -> Self {
        let pos = Self::ORDER.iter().position(|f| *f == self).unwrap_or(0);
        let len = Self::ORDER.len();
        let next = if forward { (pos + 1) % len } else { (pos + len - 1) % len };
        Self::ORDER[next]
    }
}

/// Create/edit form for one data source
#[derive(Debug, Clone, Default)]
pub struct DraftForm {
    /// Id of the source being edited; `None` creates a new one
    pub editing: Option<i64>,
    pub name: Input,
    pub type_index: usize,
    pub custom_type: Input,
    pub connection_string: Input,
    pub is_active: bool,
    pub focus: FormField,
    pub saving: bool,
    pub error: Option<String>,
}

impl DraftForm {
    pub fn create() -> Self {
        Self {
            is_active: true,
            ..Self::default()
        }
    }

    pub fn edit(source: &DataSource) -> Self {
        let draft = DataSourceDraft::from_source(source);
        let known = SOURCE_TYPES
            .iter()
            .position(|(value, _)| *value != CUSTOM_TYPE && *value == source.normalized_type());
        let mut form = Self {
            editing: Some(source.id),
            is_active: draft.is_active,
            ..Self::default()
        };
        form.name.set(draft.name);
        form.connection_string.set(draft.connection_string);
        match known {
            Some(index) => form.type_index = index,
            None => {
                form.type_index = custom_index();
                form.custom_type.set(draft.source_type);
            }
        }
        form
    }

    pub fn is_custom(&self) -> bool {
        SOURCE_TYPES.get(self.type_index).map(|(v, _)| *v) == Some(CUSTOM_TYPE)
    }

    pub fn type_label(&self) -> String {
        if self.is_custom() {
            format!("Other: {}", self.custom_type.value())
        } else {
            SOURCE_TYPES
                .get(self.type_index)
                .map(|(_, label)| label.to_string())
                .unwrap_or_default()
        }
    }

    pub fn draft(&self) -> DataSourceDraft {
        let source_type = if self.is_custom() {
            self.custom_type.value().to_string()
        } else {
            SOURCE_TYPES
                .get(self.type_index)
                .map(|(value, _)| value.to_string())
                .unwrap_or_default()
        };
        DataSourceDraft {
            name: self.name.value().to_string(),
            source_type,
            connection_string: self.connection_string.value().to_string(),
            is_active: self.is_active,
        }
        .trimmed()
    }

    /// Returns the save command once the draft validates
    fn handle_key(&mut self, key: KeyEvent) -> Option<Command> {
        match key.code {
            KeyCode::Tab => self.focus = self.focus.step(true),
            KeyCode::BackTab => self.focus = self.focus.step(false),
            KeyCode::Enter if !self.saving => return self.save(),
            KeyCode::Left | KeyCode::Right if self.focus == FormField::Type => {
                let len = SOURCE_TYPES.len();
                self.type_index = match key.code {
                    KeyCode::Left => (self.type_index + len - 1) % len,
                    _ => (self.type_index + 1) % len,
                };
            }
            KeyCode::Char(' ') if self.focus == FormField::Active => {
                self.is_active = !self.is_active;
            }
            _ => {
                let input = match self.focus {
                    FormField::Name => &mut self.name,
                    FormField::Type if self.is_custom() => &mut self.custom_type,
                    FormField::ConnectionString => &mut self.connection_string,
                    FormField::Type | FormField::Active => return None,
                };
                input.handle_key(key);
            }
        }
        None
    }

    fn save(&mut self) -> Option<Command> {
        let draft = self.draft();
        if let Err(e) = validate_data_source_draft(&draft) {
            self.error = Some(e.first_message());
            return None;
        }
        self.error = None;
        self.saving = true;
        Some(match self.editing {
            Some(id) => Command::UpdateDataSource { id, draft },
            None => Command::CreateDataSource(draft),
        })
    }
}

fn custom_index() -> usize {
    SOURCE_TYPES
        .iter()
        .position(|(value, _)| *value == CUSTOM_TYPE)
        .unwrap_or(SOURCE_TYPES.len() - 1)
}

/// Quick scan result of one source
#[derive(Debug, Clone)]
pub struct ScanPreview {
    pub data_source_id: i64,
    pub browser: TableBrowser,
}

#[derive(Debug, Default)]
pub struct DataSourcesScreen {
    pub sources: Vec<DataSource>,
    pub loading: bool,
    pub cursor: usize,
    pub statuses: HashMap<i64, ConnectionStatus>,
    pub testing: HashSet<i64>,
    pub scanning: HashSet<i64>,
    pub deleting: HashSet<i64>,
    pub form: Option<DraftForm>,
    pub confirm_delete: Option<i64>,
    pub preview: Option<ScanPreview>,
    pub info: Option<String>,
    pub error: Option<String>,
}

impl DataSourcesScreen {
    pub fn open(&mut self, out: &mut Vec<Command>) {
        *self = Self::default();
        self.loading = true;
        out.push(Command::LoadDataSources);
    }

    pub fn selected(&self) -> Option<&DataSource> {
        self.sources.get(self.cursor)
    }

    /// Last known connectivity of a source
    pub fn status(&self, source: &DataSource) -> ConnectionStatus {
        self.statuses
            .get(&source.id)
            .copied()
            .or(source.connection_status)
            .unwrap_or_default()
    }

    /// Mark `id` as being tested; false when a test is already running
    pub fn begin_test(&mut self, id: i64) -> bool {
        self.testing.insert(id)
    }

    /// Mark `id` as being quick-scanned; false when a scan is already running
    pub fn begin_scan(&mut self, id: i64) -> bool {
        self.scanning.insert(id)
    }

    pub fn handle_key(&mut self, key: KeyEvent, out: &mut Vec<Command>) -> Nav {
        if let Some(preview) = &mut self.preview {
            return match preview.browser.handle_key(key, out) {
                BrowserKey::Handled => Nav::Stay,
                BrowserKey::Close => {
                    self.preview = None;
                    Nav::Stay
                }
                BrowserKey::Ask => Nav::Assistant {
                    scan_id: None,
                    tables: preview.browser.table_names(),
                },
            };
        }

        if let Some(form) = &mut self.form {
            if key.code == KeyCode::Esc && !form.saving {
                self.form = None;
            } else if let Some(command) = form.handle_key(key) {
                out.push(command);
            }
            return Nav::Stay;
        }

        if let Some(id) = self.confirm_delete.take() {
            if key.code == KeyCode::Char('y') && self.deleting.insert(id) {
                out.push(Command::DeleteDataSource { id });
            }
            return Nav::Stay;
        }

        let selected = self.selected().map(|s| (s.id, s.source_type.clone()));
        match (key.code, selected) {
            (KeyCode::Esc, _) => return Nav::Home,
            (KeyCode::Up, _) => self.cursor = self.cursor.saturating_sub(1),
            (KeyCode::Down, _) => {
                self.cursor = (self.cursor + 1).min(self.sources.len().saturating_sub(1));
            }
            (KeyCode::Char('r'), _) if !self.loading => {
                self.loading = true;
                out.push(Command::LoadDataSources);
            }
            (KeyCode::Char('n'), _) => self.form = Some(DraftForm::create()),
            (KeyCode::Char('e'), Some(_)) => self.form = self.selected().map(DraftForm::edit),
            (KeyCode::Char('d'), Some((id, _))) => self.confirm_delete = Some(id),
            (KeyCode::Char('t'), Some((id, _))) => {
                if self.begin_test(id) {
                    out.push(Command::TestConnection { id });
                } else {
                    debug!(id, "connection test already running");
                }
            }
            (KeyCode::Char('s'), Some((id, source_type))) => {
                if self.begin_scan(id) {
                    out.push(Command::QuickScan { id, source_type });
                }
            }
            _ => {}
        }
        Nav::Stay
    }

    pub fn sources_loaded(&mut self, result: Result<Vec<DataSource>, String>) {
        self.loading = false;
        match result {
            Ok(sources) => {
                self.sources = sources;
                self.cursor = self.cursor.min(self.sources.len().saturating_sub(1));
            }
            Err(message) => self.error = Some(message),
        }
    }

    pub fn saved(&mut self, result: Result<DataSource, String>) {
        match result {
            Ok(source) => {
                self.info = Some(format!("Saved data source {}", source.name));
                match self.sources.iter_mut().find(|s| s.id == source.id) {
                    Some(existing) => *existing = source,
                    None => {
                        self.sources.push(source);
                        self.cursor = self.sources.len() - 1;
                    }
                }
                self.form = None;
            }
            Err(message) => match &mut self.form {
                Some(form) => {
                    form.saving = false;
                    form.error = Some(message);
                }
                None => self.error = Some(message),
            },
        }
    }

    pub fn deleted(&mut self, id: i64, result: Result<(), String>) {
        self.deleting.remove(&id);
        match result {
            Ok(()) => {
                if let Some(source) = self.sources.iter().find(|s| s.id == id) {
                    self.info = Some(format!("Deleted data source {}", source.name));
                }
                self.sources.retain(|s| s.id != id);
                self.statuses.remove(&id);
                self.cursor = self.cursor.min(self.sources.len().saturating_sub(1));
            }
            Err(message) => self.error = Some(message),
        }
    }

    pub fn tested(&mut self, id: i64, result: Result<ConnectionStatus, String>) {
        self.testing.remove(&id);
        match result {
            Ok(status) => {
                self.statuses.insert(id, status);
            }
            Err(message) => {
                self.statuses.insert(id, ConnectionStatus::Error);
                self.error = Some(message);
            }
        }
    }

    pub fn scanned(&mut self, id: i64, result: Result<Vec<Artifact>, String>) {
        self.scanning.remove(&id);
        match result {
            Ok(artifacts) => {
                let label = self
                    .sources
                    .iter()
                    .find(|s| s.id == id)
                    .map(|s| s.name.clone())
                    .unwrap_or_else(|| format!("source {id}"));
                self.preview = Some(ScanPreview {
                    data_source_id: id,
                    browser: TableBrowser::new(ResultTable::new(label, artifacts)),
                });
            }
            Err(message) => self.error = Some(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;
    use serde_json::json;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn source(id: i64, name: &str, source_type: &str) -> DataSource {
        serde_json::from_value(json!({
            "id": id, "name": name, "type": source_type, "connection_string": "conn"
        }))
        .unwrap()
    }

    fn loaded() -> DataSourcesScreen {
        let mut screen = DataSourcesScreen::default();
        screen.sources_loaded(Ok(vec![source(1, "warehouse", "postgres"), source(2, "lake", "duckdb")]));
        screen
    }

    #[test]
    fn test_second_test_of_same_source_is_refused() {
        let mut screen = loaded();
        let mut out = Vec::new();
        screen.handle_key(key(KeyCode::Char('t')), &mut out);
        screen.handle_key(key(KeyCode::Char('t')), &mut out);
        assert_eq!(out.len(), 1);

        // Another source can be tested meanwhile
        screen.handle_key(key(KeyCode::Down), &mut out);
        screen.handle_key(key(KeyCode::Char('t')), &mut out);
        assert!(matches!(out[..], [Command::TestConnection { id: 1 }, Command::TestConnection { id: 2 }]));

        screen.tested(1, Ok(ConnectionStatus::Ok));
        screen.tested(2, Err("timeout".into()));
        assert_eq!(screen.status(&screen.sources[0]), ConnectionStatus::Ok);
        assert_eq!(screen.status(&screen.sources[1]), ConnectionStatus::Error);
        assert!(screen.testing.is_empty());
    }

    #[test]
    fn test_status_defaults_to_unknown() {
        let screen = loaded();
        assert_eq!(screen.status(&screen.sources[0]), ConnectionStatus::Unknown);
    }

    #[test]
    fn test_create_form_validates_before_sending() {
        let mut screen = loaded();
        let mut out = Vec::new();
        screen.handle_key(key(KeyCode::Char('n')), &mut out);
        screen.handle_key(key(KeyCode::Enter), &mut out);
        assert!(out.is_empty());
        assert!(screen.form.as_ref().unwrap().error.is_some());

        for c in " sales ".chars() {
            screen.handle_key(key(KeyCode::Char(c)), &mut out);
        }
        screen.handle_key(key(KeyCode::Tab), &mut out);
        screen.handle_key(key(KeyCode::Right), &mut out);
        screen.handle_key(key(KeyCode::Tab), &mut out);
        for c in "mysql://db".chars() {
            screen.handle_key(key(KeyCode::Char(c)), &mut out);
        }
        screen.handle_key(key(KeyCode::Enter), &mut out);
        match &out[..] {
            [Command::CreateDataSource(draft)] => {
                assert_eq!(draft.name, "sales");
                assert_eq!(draft.source_type, "mysql");
                assert_eq!(draft.connection_string, "mysql://db");
                assert!(draft.is_active);
            }
            other => panic!("unexpected commands {:?}", other),
        }

        screen.saved(Ok(source(3, "sales", "mysql")));
        assert!(screen.form.is_none());
        assert_eq!(screen.selected().map(|s| s.id), Some(3));
    }

    #[test]
    fn test_edit_keeps_custom_type() {
        let screen = loaded();
        let form = DraftForm::edit(&screen.sources[1]);
        assert!(form.is_custom());
        assert_eq!(form.draft().source_type, "duckdb");
        assert_eq!(form.editing, Some(2));

        let form = DraftForm::edit(&screen.sources[0]);
        assert_eq!(form.draft().source_type, "postgres");
    }

    #[test]
    fn test_delete_requires_confirmation() {
        let mut screen = loaded();
        let mut out = Vec::new();
        screen.handle_key(key(KeyCode::Char('d')), &mut out);
        screen.handle_key(key(KeyCode::Char('x')), &mut out);
        assert!(out.is_empty());

        screen.handle_key(key(KeyCode::Char('d')), &mut out);
        screen.handle_key(key(KeyCode::Char('y')), &mut out);
        assert!(matches!(out[..], [Command::DeleteDataSource { id: 1 }]));
        screen.deleted(1, Ok(()));
        assert_eq!(screen.sources.len(), 1);
    }

    #[test]
    fn test_quick_scan_opens_preview() {
        let mut screen = loaded();
        let mut out = Vec::new();
        screen.handle_key(key(KeyCode::Char('s')), &mut out);
        screen.handle_key(key(KeyCode::Char('s')), &mut out);
        assert_eq!(out.len(), 1);

        screen.scanned(1, Ok(vec![Artifact::container("orders", "table")]));
        let preview = screen.preview.as_ref().unwrap();
        assert_eq!(preview.browser.table.title(), "Scan Result: warehouse");
        assert_eq!(screen.handle_key(key(KeyCode::Esc), &mut out), Nav::Stay);
        assert!(screen.preview.is_none());
    }
}
