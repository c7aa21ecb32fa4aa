//! Scan wizard screen
//!
//! Owns the wizard machine plus everything the steps display: the loaded
//! source, database and artifact lists, cursors and the schedule form.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use crossterm::event::{KeyCode, KeyEvent};
use ms_artifacts::Artifact;
use ms_rest_api_contract::{DataSource, Database};
use tracing::warn;

use crate::input::Input;
use crate::msg::Command;
use crate::wizard::{
    visible_databases, ScheduleInput, Wizard, WizardAction, WizardEffect, WizardState,
};

pub const ARTIFACTS_PER_PAGE: usize = 15;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScheduleMode {
    #[default]
    Now,
    At,
    Cron,
}

impl ScheduleMode {
    pub const ALL: [ScheduleMode; 3] = [ScheduleMode::Now, ScheduleMode::At, ScheduleMode::Cron];

    pub fn next(self) -> Self {
        match self {
            ScheduleMode::Now => ScheduleMode::At,
            ScheduleMode::At => ScheduleMode::Cron,
            ScheduleMode::Cron => ScheduleMode::Now,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ScheduleMode::Now => "Run now",
            ScheduleMode::At => "Once at",
            ScheduleMode::Cron => "Recurring (CRON)",
        }
    }

    pub fn placeholder(self) -> &'static str {
        match self {
            ScheduleMode::Now => "",
            ScheduleMode::At => "YYYY-MM-DDTHH:MM (UTC)",
            ScheduleMode::Cron => "0 2 * * *",
        }
    }
}

#[derive(Debug, Default)]
pub struct ScanScreen {
    pub wizard: Wizard,
    pub sources: Vec<DataSource>,
    pub sources_loading: bool,
    /// Databases offered for the chosen source, already filtered
    pub databases: Vec<String>,
    pub databases_loading: bool,
    /// Artifact listings per database, fetched once per wizard run
    pub artifacts: HashMap<String, Vec<Artifact>>,
    pub artifacts_loading: HashSet<String>,
    pub cursor: usize,
    pub artifact_page: usize,
    pub schedule_mode: ScheduleMode,
    pub schedule_input: Input,
    pub error: Option<String>,
}

impl ScanScreen {
    /// Fresh wizard; keeps the source list so it is not refetched needlessly
    pub fn reset(&mut self) {
        let sources = std::mem::take(&mut self.sources);
        *self = Self {
            sources,
            ..Self::default()
        };
    }

    /// Start a wizard run
    pub fn open(&mut self, out: &mut Vec<Command>) {
        self.reset();
        self.sources_loading = true;
        out.push(Command::LoadDataSources);
    }

    pub fn state(&self) -> &WizardState {
        self.wizard.state()
    }

    /// Notice from the last rejected step, or the last failed request
    pub fn notice(&self) -> Option<&str> {
        self.wizard.notice().or(self.error.as_deref())
    }

    /// Artifacts of the database currently being configured
    pub fn current_artifacts(&self) -> &[Artifact] {
        self.state()
            .current_database()
            .and_then(|db| self.artifacts.get(db))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn artifact_page_count(&self) -> usize {
        self.current_artifacts().len().div_ceil(ARTIFACTS_PER_PAGE).max(1)
    }

    /// Artifacts on the visible page
    pub fn artifact_page_rows(&self) -> &[Artifact] {
        let all = self.current_artifacts();
        let start = (self.artifact_page * ARTIFACTS_PER_PAGE).min(all.len());
        let end = (start + ARTIFACTS_PER_PAGE).min(all.len());
        &all[start..end]
    }

    /// Distinct artifact names of the current database, in listing order
    fn current_names(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.current_artifacts()
            .iter()
            .filter(|a| seen.insert(a.name.as_str()))
            .map(|a| a.name.clone())
            .collect()
    }

    fn list_len(&self) -> usize {
        match self.state() {
            WizardState::SelectSource => self.sources.len(),
            WizardState::SelectDatabases(_) => self.databases.len(),
            WizardState::SelectArtifacts { .. } => self.artifact_page_rows().len(),
            _ => 0,
        }
    }

    fn move_cursor(&mut self, down: bool) {
        let len = self.list_len();
        if len == 0 {
            self.cursor = 0;
        } else if down {
            self.cursor = (self.cursor + 1).min(len - 1);
        } else {
            self.cursor = self.cursor.saturating_sub(1);
        }
    }

    fn dispatch(&mut self, action: WizardAction, out: &mut Vec<Command>) -> bool {
        let before = self.state().step_index();
        let database_before = self.state().current_database().map(str::to_string);
        let effect = self.wizard.dispatch(action);

        if self.state().step_index() != before
            || self.state().current_database().map(str::to_string) != database_before
        {
            self.cursor = 0;
            self.artifact_page = 0;
            self.load_current_artifacts(out);
        }

        match effect {
            Some(WizardEffect::Submit(config)) => {
                self.error = None;
                out.push(Command::SubmitScan(config));
                false
            }
            Some(WizardEffect::Exit) => {
                self.reset();
                true
            }
            None => false,
        }
    }

    fn load_current_artifacts(&mut self, out: &mut Vec<Command>) {
        let (Some(db), Some(selection)) = (self.state().current_database(), self.state().selection())
        else {
            return;
        };
        if self.artifacts.contains_key(db) || self.artifacts_loading.contains(db) {
            return;
        }
        let db = db.to_string();
        let data_source_id = selection.source.id;
        let source_type = selection.source.source_type.clone();
        self.artifacts_loading.insert(db.clone());
        out.push(Command::LoadArtifacts {
            data_source_id,
            source_type,
            db,
        });
    }

    /// Handle a key; returns true when the wizard was left
    pub fn handle_key(&mut self, key: KeyEvent, now: DateTime<Utc>, out: &mut Vec<Command>) -> bool {
        if key.code == KeyCode::Esc {
            return self.dispatch(WizardAction::Cancel, out);
        }
        if matches!(key.code, KeyCode::Up | KeyCode::Down) {
            self.move_cursor(key.code == KeyCode::Down);
            return false;
        }

        match self.state() {
            WizardState::SelectSource => self.source_key(key, out),
            WizardState::SelectDatabases(_) => self.databases_key(key, out),
            WizardState::SelectArtifacts { .. } => self.artifacts_key(key, out),
            WizardState::Schedule(_) => self.schedule_key(key, now, out),
            WizardState::Confirm { .. } => match key.code {
                KeyCode::Enter => self.dispatch(WizardAction::Submit, out),
                KeyCode::Left | KeyCode::Backspace => self.dispatch(WizardAction::Back, out),
                _ => false,
            },
            WizardState::Submitted { .. } => match key.code {
                KeyCode::Enter => self.dispatch(WizardAction::Finish, out),
                _ => false,
            },
        }
    }

    fn source_key(&mut self, key: KeyEvent, out: &mut Vec<Command>) -> bool {
        if key.code != KeyCode::Enter {
            return false;
        }
        let Some(source) = self.sources.get(self.cursor).cloned() else {
            return false;
        };
        self.databases.clear();
        self.artifacts.clear();
        self.artifacts_loading.clear();
        self.error = None;
        self.databases_loading = true;
        out.push(Command::LoadDatabases {
            data_source_id: source.id,
        });
        self.dispatch(WizardAction::ChooseSource(source), out)
    }

    fn databases_key(&mut self, key: KeyEvent, out: &mut Vec<Command>) -> bool {
        let action = match key.code {
            KeyCode::Char(' ') => match self.databases.get(self.cursor) {
                Some(db) => WizardAction::ToggleDatabase(db.clone()),
                None => return false,
            },
            KeyCode::Char('a') => WizardAction::SetDatabases(self.databases.clone()),
            KeyCode::Char('c') => WizardAction::SetDatabases(Vec::new()),
            KeyCode::Enter | KeyCode::Right => WizardAction::Next,
            KeyCode::Left | KeyCode::Backspace => WizardAction::Back,
            _ => return false,
        };
        let keep_cursor = matches!(action, WizardAction::ToggleDatabase(_) | WizardAction::SetDatabases(_));
        let cursor = self.cursor;
        let left = self.dispatch(action, out);
        if keep_cursor {
            self.cursor = cursor;
        }
        left
    }

    fn artifacts_key(&mut self, key: KeyEvent, out: &mut Vec<Command>) -> bool {
        let action = match key.code {
            KeyCode::PageDown => {
                if self.artifact_page + 1 < self.artifact_page_count() {
                    self.artifact_page += 1;
                    self.cursor = 0;
                }
                return false;
            }
            KeyCode::PageUp => {
                if self.artifact_page > 0 {
                    self.artifact_page -= 1;
                    self.cursor = 0;
                }
                return false;
            }
            KeyCode::Char(' ') => match self.artifact_page_rows().get(self.cursor) {
                Some(artifact) => WizardAction::ToggleArtifact(artifact.name.clone()),
                None => return false,
            },
            KeyCode::Char('a') => WizardAction::SetArtifacts(self.current_names()),
            KeyCode::Char('c') => WizardAction::SetArtifacts(Vec::new()),
            KeyCode::Enter | KeyCode::Right => WizardAction::Next,
            KeyCode::Left | KeyCode::Backspace => WizardAction::Back,
            _ => return false,
        };
        let edits = matches!(action, WizardAction::ToggleArtifact(_) | WizardAction::SetArtifacts(_));
        let (cursor, page) = (self.cursor, self.artifact_page);
        let left = self.dispatch(action, out);
        if edits {
            self.cursor = cursor;
            self.artifact_page = page;
        }
        left
    }

    fn schedule_key(&mut self, key: KeyEvent, now: DateTime<Utc>, out: &mut Vec<Command>) -> bool {
        match key.code {
            KeyCode::Tab => {
                self.schedule_mode = self.schedule_mode.next();
                self.schedule_input.clear();
                false
            }
            KeyCode::BackTab => self.dispatch(WizardAction::Back, out),
            KeyCode::Enter => {
                let raw = self.schedule_input.value().to_string();
                let input = match self.schedule_mode {
                    ScheduleMode::Now => ScheduleInput::Now(now),
                    ScheduleMode::At => ScheduleInput::At(raw),
                    ScheduleMode::Cron => ScheduleInput::Cron(raw),
                };
                self.dispatch(WizardAction::SetSchedule(input), out)
            }
            _ => {
                if self.schedule_mode != ScheduleMode::Now {
                    self.schedule_input.handle_key(key);
                }
                false
            }
        }
    }

    pub fn sources_loaded(&mut self, result: Result<Vec<DataSource>, String>) {
        self.sources_loading = false;
        match result {
            Ok(sources) => {
                self.sources = sources.into_iter().filter(|s| s.is_active).collect();
                if matches!(self.state(), WizardState::SelectSource) {
                    self.cursor = self.cursor.min(self.sources.len().saturating_sub(1));
                }
            }
            Err(message) => self.error = Some(message),
        }
    }

    pub fn databases_loaded(
        &mut self,
        data_source_id: i64,
        result: Result<Vec<Database>, String>,
        is_admin: bool,
    ) {
        let current = self.state().selection().map(|s| s.source.id);
        if current != Some(data_source_id) {
            warn!(data_source_id, "dropping databases for a source no longer selected");
            return;
        }
        self.databases_loading = false;
        match result {
            Ok(databases) => self.databases = visible_databases(&databases, is_admin),
            Err(message) => self.error = Some(message),
        }
    }

    pub fn artifacts_loaded(
        &mut self,
        data_source_id: i64,
        db: String,
        result: Result<Vec<Artifact>, String>,
    ) {
        let current = self.state().selection().map(|s| s.source.id);
        if current != Some(data_source_id) {
            warn!(data_source_id, %db, "dropping artifacts for a source no longer selected");
            return;
        }
        self.artifacts_loading.remove(&db);
        match result {
            Ok(artifacts) => {
                self.artifacts.insert(db, artifacts);
            }
            Err(message) => self.error = Some(message),
        }
    }

    pub fn submitted(&mut self, result: Result<String, String>, out: &mut Vec<Command>) {
        let action = match result {
            Ok(job_id) => WizardAction::SubmitSucceeded(job_id),
            Err(message) => WizardAction::SubmitFailed(message),
        };
        self.dispatch(action, out);
    }
}
