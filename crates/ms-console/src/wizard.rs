//! Scan wizard state machine
//!
//! One variant per step, each carrying only what that step needs. All
//! transitions go through [`reduce`], which is pure: network work leaves the
//! machine as a [`WizardEffect`] and comes back as another action.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use ms_rest_api_contract::validation::{parse_schedule_time, validate_cron_expression};
use ms_rest_api_contract::{DataSource, Database, ScanConfig, SourceKind};
use thiserror::Error;
use tracing::debug;

/// Schemas hidden from non-admin users when picking databases
pub const SYSTEM_SCHEMAS: &[&str] = &[
    "INFORMATION_SCHEMA",
    "sys",
    "guest",
    "db_owner",
    "db_accessadmin",
    "db_backupoperator",
    "db_datareader",
    "db_datawriter",
    "db_ddladmin",
    "db_denydatareader",
    "db_denydatawriter",
    "db_securityadmin",
];

/// Database names offered for selection
pub fn visible_databases(databases: &[Database], is_admin: bool) -> Vec<String> {
    databases
        .iter()
        .filter(|db| is_admin || !SYSTEM_SCHEMAS.iter().any(|s| s.eq_ignore_ascii_case(&db.name)))
        .map(|db| db.name.clone())
        .collect()
}

/// Artifact categories requested per database for a source type
pub fn artifact_fetch_types(source_type: &str) -> &'static [&'static str] {
    match SourceKind::from_type(source_type) {
        SourceKind::Mongo => &["collections"],
        SourceKind::Sqlite | SourceKind::Sql => ms_artifacts::normalize::SQL_FETCH_CATEGORIES,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WizardError {
    #[error("Select at least one database to continue.")]
    NoDatabases,
    #[error("Select at least one artifact in {0} to continue.")]
    NoArtifacts(String),
    #[error("Choose when the scan should run.")]
    EmptySchedule,
    #[error("{0}")]
    InvalidSchedule(String),
    #[error("A submission is already in progress.")]
    SubmitInFlight,
    #[error("That action is not available at this step.")]
    NotAvailable,
}

/// Schedule as entered by the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleInput {
    /// Run immediately; carries the moment the choice was made
    Now(DateTime<Utc>),
    At(String),
    Cron(String),
}

/// A validated schedule; exactly one form is retained
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schedule {
    Now(DateTime<Utc>),
    At(DateTime<Utc>),
    Cron(String),
}

impl Schedule {
    pub fn resolve(input: ScheduleInput) -> Result<Self, WizardError> {
        match input {
            ScheduleInput::Now(now) => Ok(Schedule::Now(now)),
            ScheduleInput::At(raw) if raw.trim().is_empty() => Err(WizardError::EmptySchedule),
            ScheduleInput::At(raw) => parse_schedule_time(&raw)
                .map(Schedule::At)
                .map_err(|e| WizardError::InvalidSchedule(e.first_message())),
            ScheduleInput::Cron(raw) if raw.trim().is_empty() => Err(WizardError::EmptySchedule),
            ScheduleInput::Cron(raw) => {
                let expr = raw.split_whitespace().collect::<Vec<_>>().join(" ");
                validate_cron_expression(&expr)
                    .map(|_| Schedule::Cron(expr))
                    .map_err(|e| WizardError::InvalidSchedule(e.first_message()))
            }
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Schedule::Now(at) => format!("Run now ({})", at.format("%Y-%m-%d %H:%M UTC")),
            Schedule::At(at) => format!("Once at {}", at.format("%Y-%m-%d %H:%M UTC")),
            Schedule::Cron(expr) => format!("Recurring: {}", expr),
        }
    }
}

/// Working selection accumulated across the steps
#[derive(Debug, Clone, PartialEq)]
pub struct ScanSelection {
    pub source: DataSource,
    pub databases: Vec<String>,
    pub artifacts: HashMap<String, Vec<String>>,
}

impl ScanSelection {
    pub fn new(source: DataSource) -> Self {
        Self {
            source,
            databases: Vec::new(),
            artifacts: HashMap::new(),
        }
    }

    pub fn is_sqlite(&self) -> bool {
        self.source.kind() == SourceKind::Sqlite
    }

    /// Replace the chosen databases, keeping selections of databases that
    /// are still chosen and giving new ones an empty slot.
    pub fn reconcile(&mut self, databases: Vec<String>) {
        let mut previous = std::mem::take(&mut self.artifacts);
        self.artifacts = databases
            .iter()
            .map(|db| (db.clone(), previous.remove(db).unwrap_or_default()))
            .collect();
        self.databases = databases;
    }

    pub fn artifacts_for(&self, db: &str) -> &[String] {
        self.artifacts.get(db).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First chosen database with no artifact selected
    pub fn first_incomplete(&self) -> Option<&str> {
        self.databases
            .iter()
            .find(|db| self.artifacts_for(db).is_empty())
            .map(String::as_str)
    }

    /// Every selected artifact, in database order
    pub fn flattened_artifacts(&self) -> Vec<String> {
        self.databases
            .iter()
            .flat_map(|db| self.artifacts_for(db).iter().cloned())
            .collect()
    }

    fn validate(&self) -> Result<(), WizardError> {
        if self.is_sqlite() {
            return Ok(());
        }
        if self.databases.is_empty() {
            return Err(WizardError::NoDatabases);
        }
        match self.first_incomplete() {
            Some(db) => Err(WizardError::NoArtifacts(db.to_string())),
            None => Ok(()),
        }
    }

    /// Submission payload; sqlite sources always scan all tables
    pub fn to_config(&self, schedule: &Schedule) -> ScanConfig {
        let (db_names, artifact_types) = if self.is_sqlite() {
            (Vec::new(), vec!["tables".to_string()])
        } else {
            (self.databases.clone(), self.flattened_artifacts())
        };
        let (scheduled_time, scheduled_cron) = match schedule {
            Schedule::Now(at) | Schedule::At(at) => (Some(*at), None),
            Schedule::Cron(expr) => (None, Some(expr.clone())),
        };
        ScanConfig {
            data_source_id: self.source.id,
            db_names,
            artifact_types,
            scheduled_time,
            scheduled_cron,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum WizardState {
    #[default]
    SelectSource,
    SelectDatabases(ScanSelection),
    SelectArtifacts {
        selection: ScanSelection,
        index: usize,
    },
    Schedule(ScanSelection),
    Confirm {
        selection: ScanSelection,
        schedule: Schedule,
        submitting: bool,
        error: Option<String>,
    },
    Submitted {
        job_id: String,
    },
}

impl WizardState {
    /// Zero-based step number, for the stepper
    pub fn step_index(&self) -> usize {
        match self {
            WizardState::SelectSource => 0,
            WizardState::SelectDatabases(_) => 1,
            WizardState::SelectArtifacts { .. } => 2,
            WizardState::Schedule(_) => 3,
            WizardState::Confirm { .. } => 4,
            WizardState::Submitted { .. } => 5,
        }
    }

    pub fn selection(&self) -> Option<&ScanSelection> {
        match self {
            WizardState::SelectDatabases(selection)
            | WizardState::SelectArtifacts { selection, .. }
            | WizardState::Schedule(selection)
            | WizardState::Confirm { selection, .. } => Some(selection),
            WizardState::SelectSource | WizardState::Submitted { .. } => None,
        }
    }

    /// Database whose artifacts are being chosen
    pub fn current_database(&self) -> Option<&str> {
        match self {
            WizardState::SelectArtifacts { selection, index } => {
                selection.databases.get(*index).map(String::as_str)
            }
            _ => None,
        }
    }
}

pub const STEP_LABELS: [&str; 5] = [
    "Select Data Source",
    "Select Databases",
    "Select Artifacts",
    "Schedule Scan",
    "Confirm & Submit",
];

#[derive(Debug, Clone, PartialEq)]
pub enum WizardAction {
    ChooseSource(DataSource),
    SetDatabases(Vec<String>),
    ToggleDatabase(String),
    ToggleArtifact(String),
    SetArtifacts(Vec<String>),
    SetSchedule(ScheduleInput),
    Next,
    Back,
    Submit,
    SubmitSucceeded(String),
    SubmitFailed(String),
    Cancel,
    /// Leave the wizard after a successful submission
    Finish,
}

/// Work the machine asks its host to do
#[derive(Debug, Clone, PartialEq)]
pub enum WizardEffect {
    Submit(ScanConfig),
    Exit,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Moved(WizardState),
    Rejected(WizardState, WizardError),
    Effect(WizardState, WizardEffect),
}

fn toggle(list: &mut Vec<String>, item: String) {
    match list.iter().position(|x| *x == item) {
        Some(pos) => {
            list.remove(pos);
        }
        None => list.push(item),
    }
}

/// Apply one action to one state
pub fn reduce(state: WizardState, action: WizardAction) -> Transition {
    use Transition::*;
    use WizardAction as A;
    use WizardState as S;

    match (state, action) {
        (S::Submitted { .. }, A::Finish) => Effect(S::SelectSource, WizardEffect::Exit),
        (state @ S::Submitted { .. }, _) => Rejected(state, WizardError::NotAvailable),
        (S::Confirm { submitting: true, .. }, A::SubmitSucceeded(job_id)) => {
            Moved(S::Submitted { job_id })
        }
        (S::Confirm { submitting: true, selection, schedule, .. }, A::SubmitFailed(message)) => {
            Moved(S::Confirm {
                selection,
                schedule,
                submitting: false,
                error: Some(message),
            })
        }
        (state @ S::Confirm { submitting: true, .. }, _) => {
            Rejected(state, WizardError::SubmitInFlight)
        }
        (_, A::Cancel) => Effect(S::SelectSource, WizardEffect::Exit),

        (S::SelectSource, A::ChooseSource(source)) => {
            Moved(S::SelectDatabases(ScanSelection::new(source)))
        }

        (S::SelectDatabases(mut selection), A::SetDatabases(databases)) => {
            selection.reconcile(databases);
            Moved(S::SelectDatabases(selection))
        }
        (S::SelectDatabases(mut selection), A::ToggleDatabase(db)) => {
            let mut databases = selection.databases.clone();
            toggle(&mut databases, db);
            selection.reconcile(databases);
            Moved(S::SelectDatabases(selection))
        }
        (S::SelectDatabases(selection), A::Next) => {
            if selection.is_sqlite() {
                Moved(S::Schedule(selection))
            } else if selection.databases.is_empty() {
                Rejected(S::SelectDatabases(selection), WizardError::NoDatabases)
            } else {
                Moved(S::SelectArtifacts { selection, index: 0 })
            }
        }
        (S::SelectDatabases(_), A::Back) => Moved(S::SelectSource),

        (S::SelectArtifacts { mut selection, index }, A::ToggleArtifact(name)) => {
            if let Some(db) = selection.databases.get(index).cloned() {
                toggle(selection.artifacts.entry(db).or_default(), name);
            }
            Moved(S::SelectArtifacts { selection, index })
        }
        (S::SelectArtifacts { mut selection, index }, A::SetArtifacts(names)) => {
            if let Some(db) = selection.databases.get(index).cloned() {
                selection.artifacts.insert(db, names);
            }
            Moved(S::SelectArtifacts { selection, index })
        }
        (S::SelectArtifacts { selection, index }, A::Next) => {
            let db = selection.databases.get(index).cloned().unwrap_or_default();
            if selection.artifacts_for(&db).is_empty() {
                Rejected(S::SelectArtifacts { selection, index }, WizardError::NoArtifacts(db))
            } else if index + 1 < selection.databases.len() {
                Moved(S::SelectArtifacts { selection, index: index + 1 })
            } else {
                Moved(S::Schedule(selection))
            }
        }
        (S::SelectArtifacts { selection, index }, A::Back) => match index {
            0 => Moved(S::SelectDatabases(selection)),
            _ => Moved(S::SelectArtifacts { selection, index: index - 1 }),
        },

        (S::Schedule(selection), A::SetSchedule(input)) => match Schedule::resolve(input) {
            Ok(schedule) => Moved(S::Confirm {
                selection,
                schedule,
                submitting: false,
                error: None,
            }),
            Err(err) => Rejected(S::Schedule(selection), err),
        },
        (S::Schedule(selection), A::Back) => {
            if selection.is_sqlite() || selection.databases.is_empty() {
                Moved(S::SelectDatabases(selection))
            } else {
                let index = selection.databases.len() - 1;
                Moved(S::SelectArtifacts { selection, index })
            }
        }

        (S::Confirm { selection, .. }, A::Back) => Moved(S::Schedule(selection)),
        (S::Confirm { selection, schedule, error, .. }, A::Submit) => {
            match selection.validate() {
                Ok(()) => {
                    let config = selection.to_config(&schedule);
                    Effect(
                        S::Confirm {
                            selection,
                            schedule,
                            submitting: true,
                            error: None,
                        },
                        WizardEffect::Submit(config),
                    )
                }
                Err(err) => Rejected(
                    S::Confirm {
                        selection,
                        schedule,
                        submitting: false,
                        error,
                    },
                    err,
                ),
            }
        }

        (state, _) => Rejected(state, WizardError::NotAvailable),
    }
}

/// Host-side wrapper holding the current state and last validation message
#[derive(Debug, Clone, Default)]
pub struct Wizard {
    state: WizardState,
    notice: Option<String>,
}

impl Wizard {
    pub fn state(&self) -> &WizardState {
        &self.state
    }

    /// Last rejected action's message, cleared by the next accepted one
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn dispatch(&mut self, action: WizardAction) -> Option<WizardEffect> {
        let state = std::mem::take(&mut self.state);
        let before = state.step_index();
        let (state, notice, effect) = match reduce(state, action) {
            Transition::Moved(state) => (state, None, None),
            Transition::Rejected(state, err) => (state, Some(err.to_string()), None),
            Transition::Effect(state, effect) => (state, None, Some(effect)),
        };
        if state.step_index() != before {
            debug!(from = before, to = state.step_index(), "wizard step changed");
        }
        self.state = state;
        self.notice = notice;
        effect
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn source(source_type: &str) -> DataSource {
        DataSource {
            id: 7,
            name: "warehouse".into(),
            source_type: source_type.into(),
            connection_string: "conn".into(),
            is_active: true,
            environment: String::new(),
            tags: vec![],
            host: None,
            port: None,
            connection_status: None,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 1, 2, 0, 0).unwrap()
    }

    fn dbs(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn wizard_at_confirm(source_type: &str) -> Wizard {
        let mut wizard = Wizard::default();
        wizard.dispatch(WizardAction::ChooseSource(source(source_type)));
        wizard.dispatch(WizardAction::SetDatabases(dbs(&["sales", "hr"])));
        wizard.dispatch(WizardAction::Next);
        wizard.dispatch(WizardAction::ToggleArtifact("orders".into()));
        wizard.dispatch(WizardAction::Next);
        wizard.dispatch(WizardAction::SetArtifacts(dbs(&["people", "payroll"])));
        wizard.dispatch(WizardAction::Next);
        wizard.dispatch(WizardAction::SetSchedule(ScheduleInput::Now(now())));
        wizard
    }

    #[test]
    fn test_happy_path_flattens_in_database_order() {
        let mut wizard = wizard_at_confirm("postgres");
        assert_eq!(wizard.state().step_index(), 4);

        let effect = wizard.dispatch(WizardAction::Submit);
        let Some(WizardEffect::Submit(config)) = effect else {
            panic!("expected submit effect, got {:?}", effect);
        };
        assert_eq!(config.data_source_id, 7);
        assert_eq!(config.db_names, dbs(&["sales", "hr"]));
        assert_eq!(config.artifact_types, dbs(&["orders", "people", "payroll"]));
        assert_eq!(config.scheduled_time, Some(now()));
        assert_eq!(config.scheduled_cron, None);

        assert!(wizard.dispatch(WizardAction::Submit).is_none());
        assert_eq!(wizard.notice(), Some("A submission is already in progress."));

        wizard.dispatch(WizardAction::SubmitSucceeded("42".into()));
        assert_eq!(wizard.state(), &WizardState::Submitted { job_id: "42".into() });
    }

    #[test]
    fn test_reselecting_databases_reconciles_selections() {
        let mut selection = ScanSelection::new(source("postgres"));
        selection.reconcile(dbs(&["A", "B"]));
        selection.artifacts.insert("A".into(), dbs(&["t1"]));
        selection.artifacts.insert("B".into(), dbs(&["t2"]));

        let Transition::Moved(state) =
            reduce(WizardState::SelectDatabases(selection), WizardAction::SetDatabases(dbs(&["B", "C"])))
        else {
            panic!("reconcile rejected");
        };
        let selection = state.selection().unwrap();
        assert_eq!(selection.artifacts_for("B"), &["t2".to_string()]);
        assert!(selection.artifacts_for("C").is_empty());
        assert!(selection.artifacts.contains_key("C"));
        assert!(!selection.artifacts.contains_key("A"));
    }

    #[test]
    fn test_submit_with_empty_database_is_rejected_without_effect() {
        let mut selection = ScanSelection::new(source("postgres"));
        selection.reconcile(dbs(&["A", "B"]));
        selection.artifacts.insert("A".into(), dbs(&["t1"]));
        let state = WizardState::Confirm {
            selection,
            schedule: Schedule::Now(now()),
            submitting: false,
            error: None,
        };

        match reduce(state, WizardAction::Submit) {
            Transition::Rejected(WizardState::Confirm { submitting, .. }, err) => {
                assert!(!submitting);
                assert_eq!(err, WizardError::NoArtifacts("B".into()));
            }
            other => panic!("unexpected transition {:?}", other),
        }
    }

    #[test]
    fn test_next_requires_artifacts_on_current_database() {
        let mut wizard = Wizard::default();
        wizard.dispatch(WizardAction::ChooseSource(source("mysql")));
        wizard.dispatch(WizardAction::Next);
        assert_eq!(wizard.notice(), Some("Select at least one database to continue."));

        wizard.dispatch(WizardAction::ToggleDatabase("sales".into()));
        wizard.dispatch(WizardAction::Next);
        wizard.dispatch(WizardAction::Next);
        assert_eq!(wizard.state().current_database(), Some("sales"));
        assert_eq!(wizard.notice(), Some("Select at least one artifact in sales to continue."));
    }

    #[test]
    fn test_back_navigation() {
        let mut wizard = wizard_at_confirm("postgres");
        wizard.dispatch(WizardAction::Back);
        assert!(matches!(wizard.state(), WizardState::Schedule(_)));
        wizard.dispatch(WizardAction::Back);
        assert_eq!(wizard.state().current_database(), Some("hr"));
        wizard.dispatch(WizardAction::Back);
        assert_eq!(wizard.state().current_database(), Some("sales"));
        wizard.dispatch(WizardAction::Back);
        assert!(matches!(wizard.state(), WizardState::SelectDatabases(_)));
        // Selections survive going back and forth
        assert_eq!(
            wizard.state().selection().unwrap().flattened_artifacts(),
            dbs(&["orders", "people", "payroll"])
        );
    }

    #[test]
    fn test_sqlite_skips_artifacts_and_scans_all_tables() {
        let mut wizard = Wizard::default();
        wizard.dispatch(WizardAction::ChooseSource(source("SQLite")));
        wizard.dispatch(WizardAction::Next);
        assert!(matches!(wizard.state(), WizardState::Schedule(_)));

        wizard.dispatch(WizardAction::SetSchedule(ScheduleInput::Cron("0  2 * * *".into())));
        let Some(WizardEffect::Submit(config)) = wizard.dispatch(WizardAction::Submit) else {
            panic!("sqlite submission rejected");
        };
        assert!(config.db_names.is_empty());
        assert_eq!(config.artifact_types, dbs(&["tables"]));
        assert_eq!(config.scheduled_cron.as_deref(), Some("0 2 * * *"));
        assert_eq!(config.scheduled_time, None);
    }

    #[test]
    fn test_sqlite_ignores_upstream_selections() {
        let mut selection = ScanSelection::new(source("sqlite"));
        selection.reconcile(dbs(&["main"]));
        selection.artifacts.insert("main".into(), dbs(&["users"]));
        let config = selection.to_config(&Schedule::Now(now()));
        assert!(config.db_names.is_empty());
        assert_eq!(config.artifact_types, dbs(&["tables"]));
    }

    #[test]
    fn test_schedule_validation() {
        assert_eq!(Schedule::resolve(ScheduleInput::At("  ".into())), Err(WizardError::EmptySchedule));
        assert_eq!(Schedule::resolve(ScheduleInput::Cron("".into())), Err(WizardError::EmptySchedule));
        assert!(matches!(
            Schedule::resolve(ScheduleInput::Cron("every day".into())),
            Err(WizardError::InvalidSchedule(_))
        ));
        assert_eq!(
            Schedule::resolve(ScheduleInput::At("2025-09-01T02:00".into())),
            Ok(Schedule::At(now()))
        );
    }

    #[test]
    fn test_submit_failure_keeps_state_and_allows_retry() {
        let mut wizard = wizard_at_confirm("postgres");
        wizard.dispatch(WizardAction::Submit);
        wizard.dispatch(WizardAction::SubmitFailed("500 boom".into()));

        match wizard.state() {
            WizardState::Confirm { submitting, error, selection, .. } => {
                assert!(!submitting);
                assert_eq!(error.as_deref(), Some("500 boom"));
                assert_eq!(selection.databases, dbs(&["sales", "hr"]));
            }
            other => panic!("unexpected state {:?}", other),
        }
        assert!(matches!(wizard.dispatch(WizardAction::Submit), Some(WizardEffect::Submit(_))));
    }

    #[test]
    fn test_cancel_discards_everything() {
        let mut wizard = wizard_at_confirm("postgres");
        assert_eq!(wizard.dispatch(WizardAction::Cancel), Some(WizardEffect::Exit));
        assert_eq!(wizard.state(), &WizardState::SelectSource);

        let mut wizard = wizard_at_confirm("postgres");
        wizard.dispatch(WizardAction::Submit);
        wizard.dispatch(WizardAction::SubmitSucceeded("9".into()));
        assert_eq!(wizard.dispatch(WizardAction::Cancel), None);
        assert_eq!(wizard.dispatch(WizardAction::Finish), Some(WizardEffect::Exit));
    }

    #[test]
    fn test_system_schemas_hidden_from_non_admins() {
        let all: Vec<Database> = ["public", "INFORMATION_SCHEMA", "db_owner", "sales"]
            .iter()
            .map(|n| Database { name: n.to_string() })
            .collect();
        assert_eq!(visible_databases(&all, false), dbs(&["public", "sales"]));
        assert_eq!(visible_databases(&all, true).len(), 4);
    }

    #[test]
    fn test_artifact_fetch_types() {
        assert_eq!(artifact_fetch_types("MongoDB"), &["collections"]);
        assert_eq!(artifact_fetch_types("postgres"), &["tables", "views", "procedures", "functions"]);
    }
}
