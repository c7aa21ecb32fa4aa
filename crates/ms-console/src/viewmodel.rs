//! ViewModel layer - derived presentation state shaped for rendering
//!
//! The ViewModel turns the Model into plain strings, rows and selection
//! indices. The View consumes it and never looks at the Model directly.

use ms_artifacts::{Column, ResultTable, SortDirection};
use ms_rest_api_contract::ConnectionStatus;

use crate::assistant::{AssistantAnswer, AssistantScreen};
use crate::browser::TableBrowser;
use crate::data_sources::{DataSourcesScreen, DraftForm, FormField};
use crate::history::HistoryScreen;
use crate::model::{Banner, LoginField, LoginForm, Model, Screen};
use crate::scan::{ScanScreen, ScheduleMode};
use crate::wizard::{WizardState, STEP_LABELS};

/// Key hint shown in the footer, e.g. ("Enter", "Select")
pub type KeyHint = (&'static str, &'static str);

#[derive(Debug, Clone, PartialEq)]
pub struct ViewModel {
    pub title: String,
    /// Signed-in user, shown in the header
    pub user_label: Option<String>,
    pub banner: Option<Banner>,
    pub body: Body,
    pub footer: Vec<KeyHint>,
    /// Message for the loading overlay
    pub loading: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Login(LoginView),
    Menu(ListView),
    Wizard(WizardView),
    Jobs(ListView),
    Table(TableView),
    DataSources(ListView),
    Form(FormView),
    Assistant(AssistantView),
}

/// Presentation-ready list row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRow {
    pub text: String,
    /// Checkbox state for multi-select lists
    pub checked: Option<bool>,
}

impl ListRow {
    fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            checked: None,
        }
    }

    fn checkbox(text: impl Into<String>, checked: bool) -> Self {
        Self {
            text: text.into(),
            checked: Some(checked),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListView {
    pub title: String,
    pub rows: Vec<ListRow>,
    pub selected: Option<usize>,
    /// Shown instead of rows when there are none
    pub empty: String,
}

impl ListView {
    fn new(title: impl Into<String>, rows: Vec<ListRow>, cursor: usize, empty: &str) -> Self {
        let selected = (!rows.is_empty()).then(|| cursor.min(rows.len() - 1));
        Self {
            title: title.into(),
            rows,
            selected,
            empty: empty.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginView {
    pub email: String,
    pub password: String,
    pub password_focused: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WizardView {
    pub steps: Vec<&'static str>,
    /// Index into `steps`; equals `steps.len()` once submitted
    pub current: usize,
    pub content: WizardContent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardContent {
    List(ListView),
    Schedule {
        modes: Vec<(&'static str, bool)>,
        input: Option<String>,
        placeholder: &'static str,
    },
    Summary(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableView {
    pub title: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub summary: String,
    /// Search box text and whether it has focus
    pub search: String,
    pub searching: bool,
    pub filters: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormRow {
    pub label: &'static str,
    pub value: String,
    pub focused: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormView {
    pub title: String,
    pub rows: Vec<FormRow>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantView {
    pub scope: String,
    pub input: String,
    pub question: Option<String>,
    pub answer: Vec<String>,
    pub pending: bool,
}

impl ViewModel {
    /// Create a ViewModel from the current Model
    pub fn from_model(model: &Model) -> Self {
        let user_label = model.session().user().map(|user| match user.name.as_deref() {
            Some(name) if !name.is_empty() => format!("{name} <{}>", user.email),
            _ => user.email.clone(),
        });

        let (title, body, footer, loading, screen_banner) = match model.screen {
            Screen::Login => login(&model.login),
            Screen::Home => home(model),
            Screen::Wizard => wizard(&model.scan),
            Screen::History => history(&model.history),
            Screen::DataSources => data_sources(&model.data_sources),
            Screen::Assistant => assistant(&model.assistant),
        };

        Self {
            title: format!("Metascan | {title}"),
            user_label,
            banner: model.banner.clone().or(screen_banner),
            body,
            footer,
            loading,
        }
    }

    /// Rows of whichever list is on screen (useful for assertions)
    pub fn list_rows(&self) -> Vec<&str> {
        let list = match &self.body {
            Body::Menu(list) | Body::Jobs(list) | Body::DataSources(list) => list,
            Body::Wizard(WizardView {
                content: WizardContent::List(list),
                ..
            }) => list,
            _ => return Vec::new(),
        };
        list.rows.iter().map(|row| row.text.as_str()).collect()
    }
}

type Parts = (String, Body, Vec<KeyHint>, Option<String>, Option<Banner>);

const QUIT: KeyHint = ("Ctrl+C", "Quit");

fn login(form: &LoginForm) -> Parts {
    let body = Body::Login(LoginView {
        email: form.email.value().to_string(),
        password: form.password.masked(),
        password_focused: form.focus == LoginField::Password,
    });
    let loading = form.pending.then(|| "Signing in...".to_string());
    let banner = form.error.clone().map(Banner::error);
    (
        "Sign In".into(),
        body,
        vec![("Tab", "Switch field"), ("Enter", "Sign in"), QUIT],
        loading,
        banner,
    )
}

fn home(model: &Model) -> Parts {
    let rows = model
        .home_items()
        .into_iter()
        .map(|item| ListRow::plain(item.label()))
        .collect();
    (
        "Home".into(),
        Body::Menu(ListView::new("Menu", rows, model.home_cursor, "")),
        vec![("↑↓", "Navigate"), ("Enter", "Open"), ("q", "Quit")],
        None,
        None,
    )
}

fn wizard(scan: &ScanScreen) -> Parts {
    let state = scan.state();
    let selection = state.selection();
    let mut loading = None;

    let (content, footer): (WizardContent, Vec<KeyHint>) = match state {
        WizardState::SelectSource => {
            if scan.sources_loading {
                loading = Some("Loading data sources...".to_string());
            }
            let rows = scan
                .sources
                .iter()
                .map(|s| ListRow::plain(format!("{} ({})", s.name, s.normalized_type())))
                .collect();
            (
                WizardContent::List(ListView::new(
                    "Data Sources",
                    rows,
                    scan.cursor,
                    "No active data sources",
                )),
                vec![("↑↓", "Navigate"), ("Enter", "Choose"), ("Esc", "Cancel")],
            )
        }
        WizardState::SelectDatabases(selection) => {
            if scan.databases_loading {
                loading = Some("Loading databases...".to_string());
            }
            let rows = scan
                .databases
                .iter()
                .map(|db| ListRow::checkbox(db.clone(), selection.databases.contains(db)))
                .collect();
            (
                WizardContent::List(ListView::new(
                    format!("Databases in {}", selection.source.name),
                    rows,
                    scan.cursor,
                    "No databases found",
                )),
                vec![
                    ("Space", "Toggle"),
                    ("a/c", "All/None"),
                    ("Enter", "Next"),
                    ("←", "Back"),
                    ("Esc", "Cancel"),
                ],
            )
        }
        WizardState::SelectArtifacts { selection, .. } => {
            let db = state.current_database().unwrap_or_default();
            if scan.artifacts_loading.contains(db) {
                loading = Some(format!("Loading artifacts of {db}..."));
            }
            let chosen = selection.artifacts_for(db);
            let rows = scan
                .artifact_page_rows()
                .iter()
                .map(|a| {
                    let kind = a.object_type.as_deref().unwrap_or("artifact");
                    ListRow::checkbox(format!("{} [{kind}]", a.name), chosen.contains(&a.name))
                })
                .collect();
            let title = format!(
                "Artifacts in {db} (page {}/{}, {} selected)",
                scan.artifact_page + 1,
                scan.artifact_page_count(),
                chosen.len()
            );
            (
                WizardContent::List(ListView::new(title, rows, scan.cursor, "No artifacts found")),
                vec![
                    ("Space", "Toggle"),
                    ("a/c", "All/None"),
                    ("PgUp/PgDn", "Page"),
                    ("Enter", "Next"),
                    ("←", "Back"),
                ],
            )
        }
        WizardState::Schedule(_) => {
            let modes = ScheduleMode::ALL
                .iter()
                .map(|mode| (mode.label(), *mode == scan.schedule_mode))
                .collect();
            let input = (scan.schedule_mode != ScheduleMode::Now)
                .then(|| scan.schedule_input.value().to_string());
            (
                WizardContent::Schedule {
                    modes,
                    input,
                    placeholder: scan.schedule_mode.placeholder(),
                },
                vec![("Tab", "Mode"), ("Enter", "Next"), ("Shift+Tab", "Back"), ("Esc", "Cancel")],
            )
        }
        WizardState::Confirm {
            selection,
            schedule,
            submitting,
            ..
        } => {
            if *submitting {
                loading = Some("Submitting scan...".to_string());
            }
            let mut lines = vec![
                format!("Data source: {}", selection.source.name),
                format!("Type: {}", selection.source.normalized_type()),
            ];
            if !selection.is_sqlite() {
                lines.push(format!("Databases: {}", selection.databases.join(", ")));
                for db in &selection.databases {
                    lines.push(format!("  {db}: {}", selection.artifacts_for(db).join(", ")));
                }
            }
            lines.push(format!("Schedule: {}", schedule.describe()));
            (
                WizardContent::Summary(lines),
                vec![("Enter", "Submit"), ("←", "Back"), ("Esc", "Cancel")],
            )
        }
        WizardState::Submitted { job_id } => (
            WizardContent::Summary(vec![
                "Scan submitted.".to_string(),
                format!("Job ID: {job_id}"),
            ]),
            vec![("Enter", "Done")],
        ),
    };

    let confirm_error = match state {
        WizardState::Confirm { error, .. } => error.clone(),
        _ => None,
    };
    let banner = scan
        .error
        .clone()
        .or(confirm_error)
        .or_else(|| scan.notice().map(str::to_string))
        .map(Banner::error);

    let title = match selection {
        Some(selection) => format!("New Scan: {}", selection.source.name),
        None => "New Scan".to_string(),
    };
    let mut footer = footer;
    footer.push(QUIT);
    (
        title,
        Body::Wizard(WizardView {
            steps: STEP_LABELS.to_vec(),
            current: state.step_index(),
            content,
        }),
        footer,
        loading,
        banner,
    )
}

fn table_view(browser: &TableBrowser) -> TableView {
    let table: &ResultTable = &browser.table;
    let (sort_column, direction) = table.sort();
    let headers = table
        .visible_columns()
        .iter()
        .map(|column| {
            let slot = table
                .available_columns()
                .iter()
                .position(|c| c == column)
                .map_or(0, |i| i + 1);
            let arrow = match (*column == sort_column, direction) {
                (false, _) => "",
                (true, SortDirection::Ascending) => " ▲",
                (true, SortDirection::Descending) => " ▼",
            };
            format!("{slot}:{}{arrow}", column.header())
        })
        .collect();

    let rows = table
        .page_rows()
        .into_iter()
        .map(|row| {
            table
                .visible_columns()
                .iter()
                .map(|column| ms_artifacts::Cell::of(row, *column).display())
                .collect()
        })
        .collect();

    let mut filters = Vec::new();
    if table.nullable_only() {
        filters.push("nullable");
    }
    if table.primary_key_only() {
        filters.push("primary key");
    }
    let hidden: Vec<&str> = table
        .available_columns()
        .iter()
        .filter(|c| !table.is_visible(**c))
        .map(Column::header)
        .collect();
    let mut filters = if filters.is_empty() {
        "Filters: none".to_string()
    } else {
        format!("Filters: {}", filters.join(", "))
    };
    if !hidden.is_empty() {
        filters.push_str(&format!(" | Hidden: {}", hidden.join(", ")));
    }

    TableView {
        title: table.title(),
        headers,
        rows,
        summary: format!(
            "{} | page {}/{} | {} per page",
            table.summary(),
            table.page(),
            table.page_count(),
            table.rows_per_page()
        ),
        search: browser.search.value().to_string(),
        searching: browser.searching,
        filters,
    }
}

fn browser_footer(searching: bool) -> Vec<KeyHint> {
    if searching {
        return vec![("Type", "Search"), ("Enter/Esc", "Done"), QUIT];
    }
    vec![
        ("/", "Search"),
        ("n/k", "Nullable/PK"),
        ("1-7", "Sort"),
        ("F1-F7", "Columns"),
        ("←→", "Page"),
        ("r", "Rows"),
        ("x/j/p", "CSV/JSON/PDF"),
        ("a", "Ask AI"),
        ("Esc", "Close"),
    ]
}

fn history(screen: &HistoryScreen) -> Parts {
    let banner = screen.error.clone().map(Banner::error);
    if let Some(view) = &screen.result {
        return (
            format!("Scan #{}", view.job_id),
            Body::Table(table_view(&view.browser)),
            browser_footer(view.browser.searching),
            None,
            banner,
        );
    }

    let rows = screen
        .jobs
        .iter()
        .map(|job| {
            let databases = if job.db_names.is_empty() {
                "-".to_string()
            } else {
                job.db_names.join(", ")
            };
            ListRow::plain(format!(
                "#{:<5} {:<10} {}  source {}  {}",
                job.id,
                job.status.label(),
                job.created_at.format("%Y-%m-%d %H:%M"),
                job.data_source_id,
                databases
            ))
        })
        .collect();
    let loading = if screen.jobs_loading {
        Some("Loading scan jobs...".to_string())
    } else {
        screen.result_loading.map(|id| format!("Loading result of scan #{id}..."))
    };
    (
        "Scan History".into(),
        Body::Jobs(ListView::new("Scan Jobs", rows, screen.cursor, "No scans yet")),
        vec![("↑↓", "Navigate"), ("Enter", "Open result"), ("r", "Refresh"), ("Esc", "Back"), QUIT],
        loading,
        banner,
    )
}

fn status_label(status: ConnectionStatus) -> &'static str {
    match status {
        ConnectionStatus::Ok => "ok",
        ConnectionStatus::Error => "error",
        ConnectionStatus::Unknown => "unknown",
    }
}

fn form_view(form: &DraftForm) -> FormView {
    let row = |label: &'static str, value: String, field: FormField| FormRow {
        label,
        value,
        focused: form.focus == field,
    };
    FormView {
        title: match form.editing {
            Some(id) => format!("Edit Data Source #{id}"),
            None => "New Data Source".to_string(),
        },
        rows: vec![
            row("Name", form.name.value().to_string(), FormField::Name),
            row("Type", form.type_label(), FormField::Type),
            row(
                "Connection string",
                form.connection_string.value().to_string(),
                FormField::ConnectionString,
            ),
            row(
                "Active",
                if form.is_active { "[x]" } else { "[ ]" }.to_string(),
                FormField::Active,
            ),
        ],
    }
}

fn data_sources(screen: &DataSourcesScreen) -> Parts {
    if let Some(preview) = &screen.preview {
        return (
            "Quick Scan".into(),
            Body::Table(table_view(&preview.browser)),
            browser_footer(preview.browser.searching),
            None,
            screen.error.clone().map(Banner::error),
        );
    }

    if let Some(form) = &screen.form {
        return (
            "Data Sources".into(),
            Body::Form(form_view(form)),
            vec![
                ("Tab", "Next field"),
                ("←→/Space", "Change"),
                ("Enter", "Save"),
                ("Esc", "Cancel"),
                QUIT,
            ],
            form.saving.then(|| "Saving data source...".to_string()),
            form.error.clone().map(Banner::error),
        );
    }

    let rows = screen
        .sources
        .iter()
        .map(|source| {
            let mut flags = Vec::new();
            if screen.testing.contains(&source.id) {
                flags.push("testing");
            }
            if screen.scanning.contains(&source.id) {
                flags.push("scanning");
            }
            if screen.deleting.contains(&source.id) {
                flags.push("deleting");
            }
            let flags = if flags.is_empty() {
                String::new()
            } else {
                format!(" ({})", flags.join(", "))
            };
            ListRow::plain(format!(
                "{:<24} {:<10} {:<8} {}{flags}",
                source.name,
                source.normalized_type(),
                status_label(screen.status(source)),
                if source.is_active { "active" } else { "inactive" },
            ))
        })
        .collect();

    let banner = if let Some(id) = screen.confirm_delete {
        let name = screen
            .sources
            .iter()
            .find(|s| s.id == id)
            .map_or_else(|| format!("#{id}"), |s| s.name.clone());
        Some(Banner::error(format!("Delete {name}? Press y to confirm, any other key to keep it.")))
    } else {
        screen
            .error
            .clone()
            .map(Banner::error)
            .or_else(|| screen.info.clone().map(Banner::info))
    };

    (
        "Data Sources".into(),
        Body::DataSources(ListView::new("Data Sources", rows, screen.cursor, "No data sources")),
        vec![
            ("n", "New"),
            ("e", "Edit"),
            ("d", "Delete"),
            ("t", "Test"),
            ("s", "Quick scan"),
            ("r", "Refresh"),
            ("Esc", "Back"),
        ],
        screen.loading.then(|| "Loading data sources...".to_string()),
        banner,
    )
}

fn assistant(screen: &AssistantScreen) -> Parts {
    let scope = match (&screen.scan_id, screen.scope_tables.len()) {
        (Some(scan), 0) => format!("Scope: scan {scan}"),
        (Some(scan), n) => format!("Scope: scan {scan}, {n} tables"),
        (None, 0) => "Scope: all metadata".to_string(),
        (None, n) => format!("Scope: {n} tables"),
    };

    let answer = match &screen.answer {
        None => Vec::new(),
        Some(AssistantAnswer::Rag { answer, sources }) => {
            let mut lines: Vec<String> = answer.lines().map(str::to_string).collect();
            if !sources.is_empty() {
                lines.push(String::new());
                lines.push("Sources:".to_string());
                lines.extend(sources.iter().map(|s| format!("  {}", s.label())));
            }
            lines
        }
        Some(AssistantAnswer::Agent {
            answer,
            context_summary,
        }) => {
            let mut lines: Vec<String> = answer.lines().map(str::to_string).collect();
            if let Some(summary) = context_summary.as_deref().filter(|s| !s.is_empty()) {
                lines.push(String::new());
                lines.push(format!("Context: {summary}"));
            }
            lines
        }
    };

    (
        "AI Assistant".into(),
        Body::Assistant(AssistantView {
            scope,
            input: screen.input.value().to_string(),
            question: screen.question.clone(),
            answer,
            pending: screen.state.is_pending(),
        }),
        vec![("Enter", "Ask"), ("Esc", "Back"), QUIT],
        None,
        screen.error.clone().map(Banner::error),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ms_client_api::SessionContext;
    use ms_rest_api_contract::{DataSource, User};

    fn source(id: i64, name: &str) -> DataSource {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "name": name,
            "type": "postgres",
            "connection_string": "postgresql://localhost/db",
            "is_active": true
        }))
        .unwrap()
    }

    #[test]
    fn test_login_masks_password() {
        let mut model = Model::new(SessionContext::new());
        model.login.email.set("ada@example.com");
        model.login.password.set("secret");
        let vm = ViewModel::from_model(&model);
        match vm.body {
            Body::Login(view) => {
                assert_eq!(view.email, "ada@example.com");
                assert!(!view.password.contains("secret"));
                assert_eq!(view.password.chars().count(), 6);
            }
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[test]
    fn test_home_shows_user_and_menu() {
        let session = SessionContext::with_token("t");
        session.set_user(User {
            id: 1,
            email: "ada@example.com".into(),
            name: Some("Ada".into()),
            role: Some("user".into()),
            is_active: Some(true),
        });
        let mut model = Model::new(session);
        model.start();
        let vm = ViewModel::from_model(&model);
        assert_eq!(vm.user_label.as_deref(), Some("Ada <ada@example.com>"));
        assert!(vm.list_rows().contains(&"New Scan"));
        assert!(!vm.list_rows().contains(&"Data Sources"));
    }

    #[test]
    fn test_wizard_lists_sources_and_errors() {
        let mut model = Model::new(SessionContext::with_token("t"));
        model.screen = Screen::Wizard;
        model.scan.sources = vec![source(1, "warehouse")];
        model.scan.error = Some("boom".into());
        let vm = ViewModel::from_model(&model);
        assert_eq!(vm.list_rows(), vec!["warehouse (postgres)"]);
        assert_eq!(vm.banner, Some(Banner::error("boom")));
        match vm.body {
            Body::Wizard(view) => assert_eq!(view.current, 0),
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[test]
    fn test_delete_confirmation_prompt() {
        let mut model = Model::new(SessionContext::with_token("t"));
        model.screen = Screen::DataSources;
        model.data_sources.sources = vec![source(4, "warehouse")];
        model.data_sources.confirm_delete = Some(4);
        let vm = ViewModel::from_model(&model);
        let banner = vm.banner.unwrap();
        assert!(banner.text.starts_with("Delete warehouse?"));
    }
}
