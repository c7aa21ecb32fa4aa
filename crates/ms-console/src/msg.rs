//! Messages that drive the console state machine
//!
//! Terminal input and finished network work are funneled into [`Msg`] and
//! consumed by `Model::update`, which answers with [`Command`]s for the
//! runtime to execute.

use std::path::PathBuf;

use crossterm::event::{Event as CrosstermEvent, KeyEvent};
use ms_artifacts::{Artifact, ExportFormat, ResultTable};
use ms_rest_api_contract::{
    ConnectionStatus, DataSource, DataSourceDraft, Database, LoginRequest, ScanConfig, ScanJob,
    ScanJobResult, User,
};

use crate::assistant::{AssistantAnswer, AssistantRequest};

/// Messages that can be sent to the console state machine
#[derive(Debug, Clone)]
pub enum Msg {
    /// Keyboard input event
    Key(KeyEvent),
    /// Time tick event
    Tick,
    /// Completed network or file work
    Net(NetMsg),
    /// Quit the application
    Quit,
}

/// Results of commands, posted back by the runtime
#[derive(Debug, Clone)]
pub enum NetMsg {
    SignedIn(Result<User, String>),
    /// Any request was answered with 401
    SessionExpired,
    DataSources(Result<Vec<DataSource>, String>),
    Databases {
        data_source_id: i64,
        result: Result<Vec<Database>, String>,
    },
    Artifacts {
        data_source_id: i64,
        db: String,
        result: Result<Vec<Artifact>, String>,
    },
    ScanSubmitted(Result<String, String>),
    ScanJobs(Result<Vec<ScanJob>, String>),
    ScanResult {
        job_id: i64,
        result: Result<ScanJobResult, String>,
    },
    DataSourceSaved(Result<DataSource, String>),
    DataSourceDeleted {
        id: i64,
        result: Result<(), String>,
    },
    ConnectionTested {
        id: i64,
        result: Result<ConnectionStatus, String>,
    },
    QuickScanned {
        id: i64,
        result: Result<Vec<Artifact>, String>,
    },
    Answered {
        request_id: u64,
        result: Result<AssistantAnswer, String>,
    },
    Exported(Result<PathBuf, String>),
}

/// Side effects requested by the model
#[derive(Debug, Clone)]
pub enum Command {
    Login(LoginRequest),
    LoadCurrentUser,
    LoadDataSources,
    LoadDatabases {
        data_source_id: i64,
    },
    LoadArtifacts {
        data_source_id: i64,
        source_type: String,
        db: String,
    },
    SubmitScan(ScanConfig),
    LoadScanJobs,
    LoadScanResult {
        job_id: i64,
    },
    CreateDataSource(DataSourceDraft),
    UpdateDataSource {
        id: i64,
        draft: DataSourceDraft,
    },
    DeleteDataSource {
        id: i64,
    },
    TestConnection {
        id: i64,
    },
    QuickScan {
        id: i64,
        source_type: String,
    },
    Ask(AssistantRequest),
    Export {
        format: ExportFormat,
        table: ResultTable,
    },
}

impl Command {
    /// Short name for logs; payloads may hold credentials
    pub fn name(&self) -> &'static str {
        match self {
            Command::Login(_) => "login",
            Command::LoadCurrentUser => "load_current_user",
            Command::LoadDataSources => "load_data_sources",
            Command::LoadDatabases { .. } => "load_databases",
            Command::LoadArtifacts { .. } => "load_artifacts",
            Command::SubmitScan(_) => "submit_scan",
            Command::LoadScanJobs => "load_scan_jobs",
            Command::LoadScanResult { .. } => "load_scan_result",
            Command::CreateDataSource(_) => "create_data_source",
            Command::UpdateDataSource { .. } => "update_data_source",
            Command::DeleteDataSource { .. } => "delete_data_source",
            Command::TestConnection { .. } => "test_connection",
            Command::QuickScan { .. } => "quick_scan",
            Command::Ask(_) => "ask",
            Command::Export { .. } => "export",
        }
    }
}

impl From<CrosstermEvent> for Msg {
    fn from(event: CrosstermEvent) -> Self {
        match event {
            CrosstermEvent::Key(key_event) => Msg::Key(key_event),
            // Resizes and mouse input only need a redraw
            _ => Msg::Tick,
        }
    }
}

/// Where a screen asks to go after handling a key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Nav {
    Stay,
    Home,
    Assistant {
        scan_id: Option<String>,
        tables: Vec<String>,
    },
}
