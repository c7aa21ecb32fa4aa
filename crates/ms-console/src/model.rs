//! The Model layer: domain state and rules (no I/O, no Ratatui)
//!
//! `update` consumes one [`Msg`] and returns the [`Command`]s the runtime
//! should execute. Results come back later as [`NetMsg`]s.

use chrono::{DateTime, Utc};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ms_client_api::SessionContext;
use ms_rest_api_contract::validation::validate_login_request;
use ms_rest_api_contract::LoginRequest;
use tracing::{debug, info, warn};

use crate::assistant::AssistantScreen;
use crate::data_sources::DataSourcesScreen;
use crate::history::HistoryScreen;
use crate::input::Input;
use crate::msg::{Command, Msg, Nav, NetMsg};
use crate::scan::ScanScreen;

pub const SESSION_EXPIRED_NOTICE: &str = "Your session has expired. Please sign in again.";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Screen {
    #[default]
    Login,
    Home,
    Wizard,
    History,
    DataSources,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomeItem {
    NewScan,
    History,
    DataSources,
    Assistant,
    SignOut,
    Quit,
}

impl HomeItem {
    pub fn label(self) -> &'static str {
        match self {
            HomeItem::NewScan => "New Scan",
            HomeItem::History => "Scan History",
            HomeItem::DataSources => "Data Sources",
            HomeItem::Assistant => "AI Assistant",
            HomeItem::SignOut => "Sign Out",
            HomeItem::Quit => "Quit",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoginField {
    #[default]
    Email,
    Password,
}

#[derive(Debug, Default)]
pub struct LoginForm {
    pub email: Input,
    pub password: Input,
    pub focus: LoginField,
    pub pending: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Banner {
    pub text: String,
    pub is_error: bool,
}

impl Banner {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }
}

pub struct Model {
    session: SessionContext,
    clock: fn() -> DateTime<Utc>,
    pub screen: Screen,
    pub login: LoginForm,
    pub home_cursor: usize,
    pub scan: ScanScreen,
    pub history: HistoryScreen,
    pub data_sources: DataSourcesScreen,
    pub assistant: AssistantScreen,
    pub banner: Option<Banner>,
    pub should_quit: bool,
}

impl Model {
    pub fn new(session: SessionContext) -> Self {
        Self {
            session,
            clock: Utc::now,
            screen: Screen::Login,
            login: LoginForm::default(),
            home_cursor: 0,
            scan: ScanScreen::default(),
            history: HistoryScreen::default(),
            data_sources: DataSourcesScreen::default(),
            assistant: AssistantScreen::default(),
            banner: None,
            should_quit: false,
        }
    }

    /// Replace the clock used for "run now" schedules
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// Initial commands; a session that starts with a token skips the login screen
    pub fn start(&mut self) -> Vec<Command> {
        if self.session.is_authenticated() {
            self.screen = Screen::Home;
            vec![Command::LoadCurrentUser]
        } else {
            self.screen = Screen::Login;
            Vec::new()
        }
    }

    pub fn home_items(&self) -> Vec<HomeItem> {
        let mut items = vec![HomeItem::NewScan, HomeItem::History];
        if self.session.is_admin() {
            items.push(HomeItem::DataSources);
        }
        items.extend([HomeItem::Assistant, HomeItem::SignOut, HomeItem::Quit]);
        items
    }

    /// Process a single message and update state
    pub fn update(&mut self, msg: Msg) -> Vec<Command> {
        let mut out = Vec::new();
        match msg {
            Msg::Key(key) => self.handle_key(key, &mut out),
            Msg::Tick => {}
            Msg::Net(net) => self.handle_net(net, &mut out),
            Msg::Quit => self.should_quit = true,
        }
        out
    }

    fn navigate(&mut self, screen: Screen) {
        debug!(from = ?self.screen, to = ?screen, "navigating");
        self.screen = screen;
        self.banner = None;
    }

    fn handle_key(&mut self, key: KeyEvent, out: &mut Vec<Command>) {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return;
        }

        let nav = match self.screen {
            Screen::Login => {
                self.login_key(key, out);
                Nav::Stay
            }
            Screen::Home => {
                self.home_key(key, out);
                Nav::Stay
            }
            Screen::Wizard => {
                let now = (self.clock)();
                match self.scan.handle_key(key, now, out) {
                    true => Nav::Home,
                    false => Nav::Stay,
                }
            }
            Screen::History => self.history.handle_key(key, out),
            Screen::DataSources => self.data_sources.handle_key(key, out),
            Screen::Assistant => match self.assistant.handle_key(key, out) {
                true => Nav::Home,
                false => Nav::Stay,
            },
        };

        match nav {
            Nav::Stay => {}
            Nav::Home => self.navigate(Screen::Home),
            Nav::Assistant { scan_id, tables } => {
                self.assistant.set_scope(scan_id, tables);
                self.navigate(Screen::Assistant);
            }
        }
    }

    fn login_key(&mut self, key: KeyEvent, out: &mut Vec<Command>) {
        let form = &mut self.login;
        match key.code {
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
                form.focus = match form.focus {
                    LoginField::Email => LoginField::Password,
                    LoginField::Password => LoginField::Email,
                };
            }
            KeyCode::Enter if !form.pending => {
                let request = LoginRequest {
                    email: form.email.value().trim().to_string(),
                    password: form.password.value().to_string(),
                };
                form.password.clear();
                match validate_login_request(&request) {
                    Ok(()) => {
                        form.pending = true;
                        form.error = None;
                        self.banner = None;
                        out.push(Command::Login(request));
                    }
                    Err(e) => form.error = Some(e.first_message()),
                }
            }
            _ => {
                let input = match form.focus {
                    LoginField::Email => &mut form.email,
                    LoginField::Password => &mut form.password,
                };
                input.handle_key(key);
            }
        }
    }

    fn home_key(&mut self, key: KeyEvent, out: &mut Vec<Command>) {
        let items = self.home_items();
        match key.code {
            KeyCode::Up => self.home_cursor = self.home_cursor.saturating_sub(1),
            KeyCode::Down => self.home_cursor = (self.home_cursor + 1).min(items.len() - 1),
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Enter => {
                let Some(item) = items.get(self.home_cursor).copied() else {
                    return;
                };
                match item {
                    HomeItem::NewScan => {
                        self.scan.open(out);
                        self.navigate(Screen::Wizard);
                    }
                    HomeItem::History => {
                        self.history.open(out);
                        self.navigate(Screen::History);
                    }
                    HomeItem::DataSources => {
                        self.data_sources.open(out);
                        self.navigate(Screen::DataSources);
                    }
                    HomeItem::Assistant => {
                        self.assistant.set_scope(None, Vec::new());
                        self.navigate(Screen::Assistant);
                    }
                    HomeItem::SignOut => self.sign_out(),
                    HomeItem::Quit => self.should_quit = true,
                }
            }
            _ => {}
        }
    }

    fn clear_screens(&mut self) {
        self.scan = ScanScreen::default();
        self.history = HistoryScreen::default();
        self.data_sources = DataSourcesScreen::default();
        self.assistant.reset();
        self.login = LoginForm::default();
        self.home_cursor = 0;
    }

    pub fn sign_out(&mut self) {
        info!("signing out");
        self.session.logout();
        self.clear_screens();
        self.navigate(Screen::Login);
    }

    /// Tear down every screen and return to the login form
    fn session_expired(&mut self) {
        if self.screen == Screen::Login && !self.login.pending {
            return;
        }
        warn!("session expired, returning to login");
        self.clear_screens();
        self.navigate(Screen::Login);
        self.banner = Some(Banner::error(SESSION_EXPIRED_NOTICE));
    }

    fn handle_net(&mut self, net: NetMsg, out: &mut Vec<Command>) {
        match net {
            NetMsg::SignedIn(Ok(user)) => {
                info!(email = %user.email, "signed in");
                if self.screen == Screen::Login {
                    self.login = LoginForm::default();
                    self.home_cursor = 0;
                    self.navigate(Screen::Home);
                }
            }
            NetMsg::SignedIn(Err(message)) => {
                if self.screen == Screen::Login {
                    self.login.pending = false;
                    self.login.error = Some(message);
                } else {
                    self.banner = Some(Banner::error(message));
                }
            }
            NetMsg::SessionExpired => self.session_expired(),
            NetMsg::DataSources(result) => {
                if self.scan.sources_loading {
                    self.scan.sources_loaded(result.clone());
                }
                if self.data_sources.loading {
                    self.data_sources.sources_loaded(result);
                }
            }
            NetMsg::Databases {
                data_source_id,
                result,
            } => {
                let is_admin = self.session.is_admin();
                self.scan.databases_loaded(data_source_id, result, is_admin);
            }
            NetMsg::Artifacts {
                data_source_id,
                db,
                result,
            } => self.scan.artifacts_loaded(data_source_id, db, result),
            NetMsg::ScanSubmitted(result) => self.scan.submitted(result, out),
            NetMsg::ScanJobs(result) => self.history.jobs_loaded(result),
            NetMsg::ScanResult { job_id, result } => self.history.result_loaded(job_id, result),
            NetMsg::DataSourceSaved(result) => self.data_sources.saved(result),
            NetMsg::DataSourceDeleted { id, result } => self.data_sources.deleted(id, result),
            NetMsg::ConnectionTested { id, result } => self.data_sources.tested(id, result),
            NetMsg::QuickScanned { id, result } => self.data_sources.scanned(id, result),
            NetMsg::Answered { request_id, result } => self.assistant.answered(request_id, result),
            NetMsg::Exported(Ok(path)) => {
                self.banner = Some(Banner::info(format!("Exported to {}", path.display())));
            }
            NetMsg::Exported(Err(message)) => {
                self.banner = Some(Banner::error(format!("Export failed: {message}")));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ms_rest_api_contract::User;

    fn key(code: KeyCode) -> Msg {
        Msg::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_text(model: &mut Model, text: &str) {
        for c in text.chars() {
            model.update(key(KeyCode::Char(c)));
        }
    }

    fn admin() -> User {
        User {
            id: 1,
            email: "ada@example.com".into(),
            name: None,
            role: Some("admin".into()),
            is_active: Some(true),
        }
    }

    fn signed_in() -> Model {
        let session = SessionContext::with_token("token");
        session.set_user(admin());
        let mut model = Model::new(session).with_clock(|| Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
        model.start();
        model
    }

    #[test]
    fn test_login_clears_password_and_sends_request() {
        let mut model = Model::new(SessionContext::new());
        assert!(model.start().is_empty());
        type_text(&mut model, "ada@example.com");
        model.update(key(KeyCode::Tab));
        type_text(&mut model, "secret");
        let commands = model.update(key(KeyCode::Enter));

        assert!(matches!(&commands[..], [Command::Login(req)] if req.password == "secret"));
        assert!(model.login.password.is_empty());
        assert!(model.login.pending);

        model.update(Msg::Net(NetMsg::SignedIn(Err("Incorrect email or password".into()))));
        assert_eq!(model.screen, Screen::Login);
        assert_eq!(model.login.error.as_deref(), Some("Incorrect email or password"));
        assert!(!model.login.pending);
    }

    #[test]
    fn test_invalid_email_sends_nothing() {
        let mut model = Model::new(SessionContext::new());
        type_text(&mut model, "not-an-email");
        model.update(key(KeyCode::Tab));
        type_text(&mut model, "pw");
        assert!(model.update(key(KeyCode::Enter)).is_empty());
        assert_eq!(model.login.error.as_deref(), Some("Enter a valid email address"));
        assert!(model.login.password.is_empty());
    }

    #[test]
    fn test_token_session_starts_at_home() {
        let mut model = Model::new(SessionContext::with_token("t"));
        assert!(matches!(model.start()[..], [Command::LoadCurrentUser]));
        assert_eq!(model.screen, Screen::Home);
    }

    #[test]
    fn test_admin_sees_data_sources() {
        let model = signed_in();
        assert!(model.home_items().contains(&HomeItem::DataSources));

        let model = Model::new(SessionContext::with_token("t"));
        assert!(!model.home_items().contains(&HomeItem::DataSources));
    }

    #[test]
    fn test_expiry_tears_down_state() {
        let mut model = signed_in();
        let commands = model.update(key(KeyCode::Enter));
        assert!(matches!(commands[..], [Command::LoadDataSources]));
        assert_eq!(model.screen, Screen::Wizard);
        model.scan.error = Some("stale".into());
        model.assistant.input.set("half typed");

        model.update(Msg::Net(NetMsg::SessionExpired));
        assert_eq!(model.screen, Screen::Login);
        assert_eq!(model.banner, Some(Banner::error(SESSION_EXPIRED_NOTICE)));
        assert!(model.scan.error.is_none());
        assert!(model.assistant.input.is_empty());

        // Further expiries are no-ops
        model.update(Msg::Net(NetMsg::SessionExpired));
        assert_eq!(model.banner, Some(Banner::error(SESSION_EXPIRED_NOTICE)));
    }

    #[test]
    fn test_sign_out() {
        let mut model = signed_in();
        let position = model.home_items().iter().position(|i| *i == HomeItem::SignOut).unwrap();
        for _ in 0..position {
            model.update(key(KeyCode::Down));
        }
        model.update(key(KeyCode::Enter));
        assert_eq!(model.screen, Screen::Login);
        assert!(!model.session().is_authenticated());
    }

    #[test]
    fn test_export_outcome_is_announced() {
        let mut model = signed_in();
        model.update(Msg::Net(NetMsg::Exported(Err("disk full".into()))));
        assert_eq!(model.banner, Some(Banner::error("Export failed: disk full")));
    }
}
