//! End-to-end console flows against the scripted client

use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ms_client_api::SessionContext;
use ms_console::assistant::AssistantAnswer;
use ms_console::model::{HomeItem, SESSION_EXPIRED_NOTICE};
use ms_console::runtime::{execute, run_to_idle};
use ms_console::wizard::WizardState;
use ms_console::{Command, Model, Msg, Screen};
use ms_rest_api_contract::{AiAskResponse, ConnectionStatus, ScanConfig, User};
use ms_rest_client_mock::{MockClient, MockFailure};

fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 9, 30, 0).unwrap()
}

fn analyst() -> User {
    User {
        id: 7,
        email: "analyst@example.com".into(),
        name: Some("Analyst".into()),
        role: Some("user".into()),
        is_active: Some(true),
    }
}

fn admin() -> User {
    User {
        role: Some("admin".into()),
        ..analyst()
    }
}

fn key(code: KeyCode) -> Msg {
    Msg::Key(KeyEvent::new(code, KeyModifiers::NONE))
}

async fn press(model: &mut Model, client: &MockClient, dir: &Path, code: KeyCode) {
    let commands = model.update(key(code));
    run_to_idle(model, client, dir, commands).await;
}

async fn type_text(model: &mut Model, client: &MockClient, dir: &Path, text: &str) {
    for c in text.chars() {
        press(model, client, dir, KeyCode::Char(c)).await;
    }
}

async fn signed_in(client: &MockClient, dir: &Path) -> Model {
    let mut model = Model::new(SessionContext::new()).with_clock(fixed_now);
    let commands = model.start();
    run_to_idle(&mut model, client, dir, commands).await;

    type_text(&mut model, client, dir, "analyst@example.com").await;
    press(&mut model, client, dir, KeyCode::Tab).await;
    type_text(&mut model, client, dir, "secret").await;
    press(&mut model, client, dir, KeyCode::Enter).await;

    assert_eq!(model.screen, Screen::Home);
    assert!(model.session().is_authenticated());
    model
}

async fn open_menu(model: &mut Model, client: &MockClient, dir: &Path, item: HomeItem) {
    let position = model.home_items().iter().position(|i| *i == item).unwrap();
    for _ in 0..position {
        press(model, client, dir, KeyCode::Down).await;
    }
    press(model, client, dir, KeyCode::Enter).await;
}

#[tokio::test]
async fn test_wizard_submits_selected_scan() {
    let dir = tempfile::tempdir().unwrap();
    let client = MockClient::demo().with_user(analyst());
    let mut model = signed_in(&client, dir.path()).await;

    open_menu(&mut model, &client, dir.path(), HomeItem::NewScan).await;
    assert_eq!(model.screen, Screen::Wizard);
    assert_eq!(model.scan.sources.len(), 3);

    // warehouse (postgres)
    press(&mut model, &client, dir.path(), KeyCode::Enter).await;
    assert!(matches!(model.scan.state(), WizardState::SelectDatabases(_)));
    // System schemas are hidden from non-admins
    assert_eq!(model.scan.databases, vec!["public".to_string(), "sales".to_string()]);

    press(&mut model, &client, dir.path(), KeyCode::Char(' ')).await;
    press(&mut model, &client, dir.path(), KeyCode::Enter).await;
    assert_eq!(model.scan.state().current_database(), Some("public"));
    assert!(client
        .calls()
        .contains(&"GET /api/data-sources/1/artifacts?db=public&artifact_type=views".to_string()));
    assert_eq!(model.scan.current_artifacts().len(), 4);

    press(&mut model, &client, dir.path(), KeyCode::Char('a')).await;
    press(&mut model, &client, dir.path(), KeyCode::Enter).await;
    assert!(matches!(model.scan.state(), WizardState::Schedule(_)));

    press(&mut model, &client, dir.path(), KeyCode::Enter).await;
    assert!(matches!(model.scan.state(), WizardState::Confirm { .. }));

    press(&mut model, &client, dir.path(), KeyCode::Enter).await;
    assert_eq!(
        model.scan.state(),
        &WizardState::Submitted {
            job_id: "101".into()
        }
    );

    let submitted = client.submitted();
    assert_eq!(submitted.len(), 1);
    let config = &submitted[0];
    assert_eq!(config.data_source_id, 1);
    assert_eq!(config.db_names, vec!["public".to_string()]);
    assert_eq!(config.artifact_types.len(), 4);
    assert!(config.artifact_types.contains(&"active_users".to_string()));
    assert_eq!(config.scheduled_time, Some(fixed_now()));
    assert_eq!(config.scheduled_cron, None);

    press(&mut model, &client, dir.path(), KeyCode::Enter).await;
    assert_eq!(model.screen, Screen::Home);
}

#[tokio::test]
async fn test_incomplete_selection_is_never_submitted() {
    let dir = tempfile::tempdir().unwrap();
    let client = MockClient::demo().with_user(analyst());
    let mut model = signed_in(&client, dir.path()).await;

    open_menu(&mut model, &client, dir.path(), HomeItem::NewScan).await;
    press(&mut model, &client, dir.path(), KeyCode::Enter).await;

    press(&mut model, &client, dir.path(), KeyCode::Enter).await;
    assert_eq!(model.scan.notice(), Some("Select at least one database to continue."));

    press(&mut model, &client, dir.path(), KeyCode::Char(' ')).await;
    press(&mut model, &client, dir.path(), KeyCode::Enter).await;
    press(&mut model, &client, dir.path(), KeyCode::Enter).await;
    assert_eq!(
        model.scan.notice(),
        Some("Select at least one artifact in public to continue.")
    );

    assert!(!client.calls().iter().any(|call| call == "POST /api/scan"));
    assert!(client.submitted().is_empty());
}

#[tokio::test]
async fn test_sqlite_scan_skips_artifact_selection() {
    let dir = tempfile::tempdir().unwrap();
    let client = MockClient::demo().with_user(analyst());
    let mut model = signed_in(&client, dir.path()).await;

    open_menu(&mut model, &client, dir.path(), HomeItem::NewScan).await;
    press(&mut model, &client, dir.path(), KeyCode::Down).await;
    press(&mut model, &client, dir.path(), KeyCode::Down).await;
    press(&mut model, &client, dir.path(), KeyCode::Enter).await;
    press(&mut model, &client, dir.path(), KeyCode::Enter).await;
    assert!(matches!(model.scan.state(), WizardState::Schedule(_)));

    // Once at a fixed time
    press(&mut model, &client, dir.path(), KeyCode::Tab).await;
    type_text(&mut model, &client, dir.path(), "2025-03-02T10:00").await;
    press(&mut model, &client, dir.path(), KeyCode::Enter).await;
    press(&mut model, &client, dir.path(), KeyCode::Enter).await;

    assert_eq!(
        client.submitted(),
        vec![ScanConfig {
            data_source_id: 3,
            db_names: vec![],
            artifact_types: vec!["tables".into()],
            scheduled_time: Some(Utc.with_ymd_and_hms(2025, 3, 2, 10, 0, 0).unwrap()),
            scheduled_cron: None,
        }]
    );
    assert!(!client
        .calls()
        .iter()
        .any(|call| call.starts_with("GET /api/data-sources/3/artifacts")));
}

#[tokio::test]
async fn test_unauthorized_response_returns_to_login() {
    let dir = tempfile::tempdir().unwrap();
    let client = MockClient::demo().with_user(analyst());
    let mut model = signed_in(&client, dir.path()).await;

    client.fail("GET /api/scan-jobs", MockFailure::Unauthorized);
    open_menu(&mut model, &client, dir.path(), HomeItem::History).await;

    assert_eq!(model.screen, Screen::Login);
    assert!(!model.session().is_authenticated());
    assert_eq!(
        model.banner.as_ref().map(|b| b.text.as_str()),
        Some(SESSION_EXPIRED_NOTICE)
    );
    assert!(model.history.jobs.is_empty());
}

#[tokio::test]
async fn test_wrong_password_stays_on_login() {
    let dir = tempfile::tempdir().unwrap();
    let client = MockClient::demo();
    client.fail("POST /users/login", MockFailure::Unauthorized);

    let mut model = Model::new(SessionContext::new());
    type_text(&mut model, &client, dir.path(), "analyst@example.com").await;
    press(&mut model, &client, dir.path(), KeyCode::Tab).await;
    type_text(&mut model, &client, dir.path(), "wrong").await;
    press(&mut model, &client, dir.path(), KeyCode::Enter).await;

    assert_eq!(model.screen, Screen::Login);
    assert_eq!(model.login.error.as_deref(), Some("Incorrect email or password"));
    assert!(model.banner.is_none());
}

#[tokio::test]
async fn test_assistant_falls_back_to_agent() {
    let dir = tempfile::tempdir().unwrap();
    let client = MockClient::new().with_user(analyst()).with_ask_answer(AiAskResponse {
        answer: "orders references users.".into(),
        context_summary: Some("2 tables".into()),
    });
    let mut model = signed_in(&client, dir.path()).await;
    open_menu(&mut model, &client, dir.path(), HomeItem::Assistant).await;
    assert_eq!(model.screen, Screen::Assistant);

    client.clear_calls();
    type_text(&mut model, &client, dir.path(), "how are orders linked?").await;
    press(&mut model, &client, dir.path(), KeyCode::Enter).await;

    assert_eq!(
        client.calls(),
        vec!["POST /ai/rag/query".to_string(), "POST /agentic-ai/ask".to_string()]
    );
    assert_eq!(
        model.assistant.answer,
        Some(AssistantAnswer::Agent {
            answer: "orders references users.".into(),
            context_summary: Some("2 tables".into()),
        })
    );
    assert!(!model.assistant.state.is_pending());
}

#[tokio::test]
async fn test_superseded_question_is_never_answered() {
    let dir = tempfile::tempdir().unwrap();
    let client = MockClient::demo().with_user(analyst());
    let mut model = signed_in(&client, dir.path()).await;
    open_menu(&mut model, &client, dir.path(), HomeItem::Assistant).await;
    client.clear_calls();

    for c in "first question".chars() {
        model.update(key(KeyCode::Char(c)));
    }
    let first = model.update(key(KeyCode::Enter));
    for c in "second question".chars() {
        model.update(key(KeyCode::Char(c)));
    }
    let second = model.update(key(KeyCode::Enter));
    assert!(matches!(&first[..], [Command::Ask(req)] if req.cancel.is_cancelled()));

    // The cancelled request settles without a message or a network call
    let session = model.session().clone();
    for command in first {
        assert!(execute(&client, &session, dir.path(), command).await.is_none());
    }
    assert!(client.calls().is_empty());

    run_to_idle(&mut model, &client, dir.path(), second).await;
    assert_eq!(model.assistant.question.as_deref(), Some("second question"));
    assert_eq!(
        model.assistant.answer.as_ref().map(AssistantAnswer::text),
        Some("users.email holds contact data.")
    );
    assert_eq!(client.calls(), vec!["POST /ai/rag/query".to_string()]);
}

#[tokio::test]
async fn test_connection_test_runs_once_at_a_time() {
    let dir = tempfile::tempdir().unwrap();
    let client = MockClient::demo().with_user(admin());
    let mut model = signed_in(&client, dir.path()).await;
    open_menu(&mut model, &client, dir.path(), HomeItem::DataSources).await;
    assert_eq!(model.screen, Screen::DataSources);
    assert_eq!(model.data_sources.sources.len(), 3);

    let first = model.update(key(KeyCode::Char('t')));
    let second = model.update(key(KeyCode::Char('t')));
    assert!(matches!(&first[..], [Command::TestConnection { id: 1 }]));
    assert!(second.is_empty());

    run_to_idle(&mut model, &client, dir.path(), first).await;
    let tests = client
        .calls()
        .iter()
        .filter(|call| call.ends_with("/test-connection"))
        .count();
    assert_eq!(tests, 1);
    assert_eq!(model.data_sources.statuses.get(&1), Some(&ConnectionStatus::Ok));
    assert!(model.data_sources.testing.is_empty());
}

#[tokio::test]
async fn test_quick_scan_opens_preview() {
    let dir = tempfile::tempdir().unwrap();
    let client = MockClient::demo().with_user(admin());
    let mut model = signed_in(&client, dir.path()).await;
    open_menu(&mut model, &client, dir.path(), HomeItem::DataSources).await;

    press(&mut model, &client, dir.path(), KeyCode::Char('s')).await;
    let preview = model.data_sources.preview.as_ref().unwrap();
    assert_eq!(preview.data_source_id, 1);
    assert_eq!(preview.browser.table.label(), "warehouse");
    assert_eq!(preview.browser.table.total_rows(), 3);
}

#[tokio::test]
async fn test_history_result_export_and_ask() {
    let dir = tempfile::tempdir().unwrap();
    let client = MockClient::demo().with_user(analyst());
    let mut model = signed_in(&client, dir.path()).await;
    open_menu(&mut model, &client, dir.path(), HomeItem::History).await;
    assert_eq!(model.history.jobs.len(), 1);

    press(&mut model, &client, dir.path(), KeyCode::Enter).await;
    let view = model.history.result.as_ref().unwrap();
    assert_eq!(view.job_id, 11);
    assert_eq!(view.browser.table.total_rows(), 6);

    press(&mut model, &client, dir.path(), KeyCode::Char('x')).await;
    let path = dir.path().join("scan_result.csv");
    let csv = std::fs::read_to_string(&path).unwrap();
    assert!(csv.lines().next().unwrap().contains("name"));
    assert!(csv.contains("nickname"));
    assert_eq!(
        model.banner.as_ref().map(|b| b.text.clone()),
        Some(format!("Exported to {}", path.display()))
    );

    press(&mut model, &client, dir.path(), KeyCode::Char('a')).await;
    assert_eq!(model.screen, Screen::Assistant);
    assert_eq!(model.assistant.scan_id.as_deref(), Some("11"));
    let mut tables = model.assistant.scope_tables.clone();
    tables.sort();
    assert_eq!(tables, vec!["orders".to_string(), "users".to_string()]);
}
