//! Scan history and result browsing

use crossterm::event::{KeyCode, KeyEvent};
use ms_artifacts::{artifact_type_label, flatten_scan_result, ResultTable};
use ms_rest_api_contract::{ScanJob, ScanJobResult};
use tracing::debug;

use crate::browser::{BrowserKey, TableBrowser};
use crate::msg::{Command, Nav};

/// Result of one job opened in the browser
#[derive(Debug, Clone)]
pub struct ResultView {
    pub job_id: i64,
    pub browser: TableBrowser,
}

#[derive(Debug, Default)]
pub struct HistoryScreen {
    pub jobs: Vec<ScanJob>,
    pub jobs_loading: bool,
    pub cursor: usize,
    pub result: Option<ResultView>,
    pub result_loading: Option<i64>,
    pub error: Option<String>,
}

impl HistoryScreen {
    pub fn open(&mut self, out: &mut Vec<Command>) {
        *self = Self::default();
        self.jobs_loading = true;
        out.push(Command::LoadScanJobs);
    }

    pub fn selected_job(&self) -> Option<&ScanJob> {
        self.jobs.get(self.cursor)
    }

    pub fn handle_key(&mut self, key: KeyEvent, out: &mut Vec<Command>) -> Nav {
        if let Some(view) = &mut self.result {
            return match view.browser.handle_key(key, out) {
                BrowserKey::Handled => Nav::Stay,
                BrowserKey::Close => {
                    self.result = None;
                    Nav::Stay
                }
                BrowserKey::Ask => Nav::Assistant {
                    scan_id: Some(view.job_id.to_string()),
                    tables: view.browser.table_names(),
                },
            };
        }

        match key.code {
            KeyCode::Esc => return Nav::Home,
            KeyCode::Up => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Down => {
                self.cursor = (self.cursor + 1).min(self.jobs.len().saturating_sub(1));
            }
            KeyCode::Char('r') if !self.jobs_loading => {
                self.jobs_loading = true;
                out.push(Command::LoadScanJobs);
            }
            KeyCode::Enter => {
                if let Some(job) = self.selected_job() {
                    let job_id = job.id;
                    if self.result_loading.is_none() {
                        self.error = None;
                        self.result_loading = Some(job_id);
                        out.push(Command::LoadScanResult { job_id });
                    }
                }
            }
            _ => {}
        }
        Nav::Stay
    }

    pub fn jobs_loaded(&mut self, result: Result<Vec<ScanJob>, String>) {
        self.jobs_loading = false;
        match result {
            Ok(mut jobs) => {
                jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                self.jobs = jobs;
                self.cursor = self.cursor.min(self.jobs.len().saturating_sub(1));
            }
            Err(message) => self.error = Some(message),
        }
    }

    pub fn result_loaded(&mut self, job_id: i64, result: Result<ScanJobResult, String>) {
        if self.result_loading != Some(job_id) {
            debug!(job_id, "ignoring result for a job no longer requested");
            return;
        }
        self.result_loading = None;
        match result {
            Ok(result) => {
                let table = ResultTable::new(artifact_type_label(&result), flatten_scan_result(&result));
                self.result = Some(ResultView {
                    job_id,
                    browser: TableBrowser::new(table),
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

    fn job(id: i64, created_at: &str) -> ScanJob {
        serde_json::from_value(json!({
            "id": id, "data_source_id": 1, "status": "completed", "created_at": created_at
        }))
        .unwrap()
    }

    fn result(job_id: i64) -> ScanJobResult {
        serde_json::from_value(json!({
            "scan_job_id": job_id,
            "metadata_json": "{\"source_type\":\"postgres\",\"objects\":[{\"name\":\"orders\",\"object_type\":\"table\",\"fields\":[{\"name\":\"id\",\"primary_key\":true}]}]}",
            "data_source": "warehouse",
            "scan_timestamp": "2025-01-01T00:00:00Z",
            "databases": []
        }))
        .unwrap()
    }

    #[test]
    fn test_jobs_are_listed_newest_first() {
        let mut screen = HistoryScreen::default();
        screen.jobs_loaded(Ok(vec![job(1, "2025-01-01T00:00:00Z"), job(2, "2025-02-01T00:00:00Z")]));
        assert_eq!(screen.selected_job().map(|j| j.id), Some(2));
    }

    #[test]
    fn test_open_result_and_ask_about_it() {
        let mut screen = HistoryScreen::default();
        screen.jobs_loaded(Ok(vec![job(11, "2025-01-01T00:00:00Z")]));
        let mut out = Vec::new();
        screen.handle_key(key(KeyCode::Enter), &mut out);
        assert!(matches!(out[..], [Command::LoadScanResult { job_id: 11 }]));

        // A second Enter while loading issues nothing
        let mut out = Vec::new();
        screen.handle_key(key(KeyCode::Enter), &mut out);
        assert!(out.is_empty());

        screen.result_loaded(11, Ok(result(11)));
        let view = screen.result.as_ref().unwrap();
        assert_eq!(view.browser.table.label(), "Result");
        assert_eq!(view.browser.table.total_rows(), 1);

        match screen.handle_key(key(KeyCode::Char('a')), &mut out) {
            Nav::Assistant { scan_id, tables } => {
                assert_eq!(scan_id.as_deref(), Some("11"));
                assert_eq!(tables, vec!["orders".to_string()]);
            }
            other => panic!("unexpected navigation {:?}", other),
        }

        assert_eq!(screen.handle_key(key(KeyCode::Esc), &mut out), Nav::Stay);
        assert!(screen.result.is_none());
        assert_eq!(screen.handle_key(key(KeyCode::Esc), &mut out), Nav::Home);
    }

    #[test]
    fn test_failed_result_keeps_list() {
        let mut screen = HistoryScreen::default();
        screen.jobs_loaded(Ok(vec![job(5, "2025-01-01T00:00:00Z")]));
        let mut out = Vec::new();
        screen.handle_key(key(KeyCode::Enter), &mut out);
        screen.result_loaded(5, Err("Scan job not found".into()));
        assert!(screen.result.is_none());
        assert_eq!(screen.error.as_deref(), Some("Scan job not found"));
        assert_eq!(screen.jobs.len(), 1);
    }
}
