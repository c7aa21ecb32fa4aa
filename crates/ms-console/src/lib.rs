//! Terminal console for the metascan metadata scanner
//!
//! A Ratatui front end over the metascan REST API: sign in, run the scan
//! wizard, browse and export results, administer data sources and ask the
//! assistant about scanned metadata. The Model/ViewModel/View split keeps
//! all behaviour testable without a terminal.

pub mod app;
pub mod assistant;
pub mod browser;
pub mod config;
pub mod data_sources;
pub mod error;
pub mod event;
pub mod history;
pub mod input;
pub mod model;
pub mod msg;
pub mod runtime;
pub mod scan;
pub mod ui;
pub mod viewmodel;
pub mod wizard;

pub use app::App;
pub use config::{init_logging, Args, ConsoleConfig};
pub use error::{ConsoleError, ConsoleResult};
pub use model::{Banner, Model, Screen};
pub use msg::{Command, Msg, NetMsg};
pub use runtime::{execute, run_to_idle, Runtime};
pub use viewmodel::ViewModel;

use ratatui::{backend::TestBackend, Terminal};

/// Helpers for tests/runners to render with a deterministic backend
pub fn create_test_terminal(width: u16, height: u16) -> Terminal<TestBackend> {
    let backend = TestBackend::new(width, height);
    Terminal::new(backend).expect("test terminal")
}
