//! Main console application loop

use std::io::{self, stdout};
use std::sync::Arc;

use crossterm::{
    cursor::Show,
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ms_client_api::{ClientApi, SessionContext};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{info, warn};

use crate::config::ConsoleConfig;
use crate::error::ConsoleResult;
use crate::event::EventHandler;
use crate::model::Model;
use crate::runtime::Runtime;
use crate::ui;
use crate::viewmodel::ViewModel;

/// Main console application
pub struct App {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
    event_handler: EventHandler,
    runtime: Runtime,
    model: Model,
}

impl App {
    /// Set up the terminal and wire the model to `client`.
    ///
    /// `session` must be the one `client` authenticates with.
    pub fn new(
        config: &ConsoleConfig,
        client: Arc<dyn ClientApi>,
        session: SessionContext,
    ) -> ConsoleResult<Self> {
        enable_raw_mode()?;
        let mut stdout = stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        let event_handler = EventHandler::new();
        let runtime = Runtime::new(
            client,
            session.clone(),
            config.export_dir.clone(),
            event_handler.sender(),
        );

        Ok(Self {
            terminal,
            event_handler,
            runtime,
            model: Model::new(session),
        })
    }

    /// Run until the user quits
    pub async fn run(&mut self) -> ConsoleResult<()> {
        self.event_handler.run();
        let commands = self.model.start();
        self.runtime.dispatch(commands);
        info!(screen = ?self.model.screen, "console started");

        while !self.model.should_quit {
            let view_model = ViewModel::from_model(&self.model);
            self.terminal.draw(|f| ui::draw(f, f.area(), &view_model))?;

            let Some(msg) = self.event_handler.next().await else {
                warn!("event channel closed");
                break;
            };
            let commands = self.model.update(msg);
            self.runtime.dispatch(commands);
        }

        self.event_handler.cancel();
        info!("console stopped");
        Ok(())
    }
}

impl Drop for App {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(self.terminal.backend_mut(), LeaveAlternateScreen, Show);
        let _ = self.terminal.show_cursor();
    }
}
