//! Event handling for the console
//!
//! Terminal input, ticks and command results all arrive on one channel so
//! the app loop has a single place to wait.

use std::time::Duration;

use crossterm::event::{self, Event as CrosstermEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::msg::Msg;

const TICK_RATE: Duration = Duration::from_millis(250);
const POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Event handler for managing the event loop
pub struct EventHandler {
    sender: mpsc::UnboundedSender<Msg>,
    receiver: mpsc::UnboundedReceiver<Msg>,
    cancellation_token: CancellationToken,
}

impl EventHandler {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Sender for posting messages from other tasks
    pub fn sender(&self) -> mpsc::UnboundedSender<Msg> {
        self.sender.clone()
    }

    /// Start the input reader and the ticker
    pub fn run(&self) {
        let sender = self.sender.clone();
        let token = self.cancellation_token.clone();
        tokio::task::spawn_blocking(move || Self::input_loop(sender, token));

        let sender = self.sender.clone();
        let token = self.cancellation_token.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK_RATE);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        if sender.send(Msg::Tick).is_err() {
                            break;
                        }
                    }
                }
            }
        });
    }

    /// Get the next message
    pub async fn next(&mut self) -> Option<Msg> {
        self.receiver.recv().await
    }

    /// Stop the input reader and the ticker
    pub fn cancel(&self) {
        self.cancellation_token.cancel();
    }

    fn input_loop(sender: mpsc::UnboundedSender<Msg>, token: CancellationToken) {
        while !token.is_cancelled() {
            match event::poll(POLL_TIMEOUT) {
                Ok(false) => continue,
                Ok(true) => {}
                Err(e) => {
                    error!(error = %e, "terminal poll failed");
                    let _ = sender.send(Msg::Quit);
                    break;
                }
            }
            let msg = match event::read() {
                Ok(evt) if Self::should_quit(&evt) => Msg::Quit,
                Ok(CrosstermEvent::Key(key)) if key.kind != KeyEventKind::Press => continue,
                Ok(evt) => Msg::from(evt),
                Err(e) => {
                    error!(error = %e, "terminal read failed");
                    Msg::Quit
                }
            };
            if sender.send(msg).is_err() {
                break;
            }
        }
    }

    fn should_quit(event: &CrosstermEvent) -> bool {
        matches!(
            event,
            CrosstermEvent::Key(KeyEvent {
                code: KeyCode::Char('c'),
                modifiers: KeyModifiers::CONTROL,
                ..
            })
        )
    }
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::new()
    }
}
