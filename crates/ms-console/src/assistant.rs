//! AI assistant panel state
//!
//! Questions go to the RAG endpoint first and fall back to the agentic ask
//! endpoint when RAG has nothing to say. Only the most recent question may
//! produce an answer: asking again cancels the request in flight.

use crossterm::event::{KeyCode, KeyEvent};
use ms_rest_api_contract::validation::{validate_ask_request, validate_rag_request};
use ms_rest_api_contract::{AiAskRequest, RagQueryRequest, RagSourceRef};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::input::Input;
use crate::msg::Command;

/// Largest number of tables a question can be scoped to
pub const MAX_SCOPE_TABLES: usize = 50;

/// A question ready to be sent
#[derive(Debug, Clone)]
pub struct AssistantRequest {
    pub id: u64,
    pub rag: RagQueryRequest,
    pub ask: AiAskRequest,
    pub cancel: CancellationToken,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssistantAnswer {
    Rag {
        answer: String,
        sources: Vec<RagSourceRef>,
    },
    Agent {
        answer: String,
        context_summary: Option<String>,
    },
}

impl AssistantAnswer {
    pub fn text(&self) -> &str {
        match self {
            AssistantAnswer::Rag { answer, .. } | AssistantAnswer::Agent { answer, .. } => answer,
        }
    }
}

/// Request bookkeeping: id allocation and the single in-flight slot
#[derive(Debug, Default)]
pub struct AssistantState {
    next_id: u64,
    in_flight: Option<(u64, CancellationToken)>,
}

impl AssistantState {
    pub fn is_pending(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Prepare a request for `question` scoped to a scan.
    ///
    /// Returns `Ok(None)` for a blank question. Validation failures are
    /// returned before anything in flight is touched.
    pub fn ask(
        &mut self,
        question: &str,
        scan_id: Option<&str>,
        scope_tables: &[String],
    ) -> Result<Option<AssistantRequest>, String> {
        let question = question.trim();
        if question.is_empty() {
            return Ok(None);
        }

        let rag = RagQueryRequest::new(question);
        let mut ask = AiAskRequest::new(question);
        ask.scan_id = scan_id.map(str::to_string);
        if !scope_tables.is_empty() {
            ask.scope_tables = Some(scope_tables.to_vec());
        }
        validate_rag_request(&rag).map_err(|e| e.first_message())?;
        validate_ask_request(&ask).map_err(|e| e.first_message())?;

        self.cancel();
        self.next_id += 1;
        let cancel = CancellationToken::new();
        self.in_flight = Some((self.next_id, cancel.clone()));
        debug!(request_id = self.next_id, "assistant question issued");

        Ok(Some(AssistantRequest {
            id: self.next_id,
            rag,
            ask,
            cancel,
        }))
    }

    /// Settle request `id`; false when it is no longer the latest one
    pub fn finish(&mut self, id: u64) -> bool {
        match &self.in_flight {
            Some((current, _)) if *current == id => {
                self.in_flight = None;
                true
            }
            _ => {
                debug!(request_id = id, "ignoring stale assistant answer");
                false
            }
        }
    }

    pub fn cancel(&mut self) {
        if let Some((id, token)) = self.in_flight.take() {
            debug!(request_id = id, "cancelling assistant question");
            token.cancel();
        }
    }
}

/// The assistant screen
#[derive(Debug, Default)]
pub struct AssistantScreen {
    pub input: Input,
    pub state: AssistantState,
    pub question: Option<String>,
    pub answer: Option<AssistantAnswer>,
    pub error: Option<String>,
    pub scan_id: Option<String>,
    pub scope_tables: Vec<String>,
}

impl AssistantScreen {
    /// Scope following questions to a scan and some of its tables
    pub fn set_scope(&mut self, scan_id: Option<String>, mut tables: Vec<String>) {
        tables.truncate(MAX_SCOPE_TABLES);
        self.scan_id = scan_id;
        self.scope_tables = tables;
    }

    pub fn reset(&mut self) {
        self.state.cancel();
        *self = Self::default();
    }

    /// Returns true when the key asks to leave the screen
    pub fn handle_key(&mut self, key: KeyEvent, out: &mut Vec<Command>) -> bool {
        match key.code {
            KeyCode::Esc => return true,
            KeyCode::Enter => self.submit(out),
            _ => {
                self.input.handle_key(key);
            }
        }
        false
    }

    fn submit(&mut self, out: &mut Vec<Command>) {
        let scope = self.scope_tables.clone();
        match self.state.ask(self.input.value(), self.scan_id.as_deref(), &scope) {
            Ok(Some(request)) => {
                self.question = Some(request.rag.question.clone());
                self.answer = None;
                self.error = None;
                self.input.clear();
                out.push(Command::Ask(request));
            }
            Ok(None) => {}
            Err(message) => self.error = Some(message),
        }
    }

    pub fn answered(&mut self, request_id: u64, result: Result<AssistantAnswer, String>) {
        if !self.state.finish(request_id) {
            return;
        }
        match result {
            Ok(answer) => self.answer = Some(answer),
            Err(message) => self.error = Some(message),
        }
    }
}
