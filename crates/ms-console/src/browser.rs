//! Keyboard driver for a [`ResultTable`]

use crossterm::event::{KeyCode, KeyEvent};
use ms_artifacts::{Column, ExportFormat, ResultTable};

use crate::input::Input;
use crate::msg::Command;

/// What a key did to the browser
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserKey {
    Handled,
    Close,
    /// Open the assistant scoped to this table
    Ask,
}

#[derive(Debug, Clone)]
pub struct TableBrowser {
    pub table: ResultTable,
    pub search: Input,
    pub searching: bool,
}

impl TableBrowser {
    pub fn new(table: ResultTable) -> Self {
        Self {
            table,
            search: Input::default(),
            searching: false,
        }
    }

    /// Distinct container names, in row order
    pub fn table_names(&self) -> Vec<String> {
        ms_artifacts::group_by_table(&self.table.view_rows().into_iter().cloned().collect::<Vec<_>>())
            .into_iter()
            .map(|(table, _)| table)
            .collect()
    }

    pub fn handle_key(&mut self, key: KeyEvent, out: &mut Vec<Command>) -> BrowserKey {
        if self.searching {
            match key.code {
                KeyCode::Enter | KeyCode::Esc => self.searching = false,
                _ => {
                    if self.search.handle_key(key) {
                        self.table.set_search(self.search.value());
                    }
                }
            }
            return BrowserKey::Handled;
        }

        match key.code {
            KeyCode::Esc | KeyCode::Backspace => return BrowserKey::Close,
            KeyCode::Char('a') => return BrowserKey::Ask,
            KeyCode::Char('/') => self.searching = true,
            KeyCode::Char('n') => {
                let enabled = !self.table.nullable_only();
                self.table.set_nullable_only(enabled);
            }
            KeyCode::Char('k') => {
                let enabled = !self.table.primary_key_only();
                self.table.set_primary_key_only(enabled);
            }
            KeyCode::Char('r') => {
                let options = ms_artifacts::table::ROWS_PER_PAGE_OPTIONS;
                let current = options
                    .iter()
                    .position(|n| *n == self.table.rows_per_page())
                    .unwrap_or(0);
                self.table.set_rows_per_page(options[(current + 1) % options.len()]);
            }
            KeyCode::Char(c @ '1'..='7') => {
                let slot = c as usize - '1' as usize + 1;
                if let Some(column) = self.column_at(slot).filter(|c| self.table.is_visible(*c)) {
                    self.table.toggle_sort(column);
                }
            }
            KeyCode::F(n @ 1..=7) => {
                if let Some(column) = self.column_at(n as usize) {
                    self.table.toggle_column(column);
                }
            }
            KeyCode::Left => self.table.prev_page(),
            KeyCode::Right => self.table.next_page(),
            KeyCode::Char('x') => self.export(ExportFormat::Csv, out),
            KeyCode::Char('j') => self.export(ExportFormat::Json, out),
            KeyCode::Char('p') => self.export(ExportFormat::Pdf, out),
            _ => {}
        }
        BrowserKey::Handled
    }

    /// Column bound to shortcut slot `slot` (1-based). Slots follow the
    /// available columns so they do not shift when a column is hidden.
    pub fn column_at(&self, slot: usize) -> Option<Column> {
        slot.checked_sub(1)
            .and_then(|i| self.table.available_columns().get(i).copied())
    }

    fn export(&self, format: ExportFormat, out: &mut Vec<Command>) {
        out.push(Command::Export {
            format,
            table: self.table.clone(),
        });
    }
}
