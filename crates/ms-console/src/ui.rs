//! UI components for the console

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, List, ListItem, ListState, Paragraph, Row, Table, Wrap},
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::viewmodel::{
    AssistantView, Body, FormView, KeyHint, ListView, LoginView, TableView, ViewModel, WizardContent,
    WizardView,
};

const MAX_CELL_WIDTH: usize = 40;

/// Draw the whole screen
pub fn draw(f: &mut ratatui::Frame, area: Rect, view_model: &ViewModel) {
    let banner_height = if view_model.banner.is_some() { 3 } else { 0 };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),             // Header
            Constraint::Length(banner_height), // Banner
            Constraint::Min(5),                // Body
            Constraint::Length(3),             // Footer
        ])
        .split(area);

    draw_header(f, chunks[0], view_model);
    if let Some(banner) = &view_model.banner {
        let color = if banner.is_error { Color::Red } else { Color::Green };
        let paragraph = Paragraph::new(banner.text.as_str())
            .style(Style::default().fg(color))
            .block(Block::default().borders(Borders::ALL))
            .wrap(Wrap { trim: true });
        f.render_widget(paragraph, chunks[1]);
    }

    match &view_model.body {
        Body::Login(login) => draw_login(f, chunks[2], login),
        Body::Menu(list) | Body::Jobs(list) | Body::DataSources(list) => draw_list(f, chunks[2], list),
        Body::Wizard(wizard) => draw_wizard(f, chunks[2], wizard),
        Body::Table(table) => draw_table(f, chunks[2], table),
        Body::Form(form) => draw_form(f, chunks[2], form),
        Body::Assistant(assistant) => draw_assistant(f, chunks[2], assistant),
    }

    draw_footer(f, chunks[3], &view_model.footer);

    if let Some(message) = &view_model.loading {
        draw_loading(f, chunks[2], message);
    }
}

fn draw_header(f: &mut ratatui::Frame, area: Rect, view_model: &ViewModel) {
    let mut spans = vec![Span::styled(
        view_model.title.clone(),
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    )];
    if let Some(user) = &view_model.user_label {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(user.clone(), Style::default().fg(Color::DarkGray)));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn focused_style(is_focused: bool) -> Style {
    if is_focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    }
}

fn draw_login(f: &mut ratatui::Frame, area: Rect, login: &LoginView) {
    let popup = centered_rect(60, 60, area);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Length(3), Constraint::Min(0)])
        .split(popup);

    let email = Paragraph::new(login.email.as_str()).block(
        Block::default()
            .borders(Borders::ALL)
            .style(focused_style(!login.password_focused))
            .title("Email"),
    );
    f.render_widget(email, chunks[0]);

    let password = Paragraph::new(login.password.as_str()).block(
        Block::default()
            .borders(Borders::ALL)
            .style(focused_style(login.password_focused))
            .title("Password"),
    );
    f.render_widget(password, chunks[1]);
}

fn checkbox_prefix(checked: Option<bool>) -> &'static str {
    match checked {
        Some(true) => "[x] ",
        Some(false) => "[ ] ",
        None => "",
    }
}

fn draw_list(f: &mut ratatui::Frame, area: Rect, view: &ListView) {
    let items: Vec<ListItem> = if view.rows.is_empty() {
        vec![ListItem::new(Span::styled(
            view.empty.clone(),
            Style::default().fg(Color::DarkGray),
        ))]
    } else {
        view.rows
            .iter()
            .map(|row| ListItem::new(format!("{}{}", checkbox_prefix(row.checked), row.text)))
            .collect()
    };

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(view.title.as_str()))
        .highlight_style(
            Style::default()
                .fg(Color::Black)
                .bg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol(">> ");

    let mut state = ListState::default();
    state.select(view.selected);
    f.render_stateful_widget(list, area, &mut state);
}

fn draw_wizard(f: &mut ratatui::Frame, area: Rect, wizard: &WizardView) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(3)])
        .split(area);

    // Stepper
    let mut spans = Vec::new();
    for (i, label) in wizard.steps.iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw(" > "));
        }
        let style = if i == wizard.current {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else if i < wizard.current {
            Style::default().fg(Color::Green)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::styled(format!("{}. {label}", i + 1), style));
    }
    let stepper = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL));
    f.render_widget(stepper, chunks[0]);

    match &wizard.content {
        WizardContent::List(list) => draw_list(f, chunks[1], list),
        WizardContent::Schedule {
            modes,
            input,
            placeholder,
        } => {
            let mut lines = vec![Line::from(
                modes
                    .iter()
                    .flat_map(|(label, active)| {
                        let style = if *active {
                            Style::default().fg(Color::Black).bg(Color::White).add_modifier(Modifier::BOLD)
                        } else {
                            Style::default()
                        };
                        [Span::styled(format!(" {label} "), style), Span::raw("  ")]
                    })
                    .collect::<Vec<_>>(),
            )];
            lines.push(Line::raw(""));
            match input {
                Some(value) if value.is_empty() => lines.push(Line::from(Span::styled(
                    *placeholder,
                    Style::default().fg(Color::DarkGray),
                ))),
                Some(value) => lines.push(Line::raw(value.clone())),
                None => lines.push(Line::raw("The scan starts as soon as it is submitted.")),
            }
            let paragraph =
                Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Schedule"));
            f.render_widget(paragraph, chunks[1]);
        }
        WizardContent::Summary(lines) => {
            let text: Vec<Line> = lines.iter().map(|l| Line::raw(l.clone())).collect();
            let paragraph = Paragraph::new(text)
                .block(Block::default().borders(Borders::ALL).title("Summary"))
                .wrap(Wrap { trim: false });
            f.render_widget(paragraph, chunks[1]);
        }
    }
}

/// Cut `text` to at most `width` columns, marking the cut with an ellipsis
fn truncate(text: &str, width: usize) -> String {
    if text.width() <= width {
        return text.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w + 1 > width {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    out
}

fn draw_table(f: &mut ratatui::Frame, area: Rect, view: &TableView) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(3), Constraint::Length(1)])
        .split(area);

    let search_text = if view.search.is_empty() && !view.searching {
        Span::styled("Press / to search", Style::default().fg(Color::DarkGray))
    } else {
        Span::raw(view.search.clone())
    };
    let search = Paragraph::new(Line::from(vec![
        search_text,
        Span::raw("   "),
        Span::styled(view.filters.clone(), Style::default().fg(Color::DarkGray)),
    ]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .style(focused_style(view.searching))
            .title("Search"),
    );
    f.render_widget(search, chunks[0]);

    // Column widths follow the widest cell, capped
    let mut widths: Vec<usize> = view.headers.iter().map(|h| h.width()).collect();
    for row in &view.rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.width().min(MAX_CELL_WIDTH));
            }
        }
    }
    let constraints: Vec<Constraint> = widths.iter().map(|w| Constraint::Length(*w as u16)).collect();

    let header = Row::new(
        view.headers
            .iter()
            .map(|h| Cell::from(h.clone()).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))),
    );
    let rows: Vec<Row> = if view.rows.is_empty() {
        vec![Row::new(vec![Cell::from("No matching rows")])]
    } else {
        view.rows
            .iter()
            .map(|row| Row::new(row.iter().map(|cell| Cell::from(truncate(cell, MAX_CELL_WIDTH)))))
            .collect()
    };
    let table = Table::new(rows, constraints)
        .header(header)
        .column_spacing(2)
        .block(Block::default().borders(Borders::ALL).title(view.title.as_str()));
    f.render_widget(table, chunks[1]);

    f.render_widget(
        Paragraph::new(view.summary.as_str()).style(Style::default().fg(Color::DarkGray)),
        chunks[2],
    );
}

fn draw_form(f: &mut ratatui::Frame, area: Rect, form: &FormView) {
    let lines: Vec<Line> = form
        .rows
        .iter()
        .map(|row| {
            let label_style = if row.focused {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            let marker = if row.focused { ">> " } else { "   " };
            Line::from(vec![
                Span::styled(format!("{marker}{:<18}", row.label), label_style),
                Span::raw(row.value.clone()),
            ])
        })
        .collect();
    let paragraph = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(form.title.as_str()));
    f.render_widget(paragraph, area);
}

fn draw_assistant(f: &mut ratatui::Frame, area: Rect, view: &AssistantView) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(3)])
        .split(area);

    let mut lines = vec![Line::from(Span::styled(
        view.scope.clone(),
        Style::default().fg(Color::DarkGray),
    ))];
    if let Some(question) = &view.question {
        lines.push(Line::raw(""));
        lines.push(Line::from(vec![
            Span::styled("Q: ", Style::default().fg(Color::Yellow)),
            Span::raw(question.clone()),
        ]));
    }
    if view.pending {
        lines.push(Line::from(Span::styled("Thinking...", Style::default().fg(Color::Yellow))));
    } else if !view.answer.is_empty() {
        lines.push(Line::raw(""));
        lines.extend(view.answer.iter().map(|l| Line::raw(l.clone())));
    }
    let conversation = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Conversation"))
        .wrap(Wrap { trim: false });
    f.render_widget(conversation, chunks[0]);

    let input = Paragraph::new(view.input.as_str()).block(
        Block::default()
            .borders(Borders::ALL)
            .style(Style::default().fg(Color::Cyan))
            .title("Ask a question"),
    );
    f.render_widget(input, chunks[1]);
}

/// Draw the footer with contextual shortcuts
fn draw_footer(f: &mut ratatui::Frame, area: Rect, hints: &[KeyHint]) {
    let colors = [Color::Cyan, Color::Yellow, Color::Green];
    let mut spans = Vec::new();
    for (i, (key, action)) in hints.iter().enumerate() {
        let color = if *key == "Ctrl+C" || *key == "q" {
            Color::Red
        } else {
            colors[i % colors.len()]
        };
        spans.push(Span::styled(*key, Style::default().fg(color)));
        let separator = if i + 1 < hints.len() { " • " } else { "" };
        spans.push(Span::raw(format!(" {action}{separator}")));
    }
    let paragraph = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL));
    f.render_widget(paragraph, area);
}

/// Draw a loading overlay
pub fn draw_loading(f: &mut ratatui::Frame, area: Rect, message: &str) {
    let popup_area = centered_rect(60, 20, area);

    f.render_widget(Clear, popup_area);

    let paragraph = Paragraph::new(message)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Loading")
                .style(Style::default().fg(Color::Yellow)),
        )
        .wrap(Wrap { trim: true });

    f.render_widget(paragraph, popup_area);
}

/// Helper function to create a centered rectangle
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
