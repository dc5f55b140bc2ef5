//! UI rendering for the TUI

use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use super::app::App;
use super::compose;
use super::debug_log;
use super::messages;

/// Main render function
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    let debug_height = if app.debug_log.visible {
        debug_log::DEBUG_LOG_HEIGHT
    } else {
        0
    };

    // header | messages | compose | debug log (optional) | status
    let [header_area, messages_area, compose_area, debug_area, status_area] =
        Layout::vertical([
            Constraint::Length(1),
            Constraint::Fill(1),
            Constraint::Length(compose::COMPOSE_HEIGHT),
            Constraint::Length(debug_height),
            Constraint::Length(1),
        ])
        .areas(area);

    render_header(header_area, frame.buffer_mut(), app);
    messages::render(
        messages_area,
        frame.buffer_mut(),
        &app.snapshot,
        &app.identity,
        &app.messages,
    );
    compose::render(compose_area, frame, &app.compose, app.needs_name());
    if app.debug_log.visible {
        debug_log::render(debug_area, frame.buffer_mut(), &app.debug_log);
    }
    render_status(status_area, frame.buffer_mut(), app);
}

/// Title on the left, current username on the right.
fn render_header(area: Rect, buf: &mut Buffer, app: &App) {
    let title = " pollchat";
    let who = if app.needs_name() {
        " (no name yet) ".to_string()
    } else {
        format!(" You: {} ", app.identity.get())
    };

    let padding = (area.width as usize).saturating_sub(title.width() + who.width());
    let line = Line::from(vec![
        Span::styled(
            title,
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" ".repeat(padding)),
        Span::styled(who, Style::default().fg(Color::Cyan)),
    ]);

    Paragraph::new(line)
        .style(Style::default().bg(Color::DarkGray))
        .render(area, buf);
}

/// Refresh health, store address and key hints.
///
/// A failing refresh only changes this line; the message view stays as it
/// was.
fn render_status(area: Rect, buf: &mut Buffer, app: &App) {
    let (symbol, label, color) = match &app.snapshot.last_error {
        Some(_) => ("o", "refresh failing".to_string(), Color::Red),
        None => ("*", format!("{} messages", app.snapshot.messages.len()), Color::Green),
    };

    let sep = Span::styled(" | ", Style::default().fg(Color::Gray));
    let line = Line::from(vec![
        Span::styled(format!(" {} {} ", symbol, label), Style::default().fg(color)),
        sep.clone(),
        Span::styled(app.store.clone(), Style::default().fg(Color::Yellow)),
        sep.clone(),
        Span::styled("Enter: send", Style::default().fg(Color::Gray)),
        sep.clone(),
        Span::styled("PgUp/PgDn: scroll", Style::default().fg(Color::Gray)),
        sep.clone(),
        Span::styled("F2: log", Style::default().fg(Color::Gray)),
        sep,
        Span::styled("Esc: quit", Style::default().fg(Color::Gray)),
    ]);

    Paragraph::new(line)
        .style(Style::default().bg(Color::DarkGray))
        .render(area, buf);
}
