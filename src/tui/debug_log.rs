//! Debug log pane showing captured tracing output.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
};

use super::log_capture::LogBuffer;

/// History kept for scrolling, beyond what the capture ring holds.
const MAX_LINES: usize = 1000;

/// Height of the pane when visible.
pub const DEBUG_LOG_HEIGHT: u16 = 8;

/// State for the debug log pane.
pub struct DebugLogState {
    buffer: LogBuffer,
    lines: Vec<String>,
    pub visible: bool,
}

impl DebugLogState {
    pub fn new(buffer: LogBuffer) -> Self {
        Self {
            buffer,
            lines: Vec::new(),
            visible: false,
        }
    }

    /// Pull newly captured lines. Call once per loop iteration.
    pub fn refresh(&mut self) {
        self.lines.extend(self.buffer.drain());
        if self.lines.len() > MAX_LINES {
            let excess = self.lines.len() - MAX_LINES;
            self.lines.drain(..excess);
        }
    }

    pub fn toggle(&mut self) {
        self.visible = !self.visible;
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

/// Render the most recent lines that fit.
pub fn render(area: Rect, buf: &mut Buffer, state: &DebugLogState) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            " Debug Log ",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ));
    let inner = block.inner(area);
    block.render(area, buf);

    if inner.height == 0 {
        return;
    }

    let start = state.lines.len().saturating_sub(inner.height as usize);
    let lines: Vec<Line> = state.lines[start..]
        .iter()
        .map(|line| Line::from(Span::styled(line.clone(), level_style(line))))
        .collect();
    Paragraph::new(lines).render(inner, buf);
}

/// Color by the level tag the fmt layer writes after the timestamp.
fn level_style(line: &str) -> Style {
    let color = if line.contains(" ERROR ") {
        Color::Red
    } else if line.contains(" WARN ") {
        Color::Yellow
    } else if line.contains(" INFO ") {
        Color::Green
    } else {
        Color::DarkGray
    };
    Style::default().fg(color)
}
