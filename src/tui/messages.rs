//! Messages pane: the engine's view, own messages framed on the right.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Widget},
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::engine::{Phase, Snapshot};
use crate::models::Message;
use crate::session::Identity;

/// Scroll state for the messages pane.
#[derive(Default)]
pub struct MessagesState {
    /// Lines scrolled up from the newest message (0 = follow the bottom).
    pub scroll_offset: usize,
}

impl MessagesState {
    pub fn scroll_up(&mut self, n: usize) {
        self.scroll_offset = self.scroll_offset.saturating_add(n);
    }

    pub fn scroll_down(&mut self, n: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(n);
    }

    /// Jump back to the newest messages.
    pub fn follow(&mut self) {
        self.scroll_offset = 0;
    }
}

/// Render the messages pane into the given area.
pub fn render(
    area: Rect,
    buf: &mut Buffer,
    snapshot: &Snapshot,
    identity: &Identity,
    state: &MessagesState,
) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Plain)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            " Chat ",
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ));
    let inner = block.inner(area);
    block.render(area, buf);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let placeholder = match snapshot.phase {
        Phase::Loading => Some("Loading..."),
        Phase::Ready if snapshot.messages.is_empty() => Some("No messages yet"),
        Phase::Ready => None,
    };
    if let Some(text) = placeholder {
        let line = Line::from(Span::styled(
            format!(" {}", text),
            Style::default().fg(Color::DarkGray),
        ));
        Paragraph::new(line).render(inner, buf);
        return;
    }

    let lines = build_lines(&snapshot.messages, identity, inner.width as usize);
    let (start, end) = visible_range(lines.len(), inner.height as usize, state.scroll_offset);
    for (row, line) in lines[start..end].iter().enumerate() {
        let line_area = Rect::new(inner.x, inner.y + row as u16, inner.width, 1);
        Paragraph::new(line.clone()).render(line_area, buf);
    }

    if start > 0 {
        let cell = &mut buf[(inner.x + inner.width - 1, inner.y)];
        cell.set_char('^');
        cell.set_style(Style::default().fg(Color::DarkGray));
    }
}

/// Window `[start, end)` of `total` lines showing `height` rows, `offset`
/// rows above the bottom. The offset is clamped to the available history.
fn visible_range(total: usize, height: usize, offset: usize) -> (usize, usize) {
    let max_offset = total.saturating_sub(height);
    let end = total - offset.min(max_offset);
    (end.saturating_sub(height), end)
}

/// Lay out every message as a header line plus wrapped text, own messages
/// right-aligned, with a blank line between messages.
fn build_lines(messages: &[Message], identity: &Identity, width: usize) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    // Bubbles use at most three quarters of the pane so sides stay distinct.
    let bubble = (width * 3 / 4).max(10).min(width);

    for (i, msg) in messages.iter().enumerate() {
        if i > 0 {
            lines.push(Line::from(""));
        }
        let own = identity.owns(msg);
        let name_style = if own {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD)
        };
        let text_style = if own {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default().fg(Color::Gray)
        };

        let time = msg.display_time();
        let header_width = msg.username.width() + 2 + time.width();
        lines.push(align(
            vec![
                Span::styled(msg.username.clone(), name_style),
                Span::raw("  "),
                Span::styled(time, Style::default().fg(Color::DarkGray)),
            ],
            header_width,
            width,
            own,
        ));

        for row in wrap_text(&msg.text, bubble) {
            let row_width = row.width();
            lines.push(align(
                vec![Span::styled(row, text_style)],
                row_width,
                width,
                own,
            ));
        }
    }

    lines
}

/// Indent own lines so they end at the right edge.
fn align(mut spans: Vec<Span<'static>>, used: usize, width: usize, own: bool) -> Line<'static> {
    if own {
        let pad = width.saturating_sub(used + 1);
        spans.insert(0, Span::raw(" ".repeat(pad)));
    } else {
        spans.insert(0, Span::raw(" "));
    }
    Line::from(spans)
}

/// Word-wrap by display width. Words wider than the line are split.
fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    let max_width = max_width.max(1);
    let mut rows = Vec::new();

    for paragraph in text.lines() {
        let mut current = String::new();
        let mut current_width = 0;

        for word in paragraph.split_whitespace() {
            let word_width = word.width();
            let gap = usize::from(!current.is_empty());

            if current_width + gap + word_width <= max_width {
                if gap == 1 {
                    current.push(' ');
                }
                current.push_str(word);
                current_width += gap + word_width;
                continue;
            }

            if !current.is_empty() {
                rows.push(std::mem::take(&mut current));
                current_width = 0;
            }

            for c in word.chars() {
                let w = c.width().unwrap_or(0);
                if current_width + w > max_width && !current.is_empty() {
                    rows.push(std::mem::take(&mut current));
                    current_width = 0;
                }
                current.push(c);
                current_width += w;
            }
        }

        rows.push(current);
    }

    rows
}
