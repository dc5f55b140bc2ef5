//! Compose box: single-line input used first for the username prompt, then
//! for messages.

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph},
    Frame,
};
use unicode_width::UnicodeWidthChar;

/// Height of the compose box: border + input line + border.
pub const COMPOSE_HEIGHT: u16 = 3;

/// State for the compose box.
#[derive(Default)]
pub struct ComposeState {
    /// Current input text.
    pub input: String,
    /// Cursor position (character offset into `input`).
    pub cursor_pos: usize,
}

impl ComposeState {
    /// Insert a character at the cursor.
    pub fn insert_char(&mut self, c: char) {
        let at = self.byte_offset(self.cursor_pos);
        self.input.insert(at, c);
        self.cursor_pos += 1;
    }

    /// Delete the character before the cursor.
    pub fn backspace(&mut self) {
        if self.cursor_pos == 0 {
            return;
        }
        let start = self.byte_offset(self.cursor_pos - 1);
        let end = self.byte_offset(self.cursor_pos);
        self.input.replace_range(start..end, "");
        self.cursor_pos -= 1;
    }

    /// Delete the character under the cursor.
    pub fn delete(&mut self) {
        if self.cursor_pos >= self.char_count() {
            return;
        }
        let start = self.byte_offset(self.cursor_pos);
        let end = self.byte_offset(self.cursor_pos + 1);
        self.input.replace_range(start..end, "");
    }

    pub fn move_left(&mut self) {
        self.cursor_pos = self.cursor_pos.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        self.cursor_pos = (self.cursor_pos + 1).min(self.char_count());
    }

    pub fn move_home(&mut self) {
        self.cursor_pos = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor_pos = self.char_count();
    }

    /// Clear all input (Ctrl+U).
    pub fn clear(&mut self) {
        self.input.clear();
        self.cursor_pos = 0;
    }

    /// Take the trimmed input and clear the box.
    /// Blank input stays in place and yields None.
    pub fn take(&mut self) -> Option<String> {
        let text = self.input.trim();
        if text.is_empty() {
            return None;
        }
        let text = text.to_string();
        self.clear();
        Some(text)
    }

    fn char_count(&self) -> usize {
        self.input.chars().count()
    }

    fn byte_offset(&self, char_pos: usize) -> usize {
        self.input
            .char_indices()
            .nth(char_pos)
            .map_or(self.input.len(), |(i, _)| i)
    }
}

/// Render the compose box. `prompt_for_name` switches placeholder and title.
pub fn render(area: Rect, frame: &mut Frame, state: &ComposeState, prompt_for_name: bool) {
    let (title, placeholder) = if prompt_for_name {
        (" Your name ", "Enter your name and press Enter...")
    } else {
        (" Message ", "Type a message...")
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Double)
        .border_style(Style::default().fg(Color::Yellow))
        .title(Span::styled(title, Style::default().fg(Color::Cyan)));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if inner.width < 2 || inner.height == 0 {
        return;
    }

    let input_area = Rect::new(inner.x, inner.y, inner.width, 1);
    let avail = input_area.width.saturating_sub(1) as usize;

    if state.input.is_empty() {
        let line = Line::from(Span::styled(
            format!(" {}", placeholder),
            Style::default().fg(Color::DarkGray),
        ));
        frame.render_widget(Paragraph::new(line), input_area);
        frame.set_cursor_position((input_area.x + 1, input_area.y));
        return;
    }

    let (visible, cursor_col) = visible_window(&state.input, state.cursor_pos, avail);
    let line = Line::from(Span::styled(
        format!(" {}", visible),
        Style::default().fg(Color::White),
    ));
    frame.render_widget(Paragraph::new(line), input_area);
    frame.set_cursor_position((input_area.x + 1 + cursor_col as u16, input_area.y));
}

/// Slice of `input` that fits `width` columns with the cursor kept in view,
/// and the cursor's column within that slice.
fn visible_window(input: &str, cursor_pos: usize, width: usize) -> (String, usize) {
    if width == 0 {
        return (String::new(), 0);
    }

    let chars: Vec<char> = input.chars().collect();
    let cursor_pos = cursor_pos.min(chars.len());

    // Walk left from the cursor until the window is full.
    let mut start = cursor_pos;
    let mut used = 1; // room for the cursor cell itself
    while start > 0 {
        let w = chars[start - 1].width().unwrap_or(0);
        if used + w > width {
            break;
        }
        used += w;
        start -= 1;
    }

    let cursor_col: usize = chars[start..cursor_pos]
        .iter()
        .map(|c| c.width().unwrap_or(0))
        .sum();

    let mut visible = String::new();
    let mut cols = 0;
    for &c in &chars[start..] {
        let w = c.width().unwrap_or(0);
        if cols + w > width {
            break;
        }
        cols += w;
        visible.push(c);
    }

    (visible, cursor_col)
}
