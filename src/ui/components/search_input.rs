use super::input::{InputResult, TextInput};
use super::KeyResult;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use std::time::Duration;
use ternak::debounce::Debounced;

/// Events emitted by search input that parent needs to handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchEvent {
  /// Search submitted (overlay closed, term applied at once)
  Submitted,
  /// Search cancelled (overlay closed, term cleared)
  Cancelled,
}

/// Search input with activation and a debounced search term.
///
/// Keystrokes update the overlay immediately; the term reaches the parent
/// through [`SearchInput::poll_settled`] only after the typing pauses.
pub struct SearchInput {
  input: TextInput,
  active: bool,
  term: Debounced<String>,
}

impl SearchInput {
  pub fn new(delay: Duration) -> Self {
    Self {
      input: TextInput::new(),
      active: false,
      term: Debounced::new(String::new(), delay),
    }
  }

  /// Check if search is currently active
  pub fn is_active(&self) -> bool {
    self.active
  }

  /// Term as typed, before debouncing
  pub fn query(&self) -> &str {
    self.term.immediate()
  }

  /// Activate search mode, keeping the current term for editing
  pub fn activate(&mut self) {
    self.active = true;
  }

  /// A new settled term, if it changed since the last poll.
  /// Call this in the view's tick handler.
  pub fn poll_settled(&mut self) -> Option<String> {
    self.term.poll_settled()
  }

  /// Handle a key event
  /// Call this regardless of active state - it handles activation too
  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<SearchEvent> {
    if !self.active {
      if key.code == KeyCode::Char('/') {
        self.activate();
        return KeyResult::Handled;
      }
      return KeyResult::NotHandled;
    }

    match self.input.handle_key(key) {
      InputResult::Submitted(_) => {
        self.active = false;
        self.term.flush();
        KeyResult::Event(SearchEvent::Submitted)
      }
      InputResult::Cancelled => {
        self.active = false;
        self.input.clear();
        self.term.set(String::new());
        self.term.flush();
        KeyResult::Event(SearchEvent::Cancelled)
      }
      InputResult::Consumed => {
        self.term.set(self.input.value().trim().to_string());
        KeyResult::Handled
      }
      // Swallow everything else while typing
      InputResult::NotHandled => KeyResult::Handled,
    }
  }

  /// Render the search overlay if active
  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    if !self.active {
      return;
    }

    let width = (area.width / 5 * 3).clamp(30, 60).min(area.width);
    let height = 3; // Just input line with borders

    // Position at top-left of content area with small margin
    let overlay_area = Rect::new(area.x + 1, area.y + 1, width, height).intersection(area);

    // Clear the area behind the overlay
    frame.render_widget(Clear, overlay_area);

    let title = if self.term.is_pending() {
      " Search … "
    } else {
      " Search "
    };
    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow))
      .title(title);

    let inner = block.inner(overlay_area);
    frame.render_widget(block, overlay_area);

    if inner.height == 0 {
      return;
    }

    let value = self.input.value();
    let split = value
      .char_indices()
      .nth(self.input.cursor_position())
      .map(|(i, _)| i)
      .unwrap_or(value.len());
    let input_line = Line::from(vec![
      Span::styled("/", Style::default().fg(Color::Yellow)),
      Span::raw(&value[..split]),
      Span::styled("_", Style::default().fg(Color::Yellow)), // Cursor
      Span::raw(&value[split..]),
    ]);
    frame.render_widget(Paragraph::new(input_line), inner);
  }
}
