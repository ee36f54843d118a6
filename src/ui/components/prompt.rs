use super::input::{InputResult, TextInput};
use super::KeyResult;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

/// What the user answered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptEvent {
  /// Name entered for a new record
  Create(String),
  /// Deletion confirmed for the record with this id
  Delete(i64),
  /// Prompt dismissed
  Cancelled,
}

#[derive(Debug, Clone)]
enum PromptKind {
  Create,
  ConfirmDelete { id: i64, title: String },
}

/// Modal overlay asking for a name or a yes/no confirmation
#[derive(Debug, Clone)]
pub struct Prompt {
  kind: PromptKind,
  input: TextInput,
}

impl Prompt {
  pub fn create() -> Self {
    Self {
      kind: PromptKind::Create,
      input: TextInput::new(),
    }
  }

  pub fn confirm_delete(id: i64, title: impl Into<String>) -> Self {
    Self {
      kind: PromptKind::ConfirmDelete {
        id,
        title: title.into(),
      },
      input: TextInput::new(),
    }
  }

  /// Handle a key event. Every key is consumed while the prompt is open.
  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<PromptEvent> {
    match &self.kind {
      PromptKind::Create => match self.input.handle_key(key) {
        InputResult::Submitted(name) => {
          let name = name.trim();
          if name.is_empty() {
            KeyResult::Handled
          } else {
            KeyResult::Event(PromptEvent::Create(name.to_string()))
          }
        }
        InputResult::Cancelled => KeyResult::Event(PromptEvent::Cancelled),
        InputResult::Consumed | InputResult::NotHandled => KeyResult::Handled,
      },
      PromptKind::ConfirmDelete { id, .. } => match key.code {
        KeyCode::Char('y') | KeyCode::Char('Y') => KeyResult::Event(PromptEvent::Delete(*id)),
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
          KeyResult::Event(PromptEvent::Cancelled)
        }
        _ => KeyResult::Handled,
      },
    }
  }

  /// Render centered over `area`
  pub fn render(&self, frame: &mut Frame, area: Rect) {
    let width = area.width.min(50);
    let height = area.height.min(3);
    let overlay_area = Rect::new(
      area.x + (area.width - width) / 2,
      area.y + (area.height - height) / 2,
      width,
      height,
    );
    frame.render_widget(Clear, overlay_area);

    let (title, line) = match &self.kind {
      PromptKind::Create => (
        " New record ",
        Line::from(vec![
          Span::styled("Name: ", Style::default().fg(Color::DarkGray)),
          Span::raw(self.input.value()),
          Span::styled("_", Style::default().fg(Color::Yellow)),
        ]),
      ),
      PromptKind::ConfirmDelete { title, .. } => (
        " Delete ",
        Line::from(vec![
          Span::raw(format!("Delete \"{}\"? ", title)),
          Span::styled("(y/n)", Style::default().fg(Color::Yellow)),
        ]),
      ),
    };

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow))
      .title(title);
    frame.render_widget(Paragraph::new(line).block(block), overlay_area);
  }
}
