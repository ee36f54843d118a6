use crate::ui::renderfns::query_status;
use crate::ui::view::{View, ViewAction};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ternak::query::QueryObserver;
use ternak::resource::{Resource, ResourceClient};

/// All fields of one record
pub struct ResourceDetailView<R: Resource> {
  id: i64,
  record: QueryObserver<R>,
}

impl<R: Resource> ResourceDetailView<R> {
  pub fn new(resource: ResourceClient<R>, id: i64) -> Self {
    Self {
      id,
      record: resource.detail(Some(id)),
    }
  }

  fn lines(record: &R) -> Vec<Line<'static>> {
    let fields = record.fields();
    let width = fields.iter().map(|(label, _)| label.len()).max().unwrap_or(0);

    fields
      .into_iter()
      .map(|(label, value)| {
        Line::from(vec![
          Span::styled(
            format!("{:<width$}  ", label, width = width),
            Style::default().fg(Color::Yellow),
          ),
          Span::raw(value),
        ])
      })
      .collect()
  }
}

impl<R: Resource> View for ResourceDetailView<R> {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('r') => {
        self.record.refetch();
        ViewAction::None
      }
      KeyCode::Char('q') | KeyCode::Esc => ViewAction::Pop,
      _ => ViewAction::None,
    }
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let state = self.record.state();

    let mut title = match state.data() {
      Some(record) => format!(" {} ", record.title()),
      None => format!(" {} #{} ", R::LABEL, self.id),
    };
    let mut border = Color::Blue;
    if let Some((label, color)) = query_status(&state) {
      title.push_str(&format!("[{}] ", label));
      border = color;
    }

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(border));

    let paragraph = match state.data() {
      Some(record) => Paragraph::new(Self::lines(record)),
      None if state.is_error() => Paragraph::new("Failed to load. Press 'r' to retry.")
        .style(Style::default().fg(Color::DarkGray)),
      None => Paragraph::new("Loading...").style(Style::default().fg(Color::DarkGray)),
    };

    frame.render_widget(paragraph.block(block).wrap(Wrap { trim: false }), area);
  }

  fn breadcrumb_label(&self) -> String {
    format!("#{}", self.id)
  }

  fn tick(&mut self) {
    self.record.poll();
  }
}
