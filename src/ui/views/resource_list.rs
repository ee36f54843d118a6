use crate::ui::components::{KeyResult, Prompt, PromptEvent, SearchInput};
use crate::ui::renderfns::{ensure_valid_selection, mutation_status, query_status, truncate};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::views::ResourceDetailView;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Row, Table, TableState};
use serde_json::Value;
use std::time::Duration;
use ternak::query::{Mutation, QueryObserver};
use ternak::resource::{ListPage, Resource, ResourceClient};

const CELL_WIDTH: usize = 40;

/// The write whose outcome the title bar reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LastWrite {
  Create,
  Delete,
}

/// Searchable table of one entity, with create and delete
pub struct ResourceListView<R: Resource> {
  resource: ResourceClient<R>,
  list: QueryObserver<ListPage<R>>,
  table_state: TableState,
  search: SearchInput,
  prompt: Option<Prompt>,
  create: Mutation<Value, R>,
  delete: Mutation<i64, ()>,
  last_write: Option<LastWrite>,
}

impl<R: Resource> ResourceListView<R> {
  pub fn new(resource: ResourceClient<R>, debounce: Duration) -> Self {
    let list = resource.list("");
    let create = resource.create();
    let delete = resource.delete();

    Self {
      resource,
      list,
      table_state: TableState::default(),
      search: SearchInput::new(debounce),
      prompt: None,
      create,
      delete,
      last_write: None,
    }
  }

  fn selected_row(&self) -> Option<R> {
    let idx = self.table_state.selected()?;
    self.list.data()?.rows.get(idx).cloned()
  }

  fn title(&self) -> String {
    let state = self.list.state();
    let mut title = format!(" {}", R::LABEL);

    let term = self.search.query();
    if !term.is_empty() {
      title.push_str(&format!(" /{}", term));
    }

    if let Some(page) = state.data() {
      title.push_str(&format!(" ({} of {})", page.len(), page.total));
    }

    let write_status = match self.last_write {
      Some(LastWrite::Create) => mutation_status("create", &self.create.state()),
      Some(LastWrite::Delete) => mutation_status("delete", &self.delete.state()),
      None => None,
    };
    if let Some((label, _)) = query_status(&state).or(write_status) {
      title.push_str(&format!(" [{}]", label));
    }

    title.push(' ');
    title
  }

  fn render_table(&mut self, frame: &mut Frame, area: Rect) {
    let state = self.list.state();
    let rows = state.data().map(|page| page.rows.as_slice()).unwrap_or(&[]);
    ensure_valid_selection(&mut self.table_state, rows.len());

    let border = if state.is_error() {
      Color::Red
    } else {
      Color::Blue
    };
    let block = Block::default()
      .title(self.title())
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(border));

    if rows.is_empty() {
      let content = if state.is_loading() {
        "Loading..."
      } else if state.is_error() {
        "Failed to load. Press 'r' to retry."
      } else if self.search.query().is_empty() {
        "Nothing here yet. Press 'n' to add one."
      } else {
        "No matches."
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let header = Row::new(R::COLUMNS.iter().copied())
      .style(Style::default().fg(Color::Yellow).bold());

    let table_rows: Vec<Row> = rows
      .iter()
      .map(|row| {
        let cells = row.cells().into_iter().map(|c| truncate(&c, CELL_WIDTH));
        Row::new(cells)
      })
      .collect();

    let widths = vec![Constraint::Fill(1); R::COLUMNS.len()];
    let table = Table::new(table_rows, widths)
      .header(header)
      .block(block)
      .row_highlight_style(
        Style::default()
          .bg(Color::DarkGray)
          .add_modifier(Modifier::BOLD),
      )
      .highlight_symbol("> ");

    frame.render_stateful_widget(table, area, &mut self.table_state);
  }

  // Key handling helpers for or_else chain pattern
  fn handle_prompt(&mut self, key: KeyEvent) -> Option<ViewAction> {
    let prompt = self.prompt.as_mut()?;
    match prompt.handle_key(key) {
      KeyResult::Handled | KeyResult::NotHandled => {}
      KeyResult::Event(PromptEvent::Create(name)) => {
        self.prompt = None;
        self.last_write = Some(LastWrite::Create);
        self.create.spawn(R::create_body(&name));
      }
      KeyResult::Event(PromptEvent::Delete(id)) => {
        self.prompt = None;
        self.last_write = Some(LastWrite::Delete);
        self.delete.spawn(id);
      }
      KeyResult::Event(PromptEvent::Cancelled) => self.prompt = None,
    }
    Some(ViewAction::None)
  }

  fn handle_search(&mut self, key: KeyEvent) -> Option<ViewAction> {
    // The settled term reaches the list on the next tick
    self.search.handle_key(key).consumed().then_some(ViewAction::None)
  }

  fn handle_navigation(&mut self, key: KeyEvent) -> Option<ViewAction> {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => {
        self.table_state.select_next();
        Some(ViewAction::None)
      }
      KeyCode::Char('k') | KeyCode::Up => {
        self.table_state.select_previous();
        Some(ViewAction::None)
      }
      _ => None,
    }
  }

  fn handle_actions(&mut self, key: KeyEvent) -> Option<ViewAction> {
    match key.code {
      KeyCode::Char('r') => {
        self.list.refetch();
        Some(ViewAction::None)
      }
      KeyCode::Char('n') => {
        self.prompt = Some(Prompt::create());
        Some(ViewAction::None)
      }
      KeyCode::Char('d') => {
        let row = self.selected_row()?;
        let id = row.id()?;
        self.prompt = Some(Prompt::confirm_delete(id, row.title()));
        Some(ViewAction::None)
      }
      KeyCode::Enter => {
        let id = self.selected_row()?.id()?;
        Some(ViewAction::Push(Box::new(ResourceDetailView::new(
          self.resource.clone(),
          id,
        ))))
      }
      KeyCode::Char('q') | KeyCode::Esc => Some(ViewAction::Pop),
      _ => None,
    }
  }
}

impl<R: Resource> View for ResourceListView<R> {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    self
      .handle_prompt(key)
      .or_else(|| self.handle_search(key))
      .or_else(|| self.handle_navigation(key))
      .or_else(|| self.handle_actions(key))
      .unwrap_or(ViewAction::None)
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_table(frame, area);
    self.search.render_overlay(frame, area);
    if let Some(prompt) = &self.prompt {
      prompt.render(frame, area);
    }
  }

  fn breadcrumb_label(&self) -> String {
    R::LABEL.to_string()
  }

  fn tick(&mut self) {
    if let Some(term) = self.search.poll_settled() {
      self.resource.search(&mut self.list, &term);
    }
    self.list.poll();
  }

  fn is_editing(&self) -> bool {
    self.search.is_active() || self.prompt.is_some()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new("/", "search").with_priority(10),
      ShortcutInfo::new("r", "refresh").with_priority(20),
      ShortcutInfo::new("n", "new").with_priority(30),
      ShortcutInfo::new("d", "delete").with_priority(40),
      ShortcutInfo::new("enter", "open").with_priority(50),
      ShortcutInfo::new("tab", "entity").with_priority(60),
      ShortcutInfo::new("q", "quit").with_priority(90),
    ]
  }
}
