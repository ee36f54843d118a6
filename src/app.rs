use crate::event::{Event, EventHandler};
use crate::ui;
use crate::ui::view::{View, ViewAction};
use crate::ui::views::ResourceListView;
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::sync::Arc;
use std::time::Duration;
use ternak::api::{ApiClient, Transport};
use ternak::config::Config;
use ternak::persist::{NoopPersister, QueryPersister, SqlitePersister};
use ternak::query::QueryClient;
use ternak::resource::{EntityKind, Item, PaymentType, Resource, ResourceClient, Supplier};
use tracing::{info, warn};

const TICK_RATE: Duration = Duration::from_millis(100);

/// Main application state
pub struct App {
  /// Navigation stack - root is always at index 0
  view_stack: Vec<Box<dyn View>>,

  /// Entity shown by the root view
  entity: EntityKind,

  /// Shared cache, kept across entity switches
  client: QueryClient,

  transport: Arc<dyn Transport>,

  /// Header title
  title: String,

  /// Delay before a typed search term is applied
  debounce: Duration,

  /// Whether to quit
  should_quit: bool,
}

impl App {
  pub fn new(config: Config, entity: EntityKind) -> Result<Self> {
    let transport: Arc<dyn Transport> = Arc::new(ApiClient::new(&config)?);

    let persister: Arc<dyn QueryPersister> = if config.cache.persist {
      match SqlitePersister::open() {
        Ok(persister) => Arc::new(persister),
        Err(e) => {
          warn!(error = %e, "Cache snapshot unavailable, continuing without it");
          Arc::new(NoopPersister)
        }
      }
    } else {
      Arc::new(NoopPersister)
    };
    let client = QueryClient::with_persister(config.cache.query_defaults(), persister);

    let mut app = Self {
      view_stack: Vec::new(),
      entity,
      client,
      transport,
      title: config.display_title(),
      debounce: config.cache.debounce(),
      should_quit: false,
    };
    app.view_stack.push(app.root_view(entity));
    Ok(app)
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;

    let result = self.event_loop().await;

    // Cleanup terminal, even when the loop failed
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
  }

  async fn event_loop(&mut self) -> Result<()> {
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    let mut events = EventHandler::new(TICK_RATE);
    info!(entity = ?self.entity, "Started");

    while !self.should_quit {
      for view in self.view_stack.iter_mut() {
        view.tick();
      }

      terminal.draw(|frame| ui::draw(frame, self))?;

      match events.next().await {
        Some(Event::Key(key)) => self.handle_key(key),
        Some(Event::Tick) => {}
        None => break,
      }
    }

    Ok(())
  }

  pub fn title(&self) -> &str {
    &self.title
  }

  pub fn entity(&self) -> EntityKind {
    self.entity
  }

  pub fn current_view(&self) -> Option<&dyn View> {
    self.view_stack.last().map(|v| v.as_ref())
  }

  pub fn current_view_mut(&mut self) -> Option<&mut Box<dyn View>> {
    self.view_stack.last_mut()
  }

  /// Entries currently held by the query cache
  pub fn cached_queries(&self) -> usize {
    self.client.entry_count()
  }

  pub fn breadcrumb(&self) -> Vec<String> {
    self
      .view_stack
      .iter()
      .map(|view| view.breadcrumb_label())
      .collect()
  }

  fn root_view(&self, entity: EntityKind) -> Box<dyn View> {
    match entity {
      EntityKind::Item => self.list_view::<Item>(),
      EntityKind::PaymentType => self.list_view::<PaymentType>(),
      EntityKind::Supplier => self.list_view::<Supplier>(),
    }
  }

  fn list_view<R: Resource>(&self) -> Box<dyn View> {
    let resource = ResourceClient::<R>::new(self.client.clone(), Arc::clone(&self.transport));
    Box::new(ResourceListView::new(resource, self.debounce))
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    let editing = self.current_view().is_some_and(|v| v.is_editing());
    if key.code == KeyCode::Tab && !editing && self.view_stack.len() == 1 {
      self.switch_entity(self.entity.next());
      return;
    }

    let action = match self.view_stack.last_mut() {
      Some(view) => view.handle_key(key),
      None => ViewAction::Pop,
    };
    self.apply(action);
  }

  fn apply(&mut self, action: ViewAction) {
    match action {
      ViewAction::None => {}
      ViewAction::Push(view) => self.view_stack.push(view),
      ViewAction::Pop => {
        if self.view_stack.len() > 1 {
          self.view_stack.pop();
        } else {
          self.should_quit = true;
        }
      }
    }
  }

  /// Replace the root view. Cached data of the old entity stays in the
  /// client until it expires.
  fn switch_entity(&mut self, entity: EntityKind) {
    self.entity = entity;
    self.view_stack = vec![self.root_view(entity)];
  }
}
