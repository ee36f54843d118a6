use crossterm::event::KeyEvent;
use ratatui::prelude::*;

/// Key hint shown in the header, e.g. `<n> new`
#[derive(Debug, Clone)]
pub struct ShortcutInfo {
  pub key: &'static str,
  pub label: &'static str,
  /// Sort order, ascending
  pub priority: u8,
}

impl ShortcutInfo {
  pub const fn new(key: &'static str, label: &'static str) -> Self {
    Self {
      key,
      label,
      priority: 100,
    }
  }

  pub const fn with_priority(mut self, priority: u8) -> Self {
    self.priority = priority;
    self
  }
}

/// Navigation requested by a view
pub enum ViewAction {
  None,
  /// Open a view on top of this one
  Push(Box<dyn View>),
  /// Close this view; closing the root quits
  Pop,
}

/// One screen on the navigation stack.
///
/// A view owns its query observers and mutations. The app ticks every view
/// on the stack so hidden ones keep their cache entries observed, then
/// renders and routes keys to the top one only.
pub trait View {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction;

  fn render(&mut self, frame: &mut Frame, area: Rect);

  /// Footer breadcrumb segment
  fn breadcrumb_label(&self) -> String;

  /// Poll observers and debounced input
  fn tick(&mut self) {}

  /// A text field owns the keyboard, so Tab must not switch entity
  fn is_editing(&self) -> bool {
    false
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new("r", "refresh").with_priority(20),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
  }
}
