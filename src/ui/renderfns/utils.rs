use ratatui::prelude::Color;
use ratatui::widgets::TableState;
use ternak::query::{MutationState, MutationStatus, QueryState, QueryStatus};

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Short status label and color for a query, or `None` when settled and fine
pub fn query_status<T>(state: &QueryState<T>) -> Option<(String, Color)> {
  match state.status {
    QueryStatus::Loading => Some(("loading...".to_string(), Color::Yellow)),
    QueryStatus::Error => Some((
      format!("error: {}", state.error().unwrap_or("unknown")),
      Color::Red,
    )),
    _ if state.is_fetching => Some(("refreshing...".to_string(), Color::DarkGray)),
    _ if state.is_restored => Some(("offline copy".to_string(), Color::Magenta)),
    _ => None,
  }
}

/// Status label and color for the outcome of `verb`, e.g. "create"
pub fn mutation_status<R>(verb: &str, state: &MutationState<R>) -> Option<(String, Color)> {
  match state.status {
    MutationStatus::Idle => None,
    MutationStatus::Pending => Some((format!("{}...", verb), Color::Yellow)),
    MutationStatus::Success => Some((format!("{} ok", verb), Color::Green)),
    MutationStatus::Error => Some((
      format!(
        "{} failed: {}",
        verb,
        state.error.as_ref().map(|e| e.message()).unwrap_or("unknown")
      ),
      Color::Red,
    )),
  }
}

/// Keep the selection inside `len` rows, selecting the first row when
/// rows appear and clearing it when they are gone
pub fn ensure_valid_selection(state: &mut TableState, len: usize) {
  match state.selected() {
    _ if len == 0 => state.select(None),
    Some(i) if i >= len => state.select(Some(len - 1)),
    None => state.select(Some(0)),
    _ => {}
  }
}
