/// What a component did with a key.
///
/// Views try their overlays first (prompt, search box) and fall through to
/// their own bindings only on `NotHandled`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyResult<T> {
  /// Consumed, nothing for the view to do
  Handled,
  /// Consumed, and the view must act on this event
  Event(T),
  /// Not ours, try the next handler
  NotHandled,
}

impl<T> KeyResult<T> {
  /// True unless the key should fall through
  pub fn consumed(&self) -> bool {
    !matches!(self, KeyResult::NotHandled)
  }
}
