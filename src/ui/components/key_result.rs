/// What a component did with a key press.
///
/// Parents try their overlays in order and fall through to their own
/// bindings only on `NotHandled`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyResult<T> {
  /// Consumed with nothing to report
  Handled,
  /// Consumed; the parent must act on the event
  Event(T),
  /// Not for this component
  NotHandled,
}

impl<T> KeyResult<T> {
  /// Whether the key should stop propagating
  pub fn is_consumed(&self) -> bool {
    !matches!(self, KeyResult::NotHandled)
  }
}
