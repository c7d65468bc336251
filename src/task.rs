//! Background work whose result is picked up on the UI tick.
//!
//! ```ignore
//! let api = api.clone();
//! let mut save = Task::spawn(async move { api.update_record(&id, patch).await });
//!
//! // In event loop tick
//! if let Some(result) = save.poll() {
//!     // show a toast, close the form, ...
//! }
//! ```

use std::future::Future;
use tokio::sync::oneshot;
use tracing::warn;

/// Handle to a spawned future, polled without blocking.
///
/// Dropping the handle does not cancel the work; the result is discarded.
#[derive(Debug)]
pub struct Task<T> {
  receiver: Option<oneshot::Receiver<T>>,
}

impl<T> Default for Task<T> {
  fn default() -> Self {
    Self { receiver: None }
  }
}

impl<T: Send + 'static> Task<T> {
  /// A task that is not running
  pub fn idle() -> Self {
    Self::default()
  }

  pub fn spawn<Fut>(future: Fut) -> Self
  where
    Fut: Future<Output = T> + Send + 'static,
  {
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
      // Ignore send errors - receiver may have been dropped
      let _ = tx.send(future.await);
    });
    Self { receiver: Some(rx) }
  }

  pub fn is_running(&self) -> bool {
    self.receiver.is_some()
  }

  /// The result, exactly once, when the work has finished
  pub fn poll(&mut self) -> Option<T> {
    let receiver = self.receiver.as_mut()?;
    match receiver.try_recv() {
      Ok(value) => {
        self.receiver = None;
        Some(value)
      }
      Err(oneshot::error::TryRecvError::Empty) => None,
      Err(oneshot::error::TryRecvError::Closed) => {
        warn!("background task ended without a result");
        self.receiver = None;
        None
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;

  #[tokio::test]
  async fn test_task_result_delivered_once() {
    let mut task = Task::spawn(async { 42 });
    assert!(task.is_running());

    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(task.poll(), Some(42));
    assert!(!task.is_running());
    assert_eq!(task.poll(), None);
  }

  #[tokio::test]
  async fn test_pending_task_polls_none() {
    let mut task = Task::spawn(async {
      tokio::time::sleep(Duration::from_millis(100)).await;
      1
    });
    assert_eq!(task.poll(), None);
    assert!(task.is_running());
  }

  #[tokio::test]
  async fn test_idle_task() {
    let mut task: Task<u8> = Task::idle();
    assert!(!task.is_running());
    assert_eq!(task.poll(), None);
  }

  #[tokio::test]
  async fn test_panicked_task_stops_running() {
    let mut task: Task<u8> = Task::spawn(async { panic!("boom") });
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(task.poll(), None);
    assert!(!task.is_running());
  }
}
