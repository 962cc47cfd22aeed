//! One-shot settlement shared by competing event sources.

use parking_lot::Mutex;
use tokio::sync::oneshot;

/// Delivers at most one value to a waiting receiver.
///
/// Any number of callers may race to settle; only the first one whose value
/// reaches the receiver wins. Once settled there is no way back.
#[derive(Debug)]
pub struct Settlement<T> {
    sender: Mutex<Option<oneshot::Sender<T>>>,
}

impl<T> Settlement<T> {
    /// Creates an unsettled settlement and the receiver that observes it.
    pub fn new() -> (Self, oneshot::Receiver<T>) {
        let (sender, receiver) = oneshot::channel();
        (
            Self {
                sender: Mutex::new(Some(sender)),
            },
            receiver,
        )
    }

    /// Attempts to settle with `value`.
    ///
    /// Returns `false` if the settlement was already settled or the receiver
    /// is gone; `value` is discarded in that case.
    pub fn settle(&self, value: T) -> bool {
        match self.sender.lock().take() {
            Some(sender) => sender.send(value).is_ok(),
            None => false,
        }
    }

    /// Whether a settle attempt has already been made.
    pub fn is_settled(&self) -> bool {
        self.sender.lock().is_none()
    }
}
