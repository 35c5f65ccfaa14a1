//! Cooperative cancellation for in-flight response requests.
//!
//! A [`CancelHandle`]/[`CancelSignal`] pair shares a watch channel. The
//! engine polls the signal between attempts and races it against the live
//! generation call, so cancelling abandons at most one outbound request and
//! the caller still receives the filled standard text.

use tokio::sync::watch;

/// Caller-side handle. Cancelling is idempotent and never fails.
#[derive(Debug)]
pub struct CancelHandle {
    sender: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.sender.send(true);
    }
}

/// Engine-side signal. Defaults to a signal that never fires.
#[derive(Clone, Debug)]
pub struct CancelSignal {
    receiver: Option<watch::Receiver<bool>>,
}

pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (sender, receiver) = watch::channel(false);
    (CancelHandle { sender }, CancelSignal { receiver: Some(receiver) })
}

impl CancelSignal {
    pub fn never() -> Self {
        Self { receiver: None }
    }

    pub fn is_cancelled(&self) -> bool {
        self.receiver
            .as_ref()
            .map(|receiver| *receiver.borrow())
            .unwrap_or(false)
    }

    /// Resolves once cancellation is requested. Pends forever for signals
    /// built by [`CancelSignal::never`] and for handles dropped without
    /// cancelling.
    pub async fn cancelled(&mut self) {
        match self.receiver.as_mut() {
            Some(receiver) => loop {
                if *receiver.borrow_and_update() {
                    return;
                }
                if receiver.changed().await.is_err() {
                    std::future::pending::<()>().await;
                }
            },
            None => std::future::pending().await,
        }
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::never()
    }
}
