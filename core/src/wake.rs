use std::fmt;
use std::sync::Arc;

use tokio::sync::Notify;

/// Execution context of the caller driving the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeContext {
    Interrupt,
    Task,
}

/// What happened to the window handed to a subscriber on wake-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Subscriber was signalled and will read and acknowledge later.
    Deferred,
    /// Subscriber processed the window during the call; counts as acknowledged.
    Consumed,
}

/// Capability to wake a consumer once data is available.
///
/// Implementations must not block: they run on the producer path, which may be
/// an interrupt handler.
pub trait Wake: Send + Sync {
    fn wake(&self, context: WakeContext, window: &[u8]) -> Delivery;
}

/// Task-notification style waker: stores a single permit that the owning task
/// takes with [`TaskNotifier::notified`].
#[derive(Clone, Default)]
pub struct TaskNotifier {
    notify: Arc<Notify>,
}

impl TaskNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for the next notification. Returns immediately if one is pending.
    pub async fn notified(&self) {
        self.notify.notified().await;
    }
}

impl Wake for TaskNotifier {
    fn wake(&self, _context: WakeContext, _window: &[u8]) -> Delivery {
        // notify_one never blocks, so the same primitive serves both contexts.
        self.notify.notify_one();
        Delivery::Deferred
    }
}

type WindowCallback = dyn Fn(WakeContext, &[u8]) + Send + Sync;

/// Direct-callback waker: the callback sees the window synchronously.
pub struct CallbackWaker {
    callback: Box<WindowCallback>,
}

impl CallbackWaker {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(WakeContext, &[u8]) + Send + Sync + 'static,
    {
        Self {
            callback: Box::new(callback),
        }
    }
}

impl Wake for CallbackWaker {
    fn wake(&self, context: WakeContext, window: &[u8]) -> Delivery {
        (self.callback)(context, window);
        Delivery::Consumed
    }
}

/// Named handle under which a consumer subscribes.
///
/// Identity is the waker allocation: clones of a handle refer to the same
/// subscriber, two handles built separately never do.
#[derive(Clone)]
pub struct ConsumerHandle {
    name: String,
    waker: Arc<dyn Wake>,
}

impl ConsumerHandle {
    pub fn new(name: impl Into<String>, waker: Arc<dyn Wake>) -> Self {
        Self {
            name: name.into(),
            waker,
        }
    }

    pub fn task(name: impl Into<String>, notifier: TaskNotifier) -> Self {
        Self::new(name, Arc::new(notifier))
    }

    pub fn callback<F>(name: impl Into<String>, callback: F) -> Self
    where
        F: Fn(WakeContext, &[u8]) + Send + Sync + 'static,
    {
        Self::new(name, Arc::new(CallbackWaker::new(callback)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn same_consumer(&self, other: &ConsumerHandle) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.waker) as *const (),
            Arc::as_ptr(&other.waker) as *const (),
        )
    }

    pub(crate) fn wake(&self, context: WakeContext, window: &[u8]) -> Delivery {
        self.waker.wake(context, window)
    }
}

impl fmt::Debug for ConsumerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsumerHandle")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
