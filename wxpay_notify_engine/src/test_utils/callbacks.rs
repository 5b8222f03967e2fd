use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use crate::{BusinessCallback, CallbackError, DecryptedEvent};

/// A business callback that counts its invocations, and can be told to fail or to be slow. Clones share counters.
#[derive(Clone, Default)]
pub struct CountingCallback {
    calls: Arc<AtomicUsize>,
    failures_left: Arc<AtomicUsize>,
    delay: Option<Duration>,
}

impl CountingCallback {
    pub fn new() -> Self {
        Self::default()
    }

    /// The first `n` invocations return an error.
    pub fn failing_first(n: usize) -> Self {
        let cb = Self::default();
        cb.failures_left.store(n, Ordering::SeqCst);
        cb
    }

    /// Every invocation sleeps for `delay` before succeeding.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl BusinessCallback for CountingCallback {
    async fn on_event(&self, event: &DecryptedEvent) -> Result<(), CallbackError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let failed = self.failures_left.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok();
        if failed {
            return Err(CallbackError::new(format!("Order system unavailable for {}", event.event_id)));
        }
        Ok(())
    }
}
