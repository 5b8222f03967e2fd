use thiserror::Error;

use crate::DecryptedEvent;

/// The merchant's business logic, e.g. marking an order as paid.
///
/// The engine calls this at most once per processing attempt, and only for authenticated events that are either
/// first-seen or whose previous attempt failed. An `Err` tells the engine to record the failure and reject the
/// delivery so that the provider redelivers later.
#[allow(async_fn_in_trait)]
pub trait BusinessCallback {
    async fn on_event(&self, event: &DecryptedEvent) -> Result<(), CallbackError>;
}

#[derive(Debug, Clone, Error)]
#[error("Business callback failed: {0}")]
pub struct CallbackError(pub String);

impl CallbackError {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self(message.into())
    }
}
