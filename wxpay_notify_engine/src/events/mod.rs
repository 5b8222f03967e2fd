//! Payment event hooks.
//!
//! A lightweight way to react to processed notifications without writing a full [`crate::BusinessCallback`].
//! Register async closures on [`EventHooks`], turn them into [`EventHandlers`], and pass the resulting
//! [`EventProducers`] to the notification processor as its business callback. Each processed event is translated into
//! a typed event and queued for every subscribed handler.
mod channel;
mod event_types;
mod hooks;

pub use channel::{EventHandler, EventProducer, Handler, PublishError};
pub use event_types::*;
pub use hooks::{EventHandlers, EventHooks, EventProducers};
