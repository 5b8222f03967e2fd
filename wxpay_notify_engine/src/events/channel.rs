//! Stateless pub-sub channel.
//!
//! Handlers receive only the event itself, never the engine's state. They run as spawned tasks, so a slow handler
//! does not hold up the next event.
use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
    },
};

use log::*;
use thiserror::Error;
use tokio::sync::mpsc;

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

#[derive(Debug, Clone, Error)]
#[error("The event handler has shut down. {0}")]
pub struct PublishError(String);

pub struct EventHandler<E: Send + Sync + 'static> {
    listener: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    handler: Handler<E>,
}

impl<E: Send + Sync + 'static> EventHandler<E> {
    pub fn new(buffer_size: usize, handler: Handler<E>) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size);
        Self { listener: receiver, sender, handler }
    }

    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer::new(self.sender.clone())
    }

    /// Runs until every producer has been dropped, then waits for in-flight handler tasks to finish.
    pub async fn start_handler(mut self) {
        debug!("📬️ Starting event handler");
        // the handler must shut down once the last external producer goes away
        drop(self.sender);
        let jobs = Arc::new(AtomicI64::new(0));
        while let Some(ev) = self.listener.recv().await {
            trace!("📬️ Handling event");
            let handler = Arc::clone(&self.handler);
            jobs.fetch_add(1, Ordering::SeqCst);
            let job = Arc::clone(&jobs);
            tokio::spawn(async move {
                (handler)(ev).await;
                job.fetch_sub(1, Ordering::SeqCst);
                trace!("📬️ Event handled");
            });
        }
        while jobs.load(Ordering::SeqCst) > 0 {
            debug!("📬️ Waiting for {} event jobs to complete", jobs.load(Ordering::SeqCst));
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }
        debug!("📬️ Event handler has shut down");
    }
}

#[derive(Clone)]
pub struct EventProducer<E: Send + Sync> {
    sender: mpsc::Sender<E>,
}

impl<E: Send + Sync> EventProducer<E> {
    pub fn new(sender: mpsc::Sender<E>) -> Self {
        Self { sender }
    }

    /// Queues an event for the handler. Waits if the buffer is full, and fails if the handler is gone.
    pub async fn publish_event(&self, event: E) -> Result<(), PublishError> {
        self.sender.send(event).await.map_err(|e| {
            error!("📬️ Failed to send event: {e}");
            PublishError(e.to_string())
        })
    }
}
