use std::{future::Future, pin::Pin, sync::Arc};

use futures_util::future::try_join_all;
use log::*;

use crate::{
    events::{
        EventHandler,
        EventProducer,
        Handler,
        PaymentEvent,
        PaymentFailedEvent,
        PaymentSucceededEvent,
        RefundEvent,
    },
    traits::{BusinessCallback, CallbackError},
    DecryptedEvent,
};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub payment_succeeded_producer: Vec<EventProducer<PaymentSucceededEvent>>,
    pub payment_failed_producer: Vec<EventProducer<PaymentFailedEvent>>,
    pub refund_producer: Vec<EventProducer<RefundEvent>>,
}

impl EventProducers {
    pub async fn publish(&self, event: PaymentEvent) -> Result<(), CallbackError> {
        let result = match event {
            PaymentEvent::PaymentSucceeded(ev) => {
                try_join_all(self.payment_succeeded_producer.iter().map(|p| p.publish_event(ev.clone()))).await
            },
            PaymentEvent::PaymentFailed(ev) => {
                try_join_all(self.payment_failed_producer.iter().map(|p| p.publish_event(ev.clone()))).await
            },
            PaymentEvent::Refund(ev) => {
                try_join_all(self.refund_producer.iter().map(|p| p.publish_event(ev.clone()))).await
            },
        };
        result.map(|_| ()).map_err(|e| CallbackError::new(e.to_string()))
    }
}

/// Queues the typed event for every subscribed hook. Events without a typed counterpart are acknowledged as-is.
impl BusinessCallback for EventProducers {
    async fn on_event(&self, event: &DecryptedEvent) -> Result<(), CallbackError> {
        match PaymentEvent::from_notification(event) {
            Some(ev) => self.publish(ev).await,
            None => {
                info!("📬️ No hook handles {} events. Event {} acknowledged.", event.raw_event_type, event.event_id);
                Ok(())
            },
        }
    }
}

pub struct EventHandlers {
    pub on_payment_succeeded: Option<EventHandler<PaymentSucceededEvent>>,
    pub on_payment_failed: Option<EventHandler<PaymentFailedEvent>>,
    pub on_refund: Option<EventHandler<RefundEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_payment_succeeded = hooks.on_payment_succeeded.map(|f| EventHandler::new(buffer_size, f));
        let on_payment_failed = hooks.on_payment_failed.map(|f| EventHandler::new(buffer_size, f));
        let on_refund = hooks.on_refund.map(|f| EventHandler::new(buffer_size, f));
        Self { on_payment_succeeded, on_payment_failed, on_refund }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_payment_succeeded {
            result.payment_succeeded_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_payment_failed {
            result.payment_failed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_refund {
            result.refund_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_payment_succeeded {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_payment_failed {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_refund {
            tokio::spawn(handler.start_handler());
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_payment_succeeded: Option<Handler<PaymentSucceededEvent>>,
    pub on_payment_failed: Option<Handler<PaymentFailedEvent>>,
    pub on_refund: Option<Handler<RefundEvent>>,
}

impl EventHooks {
    pub fn on_payment_succeeded<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PaymentSucceededEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_payment_succeeded = Some(Arc::new(f));
        self
    }

    pub fn on_payment_failed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PaymentFailedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_payment_failed = Some(Arc::new(f));
        self
    }

    pub fn on_refund<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(RefundEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_refund = Some(Arc::new(f));
        self
    }
}
