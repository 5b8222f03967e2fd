use std::time::Duration;

use chrono::Utc;
use log::*;

use crate::{
    db_types::EventOutcome,
    helpers::NotificationHeaders,
    notify_api::{
        certificate_cache::{CertificateCache, DEFAULT_MIN_REFRESH_INTERVAL},
        event_deduplicator::DEFAULT_RESERVATION_TTL,
        signature_verifier::DEFAULT_TIMESTAMP_TOLERANCE,
    },
    traits::{BusinessCallback, CertificateSource, EventStore},
    DecryptedEvent,
    EventDeduplicator,
    NotificationError,
    PayloadDecryptor,
    Reservation,
    SignatureVerifier,
};

pub const DEFAULT_CALLBACK_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_CERTIFICATE_REFRESH_COOLDOWN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessorOptions {
    /// Maximum allowed difference between the notification timestamp and the server clock.
    pub timestamp_tolerance: Duration,
    /// How long the business callback may run before the attempt counts as failed.
    pub callback_timeout: Duration,
    /// How long a `Pending` reservation is honoured before another delivery may take it over.
    pub reservation_ttl: Duration,
    /// Minimum time between certificate refreshes triggered by the same unknown serial.
    pub certificate_refresh_cooldown: Duration,
    /// Minimum time between two certificate refreshes, whatever serial triggers them.
    pub certificate_refresh_interval: Duration,
}

impl Default for ProcessorOptions {
    fn default() -> Self {
        Self {
            timestamp_tolerance: DEFAULT_TIMESTAMP_TOLERANCE,
            callback_timeout: DEFAULT_CALLBACK_TIMEOUT,
            reservation_ttl: DEFAULT_RESERVATION_TTL,
            certificate_refresh_cooldown: DEFAULT_CERTIFICATE_REFRESH_COOLDOWN,
            certificate_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
        }
    }
}

/// What the engine decided about one delivery. The transport maps this to a response: success for `Acknowledged`
/// and `AlreadyProcessed`, failure (so the provider redelivers) for `Rejected`.
#[derive(Debug, Clone)]
pub enum ProcessingOutcome {
    /// The event was seen for the first time (or retried after a failure) and the business callback succeeded.
    Acknowledged { event_id: String },
    /// The event had already been processed successfully. Nothing was done.
    AlreadyProcessed { event_id: String },
    Rejected(NotificationError),
}

impl ProcessingOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Rejected(_))
    }

    pub fn event_id(&self) -> Option<&str> {
        match self {
            Self::Acknowledged { event_id } | Self::AlreadyProcessed { event_id } => Some(event_id),
            Self::Rejected(_) => None,
        }
    }
}

/// Runs a notification through verification, decryption and deduplication, then hands first-seen events to the
/// business callback.
///
/// The processor holds no per-request state, so a single instance serves any number of concurrent deliveries.
pub struct NotificationProcessor<C, S, H> {
    verifier: SignatureVerifier<C>,
    decryptor: PayloadDecryptor,
    deduplicator: EventDeduplicator<S>,
    callback: H,
    callback_timeout: Duration,
}

impl<C, S, H> NotificationProcessor<C, S, H> {
    pub fn new(source: C, store: S, callback: H, decryptor: PayloadDecryptor, options: ProcessorOptions) -> Self {
        let certificates = CertificateCache::new(source, options.certificate_refresh_cooldown)
            .with_min_refresh_interval(options.certificate_refresh_interval);
        let verifier = SignatureVerifier::new(certificates, options.timestamp_tolerance);
        let deduplicator = EventDeduplicator::new(store, options.reservation_ttl);
        Self { verifier, decryptor, deduplicator, callback, callback_timeout: options.callback_timeout }
    }

    pub fn verifier(&self) -> &SignatureVerifier<C> {
        &self.verifier
    }

    pub fn certificates(&self) -> &CertificateCache<C> {
        self.verifier.certificates()
    }

    pub fn deduplicator(&self) -> &EventDeduplicator<S> {
        &self.deduplicator
    }

    pub fn callback(&self) -> &H {
        &self.callback
    }
}

/// Identifiers gathered along the way, for the rejection log line.
#[derive(Default)]
struct DeliveryContext {
    serial_no: Option<String>,
    event_id: Option<String>,
}

impl<C, S, H> NotificationProcessor<C, S, H>
where
    C: CertificateSource,
    S: EventStore,
    H: BusinessCallback,
{
    /// Processes one delivery. `headers` and `body` must be exactly what arrived on the wire.
    pub async fn handle(&self, headers: &NotificationHeaders, body: &[u8]) -> ProcessingOutcome {
        let mut context = DeliveryContext::default();
        match self.process(headers, body, &mut context).await {
            Ok(outcome) => outcome,
            Err(e) => {
                let serial = context.serial_no.as_deref().unwrap_or("-");
                let event_id = context.event_id.as_deref().unwrap_or("-");
                warn!("📨️ Notification rejected [{}]. serial: {serial}, event: {event_id}. {e}", e.kind());
                ProcessingOutcome::Rejected(e)
            },
        }
    }

    async fn process(
        &self,
        headers: &NotificationHeaders,
        body: &[u8],
        context: &mut DeliveryContext,
    ) -> Result<ProcessingOutcome, NotificationError> {
        let verified = self.verifier.verify(headers, body).await?;
        context.serial_no = Some(verified.serial_no);
        let event = self.decryptor.decrypt_event(body)?;
        context.event_id = Some(event.event_id.clone());
        let event_id = event.event_id.clone();
        match self.deduplicator.check_and_reserve(&event).await? {
            Reservation::FirstSeen(_) => {},
            Reservation::AlreadySeen(prior) if prior.outcome == EventOutcome::Success => {
                info!("📨️ Event {event_id} was already processed. Acknowledging without side effects.");
                return Ok(ProcessingOutcome::AlreadyProcessed { event_id });
            },
            Reservation::AlreadySeen(prior) => {
                if self.deduplicator.try_reclaim(&prior, Utc::now()).await?.is_none() {
                    return Err(NotificationError::EventInFlight(event_id));
                }
            },
        }
        self.run_callback(&event).await
    }

    async fn run_callback(&self, event: &DecryptedEvent) -> Result<ProcessingOutcome, NotificationError> {
        let event_id = event.event_id.clone();
        match tokio::time::timeout(self.callback_timeout, self.callback.on_event(event)).await {
            Ok(Ok(())) => {
                self.deduplicator.record_outcome(&event_id, EventOutcome::Success).await?;
                info!("📨️ Event {event_id} ({}) processed", event.event_type);
                Ok(ProcessingOutcome::Acknowledged { event_id })
            },
            Ok(Err(e)) => {
                self.mark_failed(&event_id).await;
                Err(NotificationError::CallbackFailed { event_id, reason: e.to_string() })
            },
            Err(_) => {
                self.mark_failed(&event_id).await;
                Err(NotificationError::CallbackTimeout { event_id, timeout: self.callback_timeout })
            },
        }
    }

    /// Records a failed attempt. If this write fails the record stays `Pending` and becomes reclaimable once the
    /// reservation TTL has passed.
    async fn mark_failed(&self, event_id: &str) {
        if let Err(e) = self.deduplicator.record_outcome(event_id, EventOutcome::Failure).await {
            error!("📨️ Could not record the failure of event {event_id}. {e}");
        }
    }
}
