//! WeChat Pay Notification Engine
//!
//! The notification engine authenticates and applies the asynchronous payment-result notifications that the payment
//! provider posts to a merchant's `notify_url`. It is transport-agnostic: the HTTP layer hands over the raw headers and
//! the raw body, and gets back a [`ProcessingOutcome`] that it maps to a status code.
//!
//! Each notification flows through four stages:
//! 1. [`SignatureVerifier`] checks the provider's signature over `timestamp\nnonce\nbody\n` with the platform
//!    certificate named in the `Wechatpay-Serial` header, and rejects stale timestamps. Certificates come from a
//!    [`CertificateCache`] in front of a [`CertificateSource`].
//! 2. [`PayloadDecryptor`] opens the `AEAD_AES_256_GCM` encrypted resource with the merchant's APIv3 key and produces a
//!    [`DecryptedEvent`].
//! 3. [`EventDeduplicator`] atomically reserves the event id in an [`EventStore`], so that provider retries (including
//!    concurrent ones) cause at most one business side effect.
//! 4. [`NotificationProcessor`] ties the stages together and invokes the [`BusinessCallback`] for first-seen events.
//!
//! Two event stores are provided: [`MemoryEventStore`] for single-instance deployments and tests, and
//! [`SqliteEventStore`], which relies on a primary-key constraint for its insert-if-absent primitive.
//!
//! The [`events`] module offers a small pub-sub hook system that can act as the business callback.
mod db;

pub mod certificates;
pub mod db_types;
pub mod events;
pub mod helpers;
mod notify_api;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use certificates::{Certificate, DirectoryCertificateSource, MemoryCertificateSource};
pub use db::memory::MemoryEventStore;
#[cfg(feature = "sqlite")]
pub use db::sqlite::SqliteEventStore;
pub use notify_api::{
    certificate_cache::CertificateCache,
    errors::{DecryptError, FailureKind, InvalidKeyLength, NotificationError, VerificationError},
    event_deduplicator::{EventDeduplicator, Reservation},
    event_objects,
    event_objects::{DecryptedEvent, EventType},
    notification_processor::{NotificationProcessor, ProcessingOutcome, ProcessorOptions},
    payload_decryptor::PayloadDecryptor,
    signature_verifier::{SignatureVerifier, VerifiedNotification},
};
pub use traits::{
    BusinessCallback,
    CallbackError,
    CertificateSource,
    CertificateSourceError,
    EventStore,
    EventStoreError,
};
