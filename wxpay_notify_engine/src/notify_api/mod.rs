//! # Notification processing API
//!
//! The stages of notification handling, each usable and testable on its own:
//!
//! * [`signature_verifier`] authenticates the headers and raw body against a platform certificate.
//! * [`certificate_cache`] keeps platform certificates in memory and refreshes them from a
//!   [`CertificateSource`](crate::CertificateSource) when an unknown serial shows up.
//! * [`payload_decryptor`] opens the encrypted resource inside the notification body.
//! * [`event_deduplicator`] reserves event ids in an [`EventStore`](crate::EventStore).
//! * [`notification_processor`] runs the stages in order and calls the business callback.
//!
//! [`errors`] holds the failure taxonomy shared by all of them, and [`event_objects`] the envelope and event types.
pub mod certificate_cache;
pub mod errors;
pub mod event_deduplicator;
pub mod event_objects;
pub mod notification_processor;
pub mod payload_decryptor;
pub mod signature_verifier;
