//! # Collaborator contracts
//!
//! The engine owns the verification, decryption and deduplication logic, but not the storage medium, the certificate
//! distribution mechanism, or the merchant's business logic. These are supplied by implementing the traits in this
//! module.
//!
//! * [`CertificateSource`] supplies the provider's platform certificates, keyed by serial number.
//! * [`EventStore`] is the durable insert-if-absent store backing deduplication. It must be shared by every handler
//!   that can process a notification, across processes if more than one instance is deployed.
//! * [`BusinessCallback`] receives each first-seen, authenticated event.
mod business_callback;
mod certificate_source;
mod event_store;

pub use business_callback::{BusinessCallback, CallbackError};
pub use certificate_source::{CertificateSource, CertificateSourceError};
pub use event_store::{EventStore, EventStoreError};
