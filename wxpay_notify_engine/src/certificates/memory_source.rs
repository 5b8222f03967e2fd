use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        RwLock,
    },
    time::Duration,
};

use log::*;

use crate::{
    certificates::Certificate,
    traits::{CertificateSource, CertificateSourceError},
};

/// An in-memory certificate source.
///
/// It keeps two sets: the certificates it currently *holds*, and the certificates the "provider" currently
/// *publishes*. `fetch_certificate` only looks at the held set; `refresh_all` replaces the held set with the published
/// one. Calling [`publish`](Self::publish) therefore behaves like the provider rotating in a new certificate that the
/// engine has not seen yet.
#[derive(Debug, Default)]
pub struct MemoryCertificateSource {
    held: RwLock<HashMap<String, Certificate>>,
    published: RwLock<HashMap<String, Certificate>>,
    refresh_count: AtomicUsize,
    refresh_delay: Option<Duration>,
}

impl MemoryCertificateSource {
    pub fn new(certificates: Vec<Certificate>) -> Self {
        let map = certificates.into_iter().map(|c| (c.serial_no.clone(), c)).collect::<HashMap<_, _>>();
        Self { held: RwLock::new(map.clone()), published: RwLock::new(map), ..Default::default() }
    }

    /// Simulates a slow certificate endpoint.
    pub fn with_refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = Some(delay);
        self
    }

    /// Makes a certificate available on the next refresh, without adding it to the held set.
    pub fn publish(&self, certificate: Certificate) {
        if let Ok(mut published) = self.published.write() {
            published.insert(certificate.serial_no.clone(), certificate);
        }
    }

    /// The number of times `refresh_all` has been called.
    pub fn refresh_count(&self) -> usize {
        self.refresh_count.load(Ordering::SeqCst)
    }
}

impl CertificateSource for MemoryCertificateSource {
    async fn fetch_certificate(&self, serial_no: &str) -> Result<Option<Certificate>, CertificateSourceError> {
        let held = self.held.read().map_err(|e| CertificateSourceError::Unavailable(e.to_string()))?;
        Ok(held.get(serial_no).cloned())
    }

    async fn refresh_all(&self) -> Result<Vec<Certificate>, CertificateSourceError> {
        self.refresh_count.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.refresh_delay {
            tokio::time::sleep(delay).await;
        }
        let published = self
            .published
            .read()
            .map_err(|e| CertificateSourceError::Unavailable(e.to_string()))?
            .clone();
        trace!("📜️ Memory certificate source refreshed with {} certificates", published.len());
        let certificates = published.values().cloned().collect();
        let mut held = self.held.write().map_err(|e| CertificateSourceError::Unavailable(e.to_string()))?;
        *held = published;
        Ok(certificates)
    }
}
