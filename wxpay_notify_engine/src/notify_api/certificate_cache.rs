use std::{
    collections::HashMap,
    sync::{PoisonError, RwLock},
    time::Duration,
};

use chrono::{DateTime, Utc};
use log::*;
use tokio::sync::Mutex;

use crate::{
    certificates::Certificate,
    traits::{CertificateSource, CertificateSourceError},
    VerificationError,
};

/// An in-memory map of platform certificates in front of a [`CertificateSource`].
///
/// Lookups of known serials only take a read lock. A miss takes the refresh lock, so that concurrent misses queue up
/// behind a single refresh instead of each hitting the source; whoever gets the lock next re-checks the map first.
/// A serial that is still unknown after a refresh is not refreshed for again until `refresh_cooldown` has passed.
/// Independently of the serial, two refreshes of the whole set are at least `min_refresh_interval` apart, since the
/// serial header is read before anything about the request is authenticated.
pub struct CertificateCache<C> {
    source: C,
    certificates: RwLock<HashMap<String, Certificate>>,
    refresh_state: Mutex<RefreshState>,
    refresh_cooldown: chrono::Duration,
    min_refresh_interval: chrono::Duration,
}

#[derive(Default)]
struct RefreshState {
    attempts: HashMap<String, DateTime<Utc>>,
    last_refresh: Option<DateTime<Utc>>,
}

pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or_else(|_| chrono::Duration::days(365))
}

impl<C> CertificateCache<C> {
    pub fn new(source: C, refresh_cooldown: Duration) -> Self {
        Self {
            source,
            certificates: RwLock::new(HashMap::new()),
            refresh_state: Mutex::new(RefreshState::default()),
            refresh_cooldown: to_chrono(refresh_cooldown),
            min_refresh_interval: to_chrono(DEFAULT_MIN_REFRESH_INTERVAL),
        }
    }

    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = to_chrono(interval);
        self
    }

    pub fn source(&self) -> &C {
        &self.source
    }

    /// Returns the cached certificate for `serial_no` without touching the source.
    pub fn cached(&self, serial_no: &str) -> Option<Certificate> {
        self.certificates.read().unwrap_or_else(PoisonError::into_inner).get(serial_no).cloned()
    }

    pub fn len(&self) -> usize {
        self.certificates.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&self, certificate: Certificate) {
        let mut certificates = self.certificates.write().unwrap_or_else(PoisonError::into_inner);
        certificates.insert(certificate.serial_no.clone(), certificate);
    }

    fn replace_all(&self, fresh: Vec<Certificate>) {
        let fresh = fresh.into_iter().map(|c| (c.serial_no.clone(), c)).collect::<HashMap<_, _>>();
        let mut certificates = self.certificates.write().unwrap_or_else(PoisonError::into_inner);
        *certificates = fresh;
    }
}

impl<C: CertificateSource> CertificateCache<C> {
    /// Loads the full certificate set from the source. Returns the number of certificates now cached.
    pub async fn warm_up(&self) -> Result<usize, CertificateSourceError> {
        let _guard = self.refresh_state.lock().await;
        let certificates = self.source.refresh_all().await?;
        self.replace_all(certificates);
        let n = self.len();
        info!("📜️ Certificate cache warmed up with {n} certificates");
        Ok(n)
    }

    /// Finds the certificate for `serial_no`, consulting the source on a cache miss.
    pub async fn get(&self, serial_no: &str) -> Result<Certificate, VerificationError> {
        if let Some(certificate) = self.cached(serial_no) {
            return Ok(certificate);
        }
        let mut state = self.refresh_state.lock().await;
        if let Some(certificate) = self.cached(serial_no) {
            trace!("📜️ Certificate {serial_no} was loaded while waiting for the refresh lock");
            return Ok(certificate);
        }
        match self.source.fetch_certificate(serial_no).await {
            Ok(Some(certificate)) => {
                debug!("📜️ Certificate {serial_no} fetched from source");
                self.insert(certificate.clone());
                return Ok(certificate);
            },
            Ok(None) => {},
            Err(e) => warn!("📜️ Could not fetch certificate {serial_no} from source. {e}"),
        }
        let now = Utc::now();
        let cooldown = self.refresh_cooldown;
        state.attempts.retain(|_, at| now - *at < cooldown);
        if state.attempts.contains_key(serial_no) {
            debug!("📜️ Certificate {serial_no} is unknown and was refreshed for recently. Not refreshing again.");
            return Err(unknown(serial_no, "Not found, and a refresh for it happened recently"));
        }
        if state.last_refresh.is_some_and(|at| now - at < self.min_refresh_interval) {
            debug!("📜️ Certificate {serial_no} is unknown, but the certificate set was refreshed moments ago.");
            return Err(unknown(serial_no, "Not found, and the certificate set was refreshed recently"));
        }
        state.attempts.insert(serial_no.to_string(), now);
        state.last_refresh = Some(now);
        info!("📜️ Unknown certificate {serial_no}. Refreshing the certificate set.");
        let certificates = self.source.refresh_all().await.map_err(|e| {
            error!("📜️ Certificate refresh failed. {e}");
            unknown(serial_no, &format!("Certificate refresh failed. {e}"))
        })?;
        self.replace_all(certificates);
        self.cached(serial_no).ok_or_else(|| {
            warn!("📜️ Certificate {serial_no} is still unknown after a refresh");
            unknown(serial_no, "Not found after refreshing the certificate set")
        })
    }
}

fn unknown(serial_no: &str, reason: &str) -> VerificationError {
    VerificationError::UnknownCertificate { serial_no: serial_no.to_string(), reason: reason.to_string() }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::*;
    use crate::{
        test_utils::fixtures::{test_certificate, TEST_SERIAL_NO},
        MemoryCertificateSource,
    };

    #[tokio::test]
    async fn hits_do_not_touch_the_source() {
        let source = MemoryCertificateSource::new(vec![test_certificate(TEST_SERIAL_NO)]);
        let cache = CertificateCache::new(source, Duration::from_secs(60));
        assert_eq!(cache.warm_up().await.unwrap(), 1);
        assert_eq!(cache.source().refresh_count(), 1);
        for _ in 0..5 {
            assert_eq!(cache.get(TEST_SERIAL_NO).await.unwrap().serial_no, TEST_SERIAL_NO);
        }
        assert_eq!(cache.source().refresh_count(), 1);
    }

    #[tokio::test]
    async fn held_certificates_are_fetched_without_refresh() {
        let source = MemoryCertificateSource::new(vec![test_certificate(TEST_SERIAL_NO)]);
        let cache = CertificateCache::new(source, Duration::from_secs(60));
        assert!(cache.is_empty());
        assert!(cache.get(TEST_SERIAL_NO).await.is_ok());
        assert_eq!(cache.source().refresh_count(), 0);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn rotated_certificate_is_picked_up_by_refresh() {
        let source = MemoryCertificateSource::new(vec![test_certificate(TEST_SERIAL_NO)]);
        let cache = CertificateCache::new(source, Duration::from_secs(60));
        cache.source().publish(test_certificate("ROTATED"));
        assert!(cache.get("ROTATED").await.is_ok());
        assert_eq!(cache.source().refresh_count(), 1);
    }

    #[tokio::test]
    async fn unknown_serial_is_refreshed_once_per_cooldown() {
        let source = MemoryCertificateSource::new(vec![test_certificate(TEST_SERIAL_NO)]);
        let cache = CertificateCache::new(source, Duration::from_secs(60));
        for _ in 0..3 {
            let err = cache.get("NOPE").await.unwrap_err();
            assert!(matches!(err, VerificationError::UnknownCertificate { ref serial_no, .. } if serial_no == "NOPE"));
        }
        assert_eq!(cache.source().refresh_count(), 1);
    }

    #[tokio::test]
    async fn cooldown_expires() {
        let source = MemoryCertificateSource::new(vec![]);
        let cache = CertificateCache::new(source, Duration::from_millis(20))
            .with_min_refresh_interval(Duration::from_millis(20));
        assert!(cache.get("LATE").await.is_err());
        cache.source().publish(test_certificate("LATE"));
        assert!(cache.get("LATE").await.is_err());
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(cache.get("LATE").await.is_ok());
        assert_eq!(cache.source().refresh_count(), 2);
    }

    #[tokio::test]
    async fn distinct_unknown_serials_share_the_refresh_interval() {
        let source = MemoryCertificateSource::new(vec![test_certificate(TEST_SERIAL_NO)]);
        let cache = CertificateCache::new(source, Duration::from_secs(60));
        for i in 0..50 {
            let serial_no = format!("BOGUS-{i:03}");
            assert!(matches!(cache.get(&serial_no).await, Err(VerificationError::UnknownCertificate { .. })));
        }
        assert_eq!(cache.source().refresh_count(), 1);
        assert!(cache.get(TEST_SERIAL_NO).await.is_ok());
    }

    #[tokio::test]
    async fn refresh_interval_expires() {
        let source = MemoryCertificateSource::new(vec![]);
        let cache =
            CertificateCache::new(source, Duration::from_secs(60)).with_min_refresh_interval(Duration::from_millis(20));
        assert!(cache.get("FIRST").await.is_err());
        cache.source().publish(test_certificate("SECOND"));
        assert!(cache.get("SECOND").await.is_err());
        assert_eq!(cache.source().refresh_count(), 1);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(cache.get("SECOND").await.is_ok());
        assert_eq!(cache.source().refresh_count(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_misses_collapse_into_one_refresh() {
        let source = MemoryCertificateSource::new(vec![]).with_refresh_delay(Duration::from_millis(50));
        source.publish(test_certificate("ROTATED"));
        let cache = Arc::new(CertificateCache::new(source, Duration::from_secs(60)));
        let tasks = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.get("ROTATED").await.map(|c| c.serial_no) })
            })
            .collect::<Vec<_>>();
        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap(), "ROTATED");
        }
        assert_eq!(cache.source().refresh_count(), 1);
    }
}
