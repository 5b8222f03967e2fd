use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use log::*;

use crate::{
    helpers::{signing_message, verify_signature, NotificationHeaders, SignedHeaders},
    traits::CertificateSource,
    CertificateCache,
    VerificationError,
};

pub const DEFAULT_TIMESTAMP_TOLERANCE: Duration = Duration::from_secs(300);

/// The authenticated facts about a delivery, available once the signature has been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedNotification {
    pub serial_no: String,
    pub timestamp: DateTime<Utc>,
    pub nonce: String,
}

/// Authenticates a notification: the signed headers must be present, the timestamp must be within `tolerance` of the
/// server clock, and the signature over `timestamp\nnonce\nbody\n` must verify against the named platform certificate.
pub struct SignatureVerifier<C> {
    certificates: CertificateCache<C>,
    tolerance: Duration,
}

impl<C> SignatureVerifier<C> {
    pub fn new(certificates: CertificateCache<C>, tolerance: Duration) -> Self {
        Self { certificates, tolerance }
    }

    pub fn certificates(&self) -> &CertificateCache<C> {
        &self.certificates
    }

    pub fn tolerance(&self) -> Duration {
        self.tolerance
    }
}

impl<C: CertificateSource> SignatureVerifier<C> {
    pub async fn verify(
        &self,
        headers: &NotificationHeaders,
        body: &[u8],
    ) -> Result<VerifiedNotification, VerificationError> {
        self.verify_at(headers, body, Utc::now()).await
    }

    /// As [`verify`](Self::verify), with an explicit notion of "now".
    pub async fn verify_at(
        &self,
        headers: &NotificationHeaders,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<VerifiedNotification, VerificationError> {
        let signed = SignedHeaders::from_headers(headers)?;
        let skew_secs = now.timestamp().saturating_sub(signed.timestamp).saturating_abs();
        if skew_secs.unsigned_abs() > self.tolerance.as_secs() {
            debug!("🔐️ Notification timestamp {} is {skew_secs}s off. Rejecting.", signed.timestamp);
            return Err(VerificationError::StaleTimestamp { timestamp: signed.timestamp, skew_secs });
        }
        let certificate = self.certificates.get(&signed.serial_no).await?;
        if !certificate.is_valid_at(now) {
            warn!(
                "🔐️ Certificate {} is outside its validity window ({} to {})",
                certificate.serial_no, certificate.effective_time, certificate.expire_time
            );
            let reason = format!(
                "Certificate is only valid between {} and {}",
                certificate.effective_time, certificate.expire_time
            );
            return Err(VerificationError::UnknownCertificate { serial_no: signed.serial_no, reason });
        }
        let message = signing_message(&signed.timestamp_raw, &signed.nonce, body);
        if !verify_signature(signed.algorithm, &certificate.public_key, &message, &signed.signature) {
            debug!("🔐️ Signature check failed for certificate {}", signed.serial_no);
            return Err(VerificationError::SignatureMismatch(signed.serial_no));
        }
        trace!("🔐️ Notification signature verified with certificate {}", signed.serial_no);
        let timestamp = Utc.timestamp_opt(signed.timestamp, 0).single().unwrap_or(now);
        Ok(VerifiedNotification { serial_no: signed.serial_no, timestamp, nonce: signed.nonce })
    }
}

#[cfg(test)]
mod test {
    use chrono::Duration as ChronoDuration;

    use super::*;
    use crate::{
        helpers::{HEADER_NONCE, HEADER_SERIAL, HEADER_SIGNATURE},
        test_utils::fixtures::{expired_certificate, signed_headers, test_certificate, TEST_SERIAL_NO},
        MemoryCertificateSource,
    };

    const BODY: &[u8] = br#"{"id":"EV-1","event_type":"TRANSACTION.SUCCESS"}"#;

    fn verifier(certificates: Vec<crate::Certificate>) -> SignatureVerifier<MemoryCertificateSource> {
        let cache = CertificateCache::new(MemoryCertificateSource::new(certificates), Duration::from_secs(60));
        SignatureVerifier::new(cache, DEFAULT_TIMESTAMP_TOLERANCE)
    }

    #[tokio::test]
    async fn valid_signature() {
        let verifier = verifier(vec![test_certificate(TEST_SERIAL_NO)]);
        let now = Utc::now();
        let headers = signed_headers(now.timestamp(), "nonce-1", BODY);
        let verified = verifier.verify_at(&headers, BODY, now).await.unwrap();
        assert_eq!(verified.serial_no, TEST_SERIAL_NO);
        assert_eq!(verified.nonce, "nonce-1");
        assert_eq!(verified.timestamp.timestamp(), now.timestamp());
    }

    #[tokio::test]
    async fn any_body_change_breaks_the_signature() {
        let verifier = verifier(vec![test_certificate(TEST_SERIAL_NO)]);
        let now = Utc::now();
        let headers = signed_headers(now.timestamp(), "nonce-1", BODY);
        for i in [0, BODY.len() / 2, BODY.len() - 1] {
            let mut body = BODY.to_vec();
            body[i] ^= 0x20;
            let err = verifier.verify_at(&headers, &body, now).await.unwrap_err();
            assert_eq!(err, VerificationError::SignatureMismatch(TEST_SERIAL_NO.into()));
        }
    }

    #[tokio::test]
    async fn header_changes_break_the_signature() {
        let verifier = verifier(vec![test_certificate(TEST_SERIAL_NO)]);
        let now = Utc::now();
        let headers = signed_headers(now.timestamp(), "nonce-1", BODY).with(HEADER_NONCE, "nonce-2");
        let err = verifier.verify_at(&headers, BODY, now).await.unwrap_err();
        assert!(matches!(err, VerificationError::SignatureMismatch(_)));

        let headers = signed_headers(now.timestamp(), "nonce-1", BODY).with(HEADER_SIGNATURE, "WECHATPAY/SIGNTEST/abc");
        let err = verifier.verify_at(&headers, BODY, now).await.unwrap_err();
        assert!(matches!(err, VerificationError::SignatureMismatch(_)));
    }

    #[tokio::test]
    async fn any_signature_byte_change_breaks_the_signature() {
        use base64::{engine::general_purpose::STANDARD, Engine};

        let verifier = verifier(vec![test_certificate(TEST_SERIAL_NO)]);
        let now = Utc::now();
        let headers = signed_headers(now.timestamp(), "nonce-1", BODY);
        let signature = STANDARD.decode(headers.get(HEADER_SIGNATURE).unwrap()).unwrap();
        assert_eq!(signature.len(), 256);
        for i in [0, signature.len() / 2, signature.len() - 1] {
            let mut altered = signature.clone();
            altered[i] ^= 0x01;
            let headers = headers.clone().with(HEADER_SIGNATURE, STANDARD.encode(&altered));
            let err = verifier.verify_at(&headers, BODY, now).await.unwrap_err();
            assert_eq!(err, VerificationError::SignatureMismatch(TEST_SERIAL_NO.into()));
        }
    }

    #[tokio::test]
    async fn stale_timestamps_are_rejected_before_lookup() {
        let verifier = verifier(vec![]);
        let now = Utc::now();
        let old = now - ChronoDuration::seconds(301);
        let headers = signed_headers(old.timestamp(), "nonce-1", BODY);
        let err = verifier.verify_at(&headers, BODY, now).await.unwrap_err();
        assert!(matches!(err, VerificationError::StaleTimestamp { skew_secs: 301, .. }));
        let future = now + ChronoDuration::seconds(400);
        let headers = signed_headers(future.timestamp(), "nonce-1", BODY);
        let err = verifier.verify_at(&headers, BODY, now).await.unwrap_err();
        assert!(matches!(err, VerificationError::StaleTimestamp { .. }));
        assert_eq!(verifier.certificates().source().refresh_count(), 0);
    }

    #[tokio::test]
    async fn boundary_of_the_tolerance_is_accepted() {
        let verifier = verifier(vec![test_certificate(TEST_SERIAL_NO)]);
        let now = Utc::now();
        let edge = now - ChronoDuration::seconds(300);
        let headers = signed_headers(edge.timestamp(), "nonce-1", BODY);
        assert!(verifier.verify_at(&headers, BODY, now).await.is_ok());
    }

    #[tokio::test]
    async fn unknown_and_expired_certificates() {
        let verifier = verifier(vec![expired_certificate("OLD")]);
        let now = Utc::now();
        let headers = signed_headers(now.timestamp(), "nonce-1", BODY);
        let err = verifier.verify_at(&headers, BODY, now).await.unwrap_err();
        assert!(matches!(err, VerificationError::UnknownCertificate { .. }));

        let headers = signed_headers(now.timestamp(), "nonce-1", BODY).with(HEADER_SERIAL, "OLD");
        let err = verifier.verify_at(&headers, BODY, now).await.unwrap_err();
        assert!(matches!(err, VerificationError::UnknownCertificate { ref serial_no, .. } if serial_no == "OLD"));
    }
}
