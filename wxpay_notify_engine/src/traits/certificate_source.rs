use thiserror::Error;

use crate::certificates::Certificate;

#[allow(async_fn_in_trait)]
pub trait CertificateSource {
    /// Fetch the certificate with the given serial number from what the source currently holds.
    /// Returns `Ok(None)` if the source does not know the serial.
    async fn fetch_certificate(&self, serial_no: &str) -> Result<Option<Certificate>, CertificateSourceError>;

    /// Reload the full certificate set from the provider (or wherever the source gets them from) and return it.
    async fn refresh_all(&self) -> Result<Vec<Certificate>, CertificateSourceError>;
}

#[derive(Debug, Clone, Error)]
pub enum CertificateSourceError {
    #[error("Could not read certificate data. {0}")]
    Io(String),
    #[error("Certificate {serial_no} is invalid. {reason}")]
    InvalidCertificate { serial_no: String, reason: String },
    #[error("Certificate source is unavailable. {0}")]
    Unavailable(String),
}

impl From<std::io::Error> for CertificateSourceError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
