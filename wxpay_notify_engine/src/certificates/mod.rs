//! # Platform certificates
//!
//! The provider signs every notification with the private key of one of its platform certificates, and names the
//! certificate in the `Wechatpay-Serial` header. A [`Certificate`] here is the part of that certificate the engine
//! needs: the serial number, the RSA public key and the validity window.
//!
//! Two [`crate::CertificateSource`] implementations are provided:
//! * [`MemoryCertificateSource`], for tests and deployments that configure keys in code.
//! * [`DirectoryCertificateSource`], which reads JSON descriptors from a certificate directory. Provisioning a new
//!   certificate is a matter of dropping a file into the directory; the next refresh picks it up.
mod directory_source;
mod memory_source;

use chrono::{DateTime, Utc};
pub use directory_source::DirectoryCertificateSource;
pub use memory_source::MemoryCertificateSource;
use rsa::{pkcs8::DecodePublicKey, RsaPublicKey};
use serde::{Deserialize, Serialize};

use crate::traits::CertificateSourceError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Certificate {
    pub serial_no: String,
    pub public_key: RsaPublicKey,
    pub effective_time: DateTime<Utc>,
    pub expire_time: DateTime<Utc>,
}

impl Certificate {
    pub fn new(
        serial_no: &str,
        public_key: RsaPublicKey,
        effective_time: DateTime<Utc>,
        expire_time: DateTime<Utc>,
    ) -> Self {
        Self { serial_no: serial_no.to_string(), public_key, effective_time, expire_time }
    }

    /// Builds a certificate from a PEM-encoded `SubjectPublicKeyInfo` (`-----BEGIN PUBLIC KEY-----`).
    pub fn from_public_key_pem(
        serial_no: &str,
        pem: &str,
        effective_time: DateTime<Utc>,
        expire_time: DateTime<Utc>,
    ) -> Result<Self, CertificateSourceError> {
        let public_key = RsaPublicKey::from_public_key_pem(pem.trim()).map_err(|e| {
            CertificateSourceError::InvalidCertificate {
                serial_no: serial_no.to_string(),
                reason: format!("Public key is not a valid RSA SPKI PEM. {e}"),
            }
        })?;
        Ok(Self::new(serial_no, public_key, effective_time, expire_time))
    }

    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        self.effective_time <= at && at <= self.expire_time
    }
}

/// The on-disk form of a certificate, mirroring the fields of the provider's certificate list.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CertificateDescriptor {
    pub serial_no: String,
    pub effective_time: DateTime<Utc>,
    pub expire_time: DateTime<Utc>,
    pub public_key: String,
}

impl TryFrom<CertificateDescriptor> for Certificate {
    type Error = CertificateSourceError;

    fn try_from(d: CertificateDescriptor) -> Result<Self, Self::Error> {
        if d.expire_time <= d.effective_time {
            return Err(CertificateSourceError::InvalidCertificate {
                serial_no: d.serial_no,
                reason: "Expiry time is not after the effective time".into(),
            });
        }
        Certificate::from_public_key_pem(&d.serial_no, &d.public_key, d.effective_time, d.expire_time)
    }
}
