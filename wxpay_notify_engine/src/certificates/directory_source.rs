use std::path::{Path, PathBuf};

use log::*;

use crate::{
    certificates::{Certificate, CertificateDescriptor},
    traits::{CertificateSource, CertificateSourceError},
};

/// Reads platform certificates from `*.json` descriptor files in a directory.
///
/// Serial numbers arrive in request headers, so they are only ever compared against the `serial_no` field of the
/// descriptors and never used to build a path. Files that cannot be parsed are logged and skipped, so that one bad
/// file does not take the other certificates down with it.
///
/// The directory has no index by serial, so finding a single certificate costs as much as loading all of them.
/// `fetch_certificate` therefore holds nothing and leaves the scan to `refresh_all`, which the cache rate-limits.
#[derive(Clone, Debug)]
pub struct DirectoryCertificateSource {
    dir: PathBuf,
}

impl DirectoryCertificateSource {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self { dir: dir.as_ref().to_path_buf() }
    }

    pub fn dir(&self) -> &Path {
        self.dir.as_path()
    }

    async fn load_all(&self) -> Result<Vec<Certificate>, CertificateSourceError> {
        let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(|e| {
            CertificateSourceError::Io(format!("Could not read certificate directory {}. {e}", self.dir.display()))
        })?;
        let mut result = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match load_descriptor(&path).await {
                Ok(cert) => {
                    trace!("📜️ Loaded certificate {} from {}", cert.serial_no, path.display());
                    result.push(cert)
                },
                Err(e) => warn!("📜️ Skipping certificate file {}. {e}", path.display()),
            }
        }
        debug!("📜️ {} certificates loaded from {}", result.len(), self.dir.display());
        Ok(result)
    }
}

async fn load_descriptor(path: &Path) -> Result<Certificate, CertificateSourceError> {
    let data = tokio::fs::read(path).await?;
    let descriptor = serde_json::from_slice::<CertificateDescriptor>(&data)
        .map_err(|e| CertificateSourceError::Io(format!("Not a certificate descriptor. {e}")))?;
    Certificate::try_from(descriptor)
}

impl CertificateSource for DirectoryCertificateSource {
    async fn fetch_certificate(&self, serial_no: &str) -> Result<Option<Certificate>, CertificateSourceError> {
        trace!("📜️ Certificate {serial_no} requested. The directory is only read on refresh.");
        Ok(None)
    }

    async fn refresh_all(&self) -> Result<Vec<Certificate>, CertificateSourceError> {
        self.load_all().await
    }
}
