//! # Notification headers
//!
//! The provider authenticates a notification with five headers:
//!
//! ```text
//!    Wechatpay-Timestamp:      1554208460
//!    Wechatpay-Nonce:          593BEC0C930BF1AFEB40B4A08C8FB242
//!    Wechatpay-Signature:      <base64 signature>
//!    Wechatpay-Serial:         5157F09EFDC096DE15EBE81A47057A7232F1B8E1
//!    Wechatpay-Signature-Type: WECHATPAY2-SHA256-RSA2048
//! ```
//!
//! Header names are matched case-insensitively. Some frameworks hand over headers in CGI form
//! (`HTTP_WECHATPAY_SIGNATURE`), so those are accepted as well.
use std::str::FromStr;

use crate::{helpers::SignatureAlgorithm, VerificationError};

pub const HEADER_SIGNATURE: &str = "Wechatpay-Signature";
pub const HEADER_TIMESTAMP: &str = "Wechatpay-Timestamp";
pub const HEADER_NONCE: &str = "Wechatpay-Nonce";
pub const HEADER_SERIAL: &str = "Wechatpay-Serial";
pub const HEADER_SIGNATURE_TYPE: &str = "Wechatpay-Signature-Type";

/// The raw header fields of an inbound notification, in the order they were received.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationHeaders {
    fields: Vec<(String, String)>,
}

impl NotificationHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name` to `value`, replacing any existing values for it.
    pub fn insert<K: Into<String>, V: Into<String>>(&mut self, name: K, value: V) {
        let name = name.into();
        let wanted = normalize(&name);
        self.fields.retain(|(k, _)| normalize(k) != wanted);
        self.fields.push((name, value.into()));
    }

    /// Adds a value for `name`, keeping existing ones.
    pub fn append<K: Into<String>, V: Into<String>>(&mut self, name: K, value: V) {
        self.fields.push((name.into(), value.into()));
    }

    pub fn with<K: Into<String>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.insert(name, value);
        self
    }

    /// Returns the first value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        let wanted = normalize(name);
        self.fields.iter().find(|(k, _)| normalize(k) == wanted).map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for NotificationHeaders {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let fields = iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Self { fields }
    }
}

fn normalize(name: &str) -> String {
    let name = name.trim().to_ascii_uppercase().replace('-', "_");
    match name.strip_prefix("HTTP_") {
        Some(stripped) => stripped.to_string(),
        None => name,
    }
}

/// The authentication fields of a notification, parsed and checked for presence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    /// The timestamp exactly as sent. The signing string must use these bytes, not a re-rendering of `timestamp`.
    pub timestamp_raw: String,
    pub timestamp: i64,
    pub nonce: String,
    pub signature: String,
    pub serial_no: String,
    pub algorithm: SignatureAlgorithm,
}

impl SignedHeaders {
    pub fn from_headers(headers: &NotificationHeaders) -> Result<Self, VerificationError> {
        let required = |name: &str| {
            headers
                .get(name)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or_else(|| VerificationError::MalformedHeaders(format!("{name} header is missing")))
        };
        let timestamp_raw = required(HEADER_TIMESTAMP)?;
        let timestamp = timestamp_raw.parse::<i64>().map_err(|e| {
            VerificationError::MalformedHeaders(format!("{HEADER_TIMESTAMP} is not a unix timestamp. {e}"))
        })?;
        let nonce = required(HEADER_NONCE)?;
        let signature = required(HEADER_SIGNATURE)?;
        let serial_no = required(HEADER_SERIAL)?;
        let algorithm = match headers.get(HEADER_SIGNATURE_TYPE).map(str::trim) {
            None | Some("") => SignatureAlgorithm::default(),
            Some(s) => SignatureAlgorithm::from_str(s).map_err(VerificationError::MalformedHeaders)?,
        };
        Ok(Self { timestamp_raw, timestamp, nonce, signature, serial_no, algorithm })
    }
}
