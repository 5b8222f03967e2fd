use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm,
    Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use log::{debug, trace};
use serde_json::Value;
use wxpay_common::Secret;

use crate::{
    notify_api::{
        errors::InvalidKeyLength,
        event_objects::{EncryptedResource, NotificationEnvelope},
    },
    DecryptError,
    DecryptedEvent,
};

pub const AEAD_AES_256_GCM: &str = "AEAD_AES_256_GCM";
pub const APIV3_KEY_LENGTH: usize = 32;
const GCM_NONCE_LENGTH: usize = 12;

/// Opens the encrypted `resource` of a notification with the merchant's APIv3 key.
///
/// Only `AEAD_AES_256_GCM` is supported. The authentication tag covers the ciphertext and the associated data, so a
/// change to either one, or a wrong key, surfaces as [`DecryptError::TamperDetected`].
#[derive(Clone)]
pub struct PayloadDecryptor {
    key: Secret<Vec<u8>>,
}

impl PayloadDecryptor {
    pub fn new(apiv3_key: &[u8]) -> Result<Self, InvalidKeyLength> {
        if apiv3_key.len() != APIV3_KEY_LENGTH {
            return Err(InvalidKeyLength(apiv3_key.len()));
        }
        Ok(Self { key: Secret::new(apiv3_key.to_vec()) })
    }

    pub fn from_secret(apiv3_key: &Secret<String>) -> Result<Self, InvalidKeyLength> {
        Self::new(apiv3_key.reveal().as_bytes())
    }

    /// Decrypts a single resource and returns the plaintext bytes.
    pub fn decrypt(&self, resource: &EncryptedResource) -> Result<Vec<u8>, DecryptError> {
        if resource.algorithm != AEAD_AES_256_GCM {
            return Err(DecryptError::UnsupportedAlgorithm(resource.algorithm.clone()));
        }
        let aad = resource.associated_data.as_deref().unwrap_or_default();
        decrypt_aes_256_gcm(self.key.reveal(), &resource.ciphertext, aad.as_bytes(), resource.nonce.as_bytes())
    }

    /// Parses a raw notification body, decrypts its resource and assembles the [`DecryptedEvent`].
    pub fn decrypt_event(&self, body: &[u8]) -> Result<DecryptedEvent, DecryptError> {
        let envelope = NotificationEnvelope::from_body(body)?;
        let plaintext = self.decrypt(&envelope.resource)?;
        let payload = serde_json::from_slice::<Value>(&plaintext)
            .map_err(|e| DecryptError::MalformedPayload(format!("Decrypted resource is not valid JSON. {e}")))?;
        let event = DecryptedEvent::from_parts(&envelope, payload)?;
        debug!("🔓️ Decrypted {} notification for event {}", event.raw_event_type, event.event_id);
        Ok(event)
    }
}

/// AES-256-GCM decryption of a base64 `ciphertext || tag`.
pub fn decrypt_aes_256_gcm(key: &[u8], ciphertext: &str, aad: &[u8], nonce: &[u8]) -> Result<Vec<u8>, DecryptError> {
    if nonce.len() != GCM_NONCE_LENGTH {
        return Err(DecryptError::MalformedPayload(format!(
            "Resource nonce must be {GCM_NONCE_LENGTH} bytes, got {}",
            nonce.len()
        )));
    }
    let ciphertext = STANDARD
        .decode(ciphertext.trim())
        .map_err(|e| DecryptError::MalformedPayload(format!("Resource ciphertext is not valid base64. {e}")))?;
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|_| DecryptError::MalformedPayload("The APIv3 key is not 32 bytes long".into()))?;
    cipher.decrypt(Nonce::from_slice(nonce), Payload { msg: &ciphertext, aad }).map_err(|_| {
        trace!("🔓️ AES-GCM tag check failed");
        DecryptError::TamperDetected
    })
}
