use std::{fmt::Display, str::FromStr};

use base64::{engine::general_purpose::STANDARD, Engine};
use log::trace;
use rsa::{
    pkcs1v15::{Signature, VerifyingKey},
    signature::Verifier,
    RsaPublicKey,
};
use sha2::Sha256;

/// The signature schemes the provider declares in `Wechatpay-Signature-Type`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    /// RSASSA-PKCS1-v1_5 with SHA-256.
    #[default]
    Sha256Rsa2048,
}

impl Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sha256Rsa2048 => write!(f, "WECHATPAY2-SHA256-RSA2048"),
        }
    }
}

impl FromStr for SignatureAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "WECHATPAY2-SHA256-RSA2048" => Ok(Self::Sha256Rsa2048),
            other => Err(format!("Unsupported signature type: {other}")),
        }
    }
}

/// The canonical signing string: `timestamp\nnonce\nbody\n`, with the body bytes exactly as received.
pub fn signing_message(timestamp: &str, nonce: &str, body: &[u8]) -> Vec<u8> {
    let mut message = Vec::with_capacity(timestamp.len() + nonce.len() + body.len() + 3);
    message.extend_from_slice(timestamp.as_bytes());
    message.push(b'\n');
    message.extend_from_slice(nonce.as_bytes());
    message.push(b'\n');
    message.extend_from_slice(body);
    message.push(b'\n');
    message
}

/// Checks a base64 signature over `message`. Anything that does not decode to a well-formed signature is simply
/// invalid.
pub fn verify_signature(algorithm: SignatureAlgorithm, key: &RsaPublicKey, message: &[u8], signature: &str) -> bool {
    let Ok(bytes) = STANDARD.decode(signature.trim()) else {
        trace!("🔐️ Signature is not valid base64");
        return false;
    };
    match algorithm {
        SignatureAlgorithm::Sha256Rsa2048 => {
            let Ok(signature) = Signature::try_from(bytes.as_slice()) else {
                return false;
            };
            VerifyingKey::<Sha256>::new(key.clone()).verify(message, &signature).is_ok()
        },
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_utils::fixtures::{sign_message, test_public_key};

    #[test]
    fn canonical_message_layout() {
        let msg = signing_message("1554208460", "abc", br#"{"id":"EV-1"}"#);
        assert_eq!(msg, b"1554208460\nabc\n{\"id\":\"EV-1\"}\n".to_vec());
    }

    #[test]
    fn verify_good_and_bad_signatures() {
        let key = test_public_key();
        let msg = signing_message("1700000000", "nonce", b"body");
        let sig = sign_message(&msg);
        assert!(verify_signature(SignatureAlgorithm::Sha256Rsa2048, &key, &msg, &sig));
        let other = signing_message("1700000000", "nonce", b"bodY");
        assert!(!verify_signature(SignatureAlgorithm::Sha256Rsa2048, &key, &other, &sig));
        assert!(!verify_signature(SignatureAlgorithm::Sha256Rsa2048, &key, &msg, "WECHATPAY/SIGNTEST/abc"));
        assert!(!verify_signature(SignatureAlgorithm::Sha256Rsa2048, &key, &msg, "AAAA"));
    }

    #[test]
    fn signature_type_names() {
        assert_eq!("wechatpay2-sha256-rsa2048".parse::<SignatureAlgorithm>(), Ok(SignatureAlgorithm::Sha256Rsa2048));
        assert_eq!(SignatureAlgorithm::Sha256Rsa2048.to_string(), "WECHATPAY2-SHA256-RSA2048");
        assert!("HMAC-SHA256".parse::<SignatureAlgorithm>().is_err());
    }
}
