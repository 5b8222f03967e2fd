mod headers;
mod signing;

pub use headers::{
    NotificationHeaders,
    SignedHeaders,
    HEADER_NONCE,
    HEADER_SERIAL,
    HEADER_SIGNATURE,
    HEADER_SIGNATURE_TYPE,
    HEADER_TIMESTAMP,
};
pub use signing::{signing_message, verify_signature, SignatureAlgorithm};
