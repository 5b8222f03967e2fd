use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use thiserror::Error;
use wxpay_notify_engine::{EventStoreError, InvalidKeyLength};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("The caller is not allowed to use this endpoint. {0}")]
    ForbiddenPeer(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::ForbiddenPeer(_) => StatusCode::FORBIDDEN,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<InvalidKeyLength> for ServerError {
    fn from(e: InvalidKeyLength) -> Self {
        Self::ConfigurationError(format!("WXN_APIV3_KEY is invalid. {e}"))
    }
}

impl From<EventStoreError> for ServerError {
    fn from(e: EventStoreError) -> Self {
        Self::InitializeError(format!("Could not open the event store. {e}"))
    }
}
