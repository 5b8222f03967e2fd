use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// The acknowledgement body the provider expects from a notify endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyReply {
    pub code: String,
    pub message: String,
}

impl NotifyReply {
    pub fn success() -> Self {
        Self { code: "SUCCESS".into(), message: "成功".into() }
    }

    pub fn failure() -> Self {
        Self { code: "FAILED".into(), message: "失败".into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub code: u16,
    pub message: String,
}

impl JsonResponse {
    pub fn ok<S: Display>(message: S) -> Self {
        Self { code: 200, message: message.to_string() }
    }
}
