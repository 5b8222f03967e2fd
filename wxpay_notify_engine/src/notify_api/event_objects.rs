use std::fmt::Display;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use wxpay_common::Fen;

use crate::DecryptError;

//--------------------------------------   NotificationEnvelope   -----------------------------------------------------
/// The outer, plaintext JSON body of a notification.
///
/// ```json
/// {
///   "id": "EV-2018022511223320873",
///   "create_time": "2015-05-20T13:29:35+08:00",
///   "resource_type": "encrypt-resource",
///   "event_type": "TRANSACTION.SUCCESS",
///   "summary": "支付成功",
///   "resource": { "algorithm": "AEAD_AES_256_GCM", "ciphertext": "...", "associated_data": "transaction",
///                 "original_type": "transaction", "nonce": "..." }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEnvelope {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub create_time: Option<String>,
    #[serde(alias = "type")]
    pub event_type: String,
    #[serde(default)]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    pub resource: EncryptedResource,
}

impl NotificationEnvelope {
    pub fn from_body(body: &[u8]) -> Result<Self, DecryptError> {
        serde_json::from_slice(body)
            .map_err(|e| DecryptError::MalformedPayload(format!("Notification body is not a valid envelope. {e}")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedResource {
    pub algorithm: String,
    /// Base64 of the ciphertext with the 16-byte authentication tag appended.
    pub ciphertext: String,
    #[serde(default)]
    pub associated_data: Option<String>,
    #[serde(default)]
    pub original_type: Option<String>,
    pub nonce: String,
}

//--------------------------------------        EventType        -----------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventType {
    TransactionSuccess,
    TransactionFail,
    Refund,
    Other(String),
}

impl EventType {
    /// Maps the provider's event type string onto the kinds the engine distinguishes.
    ///
    /// Matching is case-insensitive, and `-` or `_` may stand in for the dot. `TRANSACTION.SUCCESS` is a successful
    /// payment; any other `TRANSACTION.*` type is a failed or closed one. Every `REFUND.*` type is a refund.
    pub fn from_provider(s: &str) -> Self {
        let normalized = s.trim().to_ascii_uppercase().replace(['-', '_'], ".");
        match normalized.split_once('.') {
            Some(("TRANSACTION", "SUCCESS")) => Self::TransactionSuccess,
            Some(("TRANSACTION", _)) => Self::TransactionFail,
            Some(("REFUND", _)) => Self::Refund,
            _ => Self::Other(s.trim().to_string()),
        }
    }

    pub fn is_transaction(&self) -> bool {
        matches!(self, Self::TransactionSuccess | Self::TransactionFail)
    }
}

impl Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TransactionSuccess => write!(f, "transaction-success"),
            Self::TransactionFail => write!(f, "transaction-fail"),
            Self::Refund => write!(f, "refund"),
            Self::Other(s) => write!(f, "{s}"),
        }
    }
}

//--------------------------------------      DecryptedEvent      -----------------------------------------------------
/// An authenticated, decrypted notification.
///
/// `payload` is the decrypted resource as the provider sent it. Typed views such as [`DecryptedEvent::transaction`]
/// are available for the common event kinds.
#[derive(Debug, Clone, PartialEq)]
pub struct DecryptedEvent {
    pub event_id: String,
    pub event_type: EventType,
    /// The event type string exactly as it appeared in the envelope.
    pub raw_event_type: String,
    pub notification_id: Option<String>,
    pub create_time: Option<String>,
    pub summary: Option<String>,
    pub original_type: Option<String>,
    pub payload: Value,
}

impl DecryptedEvent {
    /// Combines the plaintext envelope with the decrypted resource.
    ///
    /// The event id is taken from the first of these that is present:
    /// 1. the envelope's `id`, which names one notification and is repeated verbatim on every redelivery,
    /// 2. an explicit `event_id` field in the decrypted resource,
    /// 3. `{event_type}:{refund_id}` for refunds, `{event_type}:{transaction_id}` for transactions.
    ///
    /// The resource ids are always qualified by the event type. One refund can produce both a `REFUND.ABNORMAL` and a
    /// later `REFUND.SUCCESS`, and those are different events.
    pub fn from_parts(envelope: &NotificationEnvelope, payload: Value) -> Result<Self, DecryptError> {
        if !payload.is_object() {
            return Err(DecryptError::MalformedPayload("Decrypted resource is not a JSON object".into()));
        }
        let event_type = EventType::from_provider(&envelope.event_type);
        let natural_key = match event_type {
            EventType::Refund => Some("refund_id"),
            EventType::TransactionSuccess | EventType::TransactionFail => Some("transaction_id"),
            EventType::Other(_) => None,
        };
        let event_id = envelope
            .id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .or_else(|| string_field(&payload, "event_id"))
            .or_else(|| {
                natural_key
                    .and_then(|k| string_field(&payload, k))
                    .map(|id| format!("{}:{id}", envelope.event_type.trim().to_ascii_uppercase()))
            })
            .ok_or_else(|| DecryptError::MalformedPayload("Notification carries no usable event id".into()))?;
        Ok(Self {
            event_id,
            event_type,
            raw_event_type: envelope.event_type.clone(),
            notification_id: envelope.id.clone(),
            create_time: envelope.create_time.clone(),
            summary: envelope.summary.clone(),
            original_type: envelope.resource.original_type.clone(),
            payload,
        })
    }

    /// The merchant's order number, which groups the notifications for one order.
    pub fn idempotency_token(&self) -> Option<String> {
        string_field(&self.payload, "out_trade_no")
    }

    /// A typed view of a transaction event's resource. Returns `None` for other kinds of event, or if the resource
    /// does not have the shape of a transaction.
    pub fn transaction(&self) -> Option<TransactionResource> {
        if !self.event_type.is_transaction() {
            return None;
        }
        serde_json::from_value(self.payload.clone()).ok()
    }

    pub fn refund(&self) -> Option<RefundResource> {
        if self.event_type != EventType::Refund {
            return None;
        }
        serde_json::from_value(self.payload.clone()).ok()
    }
}

fn string_field(payload: &Value, key: &str) -> Option<String> {
    match payload.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

//--------------------------------------   Typed resource views   -----------------------------------------------------
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionResource {
    #[serde(default)]
    pub appid: Option<String>,
    #[serde(default)]
    pub mchid: Option<String>,
    pub out_trade_no: String,
    pub transaction_id: String,
    #[serde(default)]
    pub trade_type: Option<String>,
    #[serde(default)]
    pub trade_state: Option<String>,
    #[serde(default)]
    pub trade_state_desc: Option<String>,
    #[serde(default)]
    pub bank_type: Option<String>,
    #[serde(default)]
    pub attach: Option<String>,
    #[serde(default)]
    pub success_time: Option<String>,
    #[serde(default)]
    pub payer: Option<Payer>,
    #[serde(default)]
    pub amount: Option<TransactionAmount>,
}

impl TransactionResource {
    pub fn is_paid(&self) -> bool {
        self.trade_state.as_deref() == Some("SUCCESS")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payer {
    #[serde(default)]
    pub openid: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionAmount {
    pub total: Fen,
    #[serde(default)]
    pub payer_total: Option<Fen>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub payer_currency: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundResource {
    #[serde(default)]
    pub mchid: Option<String>,
    pub out_trade_no: String,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub out_refund_no: Option<String>,
    pub refund_id: String,
    #[serde(default)]
    pub refund_status: Option<String>,
    #[serde(default)]
    pub success_time: Option<String>,
    #[serde(default)]
    pub amount: Option<RefundAmount>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundAmount {
    pub total: Fen,
    pub refund: Fen,
    #[serde(default)]
    pub payer_total: Option<Fen>,
    #[serde(default)]
    pub payer_refund: Option<Fen>,
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    fn envelope(event_type: &str, id: Option<&str>) -> NotificationEnvelope {
        NotificationEnvelope {
            id: id.map(String::from),
            create_time: None,
            event_type: event_type.to_string(),
            resource_type: Some("encrypt-resource".into()),
            summary: None,
            resource: EncryptedResource {
                algorithm: "AEAD_AES_256_GCM".into(),
                ciphertext: String::new(),
                associated_data: None,
                original_type: Some("transaction".into()),
                nonce: "000000000000".into(),
            },
        }
    }

    #[test]
    fn event_types() {
        assert_eq!(EventType::from_provider("TRANSACTION.SUCCESS"), EventType::TransactionSuccess);
        assert_eq!(EventType::from_provider("transaction.success"), EventType::TransactionSuccess);
        assert_eq!(EventType::from_provider("transaction-success"), EventType::TransactionSuccess);
        assert_eq!(EventType::from_provider("REFUND_CLOSED"), EventType::Refund);
        assert_eq!(EventType::from_provider("TRANSACTION.CLOSED"), EventType::TransactionFail);
        assert_eq!(EventType::from_provider("REFUND.ABNORMAL"), EventType::Refund);
        assert_eq!(EventType::from_provider("PROFITSHARING.FINISH"), EventType::Other("PROFITSHARING.FINISH".into()));
    }

    #[test]
    fn envelope_accepts_type_alias() {
        let body = br#"{"type":"TRANSACTION.SUCCESS","resource":{"algorithm":"AEAD_AES_256_GCM","ciphertext":"AA==","nonce":"abcdefghijkl"}}"#;
        let envelope = NotificationEnvelope::from_body(body).unwrap();
        assert_eq!(envelope.event_type, "TRANSACTION.SUCCESS");
        assert!(envelope.id.is_none());
        assert!(matches!(NotificationEnvelope::from_body(b"not json"), Err(DecryptError::MalformedPayload(_))));
    }

    #[test]
    fn event_id_precedence() {
        let env = envelope("TRANSACTION.SUCCESS", Some("EV-1"));
        let explicit = json!({"event_id": "E1", "transaction_id": "T1", "out_trade_no": "order-1"});
        let event = DecryptedEvent::from_parts(&env, explicit).unwrap();
        assert_eq!(event.event_id, "EV-1");
        assert_eq!(event.idempotency_token().as_deref(), Some("order-1"));

        let env = envelope("TRANSACTION.SUCCESS", None);
        let explicit = json!({"event_id": "E1", "transaction_id": "T1"});
        assert_eq!(DecryptedEvent::from_parts(&env, explicit).unwrap().event_id, "E1");
        let natural = json!({"transaction_id": "T1"});
        assert_eq!(DecryptedEvent::from_parts(&env, natural).unwrap().event_id, "TRANSACTION.SUCCESS:T1");
        let blank = envelope("TRANSACTION.SUCCESS", Some("  "));
        assert_eq!(DecryptedEvent::from_parts(&blank, json!({"event_id": "E1"})).unwrap().event_id, "E1");
    }

    #[test]
    fn refund_outcomes_are_distinct_events() {
        let payload = json!({"transaction_id": "T1", "refund_id": "R1", "out_trade_no": "order-1"});
        let abnormal = DecryptedEvent::from_parts(&envelope("REFUND.ABNORMAL", None), payload.clone()).unwrap();
        let success = DecryptedEvent::from_parts(&envelope("REFUND.SUCCESS", None), payload).unwrap();
        assert_eq!(abnormal.event_id, "REFUND.ABNORMAL:R1");
        assert_eq!(success.event_id, "REFUND.SUCCESS:R1");
    }

    #[test]
    fn missing_event_id_is_malformed() {
        let env = envelope("TRANSACTION.SUCCESS", None);
        let err = DecryptedEvent::from_parts(&env, json!({"out_trade_no": "order-1"})).unwrap_err();
        assert!(matches!(err, DecryptError::MalformedPayload(_)));
        let err = DecryptedEvent::from_parts(&env, json!(["E1"])).unwrap_err();
        assert!(matches!(err, DecryptError::MalformedPayload(_)));
    }

    #[test]
    fn transaction_view() {
        let env = envelope("TRANSACTION.SUCCESS", Some("EV-1"));
        let payload = json!({
            "mchid": "1230000109",
            "out_trade_no": "order-1",
            "transaction_id": "T1",
            "trade_state": "SUCCESS",
            "payer": {"openid": "oUpF8uMuAJO_M2pxb1Q9zNjWeS6o"},
            "amount": {"total": 100, "payer_total": 100, "currency": "CNY", "payer_currency": "CNY"}
        });
        let event = DecryptedEvent::from_parts(&env, payload).unwrap();
        let tx = event.transaction().unwrap();
        assert!(tx.is_paid());
        assert_eq!(tx.amount.unwrap().total, Fen::from(100));
        assert!(event.refund().is_none());
    }
}
