use serde::{Deserialize, Serialize};
use wxpay_common::Fen;

use crate::{event_objects::EventType, DecryptedEvent};

/// A payment completed. Emitted for `TRANSACTION.SUCCESS` notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSucceededEvent {
    pub event_id: String,
    pub out_trade_no: String,
    pub transaction_id: String,
    pub amount: Option<Fen>,
    pub payer_openid: Option<String>,
    pub success_time: Option<String>,
    pub attach: Option<String>,
}

/// A payment did not complete (closed, revoked, failed). Emitted for other `TRANSACTION.*` notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentFailedEvent {
    pub event_id: String,
    pub out_trade_no: String,
    pub transaction_id: String,
    pub trade_state: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundEvent {
    pub event_id: String,
    pub out_trade_no: String,
    pub refund_id: String,
    pub out_refund_no: Option<String>,
    pub refund_status: Option<String>,
    pub refunded: Option<Fen>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentEvent {
    PaymentSucceeded(PaymentSucceededEvent),
    PaymentFailed(PaymentFailedEvent),
    Refund(RefundEvent),
}

impl PaymentEvent {
    /// Translates a decrypted notification into a typed event. Returns `None` for event types without a typed
    /// counterpart, or resources that lack the fields the typed event needs.
    pub fn from_notification(event: &DecryptedEvent) -> Option<Self> {
        match event.event_type {
            EventType::TransactionSuccess => {
                let tx = event.transaction()?;
                Some(Self::PaymentSucceeded(PaymentSucceededEvent {
                    event_id: event.event_id.clone(),
                    amount: tx.amount.as_ref().map(|a| a.total),
                    payer_openid: tx.payer.and_then(|p| p.openid),
                    out_trade_no: tx.out_trade_no,
                    transaction_id: tx.transaction_id,
                    success_time: tx.success_time,
                    attach: tx.attach,
                }))
            },
            EventType::TransactionFail => {
                let tx = event.transaction()?;
                Some(Self::PaymentFailed(PaymentFailedEvent {
                    event_id: event.event_id.clone(),
                    out_trade_no: tx.out_trade_no,
                    transaction_id: tx.transaction_id,
                    trade_state: tx.trade_state,
                    reason: tx.trade_state_desc,
                }))
            },
            EventType::Refund => {
                let refund = event.refund()?;
                Some(Self::Refund(RefundEvent {
                    event_id: event.event_id.clone(),
                    refunded: refund.amount.as_ref().map(|a| a.refund),
                    out_trade_no: refund.out_trade_no,
                    refund_id: refund.refund_id,
                    out_refund_no: refund.out_refund_no,
                    refund_status: refund.refund_status,
                }))
            },
            EventType::Other(_) => None,
        }
    }
}
