//! Request and response bodies for the payment and chat API.
//!
//! Field names follow the wire format of the remote service, which is why
//! some of them carry gateway-specific prefixes.

use crate::utils::PaymentRecord;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize)]
pub struct PaymentListResponse {
    /// Missing `items` is treated as an empty list
    #[serde(default)]
    pub items: Vec<PaymentRecord>,
}

#[derive(Debug, Serialize)]
pub struct CreateOrderRequest {
    /// Amount in major units (rupees); the server multiplies by 100
    pub amount: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Order {
    pub id: String,
    /// Amount in minor units (paise)
    pub amount: u64,
    pub currency: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CreateOrderResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<Order>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// What the hosted checkout widget hands back once the user has paid.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct VerifyPaymentRequest {
    #[serde(rename = "razorpay_order_id")]
    pub order_id: String,
    #[serde(rename = "razorpay_payment_id")]
    pub payment_id: String,
    #[serde(rename = "razorpay_signature")]
    pub signature: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct VerifyPaymentResponse {
    pub success: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    pub prompt: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ChatMessage {
    pub content: String,
}

impl ChatResponse {
    pub fn first_content(self) -> Option<String> {
        self.choices.into_iter().next().map(|c| c.message.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_list_without_items() {
        let list: PaymentListResponse = serde_json::from_str("{}").unwrap();
        assert!(list.items.is_empty());
    }

    #[test]
    fn test_create_order_failure_body() {
        let body = r#"{"success": false, "error": "amount too small"}"#;
        let response: CreateOrderResponse = serde_json::from_str(body).unwrap();
        assert!(!response.success);
        assert!(response.order.is_none());
        assert_eq!(response.error.as_deref(), Some("amount too small"));
    }

    #[test]
    fn test_verify_request_uses_gateway_field_names() {
        let request = VerifyPaymentRequest {
            order_id: "order_1".into(),
            payment_id: "pay_1".into(),
            signature: "sig".into(),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["razorpay_order_id"], "order_1");
        assert_eq!(value["razorpay_payment_id"], "pay_1");
        assert_eq!(value["razorpay_signature"], "sig");
    }
}
