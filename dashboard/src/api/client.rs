//! HTTP client for the payment and chat API.
//!
//! All four remote collaborators live behind one base URL. Every call maps
//! transport failures, non-success statuses and malformed bodies onto
//! [`FetchError`] so callers only deal with one error shape.

use crate::api::models::{
    ChatRequest, ChatResponse, CreateOrderRequest, CreateOrderResponse, PaymentListResponse,
    VerifyPaymentRequest, VerifyPaymentResponse,
};
use crate::errors::FetchError;
use crate::services::transaction_store::PaymentSource;
use crate::utils::PaymentRecord;
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

const PAYMENTS_PATH: &str = "/razorpay/payments";
const CREATE_ORDER_PATH: &str = "/razorpay/create-order";
const VERIFY_PAYMENT_PATH: &str = "/razorpay/verify-payment";
const CHAT_PATH: &str = "/openai/chat";

#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: reqwest::Client::new(),
            base_url,
            timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the authoritative list of payments.
    pub async fn list_payments(&self) -> Result<Vec<PaymentRecord>, FetchError> {
        let response: PaymentListResponse = self.get(PAYMENTS_PATH).await?;
        Ok(response.items)
    }

    /// Ask the server to create a gateway order for `amount_major` rupees.
    ///
    /// A `success: false` body is returned as-is; only transport problems are errors.
    pub async fn create_order(&self, amount_major: f64) -> Result<CreateOrderResponse, FetchError> {
        self.post(
            CREATE_ORDER_PATH,
            &CreateOrderRequest {
                amount: amount_major,
            },
        )
        .await
    }

    pub async fn verify_payment(
        &self,
        request: &VerifyPaymentRequest,
    ) -> Result<VerifyPaymentResponse, FetchError> {
        self.post(VERIFY_PAYMENT_PATH, request).await
    }

    /// Send a free-text prompt to the chat-completion endpoint.
    pub async fn chat(&self, prompt: &str) -> Result<String, FetchError> {
        let response: ChatResponse = self
            .post(
                CHAT_PATH,
                &ChatRequest {
                    prompt: prompt.to_string(),
                },
            )
            .await?;

        response
            .first_content()
            .ok_or_else(|| FetchError::Decode("chat response contained no choices".into()))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, FetchError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await?;

        Self::decode(response).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, FetchError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(body)
            .send()
            .await?;

        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, FetchError> {
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| FetchError::Decode(e.to_string()))
    }
}

#[async_trait]
impl PaymentSource for ApiClient {
    async fn list_payments(&self) -> Result<Vec<PaymentRecord>, FetchError> {
        ApiClient::list_payments(self).await
    }
}
