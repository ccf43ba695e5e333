//! Payment initiation.
//!
//! Wraps the create-order / verify-payment round trip around the hosted
//! checkout widget. The widget itself is opaque: the caller hands the
//! [`CheckoutSession`] to it and passes whatever it returns to
//! [`CheckoutService::complete`].

use crate::api::ApiClient;
use crate::api::models::VerifyPaymentRequest;
use crate::errors::ServiceError;
use crate::services::push_channel::{LocalPushChannel, PushEvent};
use crate::utils::currency::major_to_minor;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStatus {
    Idle,
    Processing,
    Success,
    Failed,
}

#[derive(Debug, Validate)]
struct CheckoutAmount {
    #[validate(range(exclusive_min = 0.0, message = "Please enter a valid amount"))]
    amount: f64,
}

/// Everything the hosted widget needs to open for one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutSession {
    pub order_id: String,
    pub amount_minor_units: u64,
    pub currency: String,
    /// Public gateway key the widget is opened with
    pub key_id: String,
}

pub struct CheckoutService {
    api: ApiClient,
    push: Arc<LocalPushChannel>,
    status: RwLock<CheckoutStatus>,
}

impl CheckoutService {
    pub fn new(api: ApiClient, push: Arc<LocalPushChannel>) -> Self {
        Self {
            api,
            push,
            status: RwLock::new(CheckoutStatus::Idle),
        }
    }

    pub async fn status(&self) -> CheckoutStatus {
        *self.status.read().await
    }

    /// Create a gateway order for `amount_major` rupees.
    pub async fn initiate(&self, amount_major: f64) -> Result<CheckoutSession, ServiceError> {
        CheckoutAmount {
            amount: amount_major,
        }
        .validate()?;
        let amount_minor_units = major_to_minor(amount_major)
            .ok_or_else(|| ServiceError::validation("Please enter a valid amount"))?;

        self.set_status(CheckoutStatus::Processing).await;

        match self.create_session(amount_major, amount_minor_units).await {
            Ok(session) => {
                tracing::info!(
                    "Checkout order {} created for {} paise",
                    session.order_id,
                    session.amount_minor_units
                );
                Ok(session)
            }
            Err(e) => {
                tracing::error!("Payment initiation error: {}", e);
                self.set_status(CheckoutStatus::Failed).await;
                Err(e)
            }
        }
    }

    async fn create_session(
        &self,
        amount_major: f64,
        amount_minor_units: u64,
    ) -> Result<CheckoutSession, ServiceError> {
        let response = self.api.create_order(amount_major).await?;

        if !response.success {
            return Err(ServiceError::ExternalService {
                message: response
                    .error
                    .unwrap_or_else(|| "Order creation failed".to_string()),
            });
        }

        let order = response.order.ok_or_else(|| ServiceError::ExternalService {
            message: "Order missing from create-order response".to_string(),
        })?;
        let key_id = response.key_id.ok_or_else(|| ServiceError::ExternalService {
            message: "Key id missing from create-order response".to_string(),
        })?;

        if order.amount != amount_minor_units {
            tracing::warn!(
                "Order {} amount {} differs from requested {} paise",
                order.id,
                order.amount,
                amount_minor_units
            );
        }

        Ok(CheckoutSession {
            order_id: order.id,
            amount_minor_units: order.amount,
            currency: order.currency,
            key_id,
        })
    }

    /// Verify what the widget returned and announce the result.
    ///
    /// A verified payment is published as `payment:verified` on the local push
    /// channel so the dashboard refreshes without waiting for the next poll.
    pub async fn complete(
        &self,
        session: &CheckoutSession,
        widget_response: VerifyPaymentRequest,
    ) -> CheckoutStatus {
        if widget_response.order_id != session.order_id {
            tracing::warn!(
                "Widget returned order {} for session {}",
                widget_response.order_id,
                session.order_id
            );
        }

        let status = match self.api.verify_payment(&widget_response).await {
            Ok(response) if response.success => {
                tracing::info!("Payment {} verified", widget_response.payment_id);
                self.push.publish(PushEvent::new(
                    crate::services::push_channel::PAYMENT_VERIFIED,
                    serde_json::json!({
                        "order_id": widget_response.order_id,
                        "payment_id": widget_response.payment_id,
                    }),
                ));
                CheckoutStatus::Success
            }
            Ok(_) => {
                tracing::warn!("Payment {} failed verification", widget_response.payment_id);
                CheckoutStatus::Failed
            }
            Err(e) => {
                tracing::error!("Payment verification error: {}", e);
                CheckoutStatus::Failed
            }
        };

        self.set_status(status).await;
        status
    }

    /// The user closed the widget without paying.
    pub async fn dismiss(&self) {
        let mut status = self.status.write().await;
        if *status == CheckoutStatus::Processing {
            *status = CheckoutStatus::Idle;
        }
    }

    pub async fn reset(&self) {
        self.set_status(CheckoutStatus::Idle).await;
    }

    async fn set_status(&self, status: CheckoutStatus) {
        *self.status.write().await = status;
    }
}
