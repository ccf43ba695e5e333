//! Transaction Store
//!
//! Holds the locally known list of payment records. Every successful refresh
//! replaces the whole list with the remote response; nothing is merged or
//! patched. Readers get an `Arc` snapshot, so a reader racing a refresh sees
//! either the old list or the new one, never a mix.

use crate::errors::FetchError;
use crate::utils::{PaymentRecord, SummaryStatistics};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Authoritative source of payment records.
#[async_trait]
pub trait PaymentSource: Send + Sync {
    async fn list_payments(&self) -> Result<Vec<PaymentRecord>, FetchError>;
}

/// Immutable view of the store contents at one point in time.
pub type Snapshot = Arc<[PaymentRecord]>;

pub struct TransactionStore {
    source: Arc<dyn PaymentSource>,
    records: RwLock<Snapshot>,
}

impl TransactionStore {
    pub fn new(source: Arc<dyn PaymentSource>) -> Self {
        Self {
            source,
            records: RwLock::new(Arc::from(Vec::new())),
        }
    }

    /// Fetch the remote list and, on success, replace the held list with it.
    ///
    /// On failure the held list is left untouched; the caller decides whether
    /// to clear it.
    pub async fn refresh(&self) -> Result<Snapshot, FetchError> {
        let fetched: Snapshot = self.source.list_payments().await?.into();
        Ok(self.replace(fetched).await)
    }

    /// Like [`refresh`](Self::refresh), but a failed fetch empties the held
    /// list. Success or failure, the list changes in one write.
    pub async fn refresh_or_clear(&self) -> Result<Snapshot, FetchError> {
        match self.source.list_payments().await {
            Ok(records) => Ok(self.replace(records.into()).await),
            Err(e) => {
                self.clear().await;
                Err(e)
            }
        }
    }

    // Single assignment under the write lock.
    async fn replace(&self, fetched: Snapshot) -> Snapshot {
        *self.records.write().await = fetched.clone();
        tracing::debug!("Transaction store replaced with {} records", fetched.len());
        fetched
    }

    pub async fn current_records(&self) -> Snapshot {
        self.records.read().await.clone()
    }

    /// Drop every held record.
    pub async fn clear(&self) {
        *self.records.write().await = Arc::from(Vec::new());
    }

    /// Statistics over the current snapshot.
    pub async fn statistics(&self) -> SummaryStatistics {
        Self::derive_statistics(&self.current_records().await)
    }

    pub fn derive_statistics(records: &[PaymentRecord]) -> SummaryStatistics {
        SummaryStatistics::from_records(records)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Test doubles for `PaymentSource`.

    use super::*;
    use crate::utils::PaymentStatus;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::{mpsc, oneshot};

    pub fn record(id: &str, amount: u64, status: PaymentStatus) -> PaymentRecord {
        PaymentRecord {
            id: id.to_string(),
            amount_minor_units: amount,
            status,
            created_at_epoch_seconds: 1723469882,
            method: "UPI".to_string(),
            contact_email: format!("{}@example.com", id),
            contact_phone: "9999999999".to_string(),
        }
    }

    /// Answers every call immediately with a scripted result and counts calls.
    pub struct ScriptedSource {
        response: Mutex<Result<Vec<PaymentRecord>, FetchError>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        pub fn new(response: Result<Vec<PaymentRecord>, FetchError>) -> Self {
            Self {
                response: Mutex::new(response),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn set_response(&self, response: Result<Vec<PaymentRecord>, FetchError>) {
            *self.response.lock().unwrap() = response;
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PaymentSource for ScriptedSource {
        async fn list_payments(&self) -> Result<Vec<PaymentRecord>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.response.lock().unwrap().clone()
        }
    }

    pub type Gate = oneshot::Sender<Result<Vec<PaymentRecord>, FetchError>>;

    /// Parks every call until the test releases it through the returned gate.
    pub struct GatedSource {
        gates: mpsc::UnboundedSender<Gate>,
    }

    impl GatedSource {
        pub fn new() -> (Self, mpsc::UnboundedReceiver<Gate>) {
            let (gates, pending) = mpsc::unbounded_channel();
            (Self { gates }, pending)
        }
    }

    #[async_trait]
    impl PaymentSource for GatedSource {
        async fn list_payments(&self) -> Result<Vec<PaymentRecord>, FetchError> {
            let (tx, rx) = oneshot::channel();
            self.gates
                .send(tx)
                .map_err(|_| FetchError::Network("gate receiver dropped".into()))?;
            rx.await
                .unwrap_or_else(|_| Err(FetchError::Network("gate dropped".into())))
        }
    }
}
