use serde::{Deserialize, Serialize};

/// Lifecycle state of a payment attempt as reported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Order created, payment not yet settled
    Created,
    /// Funds captured
    Captured,
    /// Payment failed
    Failed,
    /// Any status string the dashboard does not track
    #[serde(other)]
    Other,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Created => "created",
            PaymentStatus::Captured => "captured",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Other => "other",
        }
    }
}

/// One payment attempt as known to the remote system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: String,
    #[serde(rename = "amount")]
    pub amount_minor_units: u64,
    pub status: PaymentStatus,
    #[serde(rename = "created_at")]
    pub created_at_epoch_seconds: i64,
    #[serde(default)]
    pub method: String,
    #[serde(rename = "email", default)]
    pub contact_email: String,
    #[serde(rename = "contact", default)]
    pub contact_phone: String,
}

/// Aggregates derived from a list of payment records.
///
/// Always recomputed from the full list; never updated incrementally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SummaryStatistics {
    /// Sum of captured amounts, in minor units
    pub total_captured_amount: u64,
    pub captured_count: usize,
    pub failed_count: usize,
    pub pending_count: usize,
}

impl SummaryStatistics {
    pub fn from_records(records: &[PaymentRecord]) -> Self {
        records
            .iter()
            .fold(SummaryStatistics::default(), |mut stats, record| {
                match record.status {
                    PaymentStatus::Captured => {
                        stats.captured_count += 1;
                        stats.total_captured_amount = stats
                            .total_captured_amount
                            .saturating_add(record.amount_minor_units);
                    }
                    PaymentStatus::Failed => stats.failed_count += 1,
                    PaymentStatus::Created => stats.pending_count += 1,
                    PaymentStatus::Other => {}
                }
                stats
            })
    }
}
