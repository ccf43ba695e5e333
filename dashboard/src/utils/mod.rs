pub mod currency;
pub mod payment;

pub use payment::{PaymentRecord, PaymentStatus, SummaryStatistics};
