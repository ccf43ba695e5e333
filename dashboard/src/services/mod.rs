pub mod assistant;
pub mod checkout;
pub mod push_channel;
pub mod sync_scheduler;
pub mod transaction_store;
