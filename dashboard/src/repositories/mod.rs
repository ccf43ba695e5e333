pub mod loan_repository;

pub use loan_repository::{CreateLoanReminder, LoanReminder, LoanRepository};
