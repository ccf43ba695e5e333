//! Repository for loan reminder operations.
//!
//! Reminders live in memory for the lifetime of the process; there is no
//! persistence behind this repository.

use crate::errors::ServiceError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;
use validator::Validate;

/// A user-entered reminder that a loan instalment is due.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanReminder {
    pub id: String,
    pub name: String,
    /// Amount in rupees, as the user typed it
    pub amount: f64,
    pub due_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a reminder.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateLoanReminder {
    #[validate(length(min = 1, message = "Loan name is required"))]
    pub name: String,
    #[validate(range(exclusive_min = 0.0, message = "Loan amount must be positive"))]
    pub amount: f64,
    pub due_date: NaiveDate,
}

/// Repository for loan reminders.
///
/// Keeps insertion order so listings read the way they were entered.
pub struct LoanRepository {
    reminders: RwLock<Vec<LoanReminder>>,
}

impl LoanRepository {
    pub fn new() -> Self {
        Self {
            reminders: RwLock::new(Vec::new()),
        }
    }

    /// Creates a new reminder.
    ///
    /// # Returns
    /// The stored reminder with its generated id
    pub async fn create(&self, reminder: CreateLoanReminder) -> Result<LoanReminder, ServiceError> {
        let name = reminder.name.trim().to_string();
        CreateLoanReminder {
            name: name.clone(),
            ..reminder
        }
        .validate()?;
        if !reminder.amount.is_finite() {
            return Err(ServiceError::validation("Loan amount must be positive"));
        }

        let stored = LoanReminder {
            id: format!("loan_{}", Uuid::now_v7().simple()),
            name,
            amount: reminder.amount,
            due_date: reminder.due_date,
            created_at: Utc::now(),
        };

        self.reminders.write().await.push(stored.clone());
        tracing::debug!("Loan reminder {} added", stored.id);
        Ok(stored)
    }

    pub async fn list(&self) -> Vec<LoanReminder> {
        self.reminders.read().await.clone()
    }

    /// Reminders due on or after `today`, soonest first.
    pub async fn upcoming(&self, today: NaiveDate) -> Vec<LoanReminder> {
        let mut upcoming: Vec<LoanReminder> = self
            .reminders
            .read()
            .await
            .iter()
            .filter(|r| r.due_date >= today)
            .cloned()
            .collect();
        upcoming.sort_by_key(|r| r.due_date);
        upcoming
    }

    /// Deletes a reminder by id.
    pub async fn delete(&self, id: &str) -> Result<LoanReminder, ServiceError> {
        let mut reminders = self.reminders.write().await;
        let position = reminders
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| ServiceError::not_found("Loan reminder", id))?;
        Ok(reminders.remove(position))
    }
}

impl Default for LoanRepository {
    fn default() -> Self {
        Self::new()
    }
}
