//! Financial assistant.
//!
//! Answers a handful of canned questions straight from the current payment
//! snapshot and loan reminders. Anything else is forwarded to the remote
//! chat-completion endpoint.

use crate::api::ApiClient;
use crate::repositories::LoanRepository;
use crate::services::transaction_store::TransactionStore;
use crate::utils::currency::{format_rupees, format_whole_rupees};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

const CHAT_UNAVAILABLE: &str =
    "Sorry, I'm having trouble connecting to the AI. Please try again later.";

/// Free-text completion for queries the canned answers do not cover.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, crate::errors::FetchError>;
}

#[async_trait]
impl ChatCompletion for ApiClient {
    async fn complete(&self, prompt: &str) -> Result<String, crate::errors::FetchError> {
        self.chat(prompt).await
    }
}

pub struct Assistant {
    store: Arc<TransactionStore>,
    loans: Arc<LoanRepository>,
    chat: Arc<dyn ChatCompletion>,
}

impl Assistant {
    pub fn new(
        store: Arc<TransactionStore>,
        loans: Arc<LoanRepository>,
        chat: Arc<dyn ChatCompletion>,
    ) -> Self {
        Self { store, loans, chat }
    }

    /// Answer a user query. Never fails: chat errors become an apology.
    pub async fn answer(&self, query: &str) -> String {
        if let Some(answer) = self.canned_answer(query).await {
            return answer;
        }

        match self.chat.complete(query).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::error!("Error communicating with chat endpoint: {}", e);
                CHAT_UNAVAILABLE.to_string()
            }
        }
    }

    /// Answers that can be computed locally, if the query asks for one.
    pub async fn canned_answer(&self, query: &str) -> Option<String> {
        let query = query.to_lowercase();

        if query.contains("balance") || query.contains("total payments") {
            let stats = self.store.statistics().await;
            return Some(format!(
                "Your total captured payments amount to {}.",
                format_rupees(stats.total_captured_amount)
            ));
        }

        if query.contains("failed payments") {
            let stats = self.store.statistics().await;
            return Some(format!(
                "You have had {} payments that failed.",
                stats.failed_count
            ));
        }

        if query.contains("upcoming loans") || query.contains("loan reminder") {
            return Some(self.loan_summary().await);
        }

        if let Some((_, recipient)) = query.split_once("paid to") {
            return Some(self.payments_to(recipient.trim()).await);
        }

        None
    }

    async fn loan_summary(&self) -> String {
        let loans = self.loans.upcoming(Utc::now().date_naive()).await;
        if loans.is_empty() {
            return "You don't have any upcoming loan reminders. You can add one in the 'Loan Reminders' tab.".to_string();
        }

        let lines: Vec<String> = loans
            .iter()
            .map(|loan| {
                format!(
                    "- {}: {} due on {}",
                    loan.name,
                    format_whole_rupees(loan.amount),
                    loan.due_date.format("%Y-%m-%d")
                )
            })
            .collect();
        format!(
            "Here are your upcoming loan reminders:\n{}",
            lines.join("\n")
        )
    }

    async fn payments_to(&self, recipient: &str) -> String {
        let recipient = recipient.trim_end_matches('?').trim();
        if recipient.is_empty() {
            return "Please specify who you paid. For example: 'how much did i paid to new.customer@web.com?'".to_string();
        }

        let records = self.store.current_records().await;
        let found: Vec<String> = records
            .iter()
            .filter(|p| {
                p.contact_email.to_lowercase().contains(recipient)
                    || p.contact_phone.to_lowercase().contains(recipient)
            })
            .map(|p| {
                format!(
                    "- ID: {}, Amount: {}, Status: {}, Paid To: {}",
                    p.id,
                    format_rupees(p.amount_minor_units),
                    p.status.as_str(),
                    p.contact_email
                )
            })
            .collect();

        if found.is_empty() {
            format!("I couldn't find any payments to \"{}\".", recipient)
        } else {
            format!(
                "Here are the transactions found for \"{}\":\n{}",
                recipient,
                found.join("\n")
            )
        }
    }
}
