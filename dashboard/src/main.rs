use anyhow::Context;
use chrono::NaiveDate;
use money_dashboard::api::ApiClient;
use money_dashboard::api::models::VerifyPaymentRequest;
use money_dashboard::config::Config;
use money_dashboard::repositories::{CreateLoanReminder, LoanRepository};
use money_dashboard::services::assistant::Assistant;
use money_dashboard::services::checkout::{CheckoutService, CheckoutSession};
use money_dashboard::services::push_channel::LocalPushChannel;
use money_dashboard::services::sync_scheduler::{StatisticsCallback, SyncScheduler};
use money_dashboard::services::transaction_store::TransactionStore;
use money_dashboard::utils::SummaryStatistics;
use money_dashboard::utils::currency::{format_rupees, format_whole_rupees};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const HELP: &str = "\
Commands:
  /payments                         list current payments
  /refresh                          reload payments now
  /pay <amount>                     create a checkout order
  /verify <payment_id> <signature>  verify the last checkout order
  /loans                            list loan reminders
  /loan <name>|<amount>|<YYYY-MM-DD> add a loan reminder
  /unloan <id>                      remove a loan reminder
  /quit                             exit
Anything else is sent to the assistant.";

struct Dashboard {
    scheduler: Arc<SyncScheduler>,
    store: Arc<TransactionStore>,
    loans: Arc<LoanRepository>,
    checkout: CheckoutService,
    assistant: Assistant,
    session: Option<CheckoutSession>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,money_dashboard=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting payment dashboard");

    let config = Config::from_env().context("error with configuration")?;
    tracing::info!("Using payment API at {}", config.api_base_url);

    let api = ApiClient::new(config.api_base_url.clone(), config.request_timeout);
    let push = Arc::new(LocalPushChannel::new());
    let store = Arc::new(TransactionStore::new(Arc::new(api.clone())));
    let loans = Arc::new(LoanRepository::new());

    let scheduler = Arc::new(
        SyncScheduler::new(store.clone(), push.clone()).with_failure_policy(config.failure_policy),
    );

    let on_statistics_changed: StatisticsCallback = Arc::new(|stats: SummaryStatistics| {
        tracing::info!(
            "Revenue {} | successful {} | pending {} | failed {}",
            format_rupees(stats.total_captured_amount),
            stats.captured_count,
            stats.pending_count,
            stats.failed_count
        );
    });
    scheduler
        .start(config.poll_interval, on_statistics_changed)
        .await
        .context("Failed to start sync scheduler")?;

    let mut dashboard = Dashboard {
        scheduler: scheduler.clone(),
        store: store.clone(),
        loans: loans.clone(),
        checkout: CheckoutService::new(api.clone(), push.clone()),
        assistant: Assistant::new(store, loans, Arc::new(api)),
        session: None,
    };

    println!("{}", HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
            line = lines.next_line() => {
                match line.context("Failed to read stdin")? {
                    Some(line) => {
                        if !dashboard.handle(line.trim()).await {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    scheduler.stop().await;
    push.close();
    tracing::info!("Payment dashboard stopped");
    Ok(())
}

impl Dashboard {
    /// Returns `false` when the user asked to quit.
    async fn handle(&mut self, line: &str) -> bool {
        if line.is_empty() {
            return true;
        }

        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();

        match command {
            "/quit" | "/exit" => return false,
            "/help" => println!("{}", HELP),
            "/payments" => self.print_payments().await,
            "/refresh" => {
                if let Err(e) = self.scheduler.refresh_now().await {
                    println!("{}", e);
                }
            }
            "/pay" => self.pay(rest).await,
            "/verify" => self.verify(rest).await,
            "/loans" => self.print_loans().await,
            "/loan" => self.add_loan(rest).await,
            "/unloan" => match self.loans.delete(rest).await {
                Ok(loan) => println!("Removed {}", loan.name),
                Err(e) => println!("{}", e),
            },
            _ => println!("{}", self.assistant.answer(line).await),
        }
        true
    }

    async fn print_payments(&self) {
        let records = self.store.current_records().await;
        if records.is_empty() {
            println!("No transactions found.");
            return;
        }
        for p in records.iter() {
            let email = if p.contact_email.is_empty() {
                "No Email"
            } else {
                p.contact_email.as_str()
            };
            let created = chrono::DateTime::from_timestamp(p.created_at_epoch_seconds, 0)
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default();
            println!(
                "{:<10} {:<24} {:<28} {:>12}  {}",
                p.status.as_str(),
                p.id,
                email,
                format_rupees(p.amount_minor_units),
                created
            );
        }
    }

    async fn pay(&mut self, amount: &str) {
        let amount: f64 = match amount.parse() {
            Ok(amount) => amount,
            Err(_) => {
                println!("Please enter a valid amount");
                return;
            }
        };

        match self.checkout.initiate(amount).await {
            Ok(session) => {
                println!(
                    "Order {} for {} {} created, open the checkout widget with key {}",
                    session.order_id,
                    format_rupees(session.amount_minor_units),
                    session.currency,
                    session.key_id
                );
                self.session = Some(session);
            }
            Err(e) => println!("Payment initiation failed: {}", e),
        }
    }

    async fn verify(&mut self, args: &str) {
        let Some(session) = self.session.take() else {
            println!("No checkout in progress, start one with /pay");
            return;
        };
        let mut parts = args.split_whitespace();
        let (Some(payment_id), Some(signature)) = (parts.next(), parts.next()) else {
            println!("Usage: /verify <payment_id> <signature>");
            self.session = Some(session);
            return;
        };

        let status = self
            .checkout
            .complete(
                &session,
                VerifyPaymentRequest {
                    order_id: session.order_id.clone(),
                    payment_id: payment_id.to_string(),
                    signature: signature.to_string(),
                },
            )
            .await;
        println!("Payment {:?}", status);
    }

    async fn print_loans(&self) {
        let loans = self.loans.list().await;
        if loans.is_empty() {
            println!("No loan reminders set. Add one with /loan");
        }
        for loan in loans {
            println!(
                "{}  {:<20} {:>12}  due {}",
                loan.id,
                loan.name,
                format_whole_rupees(loan.amount),
                loan.due_date
            );
        }
    }

    async fn add_loan(&self, args: &str) {
        let fields: Vec<&str> = args.split('|').map(str::trim).collect();
        let [name, amount, due] = fields.as_slice() else {
            println!("Usage: /loan <name>|<amount>|<YYYY-MM-DD>");
            return;
        };
        let (Ok(amount), Ok(due_date)) = (
            amount.parse::<f64>(),
            NaiveDate::parse_from_str(due, "%Y-%m-%d"),
        ) else {
            println!("Usage: /loan <name>|<amount>|<YYYY-MM-DD>");
            return;
        };

        let reminder = CreateLoanReminder {
            name: name.to_string(),
            amount,
            due_date,
        };
        match self.loans.create(reminder).await {
            Ok(loan) => println!("Added {} ({})", loan.name, loan.id),
            Err(e) => println!("{}", e),
        }
    }
}
