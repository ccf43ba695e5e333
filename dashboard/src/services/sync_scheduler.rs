//! Sync Scheduler
//!
//! Keeps the [`TransactionStore`] in step with the remote payment list using
//! two independent triggers: a fixed-interval timer and the `payment:verified`
//! push event. Both post a [`RefreshTrigger`] into one mpsc queue. A single
//! dispatcher drains that queue and issues one refresh per message.
//!
//! Refreshes are issued, not awaited, by the dispatcher, so a push-triggered
//! refresh can overlap a timer-triggered one. Whichever response arrives last
//! becomes the current snapshot; there is no request sequencing.
//!
//! The timer, the push subscription and the dispatcher are owned together by
//! one [`ActiveSync`] and are always released together.

use crate::errors::SchedulerError;
use crate::services::push_channel::{PAYMENT_VERIFIED, PushChannel, PushEventFilter};
use crate::services::transaction_store::TransactionStore;
use crate::utils::SummaryStatistics;
use std::pin::pin;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::Poll;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock, RwLockReadGuard, mpsc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_stream::StreamExt;

const TRIGGER_QUEUE_SIZE: usize = 32;

/// Reference polling cadence.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10_000);

/// Invoked with fresh statistics after every refresh, successful or not.
pub type StatisticsCallback = Arc<dyn Fn(SummaryStatistics) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTrigger {
    /// Timer tick (the first tick fires immediately on start)
    Interval,
    /// `payment:verified` received on the push channel
    PaymentVerified,
    /// [`SyncScheduler::refresh_now`]
    Manual,
}

/// What to show when a refresh fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Treat "failed to load" as "nothing to show"
    #[default]
    ClearOnFailure,
    /// Keep displaying the last successful snapshot
    KeepStale,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clear" => Ok(FailurePolicy::ClearOnFailure),
            "keep_stale" | "keep-stale" => Ok(FailurePolicy::KeepStale),
            other => Err(format!("Unknown failure policy: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Stopped,
    Running,
}

/// Cleared on stop. A refresh holds `issuing` from the moment it checks the
/// gate until its fetch has been issued, so once [`RefreshGate::close`]
/// returns no new fetch can start.
struct RefreshGate {
    open: AtomicBool,
    issuing: RwLock<()>,
}

impl RefreshGate {
    fn new() -> Self {
        Self {
            open: AtomicBool::new(true),
            issuing: RwLock::new(()),
        }
    }

    async fn enter(&self) -> Option<RwLockReadGuard<'_, ()>> {
        let guard = self.issuing.read().await;
        self.open.load(Ordering::SeqCst).then_some(guard)
    }

    fn shut(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    /// Shut the gate and wait out refreshes that got past it but have not
    /// issued their fetch yet.
    async fn close(&self) {
        self.shut();
        drop(self.issuing.write().await);
    }
}

/// Everything the refresh path needs, shared with spawned refresh tasks.
#[derive(Clone)]
struct RefreshContext {
    store: Arc<TransactionStore>,
    failure_policy: FailurePolicy,
    on_statistics_changed: StatisticsCallback,
    gate: Arc<RefreshGate>,
}

/// Resources held while the scheduler is running.
struct ActiveSync {
    interval_task: JoinHandle<()>,
    push_task: JoinHandle<()>,
    dispatch_task: JoinHandle<()>,
    triggers: mpsc::Sender<RefreshTrigger>,
    gate: Arc<RefreshGate>,
}

impl ActiveSync {
    fn abort(&self) {
        self.gate.shut();
        self.interval_task.abort();
        self.push_task.abort();
        self.dispatch_task.abort();
    }

    /// Abort all three tasks and wait until they are gone.
    async fn shutdown(mut self) {
        self.abort();
        self.gate.close().await;
        for handle in [
            &mut self.interval_task,
            &mut self.push_task,
            &mut self.dispatch_task,
        ] {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    tracing::error!("Sync task ended abnormally: {}", e);
                }
            }
        }
    }
}

impl Drop for ActiveSync {
    fn drop(&mut self) {
        self.abort();
    }
}

pub struct SyncScheduler {
    store: Arc<TransactionStore>,
    push: Arc<dyn PushChannel>,
    failure_policy: FailurePolicy,
    active: Mutex<Option<ActiveSync>>,
}

impl SyncScheduler {
    pub fn new(store: Arc<TransactionStore>, push: Arc<dyn PushChannel>) -> Self {
        Self {
            store,
            push,
            failure_policy: FailurePolicy::default(),
            active: Mutex::new(None),
        }
    }

    pub fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    pub fn store(&self) -> &Arc<TransactionStore> {
        &self.store
    }

    pub async fn state(&self) -> SchedulerState {
        if self.active.lock().await.is_some() {
            SchedulerState::Running
        } else {
            SchedulerState::Stopped
        }
    }

    /// Start the timer and the push subscription.
    ///
    /// Calling this while running first tears down the previous timer and
    /// subscription, so at most one of each is ever active.
    pub async fn start(
        &self,
        interval: Duration,
        on_statistics_changed: StatisticsCallback,
    ) -> Result<(), SchedulerError> {
        if interval.is_zero() {
            return Err(SchedulerError::ZeroInterval);
        }

        let mut active = self.active.lock().await;
        if let Some(previous) = active.take() {
            tracing::info!("Sync scheduler already running, restarting");
            previous.shutdown().await;
        }

        // Subscribe before spawning anything so a failure leaves nothing behind.
        let mut subscription = self
            .push
            .subscribe(PushEventFilter::only(PAYMENT_VERIFIED))
            .await?;

        let gate = Arc::new(RefreshGate::new());
        let context = RefreshContext {
            store: self.store.clone(),
            failure_policy: self.failure_policy,
            on_statistics_changed,
            gate: gate.clone(),
        };

        let (trigger_tx, mut trigger_rx) = mpsc::channel::<RefreshTrigger>(TRIGGER_QUEUE_SIZE);

        let interval_tx = trigger_tx.clone();
        let interval_task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if interval_tx.send(RefreshTrigger::Interval).await.is_err() {
                    break;
                }
            }
        });

        let push_tx = trigger_tx.clone();
        let push_task = tokio::spawn(async move {
            tracing::info!("Listening for {} events", PAYMENT_VERIFIED);
            while let Some(event) = subscription.next().await {
                if event.is_lagged() {
                    tracing::info!("Push events were dropped, refreshing in case one was verified");
                } else {
                    tracing::debug!("Push event received: {}", event.name);
                }
                if push_tx.send(RefreshTrigger::PaymentVerified).await.is_err() {
                    break;
                }
            }
            tracing::info!("Push subscription for {} ended", PAYMENT_VERIFIED);
        });

        let dispatch_task = tokio::spawn(async move {
            while let Some(trigger) = trigger_rx.recv().await {
                tokio::spawn(run_refresh(context.clone(), trigger));
            }
        });

        *active = Some(ActiveSync {
            interval_task,
            push_task,
            dispatch_task,
            triggers: trigger_tx,
            gate,
        });

        tracing::info!(
            "Sync scheduler started with {}ms interval",
            interval.as_millis()
        );
        Ok(())
    }

    /// Cancel the timer and the push subscription.
    ///
    /// Refreshes already talking to the remote API are left to finish and
    /// still write their result into the store. No new refresh begins after
    /// this returns.
    pub async fn stop(&self) {
        let previous = self.active.lock().await.take();
        match previous {
            Some(active) => {
                active.shutdown().await;
                tracing::info!("Sync scheduler stopped");
            }
            None => tracing::debug!("Sync scheduler already stopped"),
        }
    }

    /// Queue a refresh alongside the timer and push triggers. Its statistics
    /// reach the callback registered with [`start`](Self::start).
    pub async fn refresh_now(&self) -> Result<(), SchedulerError> {
        let triggers = match self.active.lock().await.as_ref() {
            Some(active) => active.triggers.clone(),
            None => return Err(SchedulerError::NotRunning),
        };
        triggers
            .send(RefreshTrigger::Manual)
            .await
            .map_err(|_| SchedulerError::NotRunning)
    }
}

async fn run_refresh(context: RefreshContext, trigger: RefreshTrigger) {
    let Some(issuing) = context.gate.enter().await else {
        tracing::debug!("Skipping {:?} refresh, scheduler stopped", trigger);
        return;
    };

    let mut refresh = pin!(refresh_and_derive(&context, trigger));
    // Poll once so the fetch is under way before stop() can return.
    let first = futures::poll!(refresh.as_mut());
    drop(issuing);

    let stats = match first {
        Poll::Ready(stats) => stats,
        Poll::Pending => refresh.await,
    };
    (context.on_statistics_changed)(stats);
}

async fn refresh_and_derive(context: &RefreshContext, trigger: RefreshTrigger) -> SummaryStatistics {
    let result = match context.failure_policy {
        FailurePolicy::ClearOnFailure => context.store.refresh_or_clear().await,
        FailurePolicy::KeepStale => context.store.refresh().await,
    };

    match result {
        Ok(records) => {
            tracing::debug!("{:?} refresh loaded {} payments", trigger, records.len());
            TransactionStore::derive_statistics(&records)
        }
        Err(e) => {
            tracing::warn!("{:?} refresh failed: {}", trigger, e);
            match context.failure_policy {
                FailurePolicy::ClearOnFailure => SummaryStatistics::default(),
                FailurePolicy::KeepStale => context.store.statistics().await,
            }
        }
    }
}
