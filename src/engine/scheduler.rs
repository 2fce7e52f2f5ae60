//! Acquisition scheduler.
//!
//! On every tick the scheduler takes a slot from the admission gate (a
//! counting semaphore) and spawns an acquisition attempt holding it. When
//! all slots are busy the tick waits for one to free up instead of being
//! dropped. An attempt fetches the newest listing, filters it, claims it
//! in the position cache, buys, and hands the position to its own monitor
//! task. The slot is returned when the attempt ends, whatever the result.

use chrono::Utc;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::engine::cache::{Claim, PositionCache};
use crate::engine::cancelled;
use crate::engine::executor::TradeExecutor;
use crate::engine::monitor::{MonitorOutcome, PositionMonitor};
use crate::engine::observer::{LogObserver, PositionObserver};
use crate::platforms::MarketClient;
use crate::strategy::{EligibilityFilter, ExitPolicy, Rejection};
use crate::types::{format_e8s, Position, TokenId};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Base-token amount spent per buy, in e8s.
    pub commitment: u64,
    pub buy_interval: Duration,
    /// Poll period of every position monitor.
    pub sell_interval: Duration,
    /// Size of the admission gate.
    pub max_concurrent_buy_tasks: usize,
    pub max_sell_attempts: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            commitment: 300_0000_0000,
            buy_interval: Duration::from_secs(1),
            sell_interval: Duration::from_secs(2),
            max_concurrent_buy_tasks: 100,
            max_sell_attempts: 1,
        }
    }
}

/// How a single acquisition attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// Listing could not be fetched.
    NoListing,
    Rejected(Rejection),
    /// Token already has an open position.
    AlreadyHeld(TokenId),
    /// Buy failed; the claim was released.
    BuyFailed(TokenId),
    Opened(TokenId),
    /// Shutdown was signalled before the buy went out.
    Cancelled,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

pub struct Sniper {
    client: Arc<dyn MarketClient>,
    filter: EligibilityFilter,
    policy: Arc<ExitPolicy>,
    executor: TradeExecutor,
    cache: PositionCache,
    observer: Arc<dyn PositionObserver>,
    gate: Arc<Semaphore>,
    monitors: Mutex<Vec<JoinHandle<MonitorOutcome>>>,
    config: SchedulerConfig,
}

impl Sniper {
    pub fn new(
        client: Arc<dyn MarketClient>,
        filter: EligibilityFilter,
        policy: ExitPolicy,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            executor: TradeExecutor::new(Arc::clone(&client)),
            client,
            filter,
            policy: Arc::new(policy),
            cache: PositionCache::new(),
            observer: Arc::new(LogObserver),
            gate: Arc::new(Semaphore::new(config.max_concurrent_buy_tasks.max(1))),
            monitors: Mutex::new(Vec::new()),
            config,
        }
    }

    /// Replace the default logging observer.
    pub fn with_observer(mut self, observer: Arc<dyn PositionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn cache(&self) -> &PositionCache {
        &self.cache
    }

    /// Admission slots currently free.
    pub fn available_slots(&self) -> usize {
        self.gate.available_permits()
    }

    /// Tick until shutdown, then wait for open monitors to wind down.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_ms = self.config.buy_interval.as_millis() as u64,
            max_concurrent = self.config.max_concurrent_buy_tasks,
            commitment = %format_e8s(self.config.commitment),
            "Acquisition scheduler started"
        );

        let mut ticker = tokio::time::interval(self.config.buy_interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = cancelled(&mut shutdown) => break,
            }

            let permit = tokio::select! {
                permit = Arc::clone(&self.gate).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
                _ = cancelled(&mut shutdown) => break,
            };

            let sniper = Arc::clone(&self);
            let task_shutdown = shutdown.clone();
            let span = info_span!("acquire", attempt = %Uuid::new_v4());
            tokio::spawn(
                async move {
                    let _permit = permit;
                    let outcome = sniper.try_acquire(task_shutdown).await;
                    debug!(?outcome, "Acquisition attempt finished");
                }
                .instrument(span),
            );
        }

        info!(
            open_positions = self.cache.len(),
            monitors = self.monitor_count(),
            "Scheduler stopping"
        );

        // Holding every slot means no attempt is still in flight, so no
        // monitor can be spawned after the join below.
        let slots = self.config.max_concurrent_buy_tasks.max(1) as u32;
        let _drained = self.gate.acquire_many(slots).await;
        self.join_monitors().await;
    }

    /// One acquisition attempt: fetch, filter, claim, buy, start monitor.
    pub async fn try_acquire(&self, shutdown: watch::Receiver<bool>) -> AcquireOutcome {
        if *shutdown.borrow() {
            return AcquireOutcome::Cancelled;
        }

        let listing = match self.client.latest_listing().await {
            Ok(listing) => listing,
            Err(e) => {
                warn!(error = %e, "Failed to fetch latest listing");
                return AcquireOutcome::NoListing;
            }
        };
        let token_id = listing.token_id;

        if let Err(reason) = self.filter.check(&listing, Utc::now()) {
            debug!(token_id, reason = %reason, "Listing skipped");
            return AcquireOutcome::Rejected(reason);
        }

        if self.cache.claim(token_id) == Claim::AlreadyHeld {
            return AcquireOutcome::AlreadyHeld(token_id);
        }

        if *shutdown.borrow() {
            self.cache.release(token_id);
            return AcquireOutcome::Cancelled;
        }

        let premium = self.filter.is_premium(&listing);
        let amount_bought = match self.executor.buy(token_id, self.config.commitment).await {
            Ok(amount) => amount,
            Err(e) => {
                self.cache.release(token_id);
                warn!(token_id, error = %format!("{e:#}"), "Buy failed, claim released");
                return AcquireOutcome::BuyFailed(token_id);
            }
        };

        let position = Position::new(token_id, amount_bought, premium);
        self.observer
            .on_opened(&listing, &position, self.config.commitment)
            .await;
        self.spawn_monitor(position, shutdown);

        AcquireOutcome::Opened(token_id)
    }

    fn spawn_monitor(&self, position: Position, shutdown: watch::Receiver<bool>) {
        let monitor = PositionMonitor::new(
            Arc::clone(&self.client),
            self.cache.clone(),
            Arc::clone(&self.policy),
            Arc::clone(&self.observer),
            self.config.sell_interval,
            self.config.max_sell_attempts,
        );
        let span = info_span!("monitor", token_id = position.token_id);
        let handle = tokio::spawn(async move { monitor.run(position, shutdown).await }.instrument(span));

        let mut monitors = self.monitors.lock().unwrap_or_else(PoisonError::into_inner);
        monitors.retain(|h| !h.is_finished());
        monitors.push(handle);
    }

    fn monitor_count(&self) -> usize {
        self.monitors.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    async fn join_monitors(&self) {
        let handles = std::mem::take(
            &mut *self.monitors.lock().unwrap_or_else(PoisonError::into_inner),
        );
        if handles.is_empty() {
            return;
        }

        info!(count = handles.len(), "Waiting for monitors to stop");
        for result in futures::future::join_all(handles).await {
            match result {
                Ok(outcome) => debug!(?outcome, "Monitor stopped"),
                Err(e) => warn!(error = %e, "Monitor task failed"),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
