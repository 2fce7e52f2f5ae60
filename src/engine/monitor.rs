//! Per-position monitor loop.
//!
//! One task per open position. Every `poll_interval` it reads the held
//! balance, the pool reserve and, until a follower shows up, the newest
//! order, then asks the exit policy whether to sell. Failed reads are
//! logged and retried on the next poll. The loop ends on a completed sell,
//! on a zero balance, after the allowed number of failed sells, or on
//! shutdown.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::engine::cache::PositionCache;
use crate::engine::cancelled;
use crate::engine::executor::TradeExecutor;
use crate::engine::observer::{Abandoned, PositionObserver};
use crate::platforms::MarketClient;
use crate::strategy::{ExitDecision, ExitPolicy, ExitReason, PollSnapshot};
use crate::types::{format_e8s, Position};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorOutcome {
    Sold {
        reason: ExitReason,
        amount: u64,
        received: u64,
    },
    /// Balance hit zero before any exit fired; nothing was sold.
    ExternallyLiquidated,
    /// Sell attempts exhausted; the token stays claimed.
    SellFailed { attempts: u32 },
    Cancelled,
}

#[derive(Clone)]
pub struct PositionMonitor {
    client: Arc<dyn MarketClient>,
    executor: TradeExecutor,
    cache: PositionCache,
    policy: Arc<ExitPolicy>,
    observer: Arc<dyn PositionObserver>,
    poll_interval: Duration,
    max_sell_attempts: u32,
}

impl PositionMonitor {
    pub fn new(
        client: Arc<dyn MarketClient>,
        cache: PositionCache,
        policy: Arc<ExitPolicy>,
        observer: Arc<dyn PositionObserver>,
        poll_interval: Duration,
        max_sell_attempts: u32,
    ) -> Self {
        Self {
            executor: TradeExecutor::new(Arc::clone(&client)),
            client,
            cache,
            policy,
            observer,
            poll_interval,
            max_sell_attempts: max_sell_attempts.max(1),
        }
    }

    /// Run until the position is closed, abandoned or cancelled.
    pub async fn run(
        &self,
        mut position: Position,
        mut shutdown: watch::Receiver<bool>,
    ) -> MonitorOutcome {
        let token_id = position.token_id;
        let identity = self.client.self_identity();
        let mut sell_attempts = 0u32;

        info!(
            token_id,
            premium = position.premium,
            threshold = %format_e8s(self.policy.effective_threshold(position.premium)),
            "Monitoring position"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = cancelled(&mut shutdown) => {
                    self.cache.release(token_id);
                    self.observer.on_abandoned(token_id, &Abandoned::Cancelled).await;
                    return MonitorOutcome::Cancelled;
                }
            }

            let balance = match self.client.balance(token_id).await {
                Ok(balance) => balance,
                Err(e) => {
                    warn!(token_id, error = %e, "Failed to read balance");
                    continue;
                }
            };

            if balance == 0 {
                self.cache.release(token_id);
                self.observer
                    .on_abandoned(token_id, &Abandoned::ExternallyLiquidated)
                    .await;
                return MonitorOutcome::ExternallyLiquidated;
            }

            let reserve = match self.client.reserve(token_id).await {
                Ok(reserve) => reserve,
                Err(e) => {
                    warn!(token_id, error = %e, "Failed to read reserve");
                    continue;
                }
            };

            debug!(
                token_id,
                balance = %format_e8s(balance),
                reserve = %format_e8s(reserve),
                max_age_secs = self.policy.dynamic_max_age(&position, reserve).as_secs(),
                "Position polled"
            );

            // Orders only matter until the first follower, and not at all
            // once the age deadline has already passed.
            let needs_orders = !position.has_follower()
                && !self.policy.max_age_reached(&position, reserve, Instant::now());
            let latest_order = if needs_orders {
                match self.client.recent_orders(token_id, 1).await {
                    Ok(orders) => orders.into_iter().next(),
                    Err(e) => {
                        warn!(token_id, error = %e, "Failed to read orders");
                        continue;
                    }
                }
            } else {
                None
            };

            let snapshot = PollSnapshot {
                balance,
                reserve,
                latest_order: latest_order.as_ref(),
            };

            let (reason, amount) =
                match self.policy.evaluate(&mut position, &snapshot, &identity, Instant::now()) {
                    ExitDecision::Hold => continue,
                    ExitDecision::Sell { reason, amount } => (reason, amount),
                };

            info!(token_id, reason = %reason, amount = %format_e8s(amount), "Selling position");
            sell_attempts += 1;

            match self.executor.sell(token_id, amount).await {
                Ok(received) => {
                    self.cache.release(token_id);
                    self.observer.on_closed(&position, reason, amount, received).await;
                    return MonitorOutcome::Sold {
                        reason,
                        amount,
                        received,
                    };
                }
                Err(e) => {
                    error!(
                        token_id,
                        attempt = sell_attempts,
                        max_attempts = self.max_sell_attempts,
                        error = %format!("{e:#}"),
                        "Sell failed"
                    );
                    if sell_attempts >= self.max_sell_attempts {
                        let why = Abandoned::SellFailed {
                            attempts: sell_attempts,
                            error: format!("{e:#}"),
                        };
                        self.observer.on_abandoned(token_id, &why).await;
                        return MonitorOutcome::SellFailed {
                            attempts: sell_attempts,
                        };
                    }
                }
            }
        }
    }
}
