//! Exit policy for open positions.
//!
//! A position is sold on whichever of three signals fires first:
//!
//! 1. **Dynamic max age**: a deadline measured from the buy that shrinks
//!    from `max_age_after_buy` toward `min_age_after_buy` as the pool
//!    reserve approaches the sell threshold:
//!    `decay = 1 - e^(-k * progress)`,
//!    `offset = max * (1 - decay) + min * decay`.
//! 2. **Follower deadline**: once someone else buys into the token, the
//!    position is given `follower_grace` more time.
//! 3. **Reserve threshold**: the reserve reaches the (premium-scaled)
//!    threshold.

use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::types::{Order, Position};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ExitConfig {
    /// Reserve (e8s) at which a position is sold.
    pub reserve_sell_threshold: u64,
    /// Threshold multiplier for premium listings.
    pub premium_multiplier: f64,
    pub max_age_after_buy: Duration,
    pub min_age_after_buy: Duration,
    pub follower_grace: Duration,
    /// `k` in the decay curve. Larger values pull the deadline toward the
    /// minimum age sooner.
    pub decay_steepness: f64,
}

impl Default for ExitConfig {
    fn default() -> Self {
        Self {
            reserve_sell_threshold: 450_0000_0000,
            premium_multiplier: 1.5,
            max_age_after_buy: Duration::from_secs(5 * 3600),
            min_age_after_buy: Duration::from_secs(15 * 60),
            follower_grace: Duration::from_secs(30 * 60),
            decay_steepness: 3.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    MaxAge,
    FollowerDeadline,
    ReserveThreshold,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::MaxAge => write!(f, "dynamic max age reached"),
            ExitReason::FollowerDeadline => write!(f, "follower deadline reached"),
            ExitReason::ReserveThreshold => write!(f, "reserve threshold reached"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitDecision {
    Hold,
    Sell { reason: ExitReason, amount: u64 },
}

/// What a single monitor poll observed on the market.
#[derive(Debug, Clone, Copy)]
pub struct PollSnapshot<'a> {
    pub balance: u64,
    pub reserve: u64,
    /// Newest order on the token. Only read while no follower is known.
    pub latest_order: Option<&'a Order>,
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

pub struct ExitPolicy {
    config: ExitConfig,
}

impl ExitPolicy {
    pub fn new(config: ExitConfig) -> Self {
        Self { config }
    }

    /// Reserve threshold for a position, scaled up for premium listings.
    pub fn effective_threshold(&self, premium: bool) -> u64 {
        let base = self.config.reserve_sell_threshold;
        if premium {
            (base as f64 * self.config.premium_multiplier) as u64
        } else {
            base
        }
    }

    /// Fraction of the threshold already reached, capped at 1.
    pub fn progress(reserve: u64, threshold: u64) -> f64 {
        if threshold == 0 {
            return 0.0;
        }
        (reserve as f64 / threshold as f64).min(1.0)
    }

    /// Deadline offset from the buy time for a given reserve progress.
    ///
    /// Equals `max_age_after_buy` at progress 0 and is non-increasing in
    /// progress for any non-negative steepness.
    pub fn deadline_offset(&self, progress: f64) -> Duration {
        let progress = progress.clamp(0.0, 1.0);
        let decay = 1.0 - (-self.config.decay_steepness * progress).exp();
        let max = self.config.max_age_after_buy.as_secs_f64();
        let min = self.config.min_age_after_buy.as_secs_f64();
        Duration::try_from_secs_f64(max * (1.0 - decay) + min * decay).unwrap_or(Duration::MAX)
    }

    /// Dynamic max age of `position` given the current reserve.
    pub fn dynamic_max_age(&self, position: &Position, reserve: u64) -> Duration {
        let threshold = self.effective_threshold(position.premium);
        self.deadline_offset(Self::progress(reserve, threshold))
    }

    /// Whether the dynamic max age has passed at `now`. A deadline beyond
    /// the clock's range is never reached.
    pub fn max_age_reached(&self, position: &Position, reserve: u64, now: Instant) -> bool {
        position
            .bought_at
            .checked_add(self.dynamic_max_age(position, reserve))
            .is_some_and(|deadline| now > deadline)
    }

    /// Arm the follower deadline if `order` is a buy from someone else.
    /// Returns true when a follower was newly detected.
    pub fn observe_order(
        &self,
        position: &mut Position,
        order: &Order,
        own_identity: &str,
        now: Instant,
    ) -> bool {
        if position.has_follower() || !order.is_follower_buy(own_identity) {
            return false;
        }
        let armed = position.arm_follower(now.checked_add(self.config.follower_grace));
        if armed {
            info!(
                token_id = position.token_id,
                grace_secs = self.config.follower_grace.as_secs(),
                follower = order.buyer().unwrap_or_default(),
                "Follower detected, arming sell deadline"
            );
        }
        armed
    }

    /// Evaluate one poll. At most one sell is ever returned, even when
    /// several signals hold at once; the age deadline takes precedence,
    /// then the follower deadline, then the reserve threshold.
    pub fn evaluate(
        &self,
        position: &mut Position,
        snapshot: &PollSnapshot<'_>,
        own_identity: &str,
        now: Instant,
    ) -> ExitDecision {
        let sell = |reason| ExitDecision::Sell {
            reason,
            amount: snapshot.balance,
        };

        if self.max_age_reached(position, snapshot.reserve, now) {
            return sell(ExitReason::MaxAge);
        }

        if let Some(order) = snapshot.latest_order {
            self.observe_order(position, order, own_identity, now);
        }

        if position.follower_deadline().is_some_and(|deadline| now > deadline) {
            return sell(ExitReason::FollowerDeadline);
        }

        let threshold = self.effective_threshold(position.premium);
        if snapshot.reserve >= threshold {
            return sell(ExitReason::ReserveThreshold);
        }

        debug!(
            token_id = position.token_id,
            reserve = snapshot.reserve,
            threshold,
            follower = position.has_follower(),
            "Holding position"
        );
        ExitDecision::Hold
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
