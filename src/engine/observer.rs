//! Position lifecycle notifications.
//!
//! The engine reports opened, closed and abandoned positions to an
//! injected observer. The default observer only logs.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::strategy::ExitReason;
use crate::types::{format_e8s, Listing, Position, TokenId};

/// How a monitor ended without a completed sell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Abandoned {
    /// Balance went to zero outside the engine.
    ExternallyLiquidated,
    /// Every allowed sell attempt failed; the claim is kept.
    SellFailed { attempts: u32, error: String },
    /// Shutdown was requested while the position was open.
    Cancelled,
}

#[async_trait]
pub trait PositionObserver: Send + Sync {
    async fn on_opened(&self, listing: &Listing, position: &Position, spent: u64);

    async fn on_closed(&self, position: &Position, reason: ExitReason, sold: u64, received: u64);

    async fn on_abandoned(&self, token_id: TokenId, why: &Abandoned);
}

/// Writes each lifecycle event as a structured log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

#[async_trait]
impl PositionObserver for LogObserver {
    async fn on_opened(&self, listing: &Listing, position: &Position, spent: u64) {
        info!(
            token_id = position.token_id,
            name = %listing.name,
            ticker = %listing.ticker,
            premium = position.premium,
            spent = %format_e8s(spent),
            bought = %format_e8s(position.amount_bought),
            "Position opened"
        );
    }

    async fn on_closed(&self, position: &Position, reason: ExitReason, sold: u64, received: u64) {
        info!(
            token_id = position.token_id,
            reason = %reason,
            sold = %format_e8s(sold),
            received = %format_e8s(received),
            held_secs = position.bought_at.elapsed().as_secs(),
            "Position closed"
        );
    }

    async fn on_abandoned(&self, token_id: TokenId, why: &Abandoned) {
        match why {
            Abandoned::ExternallyLiquidated => {
                info!(token_id, "Balance is zero, position released without selling")
            }
            Abandoned::SellFailed { attempts, error } => warn!(
                token_id,
                attempts,
                error = %error,
                "Giving up on selling, position stays claimed"
            ),
            Abandoned::Cancelled => info!(token_id, "Monitor cancelled, position released"),
        }
    }
}
