//! Launch-market integrations.
//!
//! Defines the `MarketClient` trait the engine trades through and the
//! HTTP gateway implementation used in production.

pub mod launchpad;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::{Identity, Listing, Order, TokenId, TradeSide};

/// Abstraction over the launch market.
///
/// All calls block the calling task only. Transport retries, encoding and
/// key management belong to the implementor.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketClient: Send + Sync {
    /// Most recently created token, as sorted by the market.
    async fn latest_listing(&self) -> Result<Listing>;

    /// Swap against the launch pool. Returns the amount received.
    async fn trade(&self, token_id: TokenId, side: TradeSide, amount: u64) -> Result<u64>;

    /// Amount of `token_id` held by this agent. Zero if none.
    async fn balance(&self, token_id: TokenId) -> Result<u64>;

    /// Base-token reserve of the token's launch pool.
    async fn reserve(&self, token_id: TokenId) -> Result<u64>;

    /// Most recent orders on `token_id`, newest first.
    async fn recent_orders(&self, token_id: TokenId, limit: u64) -> Result<Vec<Order>>;

    /// Identity this agent trades as.
    fn self_identity(&self) -> Identity;
}
