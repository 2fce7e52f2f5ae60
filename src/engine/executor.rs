//! Trade executor.
//!
//! Thin layer over `MarketClient::trade` shared by the acquisition and
//! exit paths. Errors are returned to the caller untouched apart from
//! context; retrying is the caller's business.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use crate::platforms::MarketClient;
use crate::types::{format_e8s, TokenId, TradeSide};

#[derive(Clone)]
pub struct TradeExecutor {
    client: Arc<dyn MarketClient>,
}

impl TradeExecutor {
    pub fn new(client: Arc<dyn MarketClient>) -> Self {
        Self { client }
    }

    /// Submit a swap and return the amount received.
    pub async fn execute(&self, token_id: TokenId, side: TradeSide, amount: u64) -> Result<u64> {
        let amount_out = self
            .client
            .trade(token_id, side, amount)
            .await
            .with_context(|| format!("{side} of token {token_id} failed"))?;

        info!(
            token_id,
            side = %side,
            amount_in = %format_e8s(amount),
            amount_out = %format_e8s(amount_out),
            "Trade executed"
        );
        Ok(amount_out)
    }

    /// Spend `amount` base tokens on `token_id`. Returns tokens received.
    pub async fn buy(&self, token_id: TokenId, amount: u64) -> Result<u64> {
        self.execute(token_id, TradeSide::Buy, amount).await
    }

    /// Sell `amount` of `token_id`. Returns base tokens received.
    pub async fn sell(&self, token_id: TokenId, amount: u64) -> Result<u64> {
        self.execute(token_id, TradeSide::Sell, amount).await
    }
}
