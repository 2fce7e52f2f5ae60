//! Mock launch market for integration testing.
//!
//! Provides a deterministic `MarketClient` implementation with scripted
//! listings, balances, reserves and orders, all in-memory. Trades are
//! recorded so tests can assert exactly what the engine submitted.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use launch_sniper::engine::observer::{Abandoned, PositionObserver};
use launch_sniper::platforms::MarketClient;
use launch_sniper::strategy::ExitReason;
use launch_sniper::types::*;

pub const OWN_IDENTITY: &str = "own-principal";

/// Market cap every fresh listing reports.
pub const BASELINE_MCAP: f64 = 2109.2855470912427;

/// Tokens credited per buy.
pub const TOKENS_PER_BUY: u64 = 1_000_000;

/// A fresh, eligible listing.
pub fn fresh_listing(token_id: TokenId) -> Listing {
    Listing {
        token_id,
        name: format!("Token {token_id}"),
        ticker: format!("TK{token_id}"),
        created_at: Utc::now(),
        created_by: "creator-principal".to_string(),
        market_cap: BASELINE_MCAP,
        twitter: None,
        telegram: None,
        website: None,
    }
}

pub fn follower_buy(token_id: TokenId, from: &str) -> Order {
    Order {
        op: OrderOp::Swap(SwapOrder {
            token_id,
            from: from.to_string(),
            side: TradeSide::Buy,
            token_in: 10,
            token_out: 10,
            fee: 0,
        }),
        created_at: Utc::now(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedTrade {
    pub token_id: TokenId,
    pub side: TradeSide,
    pub amount: u64,
}

#[derive(Default)]
struct State {
    listing: Option<Listing>,
    /// Serve a new token id on every listing request.
    next_token_id: Option<TokenId>,
    clear_listing_on_buy: bool,
    balances: HashMap<TokenId, u64>,
    reserves: HashMap<TokenId, u64>,
    orders: HashMap<TokenId, Vec<Order>>,
    trades: Vec<RecordedTrade>,
    failing_trades: usize,
    read_errors: bool,
    trade_delay: Duration,
}

/// A mock launch market. Cloning shares the same state.
#[derive(Clone)]
pub struct MockMarket {
    state: Arc<Mutex<State>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MockMarket {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                clear_listing_on_buy: true,
                ..State::default()
            })),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn set_listing(&self, listing: Option<Listing>) {
        self.state.lock().unwrap().listing = listing;
    }

    /// Keep serving the listing after it has been bought.
    pub fn keep_listing_after_buy(&self) {
        self.state.lock().unwrap().clear_listing_on_buy = false;
    }

    /// Serve a distinct fresh listing on every request, starting at `first`.
    pub fn serve_new_listings_from(&self, first: TokenId) {
        self.state.lock().unwrap().next_token_id = Some(first);
    }

    pub fn set_balance(&self, token_id: TokenId, amount: u64) {
        self.state.lock().unwrap().balances.insert(token_id, amount);
    }

    pub fn set_reserve(&self, token_id: TokenId, amount: u64) {
        self.state.lock().unwrap().reserves.insert(token_id, amount);
    }

    pub fn push_order(&self, token_id: TokenId, order: Order) {
        self.state
            .lock()
            .unwrap()
            .orders
            .entry(token_id)
            .or_default()
            .insert(0, order);
    }

    /// Make the next `n` trades fail.
    pub fn fail_next_trades(&self, n: usize) {
        self.state.lock().unwrap().failing_trades = n;
    }

    /// Make every balance/reserve/orders read fail until cleared.
    pub fn set_read_errors(&self, on: bool) {
        self.state.lock().unwrap().read_errors = on;
    }

    pub fn set_trade_delay(&self, delay: Duration) {
        self.state.lock().unwrap().trade_delay = delay;
    }

    pub fn trades(&self) -> Vec<RecordedTrade> {
        self.state.lock().unwrap().trades.clone()
    }

    pub fn trades_of(&self, side: TradeSide) -> Vec<RecordedTrade> {
        self.trades().into_iter().filter(|t| t.side == side).collect()
    }

    /// Highest number of trades that were in flight at the same time.
    pub fn max_concurrent_trades(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn check_reads(&self) -> Result<()> {
        if self.state.lock().unwrap().read_errors {
            return Err(anyhow!("simulated read failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl MarketClient for MockMarket {
    async fn latest_listing(&self) -> Result<Listing> {
        let mut state = self.state.lock().unwrap();
        if let Some(next) = state.next_token_id {
            state.next_token_id = Some(next + 1);
            return Ok(fresh_listing(next));
        }
        state.listing.clone().ok_or_else(|| anyhow!("no tokens listed"))
    }

    async fn trade(&self, token_id: TokenId, side: TradeSide, amount: u64) -> Result<u64> {
        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);

        let delay = self.state.lock().unwrap().trade_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let result = {
            let mut state = self.state.lock().unwrap();
            state.trades.push(RecordedTrade { token_id, side, amount });

            if state.failing_trades > 0 {
                state.failing_trades -= 1;
                Err(anyhow!("simulated trade rejection"))
            } else {
                match side {
                    TradeSide::Buy => {
                        *state.balances.entry(token_id).or_insert(0) += TOKENS_PER_BUY;
                        if state.clear_listing_on_buy
                            && state.listing.as_ref().is_some_and(|l| l.token_id == token_id)
                        {
                            state.listing = None;
                        }
                        Ok(TOKENS_PER_BUY)
                    }
                    TradeSide::Sell => {
                        let held = state.balances.entry(token_id).or_insert(0);
                        if *held < amount {
                            Err(anyhow!("insufficient balance"))
                        } else {
                            *held -= amount;
                            Ok(amount / 10)
                        }
                    }
                }
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn balance(&self, token_id: TokenId) -> Result<u64> {
        self.check_reads()?;
        Ok(*self.state.lock().unwrap().balances.get(&token_id).unwrap_or(&0))
    }

    async fn reserve(&self, token_id: TokenId) -> Result<u64> {
        self.check_reads()?;
        self.state
            .lock()
            .unwrap()
            .reserves
            .get(&token_id)
            .copied()
            .ok_or_else(|| anyhow!("token with ID {token_id} not found"))
    }

    async fn recent_orders(&self, token_id: TokenId, limit: u64) -> Result<Vec<Order>> {
        self.check_reads()?;
        let state = self.state.lock().unwrap();
        Ok(state
            .orders
            .get(&token_id)
            .map(|orders| orders.iter().take(limit as usize).cloned().collect())
            .unwrap_or_default())
    }

    fn self_identity(&self) -> Identity {
        OWN_IDENTITY.to_string()
    }
}

// ---------------------------------------------------------------------------
// Recording observer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Opened(TokenId),
    Closed(TokenId, ExitReason),
    Abandoned(TokenId, Abandoned),
}

/// Observer that keeps every lifecycle event for assertions.
#[derive(Clone, Default)]
pub struct RecordingObserver {
    events: Arc<Mutex<Vec<Event>>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl PositionObserver for RecordingObserver {
    async fn on_opened(&self, _listing: &Listing, position: &Position, _spent: u64) {
        self.events.lock().unwrap().push(Event::Opened(position.token_id));
    }

    async fn on_closed(&self, position: &Position, reason: ExitReason, _sold: u64, _received: u64) {
        self.events
            .lock()
            .unwrap()
            .push(Event::Closed(position.token_id, reason));
    }

    async fn on_abandoned(&self, token_id: TokenId, why: &Abandoned) {
        self.events
            .lock()
            .unwrap()
            .push(Event::Abandoned(token_id, why.clone()));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_buy_credits_balance_and_clears_listing() {
        let market = MockMarket::new();
        market.set_listing(Some(fresh_listing(5)));

        assert_eq!(market.trade(5, TradeSide::Buy, 300).await.unwrap(), TOKENS_PER_BUY);
        assert_eq!(market.balance(5).await.unwrap(), TOKENS_PER_BUY);
        assert!(market.latest_listing().await.is_err());
    }

    #[tokio::test]
    async fn test_mock_sell_requires_balance() {
        let market = MockMarket::new();
        assert!(market.trade(5, TradeSide::Sell, 1).await.is_err());
        market.set_balance(5, 100);
        assert_eq!(market.trade(5, TradeSide::Sell, 100).await.unwrap(), 10);
        assert_eq!(market.balance(5).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_mock_forced_errors() {
        let market = MockMarket::new();
        market.set_reserve(5, 1);
        market.set_read_errors(true);
        assert!(market.balance(5).await.is_err());
        assert!(market.reserve(5).await.is_err());
        market.set_read_errors(false);
        assert_eq!(market.reserve(5).await.unwrap(), 1);

        market.fail_next_trades(1);
        assert!(market.trade(5, TradeSide::Buy, 1).await.is_err());
        assert!(market.trade(5, TradeSide::Buy, 1).await.is_ok());
        assert_eq!(market.trades().len(), 2);
    }

    #[tokio::test]
    async fn test_mock_orders_newest_first() {
        let market = MockMarket::new();
        market.push_order(5, follower_buy(5, "first"));
        market.push_order(5, follower_buy(5, "second"));
        let orders = market.recent_orders(5, 1).await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].buyer(), Some("second"));
    }

    #[tokio::test]
    async fn test_mock_serves_new_listings() {
        let market = MockMarket::new();
        market.serve_new_listings_from(100);
        assert_eq!(market.latest_listing().await.unwrap().token_id, 100);
        assert_eq!(market.latest_listing().await.unwrap().token_id, 101);
    }
}
