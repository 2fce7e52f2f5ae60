//! Shared types for the sniper.
//!
//! Listings and orders are read-only snapshots coming from the market
//! client. Positions are the engine's own record of an open trade and are
//! only ever mutated by the monitor task that owns them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::time::Instant;

/// Launch-market token identifier.
pub type TokenId = u64;

/// Principal text of an account on the launch market.
pub type Identity = String;

/// Number of decimals used by every on-market amount.
pub const E8S_DECIMALS: u32 = 8;

/// Render an e8s amount as whole token units (`300_0000_0000` -> `300`).
pub fn format_e8s(amount: u64) -> String {
    e8s_to_decimal(amount).to_string()
}

/// Whole-unit value of an e8s amount.
pub fn e8s_to_decimal(amount: u64) -> Decimal {
    Decimal::from_i128_with_scale(amount as i128, E8S_DECIMALS).normalize()
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

/// A freshly discovered token and its market metadata at read time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub token_id: TokenId,
    pub name: String,
    pub ticker: String,
    pub created_at: DateTime<Utc>,
    pub created_by: Identity,
    /// Market cap denominated in the base token.
    pub market_cap: f64,
    #[serde(default)]
    pub twitter: Option<String>,
    #[serde(default)]
    pub telegram: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
}

impl fmt::Display for Listing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} (${}) by {} mcap={:.4}",
            self.token_id, self.name, self.ticker, self.created_by, self.market_cap,
        )
    }
}

impl Listing {
    /// Whether any social link is attached to the listing.
    pub fn has_socials(&self) -> bool {
        self.twitter.is_some() || self.telegram.is_some()
    }

    /// Helper to build a test/sample listing with sensible defaults.
    #[cfg(test)]
    pub fn sample(token_id: TokenId) -> Self {
        Listing {
            token_id,
            name: "Moon Cat".to_string(),
            ticker: "MCAT".to_string(),
            created_at: Utc::now(),
            created_by: "aaaaa-aa".to_string(),
            market_cap: 2109.2855470912427,
            twitter: None,
            telegram: None,
            website: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Trade side
// ---------------------------------------------------------------------------

/// Direction of a swap against the launch pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeSide {
    Buy,
    Sell,
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSide::Buy => write!(f, "Buy"),
            TradeSide::Sell => write!(f, "Sell"),
        }
    }
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

/// A market event on a token, newest first when listed by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub op: OrderOp,
    pub created_at: DateTime<Utc>,
}

/// Operation carried by an order; each kind has its own payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OrderOp {
    Swap(SwapOrder),
    ProvideLiquidity(ProvideLiquidityOrder),
    WithdrawLiquidity(WithdrawLiquidityOrder),
    Transfer(TransferOrder),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapOrder {
    pub token_id: TokenId,
    pub from: Identity,
    pub side: TradeSide,
    pub token_in: u64,
    pub token_out: u64,
    pub fee: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvideLiquidityOrder {
    pub token_id: TokenId,
    pub from: Identity,
    pub token_amount: u64,
    pub base_amount: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawLiquidityOrder {
    pub token_id: TokenId,
    pub from: Identity,
    pub shares: u64,
    pub token_a_out: u64,
    pub token_b_out: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferOrder {
    pub token_id: TokenId,
    pub from: Identity,
    pub to: Identity,
    pub amount: u64,
}

impl Order {
    /// The originator of a buy-side swap, `None` for anything else.
    pub fn buyer(&self) -> Option<&str> {
        match &self.op {
            OrderOp::Swap(swap) if swap.side == TradeSide::Buy => Some(&swap.from),
            _ => None,
        }
    }

    /// A buy made by someone other than `own_identity`.
    pub fn is_follower_buy(&self, own_identity: &str) -> bool {
        self.buyer().is_some_and(|from| from != own_identity)
    }
}

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// Follower detection state of an open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowerState {
    NotDetected,
    /// `deadline` is `None` when the grace period runs past the clock's range.
    Detected { deadline: Option<Instant> },
}

/// The engine's view of an open trade.
#[derive(Debug, Clone)]
pub struct Position {
    pub token_id: TokenId,
    pub amount_bought: u64,
    pub bought_at: Instant,
    pub premium: bool,
    pub follower: FollowerState,
}

impl Position {
    pub fn new(token_id: TokenId, amount_bought: u64, premium: bool) -> Self {
        Self::opened_at(token_id, amount_bought, premium, Instant::now())
    }

    pub fn opened_at(token_id: TokenId, amount_bought: u64, premium: bool, bought_at: Instant) -> Self {
        Self {
            token_id,
            amount_bought,
            bought_at,
            premium,
            follower: FollowerState::NotDetected,
        }
    }

    pub fn has_follower(&self) -> bool {
        matches!(self.follower, FollowerState::Detected { .. })
    }

    /// Arm the follower deadline. Returns false if one was already armed.
    pub fn arm_follower(&mut self, deadline: Option<Instant>) -> bool {
        if self.has_follower() {
            return false;
        }
        self.follower = FollowerState::Detected { deadline };
        true
    }

    pub fn follower_deadline(&self) -> Option<Instant> {
        match self.follower {
            FollowerState::Detected { deadline } => deadline,
            FollowerState::NotDetected => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for the sniper.
#[derive(Debug, thiserror::Error)]
pub enum SniperError {
    #[error("Market error ({operation}): {message}")]
    Market { operation: String, message: String },

    #[error("Trade rejected by market ({side} token {token_id}): {message}")]
    TradeRejected {
        token_id: TokenId,
        side: TradeSide,
        message: String,
    },

    #[error("No listings available")]
    NoListings,

    #[error("Token not found: {0}")]
    TokenNotFound(TokenId),

    #[error("Configuration error: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
