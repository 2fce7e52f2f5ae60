//! Launchpad canister client.
//!
//! Talks to the launch canister through a JSON gateway that forwards
//! `query` and `call` requests. Every canister method answers either with
//! a plain value or with an `{"Ok": ..}` / `{"Err": ".."}` envelope.
//!
//! Methods used: `get_tokens`, `swap`, `get_balances`, `get_pools`,
//! `get_orders`, `deposit`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::platforms::MarketClient;
use crate::types::{
    Identity, Listing, Order, OrderOp, ProvideLiquidityOrder, SniperError, SwapOrder, TokenId,
    TradeSide, TransferOrder, WithdrawLiquidityOrder,
};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Page length requested from `get_tokens`; the market returns newest first.
const TOKEN_PAGE_LENGTH: u64 = 100_000;

#[derive(Debug, Clone, Copy)]
enum CallKind {
    Query,
    Update,
}

impl CallKind {
    fn path(self) -> &'static str {
        match self {
            CallKind::Query => "query",
            CallKind::Update => "call",
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
enum ApiResult<T> {
    Ok(T),
    Err(String),
}

#[derive(Debug, Serialize)]
struct GetTokensParams {
    sort_by: &'static str,
    pagination: Pagination,
}

#[derive(Debug, Serialize)]
struct Pagination {
    skip: u64,
    length: u64,
}

#[derive(Debug, Deserialize)]
struct WireToken {
    market_cap_in_bob: f64,
    token_info: WireTokenInfo,
}

#[derive(Debug, Deserialize)]
struct WireTokenInfo {
    token_id: TokenId,
    name: String,
    ticker: String,
    /// Unix seconds.
    created_at: i64,
    created_by: String,
    #[serde(default)]
    maybe_twitter: Option<String>,
    #[serde(default)]
    maybe_telegram: Option<String>,
    #[serde(default)]
    maybe_website: Option<String>,
}

#[derive(Debug, Serialize)]
struct SwapParams {
    side: TradeSide,
    token_id: TokenId,
    amount_e8s: u64,
}

#[derive(Debug, Deserialize)]
struct SwapReceipt {
    amount_out: u64,
}

#[derive(Debug, Deserialize)]
struct WireBalance {
    token_id: TokenId,
    balance: u64,
}

#[derive(Debug, Deserialize)]
enum WirePool {
    #[serde(rename = "AMM")]
    Amm(serde_json::Value),
    Launchpad(LaunchpadPool),
}

#[derive(Debug, Deserialize)]
struct LaunchpadPool {
    reserve_base_token: u64,
}

#[derive(Debug, Serialize)]
struct GetOrdersParams {
    token_id: TokenId,
    latest: u64,
}

#[derive(Debug, Deserialize)]
struct WireOrder {
    op: WireOrderOp,
    /// Unix nanoseconds.
    created_at: i64,
}

#[derive(Debug, Deserialize)]
enum WireOrderOp {
    Swap {
        token_id: TokenId,
        from: String,
        side: TradeSide,
        token_in: u64,
        token_out: u64,
        fee: u64,
    },
    ProvideLiquidity {
        token_id: TokenId,
        from: String,
        token_amount: u64,
        bob_amount: u64,
    },
    WithdrawLiquidity {
        token_id: TokenId,
        from: String,
        shares: u64,
        token_a_out: u64,
        token_b_out: u64,
    },
    Transfer {
        token_id: TokenId,
        from: String,
        to: String,
        amount: u64,
    },
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

impl From<WireToken> for Listing {
    fn from(token: WireToken) -> Self {
        let info = token.token_info;
        let created_at = Utc
            .timestamp_opt(info.created_at, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        Listing {
            token_id: info.token_id,
            name: info.name,
            ticker: info.ticker,
            created_at,
            created_by: info.created_by,
            market_cap: token.market_cap_in_bob,
            twitter: info.maybe_twitter,
            telegram: info.maybe_telegram,
            website: info.maybe_website,
        }
    }
}

impl From<WireOrder> for Order {
    fn from(order: WireOrder) -> Self {
        let op = match order.op {
            WireOrderOp::Swap { token_id, from, side, token_in, token_out, fee } => {
                OrderOp::Swap(SwapOrder { token_id, from, side, token_in, token_out, fee })
            }
            WireOrderOp::ProvideLiquidity { token_id, from, token_amount, bob_amount } => {
                OrderOp::ProvideLiquidity(ProvideLiquidityOrder {
                    token_id,
                    from,
                    token_amount,
                    base_amount: bob_amount,
                })
            }
            WireOrderOp::WithdrawLiquidity { token_id, from, shares, token_a_out, token_b_out } => {
                OrderOp::WithdrawLiquidity(WithdrawLiquidityOrder {
                    token_id,
                    from,
                    shares,
                    token_a_out,
                    token_b_out,
                })
            }
            WireOrderOp::Transfer { token_id, from, to, amount } => {
                OrderOp::Transfer(TransferOrder { token_id, from, to, amount })
            }
        };
        Order {
            op,
            created_at: Utc.timestamp_nanos(order.created_at),
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct LaunchpadClient {
    http: Client,
    gateway_url: String,
    canister_id: String,
    identity: Identity,
    api_key: Option<SecretString>,
}

impl LaunchpadClient {
    pub fn new(
        gateway_url: &str,
        canister_id: &str,
        identity: Identity,
        api_key: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build launchpad HTTP client")?;

        Ok(Self {
            http,
            gateway_url: gateway_url.trim_end_matches('/').to_string(),
            canister_id: canister_id.to_string(),
            identity,
            api_key,
        })
    }

    /// Endpoint for a canister method.
    pub fn method_url(&self, kind: &str, method: &str) -> String {
        format!("{}/{}/{}/{}", self.gateway_url, self.canister_id, kind, method)
    }

    /// Every canister method takes exactly one argument, sent as a
    /// one-element argument list.
    fn request_body<A: Serialize + ?Sized>(arg: &A) -> Result<serde_json::Value> {
        let arg = serde_json::to_value(arg).context("Failed to encode launchpad request")?;
        Ok(serde_json::Value::Array(vec![arg]))
    }

    async fn invoke<A, R>(&self, kind: CallKind, method: &str, arg: &A) -> Result<R>
    where
        A: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let url = self.method_url(kind.path(), method);
        let body = Self::request_body(arg)?;
        debug!(method, kind = kind.path(), "Launchpad request");

        let mut req = self.http.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key.expose_secret());
        }

        let resp = req
            .send()
            .await
            .with_context(|| format!("Launchpad {method} request failed"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(SniperError::Market {
                operation: method.to_string(),
                message: format!("HTTP {status}: {body}"),
            }
            .into());
        }

        resp.json::<R>()
            .await
            .with_context(|| format!("Failed to parse launchpad {method} response"))
    }

    /// Top up the trading account with `amount` e8s of the base token.
    pub async fn deposit(&self, amount: u64) -> Result<()> {
        let resp: ApiResult<serde_json::Value> =
            self.invoke(CallKind::Update, "deposit_bob", &amount).await?;
        match resp {
            ApiResult::Ok(_) => Ok(()),
            ApiResult::Err(message) => Err(SniperError::Market {
                operation: "deposit".to_string(),
                message,
            }
            .into()),
        }
    }
}

#[async_trait]
impl MarketClient for LaunchpadClient {
    async fn latest_listing(&self) -> Result<Listing> {
        let params = GetTokensParams {
            sort_by: "CreatedAt",
            pagination: Pagination { skip: 0, length: TOKEN_PAGE_LENGTH },
        };
        let tokens: Vec<WireToken> = self.invoke(CallKind::Query, "get_tokens", &params).await?;
        tokens
            .into_iter()
            .next()
            .map(Listing::from)
            .ok_or_else(|| SniperError::NoListings.into())
    }

    async fn trade(&self, token_id: TokenId, side: TradeSide, amount: u64) -> Result<u64> {
        let params = SwapParams { side, token_id, amount_e8s: amount };
        let resp: ApiResult<SwapReceipt> = self.invoke(CallKind::Update, "swap", &params).await?;
        match resp {
            ApiResult::Ok(receipt) => Ok(receipt.amount_out),
            ApiResult::Err(message) => Err(SniperError::TradeRejected {
                token_id,
                side,
                message,
            }
            .into()),
        }
    }

    async fn balance(&self, token_id: TokenId) -> Result<u64> {
        let balances: Vec<WireBalance> = self
            .invoke(CallKind::Query, "get_balances", &self.identity)
            .await?;
        Ok(balances
            .into_iter()
            .find(|b| b.token_id == token_id)
            .map(|b| b.balance)
            .unwrap_or(0))
    }

    async fn reserve(&self, token_id: TokenId) -> Result<u64> {
        let pools: Vec<Option<WirePool>> = self
            .invoke(CallKind::Query, "get_pools", &[token_id])
            .await?;
        pools
            .into_iter()
            .flatten()
            .find_map(|pool| match pool {
                WirePool::Launchpad(lp) => Some(lp.reserve_base_token),
                WirePool::Amm(_) => None,
            })
            .ok_or_else(|| SniperError::TokenNotFound(token_id).into())
    }

    async fn recent_orders(&self, token_id: TokenId, limit: u64) -> Result<Vec<Order>> {
        let params = GetOrdersParams { token_id, latest: limit };
        let orders: Vec<WireOrder> = self.invoke(CallKind::Query, "get_orders", &params).await?;
        Ok(orders.into_iter().map(Order::from).collect())
    }

    fn self_identity(&self) -> Identity {
        self.identity.clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
