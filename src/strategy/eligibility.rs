//! Listing eligibility.
//!
//! Two pure predicates over a `Listing`: whether it is worth buying at
//! all, and whether it gets the premium (raised) reserve exit threshold.

use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

use crate::types::Listing;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FilterConfig {
    /// Listings are only bought while their market cap is exactly this value.
    pub market_cap_baseline: f64,
    /// Maximum age of a listing at evaluation time.
    pub recency_window: Duration,
    pub denylisted_creators: Vec<String>,
    /// Lowercase substrings that disqualify a name.
    pub name_denylist: Vec<String>,
    /// Lowercase substrings that disqualify a ticker.
    pub ticker_denylist: Vec<String>,
    /// Lowercase brand keyword that marks a name as premium.
    pub premium_keyword: String,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            market_cap_baseline: 2109.2855470912427,
            recency_window: Duration::from_secs(3),
            denylisted_creators: vec![
                "bdedb-mxdar-r6dzs-twggw-htds6-vts3b-m3s7z-gx7dc-mtapy-lizfx-zae".to_string(),
                "gaxjt-o3xdb-4d5fu-px5tp-inpdn-dzpdm-hdfjf-6iu4c-gg6bj-7cpa7-fae".to_string(),
            ],
            name_denylist: vec!["test".to_string()],
            ticker_denylist: vec!["test".to_string(), "sniper".to_string(), "bot".to_string()],
            premium_keyword: "bob".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Rejection
// ---------------------------------------------------------------------------

/// First rule a listing failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    MarketCap,
    Stale,
    DenylistedName(String),
    DenylistedTicker(String),
    DenylistedCreator,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::MarketCap => write!(f, "market cap off baseline"),
            Rejection::Stale => write!(f, "listing too old"),
            Rejection::DenylistedName(word) => write!(f, "name contains '{word}'"),
            Rejection::DenylistedTicker(word) => write!(f, "ticker contains '{word}'"),
            Rejection::DenylistedCreator => write!(f, "creator is denylisted"),
        }
    }
}

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

pub struct EligibilityFilter {
    config: FilterConfig,
}

impl EligibilityFilter {
    /// Denylist entries and the premium keyword are matched against
    /// lowercased text, so they are lowercased here too.
    pub fn new(mut config: FilterConfig) -> Self {
        let lower = |words: &mut Vec<String>| words.iter_mut().for_each(|w| *w = w.to_lowercase());
        lower(&mut config.name_denylist);
        lower(&mut config.ticker_denylist);
        config.premium_keyword = config.premium_keyword.to_lowercase();
        Self { config }
    }

    /// Check every worthiness rule against `listing` as of `now`.
    pub fn check(&self, listing: &Listing, now: DateTime<Utc>) -> Result<(), Rejection> {
        // Exact comparison: fresh listings all report the same starting cap.
        if listing.market_cap != self.config.market_cap_baseline {
            return Err(Rejection::MarketCap);
        }

        let window = chrono::Duration::from_std(self.config.recency_window)
            .unwrap_or(chrono::Duration::MAX);
        if now
            .checked_sub_signed(window)
            .is_some_and(|cutoff| listing.created_at <= cutoff)
        {
            return Err(Rejection::Stale);
        }

        let name = listing.name.to_lowercase();
        if let Some(word) = find_denylisted(&name, &self.config.name_denylist) {
            return Err(Rejection::DenylistedName(word));
        }

        let ticker = listing.ticker.to_lowercase();
        if let Some(word) = find_denylisted(&ticker, &self.config.ticker_denylist) {
            return Err(Rejection::DenylistedTicker(word));
        }

        if self.config.denylisted_creators.iter().any(|c| *c == listing.created_by) {
            return Err(Rejection::DenylistedCreator);
        }

        Ok(())
    }

    pub fn is_worthy(&self, listing: &Listing, now: DateTime<Utc>) -> bool {
        self.check(listing, now).is_ok()
    }

    /// Branded name or any social link.
    pub fn is_premium(&self, listing: &Listing) -> bool {
        listing.name.to_lowercase().contains(&self.config.premium_keyword) || listing.has_socials()
    }
}

fn find_denylisted(text: &str, denylist: &[String]) -> Option<String> {
    denylist.iter().find(|w| text.contains(w.as_str())).cloned()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
