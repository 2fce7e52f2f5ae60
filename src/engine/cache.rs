//! Position cache.
//!
//! Tracks which tokens currently have an open (or opening) position so the
//! same listing is never bought twice. Claim is an atomic check-and-insert
//! on a sharded concurrent set; release is unconditional and idempotent.

use dashmap::DashSet;
use std::sync::Arc;

use crate::types::TokenId;

/// Result of a claim attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// The caller now owns the token's position.
    Claimed,
    /// Another task already holds it.
    AlreadyHeld,
}

/// Shared set of claimed token ids. Cloning shares the same set.
#[derive(Debug, Clone, Default)]
pub struct PositionCache {
    entries: Arc<DashSet<TokenId>>,
}

impl PositionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn claim(&self, token_id: TokenId) -> Claim {
        if self.entries.insert(token_id) {
            Claim::Claimed
        } else {
            Claim::AlreadyHeld
        }
    }

    /// Drop the claim on `token_id`. Returns whether one existed.
    pub fn release(&self, token_id: TokenId) -> bool {
        self.entries.remove(&token_id).is_some()
    }

    pub fn contains(&self, token_id: TokenId) -> bool {
        self.entries.contains(&token_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
