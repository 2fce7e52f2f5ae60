//! Launch-market sniper.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod engine;
pub mod platforms;
pub mod strategy;
pub mod types;
