//! Trading decisions: which listings to buy and when to sell them.

pub mod eligibility;
pub mod exit;

pub use eligibility::{EligibilityFilter, FilterConfig, Rejection};
pub use exit::{ExitConfig, ExitDecision, ExitPolicy, ExitReason, PollSnapshot};
