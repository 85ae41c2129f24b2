//! The poll→filter→dedupe→notify pipeline.

pub mod cycle;
pub mod filter;
pub mod retry;

pub use cycle::{CycleStats, Orchestrator};
pub use filter::{FilterPolicy, Verdict};
pub use retry::{Pending, RetryQueue};
