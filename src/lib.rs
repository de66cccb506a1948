//! Election result tallying and review.
//!
//! Reported ballot counts for a contest are submitted, reviewed and
//! confirmed. Confirmation picks the winners by plurality and writes an
//! immutable audit trail for every candidate in one transaction.

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod models;
pub mod review;
pub mod voting;

pub use config::Config;
pub use db::Database;
pub use error::{Error, Result};
pub use review::{ContestLock, ContestLocks, ReviewWorkflow};
pub use voting::{Tally, select_winners};
