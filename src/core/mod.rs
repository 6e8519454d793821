//! Funding ledger, price oracle and the pieces they share.

pub mod config;
pub mod ledger;
pub mod log;
pub mod oracle;
pub mod registry;
pub mod units;

/// An opaque account or contract identifier, e.g. `0xf39f...2266`.
pub type Address = String;

// Re-export main types for cleaner imports
pub use ledger::{FundError, FundingLedger, FundsTransfer, QueryError, WithdrawError};
pub use oracle::{OracleError, Price, PriceFeed, PriceOracle, RoundData};
pub use registry::{Deployment, DeploymentRegistry, MemoryRegistry};
