pub mod accounts;
pub mod deploy;
pub mod fund;
pub mod query;
pub mod setup;
pub mod ui;
