pub mod config;
pub mod error;
pub mod loan;
pub mod notify;
pub mod schedule;
pub mod store;
pub mod summary;
pub mod tracker;
