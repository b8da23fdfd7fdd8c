pub mod alert;
pub mod cli;
pub mod config;
pub mod filter;
pub mod metrics;
pub mod output;
pub mod source;
