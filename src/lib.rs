pub mod actions;
pub mod address;
pub mod cli;
pub mod config;
pub mod error;
pub mod explorer;
pub mod redeem;
pub mod selector;
pub mod signing;
pub mod stake;
#[cfg(test)]
mod testutil;
pub mod transaction;
pub mod types;
pub mod wallet;
pub mod wire;
