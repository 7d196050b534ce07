//! Supply-chain coordination core for textile suppliers and producers.
//!
//! Three engines mutate three linked inventory ledgers through a shared
//! store: the request lifecycle engine moves fabric from supplier stock to
//! producer raw material, the production engine turns raw material into
//! finished goods, and the sales engine depletes finished goods. Engines
//! return notification events as values; delivery is the caller's concern.

pub mod catalog;
pub mod error;
pub mod ledger;
pub mod model;
pub mod notify;
pub mod production;
pub mod request;
pub mod sales;
pub mod service;
pub mod utils;
