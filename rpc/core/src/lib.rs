//! Chain source contract shared by the ledger indexer and its RPC clients.

pub mod api;
pub mod model;

pub use api::ChainSource;
pub use model::*;
