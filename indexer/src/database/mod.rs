//! Ledger storage

pub mod connection;
pub mod queries;
pub mod schema;
pub mod unit_of_work;

pub use connection::Database;
pub use unit_of_work::UnitOfWork;
