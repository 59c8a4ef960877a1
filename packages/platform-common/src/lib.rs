//! Shared infrastructure for database-backed services: ambient transaction
//! propagation, one-shot shutdown coordination and a thin sea-orm client.

pub mod closer;
pub mod config;
pub mod db;
pub mod error;

pub use closer::{Closer, ShutdownSignal};
pub use config::db::DbConfig;
pub use db::{
    connect, Db, DbScope, Query, Scope, Transactor, TxHandle, TxManager, TxOptions, TxnPolicy,
};
pub use error::{BoxError, InfraError, TxError};

// Auto-initialize logging for unit tests
#[cfg(test)]
#[ctor::ctor]
fn init_test_logging() {
    platform_test_support::test_logging::init();
}
