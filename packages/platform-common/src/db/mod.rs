//! Database access: transaction propagation, the sea-orm client wrapper and
//! the contracts the transaction manager needs from a database driver.

pub mod client;
pub mod prettier;
pub mod scope;
pub mod txn;
pub mod txn_policy;

use async_trait::async_trait;
use sea_orm::{DatabaseConnection, DatabaseTransaction, DbErr, TransactionTrait};

pub use client::{connect, Db};
pub use scope::Scope;
pub use txn::TxManager;
pub use txn_policy::{TxOptions, TxnPolicy};

/// Scope carrying a sea-orm transaction.
pub type DbScope<'t> = Scope<'t, DatabaseTransaction>;

/// A named raw SQL statement. The name only shows up in logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub name: String,
    pub raw: String,
}

impl Query {
    pub fn new(name: impl Into<String>, raw: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            raw: raw.into(),
        }
    }
}

/// Something that can open a transaction.
#[async_trait]
pub trait Transactor: Send + Sync {
    type Tx: TxHandle;

    async fn begin_tx(&self, options: TxOptions) -> Result<Self::Tx, DbErr>;
}

/// An open transaction. Consumed by exactly one of `commit` or `rollback`.
#[async_trait]
pub trait TxHandle: Send + Sync + Sized + 'static {
    async fn commit(self) -> Result<(), DbErr>;

    async fn rollback(self) -> Result<(), DbErr>;
}

#[async_trait]
impl Transactor for DatabaseConnection {
    type Tx = DatabaseTransaction;

    async fn begin_tx(&self, options: TxOptions) -> Result<DatabaseTransaction, DbErr> {
        self.begin_with_config(options.isolation, options.access_mode)
            .await
    }
}

#[async_trait]
impl TxHandle for DatabaseTransaction {
    async fn commit(self) -> Result<(), DbErr> {
        DatabaseTransaction::commit(self).await
    }

    async fn rollback(self) -> Result<(), DbErr> {
        DatabaseTransaction::rollback(self).await
    }
}
