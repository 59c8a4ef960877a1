use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DatabaseTransaction, DbErr,
    ExecResult, FromQueryResult, QueryResult, Statement, TransactionTrait, Value,
};
use tracing::{debug, info, Level};

use super::prettier::{pretty, PLACEHOLDER_DOLLAR};
use super::{DbScope, Query, Transactor, TxOptions};
use crate::config::db::DbConfig;
use crate::error::InfraError;

/// Connect a pool as described by `config`.
pub async fn connect(config: &DbConfig) -> Result<Db, InfraError> {
    let mut opt = ConnectOptions::new(config.url.clone());
    opt.max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .sqlx_logging(false);

    let conn = Database::connect(opt).await.map_err(InfraError::Connect)?;
    info!(url = %config.redacted_url(), "database connected");

    Ok(Db::new(conn).with_query_logging(config.log_queries))
}

/// Pool wrapper whose statements follow the transaction on the scope.
///
/// Every query method runs against the scope's transaction when one is open
/// and against the pool otherwise, so repositories are written once and work
/// both inside and outside [`TxManager`](super::TxManager) units.
///
/// Clones share one pool through an `Arc`.
#[derive(Clone)]
pub struct Db {
    conn: Arc<DatabaseConnection>,
    log_queries: bool,
}

impl Db {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self {
            conn: Arc::new(conn),
            log_queries: true,
        }
    }

    pub fn with_query_logging(mut self, enabled: bool) -> Self {
        self.log_queries = enabled;
        self
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    pub async fn exec(
        &self,
        scope: &DbScope<'_>,
        q: &Query,
        args: Vec<Value>,
    ) -> Result<ExecResult, DbErr> {
        let stmt = self.statement(q, args);
        match scope.txn() {
            Some(txn) => txn.execute(stmt).await,
            None => self.conn.execute(stmt).await,
        }
    }

    pub async fn query_one(
        &self,
        scope: &DbScope<'_>,
        q: &Query,
        args: Vec<Value>,
    ) -> Result<Option<QueryResult>, DbErr> {
        let stmt = self.statement(q, args);
        match scope.txn() {
            Some(txn) => txn.query_one(stmt).await,
            None => self.conn.query_one(stmt).await,
        }
    }

    pub async fn query_all(
        &self,
        scope: &DbScope<'_>,
        q: &Query,
        args: Vec<Value>,
    ) -> Result<Vec<QueryResult>, DbErr> {
        let stmt = self.statement(q, args);
        match scope.txn() {
            Some(txn) => txn.query_all(stmt).await,
            None => self.conn.query_all(stmt).await,
        }
    }

    /// Map the first row into `T`. `Ok(None)` when the query returns no rows.
    pub async fn scan_one<T: FromQueryResult>(
        &self,
        scope: &DbScope<'_>,
        q: &Query,
        args: Vec<Value>,
    ) -> Result<Option<T>, DbErr> {
        let selector = T::find_by_statement(self.statement(q, args));
        match scope.txn() {
            Some(txn) => selector.one(txn).await,
            None => selector.one(self.conn.as_ref()).await,
        }
    }

    pub async fn scan_all<T: FromQueryResult>(
        &self,
        scope: &DbScope<'_>,
        q: &Query,
        args: Vec<Value>,
    ) -> Result<Vec<T>, DbErr> {
        let selector = T::find_by_statement(self.statement(q, args));
        match scope.txn() {
            Some(txn) => selector.all(txn).await,
            None => selector.all(self.conn.as_ref()).await,
        }
    }

    pub async fn ping(&self) -> Result<(), DbErr> {
        self.conn.ping().await
    }

    /// Close the pool if this is the last handle to it.
    ///
    /// While other clones are alive the pool stays open and closes once the
    /// last of them is dropped.
    pub async fn close(self) -> Result<(), DbErr> {
        match Arc::into_inner(self.conn) {
            Some(conn) => conn.close().await,
            None => {
                debug!("database pool still shared; leaving it to the last handle");
                Ok(())
            }
        }
    }

    /// Take back the underlying connection when no other clone holds it.
    pub fn into_connection(self) -> Option<DatabaseConnection> {
        Arc::into_inner(self.conn)
    }

    fn statement(&self, q: &Query, args: Vec<Value>) -> Statement {
        if self.log_queries && tracing::enabled!(Level::DEBUG) {
            debug!(
                sql = %q.name,
                query = %pretty(&q.raw, PLACEHOLDER_DOLLAR, &args),
                "executing statement"
            );
        }
        Statement::from_sql_and_values(self.conn.get_database_backend(), q.raw.as_str(), args)
    }
}

#[async_trait]
impl Transactor for Db {
    type Tx = DatabaseTransaction;

    async fn begin_tx(&self, options: TxOptions) -> Result<DatabaseTransaction, DbErr> {
        self.conn
            .begin_with_config(options.isolation, options.access_mode)
            .await
    }
}
