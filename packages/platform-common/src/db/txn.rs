use std::any::Any;
use std::error::Error as StdError;
use std::panic::AssertUnwindSafe;

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{debug, error, warn};

use super::scope::Scope;
use super::txn_policy::{TxOptions, TxnPolicy};
use super::{Transactor, TxHandle};
use crate::error::TxError;

/// Runs units of work inside a single database transaction.
///
/// The manager holds no per-call state. A top-level call owns its transaction
/// from `BEGIN` to the terminal commit or rollback and lends it to the unit
/// through the derived [`Scope`]; nested calls see it there and join it.
pub struct TxManager<D> {
    db: D,
    policy: TxnPolicy,
}

impl<D: Transactor> TxManager<D> {
    pub fn new(db: D) -> Self {
        Self::with_policy(db, TxnPolicy::CommitOnOk)
    }

    pub fn with_policy(db: D, policy: TxnPolicy) -> Self {
        Self { db, policy }
    }

    pub fn policy(&self) -> TxnPolicy {
        self.policy
    }

    pub fn db(&self) -> &D {
        &self.db
    }

    /// Execute `unit` inside a transaction.
    ///
    /// 1) `scope` already carries a transaction → run `unit` with it and return
    ///    its result untouched (no `BEGIN`, `options` ignored)
    /// 2) Otherwise → begin with `options`, run `unit` on the derived scope,
    ///    roll back on error or panic, apply the policy on success
    ///
    /// Exactly one of commit or rollback is issued per transaction. Logs and
    /// errors name the unit after [`TxOptions::named`], falling back to the
    /// closure's type name.
    pub async fn run_in_transaction<R, E, F>(
        &self,
        scope: &Scope<'_, D::Tx>,
        options: TxOptions,
        unit: F,
    ) -> Result<R, E>
    where
        F: for<'c> FnOnce(&'c Scope<'c, D::Tx>) -> BoxFuture<'c, Result<R, E>>,
        E: From<TxError> + StdError + Send + Sync + 'static,
    {
        if scope.in_transaction() {
            return unit(scope).await;
        }

        let unit_name = options.name.unwrap_or_else(std::any::type_name::<F>);
        let txn = self
            .db
            .begin_tx(options)
            .await
            .map_err(|e| E::from(TxError::Begin(e)))?;
        debug!(unit = unit_name, "transaction started");

        // The call itself sits inside the guard so a closure that panics
        // before handing back its future is caught too.
        let outcome = {
            let derived = scope.with_txn(&txn);
            AssertUnwindSafe(async { unit(&derived).await })
                .catch_unwind()
                .await
        };

        let failure = match outcome {
            Ok(Ok(value)) => {
                self.finish_ok(txn, unit_name).await.map_err(E::from)?;
                return Ok(value);
            }
            Ok(Err(err)) => TxError::Unit {
                unit: unit_name,
                source: Box::new(err),
            },
            Err(payload) => TxError::Panic {
                unit: unit_name,
                payload: panic_message(payload.as_ref()),
            },
        };

        warn!(unit = unit_name, error = %failure, "unit of work failed, rolling back");
        if let Err(rollback_err) = txn.rollback().await {
            error!(unit = unit_name, error = %rollback_err, "rollback failed");
            return Err(E::from(TxError::Rollback {
                source: rollback_err,
                cause: Some(Box::new(failure)),
            }));
        }

        Err(E::from(failure))
    }

    /// [`run_in_transaction`](Self::run_in_transaction) at `READ COMMITTED`.
    pub async fn read_committed<R, E, F>(&self, scope: &Scope<'_, D::Tx>, unit: F) -> Result<R, E>
    where
        F: for<'c> FnOnce(&'c Scope<'c, D::Tx>) -> BoxFuture<'c, Result<R, E>>,
        E: From<TxError> + StdError + Send + Sync + 'static,
    {
        self.run_in_transaction(scope, TxOptions::read_committed(), unit)
            .await
    }

    async fn finish_ok(&self, txn: D::Tx, unit_name: &'static str) -> Result<(), TxError> {
        match self.policy {
            TxnPolicy::CommitOnOk => {
                txn.commit().await.map_err(TxError::Commit)?;
                debug!(unit = unit_name, "transaction committed");
            }
            TxnPolicy::RollbackOnOk => {
                txn.rollback()
                    .await
                    .map_err(|source| TxError::Rollback {
                        source,
                        cause: None,
                    })?;
                debug!(unit = unit_name, "transaction rolled back by policy");
            }
        }
        Ok(())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
