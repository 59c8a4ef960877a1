use std::fmt;

use tokio_util::sync::CancellationToken;

/// Request-scoped context threaded through repository and service calls.
///
/// Carries the active transaction, if any, as a typed borrowed field, plus a
/// cancellation token that long-running units may check. The transaction
/// manager is the only place that attaches a transaction.
pub struct Scope<'t, T> {
    txn: Option<&'t T>,
    cancel: CancellationToken,
}

impl<T> Scope<'static, T> {
    /// A scope with no transaction and a fresh cancellation token.
    pub fn root() -> Self {
        Self::with_cancellation(CancellationToken::new())
    }

    pub fn with_cancellation(cancel: CancellationToken) -> Self {
        Self { txn: None, cancel }
    }
}

impl<'t, T> Scope<'t, T> {
    /// The transaction this scope runs inside, if one is open.
    pub fn txn(&self) -> Option<&'t T> {
        self.txn
    }

    pub fn in_transaction(&self) -> bool {
        self.txn.is_some()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Derive a scope bound to `txn`, sharing this scope's cancellation.
    pub(crate) fn with_txn<'a>(&self, txn: &'a T) -> Scope<'a, T> {
        Scope {
            txn: Some(txn),
            cancel: self.cancel.clone(),
        }
    }
}

impl<T> Clone for Scope<'_, T> {
    fn clone(&self) -> Self {
        Self {
            txn: self.txn,
            cancel: self.cancel.clone(),
        }
    }
}

impl<T> Default for Scope<'static, T> {
    fn default() -> Self {
        Self::root()
    }
}

impl<T> fmt::Debug for Scope<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("in_transaction", &self.in_transaction())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
