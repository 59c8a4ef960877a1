use sea_orm::{AccessMode, IsolationLevel};

/// What a transaction manager does with a transaction whose unit of work succeeded.
///
/// Failed units are always rolled back; the policy only decides the success path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TxnPolicy {
    /// Commit the transaction when the operation succeeds (default behavior)
    #[default]
    CommitOnOk,
    /// Rollback the transaction when the operation succeeds (for testing)
    RollbackOnOk,
}

impl TxnPolicy {
    /// Parse a policy name as read from `DB_TXN_POLICY`.
    ///
    /// `"rollback"` selects [`TxnPolicy::RollbackOnOk`]; anything else commits.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "rollback" | "rollback_on_ok" => TxnPolicy::RollbackOnOk,
            _ => TxnPolicy::CommitOnOk,
        }
    }
}

/// Options passed to `BEGIN` for a new top-level transaction.
///
/// Nested calls join the open transaction and ignore these.
#[derive(Debug, Clone, Default)]
pub struct TxOptions {
    pub isolation: Option<IsolationLevel>,
    pub access_mode: Option<AccessMode>,
    /// Label for the unit in logs and [`TxError`](crate::TxError)s.
    pub name: Option<&'static str>,
}

impl TxOptions {
    pub fn read_committed() -> Self {
        Self::with_isolation(IsolationLevel::ReadCommitted)
    }

    pub fn serializable() -> Self {
        Self::with_isolation(IsolationLevel::Serializable)
    }

    pub fn with_isolation(isolation: IsolationLevel) -> Self {
        Self {
            isolation: Some(isolation),
            ..Self::default()
        }
    }

    pub fn read_only(mut self) -> Self {
        self.access_mode = Some(AccessMode::ReadOnly);
        self
    }

    pub fn named(mut self, name: &'static str) -> Self {
        self.name = Some(name);
        self
    }
}
