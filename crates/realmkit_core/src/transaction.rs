//! Transaction state and the scope helper.

use crate::error::{CoreError, CoreResult};
use crate::realm::Realm;
use std::fmt;

/// Transaction state of a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransactionState {
    /// No transaction is active.
    #[default]
    None,
    /// A read transaction is active.
    Read,
    /// A write transaction is active.
    Write,
}

impl TransactionState {
    /// Whether a transaction is active.
    #[must_use]
    pub fn is_active(self) -> bool {
        self != TransactionState::None
    }

    /// Returns the upper-case state name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            TransactionState::None => "NONE",
            TransactionState::Read => "READ",
            TransactionState::Write => "WRITE",
        }
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The kind of transaction a scope opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionKind {
    /// Read-only snapshot.
    Read,
    /// Read-write transaction.
    Write,
}

impl TransactionKind {
    /// The handle state while a transaction of this kind is active.
    #[must_use]
    pub fn state(self) -> TransactionState {
        match self {
            TransactionKind::Read => TransactionState::Read,
            TransactionKind::Write => TransactionState::Write,
        }
    }
}

impl TryFrom<TransactionState> for TransactionKind {
    type Error = CoreError;

    fn try_from(state: TransactionState) -> CoreResult<Self> {
        match state {
            TransactionState::Read => Ok(TransactionKind::Read),
            TransactionState::Write => Ok(TransactionKind::Write),
            TransactionState::None => Err(CoreError::InvalidTransactionKind),
        }
    }
}

/// A transaction bound to a closure.
///
/// Handed to the closure passed to [`Realm::transaction`],
/// [`Realm::read`] or [`Realm::write`]. When the closure returns `Ok` the
/// transaction is committed; when it returns `Err` or panics it is rolled
/// back. [`TransactionScope::cancel`] rolls back early, after which the
/// scope does nothing on exit.
pub struct TransactionScope<'r> {
    realm: &'r Realm,
    kind: TransactionKind,
    resolved: bool,
}

impl<'r> TransactionScope<'r> {
    pub(crate) fn new(realm: &'r Realm, kind: TransactionKind) -> Self {
        Self {
            realm,
            kind,
            resolved: false,
        }
    }

    /// The handle the transaction runs on.
    #[must_use]
    pub fn realm(&self) -> &'r Realm {
        self.realm
    }

    /// The kind of transaction this scope opened.
    #[must_use]
    pub fn kind(&self) -> TransactionKind {
        self.kind
    }

    /// Whether the scope has been cancelled or finished.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// Rolls the transaction back before the scope ends.
    ///
    /// Returns `Ok(false)` if the scope was already resolved or the handle
    /// has no active transaction.
    ///
    /// # Errors
    ///
    /// Returns the engine error if the rollback call fails.
    pub fn cancel(&mut self) -> CoreResult<bool> {
        if self.resolved {
            return Ok(false);
        }
        self.resolved = true;
        self.realm.rollback()
    }

    /// Commits if the handle still has an active transaction.
    ///
    /// A refused commit is followed by a rollback so the handle is not left
    /// holding the transaction; the commit error is returned either way.
    pub(crate) fn finish(&mut self) -> CoreResult<bool> {
        if self.resolved {
            return Ok(false);
        }
        self.resolved = true;
        match self.realm.commit() {
            Ok(committed) => Ok(committed),
            Err(e) => {
                if let Err(rollback) = self.realm.rollback() {
                    tracing::warn!(
                        target: "realmkit::txn",
                        error = %rollback,
                        "rollback after failed commit"
                    );
                }
                Err(e)
            }
        }
    }

    /// Rolls back without surfacing errors; the caller is already failing.
    pub(crate) fn abandon(&mut self) {
        if self.resolved {
            return;
        }
        self.resolved = true;
        if let Err(e) = self.realm.rollback() {
            tracing::warn!(target: "realmkit::txn", error = %e, "rollback after failed scope");
        }
    }
}

impl Drop for TransactionScope<'_> {
    fn drop(&mut self) {
        self.abandon();
    }
}

impl fmt::Debug for TransactionScope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionScope")
            .field("kind", &self.kind)
            .field("resolved", &self.resolved)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_names() {
        assert_eq!(TransactionState::None.to_string(), "NONE");
        assert_eq!(TransactionState::Read.to_string(), "READ");
        assert_eq!(TransactionState::Write.to_string(), "WRITE");
        assert!(!TransactionState::None.is_active());
        assert!(TransactionState::Write.is_active());
    }

    #[test]
    fn kind_from_state() {
        assert_eq!(
            TransactionKind::try_from(TransactionState::Read),
            Ok(TransactionKind::Read)
        );
        assert_eq!(
            TransactionKind::try_from(TransactionState::None),
            Err(CoreError::InvalidTransactionKind)
        );
        assert_eq!(TransactionKind::Write.state(), TransactionState::Write);
    }
}
