//! Transaction state machine.
//!
//! `Idle -> begin -> Open -> commit | rollback -> Idle`. A transaction is
//! either explicit (opened by `begin`) or implicit (opened by the first write
//! of a statement and closed by the dispatcher when the statement ends).
//! `Failed` is terminal: a rollback did not complete and the handle can no
//! longer vouch for its state.

use crate::{Error, Result};

/// How the active transaction was opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    /// Opened by `begin`; ends with `commit` or `rollback`
    Explicit,
    /// Opened by a write outside an explicit transaction; ends with the statement
    Implicit,
}

/// Transaction state of one handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionState {
    /// No transaction open
    Idle,
    /// A transaction is open
    Open {
        /// Monotonic transaction id
        id: u64,
        /// Explicit or implicit
        kind: TransactionKind,
    },
    /// A rollback failed; every further operation is rejected
    Failed(String),
}

/// Tracks the single transaction a handle may have open.
#[derive(Debug)]
pub struct TransactionManager {
    state: TransactionState,
    next_id: u64,
}

impl TransactionManager {
    /// Create an idle manager
    pub fn new() -> Self {
        Self {
            state: TransactionState::Idle,
            next_id: 1,
        }
    }

    /// Current state
    pub fn state(&self) -> &TransactionState {
        &self.state
    }

    /// Rejects every operation once the handle has failed.
    pub fn check_usable(&self) -> Result<()> {
        match &self.state {
            TransactionState::Failed(reason) => Err(Error::Corrupted(reason.clone())),
            _ => Ok(()),
        }
    }

    /// Id and kind of the open transaction, if any
    pub fn active(&self) -> Option<(u64, TransactionKind)> {
        match self.state {
            TransactionState::Open { id, kind } => Some((id, kind)),
            _ => None,
        }
    }

    /// True when an explicit transaction is open
    pub fn is_explicit(&self) -> bool {
        matches!(self.active(), Some((_, TransactionKind::Explicit)))
    }

    /// Open an explicit transaction.
    ///
    /// An implicit transaction already holding this statement's writes is
    /// promoted instead of opening a new one. Returns the transaction id and
    /// whether storage must start a new transaction.
    pub fn begin_explicit(&mut self) -> Result<(u64, bool)> {
        self.check_usable()?;
        match self.state {
            TransactionState::Open {
                kind: TransactionKind::Explicit,
                ..
            } => Err(Error::AlreadyOpen),
            TransactionState::Open {
                id,
                kind: TransactionKind::Implicit,
            } => {
                self.state = TransactionState::Open {
                    id,
                    kind: TransactionKind::Explicit,
                };
                Ok((id, false))
            }
            _ => Ok((self.open(TransactionKind::Explicit), true)),
        }
    }

    /// Make sure a transaction is open before a write.
    ///
    /// Returns `Some(id)` when a new implicit transaction was opened.
    pub fn ensure_open(&mut self) -> Result<Option<u64>> {
        self.check_usable()?;
        match self.state {
            TransactionState::Open { .. } => Ok(None),
            _ => Ok(Some(self.open(TransactionKind::Implicit))),
        }
    }

    /// Check that `commit` is allowed and return the id being committed.
    pub fn commit_target(&self) -> Result<u64> {
        self.check_usable()?;
        self.active()
            .map(|(id, _)| id)
            .ok_or(Error::NoActiveTransaction)
    }

    /// Transition to `Idle` after a finished commit or rollback.
    pub fn finish(&mut self) {
        if !matches!(self.state, TransactionState::Failed(_)) {
            self.state = TransactionState::Idle;
        }
    }

    /// Transition to the terminal `Failed` state.
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.state = TransactionState::Failed(reason.into());
    }

    fn open(&mut self, kind: TransactionKind) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.state = TransactionState::Open { id, kind };
        id
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_commit_cycle() {
        let mut manager = TransactionManager::new();
        assert_eq!(manager.state(), &TransactionState::Idle);

        let (id, fresh) = manager.begin_explicit().unwrap();
        assert!(fresh);
        assert!(manager.is_explicit());
        assert_eq!(manager.commit_target().unwrap(), id);

        manager.finish();
        assert_eq!(manager.state(), &TransactionState::Idle);
    }

    #[test]
    fn test_nested_begin_fails() {
        let mut manager = TransactionManager::new();
        manager.begin_explicit().unwrap();
        assert!(matches!(manager.begin_explicit(), Err(Error::AlreadyOpen)));
    }

    #[test]
    fn test_commit_while_idle() {
        let manager = TransactionManager::new();
        assert!(matches!(
            manager.commit_target(),
            Err(Error::NoActiveTransaction)
        ));
    }

    #[test]
    fn test_implicit_promoted_by_begin() {
        let mut manager = TransactionManager::new();
        let implicit = manager.ensure_open().unwrap().unwrap();
        assert_eq!(manager.ensure_open().unwrap(), None);

        let (id, fresh) = manager.begin_explicit().unwrap();
        assert_eq!(id, implicit);
        assert!(!fresh);
        assert!(manager.is_explicit());
    }

    #[test]
    fn test_ids_are_monotonic() {
        let mut manager = TransactionManager::new();
        let first = manager.ensure_open().unwrap().unwrap();
        manager.finish();
        let (second, _) = manager.begin_explicit().unwrap();
        assert!(second > first);
    }

    #[test]
    fn test_failed_state_is_terminal() {
        let mut manager = TransactionManager::new();
        manager.begin_explicit().unwrap();
        manager.fail("rollback could not restore page 3");
        manager.finish();

        assert!(matches!(manager.check_usable(), Err(Error::Corrupted(_))));
        assert!(matches!(manager.begin_explicit(), Err(Error::Corrupted(_))));
        assert!(matches!(manager.ensure_open(), Err(Error::Corrupted(_))));
    }
}
