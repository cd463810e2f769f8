//! Error types for Vedis.

use std::fmt;

/// The main error type for Vedis operations.
#[derive(Debug)]
pub enum Error {
    /// Key, field or command absent. Distinct from "present but empty".
    NotFound,

    /// Allocation or capacity exhaustion
    OutOfMemory,

    /// No command is registered under this name
    UnknownCommand(String),

    /// A command handler failed or panicked
    CommandFailed {
        /// Upper-cased command name
        command: String,
        /// Failure description reported by the handler
        reason: String,
    },

    /// I/O error
    Io(std::io::Error),

    /// The database is locked by another handle or process
    Busy,

    /// Write attempted on a read-only handle
    ReadOnly,

    /// `begin` while an explicit transaction is already open
    AlreadyOpen,

    /// `commit` without an open transaction
    NoActiveTransaction,

    /// Wrong value shape or wrong record kind for the operation
    TypeError(String),

    /// Malformed command text
    Syntax(String),

    /// Bad argument count or argument value
    InvalidArgument(String),

    /// The handle was closed
    Closed,

    /// On-disk state failed validation, or a rollback could not complete
    Corrupted(String),

    /// Commit failed and the automatic rollback failed as well
    DoubleFault {
        /// The original commit failure
        commit: Box<Error>,
        /// The failure of the rollback attempted afterwards
        rollback: Box<Error>,
    },

    /// Serialization/deserialization error
    Serialization(String),

    /// A lock was poisoned (internal error)
    LockPoisoned,
}

impl Error {
    /// Handler-level failure; converted to [`Error::CommandFailed`] by the dispatcher.
    pub fn handler(reason: impl Into<String>) -> Self {
        Error::CommandFailed {
            command: String::new(),
            reason: reason.into(),
        }
    }

    /// Returns true for [`Error::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound)
    }

    /// Whether the error originates below the command layer.
    ///
    /// Engine errors cross the dispatcher unchanged; everything else raised by
    /// a handler becomes [`Error::CommandFailed`].
    pub fn is_engine_error(&self) -> bool {
        !matches!(
            self,
            Error::CommandFailed { .. } | Error::InvalidArgument(_) | Error::Syntax(_)
        )
    }

    /// Converts a handler-raised error into the generic command failure.
    pub fn into_command_failure(self, command: &str) -> Self {
        if self.is_engine_error() {
            return self;
        }
        let reason = match self {
            Error::CommandFailed { reason, .. } => reason,
            other => other.to_string(),
        };
        Error::CommandFailed {
            command: command.to_string(),
            reason,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotFound => write!(f, "Value not found"),
            Error::OutOfMemory => write!(f, "Out of memory"),
            Error::UnknownCommand(name) => write!(f, "Unknown command: {}", name),
            Error::CommandFailed { command, reason } => {
                write!(f, "Command {} failed: {}", command, reason)
            }
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Busy => write!(f, "Database is locked by another thread/process"),
            Error::ReadOnly => write!(f, "Database is in read-only mode"),
            Error::AlreadyOpen => write!(f, "A transaction is already open"),
            Error::NoActiveTransaction => write!(f, "No active transaction"),
            Error::TypeError(msg) => write!(f, "Type error: {}", msg),
            Error::Syntax(msg) => write!(f, "Syntax error: {}", msg),
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            Error::Closed => write!(f, "Database handle is closed"),
            Error::Corrupted(msg) => write!(f, "Database corrupted: {}", msg),
            Error::DoubleFault { commit, rollback } => write!(
                f,
                "Double fault: commit failed ({}) and rollback failed ({})",
                commit, rollback
            ),
            Error::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            Error::LockPoisoned => write!(f, "Lock poisoned"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::DoubleFault { commit, .. } => Some(commit.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::OutOfMemory => Error::OutOfMemory,
            _ => Error::Io(err),
        }
    }
}

/// A specialized `Result` type for Vedis operations.
pub type Result<T> = std::result::Result<T, Error>;
