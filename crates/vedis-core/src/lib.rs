//! # Vedis Core
//!
//! Core types shared by every Vedis crate: the error taxonomy, the
//! dynamically-typed [`Value`] model, the command text lexer and the
//! transaction state machine.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod command;
pub mod error;
pub mod format_version;
pub mod transaction;
pub mod value;

pub use command::{format_command, normalize_name, quote, CommandLine};
pub use error::{Error, Result};
pub use transaction::{TransactionKind, TransactionManager, TransactionState};
pub use value::Value;
