//! Per-invocation context handed to command handlers.

use crate::store::Store;
use std::any::Any;
use vedis_core::{Result, Value};
use vedis_storage::StorageEngine;

/// What a running command can see and touch.
///
/// A context borrows the handle's engine for the duration of one command, so
/// everything a handler does through it belongs to the same statement (and
/// the same transaction) as the command itself.
///
/// # Examples
///
/// ```rust,no_run
/// use vedis::{CommandContext, Database, Value};
///
/// let db = Database::in_memory()?;
/// db.register("GREET", |ctx: &mut CommandContext<'_>, args: &[Value]| {
///     let name = args.first().map(|v| v.to_string()).unwrap_or_default();
///     ctx.set(b"last_greeted", name.as_bytes())?;
///     ctx.set_result(format!("hello {}", name));
///     Ok(())
/// })?;
/// assert_eq!(db.exec("GREET world")?, Value::from("hello world"));
/// # Ok::<(), vedis::Error>(())
/// ```
pub struct CommandContext<'a> {
    engine: &'a mut StorageEngine,
    command: &'a str,
    user_data: Option<&'a (dyn Any + Send + Sync)>,
    result: Value,
}

impl<'a> CommandContext<'a> {
    pub(crate) fn new(
        engine: &'a mut StorageEngine,
        command: &'a str,
        user_data: Option<&'a (dyn Any + Send + Sync)>,
    ) -> Self {
        Self {
            engine,
            command,
            user_data,
            result: Value::Null,
        }
    }

    /// Upper-cased name the command was registered under
    pub fn command_name(&self) -> &str {
        self.command
    }

    /// Fetch a plain key
    pub fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.store().kv_get(key)
    }

    /// Store a plain key
    pub fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.store().kv_set(key, value)
    }

    /// Append to a plain key, returning the new length
    pub fn append(&mut self, key: &[u8], value: &[u8]) -> Result<usize> {
        self.store().kv_append(key, value)
    }

    /// Delete a plain key, returning whether it existed
    pub fn delete(&mut self, key: &[u8]) -> Result<bool> {
        self.store().kv_delete(key)
    }

    pub fn exists(&mut self, key: &[u8]) -> Result<bool> {
        self.store().kv_exists(key)
    }

    /// Hash, set and list access for the same handle
    pub fn store(&mut self) -> Store<'_> {
        Store::new(&mut *self.engine)
    }

    /// Data attached with [`Database::register_with_data`](crate::Database::register_with_data)
    pub fn user_data<T: Any>(&self) -> Option<&T> {
        self.user_data.and_then(|data| data.downcast_ref::<T>())
    }

    /// Set the value the command returns
    pub fn set_result(&mut self, value: impl Into<Value>) {
        self.result = value.into();
    }

    pub fn result(&self) -> &Value {
        &self.result
    }

    /// Open an explicit transaction. Writes this command already made
    /// become part of it instead of being committed when the command ends.
    pub fn begin(&mut self) -> Result<()> {
        self.engine.begin()
    }

    pub fn commit(&mut self) -> Result<()> {
        self.engine.commit()
    }

    pub fn rollback(&mut self) -> Result<()> {
        self.engine.rollback()
    }

    pub(crate) fn into_result(self) -> Value {
        self.result
    }
}
