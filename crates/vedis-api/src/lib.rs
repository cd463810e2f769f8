//! # Vedis
//!
//! An embedded, command-driven data store. One database file holds plain
//! key/value pairs plus named hashes, sets and lists; everything can be
//! reached through typed Rust calls or through short text commands such as
//! `HSET users alice admin`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use vedis::{Database, Value};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::open("./app.vedis")?;
//!
//!     // Key/value
//!     db.store(b"greeting", b"hello")?;
//!     assert_eq!(db.fetch(b"greeting")?, b"hello".to_vec());
//!
//!     // Commands
//!     db.execute("HSET %s %s %s", &["users", "alice", "admin"])?;
//!     let role = db.exec("HGET users alice")?;
//!     assert_eq!(role, Value::from("admin"));
//!
//!     for member in db.execute_iterating("SMEMBERS %s", &["tags"])? {
//!         println!("{}", member?);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Database Modes
//!
//! ```rust,no_run
//! use vedis::Database;
//!
//! // File-backed, journaled
//! let persistent = Database::open("./data.vedis")?;
//!
//! // Private, lost on close
//! let memory = Database::open(":mem:")?;
//! let also_memory = Database::in_memory()?;
//! # Ok::<(), vedis::Error>(())
//! ```
//!
//! ## Transactions
//!
//! Every write outside an explicit transaction is committed on its own when
//! the call (or command) that made it succeeds, and rolled back when it
//! fails. [`Database::begin`] groups writes until [`Database::commit`] or
//! [`Database::rollback`]; [`Database::transaction`] does both around a
//! closure.

use std::any::Any;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

pub mod context;
pub mod cursor;
pub mod logging;
pub mod registry;
pub mod store;

mod builtins;

// Re-export core types
pub use vedis_core::{format_command, quote, CommandLine, Error, Result, TransactionState, Value};

pub use vedis_journal::SyncMode;
pub use vedis_storage::{StorageConfig, StorageStats};

pub use context::CommandContext;
pub use cursor::{Cursor, ValueIter};
pub use registry::{CommandHandler, Registry};
pub use store::{Store, TableKind};

use vedis_storage::StorageEngine;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Open target for a private in-memory database
pub const MEMORY_TARGET: &str = ":mem:";

fn is_memory_target(target: &Path) -> bool {
    matches!(target.to_str(), Some(MEMORY_TARGET) | Some(":memory:"))
}

/// Everything behind one open handle
struct Handle {
    engine: StorageEngine,
    registry: Registry,
}

impl Handle {
    /// Run one parsed command as one statement
    fn dispatch(&mut self, line: CommandLine) -> Result<Value> {
        let name = line.normalized_name();
        let entry = self
            .registry
            .get(&name)
            .cloned()
            .ok_or_else(|| Error::UnknownCommand(line.name.clone()))?;
        let args: Vec<Value> = line.args.into_iter().map(Value::String).collect();
        debug!(command = %name, args = args.len(), "Executing command");

        let outcome = {
            let mut ctx = CommandContext::new(&mut self.engine, &name, entry.user_data());
            let called = panic::catch_unwind(AssertUnwindSafe(|| {
                entry.handler().call(&mut ctx, &args)
            }));
            match called {
                Ok(Ok(())) => Ok(ctx.into_result()),
                Ok(Err(e)) => Err(e.into_command_failure(&name)),
                Err(payload) => {
                    let reason = panic_message(payload.as_ref());
                    warn!(command = %name, reason = %reason, "Command handler panicked");
                    Err(Error::CommandFailed {
                        command: name.clone(),
                        reason,
                    })
                }
            }
        };

        if let Err(e) = &outcome {
            debug!(command = %name, error = %e, "Command failed");
        }
        finish_statement(&mut self.engine, outcome)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}

/// Commit the statement's implicit transaction on success, roll it back on
/// failure
fn finish_statement<T>(engine: &mut StorageEngine, outcome: Result<T>) -> Result<T> {
    match (engine.finish_statement(outcome.is_ok()), outcome) {
        (Ok(()), outcome) => outcome,
        (Err(e), Ok(_)) => Err(e),
        (Err(rollback), Err(e)) => {
            warn!(error = %e, rollback = %rollback, "Statement rollback failed");
            Err(rollback)
        }
    }
}

/// State shared by every clone of a [`Database`] and by its cursors
pub(crate) struct Shared {
    target: String,
    state: Mutex<Option<Handle>>,
    pub(crate) cursors: AtomicUsize,
}

thread_local! {
    // Databases whose lock the current thread holds inside `Shared::with`
    static HELD: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

/// Marks a database as locked by this thread until dropped
struct HeldMark(usize);

impl HeldMark {
    fn set(key: usize) -> Self {
        HELD.with(|held| held.borrow_mut().push(key));
        HeldMark(key)
    }

    fn is_set(key: usize) -> bool {
        HELD.with(|held| held.borrow().contains(&key))
    }
}

impl Drop for HeldMark {
    fn drop(&mut self) {
        HELD.with(|held| {
            let mut held = held.borrow_mut();
            if let Some(pos) = held.iter().rposition(|k| *k == self.0) {
                held.remove(pos);
            }
        });
    }
}

impl Shared {
    fn key(&self) -> usize {
        self as *const Shared as usize
    }

    /// Locks the handle state. The mutex is not reentrant, so a thread that
    /// already holds it (a command handler calling back into a `Database`
    /// clone) gets [`Error::Busy`] instead of blocking forever.
    fn lock(&self) -> Result<MutexGuard<'_, Option<Handle>>> {
        if HeldMark::is_set(self.key()) {
            warn!(database = %self.target, "Reentrant database call from a command handler");
            return Err(Error::Busy);
        }
        self.state.lock().map_err(|_| Error::LockPoisoned)
    }

    /// Run `f` against the open handle
    pub(crate) fn with<T>(&self, f: impl FnOnce(&mut Handle) -> Result<T>) -> Result<T> {
        let mut guard = self.lock()?;
        let _mark = HeldMark::set(self.key());
        let handle = guard.as_mut().ok_or(Error::Closed)?;
        f(handle)
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let handle = match self.state.get_mut() {
            Ok(state) => state.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = handle {
            if let Err(e) = handle.engine.close() {
                warn!(database = %self.target, error = %e, "Failed to close database on drop");
            }
        }
    }
}

/// The main database handle.
///
/// Cloning is cheap and every clone refers to the same open database. All
/// operations on one database are serialized by an internal lock, so a handle
/// can be shared freely between threads. A second handle on the same file
/// (from this or another process) fails to open with [`Error::Busy`].
///
/// # Examples
///
/// ```rust,no_run
/// use vedis::Database;
///
/// let db = Database::open("./my_data.vedis")?;
/// db.store(b"key", b"value")?;
/// db.close()?;
///
/// let db = Database::open("./my_data.vedis")?;
/// assert_eq!(db.fetch(b"key")?, b"value".to_vec());
/// # Ok::<(), vedis::Error>(())
/// ```
#[derive(Clone)]
pub struct Database {
    shared: Arc<Shared>,
}

impl Database {
    /// Opens (creating if needed) the database at `target`.
    ///
    /// `:mem:` and `:memory:` open a private in-memory database instead of a
    /// file.
    pub fn open<P: AsRef<Path>>(target: P) -> Result<Self> {
        Self::open_with_config(target, StorageConfig::default())
    }

    /// Opens a database with custom storage configuration.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use vedis::{Database, StorageConfig, SyncMode};
    ///
    /// let config = StorageConfig {
    ///     page_size: 8192,
    ///     sync_mode: SyncMode::Async,
    ///     ..Default::default()
    /// };
    /// let db = Database::open_with_config("./tuned.vedis", config)?;
    /// # Ok::<(), vedis::Error>(())
    /// ```
    pub fn open_with_config<P: AsRef<Path>>(target: P, config: StorageConfig) -> Result<Self> {
        let target = target.as_ref();
        let engine = if is_memory_target(target) {
            StorageEngine::open_memory(config)?
        } else {
            StorageEngine::open_with_config(target, config)?
        };

        Ok(Self {
            shared: Arc::new(Shared {
                target: target.display().to_string(),
                state: Mutex::new(Some(Handle {
                    engine,
                    registry: Registry::with_builtins(),
                })),
                cursors: AtomicUsize::new(0),
            }),
        })
    }

    /// Opens a private in-memory database.
    pub fn in_memory() -> Result<Self> {
        Self::open(MEMORY_TARGET)
    }

    /// The path (or `:mem:`) this handle was opened with
    pub fn target(&self) -> &str {
        &self.shared.target
    }

    /// Closes the handle for every clone.
    ///
    /// An explicit transaction that is still open is rolled back. Fails with
    /// [`Error::Busy`] while cursors are alive. Closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        let mut guard = self.shared.lock()?;
        if guard.is_none() {
            return Ok(());
        }
        let cursors = self.shared.cursors.load(Ordering::SeqCst);
        if cursors > 0 {
            debug!(cursors, "Close refused while cursors are open");
            return Err(Error::Busy);
        }
        match guard.take() {
            Some(handle) => handle.engine.close(),
            None => Ok(()),
        }
    }

    /// False once [`close`](Self::close) has run
    pub fn is_open(&self) -> bool {
        self.shared.lock().map(|g| g.is_some()).unwrap_or(false)
    }

    /// Run `f` over the typed store as one statement
    fn statement<T>(&self, f: impl FnOnce(&mut Store<'_>) -> Result<T>) -> Result<T> {
        self.shared.with(|handle| {
            let outcome = f(&mut Store::new(&mut handle.engine));
            finish_statement(&mut handle.engine, outcome)
        })
    }

    // ---- key/value ----

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use vedis::Database;
    ///
    /// let db = Database::in_memory()?;
    /// db.store(b"hello", b"world")?;
    /// # Ok::<(), vedis::Error>(())
    /// ```
    pub fn store(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.statement(|store| store.kv_set(key, value))
    }

    /// Stores the byte form of a typed value (integers as decimal text).
    pub fn store_value(&self, key: &[u8], value: impl Into<Value>) -> Result<()> {
        let bytes = value.into().to_bytes()?;
        self.store(key, &bytes)
    }

    /// Retrieves the value stored under `key`.
    ///
    /// Returns [`Error::NotFound`] if the key does not exist; use
    /// [`Error::is_not_found`] to fall back to a default.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use vedis::Database;
    ///
    /// let db = Database::in_memory()?;
    /// db.store(b"key", b"value")?;
    /// assert_eq!(db.fetch(b"key")?, b"value".to_vec());
    /// assert!(db.fetch(b"missing").unwrap_err().is_not_found());
    /// # Ok::<(), vedis::Error>(())
    /// ```
    pub fn fetch(&self, key: &[u8]) -> Result<Vec<u8>> {
        self.statement(|store| store.kv_get(key))?
            .ok_or(Error::NotFound)
    }

    /// Appends `value` to the value under `key`, creating it if missing.
    pub fn append(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.statement(|store| store.kv_append(key, value).map(|_| ()))
    }

    /// Deletes `key`; [`Error::NotFound`] if it does not exist.
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        if self.statement(|store| store.kv_delete(key))? {
            Ok(())
        } else {
            Err(Error::NotFound)
        }
    }

    /// True if `key` holds a plain value. Hash, set and list names do not
    /// count.
    pub fn exists(&self, key: &[u8]) -> Result<bool> {
        self.shared
            .with(|handle| Store::new(&mut handle.engine).kv_exists(key))
    }

    /// Cursor over every plain key/value pair in key order
    pub fn cursor(&self) -> Result<Cursor> {
        self.cursor_prefix(b"")
    }

    /// Cursor over the plain keys that start with `prefix`
    pub fn cursor_prefix(&self, prefix: &[u8]) -> Result<Cursor> {
        let prefix = store::kv_prefix(prefix);
        self.shared
            .with(|handle| handle.engine.next_key(&prefix, None).map(|_| ()))?;
        Ok(Cursor::new(
            Arc::clone(&self.shared),
            prefix,
            store::KV_TAG_LEN,
        ))
    }

    /// Cursor over the field/value pairs of hash `name`.
    ///
    /// [`Error::TypeError`] if `name` is a set or list.
    pub fn hash_cursor(&self, name: &[u8]) -> Result<Cursor> {
        self.shared.with(|handle| {
            match Store::new(&mut handle.engine).table_kind(name)? {
                Some(kind) if kind != TableKind::Hash => Err(Error::TypeError(format!(
                    "{:?} is a {}, not a hash",
                    String::from_utf8_lossy(name),
                    kind.name()
                ))),
                _ => Ok(()),
            }
        })?;
        let prefix = store::hash_prefix(name);
        let strip = prefix.len();
        Ok(Cursor::new(Arc::clone(&self.shared), prefix, strip))
    }

    /// Names of every hash, set and list
    pub fn tables(&self) -> Result<Vec<Vec<u8>>> {
        self.shared
            .with(|handle| Store::new(&mut handle.engine).table_names())
    }

    // ---- transactions ----

    /// Opens an explicit transaction.
    ///
    /// [`Error::AlreadyOpen`] if one is already open.
    pub fn begin(&self) -> Result<()> {
        self.shared.with(|handle| handle.engine.begin())
    }

    /// Commits the open transaction.
    ///
    /// [`Error::NoActiveTransaction`] if none is open. A failed commit is
    /// rolled back before the error is returned.
    pub fn commit(&self) -> Result<()> {
        self.shared.with(|handle| handle.engine.commit())
    }

    /// Rolls back the open transaction; a no-op if none is open.
    pub fn rollback(&self) -> Result<()> {
        self.shared.with(|handle| handle.engine.rollback())
    }

    /// Runs `f` inside a transaction: committed if `f` succeeds, rolled back
    /// if it fails.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use vedis::{Database, Error};
    ///
    /// let db = Database::in_memory()?;
    /// let result: Result<(), Error> = db.transaction(|db| {
    ///     db.store(b"k1", b"v1")?;
    ///     Err(Error::InvalidArgument("changed my mind".into()))
    /// });
    /// assert!(result.is_err());
    /// assert!(!db.exists(b"k1")?);
    /// # Ok::<(), vedis::Error>(())
    /// ```
    pub fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Database) -> Result<T>,
    {
        self.begin()?;
        match f(self) {
            Ok(value) => {
                self.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = self.rollback() {
                    warn!(error = %rollback, "Rollback after failed transaction body failed");
                }
                Err(e)
            }
        }
    }

    pub fn in_transaction(&self) -> Result<bool> {
        self.shared.with(|handle| Ok(handle.engine.in_transaction()))
    }

    pub fn transaction_state(&self) -> Result<TransactionState> {
        self.shared
            .with(|handle| Ok(handle.engine.transaction_state().clone()))
    }

    // ---- commands ----

    /// Registers a command, replacing any command (built-in or not) with the
    /// same name.
    ///
    /// The handler runs while the database lock is held. It must reach the
    /// store through its [`CommandContext`] (`get`, `set`, `store()`,
    /// `begin`, ...), not through a captured `Database` clone: the lock is not
    /// reentrant, so such calls fail with [`Error::Busy`].
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use vedis::{CommandContext, Database, Value};
    ///
    /// let db = Database::in_memory()?;
    /// db.register("DOUBLE", |ctx: &mut CommandContext<'_>, args: &[Value]| {
    ///     let n = args.first().map(Value::to_int).transpose()?.unwrap_or(0);
    ///     ctx.set_result(n * 2);
    ///     Ok(())
    /// })?;
    /// assert_eq!(db.exec("DOUBLE 21")?, Value::Integer(42));
    /// # Ok::<(), vedis::Error>(())
    /// ```
    pub fn register<F>(&self, name: &str, handler: F) -> Result<()>
    where
        F: Fn(&mut CommandContext<'_>, &[Value]) -> Result<()> + Send + Sync + 'static,
    {
        self.register_handler(name, handler)
    }

    /// Registers a command with data the handler reads back through
    /// [`CommandContext::user_data`].
    pub fn register_with_data<F, D>(&self, name: &str, handler: F, data: D) -> Result<()>
    where
        F: Fn(&mut CommandContext<'_>, &[Value]) -> Result<()> + Send + Sync + 'static,
        D: Any + Send + Sync,
    {
        self.shared.with(|handle| {
            handle
                .registry
                .register(name, Arc::new(handler), Some(Arc::new(data)))
        })
    }

    /// Registers any [`CommandHandler`] implementation. The same rule as
    /// [`Database::register`] applies: use the [`CommandContext`], never a
    /// `Database` clone, from inside the handler.
    pub fn register_handler<H>(&self, name: &str, handler: H) -> Result<()>
    where
        H: CommandHandler + 'static,
    {
        self.shared
            .with(|handle| handle.registry.register(name, Arc::new(handler), None))
    }

    /// Removes a command; [`Error::NotFound`] if it is not registered.
    pub fn delete_command(&self, name: &str) -> Result<()> {
        self.shared.with(|handle| handle.registry.unregister(name))
    }

    /// Registered command names in sorted order
    pub fn commands(&self) -> Result<Vec<String>> {
        self.shared.with(|handle| Ok(handle.registry.names()))
    }

    /// Runs raw command text and returns its result.
    pub fn exec(&self, command: impl AsRef<[u8]>) -> Result<Value> {
        let line = CommandLine::parse(command.as_ref())?;
        self.shared.with(|handle| handle.dispatch(line))
    }

    /// Runs a command built from `template`, discarding its result.
    ///
    /// Each `%s` is replaced by the next argument, quoted; arguments left
    /// over are appended.
    pub fn execute<A: AsRef<[u8]>>(&self, template: &str, args: &[A]) -> Result<()> {
        self.execute_returning(template, args).map(|_| ())
    }

    /// Runs a command built from `template` and returns its result.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use vedis::{Database, Value};
    ///
    /// let db = Database::in_memory()?;
    /// db.execute("SET %s %s", &["name", "value \"with quotes\""])?;
    /// let value = db.execute_returning("GET %s", &["name"])?;
    /// assert_eq!(value, Value::from("value \"with quotes\""));
    /// # Ok::<(), vedis::Error>(())
    /// ```
    pub fn execute_returning<A: AsRef<[u8]>>(&self, template: &str, args: &[A]) -> Result<Value> {
        let command = format_command(template, args)?;
        self.exec(command)
    }

    /// Runs a command whose result is an array and iterates the elements.
    ///
    /// [`Error::TypeError`] if the result is not an array.
    pub fn execute_iterating<A: AsRef<[u8]>>(
        &self,
        template: &str,
        args: &[A],
    ) -> Result<ValueIter> {
        match self.execute_returning(template, args)? {
            Value::Array(items) => Ok(ValueIter::new(Arc::clone(&self.shared), items)),
            other => Err(Error::TypeError(format!(
                "expected an array result, got {}",
                other.type_name()
            ))),
        }
    }

    // ---- utilities ----

    /// `len` random lower-case ASCII letters
    pub fn random_string(&self, len: usize) -> Result<Vec<u8>> {
        self.shared.with(|_| Ok(builtins::random_string(len)))
    }

    pub fn random_number(&self) -> Result<u32> {
        self.shared.with(|_| Ok(rand::random::<u32>()))
    }

    /// Page and key counts of the underlying store
    pub fn stats(&self) -> Result<StorageStats> {
        self.shared.with(|handle| handle.engine.stats())
    }

    pub fn is_memory(&self) -> Result<bool> {
        self.shared.with(|handle| Ok(handle.engine.is_memory()))
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("target", &self.shared.target)
            .field("open", &self.is_open())
            .finish()
    }
}
