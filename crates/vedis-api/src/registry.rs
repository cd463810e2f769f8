//! Named command handlers.

use crate::context::CommandContext;
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;
use vedis_core::{normalize_name, Error, Result, Value};

/// Implementation behind a command name.
///
/// Any `Fn(&mut CommandContext, &[Value]) -> Result<()>` that is
/// `Send + Sync` is a handler.
pub trait CommandHandler: Send + Sync {
    fn call(&self, ctx: &mut CommandContext<'_>, args: &[Value]) -> Result<()>;
}

impl<F> CommandHandler for F
where
    F: Fn(&mut CommandContext<'_>, &[Value]) -> Result<()> + Send + Sync,
{
    fn call(&self, ctx: &mut CommandContext<'_>, args: &[Value]) -> Result<()> {
        self(ctx, args)
    }
}

/// Opaque data attached to a command at registration time
pub type UserData = Arc<dyn Any + Send + Sync>;

/// One registered command
#[derive(Clone)]
pub struct CommandEntry {
    handler: Arc<dyn CommandHandler>,
    user_data: Option<UserData>,
}

impl CommandEntry {
    pub fn handler(&self) -> &dyn CommandHandler {
        self.handler.as_ref()
    }

    pub fn user_data(&self) -> Option<&(dyn Any + Send + Sync)> {
        self.user_data.as_deref()
    }
}

/// Command name -> handler table. Names are case-insensitive.
#[derive(Default)]
pub struct Registry {
    commands: BTreeMap<String, CommandEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-loaded with every built-in command
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::builtins::register_all(&mut registry);
        registry
    }

    /// Install `handler` under `name`, replacing any previous entry
    pub fn register(
        &mut self,
        name: &str,
        handler: Arc<dyn CommandHandler>,
        user_data: Option<UserData>,
    ) -> Result<()> {
        if name.is_empty() || name.bytes().any(|b| b.is_ascii_whitespace() || b == b'"') {
            return Err(Error::InvalidArgument(format!(
                "invalid command name {:?}",
                name
            )));
        }

        let name = normalize_name(name);
        let entry = CommandEntry { handler, user_data };
        if self.commands.insert(name.clone(), entry).is_some() {
            debug!(command = %name, "Command handler replaced");
        } else {
            debug!(command = %name, "Command registered");
        }
        Ok(())
    }

    pub(crate) fn register_fn<F>(&mut self, name: &str, handler: F)
    where
        F: Fn(&mut CommandContext<'_>, &[Value]) -> Result<()> + Send + Sync + 'static,
    {
        let name = normalize_name(name);
        self.commands.insert(
            name,
            CommandEntry {
                handler: Arc::new(handler),
                user_data: None,
            },
        );
    }

    /// Remove `name`; `NotFound` if it was never registered
    pub fn unregister(&mut self, name: &str) -> Result<()> {
        let name = normalize_name(name);
        match self.commands.remove(&name) {
            Some(_) => {
                debug!(command = %name, "Command removed");
                Ok(())
            }
            None => Err(Error::NotFound),
        }
    }

    pub fn get(&self, name: &str) -> Option<&CommandEntry> {
        self.commands.get(&normalize_name(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(&normalize_name(name))
    }

    /// Registered names in sorted order
    pub fn names(&self) -> Vec<String> {
        self.commands.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
