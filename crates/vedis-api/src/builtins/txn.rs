//! `BEGIN`, `COMMIT` and `ROLLBACK`.
//!
//! `BEGIN` inside a statement that already wrote takes over that statement's
//! implicit transaction, so its writes are committed or rolled back together
//! with the rest.

use super::arity;
use crate::context::CommandContext;
use crate::registry::Registry;
use vedis_core::{Result, Value};

pub(super) fn register(registry: &mut Registry) {
    registry.register_fn("BEGIN", |ctx: &mut CommandContext<'_>, args: &[Value]| {
        arity(args, 0, Some(0))?;
        ctx.begin()?;
        ctx.set_result(true);
        Ok(())
    });
    registry.register_fn("COMMIT", |ctx: &mut CommandContext<'_>, args: &[Value]| {
        arity(args, 0, Some(0))?;
        ctx.commit()?;
        ctx.set_result(true);
        Ok(())
    });
    registry.register_fn("ROLLBACK", |ctx: &mut CommandContext<'_>, args: &[Value]| {
        arity(args, 0, Some(0))?;
        ctx.rollback()?;
        ctx.set_result(true);
        Ok(())
    });
}
