//! List commands. Lists grow at the tail and shrink at the head.

use super::{arity, bytes, int};
use crate::context::CommandContext;
use crate::registry::Registry;
use vedis_core::{Result, Value};

pub(super) fn register(registry: &mut Registry) {
    registry.register_fn("LPUSH", |ctx: &mut CommandContext<'_>, args: &[Value]| {
        push(ctx, args, false)
    });
    registry.register_fn("LPUSHX", |ctx: &mut CommandContext<'_>, args: &[Value]| {
        push(ctx, args, true)
    });
    registry.register_fn("LPOP", lpop);
    registry.register_fn("LINDEX", lindex);
    registry.register_fn("LLEN", llen);
}

fn push(ctx: &mut CommandContext<'_>, args: &[Value], only_existing: bool) -> Result<()> {
    arity(args, 2, None)?;
    let name = bytes(args, 0)?;
    let mut store = ctx.store();
    if only_existing && store.llen(&name)? == 0 {
        ctx.set_result(0i64);
        return Ok(());
    }

    let mut len = 0;
    for i in 1..args.len() {
        len = store.lpush(&name, &bytes(args, i)?)?;
    }
    ctx.set_result(len as i64);
    Ok(())
}

fn lpop(ctx: &mut CommandContext<'_>, args: &[Value]) -> Result<()> {
    arity(args, 1, Some(1))?;
    let value = ctx.store().lpop(&bytes(args, 0)?)?;
    ctx.set_result(value);
    Ok(())
}

fn lindex(ctx: &mut CommandContext<'_>, args: &[Value]) -> Result<()> {
    arity(args, 2, Some(2))?;
    let value = ctx.store().lindex(&bytes(args, 0)?, int(args, 1)?)?;
    ctx.set_result(value);
    Ok(())
}

fn llen(ctx: &mut CommandContext<'_>, args: &[Value]) -> Result<()> {
    arity(args, 1, Some(1))?;
    let len = ctx.store().llen(&bytes(args, 0)?)?;
    ctx.set_result(len as i64);
    Ok(())
}
