//! Set commands.
//!
//! Sets remember insertion order: `SPEEK`/`SPOP` work on the newest member
//! and `STOP` reads the oldest.

use super::{arity, bytes, strings};
use crate::context::CommandContext;
use crate::registry::Registry;
use vedis_core::{Result, Value};

pub(super) fn register(registry: &mut Registry) {
    registry.register_fn("SADD", sadd);
    registry.register_fn("SCARD", scard);
    registry.register_fn("SLEN", scard);
    registry.register_fn("SISMEMBER", sismember);
    registry.register_fn("SPOP", spop);
    registry.register_fn("SPEEK", speek);
    registry.register_fn("STOP", stop);
    registry.register_fn("SREM", srem);
    registry.register_fn("SMEMBERS", smembers);
    registry.register_fn("SDIFF", sdiff);
    registry.register_fn("SINTER", sinter);
}

/// Result counts every member argument, repeated ones included
fn sadd(ctx: &mut CommandContext<'_>, args: &[Value]) -> Result<()> {
    arity(args, 2, None)?;
    let name = bytes(args, 0)?;
    for i in 1..args.len() {
        ctx.store().sadd(&name, &bytes(args, i)?)?;
    }
    ctx.set_result((args.len() - 1) as i64);
    Ok(())
}

fn scard(ctx: &mut CommandContext<'_>, args: &[Value]) -> Result<()> {
    arity(args, 1, Some(1))?;
    let len = ctx.store().scard(&bytes(args, 0)?)?;
    ctx.set_result(len as i64);
    Ok(())
}

fn sismember(ctx: &mut CommandContext<'_>, args: &[Value]) -> Result<()> {
    arity(args, 2, Some(2))?;
    let found = ctx.store().sismember(&bytes(args, 0)?, &bytes(args, 1)?)?;
    ctx.set_result(found);
    Ok(())
}

fn spop(ctx: &mut CommandContext<'_>, args: &[Value]) -> Result<()> {
    arity(args, 1, Some(1))?;
    let member = ctx.store().spop(&bytes(args, 0)?)?;
    ctx.set_result(member);
    Ok(())
}

fn speek(ctx: &mut CommandContext<'_>, args: &[Value]) -> Result<()> {
    arity(args, 1, Some(1))?;
    let member = ctx.store().speek(&bytes(args, 0)?)?;
    ctx.set_result(member);
    Ok(())
}

fn stop(ctx: &mut CommandContext<'_>, args: &[Value]) -> Result<()> {
    arity(args, 1, Some(1))?;
    let member = ctx.store().stop(&bytes(args, 0)?)?;
    ctx.set_result(member);
    Ok(())
}

/// Result counts only members that were present
fn srem(ctx: &mut CommandContext<'_>, args: &[Value]) -> Result<()> {
    arity(args, 2, None)?;
    let name = bytes(args, 0)?;
    let mut removed = 0i64;
    for i in 1..args.len() {
        if ctx.store().srem(&name, &bytes(args, i)?)? {
            removed += 1;
        }
    }
    ctx.set_result(removed);
    Ok(())
}

fn smembers(ctx: &mut CommandContext<'_>, args: &[Value]) -> Result<()> {
    arity(args, 1, Some(1))?;
    let members = ctx.store().smembers(&bytes(args, 0)?)?;
    ctx.set_result(strings(members));
    Ok(())
}

/// Members of the first set found in none of the others
fn sdiff(ctx: &mut CommandContext<'_>, args: &[Value]) -> Result<()> {
    arity(args, 1, None)?;
    let mut store = ctx.store();
    let mut members = store.smembers(&bytes(args, 0)?)?;
    for i in 1..args.len() {
        let other = bytes(args, i)?;
        let mut kept = Vec::with_capacity(members.len());
        for member in members {
            if !store.sismember(&other, &member)? {
                kept.push(member);
            }
        }
        members = kept;
    }
    ctx.set_result(strings(members));
    Ok(())
}

/// Members of the first set found in every other
fn sinter(ctx: &mut CommandContext<'_>, args: &[Value]) -> Result<()> {
    arity(args, 1, None)?;
    let mut store = ctx.store();
    let mut members = store.smembers(&bytes(args, 0)?)?;
    for i in 1..args.len() {
        let other = bytes(args, i)?;
        let mut kept = Vec::with_capacity(members.len());
        for member in members {
            if store.sismember(&other, &member)? {
                kept.push(member);
            }
        }
        members = kept;
    }
    ctx.set_result(strings(members));
    Ok(())
}
