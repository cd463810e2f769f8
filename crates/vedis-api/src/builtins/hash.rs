//! Hash commands.

use super::{arity, bytes, pairs, strings};
use crate::context::CommandContext;
use crate::registry::Registry;
use vedis_core::{Result, Value};

pub(super) fn register(registry: &mut Registry) {
    registry.register_fn("HSET", hset);
    registry.register_fn("HGET", hget);
    registry.register_fn("HDEL", hdel);
    registry.register_fn("HKEYS", hkeys);
    registry.register_fn("HVALS", hvals);
    registry.register_fn("HGETALL", hgetall);
    registry.register_fn("HLEN", hlen);
    registry.register_fn("HEXISTS", hexists);
    registry.register_fn("HMSET", hmset);
    registry.register_fn("HMGET", hmget);
    registry.register_fn("HSETNX", hsetnx);
}

fn hset(ctx: &mut CommandContext<'_>, args: &[Value]) -> Result<()> {
    arity(args, 3, Some(3))?;
    ctx.store()
        .hset(&bytes(args, 0)?, &bytes(args, 1)?, &bytes(args, 2)?)?;
    ctx.set_result(true);
    Ok(())
}

fn hget(ctx: &mut CommandContext<'_>, args: &[Value]) -> Result<()> {
    arity(args, 2, Some(2))?;
    let value = ctx.store().hget(&bytes(args, 0)?, &bytes(args, 1)?)?;
    ctx.set_result(value);
    Ok(())
}

fn hdel(ctx: &mut CommandContext<'_>, args: &[Value]) -> Result<()> {
    arity(args, 2, None)?;
    let name = bytes(args, 0)?;
    let mut removed = 0i64;
    for i in 1..args.len() {
        if ctx.store().hdel(&name, &bytes(args, i)?)? {
            removed += 1;
        }
    }
    ctx.set_result(removed);
    Ok(())
}

fn hkeys(ctx: &mut CommandContext<'_>, args: &[Value]) -> Result<()> {
    arity(args, 1, Some(1))?;
    let keys = ctx.store().hkeys(&bytes(args, 0)?)?;
    ctx.set_result(keys.map(strings));
    Ok(())
}

fn hvals(ctx: &mut CommandContext<'_>, args: &[Value]) -> Result<()> {
    arity(args, 1, Some(1))?;
    let values = ctx.store().hvals(&bytes(args, 0)?)?;
    ctx.set_result(values.map(strings));
    Ok(())
}

fn hgetall(ctx: &mut CommandContext<'_>, args: &[Value]) -> Result<()> {
    arity(args, 1, Some(1))?;
    let entries = ctx.store().hgetall(&bytes(args, 0)?)?.unwrap_or_default();
    let mut flat = Vec::with_capacity(entries.len() * 2);
    for (field, value) in entries {
        flat.push(Value::String(field));
        flat.push(Value::String(value));
    }
    ctx.set_result(flat);
    Ok(())
}

fn hlen(ctx: &mut CommandContext<'_>, args: &[Value]) -> Result<()> {
    arity(args, 1, Some(1))?;
    let len = ctx.store().hlen(&bytes(args, 0)?)?;
    ctx.set_result(len as i64);
    Ok(())
}

fn hexists(ctx: &mut CommandContext<'_>, args: &[Value]) -> Result<()> {
    arity(args, 2, Some(2))?;
    let found = ctx.store().hexists(&bytes(args, 0)?, &bytes(args, 1)?)?;
    ctx.set_result(found);
    Ok(())
}

fn hmset(ctx: &mut CommandContext<'_>, args: &[Value]) -> Result<()> {
    arity(args, 3, None)?;
    let name = bytes(args, 0)?;
    let mut store = ctx.store();
    for (field, value) in pairs(&args[1..])? {
        store.hset(&name, &field, &value)?;
    }
    ctx.set_result(true);
    Ok(())
}

fn hmget(ctx: &mut CommandContext<'_>, args: &[Value]) -> Result<()> {
    arity(args, 2, None)?;
    let name = bytes(args, 0)?;
    if ctx.store().hlen(&name)? == 0 {
        ctx.set_result(Value::Null);
        return Ok(());
    }

    let mut values = Vec::with_capacity(args.len() - 1);
    for i in 1..args.len() {
        values.push(Value::from(ctx.store().hget(&name, &bytes(args, i)?)?));
    }
    ctx.set_result(values);
    Ok(())
}

fn hsetnx(ctx: &mut CommandContext<'_>, args: &[Value]) -> Result<()> {
    arity(args, 3, Some(3))?;
    let (name, field) = (bytes(args, 0)?, bytes(args, 1)?);
    let mut store = ctx.store();
    let absent = !store.hexists(&name, &field)?;
    if absent {
        store.hset(&name, &field, &bytes(args, 2)?)?;
    }
    ctx.set_result(absent);
    Ok(())
}
