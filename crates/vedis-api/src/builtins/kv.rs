//! Plain key/value commands.

use super::{arity, bytes, int, pairs};
use crate::context::CommandContext;
use crate::registry::Registry;
use vedis_core::{Error, Result, Value};

pub(super) fn register(registry: &mut Registry) {
    registry.register_fn("STORE", store);
    registry.register_fn("SET", store);
    registry.register_fn("FETCH", fetch);
    registry.register_fn("GET", fetch);
    registry.register_fn("APPEND", append);
    registry.register_fn("DELETE", delete);
    registry.register_fn("DEL", delete);
    registry.register_fn("EXISTS", exists);
    registry.register_fn("STRLEN", strlen);
    registry.register_fn("COPY", copy);
    registry.register_fn("MOVE", move_key);
    registry.register_fn("INCR", |ctx: &mut CommandContext<'_>, args: &[Value]| {
        arity(args, 1, Some(1))?;
        add(ctx, &bytes(args, 0)?, 1)
    });
    registry.register_fn("DECR", |ctx: &mut CommandContext<'_>, args: &[Value]| {
        arity(args, 1, Some(1))?;
        add(ctx, &bytes(args, 0)?, -1)
    });
    registry.register_fn("INCRBY", |ctx: &mut CommandContext<'_>, args: &[Value]| {
        arity(args, 2, Some(2))?;
        add(ctx, &bytes(args, 0)?, int(args, 1)?)
    });
    registry.register_fn("DECRBY", |ctx: &mut CommandContext<'_>, args: &[Value]| {
        arity(args, 2, Some(2))?;
        let by = int(args, 1)?
            .checked_neg()
            .ok_or_else(|| Error::InvalidArgument("decrement out of range".to_string()))?;
        add(ctx, &bytes(args, 0)?, by)
    });
    registry.register_fn("GETSET", getset);
    registry.register_fn("SETNX", setnx);
    registry.register_fn("MSET", mset);
    registry.register_fn("MSETNX", msetnx);
    registry.register_fn("MGET", mget);
}

fn store(ctx: &mut CommandContext<'_>, args: &[Value]) -> Result<()> {
    arity(args, 2, Some(2))?;
    ctx.set(&bytes(args, 0)?, &bytes(args, 1)?)?;
    ctx.set_result(true);
    Ok(())
}

fn fetch(ctx: &mut CommandContext<'_>, args: &[Value]) -> Result<()> {
    arity(args, 1, Some(1))?;
    let value = ctx.get(&bytes(args, 0)?)?;
    ctx.set_result(value);
    Ok(())
}

fn append(ctx: &mut CommandContext<'_>, args: &[Value]) -> Result<()> {
    arity(args, 2, Some(2))?;
    let len = ctx.append(&bytes(args, 0)?, &bytes(args, 1)?)?;
    ctx.set_result(len);
    Ok(())
}

fn delete(ctx: &mut CommandContext<'_>, args: &[Value]) -> Result<()> {
    arity(args, 1, None)?;
    let mut removed = 0i64;
    for i in 0..args.len() {
        if ctx.delete(&bytes(args, i)?)? {
            removed += 1;
        }
    }
    ctx.set_result(removed);
    Ok(())
}

fn exists(ctx: &mut CommandContext<'_>, args: &[Value]) -> Result<()> {
    arity(args, 1, Some(1))?;
    let found = ctx.exists(&bytes(args, 0)?)?;
    ctx.set_result(found);
    Ok(())
}

fn strlen(ctx: &mut CommandContext<'_>, args: &[Value]) -> Result<()> {
    arity(args, 1, Some(1))?;
    let len = ctx.get(&bytes(args, 0)?)?.map_or(0, |v| v.len());
    ctx.set_result(len);
    Ok(())
}

fn copy(ctx: &mut CommandContext<'_>, args: &[Value]) -> Result<()> {
    arity(args, 2, Some(2))?;
    let copied = match ctx.get(&bytes(args, 0)?)? {
        Some(value) => {
            ctx.set(&bytes(args, 1)?, &value)?;
            true
        }
        None => false,
    };
    ctx.set_result(copied);
    Ok(())
}

fn move_key(ctx: &mut CommandContext<'_>, args: &[Value]) -> Result<()> {
    arity(args, 2, Some(2))?;
    let (src, dst) = (bytes(args, 0)?, bytes(args, 1)?);
    let moved = match ctx.get(&src)? {
        Some(value) => {
            ctx.set(&dst, &value)?;
            if src != dst {
                ctx.delete(&src)?;
            }
            true
        }
        None => false,
    };
    ctx.set_result(moved);
    Ok(())
}

/// Add `by` to the integer stored at `key` (missing counts as 0)
fn add(ctx: &mut CommandContext<'_>, key: &[u8], by: i64) -> Result<()> {
    let current = match ctx.get(key)? {
        Some(raw) => Value::String(raw).to_int()?,
        None => 0,
    };
    let next = current
        .checked_add(by)
        .ok_or_else(|| Error::InvalidArgument("increment overflows".to_string()))?;
    ctx.set(key, next.to_string().as_bytes())?;
    ctx.set_result(next);
    Ok(())
}

fn getset(ctx: &mut CommandContext<'_>, args: &[Value]) -> Result<()> {
    arity(args, 2, Some(2))?;
    let key = bytes(args, 0)?;
    let previous = ctx.get(&key)?;
    ctx.set(&key, &bytes(args, 1)?)?;
    ctx.set_result(previous);
    Ok(())
}

fn setnx(ctx: &mut CommandContext<'_>, args: &[Value]) -> Result<()> {
    arity(args, 2, Some(2))?;
    let key = bytes(args, 0)?;
    let absent = !ctx.exists(&key)?;
    if absent {
        ctx.set(&key, &bytes(args, 1)?)?;
    }
    ctx.set_result(absent);
    Ok(())
}

fn mset(ctx: &mut CommandContext<'_>, args: &[Value]) -> Result<()> {
    arity(args, 2, None)?;
    for (key, value) in pairs(args)? {
        ctx.set(&key, &value)?;
    }
    ctx.set_result(true);
    Ok(())
}

fn msetnx(ctx: &mut CommandContext<'_>, args: &[Value]) -> Result<()> {
    arity(args, 2, None)?;
    let mut stored = 0i64;
    for (key, value) in pairs(args)? {
        if !ctx.exists(&key)? {
            ctx.set(&key, &value)?;
            stored += 1;
        }
    }
    ctx.set_result(stored);
    Ok(())
}

fn mget(ctx: &mut CommandContext<'_>, args: &[Value]) -> Result<()> {
    arity(args, 1, None)?;
    let mut values = Vec::with_capacity(args.len());
    for i in 0..args.len() {
        values.push(Value::from(ctx.get(&bytes(args, i)?)?));
    }
    ctx.set_result(values);
    Ok(())
}
