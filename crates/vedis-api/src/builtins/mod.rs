//! Built-in commands.
//!
//! Built-ins are ordinary registry entries; a user command registered under
//! the same name replaces them.

mod hash;
mod kv;
mod list;
mod misc;
mod set;
mod txn;

use crate::registry::Registry;

pub(crate) use misc::random_string;
use vedis_core::{Error, Result, Value};

pub(crate) fn register_all(registry: &mut Registry) {
    kv::register(registry);
    hash::register(registry);
    set::register(registry);
    list::register(registry);
    misc::register(registry);
    txn::register(registry);
}

/// Check the argument count is within `min..=max` (`max` of `None` is
/// unbounded)
fn arity(args: &[Value], min: usize, max: Option<usize>) -> Result<()> {
    let count = args.len();
    if count < min || max.is_some_and(|max| count > max) {
        let expected = match max {
            Some(max) if max == min => format!("{}", min),
            Some(max) => format!("{} to {}", min, max),
            None => format!("at least {}", min),
        };
        return Err(Error::InvalidArgument(format!(
            "expected {} arguments, got {}",
            expected, count
        )));
    }
    Ok(())
}

/// Byte form of argument `index`
fn bytes(args: &[Value], index: usize) -> Result<Vec<u8>> {
    args.get(index)
        .ok_or_else(|| Error::InvalidArgument(format!("missing argument {}", index + 1)))?
        .to_bytes()
}

fn int(args: &[Value], index: usize) -> Result<i64> {
    args.get(index)
        .ok_or_else(|| Error::InvalidArgument(format!("missing argument {}", index + 1)))?
        .to_int()
}

/// Arguments joined back into one space-separated string
fn joined(args: &[Value]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            out.push(b' ');
        }
        out.extend_from_slice(&arg.to_bytes()?);
    }
    Ok(out)
}

fn strings(items: Vec<Vec<u8>>) -> Value {
    Value::Array(items.into_iter().map(Value::String).collect())
}

fn pairs(args: &[Value]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
    if args.len() % 2 != 0 {
        return Err(Error::InvalidArgument(
            "expected key/value pairs".to_string(),
        ));
    }
    args.chunks(2)
        .map(|pair| Ok((pair[0].to_bytes()?, pair[1].to_bytes()?)))
        .collect()
}
