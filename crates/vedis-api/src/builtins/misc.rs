//! Utility commands: random values, clock, encoding and string helpers.

use super::{arity, bytes, int, joined, strings};
use crate::context::CommandContext;
use crate::registry::Registry;
use base64::{engine::general_purpose, Engine as _};
use rand::Rng;
use vedis_core::{Error, Result, Value};

const DEFAULT_RANDSTR_LEN: i64 = 16;
const MAX_RANDSTR_LEN: i64 = 1 << 20;

pub(super) fn register(registry: &mut Registry) {
    registry.register_fn("RAND", rand_int);
    registry.register_fn("RANDSTR", rand_str);
    registry.register_fn("TIME", |ctx: &mut CommandContext<'_>, args: &[Value]| {
        arity(args, 0, Some(0))?;
        ctx.set_result(chrono::Local::now().format("%H:%M:%S").to_string());
        Ok(())
    });
    registry.register_fn("DATE", |ctx: &mut CommandContext<'_>, args: &[Value]| {
        arity(args, 0, Some(0))?;
        ctx.set_result(chrono::Local::now().format("%Y-%m-%d").to_string());
        Ok(())
    });
    registry.register_fn("TABLE_LIST", |ctx: &mut CommandContext<'_>, args: &[Value]| {
        arity(args, 0, Some(0))?;
        let names = ctx.store().table_names()?;
        ctx.set_result(strings(names));
        Ok(())
    });
    registry.register_fn("OS", |ctx: &mut CommandContext<'_>, args: &[Value]| {
        arity(args, 0, Some(0))?;
        ctx.set_result(format!(
            "{} {}",
            std::env::consts::OS,
            std::env::consts::ARCH
        ));
        Ok(())
    });
    registry.register_fn("VEDIS", |ctx: &mut CommandContext<'_>, args: &[Value]| {
        arity(args, 0, Some(0))?;
        ctx.set_result(crate::VERSION);
        Ok(())
    });
    registry.register_fn("BASE64", |ctx: &mut CommandContext<'_>, args: &[Value]| {
        arity(args, 1, None)?;
        ctx.set_result(general_purpose::STANDARD.encode(joined(args)?));
        Ok(())
    });
    registry.register_fn("BASE64_DEC", |ctx: &mut CommandContext<'_>, args: &[Value]| {
        arity(args, 1, None)?;
        let decoded = general_purpose::STANDARD
            .decode(joined(args)?)
            .map_err(|e| Error::handler(format!("invalid base64 input: {}", e)))?;
        ctx.set_result(decoded);
        Ok(())
    });
    registry.register_fn("SIZE_FMT", |ctx: &mut CommandContext<'_>, args: &[Value]| {
        arity(args, 1, Some(1))?;
        ctx.set_result(size_format(int(args, 0)?));
        Ok(())
    });
    registry.register_fn("STR_SPLIT", str_split);
    registry.register_fn("STRIP_TAG", |ctx: &mut CommandContext<'_>, args: &[Value]| {
        arity(args, 1, None)?;
        ctx.set_result(strip_tags(&joined(args)?));
        Ok(())
    });
    registry.register_fn("SOUNDEX", |ctx: &mut CommandContext<'_>, args: &[Value]| {
        arity(args, 1, Some(1))?;
        ctx.set_result(soundex(&bytes(args, 0)?));
        Ok(())
    });
    registry.register_fn("GETCSV", |ctx: &mut CommandContext<'_>, args: &[Value]| {
        arity(args, 1, None)?;
        let fields = parse_csv_record(&joined(args)?)?;
        ctx.set_result(strings(fields));
        Ok(())
    });
}

/// `RAND` for a random non-negative integer, `RAND min` or `RAND min max`
/// for one in an inclusive range
fn rand_int(ctx: &mut CommandContext<'_>, args: &[Value]) -> Result<()> {
    arity(args, 0, Some(2))?;
    let mut rng = rand::thread_rng();
    let value = match args.len() {
        0 => i64::from(rng.gen::<u32>()),
        _ => {
            let min = int(args, 0)?;
            let max = if args.len() == 2 {
                int(args, 1)?
            } else {
                i64::from(u32::MAX).max(min)
            };
            let (low, high) = if min <= max { (min, max) } else { (max, min) };
            rng.gen_range(low..=high)
        }
    };
    ctx.set_result(value);
    Ok(())
}

fn rand_str(ctx: &mut CommandContext<'_>, args: &[Value]) -> Result<()> {
    arity(args, 0, Some(1))?;
    let len = if args.is_empty() {
        DEFAULT_RANDSTR_LEN
    } else {
        int(args, 0)?
    };
    if !(0..=MAX_RANDSTR_LEN).contains(&len) {
        return Err(Error::InvalidArgument(format!(
            "random string length {} out of range",
            len
        )));
    }
    ctx.set_result(random_string(len as usize));
    Ok(())
}

/// Lower-case ASCII letters
pub(crate) fn random_string(len: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..len).map(|_| rng.gen_range(b'a'..=b'z')).collect()
}

fn str_split(ctx: &mut CommandContext<'_>, args: &[Value]) -> Result<()> {
    arity(args, 1, Some(2))?;
    let input = bytes(args, 0)?;
    let width = if args.len() == 2 { int(args, 1)? } else { 1 };
    if width < 1 {
        return Err(Error::InvalidArgument(format!(
            "split width must be positive, got {}",
            width
        )));
    }
    let chunks = input
        .chunks(width as usize)
        .map(<[u8]>::to_vec)
        .collect();
    ctx.set_result(strings(chunks));
    Ok(())
}

/// Human-readable byte count in 1024 steps, truncated to one decimal
fn size_format(bytes: i64) -> String {
    const UNITS: [&str; 5] = ["KB", "MB", "GB", "TB", "PB"];

    if bytes.unsigned_abs() < 1024 {
        return format!("{} B", bytes);
    }
    let mut size = bytes as f64 / 1024.0;
    let mut unit = 0;
    while size.abs() >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", (size * 10.0).trunc() / 10.0, UNITS[unit])
}

fn strip_tags(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut in_tag = false;
    for &byte in input {
        match byte {
            b'<' => in_tag = true,
            b'>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(byte),
            _ => {}
        }
    }
    out
}

fn soundex(word: &[u8]) -> String {
    fn code(letter: u8) -> Option<u8> {
        match letter {
            b'B' | b'F' | b'P' | b'V' => Some(b'1'),
            b'C' | b'G' | b'J' | b'K' | b'Q' | b'S' | b'X' | b'Z' => Some(b'2'),
            b'D' | b'T' => Some(b'3'),
            b'L' => Some(b'4'),
            b'M' | b'N' => Some(b'5'),
            b'R' => Some(b'6'),
            _ => None,
        }
    }

    let letters: Vec<u8> = word
        .iter()
        .filter(|b| b.is_ascii_alphabetic())
        .map(u8::to_ascii_uppercase)
        .collect();
    let Some((&first, rest)) = letters.split_first() else {
        return String::new();
    };

    let mut out = String::with_capacity(4);
    out.push(first as char);
    let mut previous = code(first);
    for &letter in rest {
        let current = code(letter);
        if let Some(digit) = current {
            if current != previous {
                out.push(digit as char);
                if out.len() == 4 {
                    break;
                }
            }
        }
        // H and W do not separate letters with the same code
        if letter != b'H' && letter != b'W' {
            previous = current;
        }
    }
    while out.len() < 4 {
        out.push('0');
    }
    out
}

/// Split one CSV record. Fields may be double-quoted, with `""` standing for
/// a literal quote inside a quoted field.
fn parse_csv_record(input: &[u8]) -> Result<Vec<Vec<u8>>> {
    let mut fields = Vec::new();
    let mut field = Vec::new();
    let mut quoted = false;
    let mut i = 0;

    while i < input.len() {
        let byte = input[i];
        if quoted {
            match byte {
                b'"' if input.get(i + 1) == Some(&b'"') => {
                    field.push(b'"');
                    i += 1;
                }
                b'"' => quoted = false,
                _ => field.push(byte),
            }
        } else {
            match byte {
                b'"' if field.is_empty() => quoted = true,
                b',' => fields.push(std::mem::take(&mut field)),
                _ => field.push(byte),
            }
        }
        i += 1;
    }
    if quoted {
        return Err(Error::handler("unterminated quoted CSV field"));
    }
    fields.push(field);
    Ok(fields)
}
