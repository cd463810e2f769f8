//! Command text protocol
//!
//! `NAME (WS ARG)*` where every argument is either a bare word or a
//! double-quoted string. The interpreter never coerces argument types;
//! handlers receive the raw bytes.

pub mod lexer;

pub use lexer::{Lexer, LexerError, Token};

use crate::{Error, Result};

/// A parsed command: its name and raw argument bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    /// Command name exactly as written
    pub name: String,
    /// Raw argument bytes, in order
    pub args: Vec<Vec<u8>>,
}

impl CommandLine {
    /// Parse command text.
    ///
    /// Fails with [`Error::Syntax`] on empty input, malformed quoting or a
    /// non-ASCII command name.
    pub fn parse(input: &[u8]) -> Result<Self> {
        let mut tokens = Lexer::new(input)
            .tokenize()?
            .into_iter()
            .filter_map(Token::into_bytes);

        let name = tokens
            .next()
            .ok_or_else(|| Error::Syntax("empty command".to_string()))?;
        if name.is_empty() || !name.is_ascii() {
            return Err(Error::Syntax(format!(
                "invalid command name {:?}",
                String::from_utf8_lossy(&name)
            )));
        }
        // ASCII was checked above
        let name = String::from_utf8_lossy(&name).into_owned();

        Ok(Self {
            name,
            args: tokens.collect(),
        })
    }

    /// Registry key for this command.
    pub fn normalized_name(&self) -> String {
        normalize_name(&self.name)
    }
}

/// Command names are case-insensitive; the registry stores them upper-cased.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_ascii_uppercase()
}

/// Quote an argument so that it lexes back to exactly `arg`.
pub fn quote(arg: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(arg.len() + 2);
    out.push(b'"');
    for &byte in arg {
        if byte == b'"' || byte == b'\\' {
            out.push(b'\\');
        }
        out.push(byte);
    }
    out.push(b'"');
    out
}

/// Build command text from a template.
///
/// Each `%s` in `template` is replaced by the next argument, quoted.
/// Arguments left over after the last placeholder are appended, each quoted
/// and separated by a space. A placeholder without a matching argument is an
/// [`Error::InvalidArgument`].
pub fn format_command<A: AsRef<[u8]>>(template: &str, args: &[A]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(template.len() + args.len() * 8);
    let mut args = args.iter();
    let mut rest = template;

    while let Some(idx) = rest.find("%s") {
        out.extend_from_slice(rest[..idx].as_bytes());
        let arg = args.next().ok_or_else(|| {
            Error::InvalidArgument(format!(
                "not enough arguments for command template {:?}",
                template
            ))
        })?;
        out.extend_from_slice(&quote(arg.as_ref()));
        rest = &rest[idx + 2..];
    }
    out.extend_from_slice(rest.as_bytes());

    for arg in args {
        out.push(b' ');
        out.extend_from_slice(&quote(arg.as_ref()));
    }

    Ok(out)
}
