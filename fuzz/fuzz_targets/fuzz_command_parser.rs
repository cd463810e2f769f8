#![no_main]

use libfuzzer_sys::fuzz_target;
use vedis_core::{format_command, quote, CommandLine};

fuzz_target!(|data: &[u8]| {
    if data.len() > 100_000 {
        return;
    }

    // Parsing arbitrary text must never panic
    let _ = CommandLine::parse(data);

    // A quoted argument always lexes back to itself
    let command = [b"CMD ".as_slice(), &quote(data)].concat();
    let line = CommandLine::parse(&command).expect("quoted argument failed to parse");
    assert_eq!(line.args.len(), 1);
    assert_eq!(line.args[0], data);

    let _ = format_command("SET %s %s", &[data, data]);
});
