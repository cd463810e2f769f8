#![no_main]

use libfuzzer_sys::fuzz_target;
use vedis_journal::JournalRecord;

fuzz_target!(|data: &[u8]| {
    // Limit input size to prevent timeout
    if data.len() > 1_000_000 {
        return;
    }

    // Walk the buffer as a journal would be read; must never panic
    let mut offset = 0;
    while offset < data.len() {
        match JournalRecord::decode(&data[offset..]) {
            Ok((_, used)) if used > 0 => offset += used,
            _ => break,
        }
    }
});
