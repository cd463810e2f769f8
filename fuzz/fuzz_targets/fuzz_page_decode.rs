#![no_main]

use libfuzzer_sys::fuzz_target;
use vedis_storage::page::{DbHeader, LeafPage};
use vedis_storage::PageType;

fuzz_target!(|data: &[u8]| {
    if data.len() > 65_536 {
        return;
    }

    // Corrupt pages must surface as errors, not panics
    let _ = DbHeader::decode(data);
    if !data.is_empty() {
        let _ = PageType::of(data);
        let _ = LeafPage::decode(data);
    }
});
