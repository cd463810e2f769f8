// Crash scenario tests for the rollback journal

mod common;

use common::JournalTestFixture;
use vedis_journal::{Journal, JournalRecord};

fn sealed_journal_bytes(fixture: &JournalTestFixture) -> Vec<u8> {
    let journal = Journal::new(fixture.config());
    let mut writer = journal.begin(128, 3, 77).expect("Failed to begin journal");
    writer
        .append(&JournalRecord::page_image(0, vec![0x11; 128]))
        .expect("Failed to append");
    writer
        .append(&JournalRecord::page_image(2, vec![0x22; 128]))
        .expect("Failed to append");
    writer
        .append(&JournalRecord::seal(2, 77))
        .expect("Failed to seal");
    writer.sync().expect("Failed to sync");
    drop(writer);
    fixture.journal_bytes()
}

#[test]
fn test_sealed_journal_survives_reopen() {
    let fixture = JournalTestFixture::new();
    sealed_journal_bytes(&fixture);

    let journal = Journal::new(fixture.config());
    let hot = journal
        .hot()
        .expect("Failed to recover")
        .expect("Journal should be hot");
    assert_eq!(hot.page_count, 3);
    assert_eq!(hot.images.len(), 2);
}

#[test]
fn test_crash_before_seal_is_not_hot() {
    let fixture = JournalTestFixture::new();
    let bytes = sealed_journal_bytes(&fixture);

    // Every prefix that stops before the seal is complete must be ignored
    let seal_len = JournalRecord::seal(2, 77)
        .encode()
        .expect("Failed to encode")
        .len();
    let journal = Journal::new(fixture.config());
    for cut in [0, 5, bytes.len() / 2, bytes.len() - seal_len, bytes.len() - 1] {
        fixture.overwrite_journal(&bytes[..cut]);
        assert_eq!(
            journal.hot().expect("Recovery must tolerate a torn journal"),
            None,
            "prefix of {} bytes should not be hot",
            cut
        );
    }
}

#[test]
fn test_corrupted_image_is_not_hot() {
    let fixture = JournalTestFixture::new();
    let mut bytes = sealed_journal_bytes(&fixture);

    // Flip a byte inside the first page image
    let header_len = JournalRecord::header(128, 3, 77)
        .encode()
        .expect("Failed to encode")
        .len();
    bytes[header_len + 40] ^= 0xFF;
    fixture.overwrite_journal(&bytes);

    let journal = Journal::new(fixture.config());
    assert_eq!(journal.hot().expect("Failed to recover"), None);
    assert!(journal.stats().expect("Failed to get stats").truncated);
}

#[test]
fn test_garbage_journal_is_ignored() {
    let fixture = JournalTestFixture::new();
    fixture.overwrite_journal(b"this is not a journal at all");

    let journal = Journal::new(fixture.config());
    assert_eq!(journal.hot().expect("Failed to recover"), None);
    journal.remove().expect("Failed to remove");
    assert!(!journal.exists());
}
