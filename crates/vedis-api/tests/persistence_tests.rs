mod common;

use common::{s, strings, TestDb};
use vedis::{Database, Error, StorageConfig, Value};
use vedis_journal::{Journal, JournalConfig, JournalRecord};

#[test]
fn test_reopen_keeps_every_collection() {
    let fixture = TestDb::new();
    {
        let db = fixture.open();
        db.store(b"k1", b"v1").unwrap();
        db.exec("HMSET h f1 v1 f2 v2").unwrap();
        db.exec("SADD s a b c").unwrap();
        db.exec("LPUSH l x y z").unwrap();
        db.exec("LPOP l").unwrap();
        db.close().unwrap();
    }

    let db = fixture.open();
    assert_eq!(db.fetch(b"k1").unwrap(), b"v1".to_vec());
    assert_eq!(db.exec("HGET h f2").unwrap(), s("v2"));
    assert_eq!(db.exec("SMEMBERS s").unwrap(), strings(&["a", "b", "c"]));
    assert_eq!(db.exec("LINDEX l 0").unwrap(), s("y"));
    assert_eq!(db.exec("LLEN l").unwrap(), Value::Integer(2));
    assert_eq!(db.exec("TABLE_LIST").unwrap(), strings(&["h", "l", "s"]));
}

#[test]
fn test_drop_without_close_keeps_committed_data() {
    let fixture = TestDb::new();
    {
        let db = fixture.open();
        db.store(b"k1", b"v1").unwrap();
    }
    let db = fixture.open();
    assert_eq!(db.fetch(b"k1").unwrap(), b"v1".to_vec());
}

#[test]
fn test_many_keys_survive_reopen() {
    let fixture = TestDb::new();
    {
        let db = fixture.open();
        db.transaction(|db| {
            for i in 0..500 {
                db.store(format!("key{:04}", i).as_bytes(), format!("value{}", i).as_bytes())?;
            }
            Ok(())
        })
        .unwrap();
        db.close().unwrap();
    }

    let db = fixture.open();
    assert_eq!(db.cursor().unwrap().count(), 500);
    assert_eq!(db.fetch(b"key0123").unwrap(), b"value123".to_vec());
    assert!(db.stats().unwrap().page_count > 1);
}

#[test]
fn test_second_open_is_busy() {
    let fixture = TestDb::new();
    let db = fixture.open();
    assert!(matches!(Database::open(&fixture.path), Err(Error::Busy)));

    db.close().unwrap();
    let reopened = Database::open(&fixture.path).unwrap();
    assert!(reopened.is_open());
}

#[test]
fn test_read_only_rejects_writes() {
    let fixture = TestDb::new();
    {
        let db = fixture.open();
        db.store(b"k1", b"v1").unwrap();
        db.close().unwrap();
    }

    let config = StorageConfig {
        read_only: true,
        ..StorageConfig::default()
    };
    let db = Database::open_with_config(&fixture.path, config).unwrap();
    assert_eq!(db.fetch(b"k1").unwrap(), b"v1".to_vec());
    assert_eq!(db.exec("GET k1").unwrap(), s("v1"));
    assert!(matches!(db.store(b"k2", b"v2"), Err(Error::ReadOnly)));
    assert!(matches!(db.exec("SET k2 v2"), Err(Error::ReadOnly)));
    assert!(!db.exists(b"k2").unwrap());
}

#[test]
fn test_hot_journal_rolls_back_interrupted_commit() {
    let fixture = TestDb::new();
    let page_size = {
        let db = fixture.open();
        db.store(b"k1", b"before").unwrap();
        let page_size = db.stats().unwrap().page_size;
        db.close().unwrap();
        page_size
    };
    let snapshot = std::fs::read(&fixture.path).expect("Failed to read database file");

    {
        let db = fixture.open();
        db.store(b"k1", b"after").unwrap();
        db.store(b"k2", b"new").unwrap();
        db.close().unwrap();
    }

    // Leave behind the journal a crashed commit would have written.
    let journal = Journal::new(JournalConfig::for_database(&fixture.path));
    let page_count = (snapshot.len() / page_size) as u64;
    let mut writer = journal
        .begin(page_size as u32, page_count, 42)
        .expect("Failed to begin journal");
    for (page_no, page) in snapshot.chunks(page_size).enumerate() {
        writer
            .append(&JournalRecord::page_image(page_no as u64, page.to_vec()))
            .expect("Failed to append page image");
    }
    writer
        .append(&JournalRecord::seal(page_count, 42))
        .expect("Failed to seal journal");
    writer.sync().expect("Failed to sync journal");
    drop(writer);
    assert!(fixture.journal_path().exists());

    let db = fixture.open();
    assert_eq!(db.fetch(b"k1").unwrap(), b"before".to_vec());
    assert!(!db.exists(b"k2").unwrap());
    assert!(!fixture.journal_path().exists());
}

#[test]
fn test_unsealed_journal_is_discarded() {
    let fixture = TestDb::new();
    let page_size = {
        let db = fixture.open();
        db.store(b"k1", b"committed").unwrap();
        let page_size = db.stats().unwrap().page_size;
        db.close().unwrap();
        page_size
    };

    let journal = Journal::new(JournalConfig::for_database(&fixture.path));
    let mut writer = journal
        .begin(page_size as u32, 1, 7)
        .expect("Failed to begin journal");
    writer
        .append(&JournalRecord::page_image(0, vec![0u8; page_size]))
        .expect("Failed to append page image");
    writer.sync().expect("Failed to sync journal");
    drop(writer);

    let db = fixture.open();
    assert_eq!(db.fetch(b"k1").unwrap(), b"committed".to_vec());
    assert!(!fixture.journal_path().exists());
}

#[test]
fn test_hot_journal_blocks_read_only_open() {
    let fixture = TestDb::new();
    let page_size = {
        let db = fixture.open();
        db.store(b"k1", b"v1").unwrap();
        let page_size = db.stats().unwrap().page_size;
        db.close().unwrap();
        page_size
    };
    let snapshot = std::fs::read(&fixture.path).expect("Failed to read database file");

    let journal = Journal::new(JournalConfig::for_database(&fixture.path));
    let mut writer = journal
        .begin(page_size as u32, 1, 9)
        .expect("Failed to begin journal");
    writer
        .append(&JournalRecord::page_image(0, snapshot[..page_size].to_vec()))
        .expect("Failed to append page image");
    writer
        .append(&JournalRecord::seal(1, 9))
        .expect("Failed to seal journal");
    writer.sync().expect("Failed to sync journal");
    drop(writer);

    let config = StorageConfig {
        read_only: true,
        ..StorageConfig::default()
    };
    assert!(matches!(
        Database::open_with_config(&fixture.path, config),
        Err(Error::ReadOnly)
    ));
    assert!(fixture.journal_path().exists());
}
