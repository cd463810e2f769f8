mod common;

use common::{memory_db, s, strings};
use vedis::{Error, Value};

#[test]
fn test_store_fetch_append_delete() {
    let db = memory_db();

    db.store(b"k1", b"v1").unwrap();
    assert_eq!(db.fetch(b"k1").unwrap(), b"v1".to_vec());

    db.append(b"k1", b"-more").unwrap();
    assert_eq!(db.fetch(b"k1").unwrap(), b"v1-more".to_vec());

    db.append(b"fresh", b"start").unwrap();
    assert_eq!(db.fetch(b"fresh").unwrap(), b"start".to_vec());

    db.delete(b"k1").unwrap();
    assert!(!db.exists(b"k1").unwrap());
    assert!(db.fetch(b"k1").unwrap_err().is_not_found());
    assert!(matches!(db.delete(b"k1"), Err(Error::NotFound)));
}

#[test]
fn test_numbers() {
    let db = memory_db();
    db.store(b"1", b"2").unwrap();
    assert_eq!(db.fetch(b"1").unwrap(), b"2".to_vec());
    db.append(b"1", b"3").unwrap();
    assert_eq!(db.fetch(b"1").unwrap(), b"23".to_vec());
    assert!(db.exists(b"1").unwrap());
    assert!(!db.exists(b"2").unwrap());

    db.store_value(b"int", 1i64).unwrap();
    assert_eq!(db.fetch(b"int").unwrap(), b"1".to_vec());
}

#[test]
fn test_quoted_values() {
    let db = memory_db();
    db.store(b"k\"1\"", b"value \"with quotes\"").unwrap();
    assert_eq!(
        db.fetch(b"k\"1\"").unwrap(),
        b"value \"with quotes\"".to_vec()
    );

    db.execute("SET %s %s", &["k \"2\"", "another \\ \"quoted\" value"])
        .unwrap();
    assert_eq!(
        db.execute_returning("GET %s", &["k \"2\""]).unwrap(),
        s("another \\ \"quoted\" value")
    );
    assert_eq!(
        db.exec("GET \"k \\\"2\\\"\"").unwrap(),
        s("another \\ \"quoted\" value")
    );
}

#[test]
fn test_empty_key_is_rejected() {
    let db = memory_db();
    assert!(matches!(db.store(b"", b"v"), Err(Error::InvalidArgument(_))));
}

#[test]
fn test_large_values() {
    let db = memory_db();
    let big: Vec<u8> = (0..50_000u32).map(|i| (i % 251) as u8).collect();
    db.store(b"big", &big).unwrap();
    assert_eq!(db.fetch(b"big").unwrap(), big);

    db.store(b"big", b"small again").unwrap();
    assert_eq!(db.fetch(b"big").unwrap(), b"small again".to_vec());
}

#[test]
fn test_fetch_and_store_commands() {
    let db = memory_db();
    assert_eq!(db.exec("SET k1 v1").unwrap(), Value::Boolean(true));
    assert_eq!(db.exec("STORE k2 v2").unwrap(), Value::Boolean(true));
    assert_eq!(db.exec("FETCH k1").unwrap(), s("v1"));
    assert_eq!(db.exec("get k2").unwrap(), s("v2"));
    assert_eq!(db.exec("GET missing").unwrap(), Value::Null);

    assert_eq!(db.exec("APPEND k1 xx").unwrap(), Value::Integer(4));
    assert_eq!(db.exec("EXISTS k1").unwrap(), Value::Boolean(true));
    assert_eq!(db.exec("DEL k1 k2 nope").unwrap(), Value::Integer(2));
    assert_eq!(db.exec("EXISTS k1").unwrap(), Value::Boolean(false));
}

#[test]
fn test_strlen_copy_move() {
    let db = memory_db();
    db.store(b"k1", b"foo").unwrap();
    db.store(b"k2", b"").unwrap();
    assert_eq!(db.exec("STRLEN k1").unwrap(), Value::Integer(3));
    assert_eq!(db.exec("STRLEN k2").unwrap(), Value::Integer(0));
    assert_eq!(db.exec("STRLEN missing").unwrap(), Value::Integer(0));

    assert_eq!(db.exec("COPY k1 k3").unwrap(), Value::Boolean(true));
    assert_eq!(db.fetch(b"k3").unwrap(), b"foo".to_vec());
    assert_eq!(db.fetch(b"k1").unwrap(), b"foo".to_vec());

    assert_eq!(db.exec("MOVE k1 k4").unwrap(), Value::Boolean(true));
    assert_eq!(db.fetch(b"k4").unwrap(), b"foo".to_vec());
    assert!(!db.exists(b"k1").unwrap());

    assert_eq!(db.exec("COPY missing k5").unwrap(), Value::Boolean(false));
    assert_eq!(db.exec("MOVE missing k5").unwrap(), Value::Boolean(false));
}

#[test]
fn test_mset_mget_msetnx() {
    let db = memory_db();
    db.store(b"k1", b"v1").unwrap();
    db.execute("MSET", &["k1", "v-x", "k2", "v2", "foo", "bar"])
        .unwrap();
    assert_eq!(
        db.execute_returning("MGET", &["k1", "k2", "foo"]).unwrap(),
        strings(&["v-x", "v2", "bar"])
    );

    db.execute("MSET", &["k s", "vs", "k s2", "vs2"]).unwrap();
    assert_eq!(
        db.execute_returning("MGET", &["k s", "k s2", "nope"]).unwrap(),
        Value::Array(vec![s("vs"), s("vs2"), Value::Null])
    );

    let set = db
        .execute_returning("MSETNX", &["k1", "ignored", "k9", "v9"])
        .unwrap();
    assert_eq!(set, Value::Integer(1));
    assert_eq!(db.fetch(b"k1").unwrap(), b"v-x".to_vec());
    assert_eq!(db.fetch(b"k9").unwrap(), b"v9".to_vec());

    assert!(matches!(
        db.exec("MSET odd"),
        Err(Error::CommandFailed { .. })
    ));
}

#[test]
fn test_getset_setnx() {
    let db = memory_db();
    assert_eq!(db.exec("GETSET k1 v1").unwrap(), Value::Null);
    assert_eq!(db.exec("GETSET k1 v-x").unwrap(), s("v1"));
    assert_eq!(db.fetch(b"k1").unwrap(), b"v-x".to_vec());

    assert_eq!(db.exec("SETNX k1 other").unwrap(), Value::Boolean(false));
    assert_eq!(db.exec("SETNX k2 v2").unwrap(), Value::Boolean(true));
    assert_eq!(db.fetch(b"k1").unwrap(), b"v-x".to_vec());
}

#[test]
fn test_counters() {
    let db = memory_db();
    assert_eq!(db.exec("INCR counter").unwrap(), Value::Integer(1));
    assert_eq!(db.exec("INCR counter").unwrap(), Value::Integer(2));
    assert_eq!(db.exec("DECR other").unwrap(), Value::Integer(-1));
    assert_eq!(db.exec("DECR other").unwrap(), Value::Integer(-2));

    assert_eq!(db.exec("INCRBY c 100").unwrap(), Value::Integer(100));
    assert_eq!(db.exec("INCRBY c 10").unwrap(), Value::Integer(110));
    assert_eq!(db.exec("DECRBY c 90").unwrap(), Value::Integer(20));
    assert_eq!(db.fetch(b"c").unwrap(), b"20".to_vec());

    db.store(b"text", b"abc").unwrap();
    assert!(matches!(db.exec("INCR text"), Err(Error::TypeError(_))));
    assert_eq!(db.fetch(b"text").unwrap(), b"abc".to_vec());
}

#[test]
fn test_exists_ignores_collections() {
    let db = memory_db();
    db.exec("HSET hash_key k v").unwrap();
    db.exec("SADD set_key m").unwrap();
    db.exec("LPUSH list_key v").unwrap();

    assert!(!db.exists(b"hash_key").unwrap());
    assert!(!db.exists(b"set_key").unwrap());
    assert!(!db.exists(b"list_key").unwrap());
    assert_eq!(db.exec("GET hash_key").unwrap(), Value::Null);
}

#[test]
fn test_cursor_walks_keys_in_order() {
    let db = memory_db();
    for key in ["b", "a", "user:2", "user:1", "c"] {
        db.store(key.as_bytes(), key.to_uppercase().as_bytes())
            .unwrap();
    }
    db.exec("HSET hidden f v").unwrap();

    let keys: Vec<Vec<u8>> = db
        .cursor()
        .unwrap()
        .map(|entry| entry.unwrap().0)
        .collect();
    assert_eq!(
        keys,
        vec![
            b"a".to_vec(),
            b"b".to_vec(),
            b"c".to_vec(),
            b"user:1".to_vec(),
            b"user:2".to_vec()
        ]
    );

    let users: Vec<(Vec<u8>, Vec<u8>)> = db
        .cursor_prefix(b"user:")
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(
        users,
        vec![
            (b"user:1".to_vec(), b"USER:1".to_vec()),
            (b"user:2".to_vec(), b"USER:2".to_vec())
        ]
    );
}

#[test]
fn test_cursor_sees_later_writes_and_resets() {
    let db = memory_db();
    db.store(b"a", b"1").unwrap();
    db.store(b"c", b"3").unwrap();

    let mut cursor = db.cursor().unwrap();
    assert_eq!(cursor.next().unwrap().unwrap().0, b"a".to_vec());
    db.store(b"b", b"2").unwrap();
    assert_eq!(cursor.next().unwrap().unwrap().0, b"b".to_vec());
    assert_eq!(cursor.next().unwrap().unwrap().0, b"c".to_vec());
    assert!(cursor.next().is_none());

    cursor.reset();
    assert_eq!(cursor.count(), 3);
}

#[test]
fn test_close_is_busy_while_cursor_alive() {
    let db = memory_db();
    db.store(b"a", b"1").unwrap();

    let cursor = db.cursor().unwrap();
    assert!(matches!(db.close(), Err(Error::Busy)));
    drop(cursor);
    db.close().unwrap();
    assert!(matches!(db.cursor(), Err(Error::Closed)));
}
