mod common;

use common::{memory_db, s, strings};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use vedis::{CommandContext, CommandHandler, Error, Result, Value};

#[test]
fn test_custom_command_receives_arguments() {
    let db = memory_db();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let log = Arc::clone(&seen);
    db.register("XTEST", move |ctx: &mut CommandContext<'_>, args: &[Value]| {
        log.lock().unwrap().extend(args.iter().cloned());
        ctx.set_result("hello");
        Ok(())
    })
    .unwrap();

    let res = db.execute_returning("XTEST %s %s", &["foo", "barbaz"]).unwrap();
    assert_eq!(res, s("hello"));
    let res = db.execute_returning("xtest %s", &["single 111"]).unwrap();
    assert_eq!(res, s("hello"));
    assert_eq!(
        *seen.lock().unwrap(),
        vec![s("foo"), s("barbaz"), s("single 111")]
    );

    db.delete_command("XTEST").unwrap();
    assert!(matches!(
        db.exec("XTEST"),
        Err(Error::UnknownCommand(name)) if name == "XTEST"
    ));
    assert!(matches!(db.delete_command("XTEST"), Err(Error::NotFound)));
}

#[test]
fn test_nested_results() {
    let db = memory_db();
    db.register("CMDA", |ctx: &mut CommandContext<'_>, _: &[Value]| {
        ctx.set_result(vec![
            s("aa"),
            Value::Array(vec![s("bb"), strings(&["cc", "dd"]), s("ee")]),
            s("ff"),
        ]);
        Ok(())
    })
    .unwrap();
    db.register("CMDB", |ctx: &mut CommandContext<'_>, args: &[Value]| {
        let titled = args
            .iter()
            .map(|arg| Value::from(title_case(&arg.to_string())))
            .collect::<Vec<_>>();
        ctx.set_result(titled);
        Ok(())
    })
    .unwrap();

    assert_eq!(
        db.exec("CMDA").unwrap(),
        Value::Array(vec![
            s("aa"),
            Value::Array(vec![s("bb"), strings(&["cc", "dd"]), s("ee")]),
            s("ff"),
        ])
    );
    assert_eq!(
        db.execute_returning("CMDB %s %s %s", &["this", "is a test", "foo"])
            .unwrap(),
        strings(&["This", "Is A Test", "Foo"])
    );
}

fn title_case(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[test]
fn test_command_context_writes() {
    let db = memory_db();
    db.register("MAGIC_SET", |ctx: &mut CommandContext<'_>, args: &[Value]| {
        for arg in args {
            let key = arg.to_bytes()?;
            ctx.set(&key, title_case(&arg.to_string()).as_bytes())?;
        }
        ctx.set_result(args.len());
        Ok(())
    })
    .unwrap();

    let res = db
        .execute_returning("MAGIC_SET %s %s %s", &["foo", "bar", "this is a test"])
        .unwrap();
    assert_eq!(res, Value::Integer(3));
    assert_eq!(db.fetch(b"foo").unwrap(), b"Foo".to_vec());
    assert_eq!(db.fetch(b"bar").unwrap(), b"Bar".to_vec());
    assert_eq!(
        db.fetch(b"this is a test").unwrap(),
        b"This Is A Test".to_vec()
    );
}

#[test]
fn test_return_types() {
    let db = memory_db();
    db.register("TEST_RET", |ctx: &mut CommandContext<'_>, _: &[Value]| {
        ctx.set_result(vec![
            strings(&["list"]),
            Value::from(1337i64),
            Value::from(2.5),
            Value::from(true),
            Value::Null,
            Value::from("string"),
            Value::from("unicode \u{2603}"),
        ]);
        Ok(())
    })
    .unwrap();

    let items: Vec<Value> = db
        .execute_iterating("TEST_RET", &[] as &[&str])
        .unwrap()
        .collect::<Result<_>>()
        .unwrap();
    assert_eq!(items.len(), 7);
    assert_eq!(items[0], strings(&["list"]));
    assert_eq!(items[1], Value::Integer(1337));
    assert_eq!(items[2], Value::Double(2.5));
    assert_eq!(items[3], Value::Boolean(true));
    assert_eq!(items[4], Value::Null);
    assert_eq!(items[5], s("string"));
    assert_eq!(String::try_from(items[6].clone()).unwrap(), "unicode \u{2603}");
}

#[test]
fn test_command_without_result_returns_null() {
    let db = memory_db();
    db.register("NOTHING", |_: &mut CommandContext<'_>, _: &[Value]| Ok(()))
        .unwrap();
    assert_eq!(db.exec("NOTHING a b").unwrap(), Value::Null);
}

#[test]
fn test_user_data() {
    let db = memory_db();
    db.register_with_data(
        "BUMP",
        |ctx: &mut CommandContext<'_>, _: &[Value]| {
            let counter = ctx
                .user_data::<AtomicUsize>()
                .ok_or_else(|| Error::handler("missing counter"))?;
            let next = counter.fetch_add(1, Ordering::SeqCst) + 1;
            ctx.set_result(next);
            Ok(())
        },
        AtomicUsize::new(0),
    )
    .unwrap();

    assert_eq!(db.exec("BUMP").unwrap(), Value::Integer(1));
    assert_eq!(db.exec("BUMP").unwrap(), Value::Integer(2));
}

struct Echo;

impl CommandHandler for Echo {
    fn call(&self, ctx: &mut CommandContext<'_>, args: &[Value]) -> Result<()> {
        ctx.set_result(args.to_vec());
        Ok(())
    }
}

#[test]
fn test_trait_handler_and_override() {
    let db = memory_db();
    db.register_handler("ECHO", Echo).unwrap();
    assert_eq!(db.exec("ECHO a b").unwrap(), strings(&["a", "b"]));

    db.register("GET", |ctx: &mut CommandContext<'_>, _: &[Value]| {
        ctx.set_result("overridden");
        Ok(())
    })
    .unwrap();
    assert_eq!(db.exec("GET anything").unwrap(), s("overridden"));
    assert!(db.commands().unwrap().contains(&"ECHO".to_string()));
}

#[test]
fn test_handler_failure_is_command_failed() {
    let db = memory_db();
    db.register("FAIL", |ctx: &mut CommandContext<'_>, _: &[Value]| {
        ctx.set(b"written", b"before failure")?;
        Err(Error::handler("nope"))
    })
    .unwrap();

    match db.exec("FAIL") {
        Err(Error::CommandFailed { command, reason }) => {
            assert_eq!(command, "FAIL");
            assert_eq!(reason, "nope");
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert!(!db.exists(b"written").unwrap());
}

#[test]
fn test_handler_calling_back_into_database_is_busy() {
    let db = memory_db();
    let inner = db.clone();
    db.register("REENTER", move |ctx: &mut CommandContext<'_>, _: &[Value]| {
        let fetched = inner.fetch(b"k");
        assert!(matches!(fetched, Err(Error::Busy)));
        ctx.set(b"k", b"via context")?;
        inner.exec("GET k").map(|_| ())
    })
    .unwrap();

    db.store(b"k", b"v").unwrap();
    assert!(matches!(db.exec("REENTER"), Err(Error::Busy)));
    assert_eq!(db.fetch(b"k").unwrap(), b"v".to_vec());

    // The lock is released again once the handler returns.
    db.store(b"k", b"after").unwrap();
    assert_eq!(db.exec("GET k").unwrap(), s("after"));
}

#[test]
fn test_engine_errors_pass_through() {
    let db = memory_db();
    db.exec("LPUSH l v").unwrap();
    db.register("HASH_ON_LIST", |ctx: &mut CommandContext<'_>, _: &[Value]| {
        ctx.store().hget(b"l", b"f")?;
        Ok(())
    })
    .unwrap();
    assert!(matches!(db.exec("HASH_ON_LIST"), Err(Error::TypeError(_))));
}

#[test]
fn test_bad_command_text() {
    let db = memory_db();
    assert!(matches!(db.exec(""), Err(Error::Syntax(_))));
    assert!(matches!(db.exec("GET \"open"), Err(Error::Syntax(_))));
    assert!(matches!(db.exec("NOSUCH x"), Err(Error::UnknownCommand(_))));
    assert!(matches!(
        db.execute("GET %s %s", &["only one"]),
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(db.exec("GET"), Err(Error::CommandFailed { .. })));
}

#[test]
fn test_execute_iterating_requires_array() {
    let db = memory_db();
    db.store(b"k", b"v").unwrap();
    assert!(matches!(
        db.execute_iterating("GET %s", &["k"]),
        Err(Error::TypeError(_))
    ));
}

#[test]
fn test_value_iter_after_close() {
    let db = memory_db();
    db.exec("SADD s a b").unwrap();
    let mut members = db.execute_iterating("SMEMBERS %s", &["s"]).unwrap();
    assert_eq!(members.remaining(), 2);
    assert_eq!(members.next().unwrap().unwrap(), s("a"));

    db.close().unwrap();
    assert!(matches!(members.next(), Some(Err(Error::Closed))));
    assert!(members.next().is_none());
}

#[test]
fn test_utility_commands() {
    let db = memory_db();

    let html = "<p>This <span>is</span> a test.</p>";
    assert_eq!(
        db.exec(format!("STRIP_TAG {}", html)).unwrap(),
        s("This is a test.")
    );

    let alphabet = "abcdefghijklmnopqrstuvwxyz";
    let chunks: Vec<Value> = db
        .execute_iterating("STR_SPLIT %s 5", &[alphabet])
        .unwrap()
        .collect::<Result<_>>()
        .unwrap();
    assert_eq!(chunks.len(), 6);
    assert_eq!(chunks[0], s("abcde"));
    assert_eq!(chunks[5], s("z"));

    assert_eq!(db.exec("SIZE_FMT 100000").unwrap(), s("97.6 KB"));
    assert_eq!(db.exec("SOUNDEX Robert").unwrap(), s("R163"));

    let encoded = db.execute_returning("BASE64 %s", &["hello world"]).unwrap();
    assert_eq!(encoded, s("aGVsbG8gd29ybGQ="));
    let decoded = db
        .execute_returning("BASE64_DEC %s", &[encoded.to_string()])
        .unwrap();
    assert_eq!(decoded, s("hello world"));
    assert!(matches!(
        db.exec("BASE64_DEC !!!"),
        Err(Error::CommandFailed { .. })
    ));

    assert_eq!(
        db.execute_returning("GETCSV %s", &["a,\"b,c\",d"]).unwrap(),
        strings(&["a", "b,c", "d"])
    );

    assert_eq!(db.exec("VEDIS").unwrap(), s(vedis::VERSION));
    assert!(!db.exec("OS").unwrap().to_string().is_empty());
}

#[test]
fn test_random_commands() {
    let db = memory_db();
    for _ in 0..20 {
        let n = db.exec("RAND 1 10").unwrap().to_int().unwrap();
        assert!((1..=10).contains(&n));
    }
    assert!(matches!(db.exec("RAND").unwrap(), Value::Integer(n) if n >= 0));

    let text = db.exec("RANDSTR 5").unwrap().to_bytes().unwrap();
    assert_eq!(text.len(), 5);
    assert_eq!(db.random_string(5).unwrap().len(), 5);
    db.random_number().unwrap();
}

#[test]
fn test_time_and_date() {
    let db = memory_db();
    let time = db.exec("TIME").unwrap().to_string();
    let date = db.exec("DATE").unwrap().to_string();

    let time_parts: Vec<&str> = time.split(':').collect();
    assert_eq!(time_parts.len(), 3);
    assert!(time_parts
        .iter()
        .all(|p| p.len() == 2 && p.chars().all(|c| c.is_ascii_digit())));

    let date_parts: Vec<usize> = date.split('-').map(str::len).collect();
    assert_eq!(date_parts, vec![4, 2, 2]);
}
