#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use vedis::Database;

#[derive(Arbitrary, Debug)]
enum DbOp {
    Store { key: Vec<u8>, value: Vec<u8> },
    Fetch { key: Vec<u8> },
    Delete { key: Vec<u8> },
    Exec { command: Vec<u8> },
    Begin,
    Commit,
    Rollback,
}

fuzz_target!(|ops: Vec<DbOp>| {
    // In-memory database for fast fuzzing
    if let Ok(db) = Database::in_memory() {
        for op in ops.iter().take(100) {
            match op {
                DbOp::Store { key, value } => {
                    if key.len() <= 1024 && value.len() <= 4096 {
                        let _ = db.store(key, value);
                    }
                }
                DbOp::Fetch { key } => {
                    let _ = db.fetch(key);
                }
                DbOp::Delete { key } => {
                    let _ = db.delete(key);
                }
                DbOp::Exec { command } => {
                    if command.len() <= 1024 {
                        let _ = db.exec(command);
                    }
                }
                DbOp::Begin => {
                    let _ = db.begin();
                }
                DbOp::Commit => {
                    let _ = db.commit();
                }
                DbOp::Rollback => {
                    let _ = db.rollback();
                }
            }
        }
        let _ = db.close();
    }
});
