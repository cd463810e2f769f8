//! Transaction Demo
//!
//! Explicit transactions on a file database:
//! - begin / commit / rollback through the API
//! - the BEGIN, COMMIT and ROLLBACK commands
//! - the closure helper
//! - durability across a reopen

use vedis::{Database, Error};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Vedis Transaction Demo ===\n");

    let dir = std::env::temp_dir().join("vedis_transaction_demo");
    std::fs::create_dir_all(&dir)?;
    let path = dir.join("bank.vedis");
    let _ = std::fs::remove_file(&path);

    {
        let db = Database::open(&path)?;

        println!("1. Commit:");
        db.begin()?;
        db.store(b"account:alice", b"100")?;
        db.store(b"account:bob", b"50")?;
        db.commit()?;
        println!("   Committed two accounts");

        println!("\n2. Rollback:");
        db.begin()?;
        db.store(b"account:alice", b"0")?;
        db.rollback()?;
        println!(
            "   alice after rollback = {}",
            String::from_utf8_lossy(&db.fetch(b"account:alice")?)
        );

        println!("\n3. Commands:");
        db.exec("BEGIN")?;
        db.exec("INCRBY account:bob 25")?;
        db.exec("COMMIT")?;
        println!("   bob = {}", db.exec("GET account:bob")?);

        println!("\n4. Transfer with the closure helper:");
        let transfer = db.transaction(|db| {
            db.exec("DECRBY account:alice 500")?;
            let balance = db.exec("GET account:alice")?.to_int()?;
            if balance < 0 {
                return Err(Error::InvalidArgument("insufficient funds".to_string()));
            }
            db.exec("INCRBY account:bob 500")?;
            Ok(())
        });
        println!("   transfer -> {:?}", transfer);
        println!("   alice = {}", db.exec("GET account:alice")?);

        db.close()?;
    }

    println!("\n5. Reopen:");
    let db = Database::open(&path)?;
    println!("   alice = {}", db.exec("GET account:alice")?);
    println!("   bob = {}", db.exec("GET account:bob")?);
    db.close()?;

    std::fs::remove_dir_all(&dir)?;
    println!("\n=== Demo Complete ===");
    Ok(())
}
