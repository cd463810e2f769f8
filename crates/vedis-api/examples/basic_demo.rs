//! Basic Demo
//!
//! Key/value storage through the direct API and through commands, plus the
//! hash, set and list collections.

use vedis::{Database, Value};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Vedis Basic Demo ===\n");

    let db = Database::in_memory()?;

    println!("1. Key/value:");
    db.store(b"user:1", b"Alice")?;
    db.append(b"user:1", b" Smith")?;
    println!("   user:1 = {}", String::from_utf8_lossy(&db.fetch(b"user:1")?));

    db.exec("SET greeting hello")?;
    println!("   GET greeting -> {}", db.exec("GET greeting")?);
    println!("   INCR visits -> {}", db.exec("INCR visits")?);
    println!("   INCR visits -> {}", db.exec("INCR visits")?);

    println!("\n2. Hash:");
    db.execute("HMSET %s", &["user:2", "name", "Bob", "city", "New York"])?;
    if let Value::Array(pairs) = db.exec("HGETALL user:2")? {
        for pair in pairs.chunks(2) {
            println!("   {} = {}", pair[0], pair[1]);
        }
    }

    println!("\n3. Set:");
    db.exec("SADD tags rust db embedded rust")?;
    println!("   SCARD tags -> {}", db.exec("SCARD tags")?);
    println!("   SPEEK tags -> {}", db.exec("SPEEK tags")?);

    println!("\n4. List:");
    db.exec("LPUSH jobs first second third")?;
    println!("   LPOP jobs -> {}", db.exec("LPOP jobs")?);
    println!("   LLEN jobs -> {}", db.exec("LLEN jobs")?);

    println!("\n5. Cursor over plain keys:");
    for entry in db.cursor()? {
        let (key, value) = entry?;
        println!(
            "   {} => {}",
            String::from_utf8_lossy(&key),
            String::from_utf8_lossy(&value)
        );
    }

    println!("\n6. Collections: {}", db.exec("TABLE_LIST")?);

    println!("\n=== Demo Complete ===");
    Ok(())
}
