use vedis::logging::LogConfig;
use vedis::Database;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Debug level with pretty output to stdout; RUST_LOG overrides it
    let _guard = LogConfig::debug().init()?;

    println!("=== Vedis Logging Demo ===\n");

    // Logs "In-memory database opened"
    let db = Database::in_memory()?;

    println!("\n1. Writing data...");
    db.store(b"user:1", b"Alice")?;
    db.exec("HSET user:2 name Bob")?;

    println!("\n2. Registering a command...");
    db.register("PING", |ctx: &mut vedis::CommandContext<'_>, _: &[vedis::Value]| {
        ctx.set_result("PONG");
        Ok(())
    })?;
    db.exec("PING")?;

    println!("\n3. A failing command...");
    let _ = db.exec("NO_SUCH_COMMAND");

    println!("\n4. Transaction...");
    db.begin()?;
    db.store(b"txn:key", b"txn:value")?;
    db.commit()?;

    db.close()?;
    println!("\n=== Demo Complete ===");
    println!("Check the logs above to see tracing output!");

    Ok(())
}
