//! Custom Command Demo
//!
//! Registers commands written in Rust, including one carrying user data and
//! one implemented as a `CommandHandler` type.

use std::sync::atomic::{AtomicU64, Ordering};
use vedis::{CommandContext, CommandHandler, Database, Error, Result, Value};

/// Upper-cases every argument and stores it under `upper:<arg>`.
struct Shout;

impl CommandHandler for Shout {
    fn call(&self, ctx: &mut CommandContext<'_>, args: &[Value]) -> Result<()> {
        let mut out = Vec::with_capacity(args.len());
        for arg in args {
            let upper = arg.to_string().to_uppercase();
            ctx.set(format!("upper:{}", arg).as_bytes(), upper.as_bytes())?;
            out.push(Value::from(upper));
        }
        ctx.set_result(out);
        Ok(())
    }
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    println!("=== Vedis Custom Command Demo ===\n");

    let db = Database::in_memory()?;

    db.register("HELLO", |ctx: &mut CommandContext<'_>, args: &[Value]| {
        let who = args.first().map(Value::to_string).unwrap_or_default();
        ctx.set_result(format!("Hello, {}!", who));
        Ok(())
    })?;
    println!("1. {}", db.execute_returning("HELLO %s", &["Vedis user"])?);

    db.register_with_data(
        "TICK",
        |ctx: &mut CommandContext<'_>, _: &[Value]| {
            let counter = ctx
                .user_data::<AtomicU64>()
                .ok_or_else(|| Error::handler("counter missing"))?;
            ctx.set_result(counter.fetch_add(1, Ordering::SeqCst) as i64 + 1);
            Ok(())
        },
        AtomicU64::new(0),
    )?;
    db.exec("TICK")?;
    println!("2. TICK twice -> {}", db.exec("TICK")?);

    db.register_handler("SHOUT", Shout)?;
    println!("3. SHOUT -> {}", db.exec("SHOUT quiet words")?);
    println!("   stored: {}", db.exec("GET upper:quiet")?);

    db.register("FAILING", |ctx: &mut CommandContext<'_>, _: &[Value]| {
        ctx.set(b"half-written", b"x")?;
        Err(Error::handler("gave up"))
    })?;
    match db.exec("FAILING") {
        Err(e) => println!("4. FAILING -> {}", e),
        Ok(v) => println!("4. FAILING unexpectedly returned {}", v),
    }
    println!("   half-written exists: {}", db.exists(b"half-written")?);

    db.delete_command("HELLO")?;
    match db.exec("HELLO again") {
        Err(e) => println!("5. after delete -> {}", e),
        Ok(v) => println!("5. HELLO still answers {}", v),
    }

    println!("\n=== Demo Complete ===");
    Ok(())
}
