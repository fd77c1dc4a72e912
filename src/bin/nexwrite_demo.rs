use std::env;
use std::error::Error;
use std::fs;
use std::sync::Arc;

use nexwrite::{MemoryBackend, WriterBuilder};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const FILE: &str = "demo.nxs";

fn print_usage_and_exit() -> ! {
    eprintln!("Usage: nexwrite_demo <template.xml> <records.json> [global.json]");
    eprintln!("  <records.json>: a JSON array of value-scopes, one per record");
    eprintln!("  [global.json]: static value-scope used by INIT and FINAL");
    std::process::exit(1);
}

fn run() -> Result<(), Box<dyn Error>> {
    let mut args = env::args().skip(1);

    let template = match args.next() {
        Some(p) => fs::read_to_string(p)?,
        None => return Err("missing <template.xml> argument".into()),
    };
    let records: Vec<serde_json::Value> = match args.next() {
        Some(p) => serde_json::from_str(&fs::read_to_string(p)?)?,
        None => return Err("missing <records.json> argument".into()),
    };
    let global = args.next().map(fs::read_to_string).transpose()?;
    if args.next().is_some() {
        return Err("too many arguments".into());
    }

    let backend = Arc::new(MemoryBackend::new());
    let mut engine = WriterBuilder::new(backend.clone()).build();
    if let Some(global) = global {
        engine.set_global_json(&global)?;
    }

    engine.open_file(FILE)?;
    engine.open_entry(&template)?;
    for record in &records {
        if let Err(e) = engine.record(&record.to_string()) {
            tracing::error!(step = engine.step(), error = %e, "record failed");
        }
    }
    engine.close_file()?;

    println!("{}", serde_json::to_string_pretty(&backend.snapshot(FILE)?)?);
    Ok(())
}

fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("nexwrite=info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run() {
        eprintln!("nexwrite_demo error: {e}");
        print_usage_and_exit();
    }
}
