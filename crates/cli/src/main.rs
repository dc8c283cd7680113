//! # CLI - FlatDB Interactive Shell
//!
//! A REPL over the FlatDB table engine. Reads commands from stdin, runs them
//! against the tables under the data root and prints results to stdout.
//! Works interactively or with commands piped in.
//!
//! ## Commands
//!
//! ```text
//! SELECT table [WHERE col=value ...]            Print matching rows as a grid
//! INSERT table [col=value ...]                  Append a row
//! UPDATE table col=value ... [WHERE ...]        Change matching rows
//! DELETE table [WHERE col=value ...]            Remove matching rows
//! TRUNCATE table                                Remove every row and blob
//! SCHEMA table                                  Print the table definition
//! EXIT / QUIT                                   Leave the shell
//! ```
//!
//! ## Configuration
//!
//! ```text
//! FLATDB_DATA_ROOT  directory holding <table>.table/ dirs  (default: "db")
//! FLATDB_SYNC       fsync every write                       (default: "true")
//! RUST_LOG          log filter, logs go to stderr           (default: "warn")
//! ```
//!
//! ## Example
//!
//! ```text
//! $ FLATDB_DATA_ROOT=./db cargo run -p cli
//! FlatDB started (data_root=./db, sync=true)
//! > INSERT users user_name="Ada Lovelace"
//! OK (user_id=1)
//! > SELECT users
//! +----------+--------------+
//! | user_id* | user_name    |
//! +----------+--------------+
//! | 1        | Ada Lovelace |
//! +----------+--------------+
//! (1 rows)
//! > EXIT
//! bye
//! ```

mod command;
mod grid;

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use command::Command;
use config::StorageConfig;
use engine::{Engine, RowFilter};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn main() -> Result<()> {
    init_logging();

    let config = StorageConfig::from_env()?;
    let engine = Engine::new(config.clone())
        .with_context(|| format!("cannot open data root {}", config.data_root().display()))?;
    info!(data_root = %config.data_root().display(), sync = config.sync(), "engine ready");

    println!(
        "FlatDB started (data_root={}, sync={})",
        config.data_root().display(),
        config.sync()
    );
    println!("Commands: SELECT | INSERT | UPDATE | DELETE | TRUNCATE | SCHEMA | EXIT");
    print!("> ");
    io::stdout().flush().ok();

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        match command::parse(&line) {
            Ok(Some(Command::Exit)) => {
                println!("bye");
                break;
            }
            Ok(Some(cmd)) => {
                debug!(?cmd, "executing");
                match execute(&engine, cmd) {
                    Ok(out) => println!("{out}"),
                    Err(e) => println!("ERR {e}"),
                }
            }
            Ok(None) => {}
            Err(e) => println!("ERR {e}"),
        }

        print!("> ");
        io::stdout().flush().ok();
    }

    Ok(())
}

/// Runs one command and returns what to print.
fn execute(engine: &Engine, cmd: Command) -> Result<String> {
    let out = match cmd {
        Command::Select { table, filter } => {
            let schema = engine.schema(&table)?;
            let res = engine.select(&table, as_filter(&filter))?;
            grid::render(&schema, res.rows())
        }
        Command::Insert { table, values } => {
            let res = engine.insert(&table, values)?;
            if res.autos().is_empty() {
                "OK".to_string()
            } else {
                let assigned: Vec<String> = res.autos().iter().map(|(k, v)| format!("{k}={v}")).collect();
                format!("OK ({})", assigned.join(", "))
            }
        }
        Command::Update {
            table,
            changes,
            filter,
        } => {
            let n = engine.update(&table, &changes, as_filter(&filter))?;
            format!("OK ({n} rows)")
        }
        Command::Delete { table, filter } => {
            let n = engine.delete(&table, as_filter(&filter))?;
            format!("OK ({n} rows)")
        }
        Command::Truncate { table } => {
            engine.truncate(&table)?;
            "OK".to_string()
        }
        Command::Schema { table } => engine.schema(&table)?.to_definition().trim_end().to_string(),
        Command::Exit => String::new(),
    };
    Ok(out)
}

fn as_filter(filter: &Option<engine::Predicate>) -> Option<&dyn RowFilter> {
    filter.as_ref().map(|p| p as &dyn RowFilter)
}
