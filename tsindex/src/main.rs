#![cfg_attr(test, allow(clippy::expect_used))]
// Forbid unwrap() in production code to prevent panics from corrupt data.
// Test code is allowed to use unwrap() for convenience.
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tsindex::storage::Timestamp;
use tsindex::{IndexConfig, Tree, TreeError};

const USAGE: &str = "usage: tsindex <command> <path> [args]

commands:
  create <path>                 create an empty index
  insert <path> <key> <value>   insert or overwrite a key
  find <path> <key>             print the value stored for a key
  dump <path>                   print every node
  stats <path>                  verify the tree and print its shape";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Create,
    Insert { key: Timestamp, value: u64 },
    Find { key: Timestamp },
    Dump,
    Stats,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tsindex=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match IndexConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (command, path) = match parse_args(&args) {
        Ok(parsed) => parsed,
        Err(message) => {
            eprintln!("{message}\n\n{USAGE}");
            return ExitCode::from(2);
        }
    };

    match run(&command, &path, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}: {e}", path.display());
            ExitCode::FAILURE
        }
    }
}

fn parse_args(args: &[String]) -> Result<(Command, PathBuf), String> {
    let [name, path, rest @ ..] = args else {
        return Err("missing command or path".to_string());
    };

    let command = match (name.as_str(), rest) {
        ("create", []) => Command::Create,
        ("insert", [key, value]) => Command::Insert {
            key: parse_number("key", key)?,
            value: parse_number("value", value)?,
        },
        ("find", [key]) => Command::Find {
            key: parse_number("key", key)?,
        },
        ("dump", []) => Command::Dump,
        ("stats", []) => Command::Stats,
        ("create" | "insert" | "find" | "dump" | "stats", _) => {
            return Err(format!("wrong number of arguments for '{name}'"));
        }
        _ => return Err(format!("unknown command '{name}'")),
    };

    Ok((command, PathBuf::from(path)))
}

fn parse_number(what: &str, value: &str) -> Result<u64, String> {
    value
        .parse()
        .map_err(|_| format!("{what} '{value}' is not an unsigned 64-bit integer"))
}

fn run(command: &Command, path: &Path, config: &IndexConfig) -> Result<(), TreeError> {
    if *command == Command::Create {
        return Tree::create_file(path, config)?.close();
    }

    let mut tree = Tree::open_file(path, config)?;
    match *command {
        Command::Create => {}
        Command::Insert { key, value } => tree.insert(key, value)?,
        Command::Find { key } => match tree.find(key) {
            Some(value) => println!("{value}"),
            None => println!("absent"),
        },
        Command::Dump => print!("{}", tree.display()),
        Command::Stats => {
            println!("pages: {}", tree.page_count());
            println!("keys:  {}", tree.len());
            println!("depth: {}", tree.depth());
            match tree.verify() {
                Ok(summary) => println!(
                    "valid: {} nodes, {} leaves",
                    summary.nodes, summary.leaves
                ),
                Err(violation) => println!("invalid: {violation}"),
            }
        }
    }
    tree.close()
}
