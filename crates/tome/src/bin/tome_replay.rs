//! `tome-replay`: replay a diff log onto a document.
//!
//! Usage:
//!   tome-replay '<initial-document-json>'
//!
//! The diff entries (one entry or a JSON array of entries) are read from
//! stdin. The resulting document is printed to stdout. Set `RUST_LOG=debug`
//! to trace each merged entry on stderr.

use std::io::{self, Read, Write};

use tome::cli::replay;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let document = match args.get(1) {
        Some(d) => d.clone(),
        None => {
            eprintln!("First argument must be the initial JSON document.");
            std::process::exit(1);
        }
    };

    let mut buf = String::new();
    if let Err(e) = io::stdin().read_to_string(&mut buf) {
        eprintln!("{e}");
        std::process::exit(1);
    }

    match replay(&document, buf.trim()) {
        Ok(result) => {
            let mut stdout = io::stdout();
            if let Err(e) = writeln!(stdout, "{result}") {
                eprintln!("{e}");
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
