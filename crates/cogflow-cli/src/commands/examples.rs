use std::path::PathBuf;

use clap::Args as ClapArgs;
use colored::Colorize;

#[derive(ClapArgs)]
pub struct Args {
    /// Directory to scan for example documents (defaults to the bundled set).
    #[arg(long)]
    pub path: Option<PathBuf>,
}

const BUNDLED: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../demos");

pub fn run(args: Args) -> i32 {
    let dir = args.path.unwrap_or_else(|| PathBuf::from(BUNDLED));
    let entries = match std::fs::read_dir(&dir) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("{} failed to read {}: {e}", "✗".red(), dir.display());
            return 1;
        }
    };

    let mut found = false;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            found = true;
            println!("{}", path.display());
        }
    }

    if !found {
        println!("no example documents found under {}", dir.display());
    }
    0
}
