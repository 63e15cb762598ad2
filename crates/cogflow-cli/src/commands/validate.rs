use std::path::PathBuf;

use clap::Args as ClapArgs;
use colored::Colorize;
use cogflow::Platform;

#[derive(ClapArgs)]
pub struct Args {
    /// Document files to validate.
    pub files: Vec<PathBuf>,

    /// Also print warnings.
    #[arg(short = 'w', long)]
    pub warnings: bool,

    /// Verbose: print each error/warning's full context.
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Emit machine-readable JSON instead of colored text.
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: Args) -> i32 {
    let platform = Platform::new();
    let mut any_invalid = false;

    let mut results = Vec::new();
    for path in &args.files {
        let result = platform.validate_file(path);
        if !result.valid {
            any_invalid = true;
        }
        results.push((path.clone(), result));
    }

    if args.json {
        let payload: Vec<_> = results
        .iter()
        .map(|(path, result)| {
                serde_json::json!({ "path": path.display().to_string(), "result": result })
        })
        .collect();
        println!("{}", serde_json::to_string_pretty(&payload).unwrap_or_default());
    } else {
        for (path, result) in &results {
            if result.valid {
                println!("{} {}", "✓".green(), path.display());
            } else {
                println!("{} {}", "✗".red(), path.display());
            }
            for e in &result.errors {
                println!(" {} {e}", "✗".red());
            }
            if args.warnings {
                for w in &result.warnings {
                    if args.verbose {
                        println!(" {} {w} (node={:?} relation={:?})", "!".yellow(), w.node_id, w.relation_id);
                    } else {
                        println!(" {} {w}", "!".yellow());
                    }
                }
            }
        }
    }

    if any_invalid { 1 } else { 0 }
}
