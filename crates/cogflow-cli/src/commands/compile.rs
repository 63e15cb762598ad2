use std::path::PathBuf;

use clap::{Args as ClapArgs, ValueEnum};
use colored::Colorize;
use cogflow::Platform;
use cogflow_engine::OptimizationMode;

#[derive(Clone, Copy, ValueEnum)]
pub enum Optimize {
    Speed,
    Memory,
    Balanced,
}

impl From<Optimize> for OptimizationMode {
    fn from(value: Optimize) -> Self {
        match value {
            Optimize::Speed => OptimizationMode::Speed,
            Optimize::Memory => OptimizationMode::Memory,
            Optimize::Balanced => OptimizationMode::Balanced,
        }
    }
}

#[derive(ClapArgs)]
pub struct Args {
    /// Document file to compile.
    pub file: PathBuf,

    /// Write the compiled graph's JSON export to this path instead of stdout.
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    #[arg(long, value_enum)]
    pub optimize: Option<Optimize>,

    /// Print complexity stats after compiling.
    #[arg(long)]
    pub stats: bool,
}

pub fn run(args: Args) -> i32 {
    let platform = Platform::new();

    let load = match platform.load_document(&args.file) {
        Ok(l) => l,
        Err(e) => {
            eprintln!("{} {e}", "✗".red());
            return 1;
        }
    };

    if !load.validation.valid {
        println!("{} document failed validation", "✗".red());
        for e in &load.validation.errors {
            println!(" {} {e}", "✗".red());
        }
        return 1;
    }

    let content = if let Some(doc) = read_document(&args.file) {
        let graph = match args.optimize {
            Some(mode) => platform.compile_with_optimization(&doc, mode.into()),
            None => load.graph.expect("validated document always compiles"),
        };
        if args.stats {
            println!(
                "nodes={} relations={} max_depth={} avg_branching={:.2} cycles={}",
                graph.nodes.len(),
                graph.relations.len(),
                graph.compilation.complexity.max_depth,
                graph.compilation.complexity.avg_branching,
                graph.compilation.complexity.cycle_count);
        }
        serde_json::to_string_pretty(&graph.to_export_json()).unwrap_or_default()
    } else {
        eprintln!("{} could not re-read {}", "✗".red(), args.file.display());
        return 1;
    };

    match args.output {
        Some(path) => {
            if let Err(e) = std::fs::write(&path, content) {
                eprintln!("{} failed to write {}: {e}", "✗".red(), path.display());
                return 1;
            }
            println!("{} wrote {}", "✓".green(), path.display());
        }
        None => println!("{content}"),
    }

    0
}

fn read_document(path: &PathBuf) -> Option<cogflow_engine::document::Document> {
    let text = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&text).ok()
}
