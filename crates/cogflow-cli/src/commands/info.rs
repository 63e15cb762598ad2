use std::path::PathBuf;

use clap::Args as ClapArgs;
use colored::Colorize;
use cogflow::Platform;
use cogflow_engine::document::Document;

#[derive(ClapArgs)]
pub struct Args {
    /// Document file to describe.
    pub file: PathBuf,

    /// Also print the compiled graph's adjacency.
    #[arg(long)]
    pub graph: bool,

    /// Also print metadata.dependencies.
    #[arg(long)]
    pub dependencies: bool,
}

pub fn run(args: Args) -> i32 {
    let text = match std::fs::read_to_string(&args.file) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("{} failed to read {}: {e}", "✗".red(), args.file.display());
            return 1;
        }
    };
    let doc: Document = match serde_json::from_str(&text) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("{} failed to parse {}: {e}", "✗".red(), args.file.display());
            return 1;
        }
    };

    let platform = Platform::new();
    let load = platform.load_document_object(&doc);
    let report = platform.report(&doc);
    println!("{}", report.to_markdown());

    if args.dependencies && !doc.metadata.dependencies.is_empty() {
        println!("## Dependencies\n");
        for dep in &doc.metadata.dependencies {
            println!("- {} {}", dep.id, dep.version);
        }
    }

    if args.graph {
        if let Some(graph) = load.graph {
            println!("\n## Graph export\n");
            println!("{}", serde_json::to_string_pretty(&graph.to_export_json()).unwrap_or_default());
        }
    }

    if !report.validation.valid { 1 } else { 0 }
}
