use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod changelog;
mod classify;
mod cli;
mod driver;
mod osc;
mod registry;
mod tool;
mod util;
mod workflow;
mod workspace;

use cli::RootArgs;
use tool::QuiltTool;
use workflow::RunOptions;

/// Tracing goes to stderr; stdout carries progress lines and `--json` output.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "refresh_patches=info".into()),
    );
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    let args = RootArgs::parse();
    init_tracing();

    if let Some(outdir) = &args.outdir {
        tracing::debug!(outdir = %outdir.display(), "outdir ignored; files are edited in place");
    }

    let options = RunOptions {
        sourcedir: args.sourcedir.clone(),
        changes_generate: args.changesgenerate.enabled(),
        changes_author: args.changesauthor.clone(),
        ignore_fuzz: args.ignorefuzz.enabled(),
    };
    let tool = QuiltTool::from_env()?;
    let reports = workflow::run(&tool, &options)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            println!(
                "{}: {} refreshed, {} dropped",
                report.manifest,
                report.refreshed.len(),
                report.dropped.len()
            );
        }
    }
    Ok(())
}
