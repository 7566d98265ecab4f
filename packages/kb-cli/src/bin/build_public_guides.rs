//! Build reader-facing guides from the KB
//!
//! Writes `public_guides.json`, `public_guides_index.json` and
//! `public_guides.schema.json`. Nothing is written when validation fails.
//!
//! Exit codes: 0 success, 1 fatal, 2 validation failed.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::Colorize;

use kb_cli::{exit, logging, summary, Config};
use kb_pipeline::{build_public_guides, resolve_generated_at, KbPaths, KbWriter};

#[derive(Parser, Debug)]
#[command(name = "build_public_guides")]
#[command(about = "Build and validate public guide JSON from the KB")]
struct Cli {
    /// KB root directory (defaults to KB_ROOT, then `kb`)
    #[arg(long)]
    kb_root: Option<PathBuf>,

    /// Output directory (defaults to <kb-root>/published)
    #[arg(long)]
    out: Option<PathBuf>,

    /// Validate without writing
    #[arg(long)]
    check_only: bool,

    #[arg(long, short)]
    verbose: bool,
}

fn run(cli: Cli) -> Result<u8> {
    let config = Config::from_env()?;
    config.check_source_timestamp()?;
    let paths = KbPaths::new(config.kb_root_or(cli.kb_root));

    let kb_file = paths.kb_file();
    if !kb_file.is_file() {
        bail!("KB file not found: {}", kb_file.display());
    }
    let kb = KbWriter::load(&kb_file)
        .with_context(|| format!("Failed to load KB from {}", kb_file.display()))?;

    let generated_at = resolve_generated_at(config.source_timestamp.as_deref(), kb.kb());
    let outputs = build_public_guides(kb.kb(), generated_at);

    if let Err(e) = outputs.validate() {
        summary::print_validation(&e);
        return Ok(exit::VALIDATION_FAILED);
    }
    summary::print_outputs(&outputs);

    if cli.check_only {
        println!("{}", "Validation passed (check only, nothing written)".green());
        return Ok(exit::SUCCESS);
    }

    let out = cli.out.unwrap_or_else(|| paths.published_dir());
    outputs
        .write(&out)
        .with_context(|| format!("Failed to write outputs to {}", out.display()))?;
    tracing::info!(out = %out.display(), generated_at = %generated_at, "Public guides written");
    println!("{} {}", "Wrote".green().bold(), out.display());

    Ok(exit::SUCCESS)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::from(exit::FATAL)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags() {
        let cli = Cli::try_parse_from(["build_public_guides", "--out", "/tmp/out", "--check-only"]).unwrap();
        assert_eq!(cli.out, Some(PathBuf::from("/tmp/out")));
        assert!(cli.check_only);
        assert!(cli.kb_root.is_none());
    }
}
