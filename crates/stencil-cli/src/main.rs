//! Stencil CLI - template-driven source-code generation

use clap::{Parser, Subcommand};
use console::style;
use std::path::PathBuf;

mod commands;
mod error;
mod exit_codes;
mod source;
mod util;

use error::CliError;

#[derive(Parser)]
#[command(name = "stencil")]
#[command(version)]
#[command(about = "A template-driven source-code generator", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve modules, render templates, and write the results
    Generate {
        /// Project directory containing manifest.yaml
        #[arg(default_value = ".")]
        dir: PathBuf,

        /// Render without writing any files
        #[arg(long)]
        dry_run: bool,

        /// Do not run the modules' post-run commands
        #[arg(long)]
        skip_post_run: bool,
    },

    /// Print the resolved module set for the service manifest
    Modules {
        /// Project directory containing manifest.yaml
        #[arg(default_value = ".")]
        dir: PathBuf,
    },

    /// Show which template and module generated a file
    Describe {
        /// Generated file path, relative to the project directory
        file: String,

        /// Project directory containing stencil.lock
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Generate {
            dir,
            dry_run,
            skip_post_run,
        } => commands::generate::run(&dir, dry_run, skip_post_run),
        Commands::Modules { dir } => commands::modules::run(&dir),
        Commands::Describe { file, dir } => commands::describe::run(&dir, &file),
    };

    if let Err(err) = result {
        report(&err);
        std::process::exit(err.exit_code());
    }
}

/// Print an error; template failures get the full miette rendering with
/// source context
fn report(err: &CliError) {
    match err {
        CliError::Engine(stencil_engine::EngineError::Template(template_err)) => {
            eprintln!("{:?}", miette::Report::new((**template_err).clone()));
        }
        other => {
            eprintln!("{} {other}", style("✗").red());
        }
    }
}
