/* src/cli/core/src/main.rs */

mod build;
mod clean;
mod compile;
mod config;
mod load;
mod routes;
mod ui;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use config::{StitchConfig, find_stitch_config, load_stitch_config};

const VERBOSE_FILTER: &str = "stitch_engine=debug,stitch_server=debug,stitch_cli=debug";

#[derive(Parser)]
#[command(name = "stitch", about = "Build-time page composer")]
struct Cli {
  /// Path to stitch.toml (auto-detected if omitted)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,
  /// Log engine events to stderr (RUST_LOG takes precedence)
  #[arg(short, long, global = true)]
  verbose: bool,
  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Assemble every route into page templates and a route manifest
  Build {
    /// Skip paths that fail to assemble instead of aborting
    #[arg(long)]
    lenient: bool,
  },
  /// List every flattened path with its render plan
  Routes,
  /// Compile component templates into a JS module
  Compile,
  /// Remove the build output directory
  Clean,
}

fn init_tracing(verbose: bool) {
  let fallback = if verbose { VERBOSE_FILTER } else { "warn" };
  tracing_subscriber::registry()
    .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback.into()))
    .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
    .init();
}

/// Resolve config path (explicit or auto-detected) and parse it
fn resolve_config(explicit: Option<PathBuf>) -> Result<(PathBuf, StitchConfig)> {
  let path = match explicit {
    Some(p) => p,
    None => {
      let cwd = std::env::current_dir().context("failed to get cwd")?;
      find_stitch_config(&cwd)?
    }
  };
  let config = load_stitch_config(&path)?;
  Ok((path, config))
}

fn run(cli: Cli) -> Result<()> {
  let (config_path, mut config) = resolve_config(cli.config)?;
  let base_dir = config_path.parent().unwrap_or(Path::new(".")).to_path_buf();
  tracing::debug!(
    config = %config_path.display(),
    project = %config.project.name,
    "config loaded"
  );

  match cli.command {
    Command::Build { lenient } => {
      if lenient {
        config.build.strict = false;
      }
      ui::banner("build");
      build::run_build(&config, &base_dir)?;
    }
    Command::Routes => {
      ui::banner("routes");
      routes::run_routes(&config, &base_dir)?;
    }
    Command::Compile => {
      ui::banner("compile");
      compile::run_compile(&config, &base_dir)?;
    }
    Command::Clean => {
      clean::run_clean(&config, &base_dir)?;
    }
  }
  Ok(())
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  init_tracing(cli.verbose);

  match run(cli) {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      ui::fail(&format!("{err:#}"));
      ExitCode::FAILURE
    }
  }
}
