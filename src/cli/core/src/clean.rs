/* src/cli/core/src/clean.rs */

// `stitch clean` command: removes the build output directory.

use std::path::Path;

use anyhow::{Context, Result};

use crate::config::StitchConfig;
use crate::ui;

pub fn run_clean(config: &StitchConfig, base_dir: &Path) -> Result<()> {
  ui::arrow("cleaning project");
  delete_dir_if_exists(&config.out_dir(base_dir))?;
  ui::ok("clean complete");
  Ok(())
}

fn delete_dir_if_exists(path: &Path) -> Result<()> {
  if path.exists() {
    std::fs::remove_dir_all(path)
      .with_context(|| format!("failed to remove {}", path.display()))?;
    ui::detail(&format!("deleted {}", path.display()));
  }
  Ok(())
}
