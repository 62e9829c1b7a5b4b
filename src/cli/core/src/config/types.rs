/* src/cli/core/src/config/types.rs */

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use serde::Deserialize;
use stitch_engine::{AssembleOptions, DEFAULT_LAYOUT, DEFAULT_OUTLET};
use stitch_server::BuildPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct StitchConfig {
  pub project: ProjectConfig,
  #[serde(default)]
  pub build: BuildSection,
  #[serde(default)]
  pub compile: CompileSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
  pub name: String,
  /// Manifest JSON, relative to the config file.
  #[serde(default = "default_manifest")]
  pub manifest: String,
}

fn default_manifest() -> String {
  "pages.json".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuildSection {
  #[serde(default = "default_out_dir")]
  pub out_dir: String,
  /// `false` keeps building when a single path fails to assemble.
  #[serde(default = "default_strict")]
  pub strict: bool,
  #[serde(default = "default_layout")]
  pub default_layout: String,
  #[serde(default = "default_outlet")]
  pub default_outlet: String,
}

impl Default for BuildSection {
  fn default() -> Self {
    Self {
      out_dir: default_out_dir(),
      strict: default_strict(),
      default_layout: default_layout(),
      default_outlet: default_outlet(),
    }
  }
}

fn default_out_dir() -> String {
  ".stitch/output".to_string()
}

fn default_strict() -> bool {
  true
}

fn default_layout() -> String {
  DEFAULT_LAYOUT.to_string()
}

fn default_outlet() -> String {
  DEFAULT_OUTLET.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompileSection {
  /// Written inside `build.out_dir`.
  #[serde(default = "default_out_file")]
  pub out_file: String,
  #[serde(default = "default_define_fn")]
  pub define_fn: String,
}

impl Default for CompileSection {
  fn default() -> Self {
    Self { out_file: default_out_file(), define_fn: default_define_fn() }
  }
}

fn default_out_file() -> String {
  "components.js".to_string()
}

fn default_define_fn() -> String {
  "define".to_string()
}

impl StitchConfig {
  pub fn validate(&self) -> Result<()> {
    if self.project.name.trim().is_empty() {
      bail!("project.name must not be empty");
    }
    if self.build.default_layout.trim().is_empty() {
      bail!("build.default_layout must not be empty");
    }
    if self.build.default_outlet.trim().is_empty() {
      bail!("build.default_outlet must not be empty");
    }
    if self.compile.define_fn.trim().is_empty() {
      bail!("compile.define_fn must not be empty");
    }
    Ok(())
  }

  pub fn policy(&self) -> BuildPolicy {
    if self.build.strict { BuildPolicy::Strict } else { BuildPolicy::Lenient }
  }

  pub fn assemble_options(&self) -> AssembleOptions {
    AssembleOptions {
      default_layout: self.build.default_layout.clone(),
      default_outlet: self.build.default_outlet.clone(),
    }
  }

  pub fn manifest_path(&self, base_dir: &Path) -> PathBuf {
    base_dir.join(&self.project.manifest)
  }

  pub fn out_dir(&self, base_dir: &Path) -> PathBuf {
    base_dir.join(&self.build.out_dir)
  }
}
