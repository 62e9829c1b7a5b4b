/* src/cli/core/src/load.rs */

// Reads a page manifest from disk: component templates, companion scripts,
// and the route tree.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use stitch_engine::{Import, Manifest, Registry, RouteTable};

/// Everything a build needs, read and validated.
pub struct Project {
  pub registry: Registry,
  pub table: RouteTable,
  /// Opaque resource tree handed to templates as `storage`.
  pub resources: serde_json::Value,
  pub default_locale: String,
  /// Template-format tag carried into the route manifest.
  pub components_version: String,
}

pub fn load_project(manifest_path: &Path) -> Result<Project> {
  let content = std::fs::read_to_string(manifest_path)
    .with_context(|| format!("failed to read {}", manifest_path.display()))?;
  let mut manifest = Manifest::from_json(&content)
    .with_context(|| format!("failed to parse {}", manifest_path.display()))?;
  let base_dir = manifest_path.parent().unwrap_or(Path::new("."));

  let mut registry = Registry::new();
  for import in &manifest.imports {
    register_import(&mut registry, base_dir, import)?;
  }
  tracing::debug!(components = registry.len(), "registry loaded");

  let table = RouteTable::flatten(std::mem::take(&mut manifest.routes));
  Ok(Project {
    registry,
    table,
    resources: manifest.resources,
    default_locale: manifest.default_locale,
    components_version: manifest.components_version,
  })
}

fn register_import(registry: &mut Registry, base_dir: &Path, import: &Import) -> Result<()> {
  let template_path = resolve(base_dir, &import.template_path);
  let raw = std::fs::read_to_string(&template_path).with_context(|| {
    format!("component \"{}\": failed to read {}", import.name, template_path.display())
  })?;

  let companion = match import.component_path() {
    Some(rel) => {
      let path = resolve(base_dir, rel);
      let script = std::fs::read_to_string(&path).with_context(|| {
        format!("component \"{}\": failed to read {}", import.name, path.display())
      })?;
      Some(script)
    }
    None => None,
  };

  registry.register(&import.name, &raw, import.options(companion))?;
  Ok(())
}

fn resolve(base_dir: &Path, rel: &str) -> PathBuf {
  let path = Path::new(rel);
  if path.is_absolute() { path.to_path_buf() } else { base_dir.join(path) }
}
