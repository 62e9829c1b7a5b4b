/* src/cli/core/src/compile.rs */

// `stitch compile` command: turns every component template into a JS
// template-literal function and writes them as one module.

use std::path::Path;

use anyhow::{Context, Result};
use stitch_engine::{Registry, compile_module};

use crate::config::StitchConfig;
use crate::load::load_project;
use crate::ui::{self, DIM, RESET};

pub fn run_compile(config: &StitchConfig, base_dir: &Path) -> Result<()> {
  let project = load_project(&config.manifest_path(base_dir))?;
  let target = config.out_dir(base_dir).join(&config.compile.out_file);

  ui::arrow(&format!("compiling {} components", project.registry.len()));
  let size = write_module(&project.registry, &config.compile.define_fn, &target)?;
  ui::detail_ok(&format!("{}  {DIM}({}){RESET}", target.display(), ui::format_size(size)));
  Ok(())
}

fn write_module(registry: &Registry, define_fn: &str, target: &Path) -> Result<u64> {
  let components = registry.components().map(|c| (c.name.as_str(), c.raw_template.as_str()));
  let module = compile_module(components, define_fn).context("failed to compile components")?;

  if let Some(parent) = target.parent() {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {}", parent.display()))?;
  }
  std::fs::write(target, &module)
    .with_context(|| format!("failed to write {}", target.display()))?;
  Ok(module.len() as u64)
}

#[cfg(test)]
mod tests {
  use stitch_engine::ComponentOptions;

  use super::*;

  #[test]
  fn writes_module_with_every_component() {
    let mut registry = Registry::new();
    registry.register("card", "<div>{{title}}</div>", ComponentOptions::default()).unwrap();
    let list = "<ul>{{#items}}<li>{{name}}</li>{{/items}}</ul>";
    registry.register("list", list, ComponentOptions::default()).unwrap();

    let tmp = tempfile::tempdir().unwrap();
    let target = tmp.path().join("out/components.js");
    let size = write_module(&registry, "registerTemplate", &target).unwrap();

    let module = std::fs::read_to_string(&target).unwrap();
    assert_eq!(size, module.len() as u64);
    assert!(module.contains("registerTemplate(\"card\", ($, partial) => {"));
    assert!(module.contains("registerTemplate(\"list\", ($, partial) => {"));
    assert!(module.contains("${$$.title}"));
    assert!(module.contains("${arr($$.items).map(($$, _i)=>`"));
  }
}
