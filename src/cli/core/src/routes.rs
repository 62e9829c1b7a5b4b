/* src/cli/core/src/routes.rs */

// `stitch routes` command: prints every flattened path with its render plan.

use std::path::Path;

use anyhow::Result;
use stitch_engine::{Assembler, RouteTable};

use crate::config::StitchConfig;
use crate::load::load_project;
use crate::ui;

pub fn run_routes(config: &StitchConfig, base_dir: &Path) -> Result<()> {
  let project = load_project(&config.manifest_path(base_dir))?;
  let assembler = Assembler::new(&project.registry, config.assemble_options());

  if project.table.is_empty() {
    ui::warn("no routes declared");
    return Ok(());
  }
  for path in project.table.paths() {
    ui::route_line(path, &describe_plan(&project.table, &assembler, path));
  }
  ui::blank();
  ui::ok(&format!("{} paths", project.table.len()));
  Ok(())
}

/// `layout > component > component@outlet`, or `-> target` at a redirect.
fn describe_plan(table: &RouteTable, assembler: &Assembler<'_>, path: &str) -> String {
  let plan = table.plan_routes(path);
  let default_outlet = assembler.options().default_outlet.as_str();
  let mut parts = vec![assembler.layout_name(&plan).to_string()];
  for route in &plan {
    if let Some(target) = route.redirect() {
      parts.push(format!("-> {target}"));
      break;
    }
    let Some(component) = route.component() else { continue };
    let outlet = route.outlet(default_outlet);
    if outlet == default_outlet {
      parts.push(component.to_string());
    } else {
      parts.push(format!("{component}@{outlet}"));
    }
  }
  parts.join(" > ")
}
