/* src/cli/core/src/build.rs */

// `stitch build` command: assembles every path and writes page templates
// plus a route manifest into the output directory.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use stitch_engine::{EngineError, PageData, Registry, Request};
use stitch_server::{BuildReport, PageDef, build_pages};

use crate::config::StitchConfig;
use crate::load::{Project, load_project};
use crate::ui::{self, DIM, RESET};

pub const ROUTE_MANIFEST: &str = "route-manifest.json";

// -- Route manifest --

#[derive(Serialize)]
struct RouteManifest<'a> {
  project: &'a str,
  #[serde(skip_serializing_if = "is_blank")]
  default_locale: &'a str,
  #[serde(skip_serializing_if = "is_blank")]
  components_version: &'a str,
  pages: BTreeMap<&'a str, PageEntry<'a>>,
  partials: BTreeMap<String, String>,
  resources: &'a serde_json::Value,
}

#[derive(Serialize)]
struct PageEntry<'a> {
  layout: &'a str,
  #[serde(skip_serializing_if = "Option::is_none")]
  template: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  redirect: Option<&'a str>,
  prefix: bool,
  cacheable: bool,
  #[serde(skip_serializing_if = "no_page_data")]
  page: &'a PageData,
  #[serde(skip_serializing_if = "no_requests")]
  requests: &'a [Request],
}

fn is_blank(value: &&str) -> bool {
  value.is_empty()
}

fn no_page_data(data: &&PageData) -> bool {
  data.is_empty()
}

fn no_requests(requests: &&[Request]) -> bool {
  requests.is_empty()
}

// -- Command --

pub fn run_build(config: &StitchConfig, base_dir: &Path) -> Result<()> {
  check_out_dir(config, base_dir)?;
  let manifest_path = config.manifest_path(base_dir);
  let out_dir = config.out_dir(base_dir);

  ui::step(1, 3, "Loading manifest");
  let project = load_project(&manifest_path)?;
  ui::detail_ok(&format!(
    "{} components ({} layouts), {} paths  {DIM}{}{RESET}",
    project.registry.len(),
    project.registry.layouts().count(),
    project.table.len(),
    manifest_path.display()
  ));

  ui::step(2, 3, "Assembling pages");
  let report =
    build_pages(&project.registry, &project.table, config.assemble_options(), config.policy())
      .map_err(|err| explain(err, &project.registry))?;
  for skipped in &report.skipped {
    ui::warn(&format!("skipped {}: {}", skipped.path, skipped.error));
  }
  ui::detail_ok(&format!("{} pages, {} redirects", report.pages.len(), report.redirects));

  ui::step(3, 3, "Writing output");
  let written = write_output(config, &project, &report, &out_dir)?;
  ui::detail_ok(&format!(
    "{ROUTE_MANIFEST}  {DIM}({}){RESET}",
    ui::format_size(written)
  ));

  ui::blank();
  if report.skipped.is_empty() {
    ui::ok(&format!("build complete: {}", out_dir.display()));
  } else {
    ui::warn(&format!("build complete with {} skipped paths", report.skipped.len()));
  }
  Ok(())
}

/// Write page templates and the route manifest. Returns the manifest size in bytes.
fn write_output(
  config: &StitchConfig,
  project: &Project,
  report: &BuildReport,
  out_dir: &Path,
) -> Result<u64> {
  let pages_dir = out_dir.join("pages");
  std::fs::create_dir_all(&pages_dir)
    .with_context(|| format!("failed to create {}", pages_dir.display()))?;

  let mut used = BTreeSet::new();
  let mut pages = BTreeMap::new();
  for (path, page) in &report.pages {
    let template = match page.template() {
      Some(template) => {
        let file = unique_filename(&mut used, path);
        let target = pages_dir.join(&file);
        std::fs::write(&target, template)
          .with_context(|| format!("failed to write {}", target.display()))?;
        Some(format!("pages/{file}"))
      }
      None => None,
    };
    pages.insert(path.as_str(), page_entry(page, template));
  }

  let mut partials = BTreeMap::new();
  project.registry.export_partials(&mut partials);

  let manifest = RouteManifest {
    project: &config.project.name,
    default_locale: &project.default_locale,
    components_version: &project.components_version,
    pages,
    partials,
    resources: &project.resources,
  };
  let json = serde_json::to_string_pretty(&manifest).context("failed to serialize manifest")?;
  let target = out_dir.join(ROUTE_MANIFEST);
  std::fs::write(&target, &json)
    .with_context(|| format!("failed to write {}", target.display()))?;
  Ok(json.len() as u64)
}

fn page_entry(page: &PageDef, template: Option<String>) -> PageEntry<'_> {
  PageEntry {
    layout: &page.layout,
    template,
    redirect: page.redirect(),
    prefix: page.is_prefix(),
    cacheable: page.cacheable,
    page: &page.page_data,
    requests: &page.requests,
  }
}

// -- Helpers --

/// Convert a path pattern to a filename: `/post/{id}` -> `post-id.html`,
/// `/files/*` -> `files-all.html`, `/` -> `index.html`
fn path_to_filename(path: &str) -> String {
  let trimmed = path.trim_matches('/');
  if trimmed.is_empty() {
    return "index.html".to_string();
  }
  let slug = trimmed.replace('/', "-").replace(['{', '}'], "").replace('*', "all");
  format!("{slug}.html")
}

/// Paths that slug to the same name get a numeric suffix.
fn unique_filename(used: &mut BTreeSet<String>, path: &str) -> String {
  let base = path_to_filename(path);
  let mut name = base.clone();
  let mut n = 2;
  while !used.insert(name.clone()) {
    name = format!("{}-{n}.html", base.trim_end_matches(".html"));
    n += 1;
  }
  name
}

fn levenshtein(a: &str, b: &str) -> usize {
  let n = b.chars().count();
  let mut prev: Vec<usize> = (0..=n).collect();
  let mut curr = vec![0; n + 1];
  for (i, ca) in a.chars().enumerate() {
    curr[0] = i + 1;
    for (j, cb) in b.chars().enumerate() {
      let cost = usize::from(ca != cb);
      curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
    }
    std::mem::swap(&mut prev, &mut curr);
  }
  prev[n]
}

fn did_you_mean<'a>(name: &str, candidates: impl Iterator<Item = &'a str>) -> Option<&'a str> {
  candidates
    .map(|c| (c, levenshtein(name, c)))
    .filter(|(_, d)| *d <= 3 && *d > 0)
    .min_by_key(|(_, d)| *d)
    .map(|(c, _)| c)
}

/// Attach a name suggestion to unknown component and layout errors.
fn explain(err: EngineError, registry: &Registry) -> anyhow::Error {
  let suggestion = match &err {
    EngineError::MissingComponent { component, .. } => {
      did_you_mean(component, registry.components().map(|c| c.name.as_str()))
    }
    EngineError::MissingLayout { layout, .. } => {
      did_you_mean(layout, registry.layouts().map(|c| c.name.as_str()))
    }
    _ => None,
  };
  match suggestion {
    Some(name) => anyhow::Error::new(err).context(format!("did you mean \"{name}\"?")),
    None => anyhow::Error::new(err),
  }
}

/// Fail early when the output directory would land on the manifest itself.
fn check_out_dir(config: &StitchConfig, base_dir: &Path) -> Result<()> {
  let out_dir = config.out_dir(base_dir);
  if config.manifest_path(base_dir).starts_with(&out_dir) {
    bail!("build.out_dir {} contains the manifest", out_dir.display());
  }
  Ok(())
}
