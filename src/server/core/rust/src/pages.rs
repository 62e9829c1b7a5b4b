/* src/server/core/rust/src/pages.rs */

use std::collections::BTreeMap;
use std::sync::Arc;

use stitch_engine::{
  AssembleOptions, AssembledPage, Assembler, EngineError, PageBody, PageData, Registry, Request,
  RouteTable,
};

/// One servable path, fixed at build time.
#[derive(Debug, Clone, PartialEq)]
pub struct PageDef {
  /// Route pattern, e.g. "/post/{id}" or "/files/*"
  pub path: String,
  pub layout: String,
  pub body: PageBody,
  pub page_data: PageData,
  pub requests: Vec<Request>,
  pub cacheable: bool,
}

impl From<AssembledPage> for PageDef {
  fn from(page: AssembledPage) -> Self {
    Self {
      path: page.path,
      layout: page.layout,
      body: page.body,
      page_data: page.page_data,
      requests: page.requests,
      cacheable: page.cacheable,
    }
  }
}

impl PageDef {
  /// Catch-all paths end in `*` and match every path under their prefix.
  pub fn is_prefix(&self) -> bool {
    self.path.ends_with('*')
  }

  /// The path with a trailing `*` removed.
  pub fn prefix(&self) -> &str {
    self.path.strip_suffix('*').unwrap_or(&self.path)
  }

  /// Cacheable and independent of any request data.
  pub fn is_static(&self) -> bool {
    self.cacheable && self.requests.is_empty()
  }

  pub fn template(&self) -> Option<&str> {
    match &self.body {
      PageBody::Template(t) => Some(t),
      PageBody::Redirect(_) => None,
    }
  }

  pub fn redirect(&self) -> Option<&str> {
    match &self.body {
      PageBody::Redirect(to) => Some(to),
      PageBody::Template(_) => None,
    }
  }
}

/// Every built page keyed by path. Read-only once built.
pub type PageSet = BTreeMap<String, Arc<PageDef>>;

/// What to do when a single path fails to assemble.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BuildPolicy {
  /// Abort the whole build on the first error.
  #[default]
  Strict,
  /// Skip the failing path and keep building. Containment cycles,
  /// parse errors and duplicates still abort.
  Lenient,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedPath {
  pub path: String,
  pub error: EngineError,
}

#[derive(Debug, Clone, Default)]
pub struct BuildReport {
  pub pages: PageSet,
  pub redirects: usize,
  pub skipped: Vec<SkippedPath>,
}

/// Assemble every flattened path into a page set.
pub fn build_pages(
  registry: &Registry,
  table: &RouteTable,
  options: AssembleOptions,
  policy: BuildPolicy,
) -> Result<BuildReport, EngineError> {
  let assembler = Assembler::new(registry, options);
  assembler.check_components()?;

  let mut report = BuildReport::default();
  for path in table.paths() {
    match assembler.assemble_path(table, path) {
      Ok(page) => {
        if matches!(page.body, PageBody::Redirect(_)) {
          report.redirects += 1;
        }
        report.pages.insert(path.to_string(), Arc::new(PageDef::from(page)));
      }
      Err(error) if policy == BuildPolicy::Lenient && !error.is_build_fatal() => {
        tracing::warn!(path = %path, error = %error, "skipping path");
        report.skipped.push(SkippedPath { path: path.to_string(), error });
      }
      Err(error) => return Err(error),
    }
  }

  tracing::info!(
    pages = report.pages.len(),
    redirects = report.redirects,
    skipped = report.skipped.len(),
    "page set built"
  );
  Ok(report)
}

#[cfg(test)]
mod tests {
  use serde_json::json;
  use stitch_engine::{ComponentOptions, Route};

  use super::*;

  fn registry() -> Registry {
    let mut registry = Registry::new();
    for (name, raw) in [
      ("index", "<body><router-outlet></router-outlet></body>"),
      ("home", "<h1>{{title}}</h1>"),
      ("files", "<pre>{{query.path}}</pre>"),
    ] {
      registry.register(name, raw, ComponentOptions::default()).unwrap();
    }
    registry
  }

  fn routes(value: serde_json::Value) -> RouteTable {
    let routes: Vec<Route> = serde_json::from_value(value).unwrap();
    RouteTable::flatten(routes)
  }

  #[test]
  fn builds_every_path() {
    let table = routes(json!([
      {"path": "/", "component": "home", "cache": true},
      {"path": "/files/*", "component": "files"},
      {"path": "/old", "redirect": "/"}
    ]));
    let report =
      build_pages(&registry(), &table, AssembleOptions::default(), BuildPolicy::Strict).unwrap();
    assert_eq!(report.pages.len(), 3);
    assert_eq!(report.redirects, 1);

    let home = &report.pages["/"];
    assert!(home.is_static());
    assert_eq!(
      home.template(),
      Some("<body><router-outlet><home><h1>{{title}}</h1></home></router-outlet></body>")
    );

    let files = &report.pages["/files/*"];
    assert!(files.is_prefix());
    assert_eq!(files.prefix(), "/files/");
    assert!(!files.is_static());

    assert_eq!(report.pages["/old"].redirect(), Some("/"));
  }

  #[test]
  fn strict_aborts_on_missing_component() {
    let table = routes(json!([
      {"path": "/", "component": "home"},
      {"path": "/ghost", "component": "ghost"}
    ]));
    let err = build_pages(&registry(), &table, AssembleOptions::default(), BuildPolicy::Strict)
      .unwrap_err();
    let EngineError::MissingComponent { component, .. } = err else {
      panic!("expected missing component");
    };
    assert_eq!(component, "ghost");
  }

  #[test]
  fn lenient_skips_failing_path() {
    let table = routes(json!([
      {"path": "/", "component": "home"},
      {"path": "/ghost", "component": "ghost"}
    ]));
    let report =
      build_pages(&registry(), &table, AssembleOptions::default(), BuildPolicy::Lenient).unwrap();
    assert_eq!(report.pages.keys().collect::<Vec<_>>(), vec!["/"]);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].path, "/ghost");
  }

  #[test]
  fn lenient_still_aborts_on_cycles() {
    let mut registry = registry();
    registry.register("echo-box", "<echo-box></echo-box>", ComponentOptions::default()).unwrap();
    let table = routes(json!([{"path": "/", "component": "home"}]));
    let err = build_pages(&registry, &table, AssembleOptions::default(), BuildPolicy::Lenient)
      .unwrap_err();
    assert!(err.is_build_fatal());
  }
}
