/* src/server/engine/rust/src/route.rs */

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::value::PageData;

pub const DEFAULT_OUTLET: &str = "router-outlet";

/// Index into `RouteTable::routes`, assigned in pre-order during flattening.
pub type RouteId = usize;

// -- Manifest shape --

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Route {
  pub path: String,
  pub component: Option<String>,
  pub outlet: Option<String>,
  pub layout: Option<String>,
  pub children: Vec<Route>,
  #[serde(rename = "page")]
  pub page_data: PageData,
  pub redirect: Option<String>,
  #[serde(rename = "cache")]
  pub cacheable: bool,
  pub requests: Vec<Request>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
  pub url: String,
  #[serde(default = "default_method")]
  pub method: String,
  #[serde(default)]
  pub headers: BTreeMap<String, String>,
  /// Raw JSON payload. A string value is sent as-is, anything else is serialized.
  #[serde(default)]
  pub body: Option<serde_json::Value>,
}

fn default_method() -> String {
  "GET".to_string()
}

/// A request with every `$name` placeholder filled from path variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRequest {
  pub url: String,
  pub method: String,
  pub headers: BTreeMap<String, String>,
  pub body: Option<String>,
  /// Placeholder names seen during resolution, with the value used.
  pub used: BTreeMap<String, String>,
}

fn placeholder_regex() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  RE.get_or_init(|| Regex::new(r"\$(\w+)").unwrap())
}

impl Request {
  pub fn body_text(&self) -> Option<String> {
    match &self.body {
      None | Some(serde_json::Value::Null) => None,
      Some(serde_json::Value::String(s)) => Some(s.clone()),
      Some(other) => Some(other.to_string()),
    }
  }

  /// Fill `$name` placeholders in the URL and body. Unknown names become empty.
  pub fn resolve(&self, vars: &BTreeMap<String, String>) -> ResolvedRequest {
    let mut used = BTreeMap::new();
    let mut fill = |text: &str| {
      placeholder_regex()
        .replace_all(text, |caps: &Captures<'_>| {
          let value = vars.get(&caps[1]).cloned().unwrap_or_default();
          used.insert(caps[1].to_string(), value.clone());
          value
        })
        .into_owned()
    };
    let url = fill(&self.url);
    let body = self.body_text().map(|body| fill(&body));
    ResolvedRequest {
      url,
      method: self.method.clone(),
      headers: self.headers.clone(),
      body,
      used,
    }
  }
}

impl Route {
  fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|s| !s.is_empty())
  }
}

// -- Flattened form --

/// A route after flattening: manifest fields plus its id, full path, and ancestors.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedRoute {
  pub id: RouteId,
  /// Concrete path this route was mounted at.
  pub path: String,
  /// The route's own path segment as written.
  pub pattern: String,
  pub component: Option<String>,
  pub outlet: Option<String>,
  pub layout: Option<String>,
  pub page_data: PageData,
  pub redirect: Option<String>,
  pub cacheable: bool,
  pub requests: Vec<Request>,
  pub parents: Vec<RouteId>,
  pub has_children: bool,
}

impl PlannedRoute {
  pub fn component(&self) -> Option<&str> {
    Route::non_empty(self.component.as_ref())
  }

  pub fn layout(&self) -> Option<&str> {
    Route::non_empty(self.layout.as_ref())
  }

  pub fn redirect(&self) -> Option<&str> {
    Route::non_empty(self.redirect.as_ref())
  }

  /// Outlet name, falling back to `default` when unset or empty.
  pub fn outlet<'a>(&'a self, default: &'a str) -> &'a str {
    Route::non_empty(self.outlet.as_ref()).unwrap_or(default)
  }
}

/// Every route in the tree plus the render plan of every concrete path.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
  routes: Vec<PlannedRoute>,
  plans: BTreeMap<String, Vec<RouteId>>,
}

impl RouteTable {
  /// Flatten a route tree into per-path plans, ancestors first and leaf last.
  pub fn flatten(routes: Vec<Route>) -> Self {
    let mut table = Self::default();
    for route in routes {
      table.visit(route, "/", &[]);
    }
    for (path, plan) in &table.plans {
      tracing::debug!(path = %path, routes = plan.len(), "flattened path");
    }
    table
  }

  fn visit(&mut self, route: Route, base: &str, parents: &[RouteId]) {
    let id = self.routes.len();
    let path = join_path(base, &route.path);
    let has_children = !route.children.is_empty();

    self.routes.push(PlannedRoute {
      id,
      path: path.clone(),
      pattern: route.path,
      component: route.component,
      outlet: route.outlet,
      layout: route.layout,
      page_data: route.page_data,
      redirect: route.redirect,
      cacheable: route.cacheable,
      requests: route.requests,
      parents: parents.to_vec(),
      has_children,
    });

    let bucket = self.plans.entry(path.clone()).or_default();
    bucket.extend_from_slice(parents);
    // A route with children only renders as an ancestor of a deeper path
    if !has_children {
      bucket.push(id);
      return;
    }

    let mut chain = parents.to_vec();
    chain.push(id);
    for child in route.children {
      self.visit(child, &path, &chain);
    }
  }

  pub fn route(&self, id: RouteId) -> Option<&PlannedRoute> {
    self.routes.get(id)
  }

  pub fn routes(&self) -> &[PlannedRoute] {
    &self.routes
  }

  pub fn plan(&self, path: &str) -> Option<&[RouteId]> {
    self.plans.get(path).map(Vec::as_slice)
  }

  /// Resolve a plan into route references, in plan order.
  pub fn plan_routes(&self, path: &str) -> Vec<&PlannedRoute> {
    self.plan(path).unwrap_or_default().iter().filter_map(|&id| self.routes.get(id)).collect()
  }

  pub fn plans(&self) -> impl Iterator<Item = (&str, &[RouteId])> {
    self.plans.iter().map(|(path, plan)| (path.as_str(), plan.as_slice()))
  }

  pub fn paths(&self) -> impl Iterator<Item = &str> {
    self.plans.keys().map(String::as_str)
  }

  pub fn is_empty(&self) -> bool {
    self.plans.is_empty()
  }

  pub fn len(&self) -> usize {
    self.plans.len()
  }
}

/// Join a route segment onto a base path, lexically cleaned.
/// A segment longer than `/` that ends in `/` keeps its trailing slash.
pub fn join_path(base: &str, segment: &str) -> String {
  let joined = match (base.is_empty(), segment.is_empty()) {
    (true, true) => return String::new(),
    (true, false) => segment.to_string(),
    (false, true) => base.to_string(),
    (false, false) => format!("{base}/{segment}"),
  };
  let mut path = clean_path(&joined);
  if segment.len() > 1 && segment.ends_with('/') && !path.ends_with('/') {
    path.push('/');
  }
  path
}

fn clean_path(path: &str) -> String {
  let rooted = path.starts_with('/');
  let mut parts: Vec<&str> = Vec::new();
  for part in path.split('/') {
    match part {
      "" | "." => {}
      ".." => {
        if parts.last().is_some_and(|last| *last != "..") {
          parts.pop();
        } else if !rooted {
          parts.push("..");
        }
      }
      _ => parts.push(part),
    }
  }
  let body = parts.join("/");
  match (rooted, body.is_empty()) {
    (true, _) => format!("/{body}"),
    (false, true) => ".".to_string(),
    (false, false) => body,
  }
}
