/* src/server/core/rust/src/context.rs */

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use stitch_engine::{Request, ResolvedRequest};

use crate::errors::PageError;
use crate::pages::PageDef;

/// What the transport layer knows about one incoming request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderRequest {
  /// Concrete request path; also the render cache key.
  pub path: String,
  /// Path variables captured by the router.
  pub vars: BTreeMap<String, String>,
  /// Query parameters of the incoming URL, in order.
  pub query: Vec<(String, String)>,
}

impl RenderRequest {
  pub fn new(path: impl Into<String>) -> Self {
    Self { path: path.into(), ..Self::default() }
  }

  pub fn var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.vars.insert(name.into(), value.into());
    self
  }

  pub fn query_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.query.push((name.into(), value.into()));
    self
  }
}

/// Template context under construction:
/// `{storage, <page data>, alternate, query, data, contextObject}`.
pub struct PageContext {
  fields: Map<String, Value>,
  vars: BTreeMap<String, String>,
  query: BTreeMap<String, String>,
  data: Option<Vec<Value>>,
}

impl PageContext {
  pub fn new(storage: &Value, page: &PageDef, request: &RenderRequest) -> Self {
    let mut fields = Map::new();
    fields.insert("storage".to_string(), storage.clone());
    for (key, value) in &page.page_data {
      fields.insert(key.clone(), value.to_json());
    }
    fields.insert("alternate".to_string(), Value::String(alternate_path(&request.path)));
    Self { fields, vars: request.vars.clone(), query: request.vars.clone(), data: None }
  }

  /// Fill placeholders of every request. Names used along the way are added to `query`.
  pub fn resolve_requests(&mut self, requests: &[Request]) -> Vec<ResolvedRequest> {
    requests
      .iter()
      .map(|request| {
        let resolved = request.resolve(&self.vars);
        for (name, value) in &resolved.used {
          self.query.insert(name.clone(), value.clone());
        }
        resolved
      })
      .collect()
  }

  pub fn set_data(&mut self, data: Vec<Value>) {
    self.data = Some(data);
  }

  pub fn finish(mut self) -> Result<Value, PageError> {
    let query = self.query.into_iter().map(|(k, v)| (k, Value::String(v))).collect();
    self.fields.insert("query".to_string(), Value::Object(query));
    if let Some(data) = self.data {
      self.fields.insert("data".to_string(), Value::Array(data));
    }
    let snapshot = serde_json::to_string(&self.fields)?;
    self.fields.insert("contextObject".to_string(), Value::String(snapshot));
    Ok(Value::Object(self.fields))
  }
}

/// Request path without a leading two-letter locale segment: `/en/about` -> `/about`.
/// Paths without one come back unchanged.
fn alternate_path(path: &str) -> String {
  let mut segments = path.split('/');
  let _root = segments.next();
  match segments.next() {
    Some(locale) if locale.len() == 2 => format!("/{}", segments.collect::<Vec<_>>().join("/")),
    _ => path.to_string(),
  }
}
