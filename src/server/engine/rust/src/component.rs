/* src/server/engine/rust/src/component.rs */

use std::collections::BTreeMap;

use crate::compile;
use crate::dom::Document;
use crate::error::{EngineError, Result};
use crate::marker;

#[derive(Debug, Clone)]
pub struct ComponentOptions {
  /// Emit the component's template. When false only an empty `<name></name>` is placed.
  pub render: bool,
  /// Place the template without the surrounding `<name>` element.
  pub omit_tags: bool,
  pub is_layout: bool,
  pub companion_script: Option<String>,
  /// Where the template came from, for error messages.
  pub source_path: String,
}

impl Default for ComponentOptions {
  fn default() -> Self {
    Self {
      render: true,
      omit_tags: false,
      is_layout: false,
      companion_script: None,
      source_path: String::new(),
    }
  }
}

/// A parsed component. Immutable once registered.
#[derive(Debug, Clone)]
pub struct Component {
  pub name: String,
  pub raw_template: String,
  /// Tag-encoded tree; callers clone it before mutating.
  pub document: Document,
  pub companion_script: Option<String>,
  pub render: bool,
  pub omit_tags: bool,
  pub is_layout: bool,
  pub source_path: String,
}

impl Component {
  /// Body registered on the partials channel under this component's name.
  pub fn partial_body(&self) -> String {
    match (self.render, self.omit_tags) {
      (true, true) => self.raw_template.clone(),
      (true, false) => format!("<{0}>{1}</{0}>", self.name, self.raw_template),
      (false, _) => format!("<{0}></{0}>", self.name),
    }
  }
}

/// Receiver for named fragments, so a template executor can call components directly.
pub trait PartialSink {
  fn register_partial(&mut self, name: &str, body: &str);
}

impl PartialSink for BTreeMap<String, String> {
  fn register_partial(&mut self, name: &str, body: &str) {
    self.insert(name.to_string(), body.to_string());
  }
}

/// Name-keyed component store. Names match case-insensitively, like HTML tags.
#[derive(Debug, Clone, Default)]
pub struct Registry {
  components: BTreeMap<String, Component>,
  partials: BTreeMap<String, String>,
}

fn key(name: &str) -> String {
  name.to_ascii_lowercase()
}

impl Registry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Parse and store a component. Also records its partial body.
  pub fn register(&mut self, name: &str, raw: &str, options: ComponentOptions) -> Result<()> {
    let key = key(name);
    if self.components.contains_key(&key) {
      return Err(EngineError::DuplicateComponent(name.to_string()));
    }

    let parse_error = |message: String| EngineError::Parse {
      source_path: if options.source_path.is_empty() {
        name.to_string()
      } else {
        options.source_path.clone()
      },
      message,
    };
    compile::check_blocks(raw).map_err(|e| parse_error(e.to_string()))?;
    let document = Document::parse(&marker::encode(raw)).map_err(|e| parse_error(e.to_string()))?;

    let component = Component {
      name: name.to_string(),
      raw_template: raw.to_string(),
      document,
      companion_script: options.companion_script,
      render: options.render,
      omit_tags: options.omit_tags,
      is_layout: options.is_layout,
      source_path: options.source_path,
    };
    self.partials.insert(name.to_string(), component.partial_body());
    tracing::debug!(
      component = %name,
      render = component.render,
      omit_tags = component.omit_tags,
      layout = component.is_layout,
      "registered component"
    );
    self.components.insert(key, component);
    Ok(())
  }

  pub fn lookup(&self, name: &str) -> Option<&Component> {
    self.components.get(&key(name))
  }

  pub fn contains(&self, name: &str) -> bool {
    self.components.contains_key(&key(name))
  }

  pub fn len(&self) -> usize {
    self.components.len()
  }

  pub fn is_empty(&self) -> bool {
    self.components.is_empty()
  }

  pub fn components(&self) -> impl Iterator<Item = &Component> {
    self.components.values()
  }

  /// Components imported as page layouts.
  pub fn layouts(&self) -> impl Iterator<Item = &Component> {
    self.components.values().filter(|c| c.is_layout)
  }

  /// Partial bodies keyed by component name, as registered.
  pub fn partials(&self) -> &BTreeMap<String, String> {
    &self.partials
  }

  /// Push every partial into an executor's own registry.
  pub fn export_partials(&self, sink: &mut impl PartialSink) {
    for (name, body) in &self.partials {
      sink.register_partial(name, body);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn opts(render: bool, omit_tags: bool) -> ComponentOptions {
    ComponentOptions { render, omit_tags, ..ComponentOptions::default() }
  }

  #[test]
  fn register_and_lookup() {
    let mut registry = Registry::new();
    registry.register("nav", "<a href=\"/\">{{label}}</a>", ComponentOptions::default()).unwrap();
    let nav = registry.lookup("nav").unwrap();
    assert_eq!(nav.name, "nav");
    assert!(nav.render);
    assert_eq!(nav.document.serialize(), "<a href=\"/\"><!--stache:{{label}}--></a>");
    assert!(registry.lookup("NAV").is_some());
    assert!(registry.lookup("missing").is_none());
  }

  #[test]
  fn duplicate_is_rejected() {
    let mut registry = Registry::new();
    registry.register("nav", "a", ComponentOptions::default()).unwrap();
    let err = registry.register("Nav", "b", ComponentOptions::default()).unwrap_err();
    assert_eq!(err, EngineError::DuplicateComponent("Nav".into()));
    assert_eq!(registry.lookup("nav").unwrap().raw_template, "a");
  }

  #[test]
  fn parse_failure_names_source() {
    let mut registry = Registry::new();
    let options = ComponentOptions {
      source_path: "components/list.html".into(),
      ..ComponentOptions::default()
    };
    let err = registry.register("list", "<ul>{{#items}}</ul>", options).unwrap_err();
    let EngineError::Parse { source_path, message } = &err else { panic!("expected parse error") };
    assert_eq!(source_path, "components/list.html");
    assert!(message.contains("unclosed block"));
    assert!(err.to_string().starts_with("error parsing file: components/list.html; "));
  }

  #[test]
  fn markup_error_is_parse_error() {
    let mut registry = Registry::new();
    let err = registry.register("bad", "<div></span>", ComponentOptions::default()).unwrap_err();
    assert!(matches!(err, EngineError::Parse { ref source_path, .. } if source_path == "bad"));
    assert!(registry.is_empty());
  }

  #[test]
  fn partial_bodies_follow_flags() {
    let mut registry = Registry::new();
    registry.register("wrapped", "x", opts(true, false)).unwrap();
    registry.register("bare", "y", opts(true, true)).unwrap();
    registry.register("hidden", "z", opts(false, false)).unwrap();
    let partials = registry.partials();
    assert_eq!(partials["wrapped"], "<wrapped>x</wrapped>");
    assert_eq!(partials["bare"], "y");
    assert_eq!(partials["hidden"], "<hidden></hidden>");
  }

  #[test]
  fn export_partials_into_sink() {
    let mut registry = Registry::new();
    registry.register("nav", "n", ComponentOptions::default()).unwrap();
    let mut sink = BTreeMap::new();
    registry.export_partials(&mut sink);
    assert_eq!(sink.get("nav").map(String::as_str), Some("<nav>n</nav>"));
  }

  #[test]
  fn companion_script_is_kept() {
    let mut registry = Registry::new();
    let options = ComponentOptions {
      companion_script: Some("class Nav extends HTMLElement {}".into()),
      ..ComponentOptions::default()
    };
    registry.register("nav", "n", options).unwrap();
    assert!(registry.lookup("nav").unwrap().companion_script.as_deref().unwrap().contains("Nav"));
  }

  #[test]
  fn layouts_are_listed_apart() {
    let mut registry = Registry::new();
    let layout = ComponentOptions { is_layout: true, ..ComponentOptions::default() };
    registry.register("index", "<body></body>", layout).unwrap();
    registry.register("nav", "n", ComponentOptions::default()).unwrap();
    let layouts: Vec<&str> = registry.layouts().map(|c| c.name.as_str()).collect();
    assert_eq!(layouts, vec!["index"]);
    assert_eq!(registry.components().count(), 2);
  }
}
