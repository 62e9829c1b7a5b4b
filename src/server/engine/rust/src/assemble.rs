/* src/server/engine/rust/src/assemble.rs */

use std::collections::HashSet;

use crate::component::{Component, Registry};
use crate::dom::{Document, NodeId, NodeKind};
use crate::error::{EngineError, Result};
use crate::marker::{self, CONTENT_SENTINEL, TagKind};
use crate::route::{DEFAULT_OUTLET, PlannedRoute, Request, RouteId, RouteTable};
use crate::value::PageData;

pub const DEFAULT_LAYOUT: &str = "index";

#[derive(Debug, Clone)]
pub struct AssembleOptions {
  /// Layout used when no route in a plan names one.
  pub default_layout: String,
  /// Outlet used by routes that leave `outlet` unset.
  pub default_outlet: String,
}

impl Default for AssembleOptions {
  fn default() -> Self {
    Self { default_layout: DEFAULT_LAYOUT.to_string(), default_outlet: DEFAULT_OUTLET.to_string() }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageBody {
  /// Tag-restored template, ready for the template executor.
  Template(String),
  /// The plan hit a redirect route; no template was produced.
  Redirect(String),
}

/// Result of assembling one path's plan.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledPage {
  pub path: String,
  pub layout: String,
  pub body: PageBody,
  /// Page data of the last applied route.
  pub page_data: PageData,
  /// Requests of the last applied route.
  pub requests: Vec<Request>,
  pub cacheable: bool,
  /// Route ids in the order they were applied.
  pub applied: Vec<RouteId>,
}

/// Borrowed view of some nodes in another document, used as a component's content.
#[derive(Clone, Copy)]
struct Content<'d> {
  doc: &'d Document,
  parent: NodeId,
}

pub struct Assembler<'r> {
  registry: &'r Registry,
  options: AssembleOptions,
}

impl<'r> Assembler<'r> {
  pub fn new(registry: &'r Registry, options: AssembleOptions) -> Self {
    Self { registry, options }
  }

  pub fn options(&self) -> &AssembleOptions {
    &self.options
  }

  /// First layout named along the plan, else the default.
  pub fn layout_name<'p>(&'p self, plan: &[&'p PlannedRoute]) -> &'p str {
    plan.iter().find_map(|route| route.layout()).unwrap_or(self.options.default_layout.as_str())
  }

  /// Assemble the plan stored for `path`, choosing its layout.
  pub fn assemble_path(&self, table: &RouteTable, path: &str) -> Result<AssembledPage> {
    let plan = table.plan_routes(path);
    let layout_name = self.layout_name(&plan);
    let layout = self.registry.lookup(layout_name).ok_or_else(|| EngineError::MissingLayout {
      layout: layout_name.to_string(),
      path: path.to_string(),
    })?;
    self.assemble(layout, path, &plan)
  }

  pub fn assemble(
    &self,
    layout: &Component,
    path: &str,
    plan: &[&PlannedRoute],
  ) -> Result<AssembledPage> {
    self.assemble_with_content(layout, path, plan, "")
  }

  /// Assemble `plan` into a copy of `layout`, then put `content` in the layout's content slot.
  pub fn assemble_with_content(
    &self,
    layout: &Component,
    path: &str,
    plan: &[&PlannedRoute],
    content: &str,
  ) -> Result<AssembledPage> {
    let mut stack = vec![layout.name.clone()];
    let mut doc = layout.document.clone();
    let root = doc.root();
    self.expand(&mut doc, root, &mut stack)?;

    let mut page = AssembledPage {
      path: path.to_string(),
      layout: layout.name.clone(),
      body: PageBody::Template(String::new()),
      page_data: PageData::new(),
      requests: Vec::new(),
      cacheable: false,
      applied: Vec::new(),
    };
    let mut done: HashSet<RouteId> = HashSet::new();
    let mut filled: HashSet<NodeId> = HashSet::new();
    let mut redirect = None;

    for route in plan {
      if !done.insert(route.id) {
        continue;
      }
      page.applied.push(route.id);
      page.cacheable |= route.cacheable;
      if let Some(target) = route.redirect() {
        redirect = Some(target.to_string());
        break;
      }
      // Each applied route replaces what its ancestors declared
      page.page_data.clone_from(&route.page_data);
      page.requests.clone_from(&route.requests);

      let Some(name) = route.component() else { continue };
      let component = self.registry.lookup(name).ok_or_else(|| EngineError::MissingComponent {
        component: name.to_string(),
        route_path: route.path.clone(),
      })?;
      let outlet_name = route.outlet(&self.options.default_outlet);
      let outlet = find_outlet(&doc, outlet_name, &filled).ok_or_else(|| {
        EngineError::OutletNotFound { outlet: outlet_name.to_string(), path: path.to_string() }
      })?;
      self.place_routed(&mut doc, outlet, component, &mut stack)?;
      filled.insert(outlet);
    }

    if let Some(target) = redirect {
      tracing::debug!(path = %path, target = %target, "assembled redirect");
      page.body = PageBody::Redirect(target);
      return Ok(page);
    }

    let content_doc = Document::parse(&marker::encode(content))
      .map_err(|e| EngineError::Parse { source_path: path.to_string(), message: e.to_string() })?;
    fill_content(&mut doc, Content { doc: &content_doc, parent: content_doc.root() });

    page.body = PageBody::Template(marker::decode(&doc.serialize()));
    tracing::debug!(
      path = %path,
      layout = %page.layout,
      routes = page.applied.len(),
      "assembled page"
    );
    Ok(page)
  }

  /// Instantiate every registered component once, so containment cycles fail at build time.
  pub fn check_components(&self) -> Result<()> {
    let empty = Document::new();
    for component in self.registry.components() {
      let mut stack = Vec::new();
      self.instantiate(component, Content { doc: &empty, parent: empty.root() }, &mut stack)?;
    }
    Ok(())
  }

  /// Replace every registered component element under `node` with its assembled template.
  fn expand(&self, doc: &mut Document, node: NodeId, stack: &mut Vec<String>) -> Result<()> {
    let children = doc.children(node).to_vec();
    for child in children {
      let Some(tag) = doc.tag(child) else { continue };
      let Some(component) = self.registry.lookup(tag) else {
        self.expand(doc, child, stack)?;
        continue;
      };
      if stack.iter().any(|open| open.eq_ignore_ascii_case(&component.name)) {
        let mut chain = stack.clone();
        chain.push(component.name.clone());
        return Err(EngineError::SelfContainment {
          component: component.name.clone(),
          chain: chain.join(" -> "),
        });
      }

      // Inner markup belongs to the enclosing scope
      self.expand(doc, child, stack)?;
      if !component.render {
        doc.set_children(child, Vec::new());
        continue;
      }
      let instance = self.instantiate(component, Content { doc: &*doc, parent: child }, stack)?;
      let nodes = doc.graft(&instance, instance.root());
      if component.omit_tags {
        doc.replace_with(child, nodes);
      } else {
        doc.set_children(child, nodes);
      }
    }
    Ok(())
  }

  /// A fresh, fully expanded copy of `component` with `content` in its content slot.
  fn instantiate(
    &self,
    component: &Component,
    content: Content<'_>,
    stack: &mut Vec<String>,
  ) -> Result<Document> {
    let mut instance = component.document.clone();
    let root = instance.root();
    stack.push(component.name.clone());
    let expanded = self.expand(&mut instance, root, stack);
    stack.pop();
    expanded?;
    fill_content(&mut instance, content);
    Ok(instance)
  }

  /// Put a routed component into an outlet element or in place of an outlet marker.
  fn place_routed(
    &self,
    doc: &mut Document,
    outlet: NodeId,
    component: &Component,
    stack: &mut Vec<String>,
  ) -> Result<()> {
    let is_element = doc.element(outlet).is_some();
    let nodes = if !component.render {
      vec![doc.create_element(&component.name)]
    } else {
      let empty = Document::new();
      let content = if is_element {
        Content { doc: &*doc, parent: outlet }
      } else {
        Content { doc: &empty, parent: empty.root() }
      };
      let instance = self.instantiate(component, content, stack)?;
      let inner = doc.graft(&instance, instance.root());
      if component.omit_tags {
        inner
      } else {
        let wrapper = doc.create_element(&component.name);
        doc.set_children(wrapper, inner);
        vec![wrapper]
      }
    };

    if is_element {
      doc.set_children(outlet, nodes);
    } else {
      doc.replace_with(outlet, nodes);
    }
    Ok(())
  }
}

/// First outlet in document order: an unfilled `<name>` element or a `{{> name}}` marker.
fn find_outlet(doc: &Document, outlet: &str, filled: &HashSet<NodeId>) -> Option<NodeId> {
  doc.descendants(doc.root()).into_iter().find(|&id| match &doc.node(id).kind {
    NodeKind::Element(el) => !filled.contains(&id) && el.tag.eq_ignore_ascii_case(outlet),
    NodeKind::Comment(body) => marker::marker_tag(body)
      .is_some_and(|tag| tag.kind == TagKind::Partial && tag.name == outlet),
    _ => false,
  })
}

/// Replace every content sentinel in `doc` with a copy of `content`.
/// Sentinels in attributes and raw text (`<script>`, `<style>`) get the serialized markup.
/// Sentinels arriving with `content` itself are left for the enclosing level.
fn fill_content(doc: &mut Document, content: Content<'_>) {
  let mut sentinels = Vec::new();
  let mut attr_hosts = Vec::new();
  let mut raw_texts = Vec::new();
  for id in doc.descendants(doc.root()) {
    match &doc.node(id).kind {
      NodeKind::Comment(body) if marker::is_content_sentinel(body) => sentinels.push(id),
      NodeKind::Element(el) if el.attrs.contains(CONTENT_SENTINEL) => attr_hosts.push(id),
      NodeKind::Text(text) if text.contains(CONTENT_SENTINEL) => raw_texts.push(id),
      _ => {}
    }
  }

  if !attr_hosts.is_empty() || !raw_texts.is_empty() {
    let text = content.doc.serialize_children(content.parent);
    for id in attr_hosts {
      doc.map_attrs(id, |attrs| attrs.replace(CONTENT_SENTINEL, &text));
    }
    for id in raw_texts {
      doc.map_text(id, |raw| raw.replace(CONTENT_SENTINEL, &text));
    }
  }
  for id in sentinels {
    let nodes = doc.graft(content.doc, content.parent);
    doc.replace_with(id, nodes);
  }
}
