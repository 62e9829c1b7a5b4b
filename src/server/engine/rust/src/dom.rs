/* src/server/engine/rust/src/dom.rs */

// Arena-backed HTML tree used for outlet and component substitution.
// Nodes are addressed by index, so cloning a document is a flat Vec copy
// and substitutions never alias the registry's canonical copy.
// The parser keeps attribute text and close-tag presence verbatim, so
// `parse(x).serialize() == x` for every input it accepts.

use thiserror::Error;

pub type NodeId = usize;

const ROOT: NodeId = 0;

const VOID_ELEMENTS: &[&str] = &[
  "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
  "track", "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomError {
  #[error("unterminated comment at byte {0}")]
  UnterminatedComment(usize),
  #[error("unterminated tag <{tag}> at byte {offset}")]
  UnterminatedTag { tag: String, offset: usize },
  #[error("unexpected closing tag </{tag}> at byte {offset}")]
  UnexpectedClose { tag: String, offset: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
  Fragment,
  Element(Element),
  Text(String),
  Comment(String),
  Doctype(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
  pub tag: String,
  /// Everything between the tag name and `>` (or `/>`), as written.
  pub attrs: String,
  pub self_closing: bool,
  /// False when the source never closed the element (EOF or implied close).
  pub closed: bool,
}

impl Element {
  fn is_void(&self) -> bool {
    VOID_ELEMENTS.iter().any(|v| self.tag.eq_ignore_ascii_case(v))
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
  pub kind: NodeKind,
  pub parent: Option<NodeId>,
  pub children: Vec<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
  nodes: Vec<Node>,
}

impl Default for Document {
  fn default() -> Self {
    Self::new()
  }
}

impl Document {
  pub fn new() -> Self {
    Self { nodes: vec![Node { kind: NodeKind::Fragment, parent: None, children: Vec::new() }] }
  }

  pub fn parse(html: &str) -> Result<Self, DomError> {
    Parser { html, pos: 0, doc: Self::new(), open: vec![ROOT] }.run()
  }

  pub fn root(&self) -> NodeId {
    ROOT
  }

  pub fn node(&self, id: NodeId) -> &Node {
    &self.nodes[id]
  }

  pub fn children(&self, id: NodeId) -> &[NodeId] {
    &self.nodes[id].children
  }

  pub fn element(&self, id: NodeId) -> Option<&Element> {
    match &self.nodes[id].kind {
      NodeKind::Element(el) => Some(el),
      _ => None,
    }
  }

  pub fn tag(&self, id: NodeId) -> Option<&str> {
    self.element(id).map(|el| el.tag.as_str())
  }

  pub fn comment(&self, id: NodeId) -> Option<&str> {
    match &self.nodes[id].kind {
      NodeKind::Comment(body) => Some(body),
      _ => None,
    }
  }

  /// All nodes under `id` in document order, `id` excluded.
  pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut stack: Vec<NodeId> = self.nodes[id].children.iter().rev().copied().collect();
    while let Some(next) = stack.pop() {
      out.push(next);
      stack.extend(self.nodes[next].children.iter().rev().copied());
    }
    out
  }

  /// New detached element, serialized as `<tag></tag>`.
  pub fn create_element(&mut self, tag: &str) -> NodeId {
    self.push(NodeKind::Element(Element {
      tag: tag.to_string(),
      attrs: String::new(),
      self_closing: false,
      closed: true,
    }))
  }

  /// Swap the children of `parent`. Old children stay in the arena, detached.
  pub fn set_children(&mut self, parent: NodeId, children: Vec<NodeId>) {
    for old in std::mem::take(&mut self.nodes[parent].children) {
      self.nodes[old].parent = None;
    }
    for &child in &children {
      self.nodes[child].parent = Some(parent);
    }
    if let NodeKind::Element(el) = &mut self.nodes[parent].kind
      && !el.is_void()
    {
      el.self_closing = false;
      el.closed = true;
    }
    self.nodes[parent].children = children;
  }

  /// Put `replacement` where `id` sits in its parent. A detached `id` is left alone.
  pub fn replace_with(&mut self, id: NodeId, replacement: Vec<NodeId>) {
    let Some(parent) = self.nodes[id].parent else { return };
    let Some(index) = self.nodes[parent].children.iter().position(|&c| c == id) else { return };
    for &node in &replacement {
      self.nodes[node].parent = Some(parent);
    }
    self.nodes[id].parent = None;
    self.nodes[parent].children.splice(index..=index, replacement);
  }

  /// Deep-copy the children of `from` in `other` into this arena.
  /// Returns the new top-level ids, detached.
  pub fn graft(&mut self, other: &Document, from: NodeId) -> Vec<NodeId> {
    other.nodes[from].children.iter().map(|&child| self.copy_subtree(other, child)).collect()
  }

  fn copy_subtree(&mut self, other: &Document, id: NodeId) -> NodeId {
    let copy = self.push(other.nodes[id].kind.clone());
    let children: Vec<NodeId> =
      other.nodes[id].children.iter().map(|&child| self.copy_subtree(other, child)).collect();
    for &child in &children {
      self.nodes[child].parent = Some(copy);
    }
    self.nodes[copy].children = children;
    copy
  }

  /// Rewrite the raw attribute text of an element.
  pub fn map_attrs(&mut self, id: NodeId, f: impl FnOnce(&str) -> String) {
    if let NodeKind::Element(el) = &mut self.nodes[id].kind {
      el.attrs = f(&el.attrs);
    }
  }

  /// Rewrite the content of a text node, including raw `<script>`/`<style>` bodies.
  pub fn map_text(&mut self, id: NodeId, f: impl FnOnce(&str) -> String) {
    if let NodeKind::Text(text) = &mut self.nodes[id].kind {
      *text = f(text);
    }
  }

  fn push(&mut self, kind: NodeKind) -> NodeId {
    self.nodes.push(Node { kind, parent: None, children: Vec::new() });
    self.nodes.len() - 1
  }

  fn append(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
    let id = self.push(kind);
    self.nodes[id].parent = Some(parent);
    self.nodes[parent].children.push(id);
    id
  }

  pub fn serialize(&self) -> String {
    self.serialize_children(ROOT)
  }

  pub fn serialize_children(&self, id: NodeId) -> String {
    let mut out = String::new();
    for &child in &self.nodes[id].children {
      self.write_node(child, &mut out);
    }
    out
  }

  fn write_node(&self, id: NodeId, out: &mut String) {
    let node = &self.nodes[id];
    match &node.kind {
      NodeKind::Fragment => {
        for &child in &node.children {
          self.write_node(child, out);
        }
      }
      NodeKind::Text(text) => out.push_str(text),
      NodeKind::Comment(body) => {
        out.push_str("<!--");
        out.push_str(body);
        out.push_str("-->");
      }
      NodeKind::Doctype(body) => {
        out.push_str("<!");
        out.push_str(body);
        out.push('>');
      }
      NodeKind::Element(el) => {
        out.push('<');
        out.push_str(&el.tag);
        out.push_str(&el.attrs);
        if el.self_closing {
          out.push_str("/>");
          return;
        }
        out.push('>');
        if el.is_void() {
          return;
        }
        for &child in &node.children {
          self.write_node(child, out);
        }
        if el.closed {
          out.push_str("</");
          out.push_str(&el.tag);
          out.push('>');
        }
      }
    }
  }
}

struct Parser<'a> {
  html: &'a str,
  pos: usize,
  doc: Document,
  /// Open element stack; the root fragment is always at the bottom.
  open: Vec<NodeId>,
}

impl Parser<'_> {
  fn run(mut self) -> Result<Document, DomError> {
    while self.pos < self.html.len() {
      let rest = &self.html[self.pos..];
      if rest.starts_with("<!--") {
        self.comment()?;
      } else if rest.starts_with("</") {
        self.close_tag()?;
      } else if rest.starts_with("<!") {
        self.doctype()?;
      } else if rest.as_bytes().get(1).is_some_and(u8::is_ascii_alphabetic) && rest.starts_with('<')
      {
        self.open_tag()?;
      } else {
        self.text();
      }
    }
    // Elements still open at EOF are closed implicitly
    for &id in &self.open[1..] {
      if let NodeKind::Element(el) = &mut self.doc.nodes[id].kind {
        el.closed = false;
      }
    }
    Ok(self.doc)
  }

  fn current(&self) -> NodeId {
    self.open.last().copied().unwrap_or(ROOT)
  }

  fn text(&mut self) {
    let start = self.pos;
    // Always consume at least one byte so a lone '<' becomes text
    let skip = self.html[start..].chars().next().map_or(1, char::len_utf8);
    let end = self.html[start + skip..].find('<').map_or(self.html.len(), |rel| start + skip + rel);
    self.pos = end;
    let parent = self.current();
    // Merge with a preceding text node produced by a lone '<'
    if let Some(&last) = self.doc.nodes[parent].children.last()
      && let NodeKind::Text(existing) = &mut self.doc.nodes[last].kind
    {
      existing.push_str(&self.html[start..end]);
      return;
    }
    self.doc.append(parent, NodeKind::Text(self.html[start..end].to_string()));
  }

  fn comment(&mut self) -> Result<(), DomError> {
    let body_start = self.pos + 4;
    let Some(rel) = self.html[body_start..].find("-->") else {
      return Err(DomError::UnterminatedComment(self.pos));
    };
    let body = self.html[body_start..body_start + rel].to_string();
    self.pos = body_start + rel + 3;
    let parent = self.current();
    self.doc.append(parent, NodeKind::Comment(body));
    Ok(())
  }

  fn doctype(&mut self) -> Result<(), DomError> {
    let Some(rel) = self.html[self.pos..].find('>') else {
      return Err(DomError::UnterminatedTag { tag: "!".to_string(), offset: self.pos });
    };
    let body = self.html[self.pos + 2..self.pos + rel].to_string();
    self.pos += rel + 1;
    let parent = self.current();
    self.doc.append(parent, NodeKind::Doctype(body));
    Ok(())
  }

  fn close_tag(&mut self) -> Result<(), DomError> {
    let start = self.pos;
    let Some(rel) = self.html[start..].find('>') else {
      return Err(DomError::UnterminatedTag { tag: "/".to_string(), offset: start });
    };
    let tag = self.html[start + 2..start + rel].trim().to_string();
    self.pos = start + rel + 1;

    let position = self.open.iter().rposition(|&id| {
      self.doc.tag(id).is_some_and(|open_tag| open_tag.eq_ignore_ascii_case(&tag))
    });
    let Some(index) = position else {
      return Err(DomError::UnexpectedClose { tag, offset: start });
    };
    // Anything opened after the matching element was never closed in source
    for &id in &self.open[index + 1..] {
      if let NodeKind::Element(el) = &mut self.doc.nodes[id].kind {
        el.closed = false;
      }
    }
    self.open.truncate(index);
    Ok(())
  }

  fn open_tag(&mut self) -> Result<(), DomError> {
    let start = self.pos;
    let bytes = self.html.as_bytes();
    let mut pos = start + 1;
    let ends_name = |b: u8| b.is_ascii_whitespace() || matches!(b, b'>' | b'/');
    while pos < bytes.len() && !ends_name(bytes[pos]) {
      pos += 1;
    }
    let tag = self.html[start + 1..pos].to_string();

    // Quote-aware scan for the end of the start tag
    let attrs_start = pos;
    let mut in_quote: Option<u8> = None;
    let mut self_closing = false;
    loop {
      if pos >= bytes.len() {
        return Err(DomError::UnterminatedTag { tag, offset: start });
      }
      match in_quote {
        Some(q) if bytes[pos] == q => in_quote = None,
        Some(_) => {}
        None => match bytes[pos] {
          b'"' | b'\'' => in_quote = Some(bytes[pos]),
          b'/' if bytes.get(pos + 1) == Some(&b'>') => {
            self_closing = true;
            break;
          }
          b'>' => break,
          _ => {}
        },
      }
      pos += 1;
    }
    let attrs = self.html[attrs_start..pos].to_string();
    self.pos = if self_closing { pos + 2 } else { pos + 1 };

    let element = Element { tag: tag.clone(), attrs, self_closing, closed: true };
    let is_void = element.is_void();
    let parent = self.current();
    let id = self.doc.append(parent, NodeKind::Element(element));
    if self_closing || is_void {
      return Ok(());
    }

    if RAW_TEXT_ELEMENTS.iter().any(|raw| tag.eq_ignore_ascii_case(raw)) {
      return self.raw_text(id, &tag, start);
    }
    self.open.push(id);
    Ok(())
  }

  /// Script and style bodies are opaque text up to their closing tag.
  fn raw_text(&mut self, id: NodeId, tag: &str, offset: usize) -> Result<(), DomError> {
    let close = format!("</{}", tag.to_ascii_lowercase());
    let lower = self.html[self.pos..].to_ascii_lowercase();
    let Some(rel) = lower.find(&close) else {
      return Err(DomError::UnterminatedTag { tag: tag.to_string(), offset });
    };
    let body_end = self.pos + rel;
    if body_end > self.pos {
      self.doc.append(id, NodeKind::Text(self.html[self.pos..body_end].to_string()));
    }
    let Some(gt) = self.html[body_end..].find('>') else {
      return Err(DomError::UnterminatedTag { tag: tag.to_string(), offset });
    };
    self.pos = body_end + gt + 1;
    Ok(())
  }
}
