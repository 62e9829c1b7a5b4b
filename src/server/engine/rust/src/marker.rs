/* src/server/engine/rust/src/marker.rs */

//! Tag protection: `{{...}}` tags are swapped for inert comment markers before
//! any tree work and swapped back afterwards.
//!
//! `{{content}}` is the one exception. It becomes the content sentinel, which
//! the assembler fills in and `decode` never restores.

use std::sync::OnceLock;

use regex::{Captures, Regex};

pub const MARKER_OPEN: &str = "<!--stache:";
pub const MARKER_CLOSE: &str = "-->";
pub const CONTENT_SENTINEL: &str = "<!--stache-content-->";

/// Comment body of the content sentinel once parsed into a tree.
pub const CONTENT_COMMENT: &str = "stache-content";

const MARKER_COMMENT_PREFIX: &str = "stache:";
const CONTENT_NAME: &str = "content";

pub(crate) fn tag_regex() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  RE.get_or_init(|| Regex::new(r"\{\{\s*([>#/^!]?)\s*([\w\-.$]+)\s*\}\}").unwrap())
}

fn marker_regex() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  RE.get_or_init(|| {
    Regex::new(r"<!--stache:(\{\{\s*[>#/^!]?\s*[\w\-.$]+\s*\}\})-->").unwrap()
  })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
  Variable,
  Partial,
  Open,
  Close,
  Inverted,
  Comment,
}

impl TagKind {
  fn from_prefix(prefix: &str) -> Self {
    match prefix {
      ">" => Self::Partial,
      "#" => Self::Open,
      "/" => Self::Close,
      "^" => Self::Inverted,
      "!" => Self::Comment,
      _ => Self::Variable,
    }
  }
}

/// One template tag found in source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag<'a> {
  pub kind: TagKind,
  pub name: &'a str,
  /// The full `{{ ... }}` text as written.
  pub raw: &'a str,
}

impl<'a> Tag<'a> {
  fn from_captures(caps: &Captures<'a>) -> Option<Self> {
    let raw = caps.get(0)?.as_str();
    let prefix = caps.get(1).map_or("", |m| m.as_str());
    let name = caps.get(2)?.as_str();
    Some(Self { kind: TagKind::from_prefix(prefix), name, raw })
  }

  /// Parse a single tag that spans the whole input.
  pub fn parse(raw: &'a str) -> Option<Self> {
    let caps = tag_regex().captures(raw)?;
    if caps.get(0)?.as_str().len() != raw.len() {
      return None;
    }
    Self::from_captures(&caps)
  }

  fn is_content(&self) -> bool {
    self.kind == TagKind::Variable && self.name == CONTENT_NAME
  }
}

/// A tag together with its byte span in the scanned text.
pub(crate) struct Located<'a> {
  pub tag: Tag<'a>,
  pub start: usize,
  pub end: usize,
}

pub(crate) fn scan(text: &str) -> impl Iterator<Item = Located<'_>> {
  tag_regex().captures_iter(text).filter_map(|caps| {
    let whole = caps.get(0)?;
    let tag = Tag::from_captures(&caps)?;
    Some(Located { tag, start: whole.start(), end: whole.end() })
  })
}

/// Replace every template tag with an inert comment marker.
pub fn encode(text: &str) -> String {
  tag_regex()
    .replace_all(text, |caps: &Captures<'_>| match Tag::from_captures(caps) {
      Some(tag) if tag.is_content() => CONTENT_SENTINEL.to_string(),
      Some(tag) => format!("{MARKER_OPEN}{}{MARKER_CLOSE}", tag.raw),
      None => caps[0].to_string(),
    })
    .into_owned()
}

/// Restore the original tag text of every marker. The content sentinel stays.
pub fn decode(text: &str) -> String {
  marker_regex().replace_all(text, |caps: &Captures<'_>| caps[1].to_string()).into_owned()
}

/// The tag carried by a marker comment body (the text between `<!--` and `-->`).
pub fn marker_tag(comment: &str) -> Option<Tag<'_>> {
  Tag::parse(comment.strip_prefix(MARKER_COMMENT_PREFIX)?)
}

pub fn is_content_sentinel(comment: &str) -> bool {
  comment == CONTENT_COMMENT
}
