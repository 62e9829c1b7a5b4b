/* src/server/engine/rust/src/compile.rs */

// Template compiler: rewrites `{{...}}` tags into a JS template literal.
//
// `{{#list}}` iterates forward, `{{^list}}` iterates in reverse; both go
// through the `arr` helper, which treats a missing value as an empty list
// and a scalar as a one-element list. Inside a block `$$` is the current
// item and `_i` its index.

use std::fmt::Write as _;

use crate::error::{EngineError, Result};
use crate::marker::{self, CONTENT_SENTINEL, TagKind};

/// Helpers every compiled module starts with.
pub const RUNTIME_PRELUDE: &str = "\
const arr = (v) => (v == null || v === false ? [] : Array.isArray(v) ? v : [v]);
const rearr = (v) => arr(v).slice().reverse();
";

struct Frame {
  name: String,
  /// Opening tag as written, `{{#name}}` or `{{^name}}`.
  open: String,
}

/// Resolve a tag name to a JS expression in the current scope.
fn expression(name: &str) -> String {
  if name.starts_with('$') {
    name.to_string()
  } else if name == "." {
    "$$".to_string()
  } else {
    format!("$$.{name}")
  }
}

fn escape_literal(text: &str, out: &mut String) {
  let mut chars = text.chars().peekable();
  while let Some(c) = chars.next() {
    match c {
      '\\' => out.push_str("\\\\"),
      '`' => out.push_str("\\`"),
      '$' if chars.peek() == Some(&'{') => out.push_str("\\$"),
      _ => out.push(c),
    }
  }
}

/// Compile one template (raw or tag-encoded) into a backtick-quoted JS template literal.
pub fn compile_template(template: &str) -> Result<String> {
  let source = marker::decode(template).replace(CONTENT_SENTINEL, "{{content}}");
  let mut out = String::from("`");
  let mut stack: Vec<Frame> = Vec::new();
  let mut cursor = 0;

  for located in marker::scan(&source) {
    escape_literal(&source[cursor..located.start], &mut out);
    cursor = located.end;
    let tag = located.tag;
    match tag.kind {
      TagKind::Open | TagKind::Inverted => {
        let (helper, sigil) = if tag.kind == TagKind::Open { ("arr", '#') } else { ("rearr", '^') };
        let _ = write!(out, "${{{helper}({}).map(($$, _i)=>`", expression(tag.name));
        stack.push(Frame {
          name: tag.name.to_string(),
          open: format!("{{{{{sigil}{}}}}}", tag.name),
        });
      }
      TagKind::Close => {
        let Some(frame) = stack.pop() else {
          return Err(EngineError::MismatchedClose { expected: None, found: tag.name.to_string() });
        };
        if frame.name != tag.name {
          return Err(EngineError::MismatchedClose {
            expected: Some(frame.open),
            found: tag.name.to_string(),
          });
        }
        out.push_str("`).join(\"\")}");
      }
      TagKind::Variable => {
        let _ = write!(out, "${{{}}}", expression(tag.name));
      }
      TagKind::Partial => {
        let _ = write!(out, "${{partial({:?}, $$)}}", tag.name);
      }
      TagKind::Comment => {}
    }
  }
  escape_literal(&source[cursor..], &mut out);

  if !stack.is_empty() {
    let open: Vec<&str> = stack.iter().map(|f| f.open.as_str()).collect();
    return Err(EngineError::UnclosedBlock { open: open.join(", ") });
  }
  out.push('`');
  Ok(out)
}

/// Validate section nesting without keeping the output.
pub fn check_blocks(template: &str) -> Result<()> {
  compile_template(template).map(|_| ())
}

/// Emit a JS module that registers every `(name, template)` pair through `define_fn`.
pub fn compile_module<'a>(
  components: impl IntoIterator<Item = (&'a str, &'a str)>,
  define_fn: &str,
) -> Result<String> {
  let mut out = String::from(RUNTIME_PRELUDE);
  for (name, template) in components {
    let literal = compile_template(template)?;
    let _ = writeln!(out, "\n{define_fn}({name:?}, ($, partial) => {{");
    let _ = writeln!(out, "  const $$ = $;\n  return {literal};\n}});");
  }
  Ok(out)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::marker::encode;

  #[test]
  fn plain_text_is_quoted() {
    assert_eq!(compile_template("<p>hi</p>").unwrap(), "`<p>hi</p>`");
  }

  #[test]
  fn variables_are_qualified() {
    assert_eq!(compile_template("{{title}}").unwrap(), "`${$$.title}`");
    assert_eq!(compile_template("{{.}}").unwrap(), "`${$$}`");
    assert_eq!(compile_template("{{$index}}").unwrap(), "`${$index}`");
    assert_eq!(compile_template("{{ user.name }}").unwrap(), "`${$$.user.name}`");
  }

  #[test]
  fn forward_section() {
    let out = compile_template("<ul>{{#items}}<li>{{.}}</li>{{/items}}</ul>").unwrap();
    assert_eq!(out, "`<ul>${arr($$.items).map(($$, _i)=>`<li>${$$}</li>`).join(\"\")}</ul>`");
  }

  #[test]
  fn inverted_section_is_reversed() {
    let out = compile_template("{{^items}}{{name}}{{/items}}").unwrap();
    assert_eq!(out, "`${rearr($$.items).map(($$, _i)=>`${$$.name}`).join(\"\")}`");
  }

  #[test]
  fn nested_sections_balance() {
    let out = compile_template("{{#a}}{{#b}}x{{/b}}{{/a}}").unwrap();
    assert_eq!(out.matches(".map(").count(), 2);
    assert_eq!(out.matches(".join(\"\")}").count(), 2);
  }

  #[test]
  fn partials_and_comments() {
    assert_eq!(compile_template("{{> nav}}").unwrap(), "`${partial(\"nav\", $$)}`");
    assert_eq!(compile_template("a{{! note }}b").unwrap(), "`ab`");
  }

  #[test]
  fn escapes_literal_syntax() {
    assert_eq!(compile_template("a`b ${c} \\d").unwrap(), "`a\\`b \\${c} \\\\d`");
  }

  #[test]
  fn accepts_encoded_input() {
    let encoded = encode("<main>{{#rows}}{{.}}{{/rows}}{{content}}</main>");
    let out = compile_template(&encoded).unwrap();
    assert_eq!(
      out,
      "`<main>${arr($$.rows).map(($$, _i)=>`${$$}`).join(\"\")}${$$.content}</main>`"
    );
  }

  #[test]
  fn unclosed_block_names_open_tags() {
    let err = compile_template("{{#a}}{{#b}}").unwrap_err();
    assert_eq!(err, EngineError::UnclosedBlock { open: "{{#a}}, {{#b}}".into() });
    assert!(err.to_string().contains("unclosed block"));
  }

  #[test]
  fn unclosed_inverted_block_keeps_its_sigil() {
    let err = compile_template("{{^rows}}").unwrap_err();
    assert_eq!(err.to_string(), "unclosed block: {{^rows}}");

    let err = compile_template("{{#a}}{{^b}}").unwrap_err();
    assert_eq!(err, EngineError::UnclosedBlock { open: "{{#a}}, {{^b}}".into() });

    let err = check_blocks("{{^b}}{{/a}}").unwrap_err();
    assert_eq!(err.to_string(), "mismatched close: {{/a}} does not close {{^b}}");
  }

  #[test]
  fn close_without_open() {
    let err = check_blocks("x{{/items}}").unwrap_err();
    assert_eq!(err, EngineError::MismatchedClose { expected: None, found: "items".into() });
    assert!(err.to_string().contains("mismatched close"));
  }

  #[test]
  fn crossed_close() {
    let err = check_blocks("{{#a}}{{#b}}{{/a}}{{/b}}").unwrap_err();
    let expected = Some("{{#b}}".to_string());
    assert_eq!(err, EngineError::MismatchedClose { expected, found: "a".into() });
  }

  #[test]
  fn module_defines_each_component() {
    let module = compile_module([("nav", "<a>{{label}}</a>"), ("foot", "f")], "define").unwrap();
    assert!(module.starts_with(RUNTIME_PRELUDE));
    let nav = "define(\"nav\", ($, partial) => {\n  const $$ = $;\n  \
               return `<a>${$$.label}</a>`;\n});";
    assert!(module.contains(nav));
    assert!(module.contains("define(\"foot\""));
  }
}
