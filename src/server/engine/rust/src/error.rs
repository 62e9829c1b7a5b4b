/* src/server/engine/rust/src/error.rs */

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Every failure the build engine can report.
///
/// Build-fatal variants abort startup. Path-scoped variants only invalidate the
/// page being assembled; the caller picks whether that aborts the whole build.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
  #[error("error parsing file: {source_path}; {message}")]
  Parse { source_path: String, message: String },

  #[error("component \"{0}\" is already registered")]
  DuplicateComponent(String),

  #[error("component cannot contain itself: {chain}")]
  SelfContainment { component: String, chain: String },

  #[error("component {component} doesn't exist (referenced by route \"{route_path}\")")]
  MissingComponent { component: String, route_path: String },

  #[error("layout {layout} doesn't exist (needed by path \"{path}\")")]
  MissingLayout { layout: String, path: String },

  #[error("router outlet not found: \"{outlet}\" on path \"{path}\"")]
  OutletNotFound { outlet: String, path: String },

  #[error("unclosed block: {open}")]
  UnclosedBlock { open: String },

  #[error("mismatched close: {{{{/{found}}}}} {}", close_hint(.expected))]
  MismatchedClose { expected: Option<String>, found: String },
}

fn close_hint(expected: &Option<String>) -> String {
  match expected {
    Some(open) => format!("does not close {open}"),
    None => "has no open block".to_string(),
  }
}

impl EngineError {
  /// False for errors that only affect a single path's plan.
  pub fn is_build_fatal(&self) -> bool {
    !matches!(
      self,
      Self::MissingComponent { .. } | Self::MissingLayout { .. } | Self::OutletNotFound { .. }
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn path_scoped_errors_are_not_fatal() {
    let missing = EngineError::MissingComponent {
      component: "ghost".into(),
      route_path: "/a".into(),
    };
    assert!(!missing.is_build_fatal());
    let outlet = EngineError::OutletNotFound { outlet: "aside".into(), path: "/".into() };
    assert!(!outlet.is_build_fatal());
  }

  #[test]
  fn structural_errors_are_fatal() {
    let cycle = EngineError::SelfContainment { component: "a".into(), chain: "a -> a".into() };
    assert!(cycle.is_build_fatal());
    assert!(EngineError::UnclosedBlock { open: "#items".into() }.is_build_fatal());
    assert!(EngineError::DuplicateComponent("nav".into()).is_build_fatal());
  }

  #[test]
  fn mismatched_close_messages() {
    let orphan = EngineError::MismatchedClose { expected: None, found: "items".into() };
    assert_eq!(orphan.to_string(), "mismatched close: {{/items}} has no open block");
    let crossed =
      EngineError::MismatchedClose { expected: Some("{{#a}}".into()), found: "b".into() };
    assert_eq!(crossed.to_string(), "mismatched close: {{/b}} does not close {{#a}}");
  }

  #[test]
  fn missing_component_names_component() {
    let err = EngineError::MissingComponent { component: "ghost".into(), route_path: "/x".into() };
    assert!(err.to_string().contains("ghost"));
  }
}
