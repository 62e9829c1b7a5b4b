/* src/server/core/rust/src/errors.rs */

use std::fmt;

use stitch_engine::EngineError;

/// Request-scoped failure, shaped for a transport layer to turn into a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageError {
  code: String,
  message: String,
  status: u16,
}

fn default_status(code: &str) -> u16 {
  match code {
    "NOT_FOUND" => 404,
    "BAD_GATEWAY" => 502,
    "BUILD_ERROR" | "INTERNAL_ERROR" => 500,
    _ => 500,
  }
}

impl PageError {
  pub fn new(code: impl Into<String>, message: impl Into<String>, status: u16) -> Self {
    Self { code: code.into(), message: message.into(), status }
  }

  pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
    let code = code.into();
    let status = default_status(&code);
    Self { code, message: message.into(), status }
  }

  pub fn not_found(msg: impl Into<String>) -> Self {
    Self::with_code("NOT_FOUND", msg)
  }

  pub fn internal(msg: impl Into<String>) -> Self {
    Self::with_code("INTERNAL_ERROR", msg)
  }

  /// A data source answered with something other than success.
  pub fn bad_gateway(msg: impl Into<String>) -> Self {
    Self::with_code("BAD_GATEWAY", msg)
  }

  /// Upstream status passed through as-is.
  pub fn upstream(status: u16, msg: impl Into<String>) -> Self {
    Self::new("UPSTREAM_ERROR", msg, status)
  }

  pub fn code(&self) -> &str {
    &self.code
  }

  pub fn message(&self) -> &str {
    &self.message
  }

  pub fn status(&self) -> u16 {
    self.status
  }
}

impl fmt::Display for PageError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}: {}", self.code, self.message)
  }
}

impl std::error::Error for PageError {}

impl From<EngineError> for PageError {
  fn from(err: EngineError) -> Self {
    Self::with_code("BUILD_ERROR", err.to_string())
  }
}

impl From<serde_json::Error> for PageError {
  fn from(err: serde_json::Error) -> Self {
    Self::internal(err.to_string())
  }
}
