/* src/server/engine/rust/src/value.rs */

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// JSON-shaped page metadata attached to a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PageValue {
  Null,
  Bool(bool),
  Number(serde_json::Number),
  String(String),
  List(Vec<PageValue>),
  Map(BTreeMap<String, PageValue>),
}

pub type PageData = BTreeMap<String, PageValue>;

impl PageValue {
  pub fn as_str(&self) -> Option<&str> {
    match self {
      Self::String(s) => Some(s),
      _ => None,
    }
  }

  pub fn to_json(&self) -> serde_json::Value {
    match self {
      Self::Null => serde_json::Value::Null,
      Self::Bool(b) => serde_json::Value::Bool(*b),
      Self::Number(n) => serde_json::Value::Number(n.clone()),
      Self::String(s) => serde_json::Value::String(s.clone()),
      Self::List(items) => serde_json::Value::Array(items.iter().map(Self::to_json).collect()),
      Self::Map(map) => {
        serde_json::Value::Object(map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect())
      }
    }
  }
}

impl From<&str> for PageValue {
  fn from(value: &str) -> Self {
    Self::String(value.to_string())
  }
}

impl From<String> for PageValue {
  fn from(value: String) -> Self {
    Self::String(value)
  }
}

impl From<bool> for PageValue {
  fn from(value: bool) -> Self {
    Self::Bool(value)
  }
}

impl From<PageValue> for serde_json::Value {
  fn from(value: PageValue) -> Self {
    value.to_json()
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn deserializes_nested_json() {
    let value: PageValue =
      serde_json::from_value(json!({"title": "Home", "tags": ["a", 1, true, null]})).unwrap();
    let PageValue::Map(map) = &value else { panic!("expected map") };
    assert_eq!(map["title"].as_str(), Some("Home"));
    assert!(matches!(&map["tags"], PageValue::List(items) if items.len() == 4));
    assert_eq!(value.to_json(), json!({"title": "Home", "tags": ["a", 1, true, null]}));
  }
}
