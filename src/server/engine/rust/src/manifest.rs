/* src/server/engine/rust/src/manifest.rs */

use serde::{Deserialize, Serialize};

use crate::component::ComponentOptions;
use crate::route::Route;

/// Declarative description of a site: component imports plus the route tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Manifest {
  pub default_locale: String,
  pub imports: Vec<Import>,
  pub routes: Vec<Route>,
  /// Opaque resource tree handed to templates as `storage`.
  pub resources: serde_json::Value,
  pub components_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Import {
  pub name: String,
  pub template_path: String,
  #[serde(default)]
  pub component_path: Option<String>,
  #[serde(default, rename = "layout")]
  pub is_layout: bool,
  /// Server-side rendering of the template; off leaves an empty tag for the companion script.
  #[serde(default)]
  pub render: bool,
  #[serde(default)]
  pub omit_tags: bool,
}

impl Manifest {
  pub fn from_json(json: &str) -> serde_json::Result<Self> {
    serde_json::from_str(json)
  }
}

impl Import {
  pub fn component_path(&self) -> Option<&str> {
    self.component_path.as_deref().filter(|p| !p.is_empty())
  }

  /// Registration options for this import, with its companion script already read.
  pub fn options(&self, companion_script: Option<String>) -> ComponentOptions {
    ComponentOptions {
      render: self.render,
      omit_tags: self.omit_tags,
      is_layout: self.is_layout,
      companion_script,
      source_path: self.template_path.clone(),
    }
  }
}
