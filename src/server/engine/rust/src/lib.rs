/* src/server/engine/rust/src/lib.rs */

//! Build-time page composition: tag protection, component registry,
//! route flattening, page assembly and template compilation.
//! Pure functions over strings and owned trees, no filesystem I/O.

pub mod assemble;
pub mod compile;
pub mod component;
pub mod dom;
pub mod error;
pub mod manifest;
pub mod marker;
pub mod route;
pub mod value;

// Public API re-exports
pub use assemble::{AssembleOptions, AssembledPage, Assembler, DEFAULT_LAYOUT, PageBody};
pub use compile::{check_blocks, compile_module, compile_template};
pub use component::{Component, ComponentOptions, PartialSink, Registry};
pub use dom::{Document, DomError, NodeId};
pub use error::{EngineError, Result};
pub use manifest::{Import, Manifest};
pub use marker::{decode, encode};
pub use route::{
  DEFAULT_OUTLET, PlannedRoute, Request, ResolvedRequest, Route, RouteId, RouteTable, join_path,
};
pub use value::{PageData, PageValue};
