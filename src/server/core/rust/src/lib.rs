/* src/server/core/rust/src/lib.rs */

//! Request-serving side of stitch: builds the page set once, then renders
//! pages per request through pluggable data-fetch and template-execution traits.

pub mod cache;
pub mod context;
pub mod errors;
pub mod pages;
pub mod render;

// Re-exports for ergonomic use
pub use cache::RenderCache;
pub use context::{PageContext, RenderRequest};
pub use errors::PageError;
pub use pages::{BuildPolicy, BuildReport, PageDef, PageSet, SkippedPath, build_pages};
pub use render::{BoxFuture, DataFetcher, FetchRequest, PageRenderer, Rendered, TemplateExecutor};
