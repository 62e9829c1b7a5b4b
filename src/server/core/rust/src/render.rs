/* src/server/core/rust/src/render.rs */

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use stitch_engine::ResolvedRequest;
use tokio::task::JoinSet;

use crate::cache::RenderCache;
use crate::context::{PageContext, RenderRequest};
use crate::errors::PageError;
use crate::pages::{PageDef, PageSet};

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// One outbound data request, placeholders already filled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
  pub request: ResolvedRequest,
  /// Query parameters of the incoming request, forwarded to the data source.
  pub query: Vec<(String, String)>,
}

/// Performs a page's data requests. Must yield decoded JSON.
pub trait DataFetcher: Send + Sync {
  fn fetch(&self, request: FetchRequest) -> BoxFuture<Result<serde_json::Value, PageError>>;
}

/// Runs an assembled template against a page context.
pub trait TemplateExecutor: Send + Sync {
  fn execute(&self, template: &str, context: &serde_json::Value) -> Result<String, PageError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
  Html(Arc<str>),
  Redirect(String),
}

pub struct PageRenderer {
  pages: PageSet,
  fetcher: Arc<dyn DataFetcher>,
  executor: Arc<dyn TemplateExecutor>,
  storage: serde_json::Value,
  cache: RenderCache,
}

impl PageRenderer {
  pub fn new(
    pages: PageSet,
    fetcher: Arc<dyn DataFetcher>,
    executor: Arc<dyn TemplateExecutor>,
  ) -> Self {
    Self { pages, fetcher, executor, storage: serde_json::Value::Null, cache: RenderCache::new() }
  }

  /// Resource tree exposed to every template as `storage`.
  pub fn with_storage(mut self, storage: serde_json::Value) -> Self {
    self.storage = storage;
    self
  }

  /// Replace the render cache with one holding at most `max_entries` paths.
  pub fn with_cache_limit(mut self, max_entries: usize) -> Self {
    self.cache = RenderCache::with_max_entries(max_entries);
    self
  }

  pub fn pages(&self) -> &PageSet {
    &self.pages
  }

  pub fn cache(&self) -> &RenderCache {
    &self.cache
  }

  /// Render the page registered under `pattern` for one incoming request.
  pub async fn render(
    &self,
    pattern: &str,
    request: &RenderRequest,
  ) -> Result<Rendered, PageError> {
    let page = self
      .pages
      .get(pattern)
      .ok_or_else(|| PageError::not_found(format!("no page for {pattern}")))?;

    if let Some(target) = page.redirect() {
      return Ok(Rendered::Redirect(target.to_string()));
    }
    if page.is_static() {
      let html =
        self.cache.get_or_render(&request.path, || self.render_fresh(page, request)).await?;
      return Ok(Rendered::Html(html));
    }
    Ok(Rendered::Html(Arc::from(self.render_fresh(page, request).await?)))
  }

  async fn render_fresh(
    &self,
    page: &PageDef,
    request: &RenderRequest,
  ) -> Result<String, PageError> {
    let template =
      page.template().ok_or_else(|| PageError::internal(format!("{} has no template", page.path)))?;
    let mut context = PageContext::new(&self.storage, page, request);

    if !page.requests.is_empty() {
      let resolved = context.resolve_requests(&page.requests);
      let data = self.fetch_all(resolved, &request.query).await?;
      context.set_data(data);
    }

    let context = context.finish()?;
    self.executor.execute(template, &context)
  }

  /// Run every request concurrently; results keep declaration order.
  async fn fetch_all(
    &self,
    requests: Vec<ResolvedRequest>,
    query: &[(String, String)],
  ) -> Result<Vec<serde_json::Value>, PageError> {
    let mut join_set = JoinSet::new();
    let count = requests.len();
    for (index, request) in requests.into_iter().enumerate() {
      let fetch = self.fetcher.fetch(FetchRequest { request, query: query.to_vec() });
      join_set.spawn(async move { (index, fetch.await) });
    }

    let mut slots: BTreeMap<usize, serde_json::Value> = BTreeMap::new();
    while let Some(joined) = join_set.join_next().await {
      let (index, result) = joined.map_err(|e| PageError::internal(e.to_string()))?;
      slots.insert(index, result?);
    }
    debug_assert_eq!(slots.len(), count);
    Ok(slots.into_values().collect())
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};

  use serde_json::json;
  use stitch_engine::{PageBody, PageData, Request};

  use super::*;

  /// Answers with the resolved URL, or fails for URLs containing "fail".
  #[derive(Default)]
  struct EchoFetcher {
    calls: AtomicUsize,
  }

  impl DataFetcher for EchoFetcher {
    fn fetch(&self, request: FetchRequest) -> BoxFuture<Result<serde_json::Value, PageError>> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      Box::pin(async move {
        if request.request.url.contains("fail") {
          return Err(PageError::upstream(503, "unavailable"));
        }
        Ok(json!({"url": request.request.url, "query": request.query.len()}))
      })
    }
  }

  /// Writes the template followed by the interesting context fields.
  struct DumpExecutor;

  impl TemplateExecutor for DumpExecutor {
    fn execute(&self, template: &str, context: &serde_json::Value) -> Result<String, PageError> {
      Ok(format!("{template}|{}|{}", context["query"], context["data"]))
    }
  }

  fn page(path: &str, cacheable: bool, urls: &[&str]) -> Arc<PageDef> {
    let requests = urls
      .iter()
      .map(|url| Request {
        url: (*url).to_string(),
        method: "GET".into(),
        headers: BTreeMap::new(),
        body: None,
      })
      .collect();
    Arc::new(PageDef {
      path: path.into(),
      layout: "index".into(),
      body: PageBody::Template("<main></main>".into()),
      page_data: PageData::new(),
      requests,
      cacheable,
    })
  }

  fn renderer(pages: Vec<Arc<PageDef>>, fetcher: Arc<EchoFetcher>) -> PageRenderer {
    let pages = pages.into_iter().map(|p| (p.path.clone(), p)).collect();
    PageRenderer::new(pages, fetcher, Arc::new(DumpExecutor))
  }

  #[tokio::test]
  async fn fetches_in_declaration_order() {
    let fetcher = Arc::new(EchoFetcher::default());
    let renderer =
      renderer(vec![page("/u/{id}", false, &["http://a/$id", "http://b/$id"])], fetcher.clone());
    let request = RenderRequest::new("/u/9").var("id", "9").query_param("page", "2");
    let Rendered::Html(html) = renderer.render("/u/{id}", &request).await.unwrap() else {
      panic!("expected html");
    };
    assert_eq!(
      &*html,
      r#"<main></main>|{"id":"9"}|[{"query":1,"url":"http://a/9"},{"query":1,"url":"http://b/9"}]"#
    );
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn static_pages_render_once() {
    let fetcher = Arc::new(EchoFetcher::default());
    let renderer = renderer(vec![page("/", true, &[])], fetcher);
    let first = renderer.render("/", &RenderRequest::new("/")).await.unwrap();
    let second = renderer.render("/", &RenderRequest::new("/")).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(renderer.cache().len(), 1);
  }

  #[tokio::test]
  async fn static_pattern_is_cached_per_path_up_to_limit() {
    let fetcher = Arc::new(EchoFetcher::default());
    let renderer = renderer(vec![page("/post/{id}", true, &[])], fetcher).with_cache_limit(2);
    for id in ["1", "2", "3", "1"] {
      let request = RenderRequest::new(format!("/post/{id}")).var("id", id);
      let Rendered::Html(html) = renderer.render("/post/{id}", &request).await.unwrap() else {
        panic!("expected html");
      };
      assert!(html.contains(&format!(r#"{{"id":"{id}"}}"#)));
    }
    assert_eq!(renderer.cache().len(), 2);
    assert!(renderer.cache().get("/post/3").is_none());
  }

  #[tokio::test]
  async fn pages_with_requests_skip_cache() {
    let fetcher = Arc::new(EchoFetcher::default());
    let renderer = renderer(vec![page("/feed", true, &["http://feed"])], fetcher.clone());
    renderer.render("/feed", &RenderRequest::new("/feed")).await.unwrap();
    renderer.render("/feed", &RenderRequest::new("/feed")).await.unwrap();
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    assert!(renderer.cache().is_empty());
  }

  #[tokio::test]
  async fn fetch_failure_is_request_scoped() {
    let fetcher = Arc::new(EchoFetcher::default());
    let renderer = renderer(vec![page("/x", false, &["http://fail"])], fetcher);
    let err = renderer.render("/x", &RenderRequest::new("/x")).await.unwrap_err();
    assert_eq!(err.status(), 503);
    // Nothing was retained, the next request fails the same way
    assert!(renderer.render("/x", &RenderRequest::new("/x")).await.is_err());
  }

  #[tokio::test]
  async fn redirect_and_unknown_pages() {
    let redirect = Arc::new(PageDef {
      body: PageBody::Redirect("/new".into()),
      ..(*page("/old", false, &[])).clone()
    });
    let renderer = renderer(vec![redirect], Arc::new(EchoFetcher::default()));
    let rendered = renderer.render("/old", &RenderRequest::new("/old")).await.unwrap();
    assert_eq!(rendered, Rendered::Redirect("/new".into()));
    let err = renderer.render("/missing", &RenderRequest::new("/missing")).await.unwrap_err();
    assert_eq!(err.status(), 404);
  }
}
