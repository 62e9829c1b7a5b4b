/* src/server/core/rust/src/cache.rs */

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::OnceCell;

use crate::errors::PageError;

/// Slots kept by [`RenderCache::new`].
pub const DEFAULT_MAX_ENTRIES: usize = 4096;

/// Rendered HTML per request path, filled lazily.
///
/// The key is the concrete path because the page context carries the path
/// variables and the locale-less `alternate` path. A pattern such as
/// `/post/{id}` therefore takes one slot per id; once `max_entries` slots exist,
/// new paths are rendered on every request and not stored.
///
/// Concurrent first requests for a stored path share one render; the others
/// wait for its result. A failed render frees its slot so the next request
/// retries.
pub struct RenderCache {
  entries: DashMap<String, Arc<OnceCell<Arc<str>>>>,
  max_entries: usize,
}

impl Default for RenderCache {
  fn default() -> Self {
    Self::new()
  }
}

impl RenderCache {
  pub fn new() -> Self {
    Self::with_max_entries(DEFAULT_MAX_ENTRIES)
  }

  /// Soft limit; concurrent misses may overshoot it by a few slots.
  pub fn with_max_entries(max_entries: usize) -> Self {
    Self { entries: DashMap::new(), max_entries }
  }

  pub fn max_entries(&self) -> usize {
    self.max_entries
  }

  pub async fn get_or_render<F, Fut>(&self, key: &str, render: F) -> Result<Arc<str>, PageError>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<String, PageError>>,
  {
    if !self.entries.contains_key(key) && self.entries.len() >= self.max_entries {
      tracing::debug!(path = %key, max = self.max_entries, "render cache full");
      return render().await.map(Arc::from);
    }

    // Clone the cell out so no map shard lock is held across the await
    let cell = self.entries.entry(key.to_string()).or_default().clone();
    let result = cell
      .get_or_try_init(|| async move {
        let html = render().await?;
        tracing::debug!(path = %key, bytes = html.len(), "render cache filled");
        Ok(Arc::from(html))
      })
      .await
      .cloned();
    if result.is_err() {
      self.entries.remove_if(key, |_, cell| !cell.initialized());
    }
    result
  }

  pub fn get(&self, key: &str) -> Option<Arc<str>> {
    self.entries.get(key).and_then(|cell| cell.get().cloned())
  }

  pub fn invalidate(&self, key: &str) {
    self.entries.remove(key);
  }

  pub fn clear(&self) {
    self.entries.clear();
  }

  /// Number of filled entries.
  pub fn len(&self) -> usize {
    self.entries.iter().filter(|entry| entry.value().initialized()).count()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::time::Duration;

  use super::*;

  #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
  async fn concurrent_first_requests_render_once() {
    let cache = Arc::new(RenderCache::new());
    let renders = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..16 {
      let cache = cache.clone();
      let renders = renders.clone();
      handles.push(tokio::spawn(async move {
        cache
          .get_or_render("/", || async move {
            renders.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok("<p>home</p>".to_string())
          })
          .await
      }));
    }
    for handle in handles {
      assert_eq!(&*handle.await.unwrap().unwrap(), "<p>home</p>");
    }
    assert_eq!(renders.load(Ordering::SeqCst), 1);
    assert_eq!(cache.len(), 1);
  }

  #[tokio::test]
  async fn failed_render_is_not_cached() {
    let cache = RenderCache::new();
    let err = cache
      .get_or_render("/x", || async { Err(PageError::bad_gateway("api down")) })
      .await
      .unwrap_err();
    assert_eq!(err.status(), 502);
    assert!(cache.get("/x").is_none());
    assert!(cache.is_empty());

    let html = cache.get_or_render("/x", || async { Ok("ok".to_string()) }).await.unwrap();
    assert_eq!(&*html, "ok");
    assert_eq!(cache.get("/x").as_deref(), Some("ok"));
  }

  #[tokio::test]
  async fn full_cache_renders_without_storing() {
    let cache = RenderCache::with_max_entries(1);
    let renders = AtomicUsize::new(0);
    let render = |body: &'static str| {
      renders.fetch_add(1, Ordering::SeqCst);
      async move { Ok::<_, PageError>(body.to_string()) }
    };

    cache.get_or_render("/post/1", || render("one")).await.unwrap();
    let two = cache.get_or_render("/post/2", || render("two")).await.unwrap();
    cache.get_or_render("/post/2", || render("two")).await.unwrap();
    assert_eq!(&*two, "two");
    assert_eq!(renders.load(Ordering::SeqCst), 3);
    assert_eq!(cache.len(), 1);
    assert!(cache.get("/post/2").is_none());

    // Stored paths keep being served from the cache
    cache.get_or_render("/post/1", || render("one")).await.unwrap();
    assert_eq!(renders.load(Ordering::SeqCst), 3);
  }

  #[tokio::test]
  async fn failed_render_frees_its_slot() {
    let cache = RenderCache::with_max_entries(1);
    cache.get_or_render("/x", || async { Err(PageError::internal("boom")) }).await.unwrap_err();
    cache.get_or_render("/y", || async { Ok("y".to_string()) }).await.unwrap();
    assert_eq!(cache.get("/y").as_deref(), Some("y"));
  }

  #[tokio::test]
  async fn keys_are_independent_and_invalidate() {
    let cache = RenderCache::new();
    cache.get_or_render("/a", || async { Ok("a".to_string()) }).await.unwrap();
    cache.get_or_render("/b", || async { Ok("b".to_string()) }).await.unwrap();
    // Second call for a filled key never runs its render
    let again = cache
      .get_or_render("/a", || async { Err(PageError::internal("should not run")) })
      .await
      .unwrap();
    assert_eq!(&*again, "a");
    assert_eq!(cache.len(), 2);

    cache.invalidate("/a");
    assert!(cache.get("/a").is_none());
    cache.clear();
    assert!(cache.is_empty());
  }
}
