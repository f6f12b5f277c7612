use futures::future::try_join_all;
use tracing::{debug, error, info, warn};
use url::Url;

use super::fetch::{AssetFetcher, AssetRequest, AssetResponse};
use super::storage::AssetStore;
use super::AssetError;

/// Settings fixed for one release of the application shell.
#[derive(Debug, Clone)]
pub struct AssetCacheConfig {
  /// Shared prefix of every generation name, e.g. "restaurants-"
  pub prefix: String,
  /// Current version, appended to the prefix
  pub version: String,
  /// Origin the shell is served from; other origins are not cached
  pub origin: Url,
  /// Locations that are never cached (the data service); anything on the
  /// same origin at or below the URL's path is excluded
  pub excluded: Vec<Url>,
  /// Paths cached on install, relative to `origin`
  pub manifest: Vec<String>,
}

impl AssetCacheConfig {
  pub fn generation(&self) -> String {
    format!("{}{}", self.prefix, self.version)
  }
}

/// How an intercepted request was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interception {
  /// Not handled; the caller goes to the network itself
  Passthrough,
  /// Answered by the cache manager
  Respond {
    response: AssetResponse,
    source: AssetSource,
  },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetSource {
  /// Served from the current generation
  Cache,
  /// Fetched on a miss and stored
  Network,
  /// Network failed on a miss; synthesized error response
  Offline,
}

/// Manages the lifecycle of asset cache generations.
pub struct AssetCacheManager<F> {
  config: AssetCacheConfig,
  store: AssetStore,
  fetcher: F,
}

impl<F: AssetFetcher> AssetCacheManager<F> {
  pub fn new(config: AssetCacheConfig, store: AssetStore, fetcher: F) -> Self {
    Self {
      config,
      store,
      fetcher,
    }
  }

  pub fn current_generation(&self) -> String {
    self.config.generation()
  }

  pub fn store(&self) -> &AssetStore {
    &self.store
  }

  pub fn fetcher(&self) -> &F {
    &self.fetcher
  }

  /// Resolve a path against the shell origin.
  pub fn request_for(&self, path: &str) -> Result<AssetRequest, AssetError> {
    self
      .config
      .origin
      .join(path)
      .map(AssetRequest::get)
      .map_err(|source| AssetError::InvalidPath {
        path: path.to_string(),
        source,
      })
  }

  /// Populate the current generation with every manifest asset.
  ///
  /// All assets are fetched before anything is written; one failed fetch or
  /// non-2xx answer fails the install and leaves the cache untouched.
  pub async fn install(&self) -> Result<usize, AssetError> {
    let generation = self.current_generation();
    let requests = self
      .config
      .manifest
      .iter()
      .map(|path| self.request_for(path))
      .collect::<Result<Vec<_>, _>>()?;

    let responses = try_join_all(requests.iter().map(|request| async move {
      let response = self.fetcher.fetch(request).await?;
      if !response.is_success() {
        return Err(AssetError::BadStatus {
          url: request.url.to_string(),
          status: response.status,
        });
      }
      Ok::<_, AssetError>(response)
    }))
    .await
    .inspect_err(|e| error!(generation = %generation, error = %e, "asset cache install failed"))?;

    let entries: Vec<_> = requests.into_iter().zip(responses).collect();
    self.store.put_all(&generation, &entries)?;

    info!(generation = %generation, assets = entries.len(), "asset cache installed");
    Ok(entries.len())
  }

  /// Delete every generation with our prefix other than the current one.
  ///
  /// Returns the names of the deleted generations.
  pub fn activate(&self) -> Result<Vec<String>, AssetError> {
    let current = self.current_generation();
    let generations = self.store.generations()?;
    if !generations.contains(&current) {
      return Err(AssetError::NotInstalled(current));
    }

    let mut evicted = Vec::new();
    for name in generations {
      if !name.starts_with(&self.config.prefix) || name == current {
        continue;
      }
      if self.store.delete_generation(&name)? {
        info!(generation = %name, "deleted obsolete asset cache");
        evicted.push(name);
      }
    }

    Ok(evicted)
  }

  fn is_excluded(&self, url: &Url) -> bool {
    self.config.excluded.iter().any(|excluded| {
      if excluded.origin() != url.origin() {
        return false;
      }
      let base = excluded.path().trim_end_matches('/');
      let path = url.path();
      path.starts_with(base) && (path.len() == base.len() || path[base.len()..].starts_with('/'))
    })
  }

  /// Answer an outgoing request.
  ///
  /// Data service traffic, cross-origin requests and anything but GET are
  /// passed through. Everything else is served cache first; a miss is fetched,
  /// stored and returned. A fetch failure on a miss yields a 504.
  pub async fn intercept(&self, request: &AssetRequest) -> Interception {
    if self.is_excluded(&request.url) {
      return Interception::Passthrough;
    }
    if request.url.origin() != self.config.origin.origin() || !request.is_get() {
      return Interception::Passthrough;
    }

    let generation = self.current_generation();

    match self.store.lookup(&generation, request) {
      Ok(Some(response)) => {
        debug!(url = %request.url, "asset cache hit");
        return Interception::Respond {
          response,
          source: AssetSource::Cache,
        };
      }
      Ok(None) => {}
      Err(e) => warn!(url = %request.url, error = %e, "asset cache lookup failed"),
    }

    match self.fetcher.fetch(request).await {
      Ok(response) => {
        if let Err(e) = self.store.put(&generation, request, &response) {
          warn!(url = %request.url, error = %e, "failed to cache asset");
        }
        Interception::Respond {
          response,
          source: AssetSource::Network,
        }
      }
      Err(e) => {
        error!(url = %request.url, error = %e, "asset fetch failed");
        Interception::Respond {
          response: AssetResponse::gateway_timeout(&e.reason),
          source: AssetSource::Offline,
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::assets::FetchError;
  use std::collections::HashMap;
  use std::sync::atomic::{AtomicBool, Ordering};
  use std::sync::Mutex;
  use tempfile::TempDir;

  /// Serves a fixed set of URLs and records what was fetched.
  #[derive(Default)]
  struct FakeFetcher {
    offline: AtomicBool,
    statuses: HashMap<String, u16>,
    fetched: Mutex<Vec<String>>,
  }

  impl FakeFetcher {
    fn with_status(mut self, url: &str, status: u16) -> Self {
      self.statuses.insert(url.to_string(), status);
      self
    }

    fn fetched(&self) -> Vec<String> {
      self.fetched.lock().unwrap().clone()
    }
  }

  impl AssetFetcher for FakeFetcher {
    async fn fetch(&self, request: &AssetRequest) -> Result<AssetResponse, FetchError> {
      self.fetched.lock().unwrap().push(request.url.to_string());
      if self.offline.load(Ordering::SeqCst) {
        return Err(FetchError::new(&request.url, "connection refused"));
      }
      Ok(AssetResponse {
        status: self.statuses.get(request.url.as_str()).copied().unwrap_or(200),
        headers: vec![("content-type".into(), "text/plain".into())],
        body: request.url.path().as_bytes().to_vec(),
      })
    }
  }

  const SERVICE: &str = "https://restaurant-reviews-server.herokuapp.com";

  fn config(prefix: &str, version: &str) -> AssetCacheConfig {
    AssetCacheConfig {
      prefix: prefix.to_string(),
      version: version.to_string(),
      origin: Url::parse("http://localhost:8000").unwrap(),
      excluded: vec![Url::parse(SERVICE).unwrap()],
      manifest: vec!["/".into(), "/css/styles.css".into(), "/js/main.js".into()],
    }
  }

  fn manager(
    dir: &TempDir,
    config: AssetCacheConfig,
    fetcher: FakeFetcher,
  ) -> AssetCacheManager<FakeFetcher> {
    let store = AssetStore::open(&dir.path().join("assets.db")).unwrap();
    AssetCacheManager::new(config, store, fetcher)
  }

  fn get(url: &str) -> AssetRequest {
    AssetRequest::get(Url::parse(url).unwrap())
  }

  #[tokio::test]
  async fn test_install_caches_manifest() {
    let dir = TempDir::new().unwrap();
    let m = manager(&dir, config("restaurants-", "003"), FakeFetcher::default());

    assert_eq!(m.install().await.unwrap(), 3);
    assert_eq!(
      m.store().urls("restaurants-003").unwrap(),
      vec![
        "http://localhost:8000/",
        "http://localhost:8000/css/styles.css",
        "http://localhost:8000/js/main.js"
      ]
    );
  }

  #[tokio::test]
  async fn test_install_is_all_or_nothing() {
    let dir = TempDir::new().unwrap();
    let fetcher = FakeFetcher::default().with_status("http://localhost:8000/js/main.js", 404);
    let m = manager(&dir, config("restaurants-", "003"), fetcher);

    let err = m.install().await.unwrap_err();
    assert!(matches!(err, AssetError::BadStatus { status: 404, .. }));
    assert!(m.store().generations().unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_activate_keeps_only_current_generation() {
    let dir = TempDir::new().unwrap();
    let m = manager(&dir, config("v", "3"), FakeFetcher::default());
    m.store().open_generation("v1").unwrap();
    m.store().open_generation("v2").unwrap();
    m.store().open_generation("other-cache").unwrap();
    m.install().await.unwrap();

    let evicted = m.activate().unwrap();

    assert_eq!(evicted, vec!["v1", "v2"]);
    assert_eq!(m.store().generations().unwrap(), vec!["other-cache", "v3"]);
    assert_eq!(m.store().urls("v3").unwrap().len(), 3);
  }

  #[tokio::test]
  async fn test_activate_requires_install() {
    let dir = TempDir::new().unwrap();
    let m = manager(&dir, config("v", "3"), FakeFetcher::default());
    m.store().open_generation("v2").unwrap();

    assert!(matches!(m.activate(), Err(AssetError::NotInstalled(ref g)) if g == "v3"));
    assert_eq!(m.store().generations().unwrap(), vec!["v2"]);
  }

  #[tokio::test]
  async fn test_miss_is_fetched_and_then_served_from_cache() {
    let dir = TempDir::new().unwrap();
    let m = manager(&dir, config("restaurants-", "003"), FakeFetcher::default());
    let request = get("http://localhost:8000/img/1.webp");

    let first = m.intercept(&request).await;
    let Interception::Respond { response, source } = first else {
      panic!("expected a response");
    };
    assert_eq!(source, AssetSource::Network);
    assert_eq!(response.body, b"/img/1.webp");

    m.fetcher().offline.store(true, Ordering::SeqCst);
    let second = m.intercept(&request).await;
    assert_eq!(
      second,
      Interception::Respond {
        response,
        source: AssetSource::Cache
      }
    );
    assert_eq!(m.fetcher().fetched().len(), 1);
  }

  #[tokio::test]
  async fn test_data_service_requests_are_never_cached() {
    let dir = TempDir::new().unwrap();
    let mut config = config("restaurants-", "003");
    // Even when the service shares the shell's origin
    config
      .excluded
      .push(Url::parse("http://localhost:8000/restaurants/").unwrap());
    let m = manager(&dir, config, FakeFetcher::default());

    for url in [
      format!("{}/restaurants/", SERVICE),
      "http://localhost:8000/restaurants/".to_string(),
    ] {
      assert_eq!(m.intercept(&get(&url)).await, Interception::Passthrough);
      assert_eq!(m.intercept(&get(&url)).await, Interception::Passthrough);
      assert!(m.store().lookup("restaurants-003", &get(&url)).unwrap().is_none());
    }
    assert!(m.fetcher().fetched().is_empty());
    assert!(m.store().urls("restaurants-003").unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_exclusion_matches_origin_and_path_segments() {
    let dir = TempDir::new().unwrap();
    let mut config = config("restaurants-", "003");
    config.origin = Url::parse("https://restaurant-reviews-server.herokuapp.com.evil").unwrap();
    config
      .excluded
      .push(Url::parse("https://restaurant-reviews-server.herokuapp.com.evil/api").unwrap());
    let m = manager(&dir, config, FakeFetcher::default());

    // Host case is normalized by the URL parser
    let service = get("https://Restaurant-Reviews-Server.herokuapp.com/reviews/?restaurant_id=1");
    assert_eq!(m.intercept(&service).await, Interception::Passthrough);

    let api = get("https://restaurant-reviews-server.herokuapp.com.evil/api/restaurants");
    assert_eq!(m.intercept(&api).await, Interception::Passthrough);

    // Same host prefix and same path prefix, but different host or segment
    for url in [
      "https://restaurant-reviews-server.herokuapp.com.evil/",
      "https://restaurant-reviews-server.herokuapp.com.evil/apix.js",
    ] {
      assert!(matches!(
        m.intercept(&get(url)).await,
        Interception::Respond {
          source: AssetSource::Network,
          ..
        }
      ));
    }
    assert_eq!(m.fetcher().fetched().len(), 2);
  }

  #[tokio::test]
  async fn test_cross_origin_and_non_get_pass_through() {
    let dir = TempDir::new().unwrap();
    let m = manager(&dir, config("restaurants-", "003"), FakeFetcher::default());

    let cross = get("https://maps.googleapis.com/maps/api/js");
    assert_eq!(m.intercept(&cross).await, Interception::Passthrough);

    let post = AssetRequest {
      method: "POST".into(),
      url: Url::parse("http://localhost:8000/form").unwrap(),
    };
    assert_eq!(m.intercept(&post).await, Interception::Passthrough);
    assert!(m.fetcher().fetched().is_empty());
  }

  #[tokio::test]
  async fn test_fetch_failure_on_miss_synthesizes_gateway_timeout() {
    let dir = TempDir::new().unwrap();
    let m = manager(&dir, config("restaurants-", "003"), FakeFetcher::default());
    m.fetcher().offline.store(true, Ordering::SeqCst);

    let result = m.intercept(&get("http://localhost:8000/css/styles.css")).await;
    let Interception::Respond { response, source } = result else {
      panic!("expected a response");
    };
    assert_eq!(source, AssetSource::Offline);
    assert_eq!(response.status, 504);
    assert!(m.store().urls("restaurants-003").unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_lookup_ignores_other_generations() {
    let dir = TempDir::new().unwrap();
    let old = manager(&dir, config("restaurants-", "002"), FakeFetcher::default());
    old.install().await.unwrap();
    drop(old);

    let m = manager(&dir, config("restaurants-", "003"), FakeFetcher::default());
    let result = m.intercept(&get("http://localhost:8000/css/styles.css")).await;
    assert!(matches!(
      result,
      Interception::Respond {
        source: AssetSource::Network,
        ..
      }
    ));
  }
}
