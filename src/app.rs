use color_eyre::{eyre::eyre, Result};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::info;
use url::Url;

use crate::assets::{
  AssetCacheConfig, AssetCacheManager, AssetFetcher, AssetSource, AssetStore, HttpFetcher,
  Interception,
};
use crate::commands::{AssetsCommand, Command};
use crate::config::Config;
use crate::event::{ConnectivityMonitor, Event};
use crate::gateway::{Gateway, OfflineMode, Selection};
use crate::links;
use crate::model::Review;
use crate::queue::PendingQueue;
use crate::reconcile::{ReconcileOutcome, Reconciler};
use crate::remote::{HttpRemote, RemoteService};
use crate::store::{Fetched, StoreHandle};

/// Main application state
pub struct App {
  config: Config,
  data_dir: PathBuf,
  gateway: Gateway<HttpRemote>,
}

impl App {
  pub fn new(config: Config) -> Result<Self> {
    let data_dir = config.data_dir()?;
    let remote = HttpRemote::new(&config.service.base_url, config.service.timeout())
      .map_err(|e| eyre!("Failed to create service client: {}", e))?;

    let gateway = Gateway::new(
      remote,
      StoreHandle::new(data_dir.join("records.db")),
      PendingQueue::new(&data_dir),
    );

    Ok(Self {
      config,
      data_dir,
      gateway,
    })
  }

  pub async fn run(&self, command: Command) -> Result<()> {
    match command {
      Command::Restaurants {
        cuisine,
        neighborhood,
      } => {
        let cuisine = Selection::from(cuisine.as_deref());
        let neighborhood = Selection::from(neighborhood.as_deref());
        let fetched = match (&cuisine, &neighborhood) {
          (Selection::All, Selection::All) => self.gateway.fetch_restaurants().await?,
          (Selection::Only(c), Selection::All) => self.gateway.fetch_by_cuisine(c).await?,
          (Selection::All, Selection::Only(n)) => self.gateway.fetch_by_neighborhood(n).await?,
          _ => {
            self
              .gateway
              .fetch_by_cuisine_and_neighborhood(&cuisine, &neighborhood)
              .await?
          }
        };
        print_fetched(fetched)
      }
      Command::Restaurant { id } => {
        let fetched = self.gateway.fetch_by_id(id).await?;
        let restaurant = &fetched.data;
        let shown = json!({
          "restaurant": restaurant,
          "url": links::url_for_restaurant(restaurant),
          "image": links::image_url_for_restaurant(restaurant),
        });
        print_fetched(fetched.map(|_| shown))
      }
      Command::Cuisines => print_fetched(self.gateway.fetch_cuisines().await?),
      Command::Neighborhoods => print_fetched(self.gateway.fetch_neighborhoods().await?),
      Command::Reviews { restaurant_id } => {
        let fetched = self.gateway.fetch_reviews(restaurant_id).await?;
        let pending = self.gateway.pending_reviews(restaurant_id)?;
        if !pending.is_empty() {
          eprintln!("{} review(s) offline, will retry", pending.len());
        }
        let reviews = fetched
          .data
          .iter()
          .map(dated)
          .collect::<Result<Vec<_>>>()?;
        print_fetched(fetched.map(|_| json!({ "reviews": reviews, "pending": pending })))
      }
      Command::Favorite { id } => {
        let restaurant = self.gateway.fetch_by_id(id).await?.data;
        let toggled = self.gateway.toggle_favorite(restaurant).await;
        if !toggled.synced {
          eprintln!("offline: favorite saved locally only");
        }
        print_json(&toggled.restaurant)
      }
      Command::Review {
        restaurant,
        name,
        rating,
        comments,
      } => {
        let review = Review::new(restaurant, name, rating, comments);
        let submission = self.gateway.submit_review(review, OfflineMode::Queue).await?;
        if submission.is_pending() {
          eprintln!("offline, will retry");
        }
        print_json(&submission.review)
      }
      Command::Pending => print_json(&self.gateway.queue().list()?),
      Command::Sync => {
        let reconciler = Reconciler::new(self.gateway.clone());
        match reconciler.on_connectivity_restored().await? {
          ReconcileOutcome::Completed(report) => {
            println!(
              "attempted {}, confirmed {}, dropped {}",
              report.attempted, report.confirmed, report.dropped
            );
          }
          ReconcileOutcome::AlreadyRunning => println!("reconciliation already running"),
        }
        Ok(())
      }
      Command::Watch => self.watch().await,
      Command::Assets { action } => self.run_assets(action).await,
    }
  }

  /// Reconcile every time the service becomes reachable, until interrupted.
  async fn watch(&self) -> Result<()> {
    let reconciler = Reconciler::new(self.gateway.clone());
    let mut reports = reconciler.subscribe();

    let remote = self.gateway.remote().clone();
    let mut monitor = ConnectivityMonitor::spawn(
      move || {
        let remote = remote.clone();
        async move { remote.is_reachable().await }
      },
      self.config.connectivity.probe_interval(),
    );

    info!(service = %self.gateway.remote().base_url(), "watching connectivity");

    loop {
      tokio::select! {
        event = monitor.next() => match event {
          Some(Event::ConnectivityRestored) => {
            info!("back online");
            reconciler.on_connectivity_restored().await?;
          }
          Some(Event::ConnectivityLost) => info!("offline"),
          None => break,
        },
        Ok(report) = reports.recv() => {
          if report.attempted > 0 {
            println!(
              "sent {} of {} offline review(s)",
              report.confirmed, report.attempted
            );
          }
        }
        _ = tokio::signal::ctrl_c() => break,
      }
    }

    Ok(())
  }

  fn asset_manager(&self) -> Result<AssetCacheManager<HttpFetcher>> {
    let assets = &self.config.assets;
    let origin = Url::parse(&assets.origin)
      .map_err(|e| eyre!("Invalid asset origin '{}': {}", assets.origin, e))?;
    let service = &self.config.service.base_url;
    let service_url =
      Url::parse(service).map_err(|e| eyre!("Invalid service URL '{}': {}", service, e))?;

    let config = AssetCacheConfig {
      prefix: assets.cache_prefix.clone(),
      version: assets.cache_version.clone(),
      origin,
      excluded: vec![service_url],
      manifest: assets.manifest.clone(),
    };
    let store = AssetStore::open(&self.data_dir.join("assets.db"))?;
    let fetcher = HttpFetcher::new(self.config.service.timeout())?;

    Ok(AssetCacheManager::new(config, store, fetcher))
  }

  async fn run_assets(&self, action: AssetsCommand) -> Result<()> {
    let manager = self.asset_manager()?;

    match action {
      AssetsCommand::Install => {
        let count = manager.install().await?;
        println!("cached {} assets in {}", count, manager.current_generation());
      }
      AssetsCommand::Activate => {
        let evicted = manager.activate()?;
        if evicted.is_empty() {
          println!("no obsolete caches");
        }
        for name in evicted {
          println!("deleted {}", name);
        }
      }
      AssetsCommand::Get { path } => {
        let request = manager.request_for(&path)?;
        let (response, source) = match manager.intercept(&request).await {
          Interception::Respond { response, source } => (response, describe(source)),
          Interception::Passthrough => (manager.fetcher().fetch(&request).await?, "passthrough"),
        };
        println!(
          "{} {} ({}, {} bytes)",
          response.status,
          request.url,
          source,
          response.body.len()
        );
      }
      AssetsCommand::List => {
        let current = manager.current_generation();
        for name in manager.store().generations()? {
          let marker = if name == current { "*" } else { " " };
          let urls = manager.store().urls(&name)?;
          println!("{} {} ({} assets)", marker, name, urls.len());
          for url in urls {
            println!("    {}", url);
          }
        }
      }
    }

    Ok(())
  }
}

fn describe(source: AssetSource) -> &'static str {
  match source {
    AssetSource::Cache => "cache",
    AssetSource::Network => "network",
    AssetSource::Offline => "offline",
  }
}

/// A review with its creation time rendered for display.
fn dated(review: &Review) -> Result<Value> {
  let mut value = serde_json::to_value(review)?;
  if let (Some(created), Some(fields)) = (review.created(), value.as_object_mut()) {
    fields.insert(
      "date".to_string(),
      Value::String(created.format("%B %-d, %Y").to_string()),
    );
  }
  Ok(value)
}

fn print_fetched<T: Serialize>(fetched: Fetched<T>) -> Result<()> {
  if fetched.is_offline() {
    eprintln!("offline: showing cached data");
  }
  print_json(&fetched.data)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_dated_review_gets_display_date() {
    let mut review = Review::new(1, "Steve", 4, "Good");
    review.created_at = Some(1_504_095_567_183);

    let value = dated(&review).unwrap();
    assert_eq!(value["date"], "August 30, 2017");
    assert_eq!(value["createdAt"], 1_504_095_567_183_i64);
  }

  #[test]
  fn test_undated_review_is_unchanged() {
    let mut review = Review::new(1, "Steve", 4, "Good");
    review.created_at = None;

    let value = dated(&review).unwrap();
    assert!(value.get("date").is_none());
  }
}
