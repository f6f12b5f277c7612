//! Command line interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "dineline")]
#[command(about = "Offline-first access to restaurant reviews")]
#[command(version)]
pub struct Cli {
  /// Path to config file (default: $XDG_CONFIG_HOME/dineline/config.yaml)
  #[arg(short, long, global = true)]
  pub config: Option<PathBuf>,

  #[command(subcommand)]
  pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
  /// List restaurants, optionally filtered ("all" matches everything)
  #[command(alias = "r")]
  Restaurants {
    #[arg(long)]
    cuisine: Option<String>,
    #[arg(long)]
    neighborhood: Option<String>,
  },
  /// Show one restaurant
  Restaurant { id: u64 },
  /// List distinct cuisines
  Cuisines,
  /// List distinct neighborhoods
  Neighborhoods,
  /// Show reviews of a restaurant, including ones waiting to be sent
  Reviews { restaurant_id: u64 },
  /// Toggle a restaurant's favorite flag
  Favorite { id: u64 },
  /// Submit a review; queued for later if the service is unreachable
  Review {
    #[arg(long)]
    restaurant: u64,
    #[arg(long)]
    name: String,
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=5))]
    rating: u8,
    #[arg(long, default_value = "")]
    comments: String,
  },
  /// List reviews waiting to be sent
  Pending,
  /// Send queued reviews now
  Sync,
  /// Watch connectivity and send queued reviews whenever it returns
  Watch,
  /// Manage the static asset cache
  Assets {
    #[command(subcommand)]
    action: AssetsCommand,
  },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum AssetsCommand {
  /// Cache every manifest asset under the current generation
  Install,
  /// Delete obsolete cache generations
  Activate,
  /// Request an asset through the cache
  Get { path: String },
  /// Show cache generations and their contents
  List,
}
