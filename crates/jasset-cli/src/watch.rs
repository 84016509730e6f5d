//! # Watch
//!
//! Keeps an editor database in step with the project folders and rewrites
//! the `.resdb` caches whenever something changed.

use std::thread;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Args;
use jasset_config::Config;
use jasset_db::{AssetDb, AssetRegistry, AssetSource};

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Sources to watch (default: all loose sources)
    #[arg(short, long = "source", value_name = "SOURCE")]
    sources: Vec<AssetSource>,

    /// Poll interval in milliseconds (default: monitor.poll_interval_ms)
    #[arg(long)]
    interval: Option<u64>,

    /// Stop after this many polls
    #[arg(long)]
    polls: Option<u64>,
}

pub fn run(config: &Config, args: WatchArgs) -> Result<()> {
    if !config.project.editor {
        bail!("Watching requires editor mode");
    }

    let mut config = config.clone();
    config.monitor.enabled = true;
    if let Some(interval) = args.interval {
        config.monitor.poll_interval_ms = interval;
    }
    let interval = Duration::from_millis(config.monitor.poll_interval_ms.max(1));

    let mask = crate::mask_of(&args.sources);
    let mut db = AssetDb::new(&config, AssetRegistry::with_defaults());
    db.initialize(mask);

    let watched: Vec<AssetSource> = mask
        .iter()
        .filter(|s| db.source(*s).is_monitored())
        .collect();
    if watched.is_empty() {
        bail!("No source folder could be watched");
    }

    println!();
    println!("  Watching {} source(s)", watched.len());
    for source in &watched {
        println!(
            "    {:<9} {}",
            source.name(),
            db.source(*source).vfs().root_path().display()
        );
    }

    let mut polls = 0u64;
    loop {
        for source in &watched {
            let changed = db.refresh(source.mask());
            if changed == 0 {
                continue;
            }
            println!("  {:<9} {} entries changed", source.name(), changed);
            if let Err(e) = db.save_to_asset_db(*source) {
                tracing::warn!(source = %source, error = %e, "Failed to update cache");
            }
        }

        polls += 1;
        if args.polls.is_some_and(|limit| polls >= limit) {
            return Ok(());
        }
        thread::sleep(interval);
    }
}
