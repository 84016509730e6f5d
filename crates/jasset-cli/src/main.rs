//! # jasset CLI
//!
//! Command-line front end for the jasset asset database: scan project
//! sources, resolve assets, manage `.resdb` caches and build JPAK packages.

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use jasset_config::logging::{init_logging, LogLevel};
use jasset_config::Config;
use jasset_db::{AssetDb, AssetRegistry, AssetSource, SourceMask};
use jasset_hash::{Uuid16, Uuid8, DEFAULT_BLOCK_SIZE};
use jasset_pack::PackReader;
use jasset_vfs::{EntryInfo, Vfs};

mod watch;

/// jasset - layered asset database for 2D game projects
#[derive(Parser)]
#[command(name = "jasset")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Project root (overrides the configured one)
    #[arg(long, global = true, env = "JASSET_PROJECT_ROOT")]
    project: Option<PathBuf>,

    /// Open the database in runtime mode (no sidecars, caches or packaging)
    #[arg(long, global = true)]
    runtime: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan sources and report their state
    Scan {
        /// Sources to scan (default: all)
        #[arg(short, long = "source", value_name = "SOURCE")]
        sources: Vec<AssetSource>,
    },

    /// List the entries under a folder of one source
    Ls {
        /// Source to list
        #[arg(short, long, default_value = "game")]
        source: AssetSource,

        /// Folder path relative to the source root
        #[arg(default_value = "")]
        path: String,

        /// Descend into subfolders
        #[arg(short, long)]
        recursive: bool,
    },

    /// Resolve an asset across sources by path, or by uuid with --uuid
    Find {
        #[arg(value_name = "PATH|UUID")]
        target: String,

        #[arg(long)]
        uuid: bool,
    },

    /// Print the content hashes of a file
    Hash {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[arg(long, default_value_t = DEFAULT_BLOCK_SIZE)]
        block_size: usize,
    },

    /// Package sources into <destination>/<source>.jpak with a .resdb index
    Pack {
        #[arg(value_name = "DIR")]
        destination: PathBuf,

        /// Sources to package (default: all)
        #[arg(short, long = "source", value_name = "SOURCE")]
        sources: Vec<AssetSource>,
    },

    /// List the contents of a JPAK package
    Inspect {
        #[arg(value_name = "PACKAGE")]
        package: PathBuf,
    },

    /// Manage .resdb caches
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },

    /// Watch source folders and keep the database current
    Watch(watch::WatchArgs),

    /// Print the effective configuration as TOML
    Config,
}

#[derive(Subcommand)]
enum CacheCommands {
    /// Scan sources and write their caches
    Save {
        #[arg(short, long = "source", value_name = "SOURCE")]
        sources: Vec<AssetSource>,
    },
    /// Rebuild the trees from the caches alone
    Load {
        #[arg(short, long = "source", value_name = "SOURCE")]
        sources: Vec<AssetSource>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(LogLevel::from_verbosity(cli.verbose));

    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(project) = cli.project {
        config.project.root = project;
    }
    if cli.runtime {
        config.project.editor = false;
    }

    match cli.command {
        Commands::Scan { sources } => cmd_scan(&config, mask_of(&sources)),
        Commands::Ls {
            source,
            path,
            recursive,
        } => cmd_ls(&config, source, &path, recursive),
        Commands::Find { target, uuid } => cmd_find(&config, &target, uuid),
        Commands::Hash { file, block_size } => cmd_hash(&file, block_size),
        Commands::Pack {
            destination,
            sources,
        } => cmd_pack(&config, &destination, mask_of(&sources)),
        Commands::Inspect { package } => cmd_inspect(&package),
        Commands::Cache { command } => match command {
            CacheCommands::Save { sources } => cmd_cache_save(&config, mask_of(&sources)),
            CacheCommands::Load { sources } => cmd_cache_load(&config, mask_of(&sources)),
        },
        Commands::Watch(args) => watch::run(&config, args),
        Commands::Config => {
            print!(
                "{}",
                toml::to_string_pretty(&config).context("Failed to render configuration")?
            );
            Ok(())
        }
    }
}

/// Selected sources, or all of them when none were named
fn mask_of(sources: &[AssetSource]) -> SourceMask {
    if sources.is_empty() {
        return SourceMask::ALL;
    }
    sources
        .iter()
        .fold(SourceMask::NONE, |mask, source| mask | *source)
}

/// Database for one-shot commands; watching is left to `jasset watch`
fn open_db(config: &Config, mask: SourceMask) -> AssetDb {
    let mut config = config.clone();
    config.monitor.enabled = false;
    let mut db = AssetDb::new(&config, AssetRegistry::with_defaults());
    db.initialize(mask);
    db
}

fn kind_label(info: EntryInfo) -> &'static str {
    if info.is_folder() {
        "dir"
    } else if info.is_packed() {
        "packed"
    } else if info.is_runtime() {
        "runtime"
    } else {
        "file"
    }
}

fn cmd_scan(config: &Config, mask: SourceMask) -> Result<()> {
    let db = open_db(config, mask);
    println!(
        "{:<9} {:<14} {:>8} {:>8}  ROOT",
        "SOURCE", "STATE", "ENTRIES", "META"
    );
    for source in mask.iter() {
        let vfs_source = db.source(source);
        println!(
            "{:<9} {:<14} {:>8} {:>8}  {}",
            source.name(),
            vfs_source.state().as_str(),
            vfs_source.vfs().entry_count().saturating_sub(1),
            vfs_source.meta_count(),
            vfs_source.vfs().root_path().display()
        );
    }
    Ok(())
}

fn cmd_ls(config: &Config, source: AssetSource, path: &str, recursive: bool) -> Result<()> {
    let db = open_db(config, source.mask());
    let vfs: &Vfs = db.source(source).vfs();
    let id = vfs.index_of_file_entry(&vfs.full_path(path));
    let Some(entry) = vfs.get_entry(id) else {
        bail!("'{}' not found in {}", path, source);
    };

    let listing: Vec<_> = if recursive {
        vfs.descendants(id).into_iter().skip(1).collect()
    } else if entry.is_folder() {
        vfs.children(id).to_vec()
    } else {
        vec![id]
    };

    for child in listing {
        let (Some(entry), Some(rel)) = (vfs.get_entry(child), vfs.relative_path(child)) else {
            continue;
        };
        let info = entry.data_info();
        let suffix = if info.is_folder() { "/" } else { "" };
        println!("{:<8} {}{}", kind_label(info), rel, suffix);
    }
    Ok(())
}

fn cmd_find(config: &Config, target: &str, by_uuid: bool) -> Result<()> {
    let mut db = open_db(config, SourceMask::ALL);
    let asset_ref = if by_uuid {
        let uuid: Uuid8 = target
            .parse()
            .with_context(|| format!("Invalid uuid '{}'", target))?;
        db.find_asset_by_uuid(uuid)
    } else {
        db.find_asset(target)
    };

    let (Some(source), Some(asset)) = (asset_ref.asset_source(), db.get_asset_by_uuid(asset_ref))
    else {
        bail!("Asset '{}' not found", target);
    };
    println!(
        "{} {} {} {}",
        source.name(),
        asset.path(),
        asset.uuid(),
        asset.type_name()
    );
    Ok(())
}

fn cmd_hash(file: &Path, block_size: usize) -> Result<()> {
    if block_size == 0 {
        bail!("Block size must be positive");
    }
    let open = || File::open(file).with_context(|| format!("Failed to open {}", file.display()));
    let short = Uuid8::compute_hash(open()?, block_size);
    let long = Uuid16::compute_hash(open()?, block_size);
    println!("uuid8  {}", short);
    println!("uuid16 {}", long);
    Ok(())
}

fn cmd_pack(config: &Config, destination: &Path, mask: SourceMask) -> Result<()> {
    if !config.project.editor {
        bail!("Packaging requires editor mode");
    }
    std::fs::create_dir_all(destination)
        .with_context(|| format!("Failed to create {}", destination.display()))?;
    let mut db = open_db(config, mask);
    let packed = db.pack_assets(mask, destination);
    if packed == u32::MAX {
        bail!("Packaging into {} failed", destination.display());
    }
    println!("Packed {} files into {}", packed, destination.display());
    Ok(())
}

fn cmd_inspect(package: &Path) -> Result<()> {
    let reader = PackReader::open(package)
        .with_context(|| format!("Failed to open package {}", package.display()))?;
    println!("{} files in {}", reader.len(), package.display());
    for entry in reader.entries() {
        println!("{:>10}  {}", entry.length, entry.path);
    }
    Ok(())
}

fn cmd_cache_save(config: &Config, mask: SourceMask) -> Result<()> {
    let db = open_db(config, mask);
    for source in mask.iter() {
        if db.source(source).is_packed() {
            continue;
        }
        let count = db
            .save_to_asset_db(source)
            .with_context(|| format!("Failed to save cache for {}", source))?;
        println!(
            "{:<9} {} records -> {}",
            source.name(),
            count,
            db.source(source).cache_path().display()
        );
    }
    Ok(())
}

fn cmd_cache_load(config: &Config, mask: SourceMask) -> Result<()> {
    let mut db = AssetDb::new(config, AssetRegistry::with_defaults());
    for source in mask.iter() {
        match db.load_from_asset_db(source) {
            Ok(count) => println!("{:<9} {} records restored", source.name(), count),
            Err(e) => println!("{:<9} no usable cache ({})", source.name(), e),
        }
    }
    Ok(())
}
