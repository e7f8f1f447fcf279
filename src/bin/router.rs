//! OSC Router daemon
//!
//! Listens for OSC on UDP, routes messages through the configured mappings
//! and logs the resulting update commands. The mapping file is reloaded
//! whenever it changes on disk.

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::{unbounded, Receiver};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use osc_router::{
    apply::{apply_batch, LogSink},
    config::AppConfig,
    mapping::{presets, RoutingTable, SharedMappings},
    server::OscRouter,
};

const STATS_INTERVAL: Duration = Duration::from_secs(10);

/// Route OSC control messages to mapped targets.
#[derive(Parser, Debug)]
#[command(name = "osc-router")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (TOML, or JSON by extension). Defaults to the user config dir.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address, overrides the config.
    #[arg(long)]
    ip: Option<String>,

    /// UDP port, overrides the config.
    #[arg(short, long)]
    port: Option<u16>,

    /// Add the facial blend shape preset for this mesh.
    #[arg(long, value_name = "MESH")]
    face_preset: Option<String>,

    /// Print the routing table and exit.
    #[arg(long)]
    print_table: bool,

    /// Debug logging.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = match &args.config {
        Some(path) => Some(path.clone()),
        None => AppConfig::default_path().ok().filter(|p| p.exists()),
    };
    let mut config = match &config_path {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => {
            tracing::info!("No config file, using defaults");
            AppConfig::default()
        }
    };

    if let Some(ip) = &args.ip {
        config.server.ip = ip.clone();
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(mesh) = &args.face_preset {
        let added = presets::add_face_shape_keys(&mut config.mappings, mesh);
        tracing::info!("Added {} face shape key mappings for {}", added, mesh);
    }
    config.validate()?;

    if args.print_table {
        print_table(&RoutingTable::build(&config.mappings)?);
        return Ok(());
    }

    let mappings = SharedMappings::new(config.mappings.clone());
    let mut router = OscRouter::new(&config, mappings.clone());
    let addr = router.start(&config.server.ip, config.server.port)?;
    tracing::info!(
        "Routing {} mapping records, listening on {}",
        config.mappings.len(),
        addr
    );

    let mut sink = LogSink::default();
    let mut reloader = config_path.and_then(|path| {
        Reloader::new(path, args.face_preset.clone())
            .map_err(|e| tracing::warn!("Config reload disabled: {}", e))
            .ok()
    });
    let mut last_stats = Instant::now();

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        let outcome = router.tick();
        if !outcome.commands.is_empty() {
            apply_batch(&mut sink, &outcome.commands);
        }
        let Some(delay) = outcome.next_delay() else {
            break;
        };

        if let Some(reloader) = reloader.as_mut() {
            reloader.poll(&mappings);
        }

        if last_stats.elapsed() >= STATS_INTERVAL {
            last_stats = Instant::now();
            if let Some(stats) = router.runtime().listener_stats() {
                let processed = router.processor().stats();
                tracing::info!(
                    "Stats: {} datagrams, {} messages, {} decode errors, {} dropped, {} commands, {} unrouted",
                    stats.datagrams,
                    stats.messages,
                    stats.decode_errors,
                    stats.dropped,
                    processed.commands,
                    processed.unrouted,
                );
            }
        }

        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Shutting down...");
                break;
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }

    router.stop();
    tracing::info!("Applied {} updates", sink.applied);
    Ok(())
}

/// Watches the config file and swaps in new mappings when it changes
struct Reloader {
    path: PathBuf,
    face_preset: Option<String>,
    changes: Receiver<()>,
    _watcher: RecommendedWatcher,
}

impl Reloader {
    fn new(path: PathBuf, face_preset: Option<String>) -> notify::Result<Self> {
        let (tx, changes) = unbounded();
        let file_name = path.file_name().map(|n| n.to_os_string());

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let Ok(event) = res else { return };
                let touches_config = event
                    .paths
                    .iter()
                    .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                if touches_config && matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                    let _ = tx.send(());
                }
            },
            notify::Config::default(),
        )?;

        // Editors often replace the file rather than write it in place.
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        watcher.watch(dir, RecursiveMode::NonRecursive)?;

        Ok(Self {
            path,
            face_preset,
            changes,
            _watcher: watcher,
        })
    }

    fn poll(&mut self, mappings: &SharedMappings) {
        if self.changes.try_iter().count() == 0 {
            return;
        }

        match AppConfig::load(&self.path) {
            Ok(mut config) => {
                if let Some(mesh) = &self.face_preset {
                    presets::add_face_shape_keys(&mut config.mappings, mesh);
                }
                tracing::info!(
                    "Reloaded {} mapping records from {}",
                    config.mappings.len(),
                    self.path.display()
                );
                mappings.replace(config.mappings);
            }
            Err(e) => tracing::warn!("Keeping previous mappings, reload failed: {}", e),
        }
    }
}

fn print_table(table: &RoutingTable) {
    println!("\n=== Routing Table ({} rules) ===", table.rule_count());
    for address in table.addresses() {
        let Some(rules) = table.lookup(address) else {
            continue;
        };
        println!("  {}", if address.is_empty() { "<empty>" } else { address });
        for rule in rules {
            let targets: Vec<String> = rule.targets().map(|t| t.to_string()).collect();
            println!(
                "    [{:.3}, {:.3}] -> [{:.3}, {:.3}]{}{}  {}",
                rule.input.min,
                rule.input.max,
                rule.output.min,
                rule.output.max,
                if rule.clamp { " clamp" } else { "" },
                if rule.invert { " invert" } else { "" },
                if targets.is_empty() { "<no target>".to_string() } else { targets.join(", ") },
            );
        }
    }
    println!();
}
