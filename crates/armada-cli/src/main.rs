//! `armada` – one fleet coordinator with an operator shell.
//!
//! On start the binary:
//!
//! 1. Loads `~/.armada/config.toml`, writing a default one on first run.
//! 2. Releases resources a crashed previous run left in the catalog.
//! 3. Registers every `robot_description.yaml` under the description root.
//! 4. Serves peers over WebSocket, relays config sync to them and asks them
//!    for their configs.
//! 5. Drops the user into an interactive REPL.
//!
//! Ctrl-C unloads every local robot before exiting.
//!
//! Launching, graph queries, planning and actuation are served by the
//! in-process simulation from `armada-hal`.

mod config;
mod repl;

use colored::Colorize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use armada_catalog::ResourceCatalog;
use armada_hal::{Collaborators, SimWorld};
use armada_kernel::ResourceTracker;
use armada_middleware::{PeerServer, ServiceHandler, SyncBus, WsPeerTransport, spawn_sync_relay};
use armada_runtime::RobotManager;
use tracing::{info, warn};

fn main() {
    // The OTLP exporter has to exist before the Tokio runtime is built.
    let _telemetry = armada_runtime::init_tracing("armada");

    print_banner();

    let cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!("  Config loaded from {}", config::config_path().display().to_string().bold());
            cfg
        }
        Ok(None) => first_run_config(),
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("{}: {}", "Cannot start async runtime".red(), e);
            return;
        }
    };

    let manager = match runtime.block_on(start(&cfg)) {
        Ok(manager) => manager,
        Err(e) => {
            eprintln!("{}: {}", "Startup failed".red(), e);
            return;
        }
    };

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        let manager = manager.clone();
        let handle = runtime.handle().clone();
        if let Err(e) = ctrlc::set_handler(move || {
            println!();
            println!("{}", "⚠  Ctrl-C received – unloading robots …".yellow().bold());
            shutdown.store(true, Ordering::SeqCst);
            handle.block_on(manager.shutdown());
            println!("{}", "  ✓ Exiting Armada.".green());
            std::process::exit(0);
        }) {
            warn!(error = %e, "Failed to install Ctrl-C handler; robots will not be unloaded on Ctrl-C");
        }
    }

    println!();
    println!("  Type {} for a list of commands.\n", "/help".bold().cyan());

    repl::run(&runtime, &manager, shutdown);
    runtime.block_on(manager.shutdown());
}

/// Build the coordinator and connect it to its peers.
async fn start(cfg: &config::Config) -> Result<Arc<RobotManager>, String> {
    let world = Arc::new(SimWorld::permissive());
    let status_feed = world
        .take_status_feed()
        .ok_or_else(|| "status feed already taken".to_string())?;

    let mut tracker = ResourceTracker::new(world.clone());
    let catalog_file = cfg.catalog_file(&config::home_dir());
    if let Some(parent) = catalog_file.parent() {
        std::fs::create_dir_all(parent).map_err(|e| format!("Failed to create catalog directory: {}", e))?;
    }
    match ResourceCatalog::open(&catalog_file) {
        Ok(catalog) => tracker = tracker.with_catalog(catalog),
        Err(e) => warn!(path = %catalog_file.display(), error = %e, "running without a resource catalog"),
    }
    let tracker = Arc::new(tracker);
    let orphans = tracker.release_orphans().await;
    if orphans > 0 {
        println!("  Released {} resource(s) left by a previous run.", orphans.to_string().yellow());
    }

    let bus = SyncBus::default();
    let peers: HashMap<String, String> = cfg.peers.clone().into_iter().collect();
    let transport = Arc::new(WsPeerTransport::new(peers, cfg.forward_timeout()));
    let peer_urls = transport.peer_urls();

    let manager = Arc::new(
        RobotManager::new(cfg.manager_config(), Collaborators::uniform(world), bus.clone(), transport)
            .with_tracker(tracker),
    );

    let added = manager.discover(&cfg.description_root).await;
    println!(
        "  {} robot config(s) found under {}",
        added.to_string().bold(),
        cfg.description_root.dimmed()
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.listen_port));
    let handler: Arc<dyn ServiceHandler> = manager.clone();
    let server = PeerServer::new(handler, bus.clone());
    tokio::spawn(async move {
        if let Err(e) = server.serve(addr).await {
            warn!(error = %e, "peer server stopped");
        }
    });
    let _relay = spawn_sync_relay(&bus, cfg.namespace.clone(), peer_urls, cfg.forward_timeout());
    let _status = manager.spawn_status_listener(status_feed);
    let _sync = manager.start_sync().await;

    info!(namespace = %cfg.namespace, port = cfg.listen_port, peers = cfg.peers.len(), "coordinator started");
    println!(
        "  Coordinator {} listening on port {} with {} peer(s)",
        cfg.namespace.bold().cyan(),
        cfg.listen_port,
        cfg.peers.len()
    );
    Ok(manager)
}

fn first_run_config() -> config::Config {
    let mut cfg = config::Config::default();
    config::apply_env_overrides(&mut cfg);
    match config::save(&cfg) {
        Ok(()) => println!(
            "  {} Default config written to {}",
            "✓".green().bold(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }
    cfg
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"    ___                        __     "#.bold().cyan());
    println!("{}", r#"   /   |  _________ ___  ____ _/ /___ _"#.bold().cyan());
    println!("{}", r#"  / /| | / ___/ __ `__ \/ __ `/ / __ `/"#.bold().cyan());
    println!("{}", r#" / ___ |/ /  / / / / / / /_/ / / /_/ / "#.bold().cyan());
    println!("{}", r#"/_/  |_/_/  /_/ /_/ /_/\__,_/_/\__,_/  "#.bold().cyan());
    println!();
    println!("  {} {}", "Armada".bold(), format!("v{}", env!("CARGO_PKG_VERSION")).dimmed());
    println!("  Robot fleet coordinator");
    println!();
}
