//! pftablesd - pf table entry gauge collector daemon.
//!
//! Periodically counts the entries of configured pf(4) address tables and
//! prints one gauge per table per cycle as collectd `PUTVAL` lines, suitable
//! for the collectd exec plugin or plain log scraping.

use tikv_jemallocator::Jemalloc;
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

use pftables::config::Config;
use pftables::driver::list_tables;
use pftables::metrics::PutvalSink;
use pftables::poll::Poller;

#[cfg(any(
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd",
    target_os = "macos"
))]
use pftables::pf::PfDevice;
#[cfg(not(any(
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd",
    target_os = "macos"
)))]
use pftables::pf::MockPf;

/// pf table entry gauge collector daemon.
#[derive(Parser)]
#[command(name = "pftablesd", about = "pf table entry gauge collector", version)]
struct Args {
    /// Poll interval in seconds.
    #[arg(short, long, default_value = "10")]
    interval: u64,

    /// Path to a configuration file with `Table <name>` directives.
    #[arg(short, long)]
    config: Option<String>,

    /// Table to poll; repeatable, appended after file-configured tables.
    /// With no tables configured at all, every kernel table is polled.
    #[arg(short, long = "table", value_name = "NAME")]
    table: Vec<String>,

    /// Path to the pf control device (pf-bearing systems only).
    #[arg(long, default_value = "/dev/pf")]
    pf_device: String,

    /// Validation run: kernel-call failures are suppressed, not reported.
    #[arg(long)]
    dry_run: bool,

    /// Report errors even during a dry run.
    #[arg(long)]
    dummy_action: bool,

    /// Print the tables currently defined in the kernel and exit.
    #[arg(long)]
    list_tables: bool,

    /// Run a single poll cycle and exit.
    #[arg(long)]
    once: bool,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

/// Initializes the tracing subscriber with the appropriate log level.
/// Default level is INFO. Use -q for quiet mode (errors only).
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(format!("pftablesd={}", level).parse().unwrap())
        .add_directive(format!("pftables={}", level).parse().unwrap());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Builds the polling configuration from the config file and CLI tables.
fn build_config(args: &Args) -> Result<Config, String> {
    let mut config = match &args.config {
        Some(path) => {
            Config::load(path).map_err(|e| format!("cannot load {}: {}", path, e))?
        }
        None => Config::new(),
    };
    for name in &args.table {
        config
            .add_table(name)
            .map_err(|e| format!("bad table name '{}': {}", name, e))?;
    }
    config.no_action = args.dry_run;
    config.dummy_action = args.dummy_action;
    Ok(config)
}

fn main() {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    let config = match build_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    #[cfg(any(
        target_os = "freebsd",
        target_os = "openbsd",
        target_os = "netbsd",
        target_os = "macos"
    ))]
    let backend = PfDevice::with_path(&args.pf_device);
    #[cfg(not(any(
        target_os = "freebsd",
        target_os = "openbsd",
        target_os = "netbsd",
        target_os = "macos"
    )))]
    let backend = {
        warn!("no pf on this platform, using the sample mock backend");
        MockPf::with_sample_tables()
    };

    if args.list_tables {
        match list_tables(&backend) {
            Ok(tables) => {
                for name in tables {
                    println!("{}", name);
                }
                return;
            }
            Err(e) => {
                error!("table listing failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    info!("pftablesd {} starting", env!("CARGO_PKG_VERSION"));
    if config.tables.is_empty() {
        info!("Config: interval={}s, polling all kernel tables", args.interval);
    } else {
        info!(
            "Config: interval={}s, tables: {}",
            args.interval,
            config.tables.join(", ")
        );
    }
    if config.no_action {
        info!(
            "Dry-run mode: enumeration errors are {}",
            if config.should_report_errors() {
                "reported (dummy-action)"
            } else {
                "suppressed"
            }
        );
    }

    let poller = Poller::new(backend, config);
    let mut sink = PutvalSink::new(args.interval);
    let interval = Duration::from_secs(args.interval);

    // Setup graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    }) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    info!("Starting poll loop");

    let mut cycle_count: u64 = 0;
    while running.load(Ordering::SeqCst) {
        let stats = poller.run_cycle(&mut sink);
        cycle_count += 1;
        info!(
            "Cycle #{}: {} tables polled, {} failed",
            cycle_count, stats.tables_polled, stats.tables_failed
        );

        if args.once {
            break;
        }

        // Sleep with periodic checks for shutdown signal
        let sleep_interval = Duration::from_millis(100);
        let mut remaining = interval;
        while remaining > Duration::ZERO && running.load(Ordering::SeqCst) {
            let sleep_time = remaining.min(sleep_interval);
            std::thread::sleep(sleep_time);
            remaining = remaining.saturating_sub(sleep_time);
        }
    }

    info!("Shutting down");
}
