//! Demo Host
//!
//! Links the greeter module, boots an NVOS runtime, echoes every log event
//! to stdout and greets once the modules are loaded.
//!
//! # Usage
//!
//! ```bash
//! cargo run --package nvos-demo-host -- --config demos/host/nvos.toml
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use clap::Parser;
use greeter::Greeter;
use nvos::prelude::*;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "nvos-demo-host", about = "A minimal NVOS host")]
struct Args {
    /// Configuration file, merged over any nvos.toml in the current directory.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration profile, e.g. `development` or `production`.
    #[arg(short, long)]
    profile: Option<String>,

    /// Exit right after loading instead of waiting for Ctrl+C or SIGTERM.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut builder = NvosRuntime::builder();
    if let Some(path) = &args.config {
        builder = builder.config_file(path);
    }
    if let Some(profile) = &args.profile {
        builder = builder.profile(profile);
    }
    let runtime = builder.build()?;

    let problems = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&problems);
    runtime.log().subscribe(Arc::new(move |event: &LogEvent| {
        if event.level >= LogLevel::Warn {
            counter.fetch_add(1, Ordering::Relaxed);
        }
        println!("[{}] {}", event.level.as_str().to_uppercase(), event.message);
    }));

    let report = runtime.load_discovered()?;
    if !report.is_clean() {
        warn!(failed = report.failed.len(), "Some modules failed to load");
    }

    match ServiceLocator::resolve::<dyn Greeter>() {
        Ok(greeter) => info!("{}", greeter.greet("NVOS")),
        Err(e) => warn!("No greeter available: {}", e),
    }

    if !args.once {
        info!("Host is running. Press Ctrl+C to stop.");
        nvos::runtime::wait_for_shutdown().await?;
    }
    let shutdown = runtime.shutdown();

    println!(
        "Host exiting: {} teardown failures, {} warnings or errors logged",
        shutdown.failures.len(),
        problems.load(Ordering::Relaxed)
    );
    Ok(())
}
