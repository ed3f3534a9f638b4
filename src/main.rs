use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use serial_bridge::supervisor::{default_base_dir, BridgeSupervisor};

/// Command-line arguments. One run mode, no subcommands.
#[derive(Parser, Debug)]
#[command(
    version,
    about = "Persistent serial-to-TCP bridge.",
    long_about = "Exposes one serial (UART) device as a TCP endpoint, keeping the serial \
link alive across device replug and TCP client churn. Multiple instances \
coexist on one host through per-instance slot leasing."
)]
struct Args {
    /// Installation directory holding config, state and logs
    /// (default: the executable's directory).
    #[arg(long, value_name = "DIR")]
    base_dir: Option<PathBuf>,
}

fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let base_dir = args.base_dir.unwrap_or_else(default_base_dir);

    if let Err(e) = BridgeSupervisor::new(base_dir).run() {
        // Last resort: show something even if logging failed.
        eprintln!("FATAL: {e}");
        std::process::exit(1);
    }
}
