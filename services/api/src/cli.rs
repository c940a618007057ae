use crate::demo::{run_demo, DemoArgs};
use crate::server;
use accreditation::error::AppError;
use accreditation::workflows::vault::DEFAULT_SCAN_BATCH;
use clap::{Args, Parser, Subcommand};

const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;

#[derive(Parser, Debug)]
#[command(
    name = "accreditation-api",
    about = "Run and demonstrate the accredited-investor verification service",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Walk through submission, upload, review, expiry, and retention on a simulated clock
    Demo(DemoArgs),
}

#[derive(Args, Debug)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Seconds between background retention and scan sweeps; 0 disables them and leaves
    /// POST /api/v1/maintenance/sweep to an external scheduler
    #[arg(long, default_value_t = DEFAULT_SWEEP_INTERVAL_SECS)]
    pub(crate) sweep_interval_secs: u64,
    /// Maximum documents scanned per sweep
    #[arg(long, default_value_t = DEFAULT_SCAN_BATCH)]
    pub(crate) scan_limit: usize,
}

impl Default for ServeArgs {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            scan_limit: DEFAULT_SCAN_BATCH,
        }
    }
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Demo(args) => run_demo(args),
    }
}
