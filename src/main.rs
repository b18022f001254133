use billing_bridge::application::bridge::BillingBridge;
use billing_bridge::config::BridgeConfig;
use billing_bridge::infrastructure::in_memory::{Catalog, InMemoryBillingService};
use billing_bridge::interfaces::csv::command_reader::CommandReader;
use billing_bridge::interfaces::json::response_writer::ResponseWriter;
use billing_bridge::interfaces::script::ScriptRunner;
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Command script CSV file (header: op,product,payload,replaces)
    script: PathBuf,

    /// Product catalog JSON for the simulated store
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Store license key. Falls back to RNB_GOOGLE_PLAY_LICENSE_KEY.
    #[arg(long)]
    license_key: Option<String>,

    /// Report billing as unavailable on this device
    #[arg(long)]
    unavailable: bool,

    /// Log debug diagnostics to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "billing_bridge=debug" } else { "billing_bridge=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let catalog = match &cli.catalog {
        Some(path) => Catalog::from_reader(File::open(path).into_diagnostic()?).into_diagnostic()?,
        None => Catalog::default(),
    };
    let service = InMemoryBillingService::new(catalog).with_availability(!cli.unavailable);
    let config = match cli.license_key {
        Some(key) => BridgeConfig::new(key),
        None => BridgeConfig::from_env(),
    };
    let bridge = BillingBridge::new(Arc::new(service), config);
    let runner = ScriptRunner::new(&bridge);

    let file = File::open(cli.script).into_diagnostic()?;
    let reader = CommandReader::new(file);
    let stdout = io::stdout();
    let mut writer = ResponseWriter::new(stdout.lock());
    for command in reader.commands() {
        match command {
            Ok(command) => {
                let written = match runner.execute(&command).await {
                    Ok(value) => writer.write_result(command.op, &value),
                    Err(e) => writer.write_error(command.op, &e),
                };
                written.into_diagnostic()?;
            }
            Err(e) => {
                eprintln!("Error reading command: {}", e);
            }
        }
    }

    bridge.close().await.into_diagnostic()?;
    Ok(())
}
