use clap::Parser;
use std::path::PathBuf;
use tracing::debug;

use kubeinit::deploy::{self, DeployRequest};
use kubeinit::subprocess::SubprocessManager;

/// Apply Kubernetes manifests for every environment directory under a root
#[derive(Parser)]
#[command(name = "kubeinit")]
#[command(version)]
#[command(about = "Render, apply and wait on Kubernetes manifests per environment directory", long_about = None)]
struct Cli {
    /// Log every command without executing anything
    #[arg(long)]
    dry_run: bool,

    /// Extra options inserted after the kubectl program name
    #[arg(long, default_value = "")]
    kubectl_options: String,

    /// Root directory containing one subdirectory per deployment
    #[arg(long)]
    directory: PathBuf,

    /// Environment overlay to render within each deployment directory
    #[arg(long)]
    environment: String,

    /// Enable verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() {
    let cli = parse_args();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .with_target(cli.verbose >= 2)
        .init();

    debug!(
        "kubeinit started: directory={}, environment={}, dry_run={}",
        cli.directory.display(),
        cli.environment,
        cli.dry_run
    );

    let request = DeployRequest {
        root: cli.directory,
        environment: cli.environment,
        kubectl_options: cli.kubectl_options,
        dry_run: cli.dry_run,
    };

    if let Err(err) = deploy::run(&request, SubprocessManager::production()).await {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

/// Parse the command line, exiting 0 for help/version and 1 for usage
/// errors such as missing required arguments.
fn parse_args() -> Cli {
    use clap::error::ErrorKind;

    match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            let _ = err.print();
            std::process::exit(code);
        }
    }
}
