use eli::cli;
use eli::config;
use eli::logs;

use clap::Parser;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "eli",
    version,
    about = "Talk with Eli; conversations are kept in a plain-text transcript"
)]
struct Cli {
    /// Path to configuration file (default: <eli home>/config.yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Transcript file to use instead of the configured one
    #[arg(long)]
    session_file: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // An explicit --config must exist; the implicit default may be absent.
    let mut cfg = match &cli.config {
        Some(path) => config::Config::load(path).await?,
        None => config::Config::load_or_default(&eli::eli_home().join("config.yaml")).await?,
    };
    if let Some(file) = cli.session_file {
        cfg.session.file = file;
    }
    cfg.validate()?;

    logs::init(cfg.log_level);
    info!(
        provider = cfg.provider.as_str(),
        model = %cfg.model,
        session_file = %cfg.session.file.display(),
        "configuration loaded"
    );

    cli::run(&cfg).await
}
