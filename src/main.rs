use anyhow::{bail, Context, Result};
use clap::Parser;
use grove::config::{default_bind, default_port, default_resources};
use grove::{full_version, Config, GroveServer, VERSION};
use grove_repo::Threshold;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "grove")]
#[command(about = "Browse and clone the git repositories in a directory tree", long_about = None)]
#[command(disable_version_flag = true)]
struct Cli {
    /// Directory to serve (defaults to the working directory)
    repositorydir: Option<PathBuf>,

    /// Interface to bind to
    #[arg(long)]
    bind: Option<String>,
    /// Port to listen on
    #[arg(long)]
    port: Option<u16>,
    /// Resources directory
    #[arg(long)]
    res: Option<PathBuf>,
    /// Who must be able to read an entry for it to be served: other, group or owner
    #[arg(long)]
    perms: Option<Threshold>,
    /// Config file (defaults to ~/.grove/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print major version and exit
    #[arg(long)]
    version: bool,
    /// Print full version and exit
    #[arg(long)]
    version_full: bool,
    /// Print default bind interface and exit
    #[arg(long)]
    show_bind: bool,
    /// Print default port and exit
    #[arg(long)]
    show_port: bool,
    /// Print default resources directory and exit
    #[arg(long)]
    show_res: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("{}", VERSION);
        return Ok(());
    }
    if cli.version_full {
        println!("{}", full_version());
        return Ok(());
    }
    if cli.show_bind {
        println!("{}", default_bind());
        return Ok(());
    }
    if cli.show_port {
        println!("{}", default_port());
        return Ok(());
    }
    if cli.show_res {
        println!("{}", default_resources().display());
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("grove=info".parse()?)
                .add_directive("grove_repo=info".parse()?),
        )
        .init();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(res) = cli.res {
        config.server.resources = res;
    }
    if let Some(perms) = cli.perms {
        config.access.threshold = perms;
    }

    let cwd = std::env::current_dir().context("Failed to get working directory")?;
    let root = match cli.repositorydir {
        Some(dir) => cwd.join(dir),
        None => cwd,
    };
    let root = root
        .canonicalize()
        .with_context(|| format!("Cannot serve {}", root.display()))?;
    if !root.is_dir() {
        bail!("{} is not a directory", root.display());
    }

    info!("Version: {}", full_version());
    info!(
        "Permission threshold: {}, dispatch: {:?}",
        config.access.threshold, config.access.dispatch
    );

    GroveServer::new(&config, root)
        .with_version(full_version())
        .run()
        .await
}
