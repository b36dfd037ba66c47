//! Command line client for depot repositories.

use anyhow::{Context, Result, bail};
use bytes::Bytes;
use clap::{Args, Parser, Subcommand};
use depot_client::{ClientConfig, RepoUrl, Synchronizer};
use depot_core::Appliance;
use depot_core::repo::PROTO_APP;
use depot_storage::{FilesystemBackend, StorageProvider};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "depot")]
#[command(about = "Publish and fetch signed appliances")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct ClientConfigArgs {
    /// Client config file path
    #[arg(long, env = "DEPOT_CLIENT_CONFIG")]
    client_config: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
}

/// Naming of an appliance bundle.
#[derive(Args, Clone, Default)]
struct ApplianceArgs {
    /// Target operating system; with --arch names the artifact {os}-{arch}-{name}:{tag}
    #[arg(long)]
    os: Option<String>,

    /// Target architecture
    #[arg(long)]
    arch: Option<String>,

    /// Appliance tag (default: latest)
    #[arg(long)]
    tag: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Save a repository url
    Add {
        /// Repository url (http(s)://host[:port]/namespace/repository)
        url: String,
        #[command(flatten)]
        client: ClientConfigArgs,
    },
    /// Forget a saved repository url
    Remove {
        url: String,
        #[command(flatten)]
        client: ClientConfigArgs,
    },
    /// List saved repositories, or the verified artifacts of one
    List {
        url: Option<String>,
        #[command(flatten)]
        client: ClientConfigArgs,
    },
    /// Upload a file to a repository
    Push {
        url: String,
        file: PathBuf,
        /// Artifact name (default: the file name)
        #[arg(long)]
        name: Option<String>,
        #[command(flatten)]
        appliance: ApplianceArgs,
        #[command(flatten)]
        client: ClientConfigArgs,
    },
    /// Download an artifact after verifying the manifest and its hash
    Pull {
        url: String,
        name: String,
        /// Copy the verified artifact here
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        client: ClientConfigArgs,
    },
    /// Fetch and verify a repository manifest
    Sync {
        url: String,
        #[command(flatten)]
        client: ClientConfigArgs,
    },
    /// Remove an artifact from a repository
    Delete {
        url: String,
        name: String,
        #[command(flatten)]
        client: ClientConfigArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let Cli { command } = Cli::parse();

    match command {
        Commands::Add { url, client } => handle_add_command(&url, &client).await,
        Commands::Remove { url, client } => handle_remove_command(&url, &client).await,
        Commands::List { url, client } => handle_list_command(url.as_deref(), &client).await,
        Commands::Push {
            url,
            file,
            name,
            appliance,
            client,
        } => handle_push_command(&url, &file, name, &appliance, &client).await,
        Commands::Pull {
            url,
            name,
            output,
            client,
        } => handle_pull_command(&url, &name, output.as_deref(), &client).await,
        Commands::Sync { url, client } => handle_sync_command(&url, &client).await,
        Commands::Delete { url, name, client } => {
            handle_delete_command(&url, &name, &client).await
        }
    }
}

/// Loaded client configuration and where it lives.
struct Session {
    path: PathBuf,
    config: ClientConfig,
}

fn load_session(client: &ClientConfigArgs) -> Result<Session> {
    let path = ClientConfig::path(client.client_config.as_deref())?;
    let config = ClientConfig::load(&path)
        .with_context(|| format!("failed to read client config: {}", path.display()))?;
    Ok(Session { path, config })
}

async fn synchronizer(
    url: &str,
    ctx: &Session,
    client: &ClientConfigArgs,
) -> Result<Synchronizer> {
    let url = RepoUrl::parse(url)?;
    let cache_dir = ctx.config.cache_dir(&ctx.path);
    let cache: Arc<dyn StorageProvider> = Arc::new(
        FilesystemBackend::new(&cache_dir)
            .await
            .with_context(|| format!("failed to open cache: {}", cache_dir.display()))?,
    );
    tracing::debug!(cache = %cache_dir.display(), repo = %url, "opened cache");
    let timeout = client.timeout.map(Duration::from_secs);
    Ok(Synchronizer::http(url, cache, timeout)?)
}

async fn handle_add_command(url: &str, client: &ClientConfigArgs) -> Result<()> {
    let mut ctx = load_session(client)?;
    ctx.config.add(url)?;
    ctx.config.save(&ctx.path).await?;
    println!("Added {url}");
    Ok(())
}

async fn handle_remove_command(url: &str, client: &ClientConfigArgs) -> Result<()> {
    let mut ctx = load_session(client)?;
    ctx.config.remove(url)?;
    ctx.config.save(&ctx.path).await?;
    println!("Removed {url}");
    Ok(())
}

async fn handle_list_command(url: Option<&str>, client: &ClientConfigArgs) -> Result<()> {
    let mut ctx = load_session(client)?;

    let Some(url) = url else {
        for repo in &ctx.config.repos {
            println!("{repo}");
        }
        return Ok(());
    };

    let sync = synchronizer(url, &ctx, client).await?;
    let verified = sync.sync().await?;
    for name in verified.names() {
        println!("{name}");
    }

    // Listing a repository remembers it.
    if !ctx.config.contains(sync.url()) {
        ctx.config.add(url)?;
        ctx.config.save(&ctx.path).await?;
    }
    Ok(())
}

fn artifact_name(file: &Path, name: Option<String>, args: &ApplianceArgs) -> Result<String> {
    let base = match name {
        Some(name) => name,
        None => match file.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_string(),
            None => bail!("cannot derive an artifact name from {}", file.display()),
        },
    };
    let appliance = match (&args.os, &args.arch, &args.tag) {
        (None, None, None) => return Ok(base),
        (Some(os), Some(arch), tag) => Appliance {
            proto: PROTO_APP.to_string(),
            os: os.clone(),
            arch: arch.clone(),
            name: base,
            tag: tag.clone(),
        },
        (None, None, tag) => Appliance {
            name: base,
            tag: tag.clone(),
            ..Default::default()
        },
        _ => bail!("--os and --arch must be given together"),
    };
    Ok(appliance.full_name())
}

async fn handle_push_command(
    url: &str,
    file: &Path,
    name: Option<String>,
    appliance: &ApplianceArgs,
    client: &ClientConfigArgs,
) -> Result<()> {
    let ctx = load_session(client)?;
    let name = artifact_name(file, name, appliance)?;
    let data = tokio::fs::read(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;

    let sync = synchronizer(url, &ctx, client).await?;
    let receipt = sync.push(&name, Bytes::from(data)).await?;

    println!("Pushed {} ({})", receipt.name, receipt.digest);
    if receipt.replaced {
        println!("Replaced the previous version");
    }
    if !receipt.signed {
        eprintln!("Warning: the repository manifest is not signed");
    }
    Ok(())
}

async fn handle_pull_command(
    url: &str,
    name: &str,
    output: Option<&Path>,
    client: &ClientConfigArgs,
) -> Result<()> {
    let ctx = load_session(client)?;
    let sync = synchronizer(url, &ctx, client).await?;

    let verified = sync
        .sync()
        .await
        .context("failed to download and verify the manifest")?;
    println!("Verified manifest of {}", sync.url());

    let pulled = sync.pull(&verified, name).await?;
    println!("Verified {} ({})", pulled.name, pulled.digest);

    match output {
        Some(path) => {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(path, &pulled.data)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Saved to {}", path.display());
        }
        None => println!("Saved to {}", pulled.location),
    }
    Ok(())
}

async fn handle_sync_command(url: &str, client: &ClientConfigArgs) -> Result<()> {
    let ctx = load_session(client)?;
    let sync = synchronizer(url, &ctx, client).await?;
    let verified = sync.sync().await?;
    println!(
        "Verified manifest of {} ({} artifacts)",
        sync.url(),
        verified.manifest().items.len()
    );
    Ok(())
}

async fn handle_delete_command(url: &str, name: &str, client: &ClientConfigArgs) -> Result<()> {
    let ctx = load_session(client)?;
    let sync = synchronizer(url, &ctx, client).await?;
    sync.remove(name).await?;
    println!("Deleted {name}");
    Ok(())
}
