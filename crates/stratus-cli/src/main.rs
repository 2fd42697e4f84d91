mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stratus")]
#[command(about = "Multi-cloud object storage transfer tool")]
#[command(version)]
struct Cli {
    /// Path to the Stratus config directory (default: ~/.stratus)
    #[arg(long, global = true, env = "STRATUS_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration
    Init,

    /// Show current configuration
    Config,

    /// List configured providers and test their connections
    Providers,

    /// List buckets (containers) of a provider
    Buckets {
        provider: String,
    },

    /// Create a bucket, or reuse it if it already exists
    Create {
        provider: String,
        bucket: String,
    },

    /// Delete a bucket and wait until it is gone
    Delete {
        provider: String,
        bucket: String,
    },

    /// List objects in a bucket
    Ls {
        provider: String,
        bucket: String,
        /// Only list objects whose name starts with this prefix
        #[arg(default_value = "")]
        prefix: String,
    },

    /// Upload a local file
    Put {
        provider: String,
        bucket: String,
        file: PathBuf,
        /// Object name (default: the file name)
        #[arg(long)]
        name: Option<String>,
        #[arg(long, default_value = "application/octet-stream")]
        content_type: String,
        /// Stream the file instead of uploading blocks from positions
        #[arg(long)]
        stream: bool,
    },

    /// Download an object to a local file
    Get {
        provider: String,
        bucket: String,
        object: String,
        dest: PathBuf,
        /// Stream the object instead of writing blocks at positions
        #[arg(long)]
        stream: bool,
    },

    /// Delete an object
    Rm {
        provider: String,
        bucket: String,
        object: String,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("stratus=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let base_dir = match cli.config_dir {
        Some(ref dir) => dir.clone(),
        None => stratus_core::config::StratusConfig::default_base_dir()?,
    };

    let rt = tokio::runtime::Runtime::new()?;

    match cli.command {
        Commands::Init => commands::init::run(&base_dir),
        Commands::Config => commands::config::run(&base_dir),
        Commands::Providers => rt.block_on(commands::providers::run(&base_dir)),
        Commands::Buckets { ref provider } => {
            rt.block_on(commands::buckets::list(&base_dir, provider))
        }
        Commands::Create {
            ref provider,
            ref bucket,
        } => rt.block_on(commands::buckets::create(&base_dir, provider, bucket)),
        Commands::Delete {
            ref provider,
            ref bucket,
        } => rt.block_on(commands::buckets::delete(&base_dir, provider, bucket)),
        Commands::Ls {
            ref provider,
            ref bucket,
            ref prefix,
        } => rt.block_on(commands::objects::list(&base_dir, provider, bucket, prefix)),
        Commands::Put {
            ref provider,
            ref bucket,
            ref file,
            ref name,
            ref content_type,
            stream,
        } => rt.block_on(commands::transfer::put(
            &base_dir,
            provider,
            bucket,
            file,
            name.as_deref(),
            content_type,
            stream,
        )),
        Commands::Get {
            ref provider,
            ref bucket,
            ref object,
            ref dest,
            stream,
        } => rt.block_on(commands::transfer::get(
            &base_dir, provider, bucket, object, dest, stream,
        )),
        Commands::Rm {
            ref provider,
            ref bucket,
            ref object,
        } => rt.block_on(commands::objects::remove(&base_dir, provider, bucket, object)),
    }
}
