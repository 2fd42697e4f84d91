use anyhow::{Context, Result};
use std::path::Path;

use stratus_core::config::StratusConfig;
use stratus_storage::StorageProvider;
use stratus_storage::factory::create_storage_provider;

/// Load the config and build the named provider.
pub async fn open_provider(base_dir: &Path, name: &str) -> Result<StorageProvider> {
    let config = StratusConfig::load(&StratusConfig::default_path(base_dir))?;
    let pc = config.provider(name)?;
    create_storage_provider(pc, &config.stratus)
        .await
        .with_context(|| format!("Failed to initialize provider '{name}'"))
}

/// Build every configured provider and test its connection.
pub async fn run(base_dir: &Path) -> Result<()> {
    let config = StratusConfig::load(&StratusConfig::default_path(base_dir))?;

    if config.providers.is_empty() {
        println!("No providers configured.");
        return Ok(());
    }

    let mut failures = 0;
    for pc in &config.providers {
        let outcome = match create_storage_provider(pc, &config.stratus).await {
            Ok(provider) => provider
                .test_connection()
                .await
                .map(|()| provider.properties()),
            Err(e) => Err(e),
        };
        match outcome {
            Ok(props) => println!(
                "  OK    {} ({}, block size {}, concurrency {})",
                pc.name, pc.provider_type, props.block_size, props.concurrency
            ),
            Err(e) => {
                failures += 1;
                println!("  FAIL  {} ({}): {e}", pc.name, pc.provider_type);
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{failures} provider(s) failed the connection test");
    }
    Ok(())
}
