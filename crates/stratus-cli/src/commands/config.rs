use anyhow::Result;
use std::path::Path;

use stratus_core::config::StratusConfig;

fn or_default<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "provider default".to_string(), |v| v.to_string())
}

pub fn run(base_dir: &Path) -> Result<()> {
    let config_path = StratusConfig::default_path(base_dir);
    let config = StratusConfig::load(&config_path)?;
    let settings = &config.stratus;

    println!("Config: {}", config_path.display());
    println!();
    println!("  Block size:     {}", or_default(settings.block_size));
    println!("  Concurrency:    {}", or_default(settings.concurrency));
    println!("  Delete timeout: {}s", settings.delete_timeout_secs);
    println!("  Delete poll:    {}ms", settings.delete_poll_interval_ms);
    println!();

    if config.providers.is_empty() {
        println!("  No providers configured.");
        println!();
        println!("  Add providers to {}:", config_path.display());
        println!("  [[providers]]");
        println!("  name = \"my-s3\"");
        println!("  type = \"s3\"    # or \"local\", \"s3compatible\", \"azure\", \"gcs\"");
        println!("  region = \"eu-west-1\"");
    } else {
        println!("  Providers ({}):", config.providers.len());
        for p in &config.providers {
            let location = p
                .region
                .as_deref()
                .or(p.endpoint_url.as_deref())
                .or(p.account.as_deref())
                .or(p.root.as_deref())
                .unwrap_or("-");
            println!("    - {} (type={}, at={})", p.name, p.provider_type, location);
        }
    }

    Ok(())
}
