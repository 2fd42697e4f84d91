use anyhow::Result;
use std::path::Path;

use stratus_core::config::StratusConfig;

pub fn run(base_dir: &Path) -> Result<()> {
    println!("Initializing Stratus in {}", base_dir.display());

    std::fs::create_dir_all(base_dir)?;

    let config_path = StratusConfig::default_path(base_dir);
    if config_path.exists() {
        println!("Config already exists at {}", config_path.display());
    } else {
        let config = StratusConfig::default_config(base_dir);
        config.save(&config_path)?;
        println!("Created config: {}", config_path.display());
    }

    println!("\nStratus initialized. Next steps:");
    println!("  1. Add cloud providers to {}", config_path.display());
    println!("  2. Run `stratus providers` to check connectivity");
    println!("  3. Run `stratus put local my-bucket <file>` to upload a file");

    Ok(())
}
