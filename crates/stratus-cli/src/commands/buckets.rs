use anyhow::Result;
use std::path::Path;
use tracing::info;

use super::providers::open_provider;

pub async fn list(base_dir: &Path, provider: &str) -> Result<()> {
    let storage = open_provider(base_dir, provider).await?;
    let instances = storage.list_instances().await?;

    if instances.is_empty() {
        println!("No buckets on '{provider}'.");
        return Ok(());
    }
    for instance in &instances {
        println!("{}", instance.name());
    }
    Ok(())
}

pub async fn create(base_dir: &Path, provider: &str, bucket: &str) -> Result<()> {
    let storage = open_provider(base_dir, provider).await?;
    let instance = storage.new_instance(bucket).await?;
    println!("Bucket '{}' is ready on '{provider}'", instance.name());
    Ok(())
}

pub async fn delete(base_dir: &Path, provider: &str, bucket: &str) -> Result<()> {
    let storage = open_provider(base_dir, provider).await?;
    let instance = storage.open_instance(bucket).await?;
    info!("Deleting bucket '{bucket}' on '{provider}'");
    instance.delete().await?;
    println!("Deleted bucket '{bucket}' from '{provider}'");
    Ok(())
}
