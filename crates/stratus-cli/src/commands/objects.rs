use anyhow::Result;
use std::path::Path;

use super::providers::open_provider;

pub async fn list(base_dir: &Path, provider: &str, bucket: &str, prefix: &str) -> Result<()> {
    let storage = open_provider(base_dir, provider).await?;
    let instance = storage.open_instance(bucket).await?;

    let objects = instance.list_objects(prefix).await?;
    for object in &objects {
        println!("{object}");
    }
    eprintln!("{} object(s)", objects.len());
    Ok(())
}

pub async fn remove(base_dir: &Path, provider: &str, bucket: &str, object: &str) -> Result<()> {
    let storage = open_provider(base_dir, provider).await?;
    let instance = storage.open_instance(bucket).await?;
    instance.delete_object(object).await?;
    println!("Deleted '{object}' from '{bucket}'");
    Ok(())
}
