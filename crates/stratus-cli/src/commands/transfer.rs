use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use super::providers::open_provider;

/// Token that fires on the first Ctrl-C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nCancelling transfer...");
            trigger.cancel();
        }
    });
    token
}

fn spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn rate(bytes: u64, elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return format!("{bytes} bytes");
    }
    format!(
        "{bytes} bytes in {secs:.1}s ({:.1} MiB/s)",
        bytes as f64 / (1024.0 * 1024.0) / secs
    )
}

pub async fn put(
    base_dir: &Path,
    provider: &str,
    bucket: &str,
    file: &Path,
    name: Option<&str>,
    content_type: &str,
    stream: bool,
) -> Result<()> {
    let object = match name {
        Some(n) => n.to_string(),
        None => file
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .with_context(|| format!("Cannot derive an object name from {}", file.display()))?,
    };

    let storage = open_provider(base_dir, provider).await?;
    let instance = storage
        .new_instance(bucket)
        .await?
        .with_cancellation(cancel_on_ctrl_c());

    let pb = spinner(format!("Uploading {} to {bucket}/{object}", file.display()));
    let started = Instant::now();

    let result = if stream {
        let size = tokio::fs::metadata(file).await?.len();
        let mut reader = tokio::fs::File::open(file)
            .await
            .with_context(|| format!("Cannot open {}", file.display()))?;
        instance
            .upload(&object, content_type, &mut reader, size)
            .await
            .map(|()| size)
    } else {
        instance.upload_file(&object, content_type, file).await
    };

    match result {
        Ok(size) => {
            pb.finish_with_message(format!(
                "Uploaded {bucket}/{object}: {}",
                rate(size, started.elapsed())
            ));
            Ok(())
        }
        Err(e) => {
            pb.abandon_with_message(format!("Upload of {bucket}/{object} failed"));
            Err(e.into())
        }
    }
}

pub async fn get(
    base_dir: &Path,
    provider: &str,
    bucket: &str,
    object: &str,
    dest: &Path,
    stream: bool,
) -> Result<()> {
    let storage = open_provider(base_dir, provider).await?;
    let instance = storage
        .open_instance(bucket)
        .await?
        .with_cancellation(cancel_on_ctrl_c());

    let pb = spinner(format!("Downloading {bucket}/{object} to {}", dest.display()));
    let started = Instant::now();

    let result = if stream {
        let mut writer = tokio::fs::File::create(dest)
            .await
            .with_context(|| format!("Cannot create {}", dest.display()))?;
        instance.download(object, &mut writer).await
    } else {
        instance.download_file(object, dest).await
    };

    match result {
        Ok(size) => {
            pb.finish_with_message(format!(
                "Downloaded {bucket}/{object}: {}",
                rate(size, started.elapsed())
            ));
            Ok(())
        }
        Err(e) => {
            pb.abandon_with_message(format!("Download of {bucket}/{object} failed"));
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_reports_throughput() {
        let msg = rate(10 * 1024 * 1024, Duration::from_secs(2));
        assert!(msg.contains("5.0 MiB/s"), "{msg}");
    }

    #[test]
    fn rate_handles_instant_transfers() {
        assert_eq!(rate(0, Duration::ZERO), "0 bytes");
    }
}
