use anyhow::{Context, Result};
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::io::Write;
use std::path::Path;

pub async fn download_file(
    client: &reqwest::Client,
    url: &str,
    local_path: &Path,
    show_progress: bool,
) -> Result<()> {
    let filename = local_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    tracing::info!("Downloading {}...", filename);

    let response = client
        .get(url)
        .send()
        .await?
        .error_for_status()
        .with_context(|| format!("Download of {} failed", url))?;
    let total_size = response.content_length().unwrap_or(0);

    let pb = if show_progress {
        ProgressBar::new(total_size)
    } else {
        ProgressBar::hidden()
    };
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")?
            .progress_chars("#>-"),
    );
    pb.set_message(format!("Downloading {}", filename));

    let mut file = fs::File::create(local_path)
        .with_context(|| format!("Could not create {}", local_path.display()))?;
    let mut downloaded = 0u64;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk)?;
        downloaded += chunk.len() as u64;
        pb.set_position(downloaded);
    }
    file.flush()?;

    pb.finish_and_clear();
    tracing::debug!("Downloaded {} bytes to {}", downloaded, local_path.display());
    Ok(())
}
