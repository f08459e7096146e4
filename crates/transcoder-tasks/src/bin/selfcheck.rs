//! Startup self-check: work dir writable, ffmpeg and ffprobe runnable.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::info;
use transcoder_tasks::{init_tracing, TaskConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = TaskConfig::from_env();
    info!("transcoder-selfcheck: work_dir={}", config.work_dir.display());

    ensure_workdir(&config.work_dir).await?;

    let ffmpeg = config.ffmpeg_bin.clone().unwrap_or_else(|| PathBuf::from("ffmpeg"));
    let ffprobe = config.ffprobe_bin.clone().unwrap_or_else(|| PathBuf::from("ffprobe"));
    let version = ensure_runnable(&ffmpeg)?;
    println!("{}", version);
    ensure_runnable(&ffprobe)?;
    config.ffmpeg_engine()?;

    println!("transcoder-selfcheck: ok");
    Ok(())
}

async fn ensure_workdir(path: &Path) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(path).await?;
    let probe = path.join(".selfcheck");
    tokio::fs::write(&probe, b"ok").await?;
    tokio::fs::remove_file(&probe).await?;
    Ok(())
}

/// Run `<bin> -version` and return the first line of its output.
fn ensure_runnable(bin: &Path) -> anyhow::Result<String> {
    let output = Command::new(bin)
        .arg("-version")
        .output()
        .map_err(|e| anyhow::anyhow!("{} not available: {}", bin.display(), e))?;

    if !output.status.success() {
        return Err(anyhow::anyhow!(
            "{} -version failed: {:?}",
            bin.display(),
            output.status
        ));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout.lines().next().unwrap_or_default().to_string())
}
