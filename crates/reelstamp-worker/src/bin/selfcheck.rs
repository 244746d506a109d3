use std::path::Path;

use reelstamp_media::{check_ffmpeg, check_ffprobe};
use reelstamp_worker::PipelineConfig;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli_root = std::env::args().nth(1);
    let config = PipelineConfig::from_env(cli_root.as_deref())?;

    println!(
        "reelstamp-selfcheck: starting with scratch_dir={}",
        config.scratch_dir.display()
    );
    ensure_dir(&config.scratch_dir).await?;
    if let Some(mirror) = &config.mirror_dir {
        ensure_dir(mirror).await?;
    }
    ensure_tools()?;
    ensure_credentials()?;

    println!(
        "reelstamp-selfcheck: ok (root folder {})",
        config.root_folder_id
    );
    Ok(())
}

async fn ensure_dir(path: &Path) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(path).await?;
    let probe = path.join(".reelstamp-selfcheck");
    tokio::fs::write(&probe, b"ok")
        .await
        .map_err(|e| anyhow::anyhow!("{} is not writable: {}", path.display(), e))?;
    tokio::fs::remove_file(&probe).await?;
    Ok(())
}

fn ensure_tools() -> anyhow::Result<()> {
    let ffmpeg = check_ffmpeg()?;
    let ffprobe = check_ffprobe()?;
    println!(
        "reelstamp-selfcheck: ffmpeg={} ffprobe={}",
        ffmpeg.display(),
        ffprobe.display()
    );
    Ok(())
}

fn ensure_credentials() -> anyhow::Result<()> {
    let has_token = std::env::var("DRIVE_ACCESS_TOKEN").is_ok_and(|v| !v.is_empty());
    let has_key = std::env::var("GOOGLE_APPLICATION_CREDENTIALS").is_ok_and(|v| !v.is_empty());
    if !has_token && !has_key {
        return Err(anyhow::anyhow!(
            "missing credentials: set GOOGLE_APPLICATION_CREDENTIALS or DRIVE_ACCESS_TOKEN"
        ));
    }
    Ok(())
}
