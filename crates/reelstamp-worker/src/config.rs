//! Pipeline configuration.

use std::path::PathBuf;
use std::time::Duration;

use reelstamp_drive::BackoffPolicy;
use reelstamp_media::{OverlayStyle, OverlayTransformer};
use reelstamp_models::{extract_folder_id, EncodingConfig};

use crate::error::{WorkerError, WorkerResult};

/// Default output filename suffix.
pub const DEFAULT_OUTPUT_SUFFIX: &str = "_final";

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Drive id of the folder tree to process
    pub root_folder_id: String,
    /// Backoff policy for every Drive call
    pub retry: BackoffPolicy,
    /// Per-pair scratch directories are created under this
    pub scratch_dir: PathBuf,
    /// Final videos are also moved here when set
    pub mirror_dir: Option<PathBuf>,
    /// Appended to the video stem to name the output
    pub output_suffix: String,
    /// Skip pairs whose output already exists remotely
    pub skip_existing: bool,
    /// Re-scan at this interval instead of exiting after one run
    pub watch_interval: Option<Duration>,
    /// Text overlay appearance
    pub overlay: OverlayStyle,
    /// FFmpeg encoding settings
    pub encoding: EncodingConfig,
    /// Kill FFmpeg after this many seconds
    pub ffmpeg_timeout_secs: Option<u64>,
}

impl PipelineConfig {
    /// Config with defaults for everything but the root folder.
    pub fn new(root_folder_id: impl Into<String>) -> Self {
        Self {
            root_folder_id: root_folder_id.into(),
            retry: BackoffPolicy::default(),
            scratch_dir: std::env::temp_dir().join("reelstamp"),
            mirror_dir: None,
            output_suffix: DEFAULT_OUTPUT_SUFFIX.to_string(),
            skip_existing: false,
            watch_interval: None,
            overlay: OverlayStyle::default(),
            encoding: EncodingConfig::default(),
            ffmpeg_timeout_secs: None,
        }
    }

    /// Create config from environment variables.
    ///
    /// `cli_root` (the first command-line argument) takes precedence over
    /// `DRIVE_ROOT_FOLDER`. Either may be a folder URL or a bare id.
    pub fn from_env(cli_root: Option<&str>) -> WorkerResult<Self> {
        let root_ref = cli_root
            .map(str::to_string)
            .or_else(|| std::env::var("DRIVE_ROOT_FOLDER").ok())
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                WorkerError::config_error(
                    "No root folder given. Pass it as the first argument or set DRIVE_ROOT_FOLDER",
                )
            })?;

        let root_folder_id = extract_folder_id(&root_ref).map_err(|e| {
            WorkerError::config_error(format!("Invalid root folder '{}': {}", root_ref, e))
        })?;

        let mut config = Self::new(root_folder_id);
        config.retry = BackoffPolicy::from_env();

        if let Some(dir) = non_empty_var("SCRATCH_DIR") {
            config.scratch_dir = PathBuf::from(dir);
        }
        config.mirror_dir = non_empty_var("OUTPUT_MIRROR_DIR").map(PathBuf::from);

        if let Ok(suffix) = std::env::var("OUTPUT_SUFFIX") {
            config.output_suffix = suffix;
        }

        config.skip_existing = std::env::var("SKIP_EXISTING")
            .ok()
            .map(|v| parse_flag(&v))
            .unwrap_or(false);

        config.watch_interval = std::env::var("WATCH_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        let mut overlay = OverlayStyle::default();
        if let Some(font) = non_empty_var("OVERLAY_FONT_FILE") {
            overlay = overlay.with_font_file(font);
        }
        if let Some(secs) = std::env::var("OVERLAY_DISPLAY_SECS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
        {
            overlay = overlay.with_display_seconds(secs);
        }
        if let Some(scale) = std::env::var("OVERLAY_FONT_SCALE")
            .ok()
            .and_then(|s| s.parse::<f64>().ok())
        {
            overlay = overlay.with_font_scale(scale);
        }
        config.overlay = overlay;

        if let Some(crf) = std::env::var("FFMPEG_CRF")
            .ok()
            .and_then(|s| s.parse::<u8>().ok())
            .filter(|crf| *crf <= 51)
        {
            config.encoding = config.encoding.with_crf(crf);
        }
        if let Some(preset) = non_empty_var("FFMPEG_PRESET") {
            config.encoding = config.encoding.with_preset(preset);
        }

        config.ffmpeg_timeout_secs = std::env::var("FFMPEG_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|secs| *secs > 0);

        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Apply rules that tie settings together.
    pub fn normalize(&mut self) {
        // Watch mode re-scans folders it has already finished
        if self.watch_interval.is_some() {
            self.skip_existing = true;
        }
    }

    /// Check settings that would otherwise fail on every pair.
    pub fn validate(&self) -> WorkerResult<()> {
        if self.output_suffix.is_empty() {
            return Err(WorkerError::config_error(
                "OUTPUT_SUFFIX must not be empty: outputs would overwrite their sources",
            ));
        }
        if self.output_suffix.contains('/') {
            return Err(WorkerError::config_error("OUTPUT_SUFFIX must not contain '/'"));
        }
        self.overlay
            .validate()
            .map_err(|e| WorkerError::config_error(e.to_string()))?;
        Ok(())
    }

    /// Build the overlay transformer these settings describe.
    pub fn transformer(&self) -> OverlayTransformer {
        let transformer = OverlayTransformer::new(self.overlay.clone(), self.encoding.clone());
        match self.ffmpeg_timeout_secs {
            Some(secs) => transformer.with_timeout(secs),
            None => transformer,
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
