//! Burned-in name and prompt overlays.
//!
//! One FFmpeg invocation per video: the two `drawtext` filters are applied
//! and, when the source is not already MP4, the same pass converts the
//! container. A failed invocation is final; rendering is deterministic, so
//! running it again would fail the same way.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use reelstamp_models::{EncodingConfig, OverlaySpec, MP4_MIME};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters::{chain, DrawText};
use crate::probe::frame_size_or_default;

// =============================================================================
// Style
// =============================================================================

/// Fixed layout of the two text lines.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayStyle {
    /// Font file; `None` lets fontconfig choose
    pub font_file: Option<PathBuf>,
    /// Font size as a fraction of the frame height
    pub font_scale: f64,
    pub font_color: String,
    pub box_color: String,
    /// Padding around the text inside the box (pixels)
    pub box_padding: u32,
    /// Overlay is shown from t=0 to this many seconds
    pub display_seconds: u32,
    /// Gap between the prompt line and the bottom edge (pixels)
    pub bottom_margin: u32,
    /// Gap between the name line and the prompt line (pixels)
    pub line_gap: u32,
    pub name_label: String,
    pub prompt_label: String,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            font_file: None,
            font_scale: 0.035,
            font_color: "black".to_string(),
            box_color: "white@0.8".to_string(),
            box_padding: 10,
            display_seconds: 20,
            bottom_margin: 40,
            line_gap: 15,
            name_label: "Name: ".to_string(),
            prompt_label: "Prompt Structure: ".to_string(),
        }
    }
}

impl OverlayStyle {
    pub fn with_font_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.font_file = Some(path.into());
        self
    }

    pub fn with_display_seconds(mut self, seconds: u32) -> Self {
        self.display_seconds = seconds;
        self
    }

    pub fn with_font_scale(mut self, scale: f64) -> Self {
        self.font_scale = scale.clamp(0.005, 0.5);
        self
    }

    /// A configured font must exist; FFmpeg's own message for a missing
    /// font only appears after the whole decode has been set up.
    pub fn validate(&self) -> MediaResult<()> {
        match &self.font_file {
            Some(path) if !path.is_file() => Err(MediaError::FontNotFound(path.clone())),
            _ => Ok(()),
        }
    }

    /// Font size in pixels for a frame of the given height.
    pub fn font_size(&self, frame_height: u32) -> u32 {
        ((frame_height as f64 * self.font_scale) as u32).max(8)
    }
}

// =============================================================================
// Container policy
// =============================================================================

/// Container of the downloaded source, relative to the MP4 target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceContainer {
    /// Already MP4: only the overlay re-encode is needed
    Mp4,
    /// Anything else (extension shown): converted in the same pass
    Other(String),
}

impl SourceContainer {
    /// Decide from the file extension, falling back to the MIME type.
    pub fn detect(path: &Path, mime_type: Option<&str>) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        match ext.as_deref() {
            Some("mp4") | Some("m4v") => SourceContainer::Mp4,
            Some(other) => SourceContainer::Other(other.to_string()),
            None if mime_type.is_some_and(|m| m.eq_ignore_ascii_case(MP4_MIME)) => {
                SourceContainer::Mp4
            }
            None => SourceContainer::Other(mime_type.unwrap_or("unknown").to_string()),
        }
    }

    pub fn needs_conversion(&self) -> bool {
        !matches!(self, SourceContainer::Mp4)
    }
}

// =============================================================================
// Transformer
// =============================================================================

/// Renders overlays with FFmpeg.
#[derive(Debug, Clone, Default)]
pub struct OverlayTransformer {
    style: OverlayStyle,
    encoding: EncodingConfig,
    runner: FfmpegRunner,
}

impl OverlayTransformer {
    pub fn new(style: OverlayStyle, encoding: EncodingConfig) -> Self {
        Self {
            style,
            encoding,
            runner: FfmpegRunner::new(),
        }
    }

    /// Kill FFmpeg if a render takes longer than this.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.runner = self.runner.with_timeout(secs);
        self
    }

    pub fn style(&self) -> &OverlayStyle {
        &self.style
    }

    /// The `-vf` graph: name line above prompt line, both centred.
    pub fn build_filter(&self, spec: &OverlaySpec, frame_height: u32) -> String {
        let style = &self.style;
        let font_size = self.style.font_size(frame_height);

        let prompt_y = frame_height.saturating_sub(font_size + style.bottom_margin);
        let name_y = prompt_y.saturating_sub(font_size + style.line_gap);

        let line = |text: String, y: u32| DrawText {
            text,
            font_file: style
                .font_file
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
            font_size,
            font_color: style.font_color.clone(),
            x: "(w-text_w)/2".to_string(),
            y: y.to_string(),
            box_color: Some(style.box_color.clone()),
            box_border: style.box_padding,
            enable: Some(format!("between(t,0,{})", style.display_seconds)),
        };

        chain(&[
            line(format!("{}{}", style.name_label, spec.name), name_y).to_filter(),
            line(format!("{}{}", style.prompt_label, spec.prompt), prompt_y).to_filter(),
        ])
    }

    /// Build the single FFmpeg invocation for one video.
    pub fn build_command(
        &self,
        input: &Path,
        output: &Path,
        spec: &OverlaySpec,
        frame_height: u32,
        container: &SourceContainer,
    ) -> FfmpegCommand {
        let cmd = FfmpegCommand::new(input, output)
            .video_filter(self.build_filter(spec, frame_height))
            .video_codec(&self.encoding.codec)
            .preset(&self.encoding.preset)
            .crf(self.encoding.crf)
            .output_args(["-pix_fmt", "yuv420p"]);

        match container {
            // Audio is already in an MP4-compatible stream
            SourceContainer::Mp4 => cmd.audio_codec("copy"),
            SourceContainer::Other(_) => cmd
                .audio_codec(&self.encoding.audio_codec)
                .audio_bitrate(&self.encoding.audio_bitrate)
                .format("mp4")
                .output_args(["-movflags", "+faststart"]),
        }
    }

    /// Render `spec` onto `input`, writing an MP4 to `output`.
    pub async fn render(
        &self,
        input: &Path,
        output: &Path,
        spec: &OverlaySpec,
        container: &SourceContainer,
    ) -> MediaResult<()> {
        if !input.exists() {
            return Err(MediaError::FileNotFound(input.to_path_buf()));
        }
        self.style.validate()?;

        let (width, height) = frame_size_or_default(input).await;
        let cmd = self.build_command(input, output, spec, height, container);

        info!(
            input = %input.display(),
            output = %output.display(),
            width,
            height,
            convert = container.needs_conversion(),
            "Rendering overlay"
        );

        self.runner
            .run_with_progress(&cmd, |progress| {
                if progress.is_complete {
                    debug!(
                        frames = progress.frame,
                        out_time_ms = progress.out_time_ms,
                        speed = progress.speed,
                        "FFmpeg finished encoding"
                    );
                }
            })
            .await?;

        if !output.exists() {
            return Err(MediaError::ffmpeg_failed(
                "FFmpeg reported success but wrote no output",
                None,
                Some(0),
            ));
        }

        Ok(())
    }
}
