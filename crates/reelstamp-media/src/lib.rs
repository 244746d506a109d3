#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper for the overlay render.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building and a runner that captures diagnostics
//! - FFprobe frame-size probing
//! - `drawtext` construction with two-level filter-graph escaping
//! - The overlay transformer with its container-conversion policy

pub mod command;
pub mod error;
pub mod filters;
pub mod fs_utils;
pub mod overlay;
pub mod probe;
pub mod progress;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use filters::{escape_filter_value, DrawText};
pub use fs_utils::move_file;
pub use overlay::{OverlayStyle, OverlayTransformer, SourceContainer};
pub use probe::{probe_video, VideoInfo};
pub use progress::FfmpegProgress;
