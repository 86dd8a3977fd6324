//! Media extraction backends
//!
//! The flow only talks to [`MediaExtractor`]; the yt-dlp subprocess
//! implementation lives in [`ytdlp`].

/// yt-dlp subprocess backend
pub mod ytdlp;

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub use ytdlp::YtDlpExtractor;

/// Errors that can occur while talking to the extraction backend
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The backend executable could not be started
    #[error("failed to start extractor: {0}")]
    Spawn(#[source] std::io::Error),
    /// The media is gone, private, geo-blocked or otherwise unrecoverable
    #[error("media unavailable: {0}")]
    Unavailable(String),
    /// Network-level failure that might succeed later
    #[error("temporary extractor failure: {0}")]
    Transient(String),
    /// Any other non-zero exit
    #[error("extractor exited with {code:?}: {message}")]
    Failed {
        /// Process exit code, if the process was not killed by a signal
        code: Option<i32>,
        /// Last meaningful stderr line
        message: String,
    },
    /// Metadata output could not be decoded
    #[error("invalid extractor output: {0}")]
    Parse(#[from] serde_json::Error),
    /// Download succeeded but no output path was reported
    #[error("extractor did not report an output file")]
    MissingOutput,
    /// The job was cancelled while the backend was running
    #[error("extraction cancelled")]
    Cancelled,
    /// Standard I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Metadata returned by a lookup without download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaMetadata {
    /// Media title, `"Video"` when the site gives none
    pub title: String,
    /// Duration in seconds
    pub duration: Option<u64>,
    /// Channel or account name
    pub uploader: Option<String>,
}

/// Audio codecs the transcoder step can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioCodec {
    /// MPEG-1 Layer III
    Mp3,
}

impl AudioCodec {
    /// Codec name as understood by yt-dlp / ffmpeg
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
        }
    }
}

/// Which stream to fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatRequest {
    /// Best combined stream no taller than the given height
    MaxHeight(u32),
    /// Best audio stream, transcoded afterwards
    BestAudio {
        /// Target codec of the transcode step
        codec: AudioCodec,
        /// Target bitrate
        bitrate_kbps: u32,
    },
}

impl FormatRequest {
    /// yt-dlp format selector for this request
    ///
    /// # Examples
    ///
    /// ```
    /// use media_fetch_bot::extractor::FormatRequest;
    /// assert_eq!(FormatRequest::MaxHeight(480).selector(), "best[height<=480]");
    /// ```
    #[must_use]
    pub fn selector(&self) -> String {
        match self {
            Self::MaxHeight(height) => format!("best[height<={height}]"),
            Self::BestAudio { .. } => "bestaudio/best".to_string(),
        }
    }

    /// `true` for audio-only requests
    #[must_use]
    pub const fn is_audio(&self) -> bool {
        matches!(self, Self::BestAudio { .. })
    }
}

/// Options for a single download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOptions {
    /// Stream selection and optional transcode step
    pub format: FormatRequest,
    /// Directory the output file is written to
    pub output_dir: PathBuf,
}

/// Interface for media extraction backends
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Look up metadata without downloading
    async fn fetch_metadata(
        &self,
        url: &str,
        cancel: CancellationToken,
    ) -> Result<MediaMetadata, ExtractError>;

    /// Download `url` according to `options` and return the produced file
    async fn download(
        &self,
        url: &str,
        options: &DownloadOptions,
        cancel: CancellationToken,
    ) -> Result<PathBuf, ExtractError>;
}
