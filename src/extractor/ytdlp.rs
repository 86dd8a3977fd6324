//! yt-dlp backend
//!
//! Runs yt-dlp as a child process. Metadata comes from `--dump-single-json`,
//! the downloaded file path from `--print after_move:filepath`, so the final
//! name after any audio transcode is reported by yt-dlp itself.

use super::{DownloadOptions, ExtractError, FormatRequest, MediaExtractor, MediaMetadata};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::{Output, Stdio};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Patterns indicating fatal, unrecoverable yt-dlp errors
const FATAL_ERROR_PATTERNS: &[&str] = &[
    "Video unavailable",
    "Private video",
    "This video is not available",
    "Sign in to confirm your age",
    "age-restricted",
    "members-only",
    "This video is private",
    "removed by the uploader",
    "no longer available",
    "blocked it in your country",
    "geo-restricted",
    "who has blocked it on copyright grounds",
    "copyright claim",
    "terminated account",
    "This video has been removed",
    "Unsupported URL",
    "is not a valid URL",
    "Unable to extract video data",
    "Premieres in",
    "This live event will begin",
    "HTTP Error 403",
    "HTTP Error 404",
    "Sign in to view this video",
];

/// Patterns indicating transient errors that might be resolved later
const TRANSIENT_ERROR_PATTERNS: &[&str] = &[
    "Connection reset",
    "Connection timed out",
    "Unable to download webpage",
    "HTTP Error 429",
    "HTTP Error 503",
    "Read timed out",
    "network is unreachable",
    "Temporary failure in name resolution",
];

/// Output name template, relative to the job directory
const OUTPUT_TEMPLATE: &str = "%(title).80B.%(ext)s";

fn is_fatal_ytdlp_error(error_msg: &str) -> bool {
    FATAL_ERROR_PATTERNS
        .iter()
        .any(|pattern| error_msg.contains(pattern))
}

fn is_transient_ytdlp_error(error_msg: &str) -> bool {
    TRANSIENT_ERROR_PATTERNS
        .iter()
        .any(|pattern| error_msg.contains(pattern))
}

/// Last non-empty line of stderr, without yt-dlp's `ERROR:` prefix
fn summarize_stderr(stderr: &str) -> String {
    stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.trim_start_matches("ERROR:").trim().to_string())
        .unwrap_or_else(|| "no error output".to_string())
}

fn classify_failure(output: &Output) -> ExtractError {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let message = summarize_stderr(&stderr);

    if is_fatal_ytdlp_error(&stderr) {
        ExtractError::Unavailable(message)
    } else if is_transient_ytdlp_error(&stderr) {
        ExtractError::Transient(message)
    } else {
        ExtractError::Failed {
            code: output.status.code(),
            message,
        }
    }
}

/// Arguments for a metadata-only lookup
#[must_use]
pub fn metadata_args(url: &str) -> Vec<String> {
    vec![
        "--dump-single-json".to_string(),
        "--skip-download".to_string(),
        "--no-playlist".to_string(),
        "--no-warnings".to_string(),
        "--".to_string(),
        url.to_string(),
    ]
}

/// Arguments for a download into `options.output_dir`
///
/// # Examples
///
/// ```
/// use media_fetch_bot::extractor::{DownloadOptions, FormatRequest};
/// use media_fetch_bot::extractor::ytdlp::download_args;
///
/// let options = DownloadOptions {
///     format: FormatRequest::MaxHeight(720),
///     output_dir: "/tmp/job".into(),
/// };
/// let args = download_args("https://youtu.be/abc", &options);
/// assert!(args.contains(&"best[height<=720]".to_string()));
/// ```
#[must_use]
pub fn download_args(url: &str, options: &DownloadOptions) -> Vec<String> {
    let template = options.output_dir.join(OUTPUT_TEMPLATE);
    let mut args = vec![
        "-f".to_string(),
        options.format.selector(),
        "--no-playlist".to_string(),
        "--no-warnings".to_string(),
        "--no-progress".to_string(),
        "-o".to_string(),
        template.to_string_lossy().to_string(),
        "--print".to_string(),
        "after_move:filepath".to_string(),
    ];

    if let FormatRequest::BestAudio {
        codec,
        bitrate_kbps,
    } = options.format
    {
        args.extend([
            "-x".to_string(),
            "--audio-format".to_string(),
            codec.as_str().to_string(),
            "--audio-quality".to_string(),
            format!("{bitrate_kbps}K"),
        ]);
    }

    args.push("--".to_string());
    args.push(url.to_string());
    args
}

/// Subset of yt-dlp's info JSON the bot uses
#[derive(Debug, Deserialize)]
struct RawMetadata {
    title: Option<String>,
    duration: Option<f64>,
    uploader: Option<String>,
    channel: Option<String>,
}

impl From<RawMetadata> for MediaMetadata {
    fn from(raw: RawMetadata) -> Self {
        Self {
            title: raw
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| "Video".to_string()),
            duration: raw
                .duration
                .filter(|d| d.is_finite() && *d >= 0.0)
                .map(|d| d.round() as u64),
            uploader: raw.uploader.or(raw.channel),
        }
    }
}

/// Parse `--dump-single-json` output
///
/// # Errors
///
/// Returns `ExtractError::Parse` if the output is not valid JSON.
pub fn parse_metadata(stdout: &[u8]) -> Result<MediaMetadata, ExtractError> {
    let raw: RawMetadata = serde_json::from_slice(stdout)?;
    Ok(raw.into())
}

/// The path printed by `--print after_move:filepath`
#[must_use]
pub fn parse_output_path(stdout: &str) -> Option<PathBuf> {
    stdout
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(PathBuf::from)
}

/// [`MediaExtractor`] backed by the yt-dlp executable
#[derive(Debug, Clone)]
pub struct YtDlpExtractor {
    binary: String,
}

impl YtDlpExtractor {
    /// Create an extractor that runs `binary` (a name on `PATH` or a full path)
    #[must_use]
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Installed yt-dlp version, used as a startup probe
    ///
    /// # Errors
    ///
    /// Returns `ExtractError::Spawn` if the executable cannot be started.
    pub async fn version(&self) -> Result<String, ExtractError> {
        let output = self
            .exec_ytdlp(&["--version".to_string()], &CancellationToken::new())
            .await?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Run yt-dlp with `args`, killing it if `cancel` fires first
    async fn exec_ytdlp(
        &self,
        args: &[String],
        cancel: &CancellationToken,
    ) -> Result<Output, ExtractError> {
        debug!(binary = %self.binary, args = ?args, "Executing yt-dlp command");

        let child = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(ExtractError::Spawn)?;

        // Dropping the wait future drops the child, which kills it
        let output = tokio::select! {
            () = cancel.cancelled() => {
                info!("yt-dlp cancelled, killing child process");
                return Err(ExtractError::Cancelled);
            }
            output = child.wait_with_output() => output?,
        };

        if output.status.success() {
            Ok(output)
        } else {
            let err = classify_failure(&output);
            warn!(error = %err, "yt-dlp failed");
            Err(err)
        }
    }
}

#[async_trait]
impl MediaExtractor for YtDlpExtractor {
    async fn fetch_metadata(
        &self,
        url: &str,
        cancel: CancellationToken,
    ) -> Result<MediaMetadata, ExtractError> {
        let output = self.exec_ytdlp(&metadata_args(url), &cancel).await?;
        parse_metadata(&output.stdout)
    }

    async fn download(
        &self,
        url: &str,
        options: &DownloadOptions,
        cancel: CancellationToken,
    ) -> Result<PathBuf, ExtractError> {
        tokio::fs::create_dir_all(&options.output_dir).await?;

        let output = self
            .exec_ytdlp(&download_args(url, options), &cancel)
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let path = parse_output_path(&stdout).ok_or(ExtractError::MissingOutput)?;

        if tokio::fs::metadata(&path).await.is_err() {
            warn!(path = %path.display(), "yt-dlp reported a file that does not exist");
            return Err(ExtractError::MissingOutput);
        }

        info!(path = %path.display(), "yt-dlp download finished");
        Ok(path)
    }
}
