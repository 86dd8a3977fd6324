//! Errors produced by the download flow

use crate::bot::transport::TransportError;
use crate::bot::views::{DefaultDownloadView, DownloadView};
use crate::extractor::ExtractError;
use std::fmt;
use thiserror::Error;

/// Bounded stage of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStage {
    /// Metadata lookup
    Extraction,
    /// Download and transcode
    Download,
}

impl fmt::Display for FlowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Extraction => write!(f, "Analysis"),
            Self::Download => write!(f, "Download"),
        }
    }
}

/// Terminal outcome of a flow operation other than success
#[derive(Debug, Error)]
pub enum FlowError {
    /// The text names no supported platform
    #[error("unsupported link")]
    UnsupportedLink,
    /// No pending request for the user
    #[error("session expired")]
    SessionExpired,
    /// Metadata lookup failed
    #[error("extraction failed: {0}")]
    ExtractionFailed(#[source] ExtractError),
    /// Download failed
    #[error("download failed: {0}")]
    DownloadFailed(#[source] ExtractError),
    /// Produced file exceeds the upload limit
    #[error("file too large: {size} bytes (limit {limit})")]
    FileTooLarge {
        /// File size in bytes
        size: u64,
        /// Limit in bytes
        limit: u64,
    },
    /// Uploading the file failed
    #[error("send failed: {0}")]
    SendFailed(#[source] TransportError),
    /// A stage exceeded its deadline
    #[error("{stage} timed out after {secs}s")]
    TimedOut {
        /// Which stage
        stage: FlowStage,
        /// The deadline that was hit
        secs: u64,
    },
    /// The user cancelled or a newer link replaced the request
    #[error("cancelled")]
    Cancelled,
    /// A status message could not be sent or edited
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    /// Local filesystem error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FlowError {
    /// Text shown to the user for this outcome
    #[must_use]
    pub fn user_message(&self) -> String {
        type V = DefaultDownloadView;
        match self {
            Self::UnsupportedLink => V::unsupported_link().to_string(),
            Self::SessionExpired => V::session_expired().to_string(),
            Self::ExtractionFailed(ExtractError::Unavailable(_))
            | Self::DownloadFailed(ExtractError::Unavailable(_)) => {
                V::media_unavailable().to_string()
            }
            Self::ExtractionFailed(_) => V::analysis_failed().to_string(),
            Self::DownloadFailed(ExtractError::Cancelled) | Self::Cancelled => {
                V::cancelled().to_string()
            }
            Self::DownloadFailed(_) => V::download_failed().to_string(),
            Self::FileTooLarge { size, limit } => {
                V::file_too_large(size.div_ceil(1024 * 1024), limit / (1024 * 1024))
            }
            Self::SendFailed(_) => V::send_failed().to_string(),
            Self::TimedOut { stage, secs } => V::timed_out(*stage, *secs),
            Self::Transport(_) | Self::Io(_) => V::unexpected_error().to_string(),
        }
    }

    /// `true` for errors outside the flow's own vocabulary
    #[must_use]
    pub const fn is_unexpected(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Io(_))
    }
}
