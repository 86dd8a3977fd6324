//! Callback tokens of the format menu

use crate::extractor::{AudioCodec, FormatRequest};

const QUALITY_PREFIX: &str = "quality_";
const AUDIO_TOKEN: &str = "audio_mp3";
const CANCEL_TOKEN: &str = "cancel";

/// Heights offered in the menu
pub const SUPPORTED_HEIGHTS: &[u32] = &[720, 480, 360];

/// What the user picked in the format menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    /// Video no taller than the given height
    Quality(u32),
    /// MP3 audio
    Audio,
    /// Abort the request
    Cancel,
}

impl Choice {
    /// Parse callback data.
    ///
    /// Only the fixed vocabulary (`quality_720`, `quality_480`, `quality_360`,
    /// `audio_mp3`, `cancel`) is accepted.
    ///
    /// # Examples
    ///
    /// ```
    /// use media_fetch_bot::flow::choice::Choice;
    /// assert_eq!(Choice::from_token("quality_480"), Some(Choice::Quality(480)));
    /// assert_eq!(Choice::from_token("quality_1080"), None);
    /// ```
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            AUDIO_TOKEN => Some(Self::Audio),
            CANCEL_TOKEN => Some(Self::Cancel),
            _ => token
                .strip_prefix(QUALITY_PREFIX)
                .and_then(|h| h.parse::<u32>().ok())
                .filter(|h| SUPPORTED_HEIGHTS.contains(h))
                .map(Self::Quality),
        }
    }

    /// Callback data for this choice
    #[must_use]
    pub fn token(&self) -> String {
        match self {
            Self::Quality(height) => format!("{QUALITY_PREFIX}{height}"),
            Self::Audio => AUDIO_TOKEN.to_string(),
            Self::Cancel => CANCEL_TOKEN.to_string(),
        }
    }

    /// Short human-readable name, used in status messages
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Quality(height) => format!("{height}p"),
            Self::Audio => "MP3".to_string(),
            Self::Cancel => "cancel".to_string(),
        }
    }

    /// Download request for this choice; `None` for [`Choice::Cancel`]
    #[must_use]
    pub const fn format_request(&self, audio_bitrate_kbps: u32) -> Option<FormatRequest> {
        match self {
            Self::Quality(height) => Some(FormatRequest::MaxHeight(*height)),
            Self::Audio => Some(FormatRequest::BestAudio {
                codec: AudioCodec::Mp3,
                bitrate_kbps: audio_bitrate_kbps,
            }),
            Self::Cancel => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocabulary_round_trips() {
        for token in ["quality_720", "quality_480", "quality_360", "audio_mp3", "cancel"] {
            let choice = Choice::from_token(token).expect("known token");
            assert_eq!(choice.token(), token);
        }
    }

    #[test]
    fn test_unknown_tokens_rejected() {
        for token in ["", "quality_", "quality_abc", "quality_1080", "audio_flac", "CANCEL"] {
            assert_eq!(Choice::from_token(token), None, "{token}");
        }
    }

    #[test]
    fn test_format_request_mapping() {
        assert_eq!(
            Choice::Quality(480).format_request(192),
            Some(FormatRequest::MaxHeight(480))
        );
        let audio = Choice::Audio.format_request(192).expect("audio request");
        assert!(audio.is_audio());
        assert_eq!(audio.selector(), "bestaudio/best");
        assert_eq!(Choice::Cancel.format_request(192), None);
    }
}
