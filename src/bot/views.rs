//! Download UI components
//!
//! Contains menus, text messages, and caption formatters. Texts are HTML.

use crate::bot::transport::{Menu, MenuButton};
use crate::config::{
    MenuLayout, AUDIO_TITLE_MAX_CHARS, CAPTION_MAX_CHARS, MENU_TITLE_MAX_CHARS,
};
use crate::error::FlowStage;
use crate::flow::choice::Choice;
use crate::session::PendingRequest;
use crate::utils::{format_duration, truncate_str};

// ─────────────────────────────────────────────────────────────────────────────
// Trait definition
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for download UI view rendering
pub trait DownloadView {
    /// Reply to `/start` and `/help`
    fn welcome_message() -> &'static str;

    /// Text that mentions none of the supported platforms
    fn unsupported_link() -> &'static str;

    /// Shown while metadata is fetched
    fn analyzing() -> &'static str;

    /// Metadata lookup failed
    fn analysis_failed() -> &'static str;

    /// The media is private, removed or blocked
    fn media_unavailable() -> &'static str;

    /// Shown while the chosen format downloads
    fn processing(choice: Choice) -> String;

    /// Shown while the file is uploaded
    fn uploading() -> &'static str;

    /// Upload finished
    fn done() -> &'static str;

    /// Request cancelled by the user
    fn cancelled() -> &'static str;

    /// No pending request for this user
    fn session_expired() -> &'static str;

    /// Button data outside the menu vocabulary
    fn unknown_option() -> &'static str;

    /// Second press while a download runs
    fn already_processing() -> &'static str;

    /// Download failed for a reason other than availability
    fn download_failed() -> &'static str;

    /// Produced file exceeds the upload limit
    fn file_too_large(size_mb: u64, limit_mb: u64) -> String;

    /// Upload to the chat failed
    fn send_failed() -> &'static str;

    /// A stage ran past its deadline
    fn timed_out(stage: FlowStage, secs: u64) -> String;

    /// Anything the flow did not anticipate
    fn unexpected_error() -> &'static str;
}

// ─────────────────────────────────────────────────────────────────────────────
// Default implementation
// ─────────────────────────────────────────────────────────────────────────────

/// Default English implementation of `DownloadView`
pub struct DefaultDownloadView;

impl DownloadView for DefaultDownloadView {
    fn welcome_message() -> &'static str {
        r"🤖 <b>Media Downloader</b>

✨ <b>Features:</b>
• ✅ Video in several qualities
• 🎵 MP3 audio
• 🚀 YouTube, TikTok, Instagram, X

📥 <b>Send a link to get started</b>
/cancel drops the current request."
    }

    fn unsupported_link() -> &'static str {
        "❌ Unsupported link."
    }

    fn analyzing() -> &'static str {
        "🔍 Analyzing video..."
    }

    fn analysis_failed() -> &'static str {
        "❌ Could not analyze the video."
    }

    fn media_unavailable() -> &'static str {
        "❌ This media is unavailable (private, removed or region-locked)."
    }

    fn processing(choice: Choice) -> String {
        format!("⏳ Processing ({})...", choice.label())
    }

    fn uploading() -> &'static str {
        "📤 Uploading..."
    }

    fn done() -> &'static str {
        "✅ Done!"
    }

    fn cancelled() -> &'static str {
        "❌ Cancelled."
    }

    fn session_expired() -> &'static str {
        "❌ Session expired. Send the link again."
    }

    fn unknown_option() -> &'static str {
        "⚠️ Unknown option"
    }

    fn already_processing() -> &'static str {
        "⏳ Already processing, please wait."
    }

    fn download_failed() -> &'static str {
        "❌ Download failed. Try another format."
    }

    fn file_too_large(size_mb: u64, limit_mb: u64) -> String {
        format!("❌ File is too large ({size_mb} MB, limit {limit_mb} MB). Try a lower quality.")
    }

    fn send_failed() -> &'static str {
        "❌ Could not send the file."
    }

    fn timed_out(stage: FlowStage, secs: u64) -> String {
        format!("⌛ {stage} timed out after {secs}s.")
    }

    fn unexpected_error() -> &'static str {
        "❌ An unexpected error occurred. Please try again."
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Formatters
// ─────────────────────────────────────────────────────────────────────────────

/// Menu header: title, duration and uploader of the pending request
#[must_use]
pub fn menu_text(request: &PendingRequest) -> String {
    let mut title = truncate_str(&request.title, MENU_TITLE_MAX_CHARS);
    if title.len() < request.title.len() {
        title.push('…');
    }

    let mut text = format!("🎬 <b>{}</b>\n", html_escape::encode_text(&title));
    if let Some(duration) = request.duration {
        text.push_str(&format!("⏱ Duration: {}\n", format_duration(duration)));
    }
    if let Some(uploader) = request.uploader.as_deref().filter(|u| !u.is_empty()) {
        text.push_str(&format!("👤 {}\n", html_escape::encode_text(uploader)));
    }
    text.push_str("\n📥 <b>Choose a format:</b>");
    text
}

/// Caption of a video attachment: the title
#[must_use]
pub fn video_caption(title: &str) -> String {
    html_escape::encode_text(&truncate_str(title, CAPTION_MAX_CHARS - 8)).into_owned()
}

/// Caption of an audio attachment, contains the title
#[must_use]
pub fn audio_caption(title: &str) -> String {
    format!(
        "🎵 {}",
        html_escape::encode_text(&truncate_str(title, CAPTION_MAX_CHARS - 8))
    )
}

/// Track title embedded in the audio attachment
#[must_use]
pub fn audio_title(title: &str) -> String {
    truncate_str(title, AUDIO_TITLE_MAX_CHARS)
}

// ─────────────────────────────────────────────────────────────────────────────
// Menus
// ─────────────────────────────────────────────────────────────────────────────

fn quality_label(height: u32) -> String {
    match height {
        720 => "🎥 High (720p)".to_string(),
        480 => "🎥 Medium (480p)".to_string(),
        h => format!("🎥 Low ({h}p)"),
    }
}

fn button(label: impl Into<String>, choice: Choice) -> MenuButton {
    MenuButton::new(label, choice.token())
}

fn cancel_button() -> MenuButton {
    button("❌ Cancel", Choice::Cancel)
}

/// Format menu for the configured layout
///
/// # Examples
///
/// ```
/// use media_fetch_bot::bot::views::format_menu;
/// use media_fetch_bot::config::MenuLayout;
///
/// let menu = format_menu(MenuLayout::Compact, 192);
/// assert_eq!(menu.button_count(), 4);
/// ```
#[must_use]
pub fn format_menu(layout: MenuLayout, audio_bitrate_kbps: u32) -> Menu {
    let rows = match layout {
        MenuLayout::Compact => vec![
            vec![button(quality_label(720), Choice::Quality(720))],
            vec![button(quality_label(480), Choice::Quality(480))],
            vec![button("🎵 MP3 audio", Choice::Audio)],
            vec![cancel_button()],
        ],
        MenuLayout::Extended => vec![
            vec![
                button(quality_label(720), Choice::Quality(720)),
                button(quality_label(480), Choice::Quality(480)),
            ],
            vec![
                button(quality_label(360), Choice::Quality(360)),
                button(
                    format!("🎵 MP3 ({audio_bitrate_kbps} kbps)"),
                    Choice::Audio,
                ),
            ],
            vec![cancel_button()],
        ],
    };
    Menu { rows }
}

/// Single Cancel button shown while a download runs
#[must_use]
pub fn processing_menu() -> Menu {
    Menu {
        rows: vec![vec![cancel_button()]],
    }
}
