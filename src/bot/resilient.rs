//! Resilient messaging utilities with automatic retry for Telegram API operations.
//!
//! Every wrapper goes through [`crate::utils::retry_telegram_operation`], which
//! retries transient failures using exponential backoff with jitter.
//!
//! # Usage
//!
//! ```ignore
//! use media_fetch_bot::bot::resilient::{send_message_resilient, edit_message_safe_resilient};
//!
//! let msg = send_message_resilient(&bot, chat_id, "Hello!", Some(ParseMode::Html), None).await?;
//! edit_message_safe_resilient(&bot, chat_id, msg.id, "Updated!", None).await?;
//! ```

use anyhow::Result;
use std::path::Path;
use teloxide::prelude::*;
use teloxide::types::{
    CallbackQueryId, ChatId, InlineKeyboardMarkup, InputFile, Message, MessageId, ParseMode,
};
use tracing::debug;

/// Telegram hard limit is 4096, keep some room for the suffix
const MAX_EDIT_CHARS: usize = 4000;

const ERROR_NOT_MODIFIED: &str = "message is not modified";
const ERROR_NOT_FOUND: &str = "message to edit not found";

/// Send a message with automatic retry on network failures.
///
/// # Arguments
///
/// * `bot` - The Telegram bot instance
/// * `chat_id` - Target chat ID
/// * `text` - Message text to send
/// * `parse_mode` - Optional parse mode (HTML, Markdown, etc.)
/// * `keyboard` - Optional inline keyboard attached to the message
///
/// # Errors
///
/// Returns an error after all retries are exhausted.
pub async fn send_message_resilient(
    bot: &Bot,
    chat_id: ChatId,
    text: impl Into<String>,
    parse_mode: Option<ParseMode>,
    keyboard: Option<InlineKeyboardMarkup>,
) -> Result<Message> {
    let text = text.into();
    crate::utils::retry_telegram_operation(|| async {
        let mut req = bot.send_message(chat_id, text.clone());
        if let Some(pm) = parse_mode {
            req = req.parse_mode(pm);
        }
        if let Some(kb) = keyboard.clone() {
            req = req.reply_markup(kb);
        }
        req.await
            .map_err(|e| anyhow::anyhow!("Telegram send error: {e}"))
    })
    .await
}

/// Edit a message with automatic retry on network failures.
///
/// # Errors
///
/// Returns an error after all retries are exhausted.
pub async fn edit_message_resilient(
    bot: &Bot,
    chat_id: ChatId,
    msg_id: MessageId,
    text: impl Into<String>,
    parse_mode: Option<ParseMode>,
    keyboard: Option<InlineKeyboardMarkup>,
) -> Result<Message> {
    let text = text.into();
    crate::utils::retry_telegram_operation(|| async {
        let mut req = bot.edit_message_text(chat_id, msg_id, text.clone());
        if let Some(pm) = parse_mode {
            req = req.parse_mode(pm);
        }
        if let Some(kb) = keyboard.clone() {
            req = req.reply_markup(kb);
        }
        req.await
            .map_err(|e| anyhow::anyhow!("Telegram edit error: {e}"))
    })
    .await
}

/// Edit message with graceful degradation and automatic retry.
///
/// This function:
/// 1. Truncates text to 4000 characters if needed
/// 2. Retries on transient network errors
/// 3. Treats "message not modified" and "not found" as a skipped edit
///
/// # Returns
///
/// - `Ok(true)` if the message was edited
/// - `Ok(false)` if the edit was skipped
///
/// # Errors
///
/// Returns any other error after all retries are exhausted.
pub async fn edit_message_safe_resilient(
    bot: &Bot,
    chat_id: ChatId,
    msg_id: MessageId,
    text: &str,
    keyboard: Option<InlineKeyboardMarkup>,
) -> Result<bool> {
    let text = fit_message(text);

    match edit_message_resilient(bot, chat_id, msg_id, text, Some(ParseMode::Html), keyboard).await
    {
        Ok(_) => Ok(true),
        Err(e) if is_benign_edit_error(&e.to_string()) => {
            debug!("Message update skipped: {e}");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// Delete a message with automatic retry.
///
/// # Errors
///
/// Returns an error after all retries are exhausted.
pub async fn delete_message_resilient(bot: &Bot, chat_id: ChatId, msg_id: MessageId) -> Result<()> {
    crate::utils::retry_telegram_operation(|| async {
        bot.delete_message(chat_id, msg_id)
            .await
            .map(|_| ())
            .map_err(|e| anyhow::anyhow!("Telegram delete error: {e}"))
    })
    .await
}

/// Answer a callback query with automatic retry.
///
/// # Errors
///
/// Returns an error after all retries are exhausted.
pub async fn answer_callback_resilient(
    bot: &Bot,
    callback_id: &str,
    text: Option<&str>,
) -> Result<()> {
    crate::utils::retry_telegram_operation(|| async {
        let mut req = bot.answer_callback_query(CallbackQueryId(callback_id.to_string()));
        if let Some(t) = text {
            req = req.text(t);
        }
        req.await
            .map(|_| ())
            .map_err(|e| anyhow::anyhow!("Telegram callback answer error: {e}"))
    })
    .await
}

/// Upload a local file as a streamable video with automatic retry.
///
/// # Errors
///
/// Returns an error after all retries are exhausted.
pub async fn send_video_resilient(
    bot: &Bot,
    chat_id: ChatId,
    path: &Path,
    caption: &str,
) -> Result<Message> {
    crate::utils::retry_telegram_operation(|| async {
        bot.send_video(chat_id, InputFile::file(path.to_path_buf()))
            .caption(caption.to_string())
            .parse_mode(ParseMode::Html)
            .supports_streaming(true)
            .await
            .map_err(|e| anyhow::anyhow!("Telegram video upload error: {e}"))
    })
    .await
}

/// Upload a local file as audio with automatic retry.
///
/// # Errors
///
/// Returns an error after all retries are exhausted.
pub async fn send_audio_resilient(
    bot: &Bot,
    chat_id: ChatId,
    path: &Path,
    caption: &str,
    title: Option<&str>,
) -> Result<Message> {
    crate::utils::retry_telegram_operation(|| async {
        let mut req = bot
            .send_audio(chat_id, InputFile::file(path.to_path_buf()))
            .caption(caption.to_string())
            .parse_mode(ParseMode::Html);
        if let Some(t) = title {
            req = req.title(t.to_string());
        }
        req.await
            .map_err(|e| anyhow::anyhow!("Telegram audio upload error: {e}"))
    })
    .await
}

/// `true` for edit failures that mean there is nothing left to do
fn is_benign_edit_error(message: &str) -> bool {
    message.contains(ERROR_NOT_MODIFIED) || message.contains(ERROR_NOT_FOUND)
}

fn fit_message(text: &str) -> String {
    if text.chars().count() > MAX_EDIT_CHARS {
        let truncated = crate::utils::truncate_str(text, MAX_EDIT_CHARS);
        format!("{truncated}...")
    } else {
        text.to_string()
    }
}
