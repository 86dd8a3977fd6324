//! Chat transport abstraction
//!
//! The flow speaks to the chat platform only through [`ChatTransport`].
//! [`TelegramTransport`] is the production implementation; tests use
//! [`crate::testing::RecordingTransport`].

use crate::bot::resilient::{
    answer_callback_resilient, delete_message_resilient, edit_message_safe_resilient,
    send_audio_resilient, send_message_resilient, send_video_resilient,
};
use async_trait::async_trait;
use std::path::PathBuf;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, MessageId, ParseMode};
use thiserror::Error;

/// Chat a message is sent to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChatRef(pub i64);

/// Message inside a chat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageRef(pub i32);

/// One inline button
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuButton {
    /// Visible text
    pub label: String,
    /// Callback data sent back on press
    pub token: String,
}

impl MenuButton {
    /// Creates a button
    pub fn new(label: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            token: token.into(),
        }
    }
}

/// Inline keyboard, row by row
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Menu {
    /// Button rows
    pub rows: Vec<Vec<MenuButton>>,
}

impl Menu {
    /// All callback tokens in display order
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().flatten().map(|b| b.token.as_str())
    }

    /// Total number of buttons
    #[must_use]
    pub fn button_count(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }
}

impl From<&Menu> for InlineKeyboardMarkup {
    fn from(menu: &Menu) -> Self {
        Self::new(menu.rows.iter().map(|row| {
            row.iter()
                .map(|b| InlineKeyboardButton::callback(b.label.clone(), b.token.clone()))
                .collect::<Vec<_>>()
        }))
    }
}

/// How a file is presented in the chat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// Playable video
    Video,
    /// Audio track with title metadata
    Audio,
}

/// A file to upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaUpload {
    /// Video or audio
    pub kind: MediaKind,
    /// Local file
    pub path: PathBuf,
    /// Caption under the attachment (HTML)
    pub caption: String,
    /// Track title, used for audio only
    pub title: Option<String>,
}

/// Errors from the chat platform
#[derive(Debug, Error)]
pub enum TransportError {
    /// The platform API rejected or failed the call
    #[error("chat API error: {0}")]
    Api(String),
    /// Local I/O while preparing an upload
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<anyhow::Error> for TransportError {
    fn from(e: anyhow::Error) -> Self {
        Self::Api(e.to_string())
    }
}

/// Outbound side of the chat platform
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Sends an HTML text message
    async fn send_text(&self, chat: ChatRef, text: &str) -> Result<MessageRef, TransportError>;

    /// Sends an HTML text message with an inline menu
    async fn send_menu(
        &self,
        chat: ChatRef,
        text: &str,
        menu: &Menu,
    ) -> Result<MessageRef, TransportError>;

    /// Replaces the text (and menu) of an existing message; `None` removes the menu
    async fn edit_text(
        &self,
        chat: ChatRef,
        message: MessageRef,
        text: &str,
        menu: Option<&Menu>,
    ) -> Result<(), TransportError>;

    /// Deletes a message
    async fn delete_message(&self, chat: ChatRef, message: MessageRef)
        -> Result<(), TransportError>;

    /// Acknowledges a button press, optionally with a short toast
    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), TransportError>;

    /// Uploads a file
    async fn send_media(&self, chat: ChatRef, media: &MediaUpload) -> Result<(), TransportError>;
}

/// [`ChatTransport`] over the Telegram Bot API
#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    /// Wraps a bot handle
    #[must_use]
    pub const fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn send_text(&self, chat: ChatRef, text: &str) -> Result<MessageRef, TransportError> {
        let msg =
            send_message_resilient(&self.bot, ChatId(chat.0), text, Some(ParseMode::Html), None)
                .await?;
        Ok(MessageRef(msg.id.0))
    }

    async fn send_menu(
        &self,
        chat: ChatRef,
        text: &str,
        menu: &Menu,
    ) -> Result<MessageRef, TransportError> {
        let msg = send_message_resilient(
            &self.bot,
            ChatId(chat.0),
            text,
            Some(ParseMode::Html),
            Some(menu.into()),
        )
        .await?;
        Ok(MessageRef(msg.id.0))
    }

    async fn edit_text(
        &self,
        chat: ChatRef,
        message: MessageRef,
        text: &str,
        menu: Option<&Menu>,
    ) -> Result<(), TransportError> {
        edit_message_safe_resilient(
            &self.bot,
            ChatId(chat.0),
            MessageId(message.0),
            text,
            menu.map(Into::into),
        )
        .await?;
        Ok(())
    }

    async fn delete_message(
        &self,
        chat: ChatRef,
        message: MessageRef,
    ) -> Result<(), TransportError> {
        delete_message_resilient(&self.bot, ChatId(chat.0), MessageId(message.0)).await?;
        Ok(())
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), TransportError> {
        answer_callback_resilient(&self.bot, callback_id, text).await?;
        Ok(())
    }

    async fn send_media(&self, chat: ChatRef, media: &MediaUpload) -> Result<(), TransportError> {
        // Fail early with a local error instead of an opaque upload failure
        tokio::fs::metadata(&media.path).await?;

        match media.kind {
            MediaKind::Video => {
                send_video_resilient(&self.bot, ChatId(chat.0), &media.path, &media.caption)
                    .await?;
            }
            MediaKind::Audio => {
                send_audio_resilient(
                    &self.bot,
                    ChatId(chat.0),
                    &media.path,
                    &media.caption,
                    media.title.as_deref(),
                )
                .await?;
            }
        }
        Ok(())
    }
}
