//! Testing helpers and mock utilities.
//!
//! Provides a recording chat transport and convenient constructors for a
//! mocked extractor.

use crate::bot::transport::{
    ChatRef, ChatTransport, Menu, MediaUpload, MessageRef, TransportError,
};
use crate::config::Settings;
use crate::extractor::{MediaMetadata, MockMediaExtractor};
use async_trait::async_trait;
use std::sync::atomic::{AtomicI32, Ordering};
use tokio::sync::Mutex;

/// Settings with a fresh, unique download directory
#[must_use]
pub fn test_settings() -> Settings {
    Settings {
        telegram_token: "dummy".to_string(),
        download_dir: std::env::temp_dir()
            .join("media-fetch-bot-tests")
            .join(uuid::Uuid::new_v4().to_string()),
        ..Settings::default()
    }
}

/// Create a mock extractor whose metadata lookup returns `title`.
///
/// `download` has no expectation; tests add their own.
#[must_use]
pub fn mock_extractor_with_metadata(title: &'static str) -> MockMediaExtractor {
    let mut mock = MockMediaExtractor::new();
    mock.expect_fetch_metadata().returning(move |_, _| {
        Ok(MediaMetadata {
            title: title.to_string(),
            duration: Some(213),
            uploader: Some("Uploader".to_string()),
        })
    });
    mock
}

/// One outbound call seen by [`RecordingTransport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    /// `send_text`
    Text {
        /// Target chat
        chat: ChatRef,
        /// Assigned message id
        message: MessageRef,
        /// Body
        text: String,
    },
    /// `send_menu`
    Menu {
        /// Target chat
        chat: ChatRef,
        /// Assigned message id
        message: MessageRef,
        /// Body
        text: String,
        /// Keyboard
        menu: Menu,
    },
    /// `edit_text`
    Edit {
        /// Target chat
        chat: ChatRef,
        /// Edited message
        message: MessageRef,
        /// New body
        text: String,
        /// New keyboard
        menu: Option<Menu>,
    },
    /// `delete_message`
    Delete {
        /// Target chat
        chat: ChatRef,
        /// Deleted message
        message: MessageRef,
    },
    /// `answer_callback`
    Answer {
        /// Answered query
        callback_id: String,
        /// Toast text
        text: Option<String>,
    },
    /// `send_media`
    Media {
        /// Target chat
        chat: ChatRef,
        /// Uploaded file
        media: MediaUpload,
    },
}

/// [`ChatTransport`] that records every call
#[derive(Default)]
pub struct RecordingTransport {
    events: Mutex<Vec<Sent>>,
    next_id: AtomicI32,
    down: bool,
}

impl RecordingTransport {
    /// A transport whose every call fails
    #[must_use]
    pub fn failing() -> Self {
        Self {
            down: true,
            ..Self::default()
        }
    }

    /// All recorded calls in order
    pub async fn events(&self) -> Vec<Sent> {
        self.events.lock().await.clone()
    }

    /// Bodies of sent, menu and edited messages in order
    pub async fn texts(&self) -> Vec<String> {
        self.events
            .lock()
            .await
            .iter()
            .filter_map(|e| match e {
                Sent::Text { text, .. } | Sent::Menu { text, .. } | Sent::Edit { text, .. } => {
                    Some(text.clone())
                }
                _ => None,
            })
            .collect()
    }

    /// Toast texts of answered callbacks
    pub async fn answers(&self) -> Vec<Option<String>> {
        self.events
            .lock()
            .await
            .iter()
            .filter_map(|e| match e {
                Sent::Answer { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// Uploaded files
    pub async fn media(&self) -> Vec<MediaUpload> {
        self.events
            .lock()
            .await
            .iter()
            .filter_map(|e| match e {
                Sent::Media { media, .. } => Some(media.clone()),
                _ => None,
            })
            .collect()
    }

    async fn record(&self, event: Sent) -> Result<(), TransportError> {
        if self.down {
            return Err(TransportError::Api("transport down".to_string()));
        }
        self.events.lock().await.push(event);
        Ok(())
    }

    fn next_message(&self) -> MessageRef {
        MessageRef(self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn send_text(&self, chat: ChatRef, text: &str) -> Result<MessageRef, TransportError> {
        let message = self.next_message();
        self.record(Sent::Text {
            chat,
            message,
            text: text.to_string(),
        })
        .await?;
        Ok(message)
    }

    async fn send_menu(
        &self,
        chat: ChatRef,
        text: &str,
        menu: &Menu,
    ) -> Result<MessageRef, TransportError> {
        let message = self.next_message();
        self.record(Sent::Menu {
            chat,
            message,
            text: text.to_string(),
            menu: menu.clone(),
        })
        .await?;
        Ok(message)
    }

    async fn edit_text(
        &self,
        chat: ChatRef,
        message: MessageRef,
        text: &str,
        menu: Option<&Menu>,
    ) -> Result<(), TransportError> {
        self.record(Sent::Edit {
            chat,
            message,
            text: text.to_string(),
            menu: menu.cloned(),
        })
        .await
    }

    async fn delete_message(
        &self,
        chat: ChatRef,
        message: MessageRef,
    ) -> Result<(), TransportError> {
        self.record(Sent::Delete { chat, message }).await
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), TransportError> {
        self.record(Sent::Answer {
            callback_id: callback_id.to_string(),
            text: text.map(str::to_string),
        })
        .await
    }

    async fn send_media(&self, chat: ChatRef, media: &MediaUpload) -> Result<(), TransportError> {
        self.record(Sent::Media {
            chat,
            media: media.clone(),
        })
        .await
    }
}
