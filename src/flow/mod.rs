//! Link-to-download session flow
//!
//! [`SessionFlow`] drives one user from a pasted link to a delivered file:
//!
//! ```text
//! IDLE ─link─▶ ANALYZING ─metadata─▶ AWAITING_SELECTION ─choice─▶ PROCESSING ─▶ IDLE
//!                  │ fail/timeout          │ cancel / ttl             │ done/fail/cancel
//!                  └──────────▶ IDLE ◀─────┘                          ▼
//! ```
//!
//! Expected failures are reported to the user by the flow itself and returned
//! as [`FlowError`]. Errors for which [`FlowError::is_unexpected`] holds are
//! returned unreported; the caller answers them generically.

/// Callback tokens of the format menu
pub mod choice;

use crate::bot::transport::{ChatRef, ChatTransport, MediaKind, MediaUpload, MessageRef};
use crate::bot::views::{
    audio_caption, audio_title, format_menu, menu_text, processing_menu, video_caption,
    DefaultDownloadView, DownloadView,
};
use crate::config::Settings;
use crate::error::{FlowError, FlowStage};
use crate::extractor::{DownloadOptions, ExtractError, FormatRequest, MediaExtractor};
use crate::links::extract_link;
use crate::session::{Claim, PendingRequest, SessionStore};
use choice::Choice;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

type View = DefaultDownloadView;

/// Result of a button press that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// The file was downloaded and sent
    Delivered(MediaKind),
    /// The user's request was dropped
    Cancelled,
    /// A download for this user is already running
    AlreadyProcessing,
    /// The button data is not part of the menu
    UnknownOption,
}

/// Orchestrates the session store, the extractor and the chat transport
pub struct SessionFlow {
    transport: Arc<dyn ChatTransport>,
    extractor: Arc<dyn MediaExtractor>,
    sessions: SessionStore,
    settings: Arc<Settings>,
}

impl SessionFlow {
    /// Creates a flow over the given collaborators
    #[must_use]
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        extractor: Arc<dyn MediaExtractor>,
        sessions: SessionStore,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            transport,
            extractor,
            sessions,
            settings,
        }
    }

    /// The underlying session store
    #[must_use]
    pub const fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Handles a text message that may contain a link.
    ///
    /// On success the format menu has been sent and the returned request is
    /// stored, replacing (and cancelling) the user's previous one.
    ///
    /// # Errors
    ///
    /// `UnsupportedLink`, `ExtractionFailed` and `TimedOut` after the user has
    /// been told; `Transport` if the chat could not be reached.
    pub async fn submit_link(
        &self,
        user_id: i64,
        chat: ChatRef,
        text: &str,
    ) -> Result<PendingRequest, FlowError> {
        let Some(url) = extract_link(text) else {
            self.transport
                .send_text(chat, View::unsupported_link())
                .await?;
            return Err(FlowError::UnsupportedLink);
        };

        info!(user_id, url = %url, "Link received");
        let status = self.transport.send_text(chat, View::analyzing()).await?;

        let metadata = match self.lookup(url).await {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(user_id, url = %url, error = %e, "Metadata lookup failed");
                self.delete_quietly(chat, status).await;
                self.transport.send_text(chat, &e.user_message()).await?;
                return Err(e);
            }
        };

        let request = PendingRequest::new(user_id, url, metadata);
        self.sessions.insert(request.clone()).await;
        self.delete_quietly(chat, status).await;

        let menu = format_menu(self.settings.menu_layout, self.settings.audio_bitrate_kbps);
        self.transport
            .send_menu(chat, &menu_text(&request), &menu)
            .await?;

        debug!(user_id, title = %request.title, "Format menu sent");
        Ok(request)
    }

    /// Handles a press on the format menu (or on the Cancel button of a
    /// running download).
    ///
    /// Returns once the chosen file has been delivered or the request has
    /// reached another terminal state, so callers should run it off the
    /// update loop.
    ///
    /// # Errors
    ///
    /// `SessionExpired` when the user has no pending request; the download
    /// errors (`DownloadFailed`, `FileTooLarge`, `SendFailed`, `TimedOut`,
    /// `Cancelled`) after the status message shows them; `Transport`/`Io`
    /// for unexpected failures.
    pub async fn handle_selection(
        &self,
        user_id: i64,
        chat: ChatRef,
        message: MessageRef,
        callback_id: &str,
        token: &str,
    ) -> Result<Selection, FlowError> {
        let Some(choice) = Choice::from_token(token) else {
            debug!(user_id, token, "Unknown callback data");
            self.answer_quietly(callback_id, Some(View::unknown_option()))
                .await;
            return Ok(Selection::UnknownOption);
        };

        if choice == Choice::Cancel {
            self.answer_quietly(callback_id, None).await;
            if self.sessions.cancel(user_id).await.is_some() {
                info!(user_id, "Request cancelled from menu");
            }
            self.transport
                .edit_text(chat, message, View::cancelled(), None)
                .await?;
            return Ok(Selection::Cancelled);
        }

        let request = match self.sessions.claim(user_id, choice).await {
            Claim::Claimed(request) => request,
            Claim::Busy => {
                self.answer_quietly(callback_id, Some(View::already_processing()))
                    .await;
                return Ok(Selection::AlreadyProcessing);
            }
            Claim::Missing => {
                self.answer_quietly(callback_id, None).await;
                self.transport
                    .edit_text(chat, message, View::session_expired(), None)
                    .await?;
                return Err(FlowError::SessionExpired);
            }
        };
        self.answer_quietly(callback_id, None).await;

        info!(user_id, url = %request.url, choice = %choice.label(), "Processing request");
        let result = self.run_job(&request, choice, chat, message).await;
        self.sessions.finish(user_id, request.id).await;

        match result {
            Ok(kind) => {
                info!(user_id, choice = %choice.label(), "Media delivered");
                // A cancel during the upload already rewrote the status
                if request
                    .cancel_token()
                    .is_some_and(CancellationToken::is_cancelled)
                {
                    debug!(user_id, "Cancelled during upload, keeping status");
                } else {
                    self.edit_status(chat, message, View::done()).await;
                }
                Ok(Selection::Delivered(kind))
            }
            Err(e) if e.is_unexpected() => Err(e),
            Err(e) => {
                warn!(user_id, url = %request.url, error = %e, "Request failed");
                self.edit_status(chat, message, &e.user_message()).await;
                Err(e)
            }
        }
    }

    /// Handles `/cancel`: drops the user's request and confirms in a new message.
    ///
    /// Returns whether a request existed.
    ///
    /// # Errors
    ///
    /// `Transport` if the confirmation could not be sent.
    pub async fn cancel(&self, user_id: i64, chat: ChatRef) -> Result<bool, FlowError> {
        let existed = self.sessions.cancel(user_id).await.is_some();
        if existed {
            info!(user_id, "Request cancelled by command");
        }
        self.transport.send_text(chat, View::cancelled()).await?;
        Ok(existed)
    }

    async fn lookup(&self, url: &str) -> Result<crate::extractor::MediaMetadata, FlowError> {
        let limit = self.settings.extraction_timeout();
        let cancel = CancellationToken::new();

        match timeout(limit, self.extractor.fetch_metadata(url, cancel.clone())).await {
            Ok(Ok(metadata)) => Ok(metadata),
            Ok(Err(e)) => Err(FlowError::ExtractionFailed(e)),
            Err(_) => {
                cancel.cancel();
                Err(FlowError::TimedOut {
                    stage: FlowStage::Extraction,
                    secs: limit.as_secs(),
                })
            }
        }
    }

    /// Download into a fresh directory, upload, and always remove the directory
    async fn run_job(
        &self,
        request: &PendingRequest,
        choice: Choice,
        chat: ChatRef,
        message: MessageRef,
    ) -> Result<MediaKind, FlowError> {
        let cancel = request.cancel_token().cloned().unwrap_or_default();
        let format = choice
            .format_request(self.settings.audio_bitrate_kbps)
            .ok_or(FlowError::Cancelled)?;

        if let Err(e) = self
            .transport
            .edit_text(
                chat,
                message,
                &View::processing(choice),
                Some(&processing_menu()),
            )
            .await
        {
            warn!(error = %e, "Failed to show processing status");
        }

        let job_dir = self.settings.download_dir.join(request.id.to_string());
        tokio::fs::create_dir_all(&job_dir).await?;

        let result = self
            .download_and_send(request, format, &job_dir, chat, message, &cancel)
            .await;

        if let Err(e) = tokio::fs::remove_dir_all(&job_dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(dir = %job_dir.display(), error = %e, "Failed to remove job directory");
            }
        }
        result
    }

    async fn download_and_send(
        &self,
        request: &PendingRequest,
        format: FormatRequest,
        job_dir: &Path,
        chat: ChatRef,
        message: MessageRef,
        cancel: &CancellationToken,
    ) -> Result<MediaKind, FlowError> {
        let path = self.download(request, format, job_dir, cancel).await?;

        let size = tokio::fs::metadata(&path).await?.len();
        let limit = self.settings.max_upload_bytes();
        if size > limit {
            return Err(FlowError::FileTooLarge { size, limit });
        }
        if cancel.is_cancelled() {
            return Err(FlowError::Cancelled);
        }

        self.edit_status(chat, message, View::uploading()).await;
        let upload = if format.is_audio() {
            MediaUpload {
                kind: MediaKind::Audio,
                path,
                caption: audio_caption(&request.title),
                title: Some(audio_title(&request.title)),
            }
        } else {
            MediaUpload {
                kind: MediaKind::Video,
                path,
                caption: video_caption(&request.title),
                title: None,
            }
        };

        self.transport
            .send_media(chat, &upload)
            .await
            .map_err(FlowError::SendFailed)?;
        Ok(upload.kind)
    }

    async fn download(
        &self,
        request: &PendingRequest,
        format: FormatRequest,
        job_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, FlowError> {
        let limit = self.settings.download_timeout();
        let options = DownloadOptions {
            format,
            output_dir: job_dir.to_path_buf(),
        };

        let download = timeout(
            limit,
            self.extractor
                .download(&request.url, &options, cancel.clone()),
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(FlowError::Cancelled),
            result = download => match result {
                Ok(Ok(path)) => Ok(path),
                Ok(Err(ExtractError::Cancelled)) => Err(FlowError::Cancelled),
                Ok(Err(e)) => Err(FlowError::DownloadFailed(e)),
                Err(_) => {
                    cancel.cancel();
                    Err(FlowError::TimedOut {
                        stage: FlowStage::Download,
                        secs: limit.as_secs(),
                    })
                }
            },
        }
    }

    async fn edit_status(&self, chat: ChatRef, message: MessageRef, text: &str) {
        if let Err(e) = self.transport.edit_text(chat, message, text, None).await {
            warn!(error = %e, "Failed to update status message");
        }
    }

    async fn delete_quietly(&self, chat: ChatRef, message: MessageRef) {
        if let Err(e) = self.transport.delete_message(chat, message).await {
            debug!(error = %e, "Failed to delete status message");
        }
    }

    async fn answer_quietly(&self, callback_id: &str, text: Option<&str>) {
        if let Err(e) = self.transport.answer_callback(callback_id, text).await {
            debug!(error = %e, "Failed to answer callback query");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::{AudioCodec, MockMediaExtractor};
    use crate::testing::{mock_extractor_with_metadata, test_settings, RecordingTransport, Sent};

    const CHAT: ChatRef = ChatRef(100);

    fn flow(transport: &Arc<RecordingTransport>, extractor: MockMediaExtractor) -> SessionFlow {
        flow_with(transport, extractor, test_settings())
    }

    fn flow_with(
        transport: &Arc<RecordingTransport>,
        extractor: MockMediaExtractor,
        settings: Settings,
    ) -> SessionFlow {
        let settings = Arc::new(settings);
        SessionFlow::new(
            transport.clone(),
            Arc::new(extractor),
            SessionStore::new(settings.session_ttl(), settings.session_max_capacity),
            settings,
        )
    }

    fn writes_file(
        name: &'static str,
    ) -> impl Fn(&str, &DownloadOptions, CancellationToken) -> Result<PathBuf, ExtractError>
           + Send
           + 'static {
        move |_, options, _| {
            let path = options.output_dir.join(name);
            std::fs::write(&path, b"media")?;
            Ok(path)
        }
    }

    #[tokio::test]
    async fn test_unsupported_text_creates_nothing() {
        let transport = Arc::new(RecordingTransport::default());
        let mut extractor = MockMediaExtractor::new();
        extractor.expect_fetch_metadata().never();
        let flow = flow(&transport, extractor);

        let result = flow.submit_link(1, CHAT, "https://example.com/x").await;

        assert!(matches!(result, Err(FlowError::UnsupportedLink)));
        assert!(flow.sessions().get(1).await.is_none());
        assert_eq!(
            transport.texts().await,
            vec![View::unsupported_link().to_string()]
        );
    }

    #[tokio::test]
    async fn test_submit_link_shows_menu_and_stores_request() {
        let transport = Arc::new(RecordingTransport::default());
        let flow = flow(&transport, mock_extractor_with_metadata("Song"));

        let request = flow
            .submit_link(1, CHAT, "check https://youtu.be/abc")
            .await
            .expect("menu shown");

        assert_eq!(request.url, "https://youtu.be/abc");
        let stored = flow.sessions().get(1).await.expect("request stored");
        assert_eq!(stored.id, request.id);

        let events = transport.events().await;
        assert!(matches!(events.first(), Some(Sent::Text { text, .. }) if text == View::analyzing()));
        assert!(events.iter().any(|e| matches!(e, Sent::Delete { .. })));
        let Some(Sent::Menu { text, menu, .. }) = events.last() else {
            panic!("expected menu, got {events:?}");
        };
        assert!(text.contains("Song"));
        assert!(menu.tokens().any(|t| t == "audio_mp3"));
        assert!(menu.tokens().any(|t| t == "cancel"));
    }

    #[tokio::test]
    async fn test_extraction_failure_leaves_no_request() {
        let transport = Arc::new(RecordingTransport::default());
        let mut extractor = MockMediaExtractor::new();
        extractor
            .expect_fetch_metadata()
            .returning(|_, _| Err(ExtractError::Unavailable("Private video".into())));
        let flow = flow(&transport, extractor);

        let result = flow.submit_link(1, CHAT, "https://youtu.be/abc").await;

        assert!(matches!(result, Err(FlowError::ExtractionFailed(_))));
        assert!(flow.sessions().get(1).await.is_none());
        assert_eq!(
            transport.texts().await.last().map(String::as_str),
            Some(View::media_unavailable())
        );
    }

    #[tokio::test]
    async fn test_selection_without_session_is_expired() {
        let transport = Arc::new(RecordingTransport::default());
        let mut extractor = MockMediaExtractor::new();
        extractor.expect_download().never();
        let flow = flow(&transport, extractor);

        let result = flow
            .handle_selection(1, CHAT, MessageRef(5), "cb", "quality_720")
            .await;

        assert!(matches!(result, Err(FlowError::SessionExpired)));
        assert_eq!(
            transport.texts().await.last().map(String::as_str),
            Some(View::session_expired())
        );
    }

    #[tokio::test]
    async fn test_cancel_never_downloads() {
        let transport = Arc::new(RecordingTransport::default());
        let mut extractor = mock_extractor_with_metadata("Song");
        extractor.expect_download().never();
        let flow = flow(&transport, extractor);
        flow.submit_link(1, CHAT, "https://youtu.be/abc")
            .await
            .expect("menu shown");

        let result = flow
            .handle_selection(1, CHAT, MessageRef(5), "cb", "cancel")
            .await;

        assert_eq!(result.ok(), Some(Selection::Cancelled));
        assert!(flow.sessions().get(1).await.is_none());
        assert_eq!(
            transport.texts().await.last().map(String::as_str),
            Some(View::cancelled())
        );
    }

    #[tokio::test]
    async fn test_unknown_token_changes_nothing() {
        let transport = Arc::new(RecordingTransport::default());
        let mut extractor = mock_extractor_with_metadata("Song");
        extractor.expect_download().never();
        let flow = flow(&transport, extractor);
        flow.submit_link(1, CHAT, "https://youtu.be/abc")
            .await
            .expect("menu shown");

        let result = flow
            .handle_selection(1, CHAT, MessageRef(5), "cb", "quality_1080")
            .await;

        assert_eq!(result.ok(), Some(Selection::UnknownOption));
        assert!(flow.sessions().get(1).await.is_some_and(|r| !r.is_processing()));
        assert_eq!(
            transport.answers().await,
            vec![Some(View::unknown_option().to_string())]
        );
    }

    #[tokio::test]
    async fn test_quality_choice_downloads_with_height_filter() {
        let transport = Arc::new(RecordingTransport::default());
        let mut extractor = mock_extractor_with_metadata("Clip");
        extractor
            .expect_download()
            .withf(|url, options, _| {
                url == "https://youtu.be/abc" && options.format == FormatRequest::MaxHeight(480)
            })
            .times(1)
            .returning(writes_file("clip.mp4"));
        let flow = flow(&transport, extractor);
        flow.submit_link(1, CHAT, "https://youtu.be/abc")
            .await
            .expect("menu shown");

        let result = flow
            .handle_selection(1, CHAT, MessageRef(5), "cb", "quality_480")
            .await;

        assert_eq!(result.ok(), Some(Selection::Delivered(MediaKind::Video)));
        let media = transport.media().await;
        assert_eq!(media.len(), 1);
        assert_eq!(media[0].caption, "Clip");
        assert!(flow.sessions().get(1).await.is_none());
    }

    #[tokio::test]
    async fn test_audio_choice_requests_mp3_transcode() {
        let transport = Arc::new(RecordingTransport::default());
        let mut extractor = mock_extractor_with_metadata("Song");
        extractor
            .expect_download()
            .withf(|_, options, _| {
                options.format
                    == FormatRequest::BestAudio {
                        codec: AudioCodec::Mp3,
                        bitrate_kbps: 192,
                    }
            })
            .times(1)
            .returning(writes_file("song.mp3"));
        let flow = flow(&transport, extractor);
        flow.submit_link(1, CHAT, "https://youtu.be/abc")
            .await
            .expect("menu shown");

        let result = flow
            .handle_selection(1, CHAT, MessageRef(5), "cb", "audio_mp3")
            .await;

        assert_eq!(result.ok(), Some(Selection::Delivered(MediaKind::Audio)));
        let media = transport.media().await;
        assert_eq!(media[0].kind, MediaKind::Audio);
        assert!(media[0].caption.contains("Song"));
        assert_eq!(media[0].title.as_deref(), Some("Song"));
    }

    #[tokio::test]
    async fn test_oversized_file_is_rejected_and_cleaned_up() {
        let transport = Arc::new(RecordingTransport::default());
        let mut extractor = mock_extractor_with_metadata("Big");
        extractor
            .expect_download()
            .returning(writes_file("big.mp4"));
        let settings = Settings {
            max_upload_mb: 0,
            ..test_settings()
        };
        let download_dir = settings.download_dir.clone();
        let flow = flow_with(&transport, extractor, settings);
        let request = flow
            .submit_link(1, CHAT, "https://youtu.be/abc")
            .await
            .expect("menu shown");

        let result = flow
            .handle_selection(1, CHAT, MessageRef(5), "cb", "quality_720")
            .await;

        assert!(matches!(result, Err(FlowError::FileTooLarge { .. })));
        assert!(transport.media().await.is_empty());
        assert!(!download_dir.join(request.id.to_string()).exists());
        assert!(flow.sessions().get(1).await.is_none());
    }

    #[tokio::test]
    async fn test_failed_download_is_reported_and_cleaned_up() {
        let transport = Arc::new(RecordingTransport::default());
        let mut extractor = mock_extractor_with_metadata("Clip");
        extractor.expect_download().returning(|_, options, _| {
            // Partial file left behind by the backend
            std::fs::write(options.output_dir.join("clip.mp4.part"), b"half")?;
            Err(ExtractError::Failed {
                code: Some(1),
                message: "ERROR: fragment 3 not found".into(),
            })
        });
        let settings = test_settings();
        let download_dir = settings.download_dir.clone();
        let flow = flow_with(&transport, extractor, settings);
        let request = flow
            .submit_link(1, CHAT, "https://youtu.be/abc")
            .await
            .expect("menu shown");

        let result = flow
            .handle_selection(1, CHAT, MessageRef(5), "cb", "quality_720")
            .await;

        assert!(matches!(result, Err(FlowError::DownloadFailed(_))));
        assert!(!download_dir.join(request.id.to_string()).exists());
        assert_eq!(
            transport.texts().await.last().map(String::as_str),
            Some(View::download_failed())
        );

        // Same token again behaves as "no session"
        let again = flow
            .handle_selection(1, CHAT, MessageRef(5), "cb", "quality_720")
            .await;
        assert!(matches!(again, Err(FlowError::SessionExpired)));
    }

    #[tokio::test]
    async fn test_cancel_command_reports_even_without_session() {
        let transport = Arc::new(RecordingTransport::default());
        let flow = flow(&transport, MockMediaExtractor::new());

        let existed = flow.cancel(1, CHAT).await.expect("reply sent");

        assert!(!existed);
        assert_eq!(transport.texts().await, vec![View::cancelled().to_string()]);
    }

    #[tokio::test]
    async fn test_transport_failure_is_unexpected() {
        let transport = Arc::new(RecordingTransport::failing());
        let flow = flow(&transport, MockMediaExtractor::new());

        let err = flow
            .submit_link(1, CHAT, "https://youtu.be/abc")
            .await
            .expect_err("transport is down");

        assert!(err.is_unexpected());
    }
}
